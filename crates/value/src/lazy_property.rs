//! Lazily evaluated properties.
//!
//! A `LazyProperty` defers computation of its value to the next `get()`.
//! Writes and upstream invalidations only move the state machine and fire
//! invalidation listeners; change listeners fire lazily, when `get()` next
//! recomputes and the value actually differs.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use argus_core::{
    ChangeListener, Error, InvalidationListener, LazyState, ListenerSet, Observable, ObservableId,
    ObservableValue, Result, Value,
};

use crate::binding::Binding;
use crate::property::{Property, ReadOnlyProperty};

struct LazyPropertyInner<T> {
    value: RefCell<T>,
    provider: RefCell<Option<Box<dyn Fn() -> T>>>,
    state: Property<LazyState>,
    binding: RefCell<Option<Binding<T>>>,
    change_listeners: ListenerSet<dyn Fn(&T, &T)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

impl<T: Value> LazyPropertyInner<T> {
    /// Moves the state machine; the state property's change listener fires
    /// this property's invalidation listeners on transitions out of a valid
    /// state.
    fn transition(&self, next: LazyState) {
        // The state property is never bound, so the write cannot fail.
        self.state.set(next).ok();
    }

    fn store_provider(&self, provider: Box<dyn Fn() -> T>) {
        *self.provider.borrow_mut() = Some(provider);

        if self.state.get().is_valid() {
            self.transition(LazyState::Invalid);
        }
    }

    fn on_binding_invalidated(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        self.store_provider(Box::new(move || match weak.upgrade() {
            Some(inner) => {
                let pulled = inner.binding.borrow().as_ref().map(|binding| binding.get());
                pulled.unwrap_or_else(|| inner.value.borrow().clone())
            }
            None => T::default(),
        }));
    }

    /// Stores a freshly computed value and fires change listeners per the
    /// lazy state table: the first pull out of `Uninitialized` always fires
    /// (with the default as the old value); later pulls compare first.
    fn update_value(&self, value: T) {
        let prev = self.value.borrow().clone();
        let changed = prev != value;

        if changed {
            *self.value.borrow_mut() = value;
        }

        if self.state.get() == LazyState::Uninitialized {
            self.transition(LazyState::Initialized);
        } else {
            self.transition(LazyState::Valid);
            if !changed {
                return;
            }
        }

        self.change_listeners.notify(|callback| {
            let current = self.value.borrow().clone();
            callback(&prev, &current);
        });
    }
}

/// A lazily evaluated, bindable property.
///
/// # Example
///
/// ```rust
/// use argus_core::LazyState;
/// use argus_value::LazyProperty;
///
/// let property = LazyProperty::new(|| 42);
/// assert_eq!(property.state(), LazyState::Uninitialized);
/// assert_eq!(property.get(), 42);
/// assert_eq!(property.state(), LazyState::Initialized);
/// ```
pub struct LazyProperty<T: Value> {
    inner: Rc<LazyPropertyInner<T>>,
}

impl<T: Value> Clone for LazyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> LazyProperty<T> {
    fn from_parts(value: T, provider: Option<Box<dyn Fn() -> T>>, state: LazyState) -> Self {
        let inner = Rc::new(LazyPropertyInner {
            value: RefCell::new(value),
            provider: RefCell::new(provider),
            state: Property::new(state),
            binding: RefCell::new(None),
            change_listeners: ListenerSet::new(),
            invalidation_listeners: ListenerSet::new(),
        });

        let weak = Rc::downgrade(&inner);
        inner.state.add_change_listener(ChangeListener::new(
            move |_: &LazyState, new: &LazyState| {
                if !new.is_valid() {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidation_listeners.notify(|callback| callback());
                    }
                }
            },
        ));

        Self { inner }
    }

    /// Creates a new, initially uninitialized, property.
    ///
    /// The provider is the initial source of the property's value. When the
    /// property is first pulled, registered change listeners see an old value
    /// of `T::default()`.
    pub fn new(provider: impl Fn() -> T + 'static) -> Self {
        Self::from_parts(T::default(), Some(Box::new(provider)), LazyState::Uninitialized)
    }

    /// Creates a new property with the given initial value.
    pub fn with_value(initial: T) -> Self {
        Self::from_parts(initial, None, LazyState::Initialized)
    }

    /// Returns the current value, recomputing it if necessary.
    ///
    /// The pending provider is invoked at most once; repeated calls without
    /// an intervening invalidation never recompute.
    pub fn get(&self) -> T {
        if !self.inner.state.get().is_valid() {
            let provider = self.inner.provider.borrow_mut().take();
            if let Some(provider) = provider {
                let computed = provider();
                self.inner.update_value(computed);
            }
        }

        self.inner.value.borrow().clone()
    }

    /// Sets the value of this property.
    ///
    /// Stores a constant provider; the property is invalidated but not
    /// recomputed until the next `get()`. Fails with `AlreadyBound` if the
    /// property is bound.
    pub fn set(&self, value: T) -> Result<()> {
        self.set_with(move || value.clone())
    }

    /// Sets the function to recompute the value of this property and
    /// invalidates it.
    ///
    /// Change listeners do not fire until the next `get()`, and only if the
    /// recomputed value differs. Fails with `AlreadyBound` if the property is
    /// bound.
    pub fn set_with(&self, provider: impl Fn() -> T + 'static) -> Result<()> {
        if self.is_bound() {
            return Err(Error::AlreadyBound);
        }

        self.inner.store_provider(Box::new(provider));
        Ok(())
    }

    /// Binds this property to follow `source` lazily.
    pub fn bind_to<S>(&self, source: &S) -> Result<()>
    where
        S: ObservableValue<T> + Clone + 'static,
    {
        self.bind_to_with(source, |value| value)
    }

    /// Binds this property to follow `source` through `transform` lazily.
    ///
    /// The source is not pulled eagerly; the next `get()` pulls through the
    /// transform.
    pub fn bind_to_with<S, U>(
        &self,
        source: &S,
        transform: impl Fn(U) -> T + 'static,
    ) -> Result<()>
    where
        S: ObservableValue<U> + Clone + 'static,
        U: Value,
    {
        {
            let mut binding = self.inner.binding.borrow_mut();
            if binding.is_some() {
                return Err(Error::AlreadyBound);
            }

            let weak = Rc::downgrade(&self.inner);
            *binding = Some(Binding::new(source, transform, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_binding_invalidated();
                }
            }));
        }

        self.inner.on_binding_invalidated();
        Ok(())
    }

    /// Releases the active binding.
    ///
    /// Fails with `NotBound` if the property is not bound.
    pub fn unbind(&self) -> Result<()> {
        let binding = self.inner.binding.borrow_mut().take().ok_or(Error::NotBound)?;
        binding.release();
        Ok(())
    }

    /// Returns whether this property is bound.
    pub fn is_bound(&self) -> bool {
        self.inner.binding.borrow().is_some()
    }

    /// Returns whether this property may be written.
    pub fn is_writable(&self) -> bool {
        !self.is_bound()
    }

    /// Returns the state of this lazy value.
    pub fn state(&self) -> LazyState {
        self.inner.state.get()
    }

    /// Returns a read-only view of the state of this lazy value.
    pub fn state_property(&self) -> ReadOnlyProperty<LazyState> {
        self.inner.state.as_read_only()
    }
}

impl<T: Value> Observable for LazyProperty<T> {
    fn id(&self) -> ObservableId {
        Rc::as_ptr(&self.inner) as *const () as ObservableId
    }

    fn add_invalidation_listener(&self, listener: InvalidationListener) -> bool {
        self.inner.invalidation_listeners.add(listener)
    }

    fn remove_invalidation_listener(&self, listener: &InvalidationListener) -> bool {
        self.inner.invalidation_listeners.remove(listener)
    }
}

impl<T: Value> ObservableValue<T> for LazyProperty<T> {
    fn get(&self) -> T {
        LazyProperty::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}
