//! Writable observable properties.
//!
//! A `Property` holds a single value and notifies listeners when it changes.
//! It is writable until bound to an upstream observable, after which its
//! value follows the source until `unbind` is called.
//!
//! Notification is two-phase and ordered: change listeners fire first with
//! the concrete `(old, new)` delta, then invalidation listeners fire.

use alloc::rc::Rc;
use core::cell::RefCell;

use argus_core::{
    ChangeListener, Error, InvalidationListener, ListenerSet, Observable, ObservableId,
    ObservableValue, Result, Value,
};

use crate::binding::Binding;

pub(crate) struct PropertyInner<T> {
    value: RefCell<T>,
    binding: RefCell<Option<Binding<T>>>,
    change_listeners: ListenerSet<dyn Fn(&T, &T)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

impl<T: Value> PropertyInner<T> {
    fn new(initial: T) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(initial),
            binding: RefCell::new(None),
            change_listeners: ListenerSet::new(),
            invalidation_listeners: ListenerSet::new(),
        })
    }

    /// Compare-and-fire: stores the value and notifies if it differs.
    ///
    /// The new value passed to each change listener is re-read from storage,
    /// so a listener that mutates the property further is observed by the
    /// listeners after it.
    fn set_internal(&self, value: T) {
        let prev = self.value.borrow().clone();
        if prev == value {
            return;
        }

        *self.value.borrow_mut() = value;

        self.change_listeners.notify(|callback| {
            let current = self.value.borrow().clone();
            callback(&prev, &current);
        });
        self.invalidation_listeners.notify(|callback| callback());
    }

    fn on_binding_invalidated(&self) {
        let pulled = {
            let binding = self.binding.borrow();
            match binding.as_ref() {
                Some(binding) => binding.get(),
                None => return,
            }
        };

        self.set_internal(pulled);
    }
}

/// A mutable, bindable observable holder of a single value.
///
/// Handles are cheap to clone and share the same underlying cell.
///
/// # Example
///
/// ```rust
/// use argus_value::Property;
///
/// let property = Property::new(1);
/// property.set(2).unwrap();
/// assert_eq!(property.get(), 2);
/// ```
pub struct Property<T: Value> {
    inner: Rc<PropertyInner<T>>,
}

impl<T: Value> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> Property<T> {
    /// Creates a new property with the given initial value.
    pub fn new(initial: T) -> Self {
        Self {
            inner: PropertyInner::new(initial),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Sets the value of this property.
    ///
    /// Fails with `AlreadyBound` if the property is bound. Setting a value
    /// equal to the current one fires no listeners.
    pub fn set(&self, value: T) -> Result<()> {
        if self.is_bound() {
            return Err(Error::AlreadyBound);
        }

        self.inner.set_internal(value);
        Ok(())
    }

    /// Binds this property to follow `source`.
    ///
    /// Fails with `AlreadyBound` if a binding is already active. The source's
    /// current value is pulled immediately through the same compare-and-fire
    /// path as `set`, and every upstream invalidation re-pulls.
    pub fn bind_to<S>(&self, source: &S) -> Result<()>
    where
        S: ObservableValue<T> + Clone + 'static,
    {
        self.bind_to_with(source, |value| value)
    }

    /// Binds this property to follow `source` through `transform`.
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

    /// Releases the active binding, leaving the last pulled value in place.
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

    /// Returns a read-only view of this property.
    ///
    /// Every returned view shares the same underlying cell; repeated calls
    /// yield identity-equal views (see `ReadOnlyProperty::ptr_eq`).
    pub fn as_read_only(&self) -> ReadOnlyProperty<T> {
        ReadOnlyProperty {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> Observable for Property<T> {
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

impl<T: Value> ObservableValue<T> for Property<T> {
    fn get(&self) -> T {
        Property::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}

/// A read-only view of a property.
pub struct ReadOnlyProperty<T: Value> {
    inner: Rc<PropertyInner<T>>,
}

impl<T: Value> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> ReadOnlyProperty<T> {
    /// Returns the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Returns true if both views observe the same property.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Value> Observable for ReadOnlyProperty<T> {
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

impl<T: Value> ObservableValue<T> for ReadOnlyProperty<T> {
    fn get(&self) -> T {
        ReadOnlyProperty::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}
