//! Lazily evaluated derived values.
//!
//! A `LazyExpression` is the deferred counterpart of `Expression`: dependency
//! invalidations only move the state machine and fire invalidation listeners;
//! the computation runs when `get()` is next called, and change listeners
//! fire only if the recomputed value differs.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use argus_core::{
    ChangeListener, InvalidationListener, LazyState, ListenerSet, Observable, ObservableId,
    ObservableValue, Result, Value,
};

use crate::binding::DependencySet;
use crate::property::{Property, ReadOnlyProperty};

struct LazyExpressionInner<T> {
    value: RefCell<T>,
    compute: Box<dyn Fn() -> T>,
    state: Property<LazyState>,
    dependencies: DependencySet,
    change_listeners: ListenerSet<dyn Fn(&T, &T)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

impl<T: Value> LazyExpressionInner<T> {
    fn transition(&self, next: LazyState) {
        // The state property is never bound, so the write cannot fail.
        self.state.set(next).ok();
    }

    fn invalidate(&self) {
        if self.state.get().is_valid() {
            self.transition(LazyState::Invalid);
        }
    }

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

/// A lazily evaluated, read-only derived value.
///
/// # Example
///
/// ```rust
/// use argus_core::LazyState;
/// use argus_value::{LazyExpression, Property};
///
/// let base = Property::new(2);
/// let squared = LazyExpression::map(&base, |value: i32| value * value).unwrap();
///
/// assert_eq!(squared.state(), LazyState::Uninitialized);
/// assert_eq!(squared.get(), 4);
///
/// base.set(3).unwrap();
/// assert_eq!(squared.state(), LazyState::Invalid);
/// assert_eq!(squared.get(), 9);
/// ```
pub struct LazyExpression<T: Value> {
    inner: Rc<LazyExpressionInner<T>>,
}

impl<T: Value> Clone for LazyExpression<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> LazyExpression<T> {
    /// Creates a new, initially uninitialized, expression.
    ///
    /// The computation does not run until the first `get()`; the first change
    /// event reports `T::default()` as the old value.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new(LazyExpressionInner {
            value: RefCell::new(T::default()),
            compute: Box::new(compute),
            state: Property::new(LazyState::Uninitialized),
            dependencies: DependencySet::new(),
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

    /// Derives a lazy expression from a single source.
    pub fn map<S, U>(source: &S, transform: impl Fn(U) -> T + 'static) -> Result<Self>
    where
        S: ObservableValue<U> + Clone + 'static,
        U: Value,
    {
        let pull = source.clone();
        let expression = Self::new(move || transform(pull.get()));
        expression.add_dependency(source)?;

        Ok(expression)
    }

    /// Returns the current value, recomputing it if necessary.
    pub fn get(&self) -> T {
        if !self.inner.state.get().is_valid() {
            let computed = (self.inner.compute)();
            self.inner.update_value(computed);
        }

        self.inner.value.borrow().clone()
    }

    /// Registers a dependency: this expression is invalidated whenever
    /// `source` is invalidated.
    ///
    /// Fails with `DuplicateDependency` if this expression already depends on
    /// the given observable.
    pub fn add_dependency<S>(&self, source: &S) -> Result<()>
    where
        S: Observable + Clone + 'static,
    {
        let weak = Rc::downgrade(&self.inner);
        let listener = InvalidationListener::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        });

        self.inner.dependencies.add(source, listener)
    }

    /// Registers a dependency with a side effect run before invalidation.
    pub fn add_dependency_with<S>(
        &self,
        source: &S,
        side_effect: impl Fn() + 'static,
    ) -> Result<()>
    where
        S: Observable + Clone + 'static,
    {
        let weak = Rc::downgrade(&self.inner);
        let listener = InvalidationListener::new(move || {
            side_effect();
            if let Some(inner) = weak.upgrade() {
                inner.invalidate();
            }
        });

        self.inner.dependencies.add(source, listener)
    }

    /// Removes the dependency on the given observable and unsubscribes it.
    ///
    /// Fails with `UnknownDependency` if no such dependency exists.
    pub fn remove_dependency<S: Observable>(&self, source: &S) -> Result<()> {
        self.inner.dependencies.remove(source.id())
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

impl<T: Value> Observable for LazyExpression<T> {
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

impl<T: Value> ObservableValue<T> for LazyExpression<T> {
    fn get(&self) -> T {
        LazyExpression::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_computation_is_deferred() {
        let base = Property::new(1);
        let runs = Rc::new(RefCell::new(0));

        let expression = {
            let runs = runs.clone();
            let base = base.clone();
            LazyExpression::new(move || {
                *runs.borrow_mut() += 1;
                base.get() * 2
            })
        };
        expression.add_dependency(&base).unwrap();

        assert_eq!(*runs.borrow(), 0);
        assert_eq!(expression.get(), 2);
        assert_eq!(*runs.borrow(), 1);

        expression.get();
        assert_eq!(*runs.borrow(), 1);
    }

    #[test]
    fn test_first_pull_reports_default_old_value() {
        let base = Property::new(3);
        let expression = LazyExpression::map(&base, |value: i32| value * 2).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        {
            let seen = seen.clone();
            expression.add_change_listener(ChangeListener::new(move |old: &i32, new: &i32| {
                seen.borrow_mut().push((*old, *new));
            }));
        }

        assert_eq!(expression.get(), 6);
        assert_eq!(*seen.borrow(), [(0, 6)]);
        assert_eq!(expression.state(), LazyState::Initialized);
    }

    #[test]
    fn test_invalidation_is_eager_change_is_lazy() {
        let base = Property::new(1);
        let expression = LazyExpression::map(&base, |value: i32| value + 1).unwrap();
        let invalidations = Rc::new(RefCell::new(0));
        let changes = Rc::new(RefCell::new(0));

        expression.get();

        {
            let invalidations = invalidations.clone();
            expression.add_invalidation_listener(InvalidationListener::new(move || {
                *invalidations.borrow_mut() += 1;
            }));
        }
        {
            let changes = changes.clone();
            expression.add_change_listener(ChangeListener::new(move |_: &i32, _: &i32| {
                *changes.borrow_mut() += 1;
            }));
        }

        base.set(2).unwrap();
        assert_eq!(*invalidations.borrow(), 1);
        assert_eq!(*changes.borrow(), 0);

        assert_eq!(expression.get(), 3);
        assert_eq!(*changes.borrow(), 1);
    }

    #[test]
    fn test_repeated_invalidation_fires_once() {
        let base = Property::new(1);
        let expression = LazyExpression::map(&base, |value: i32| value).unwrap();
        let invalidations = Rc::new(RefCell::new(0));

        expression.get();

        {
            let invalidations = invalidations.clone();
            expression.add_invalidation_listener(InvalidationListener::new(move || {
                *invalidations.borrow_mut() += 1;
            }));
        }

        base.set(2).unwrap();
        base.set(3).unwrap();
        assert_eq!(*invalidations.borrow(), 1);

        assert_eq!(expression.get(), 3);
        base.set(4).unwrap();
        assert_eq!(*invalidations.borrow(), 2);
    }

    #[test]
    fn test_unchanged_recomputation_fires_no_change() {
        let base = Property::new(1);
        let parity = LazyExpression::map(&base, |value: i32| value % 2).unwrap();
        let changes = Rc::new(RefCell::new(0));

        parity.get();

        {
            let changes = changes.clone();
            parity.add_change_listener(ChangeListener::new(move |_: &i32, _: &i32| {
                *changes.borrow_mut() += 1;
            }));
        }

        base.set(3).unwrap();
        assert_eq!(parity.get(), 1);
        assert_eq!(*changes.borrow(), 0);
        assert_eq!(parity.state(), LazyState::Valid);
    }

    #[test]
    fn test_side_effect_runs_on_invalidation() {
        let base = Property::new(0);
        let effects = Rc::new(RefCell::new(0));

        let expression = LazyExpression::new(|| 0);
        {
            let effects = effects.clone();
            expression
                .add_dependency_with(&base, move || {
                    *effects.borrow_mut() += 1;
                })
                .unwrap();
        }

        base.set(1).unwrap();
        assert_eq!(*effects.borrow(), 1);
    }
}
