//! Read-only derived values.
//!
//! An `Expression` computes its value from one or more upstream observables
//! through a pure function. Whenever a dependency is invalidated the
//! expression recomputes eagerly and fires its own listeners through the
//! standard compare-and-fire path.
//!
//! For every dependency, the ordering is: the dependency's registered
//! side effect runs first, then the recomputation, then this expression's own
//! listeners. A side effect may swap out the state the computation reads.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use argus_core::{
    ChangeListener, InvalidationListener, ListenerSet, Observable, ObservableId, ObservableValue,
    Result, Value,
};

use crate::binding::DependencySet;

struct ExpressionInner<T> {
    value: RefCell<T>,
    compute: Box<dyn Fn() -> T>,
    dependencies: DependencySet,
    change_listeners: ListenerSet<dyn Fn(&T, &T)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

impl<T: Value> ExpressionInner<T> {
    fn recompute(&self) {
        let value = (self.compute)();

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
}

/// A read-only observable value computed from upstream observables.
///
/// # Example
///
/// ```rust
/// use argus_core::ObservableValue;
/// use argus_value::{Expression, Property};
///
/// let base = Property::new(2);
/// let doubled = Expression::map(&base, |value: i32| value * 2).unwrap();
///
/// base.set(21).unwrap();
/// assert_eq!(doubled.get(), 42);
/// ```
pub struct Expression<T: Value> {
    inner: Rc<ExpressionInner<T>>,
}

impl<T: Value> Clone for Expression<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Value> core::fmt::Debug for Expression<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Expression").finish_non_exhaustive()
    }
}

impl<T: Value> Expression<T> {
    /// Creates a new expression, computing its initial value eagerly.
    ///
    /// The expression has no dependencies yet; register them with
    /// `add_dependency`.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let value = compute();

        Self {
            inner: Rc::new(ExpressionInner {
                value: RefCell::new(value),
                compute: Box::new(compute),
                dependencies: DependencySet::new(),
                change_listeners: ListenerSet::new(),
                invalidation_listeners: ListenerSet::new(),
            }),
        }
    }

    /// Derives an expression from a single source.
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

    /// Derives an expression from two sources.
    pub fn combine<A, B, U, V>(
        first: &A,
        second: &B,
        transform: impl Fn(U, V) -> T + 'static,
    ) -> Result<Self>
    where
        A: ObservableValue<U> + Clone + 'static,
        B: ObservableValue<V> + Clone + 'static,
        U: Value,
        V: Value,
    {
        let pull_first = first.clone();
        let pull_second = second.clone();
        let expression = Self::new(move || transform(pull_first.get(), pull_second.get()));
        expression.add_dependency(first)?;
        expression.add_dependency(second)?;

        Ok(expression)
    }

    /// Returns the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Registers a dependency: this expression recomputes whenever `source`
    /// is invalidated.
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
                inner.recompute();
            }
        });

        self.inner.dependencies.add(source, listener)
    }

    /// Registers a dependency with a side effect.
    ///
    /// The side effect runs when `source` is invalidated, strictly before the
    /// recomputation reads its inputs.
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
                inner.recompute();
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
}

impl<T: Value> Observable for Expression<T> {
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

impl<T: Value> ObservableValue<T> for Expression<T> {
    fn get(&self) -> T {
        Expression::get(self)
    }

    fn add_change_listener(&self, listener: ChangeListener<T>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}
