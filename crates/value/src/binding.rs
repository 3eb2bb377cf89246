//! Upstream subscription adapters.
//!
//! A `Binding` links a bound property or expression to its upstream source:
//! it owns the strong invalidation listener (the source only holds a weak
//! handle, so the source cannot keep the owner alive), exposes a pull-based
//! `get()` through the owner-supplied transform, and is released when the
//! owner unbinds.
//!
//! A `DependencySet` is the explicit edge list an expression owns: one entry
//! per upstream observable, each independently removable.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;

use argus_core::{
    Error, InvalidationListener, Observable, ObservableId, ObservableValue, Result, Value,
};

/// A pull adapter from one upstream observable value.
pub(crate) struct Binding<T> {
    pull: Box<dyn Fn() -> T>,
    listener: InvalidationListener,
    unsubscribe: Box<dyn Fn(&InvalidationListener)>,
}

impl<T: Value> Binding<T> {
    /// Subscribes to `source` and pulls through `transform`.
    ///
    /// `invalidator` is invoked on every upstream invalidation. The source
    /// holds only a weak handle to it; this adapter keeps the strong one.
    pub fn new<S, U>(
        source: &S,
        transform: impl Fn(U) -> T + 'static,
        invalidator: impl Fn() + 'static,
    ) -> Self
    where
        S: ObservableValue<U> + Clone + 'static,
        U: Value,
    {
        let listener = InvalidationListener::new(invalidator);
        source.add_invalidation_listener(listener.downgrade());

        let pull_source = source.clone();
        let release_source = source.clone();

        Self {
            pull: Box::new(move || transform(pull_source.get())),
            listener,
            unsubscribe: Box::new(move |listener| {
                release_source.remove_invalidation_listener(listener);
            }),
        }
    }

    /// Pulls the current upstream value through the transform.
    pub fn get(&self) -> T {
        (self.pull)()
    }

    /// Unsubscribes from the source.
    pub fn release(&self) {
        (self.unsubscribe)(&self.listener);
    }
}

struct Dependency {
    source: ObservableId,
    listener: InvalidationListener,
    unsubscribe: Box<dyn Fn(&InvalidationListener)>,
}

/// The dependency edges owned by an expression.
#[derive(Default)]
pub(crate) struct DependencySet {
    edges: RefCell<Vec<Dependency>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self {
            edges: RefCell::new(Vec::new()),
        }
    }

    /// Adds an edge to `source`, registering a weak handle to `listener`.
    ///
    /// Fails with `DuplicateDependency` if an edge to the same observable
    /// already exists.
    pub fn add<S>(&self, source: &S, listener: InvalidationListener) -> Result<()>
    where
        S: Observable + Clone + 'static,
    {
        let mut edges = self.edges.borrow_mut();
        if edges.iter().any(|edge| edge.source == source.id()) {
            return Err(Error::duplicate_dependency(source.id()));
        }

        source.add_invalidation_listener(listener.downgrade());

        let release_source = source.clone();
        edges.push(Dependency {
            source: source.id(),
            listener,
            unsubscribe: Box::new(move |listener| {
                release_source.remove_invalidation_listener(listener);
            }),
        });

        Ok(())
    }

    /// Removes the edge to the given observable and unsubscribes it.
    ///
    /// Fails with `UnknownDependency` if no such edge exists.
    pub fn remove(&self, source: ObservableId) -> Result<()> {
        let mut edges = self.edges.borrow_mut();
        let position = edges
            .iter()
            .position(|edge| edge.source == source)
            .ok_or(Error::UnknownDependency { observable: source })?;

        let edge = edges.remove(position);
        (edge.unsubscribe)(&edge.listener);

        Ok(())
    }

    /// Returns the number of edges.
    #[inline]
    pub fn len(&self) -> usize {
        self.edges.borrow().len()
    }
}
