//! Observable traits.
//!
//! An `Observable` can be invalidated and notifies registered invalidation
//! listeners when that happens. An `ObservableValue` additionally holds a
//! readable value and notifies change listeners with the concrete
//! `(old, new)` delta.

use crate::listener::{ChangeListener, InvalidationListener};
use crate::value::Value;

/// Unique identifier of an observable.
///
/// The identity is the address of the observable's shared inner allocation,
/// stable for the life of the observable. Dependency edges are keyed by it.
pub type ObservableId = usize;

/// An entity that can be invalidated and notifies registered listeners.
pub trait Observable {
    /// Returns the identity of this observable.
    fn id(&self) -> ObservableId;

    /// Adds an invalidation listener.
    ///
    /// Returns true iff the listener was not already registered.
    fn add_invalidation_listener(&self, listener: InvalidationListener) -> bool;

    /// Removes an invalidation listener.
    ///
    /// Returns true iff the listener was registered.
    fn remove_invalidation_listener(&self, listener: &InvalidationListener) -> bool;
}

/// An observable holder of a single value.
pub trait ObservableValue<T: Value>: Observable {
    /// Returns the current value.
    fn get(&self) -> T;

    /// Adds a change listener.
    ///
    /// Returns true iff the listener was not already registered.
    fn add_change_listener(&self, listener: ChangeListener<T>) -> bool;

    /// Removes a change listener.
    ///
    /// Returns true iff the listener was registered.
    fn remove_change_listener(&self, listener: &ChangeListener<T>) -> bool;
}
