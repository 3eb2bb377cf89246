//! Argus Core - Core observable traits and listener registries.
//!
//! This crate provides the foundational types for the Argus observable
//! library:
//!
//! - `Observable` / `ObservableValue`: the capability traits every property,
//!   expression, and observable collection implements
//! - `Listener` / `ListenerSet`: identity-keyed listener handles and the
//!   snapshot-dispatch registry used for both invalidation and change
//!   listeners
//! - `Value`: the bound (equality + default) that collapses per-primitive
//!   specializations into one generic implementation
//! - `LazyState`: the state machine of lazily evaluated values
//! - `Error`: error types for contract violations
//!
//! # Example
//!
//! ```rust
//! use argus_core::{InvalidationListener, ListenerSet};
//!
//! let registry: ListenerSet<dyn Fn()> = ListenerSet::new();
//! let listener = InvalidationListener::new(|| {});
//!
//! assert!(registry.add(listener.clone()));
//! assert!(!registry.add(listener.clone()));
//!
//! registry.notify(|callback| callback());
//! ```

#![no_std]

extern crate alloc;

mod error;
mod lazy;
mod listener;
mod observable;
mod value;

pub use error::{Error, Result};
pub use lazy::LazyState;
pub use listener::{ChangeListener, InvalidationListener, Listener, ListenerSet};
pub use observable::{Observable, ObservableId, ObservableValue};
pub use value::Value;
