//! Argus Value - Observable properties and expressions.
//!
//! This crate implements the scalar half of the Argus observable library:
//!
//! - `Property`: a mutable, bindable holder of a single value
//! - `ReadOnlyProperty`: a read-only view of a property
//! - `Expression`: a read-only value derived eagerly from upstream
//!   observables
//! - `LazyProperty` / `LazyExpression`: deferred counterparts driven by the
//!   `LazyState` machine
//!
//! Every mutation follows the same two-phase protocol: the value is stored
//! and compared, change listeners fire with the `(old, new)` delta, then
//! invalidation listeners fire. A value equal to the current one fires
//! nothing.
//!
//! # Example
//!
//! ```rust
//! use argus_core::ObservableValue;
//! use argus_value::{Expression, Property};
//!
//! let celsius = Property::new(0.0);
//! let fahrenheit = Expression::map(&celsius, |c: f64| c * 9.0 / 5.0 + 32.0).unwrap();
//!
//! celsius.set(100.0).unwrap();
//! assert_eq!(fahrenheit.get(), 212.0);
//!
//! let display = Property::new(0.0);
//! display.bind_to(&fahrenheit).unwrap();
//! assert!(display.is_bound());
//! assert_eq!(display.get(), 212.0);
//! ```

#![no_std]

extern crate alloc;

mod binding;
mod expression;
mod lazy_expression;
mod lazy_property;
mod property;

pub use expression::Expression;
pub use lazy_expression::LazyExpression;
pub use lazy_property::LazyProperty;
pub use property::{Property, ReadOnlyProperty};

// Re-export commonly used types from the core crate.
pub use argus_core::{
    ChangeListener, Error, InvalidationListener, LazyState, Observable, ObservableValue, Result,
    Value,
};
