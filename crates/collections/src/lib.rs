//! Argus Collections - Observable collections and change aggregation.
//!
//! This crate implements the collection half of the Argus observable
//! library:
//!
//! - `ObservableList` / `ObservableSet` / `ObservableMap` /
//!   `ObservableDeque`: wrappers over backing collections whose every
//!   structural mutation routes through a transaction-scoped change builder
//! - `ListChange` / `SetChange` / `MapChange` / `DequeChange`: the
//!   compressed net effect of one transaction, delivered as a single event
//!   per outermost transaction no matter how many nested mutations occurred
//! - `ListBinding` / `SetBinding` / `MapBinding` / `DequeBinding`: content
//!   binding adapters that buffer upstream changes and transform them
//!   lazily on drain
//! - Read-through, unmodifiable views (`ListView`, `SetView`, `MapView`,
//!   `DequeView`)
//!
//! # Example
//!
//! ```rust
//! use argus_collections::{ListChange, ObservableList};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let list = ObservableList::from(vec![3, 1, 2]);
//! let events = Rc::new(RefCell::new(0));
//!
//! let sink = events.clone();
//! list.add_change_listener(ListChange::listener(move |change: &ListChange<i32>| {
//!     *sink.borrow_mut() += 1;
//!     // sorting reports a permutation, not remove+insert pairs
//!     assert!(matches!(change, ListChange::Permutation { .. }));
//! }));
//!
//! list.sort();
//! assert_eq!(*events.borrow(), 1);
//! ```

#![no_std]

extern crate alloc;

mod binding;
mod deque;
mod list;
mod map;
mod set;

pub use binding::{DequeBinding, ListBinding, MapBinding, SetBinding};
pub use deque::{
    DequeChange, DequeChangeListener, DequeLocalChange, DequeTransaction, DequeView,
    ObservableDeque, Site,
};
pub use list::{
    ListChange, ListChangeListener, ListTransaction, ListView, LocalChange, ObservableList,
};
pub use map::{MapChange, MapChangeListener, MapTransaction, MapView, ObservableMap};
pub use set::{ObservableSet, SetChange, SetChangeListener, SetTransaction, SetView};

// Re-export commonly used types from the core crate.
pub use argus_core::{InvalidationListener, Listener, Observable, ObservableId};
