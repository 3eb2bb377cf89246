//! Listener handles and the snapshot-dispatch registry.
//!
//! This module provides `Listener`, a cloneable identity-keyed handle over a
//! callback, and `ListenerSet`, the registry every observable uses for both
//! its invalidation and change listeners.
//!
//! A listener handle is either *strong* (it keeps the callback alive) or
//! *weak* (a downgraded handle over the same callback). A weak handle becomes
//! invalid once the last strong handle is dropped; registries prune invalid
//! entries before and after each notification round.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;

enum ListenerRef<C: ?Sized> {
    Strong(Rc<C>),
    Weak(Weak<C>),
}

impl<C: ?Sized> Clone for ListenerRef<C> {
    fn clone(&self) -> Self {
        match self {
            ListenerRef::Strong(rc) => ListenerRef::Strong(rc.clone()),
            ListenerRef::Weak(weak) => ListenerRef::Weak(weak.clone()),
        }
    }
}

/// An identity-keyed handle over a shared callback.
///
/// Two handles are the same listener iff they refer to the same callback
/// allocation; registration is set-semantic over that identity.
pub struct Listener<C: ?Sized> {
    inner: ListenerRef<C>,
    key: *const (),
}

impl<C: ?Sized> Clone for Listener<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            key: self.key,
        }
    }
}

impl<C: ?Sized> Listener<C> {
    /// Wraps a shared callback in a strong listener handle.
    pub fn wrap(callback: Rc<C>) -> Self {
        let key = Rc::as_ptr(&callback) as *const ();
        Self {
            inner: ListenerRef::Strong(callback),
            key,
        }
    }

    /// Returns a weak handle over the same callback.
    ///
    /// The weak handle reports itself invalid once every strong handle to the
    /// callback has been dropped. Registering a weak handle lets an observable
    /// reference a listener without keeping it alive.
    pub fn downgrade(&self) -> Self {
        let inner = match &self.inner {
            ListenerRef::Strong(rc) => ListenerRef::Weak(Rc::downgrade(rc)),
            ListenerRef::Weak(weak) => ListenerRef::Weak(weak.clone()),
        };

        Self {
            inner,
            key: self.key,
        }
    }

    /// Returns true if this listener can no longer be invoked.
    ///
    /// Once this returns true it never returns false again for the same
    /// callback; registries rely on that to prune entries.
    pub fn is_invalid(&self) -> bool {
        match &self.inner {
            ListenerRef::Strong(_) => false,
            ListenerRef::Weak(weak) => weak.strong_count() == 0,
        }
    }

    /// Returns true if both handles refer to the same callback.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.key == other.key
    }

    fn callback(&self) -> Option<Rc<C>> {
        match &self.inner {
            ListenerRef::Strong(rc) => Some(rc.clone()),
            ListenerRef::Weak(weak) => weak.upgrade(),
        }
    }
}

/// Callback handle invoked when an observable may have changed.
pub type InvalidationListener = Listener<dyn Fn()>;

/// Callback handle invoked with `(old, new)` when a value has changed.
pub type ChangeListener<T> = Listener<dyn Fn(&T, &T)>;

impl InvalidationListener {
    /// Creates a strong invalidation listener from a closure.
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self::wrap(Rc::new(callback))
    }
}

impl<T: 'static> ChangeListener<T> {
    /// Creates a strong change listener from a closure.
    pub fn new(callback: impl Fn(&T, &T) + 'static) -> Self {
        Self::wrap(Rc::new(callback))
    }
}

/// A registry of listeners with set semantics and snapshot dispatch.
///
/// Notification iterates over a snapshot of the entries, so a callback may
/// add or remove listeners on the same registry (including removing itself)
/// without disturbing the round in progress. Listeners added during a round
/// are first notified in the next round.
pub struct ListenerSet<C: ?Sized> {
    entries: RefCell<Vec<Listener<C>>>,
}

impl<C: ?Sized> Default for ListenerSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> ListenerSet<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Adds a listener.
    ///
    /// Returns true iff the listener was not already present.
    pub fn add(&self, listener: Listener<C>) -> bool {
        let mut entries = self.entries.borrow_mut();
        if entries.iter().any(|entry| entry.key == listener.key) {
            return false;
        }

        entries.push(listener);
        true
    }

    /// Removes a listener by identity.
    ///
    /// Returns true iff the listener was present.
    pub fn remove(&self, listener: &Listener<C>) -> bool {
        let mut entries = self.entries.borrow_mut();
        let len = entries.len();
        entries.retain(|entry| entry.key != listener.key);
        entries.len() != len
    }

    /// Returns the number of registered listeners.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if no listeners are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Removes all listeners.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Notifies every live listener, pruning invalid ones.
    ///
    /// Each listener is checked for invalidity both before and after it is
    /// invoked. Panics raised by a callback are not caught; they abort
    /// delivery to the remaining listeners in this round.
    pub fn notify(&self, invoke: impl Fn(&C)) {
        let snapshot: Vec<Listener<C>> = self.entries.borrow().clone();

        for listener in snapshot {
            if listener.is_invalid() {
                self.discard(listener.key);
                continue;
            }

            let Some(callback) = listener.callback() else {
                self.discard(listener.key);
                continue;
            };

            invoke(&callback);
            if listener.is_invalid() {
                self.discard(listener.key);
            }
        }
    }

    fn discard(&self, key: *const ()) {
        self.entries.borrow_mut().retain(|entry| entry.key != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[test]
    fn test_add_rejects_duplicates() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::new();
        let listener = InvalidationListener::new(|| {});

        assert!(set.add(listener.clone()));
        assert!(!set.add(listener.clone()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::new();
        let listener = InvalidationListener::new(|| {});

        set.add(listener.clone());
        assert!(set.remove(&listener));
        assert!(!set.remove(&listener));
        assert!(set.is_empty());
    }

    #[test]
    fn test_notify_all() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::new();
        let count = Rc::new(RefCell::new(0));

        for _ in 0..3 {
            let count = count.clone();
            set.add(InvalidationListener::new(move || {
                *count.borrow_mut() += 1;
            }));
        }

        set.notify(|callback| callback());
        assert_eq!(*count.borrow(), 3);
    }

    #[test]
    fn test_distinct_closures_are_distinct_listeners() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::new();

        assert!(set.add(InvalidationListener::new(|| {})));
        assert!(set.add(InvalidationListener::new(|| {})));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_weak_handle_is_pruned_after_drop() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::new();
        let count = Rc::new(RefCell::new(0));

        let strong = {
            let count = count.clone();
            InvalidationListener::new(move || {
                *count.borrow_mut() += 1;
            })
        };

        set.add(strong.downgrade());
        set.notify(|callback| callback());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(set.len(), 1);

        drop(strong);
        set.notify(|callback| callback());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_weak_and_strong_share_identity() {
        let set: ListenerSet<dyn Fn()> = ListenerSet::new();
        let listener = InvalidationListener::new(|| {});

        assert!(set.add(listener.downgrade()));
        assert!(!set.add(listener.clone()));
        assert!(set.remove(&listener));
        assert!(set.is_empty());
    }

    #[test]
    fn test_listener_may_remove_itself_during_notify() {
        let set = Rc::new(ListenerSet::<dyn Fn()>::new());
        let count = Rc::new(RefCell::new(0));

        let slot: Rc<RefCell<Option<InvalidationListener>>> = Rc::new(RefCell::new(None));
        let listener = {
            let set = set.clone();
            let count = count.clone();
            let slot = slot.clone();
            InvalidationListener::new(move || {
                *count.borrow_mut() += 1;
                let own = slot.borrow().clone().unwrap();
                set.remove(&own);
            })
        };
        *slot.borrow_mut() = Some(listener.clone());

        set.add(listener);
        set.notify(|callback| callback());
        set.notify(|callback| callback());

        assert_eq!(*count.borrow(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_listener_added_during_notify_waits_for_next_round() {
        let set = Rc::new(ListenerSet::<dyn Fn()>::new());
        let late_calls = Rc::new(RefCell::new(0));

        let first = {
            let set = set.clone();
            let late_calls = late_calls.clone();
            InvalidationListener::new(move || {
                let late_calls = late_calls.clone();
                set.add(InvalidationListener::new(move || {
                    *late_calls.borrow_mut() += 1;
                }));
            })
        };

        set.add(first);
        set.notify(|callback| callback());
        assert_eq!(*late_calls.borrow(), 0);

        set.notify(|callback| callback());
        assert_eq!(*late_calls.borrow(), 1);
    }

    #[test]
    fn test_change_listener_receives_old_and_new() {
        let set: ListenerSet<dyn Fn(&i32, &i32)> = ListenerSet::new();
        let seen = Rc::new(RefCell::new((0, 0)));

        {
            let seen = seen.clone();
            set.add(ChangeListener::new(move |old: &i32, new: &i32| {
                *seen.borrow_mut() = (*old, *new);
            }));
        }

        set.notify(|callback| callback(&1, &2));
        assert_eq!(*seen.borrow(), (1, 2));
    }
}
