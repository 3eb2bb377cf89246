//! Observable sets.
//!
//! A set change is unordered and element-keyed: the net effect of one
//! transaction is a pair of added/removed element sets. An element added and
//! then removed within one transaction (or vice versa) cancels out and does
//! not appear in the emitted change at all.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;

use argus_core::{InvalidationListener, Listener, ListenerSet, Observable, ObservableId};
use hashbrown::HashSet;

/// Callback handle invoked with an aggregated set change.
pub type SetChangeListener<E> = Listener<dyn Fn(&SetChange<E>)>;

/// The net effect of one set transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct SetChange<E: Hash + Eq> {
    /// Elements that were added.
    pub added: HashSet<E>,
    /// Elements that were removed.
    pub removed: HashSet<E>,
}

impl<E: Hash + Eq + 'static> SetChange<E> {
    /// Creates a change listener from a closure.
    pub fn listener(callback: impl Fn(&SetChange<E>) + 'static) -> SetChangeListener<E> {
        let callback: Rc<dyn Fn(&SetChange<E>)> = Rc::new(callback);
        Listener::wrap(callback)
    }
}

struct SetChangeBuilder<E: Hash + Eq> {
    added: HashSet<E>,
    removed: HashSet<E>,
    depth: usize,
}

impl<E: Clone + Hash + Eq + 'static> SetChangeBuilder<E> {
    fn new() -> Self {
        Self {
            added: HashSet::new(),
            removed: HashSet::new(),
            depth: 0,
        }
    }

    fn log_add(&mut self, element: E) {
        /* Guard against spurious operations that add and remove the same
         * element within one transaction. */
        if !self.removed.remove(&element) {
            self.added.insert(element);
        }
    }

    fn log_remove(&mut self, element: E) {
        if !self.added.remove(&element) {
            self.removed.insert(element);
        }
    }

    fn build(self) -> Option<SetChange<E>> {
        if self.added.is_empty() && self.removed.is_empty() {
            return None;
        }

        Some(SetChange {
            added: self.added,
            removed: self.removed,
        })
    }
}

struct SetInner<E: Clone + Hash + Eq + 'static> {
    items: RefCell<HashSet<E>>,
    builder: RefCell<Option<SetChangeBuilder<E>>>,
    change_listeners: ListenerSet<dyn Fn(&SetChange<E>)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

/// An observable hash set.
///
/// Handles are cheap to clone and share the same backing store. Every
/// mutation emits exactly one `SetChange` per outermost transaction.
pub struct ObservableSet<E: Clone + Hash + Eq + 'static> {
    inner: Rc<SetInner<E>>,
}

impl<E: Clone + Hash + Eq + 'static> Clone for ObservableSet<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + Hash + Eq + 'static> Default for ObservableSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Hash + Eq + 'static> From<HashSet<E>> for ObservableSet<E> {
    /// Wraps an existing set without emitting any change.
    fn from(items: HashSet<E>) -> Self {
        Self {
            inner: Rc::new(SetInner {
                items: RefCell::new(items),
                builder: RefCell::new(None),
                change_listeners: ListenerSet::new(),
                invalidation_listeners: ListenerSet::new(),
            }),
        }
    }
}

impl<E: Clone + Hash + Eq + 'static> ObservableSet<E> {
    /// Creates a new empty observable set.
    pub fn new() -> Self {
        Self::from(HashSet::new())
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns true if the set contains `element`.
    pub fn contains(&self, element: &E) -> bool {
        self.inner.items.borrow().contains(element)
    }

    /// Returns a snapshot of the current contents.
    pub fn to_set(&self) -> HashSet<E> {
        self.inner.items.borrow().clone()
    }

    /// Opens a transaction frame.
    ///
    /// Nested frames share one change builder; the aggregated change is
    /// emitted when the outermost frame is dropped.
    pub fn begin_change(&self) -> SetTransaction<E> {
        {
            let mut builder = self.inner.builder.borrow_mut();
            builder.get_or_insert_with(SetChangeBuilder::new).depth += 1;
        }

        SetTransaction {
            inner: self.inner.clone(),
        }
    }

    fn with_builder(&self, log: impl FnOnce(&mut SetChangeBuilder<E>)) {
        if let Some(builder) = self.inner.builder.borrow_mut().as_mut() {
            log(builder);
        }
    }

    /// Inserts an element.
    ///
    /// Returns true if the set was modified; inserting a present element is a
    /// no-op and emits nothing.
    pub fn insert(&self, element: E) -> bool {
        if !self.inner.items.borrow_mut().insert(element.clone()) {
            return false;
        }

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_add(element));
        true
    }

    /// Removes an element.
    ///
    /// Returns true if the set was modified.
    pub fn remove(&self, element: &E) -> bool {
        if !self.inner.items.borrow_mut().remove(element) {
            return false;
        }

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_remove(element.clone()));
        true
    }

    /// Removes all elements in one transaction.
    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }

        let _tx = self.begin_change();
        let elements: Vec<E> = self.inner.items.borrow().iter().cloned().collect();
        for element in elements {
            self.remove(&element);
        }
    }

    /// Inserts every element in one transaction.
    pub fn extend(&self, elements: impl IntoIterator<Item = E>) {
        let _tx = self.begin_change();
        for element in elements {
            self.insert(element);
        }
    }

    /// Adds a change listener.
    ///
    /// Returns true iff the listener was not already registered.
    pub fn add_change_listener(&self, listener: SetChangeListener<E>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &SetChangeListener<E>) -> bool {
        self.inner.change_listeners.remove(listener)
    }

    /// Returns a read-through, unmodifiable view of this set.
    pub fn unmodifiable_view(&self) -> SetView<E> {
        SetView {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + Hash + Eq + 'static> Observable for ObservableSet<E> {
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

/// An open transaction frame on an observable set.
pub struct SetTransaction<E: Clone + Hash + Eq + 'static> {
    inner: Rc<SetInner<E>>,
}

impl<E: Clone + Hash + Eq + 'static> Drop for SetTransaction<E> {
    fn drop(&mut self) {
        let finished = {
            let mut slot = self.inner.builder.borrow_mut();
            match slot.as_mut() {
                Some(builder) => {
                    builder.depth -= 1;
                    if builder.depth == 0 {
                        slot.take()
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some(builder) = finished {
            if let Some(change) = builder.build() {
                self.inner.change_listeners.notify(|callback| callback(&change));
                self.inner.invalidation_listeners.notify(|callback| callback());
            }
        }
    }
}

/// A read-through, unmodifiable view of an observable set.
pub struct SetView<E: Clone + Hash + Eq + 'static> {
    inner: Rc<SetInner<E>>,
}

impl<E: Clone + Hash + Eq + 'static> Clone for SetView<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + Hash + Eq + 'static> SetView<E> {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns true if the set contains `element`.
    pub fn contains(&self, element: &E) -> bool {
        self.inner.items.borrow().contains(element)
    }

    /// Returns a snapshot of the current contents.
    pub fn to_set(&self) -> HashSet<E> {
        self.inner.items.borrow().clone()
    }

    /// Adds a change listener.
    pub fn add_change_listener(&self, listener: SetChangeListener<E>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &SetChangeListener<E>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}

impl<E: Clone + Hash + Eq + 'static> Observable for SetView<E> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn collect_changes<E: Clone + Hash + Eq + 'static>(
        set: &ObservableSet<E>,
    ) -> Rc<RefCell<Vec<SetChange<E>>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        set.add_change_listener(SetChange::listener(move |change: &SetChange<E>| {
            sink.borrow_mut().push(change.clone());
        }));
        changes
    }

    #[test]
    fn test_insert_emits_addition() {
        let set = ObservableSet::new();
        let changes = collect_changes(&set);

        assert!(set.insert(1));

        let borrowed = changes.borrow();
        assert_eq!(borrowed.len(), 1);
        assert!(borrowed[0].added.contains(&1));
        assert!(borrowed[0].removed.is_empty());
    }

    #[test]
    fn test_duplicate_insert_is_a_noop() {
        let set = ObservableSet::new();
        set.insert(1);

        let changes = collect_changes(&set);
        assert!(!set.insert(1));
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_remove_absent_element_is_a_noop() {
        let set: ObservableSet<i32> = ObservableSet::new();
        let changes = collect_changes(&set);

        assert!(!set.remove(&1));
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_add_then_remove_cancels() {
        let set = ObservableSet::new();
        let changes = collect_changes(&set);

        {
            let _tx = set.begin_change();
            set.insert(1);
            assert!(set.remove(&1));
        }

        assert!(changes.borrow().is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_then_add_cancels() {
        let set = ObservableSet::new();
        set.insert(1);

        let changes = collect_changes(&set);

        {
            let _tx = set.begin_change();
            set.remove(&1);
            set.insert(1);
        }

        assert!(changes.borrow().is_empty());
        assert!(set.contains(&1));
    }

    #[test]
    fn test_clear_emits_one_change() {
        let set = ObservableSet::new();
        set.extend([1, 2, 3]);

        let changes = collect_changes(&set);
        set.clear();

        let borrowed = changes.borrow();
        assert_eq!(borrowed.len(), 1);
        assert_eq!(borrowed[0].removed.len(), 3);
        assert!(borrowed[0].added.is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn test_extend_emits_one_change() {
        let set = ObservableSet::new();
        let changes = collect_changes(&set);

        set.extend([1, 2, 3]);

        let borrowed = changes.borrow();
        assert_eq!(borrowed.len(), 1);
        assert_eq!(borrowed[0].added.len(), 3);
    }

    #[test]
    fn test_invalidation_follows_change() {
        let set = ObservableSet::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        {
            let order = order.clone();
            set.add_change_listener(SetChange::listener(move |_: &SetChange<i32>| {
                order.borrow_mut().push("change");
            }));
        }
        {
            let order = order.clone();
            set.add_invalidation_listener(InvalidationListener::new(move || {
                order.borrow_mut().push("invalidation");
            }));
        }

        set.insert(1);
        assert_eq!(*order.borrow(), ["change", "invalidation"]);
    }

    #[test]
    fn test_view_observes_changes() {
        let set = ObservableSet::new();
        let view = set.unmodifiable_view();
        let fired = Rc::new(RefCell::new(0));

        {
            let fired = fired.clone();
            view.add_change_listener(SetChange::listener(move |_: &SetChange<i32>| {
                *fired.borrow_mut() += 1;
            }));
        }

        set.insert(1);
        assert!(view.contains(&1));
        assert_eq!(*fired.borrow(), 1);
    }
}
