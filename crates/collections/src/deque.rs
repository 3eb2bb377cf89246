//! Observable deques.
//!
//! A deque change is a chronological list of insertions and removals, each
//! tagged with the site of the mutation: the head, the tail, or an opaque
//! position for iterator-driven and bulk removal where the exact end is
//! indeterminate. Adjacent entries of the same kind and site are merged.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use argus_core::{InvalidationListener, Listener, ListenerSet, Observable, ObservableId};

/// Callback handle invoked with an aggregated deque change.
pub type DequeChangeListener<E> = Listener<dyn Fn(&DequeChange<E>)>;

/// The structural location at which a deque mutation occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Site {
    /// The mutation occurred at the head of the deque.
    Head,
    /// The mutation occurred at the tail of the deque.
    Tail,
    /// The exact end is indeterminate (iterator-driven or bulk removal).
    Opaque,
}

/// A change local to one site of a deque.
#[derive(Clone, Debug, PartialEq)]
pub enum DequeLocalChange<E> {
    /// One or more elements were inserted at `site`, in chronological order.
    Insertion { site: Site, elements: Vec<E> },
    /// One or more elements were removed at `site`, in chronological order.
    Removal { site: Site, elements: Vec<E> },
}

/// The net effect of one deque transaction.
///
/// Local changes preserve the chronological order of the mutations within
/// the transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct DequeChange<E> {
    /// The local changes, in chronological order.
    pub local_changes: Vec<DequeLocalChange<E>>,
}

impl<E: 'static> DequeChange<E> {
    /// Creates a change listener from a closure.
    pub fn listener(callback: impl Fn(&DequeChange<E>) + 'static) -> DequeChangeListener<E> {
        let callback: Rc<dyn Fn(&DequeChange<E>)> = Rc::new(callback);
        Listener::wrap(callback)
    }
}

struct DequeChangeBuilder<E> {
    local_changes: Vec<DequeLocalChange<E>>,
    depth: usize,
}

impl<E: Clone + 'static> DequeChangeBuilder<E> {
    fn new() -> Self {
        Self {
            local_changes: Vec::new(),
            depth: 0,
        }
    }

    fn log_insert(&mut self, site: Site, element: E) {
        if let Some(DequeLocalChange::Insertion {
            site: last_site,
            elements,
        }) = self.local_changes.last_mut()
        {
            if *last_site == site {
                elements.push(element);
                return;
            }
        }

        self.local_changes.push(DequeLocalChange::Insertion {
            site,
            elements: alloc::vec![element],
        });
    }

    fn log_remove(&mut self, site: Site, element: E) {
        if let Some(DequeLocalChange::Removal {
            site: last_site,
            elements,
        }) = self.local_changes.last_mut()
        {
            if *last_site == site {
                elements.push(element);
                return;
            }
        }

        self.local_changes.push(DequeLocalChange::Removal {
            site,
            elements: alloc::vec![element],
        });
    }

    fn build(self) -> Option<DequeChange<E>> {
        if self.local_changes.is_empty() {
            return None;
        }

        Some(DequeChange {
            local_changes: self.local_changes,
        })
    }
}

struct DequeInner<E: Clone + PartialEq + 'static> {
    items: RefCell<VecDeque<E>>,
    builder: RefCell<Option<DequeChangeBuilder<E>>>,
    change_listeners: ListenerSet<dyn Fn(&DequeChange<E>)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

/// An observable deque.
///
/// Handles are cheap to clone and share the same backing store. Every
/// mutation emits exactly one `DequeChange` per outermost transaction.
pub struct ObservableDeque<E: Clone + PartialEq + 'static> {
    inner: Rc<DequeInner<E>>,
}

impl<E: Clone + PartialEq + 'static> Clone for ObservableDeque<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + PartialEq + 'static> Default for ObservableDeque<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + PartialEq + 'static> From<VecDeque<E>> for ObservableDeque<E> {
    /// Wraps an existing deque without emitting any change.
    fn from(items: VecDeque<E>) -> Self {
        Self {
            inner: Rc::new(DequeInner {
                items: RefCell::new(items),
                builder: RefCell::new(None),
                change_listeners: ListenerSet::new(),
                invalidation_listeners: ListenerSet::new(),
            }),
        }
    }
}

impl<E: Clone + PartialEq + 'static> ObservableDeque<E> {
    /// Creates a new empty observable deque.
    pub fn new() -> Self {
        Self::from(VecDeque::new())
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the deque is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the head element.
    pub fn front(&self) -> Option<E> {
        self.inner.items.borrow().front().cloned()
    }

    /// Returns a clone of the tail element.
    pub fn back(&self) -> Option<E> {
        self.inner.items.borrow().back().cloned()
    }

    /// Returns a snapshot of the current contents, head first.
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.items.borrow().iter().cloned().collect()
    }

    /// Returns true if the deque contains `element`.
    pub fn contains(&self, element: &E) -> bool {
        self.inner.items.borrow().contains(element)
    }

    /// Opens a transaction frame.
    ///
    /// Nested frames share one change builder; the aggregated change is
    /// emitted when the outermost frame is dropped.
    pub fn begin_change(&self) -> DequeTransaction<E> {
        {
            let mut builder = self.inner.builder.borrow_mut();
            builder.get_or_insert_with(DequeChangeBuilder::new).depth += 1;
        }

        DequeTransaction {
            inner: self.inner.clone(),
        }
    }

    fn with_builder(&self, log: impl FnOnce(&mut DequeChangeBuilder<E>)) {
        if let Some(builder) = self.inner.builder.borrow_mut().as_mut() {
            log(builder);
        }
    }

    /// Inserts an element at the head.
    pub fn push_front(&self, element: E) {
        self.inner.items.borrow_mut().push_front(element.clone());

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_insert(Site::Head, element));
    }

    /// Inserts an element at the tail.
    pub fn push_back(&self, element: E) {
        self.inner.items.borrow_mut().push_back(element.clone());

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_insert(Site::Tail, element));
    }

    /// Removes and returns the head element.
    pub fn pop_front(&self) -> Option<E> {
        let removed = self.inner.items.borrow_mut().pop_front();

        if let Some(element) = &removed {
            let _tx = self.begin_change();
            self.with_builder(|builder| builder.log_remove(Site::Head, element.clone()));
        }

        removed
    }

    /// Removes and returns the tail element.
    pub fn pop_back(&self) -> Option<E> {
        let removed = self.inner.items.borrow_mut().pop_back();

        if let Some(element) = &removed {
            let _tx = self.begin_change();
            self.with_builder(|builder| builder.log_remove(Site::Tail, element.clone()));
        }

        removed
    }

    /// Removes the first occurrence of `element`, scanning from the head.
    ///
    /// The removal is reported with an opaque site. Returns true if the deque
    /// was modified.
    pub fn remove_first_occurrence(&self, element: &E) -> bool {
        let position = {
            let items = self.inner.items.borrow();
            items.iter().position(|item| item == element)
        };

        match position {
            Some(index) => {
                self.inner.items.borrow_mut().remove(index);

                let _tx = self.begin_change();
                self.with_builder(|builder| builder.log_remove(Site::Opaque, element.clone()));
                true
            }
            None => false,
        }
    }

    /// Removes the last occurrence of `element`, scanning from the tail.
    ///
    /// The removal is reported with an opaque site. Returns true if the deque
    /// was modified.
    pub fn remove_last_occurrence(&self, element: &E) -> bool {
        let position = {
            let items = self.inner.items.borrow();
            items.iter().rposition(|item| item == element)
        };

        match position {
            Some(index) => {
                self.inner.items.borrow_mut().remove(index);

                let _tx = self.begin_change();
                self.with_builder(|builder| builder.log_remove(Site::Opaque, element.clone()));
                true
            }
            None => false,
        }
    }

    /// Removes all elements in one transaction, reported with an opaque site.
    pub fn clear(&self) {
        let removed: Vec<E> = self.to_vec();
        if removed.is_empty() {
            return;
        }

        self.inner.items.borrow_mut().clear();

        let _tx = self.begin_change();
        self.with_builder(|builder| {
            for element in removed {
                builder.log_remove(Site::Opaque, element);
            }
        });
    }

    /// Appends every element at the tail in one transaction.
    pub fn extend(&self, elements: impl IntoIterator<Item = E>) {
        let _tx = self.begin_change();
        for element in elements {
            self.push_back(element);
        }
    }

    /// Adds a change listener.
    ///
    /// Returns true iff the listener was not already registered.
    pub fn add_change_listener(&self, listener: DequeChangeListener<E>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &DequeChangeListener<E>) -> bool {
        self.inner.change_listeners.remove(listener)
    }

    /// Returns a read-through, unmodifiable view of this deque.
    pub fn unmodifiable_view(&self) -> DequeView<E> {
        DequeView {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + PartialEq + 'static> Observable for ObservableDeque<E> {
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

/// An open transaction frame on an observable deque.
pub struct DequeTransaction<E: Clone + PartialEq + 'static> {
    inner: Rc<DequeInner<E>>,
}

impl<E: Clone + PartialEq + 'static> Drop for DequeTransaction<E> {
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

/// A read-through, unmodifiable view of an observable deque.
pub struct DequeView<E: Clone + PartialEq + 'static> {
    inner: Rc<DequeInner<E>>,
}

impl<E: Clone + PartialEq + 'static> Clone for DequeView<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + PartialEq + 'static> DequeView<E> {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the deque is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the head element.
    pub fn front(&self) -> Option<E> {
        self.inner.items.borrow().front().cloned()
    }

    /// Returns a clone of the tail element.
    pub fn back(&self) -> Option<E> {
        self.inner.items.borrow().back().cloned()
    }

    /// Returns a snapshot of the current contents, head first.
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.items.borrow().iter().cloned().collect()
    }

    /// Adds a change listener.
    pub fn add_change_listener(&self, listener: DequeChangeListener<E>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &DequeChangeListener<E>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}

impl<E: Clone + PartialEq + 'static> Observable for DequeView<E> {
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
    use alloc::vec;

    fn collect_changes<E: Clone + PartialEq + 'static>(
        deque: &ObservableDeque<E>,
    ) -> Rc<RefCell<Vec<DequeChange<E>>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        deque.add_change_listener(DequeChange::listener(move |change: &DequeChange<E>| {
            sink.borrow_mut().push(change.clone());
        }));
        changes
    }

    #[test]
    fn test_push_front_and_back_report_sites() {
        let deque = ObservableDeque::new();
        let changes = collect_changes(&deque);

        deque.push_front(1);
        deque.push_back(2);

        assert_eq!(deque.to_vec(), [1, 2]);
        assert_eq!(
            *changes.borrow(),
            [
                DequeChange {
                    local_changes: vec![DequeLocalChange::Insertion {
                        site: Site::Head,
                        elements: vec![1]
                    }]
                },
                DequeChange {
                    local_changes: vec![DequeLocalChange::Insertion {
                        site: Site::Tail,
                        elements: vec![2]
                    }]
                },
            ]
        );
    }

    #[test]
    fn test_pop_reports_sites() {
        let deque = ObservableDeque::from(VecDeque::from([1, 2, 3]));
        let changes = collect_changes(&deque);

        assert_eq!(deque.pop_front(), Some(1));
        assert_eq!(deque.pop_back(), Some(3));

        assert_eq!(
            *changes.borrow(),
            [
                DequeChange {
                    local_changes: vec![DequeLocalChange::Removal {
                        site: Site::Head,
                        elements: vec![1]
                    }]
                },
                DequeChange {
                    local_changes: vec![DequeLocalChange::Removal {
                        site: Site::Tail,
                        elements: vec![3]
                    }]
                },
            ]
        );
    }

    #[test]
    fn test_pop_empty_is_a_noop() {
        let deque: ObservableDeque<i32> = ObservableDeque::new();
        let changes = collect_changes(&deque);

        assert_eq!(deque.pop_front(), None);
        assert_eq!(deque.pop_back(), None);
        assert!(changes.borrow().is_empty());
    }

    #[test]
    fn test_adjacent_same_site_entries_merge() {
        let deque = ObservableDeque::new();
        let changes = collect_changes(&deque);

        deque.extend([1, 2, 3]);

        assert_eq!(
            *changes.borrow(),
            [DequeChange {
                local_changes: vec![DequeLocalChange::Insertion {
                    site: Site::Tail,
                    elements: vec![1, 2, 3]
                }]
            }]
        );
    }

    #[test]
    fn test_chronological_order_is_preserved_across_sites() {
        let deque = ObservableDeque::new();
        let changes = collect_changes(&deque);

        {
            let _tx = deque.begin_change();
            deque.push_back(1);
            deque.push_front(0);
            deque.push_back(2);
        }

        assert_eq!(deque.to_vec(), [0, 1, 2]);
        assert_eq!(
            *changes.borrow(),
            [DequeChange {
                local_changes: vec![
                    DequeLocalChange::Insertion {
                        site: Site::Tail,
                        elements: vec![1]
                    },
                    DequeLocalChange::Insertion {
                        site: Site::Head,
                        elements: vec![0]
                    },
                    DequeLocalChange::Insertion {
                        site: Site::Tail,
                        elements: vec![2]
                    },
                ]
            }]
        );
    }

    #[test]
    fn test_remove_first_occurrence_is_opaque() {
        let deque = ObservableDeque::from(VecDeque::from([1, 2, 1]));
        let changes = collect_changes(&deque);

        assert!(deque.remove_first_occurrence(&1));
        assert_eq!(deque.to_vec(), [2, 1]);

        assert_eq!(
            *changes.borrow(),
            [DequeChange {
                local_changes: vec![DequeLocalChange::Removal {
                    site: Site::Opaque,
                    elements: vec![1]
                }]
            }]
        );

        assert!(!deque.remove_first_occurrence(&7));
        assert_eq!(changes.borrow().len(), 1);
    }

    #[test]
    fn test_remove_last_occurrence_scans_from_tail() {
        let deque = ObservableDeque::from(VecDeque::from([1, 2, 1]));

        assert!(deque.remove_last_occurrence(&1));
        assert_eq!(deque.to_vec(), [1, 2]);
    }

    #[test]
    fn test_clear_emits_one_merged_opaque_removal() {
        let deque = ObservableDeque::from(VecDeque::from([1, 2, 3]));
        let changes = collect_changes(&deque);

        deque.clear();

        assert!(deque.is_empty());
        assert_eq!(
            *changes.borrow(),
            [DequeChange {
                local_changes: vec![DequeLocalChange::Removal {
                    site: Site::Opaque,
                    elements: vec![1, 2, 3]
                }]
            }]
        );
    }

    #[test]
    fn test_view_observes_changes() {
        let deque = ObservableDeque::new();
        let view = deque.unmodifiable_view();
        let fired = Rc::new(RefCell::new(0));

        {
            let fired = fired.clone();
            view.add_change_listener(DequeChange::listener(move |_: &DequeChange<i32>| {
                *fired.borrow_mut() += 1;
            }));
        }

        deque.push_back(1);
        assert_eq!(view.back(), Some(1));
        assert_eq!(*fired.borrow(), 1);
    }
}
