//! Observable lists.
//!
//! Every structural mutation routes through a transaction-scoped change
//! builder. The builder keeps edits in pre-transaction coordinates, merging
//! overlapping and adjacent edits and cancelling insert-then-remove pairs, so
//! one logical operation emits exactly one compressed `ListChange` no matter
//! how many nested mutations produced it.
//!
//! Reordering is special-cased: a transaction consisting solely of index
//! movements (a sort) is reported as a single `Permutation` instead of
//! remove+insert pairs. Mixing reordering with structural edits degrades the
//! permutation into ordinary update operations.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;

use argus_core::{InvalidationListener, Listener, ListenerSet, Observable, ObservableId};

/// Callback handle invoked with an aggregated list change.
pub type ListChangeListener<E> = Listener<dyn Fn(&ListChange<E>)>;

/// A change to a part of a list.
///
/// Local changes are ordered ascending and non-overlapping; each index refers
/// to the list state after all preceding local changes have been applied, so
/// replaying them in order over the old state reproduces the new state.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalChange<E> {
    /// One or more subsequent elements were inserted, starting at `index`.
    Insertion { index: usize, elements: Vec<E> },
    /// One or more subsequent elements were removed, starting at `index`.
    Removal { index: usize, elements: Vec<E> },
    /// One or more subsequent elements were replaced, starting at `index`.
    Update {
        index: usize,
        old_elements: Vec<E>,
        new_elements: Vec<E>,
    },
}

/// The net effect of one list transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum ListChange<E> {
    /// The elements were rearranged without any identity change.
    ///
    /// `indices[old]` is the new index of the element previously at `old`.
    Permutation { indices: Vec<usize> },
    /// One or more local updates to parts of the list.
    Update { local_changes: Vec<LocalChange<E>> },
}

impl<E: 'static> ListChange<E> {
    /// Creates a change listener from a closure.
    pub fn listener(callback: impl Fn(&ListChange<E>) + 'static) -> ListChangeListener<E> {
        let callback: Rc<dyn Fn(&ListChange<E>)> = Rc::new(callback);
        Listener::wrap(callback)
    }
}

/// A pending edit in pre-transaction coordinates: at original position `at`,
/// `removed` original elements are gone and `added` elements are in place.
struct Entry<E> {
    at: usize,
    removed: Vec<E>,
    added: Vec<E>,
}

struct PermutationLog<E> {
    indices: Vec<usize>,
    before: Vec<E>,
}

/// Accumulates the raw edits of one transaction and compresses them into the
/// public `ListChange` shape.
///
/// Invariant: `entries` is sorted by `at` with non-overlapping original
/// ranges, and `permutation` is only present while `entries` is empty.
struct ListChangeBuilder<E> {
    entries: Vec<Entry<E>>,
    permutation: Option<PermutationLog<E>>,
    depth: usize,
}

impl<E: Clone + PartialEq + 'static> ListChangeBuilder<E> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            permutation: None,
            depth: 0,
        }
    }

    fn log_insert(&mut self, index: usize, elements: Vec<E>) {
        self.flatten_permutation();

        let mut shift: isize = 0;
        let mut slot = self.entries.len();

        for (position, entry) in self.entries.iter_mut().enumerate() {
            let start = (entry.at as isize + shift) as usize;
            let end = start + entry.added.len();

            if index < start {
                slot = position;
                break;
            }

            if index <= end {
                let offset = index - start;
                for (k, element) in elements.into_iter().enumerate() {
                    entry.added.insert(offset + k, element);
                }
                return;
            }

            shift += entry.added.len() as isize - entry.removed.len() as isize;
        }

        let at = (index as isize - shift) as usize;
        self.entries.insert(
            slot,
            Entry {
                at,
                removed: Vec::new(),
                added: elements,
            },
        );
    }

    fn log_remove(&mut self, index: usize, element: E) {
        self.flatten_permutation();

        let mut shift: isize = 0;
        let mut slot = self.entries.len();

        for (position, entry) in self.entries.iter_mut().enumerate() {
            let start = (entry.at as isize + shift) as usize;
            let end = start + entry.added.len();

            if index < start {
                slot = position;
                break;
            }

            if index < end {
                // Removing an element inserted within this transaction: the
                // two edits cancel.
                entry.added.remove(index - start);
                if entry.added.is_empty() && entry.removed.is_empty() {
                    self.entries.remove(position);
                }
                return;
            }

            if index == end {
                // The original element directly after this entry's range.
                entry.removed.push(element);
                return;
            }

            shift += entry.added.len() as isize - entry.removed.len() as isize;
        }

        let at = (index as isize - shift) as usize;
        self.entries.insert(
            slot,
            Entry {
                at,
                removed: alloc::vec![element],
                added: Vec::new(),
            },
        );
    }

    fn log_update(&mut self, index: usize, old: E, new: E) {
        self.log_remove(index, old);
        self.log_insert(index, alloc::vec![new]);
    }

    /// Records a reordering of the current list.
    ///
    /// `indices[old]` is the new position of the element previously at `old`;
    /// `before` is the pre-reorder snapshot. Permutation and structural edits
    /// are mutually exclusive within one transaction: when edits are already
    /// present (or arrive later) the permutation degrades into per-index
    /// updates.
    fn log_permutation(&mut self, indices: Vec<usize>, before: Vec<E>) {
        if self.entries.is_empty() {
            match &mut self.permutation {
                None => self.permutation = Some(PermutationLog { indices, before }),
                Some(existing) => {
                    existing.indices = existing
                        .indices
                        .iter()
                        .map(|&intermediate| indices[intermediate])
                        .collect();
                }
            }
        } else {
            self.degrade_into_updates(indices, before);
        }
    }

    fn flatten_permutation(&mut self) {
        if let Some(permutation) = self.permutation.take() {
            self.degrade_into_updates(permutation.indices, permutation.before);
        }
    }

    fn degrade_into_updates(&mut self, indices: Vec<usize>, before: Vec<E>) {
        let mut after: Vec<Option<E>> = (0..before.len()).map(|_| None).collect();
        for (old_pos, &new_pos) in indices.iter().enumerate() {
            after[new_pos] = Some(before[old_pos].clone());
        }

        for (index, slot) in after.into_iter().enumerate() {
            if let Some(element) = slot {
                if before[index] != element {
                    self.log_update(index, before[index].clone(), element);
                }
            }
        }
    }

    fn build(self) -> Option<ListChange<E>> {
        if let Some(permutation) = self.permutation {
            if permutation
                .indices
                .iter()
                .enumerate()
                .all(|(old, &new)| old == new)
            {
                return None;
            }

            return Some(ListChange::Permutation {
                indices: permutation.indices,
            });
        }

        if self.entries.is_empty() {
            return None;
        }

        // Coalesce entries whose original ranges are contiguous.
        let mut coalesced: Vec<Entry<E>> = Vec::new();
        for entry in self.entries {
            match coalesced.last_mut() {
                Some(last) if entry.at == last.at + last.removed.len() => {
                    last.removed.extend(entry.removed);
                    last.added.extend(entry.added);
                }
                _ => coalesced.push(entry),
            }
        }

        let mut local_changes = Vec::new();
        let mut shift: isize = 0;

        for entry in coalesced {
            let index = (entry.at as isize + shift) as usize;
            shift += entry.added.len() as isize - entry.removed.len() as isize;

            if entry.removed.is_empty() {
                local_changes.push(LocalChange::Insertion {
                    index,
                    elements: entry.added,
                });
            } else if entry.added.is_empty() {
                local_changes.push(LocalChange::Removal {
                    index,
                    elements: entry.removed,
                });
            } else if entry.removed.len() == entry.added.len() {
                local_changes.push(LocalChange::Update {
                    index,
                    old_elements: entry.removed,
                    new_elements: entry.added,
                });
            } else {
                local_changes.push(LocalChange::Removal {
                    index,
                    elements: entry.removed,
                });
                local_changes.push(LocalChange::Insertion {
                    index,
                    elements: entry.added,
                });
            }
        }

        Some(ListChange::Update { local_changes })
    }
}

struct ListInner<E: Clone + PartialEq + 'static> {
    items: RefCell<Vec<E>>,
    builder: RefCell<Option<ListChangeBuilder<E>>>,
    change_listeners: ListenerSet<dyn Fn(&ListChange<E>)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

/// An observable list.
///
/// Handles are cheap to clone and share the same backing store. Every
/// mutation emits exactly one `ListChange` per outermost transaction; change
/// listeners are notified strictly before invalidation listeners.
///
/// # Example
///
/// ```rust
/// use argus_collections::{ListChange, ObservableList};
///
/// let list = ObservableList::new();
/// list.add_change_listener(ListChange::listener(|change: &ListChange<i32>| {
///     // one aggregated change per transaction
/// }));
///
/// list.push(1);
/// list.push(2);
/// ```
pub struct ObservableList<E: Clone + PartialEq + 'static> {
    inner: Rc<ListInner<E>>,
}

impl<E: Clone + PartialEq + 'static> Clone for ObservableList<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + PartialEq + 'static> Default for ObservableList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + PartialEq + 'static> From<Vec<E>> for ObservableList<E> {
    /// Wraps an existing vector without emitting any change.
    fn from(items: Vec<E>) -> Self {
        Self {
            inner: Rc::new(ListInner {
                items: RefCell::new(items),
                builder: RefCell::new(None),
                change_listeners: ListenerSet::new(),
                invalidation_listeners: ListenerSet::new(),
            }),
        }
    }
}

impl<E: Clone + PartialEq + 'static> ObservableList<E> {
    /// Creates a new empty observable list.
    pub fn new() -> Self {
        Self::from(Vec::new())
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<E> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Returns a snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.items.borrow().clone()
    }

    /// Returns true if the list contains `element`.
    pub fn contains(&self, element: &E) -> bool {
        self.inner.items.borrow().contains(element)
    }

    /// Returns the index of the first occurrence of `element`.
    pub fn index_of(&self, element: &E) -> Option<usize> {
        self.inner.items.borrow().iter().position(|item| item == element)
    }

    /// Returns an iterator over a snapshot of the current contents.
    pub fn iter(&self) -> impl Iterator<Item = E> {
        self.to_vec().into_iter()
    }

    /// Opens a transaction frame.
    ///
    /// Nested frames share one change builder; the aggregated change is
    /// emitted when the outermost frame is dropped. Use this to group custom
    /// bulk operations into a single change.
    pub fn begin_change(&self) -> ListTransaction<E> {
        {
            let mut builder = self.inner.builder.borrow_mut();
            builder.get_or_insert_with(ListChangeBuilder::new).depth += 1;
        }

        ListTransaction {
            inner: self.inner.clone(),
        }
    }

    fn with_builder(&self, log: impl FnOnce(&mut ListChangeBuilder<E>)) {
        if let Some(builder) = self.inner.builder.borrow_mut().as_mut() {
            log(builder);
        }
    }

    /// Appends an element.
    pub fn push(&self, element: E) {
        self.insert(self.len(), element);
    }

    /// Inserts an element at `index`.
    ///
    /// Panics if `index > len`, like `Vec::insert`.
    pub fn insert(&self, index: usize, element: E) {
        self.inner.items.borrow_mut().insert(index, element.clone());

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_insert(index, alloc::vec![element]));
    }

    /// Removes and returns the element at `index`.
    ///
    /// Panics if `index >= len`, like `Vec::remove`.
    pub fn remove(&self, index: usize) -> E {
        let removed = self.inner.items.borrow_mut().remove(index);

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_remove(index, removed.clone()));

        removed
    }

    /// Removes the first occurrence of `element`.
    ///
    /// Returns true if the list was modified.
    pub fn remove_item(&self, element: &E) -> bool {
        match self.index_of(element) {
            Some(index) => {
                self.remove(index);
                true
            }
            None => false,
        }
    }

    /// Replaces the element at `index`, returning the previous element.
    ///
    /// Replacing an element with an equal one is a no-op and emits nothing.
    /// Panics if `index >= len`.
    pub fn set(&self, index: usize, element: E) -> E {
        {
            let items = self.inner.items.borrow();
            if items[index] == element {
                return element;
            }
        }

        let old = core::mem::replace(&mut self.inner.items.borrow_mut()[index], element.clone());

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_update(index, old.clone(), element));

        old
    }

    /// Removes all elements in one transaction.
    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }

        let _tx = self.begin_change();
        while !self.is_empty() {
            self.remove(self.len() - 1);
        }
    }

    /// Appends every element in one transaction.
    pub fn extend(&self, elements: impl IntoIterator<Item = E>) {
        let _tx = self.begin_change();
        for element in elements {
            self.push(element);
        }
    }

    /// Keeps only the elements matching the predicate, in one transaction.
    pub fn retain(&self, predicate: impl Fn(&E) -> bool) {
        let _tx = self.begin_change();
        let mut index = 0;
        while index < self.len() {
            let keep = predicate(&self.inner.items.borrow()[index]);
            if keep {
                index += 1;
            } else {
                self.remove(index);
            }
        }
    }

    /// Replaces the entire contents.
    ///
    /// Returns false, emitting nothing, when the new contents equal the
    /// current ones.
    pub fn set_all(&self, elements: Vec<E>) -> bool {
        if *self.inner.items.borrow() == elements {
            return false;
        }

        let _tx = self.begin_change();
        self.clear();
        self.extend(elements);
        true
    }

    /// Sorts the list, emitting a single `Permutation`.
    pub fn sort(&self)
    where
        E: Ord,
    {
        self.sort_by(|a, b| a.cmp(b));
    }

    /// Sorts the list by a comparator, emitting a single `Permutation`.
    ///
    /// Sorting an already sorted list emits nothing. The sort is stable.
    pub fn sort_by(&self, compare: impl Fn(&E, &E) -> Ordering) {
        let before = self.to_vec();

        let mut order: Vec<usize> = (0..before.len()).collect();
        order.sort_by(|&a, &b| compare(&before[a], &before[b]));

        let mut indices = alloc::vec![0usize; before.len()];
        for (new_pos, &old_pos) in order.iter().enumerate() {
            indices[old_pos] = new_pos;
        }

        if indices.iter().enumerate().all(|(old, &new)| old == new) {
            return;
        }

        *self.inner.items.borrow_mut() = order.iter().map(|&old| before[old].clone()).collect();

        let _tx = self.begin_change();
        self.with_builder(|builder| builder.log_permutation(indices, before));
    }

    /// Adds a change listener.
    ///
    /// Returns true iff the listener was not already registered.
    pub fn add_change_listener(&self, listener: ListChangeListener<E>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &ListChangeListener<E>) -> bool {
        self.inner.change_listeners.remove(listener)
    }

    /// Returns a read-through, unmodifiable view of this list.
    pub fn unmodifiable_view(&self) -> ListView<E> {
        ListView {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + PartialEq + 'static> Observable for ObservableList<E> {
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

/// An open transaction frame on an observable list.
///
/// Dropping the outermost frame emits the aggregated change.
pub struct ListTransaction<E: Clone + PartialEq + 'static> {
    inner: Rc<ListInner<E>>,
}

impl<E: Clone + PartialEq + 'static> Drop for ListTransaction<E> {
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

/// A read-through, unmodifiable view of an observable list.
///
/// Mutations through the owning list remain visible and observable here; the
/// view itself exposes no mutators.
pub struct ListView<E: Clone + PartialEq + 'static> {
    inner: Rc<ListInner<E>>,
}

impl<E: Clone + PartialEq + 'static> Clone for ListView<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Clone + PartialEq + 'static> ListView<E> {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<E> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Returns a snapshot of the current contents.
    pub fn to_vec(&self) -> Vec<E> {
        self.inner.items.borrow().clone()
    }

    /// Adds a change listener.
    pub fn add_change_listener(&self, listener: ListChangeListener<E>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &ListChangeListener<E>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}

impl<E: Clone + PartialEq + 'static> Observable for ListView<E> {
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
