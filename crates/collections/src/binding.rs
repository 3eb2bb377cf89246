//! Collection content binding adapters.
//!
//! Each adapter subscribes to an upstream observable collection's
//! invalidation and change streams, holding the strong listeners itself so
//! the upstream cannot keep the adapter alive past its owner's lifetime.
//! Raw changes are buffered in a FIFO; `get_changes` drains the buffer and
//! transforms each change element-wise through the owner-supplied mapping
//! function, deferring the transform until a consumer actually asks for it.
//!
//! `release` unsubscribes both listeners. It is a terminal operation; calling
//! it twice is a caller error.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;

use argus_core::{InvalidationListener, Observable};
use hashbrown::{HashMap, HashSet};

use crate::deque::{DequeChange, DequeChangeListener, DequeLocalChange, ObservableDeque};
use crate::list::{ListChange, ListChangeListener, LocalChange, ObservableList};
use crate::map::{MapChange, MapChangeListener, ObservableMap};
use crate::set::{ObservableSet, SetChange, SetChangeListener};

/// A content binding from an observable list.
pub struct ListBinding<S: Clone + PartialEq + 'static, E> {
    source: ObservableList<S>,
    buffer: Rc<RefCell<VecDeque<ListChange<S>>>>,
    transform: Box<dyn Fn(&S) -> E>,
    invalidation_listener: InvalidationListener,
    change_listener: ListChangeListener<S>,
}

impl<S: Clone + PartialEq + 'static, E> ListBinding<S, E> {
    /// Subscribes to `source`, buffering every change it emits.
    ///
    /// `invalidator` is invoked on every upstream invalidation.
    pub fn new(
        source: &ObservableList<S>,
        transform: impl Fn(&S) -> E + 'static,
        invalidator: impl Fn() + 'static,
    ) -> Self {
        let invalidation_listener = InvalidationListener::new(invalidator);
        source.add_invalidation_listener(invalidation_listener.downgrade());

        let buffer = Rc::new(RefCell::new(VecDeque::new()));
        let change_listener = {
            let buffer = buffer.clone();
            ListChange::listener(move |change: &ListChange<S>| {
                buffer.borrow_mut().push_back(change.clone());
            })
        };
        source.add_change_listener(change_listener.downgrade());

        Self {
            source: source.clone(),
            buffer,
            transform: Box::new(transform),
            invalidation_listener,
            change_listener,
        }
    }

    /// Drains the buffered changes, transformed, in original order.
    pub fn get_changes(&self) -> Vec<ListChange<E>> {
        self.buffer
            .borrow_mut()
            .drain(..)
            .map(|change| self.map_change(change))
            .collect()
    }

    /// Unsubscribes from the source.
    pub fn release(&self) {
        self.source
            .remove_invalidation_listener(&self.invalidation_listener);
        self.source.remove_change_listener(&self.change_listener);
    }

    fn map_change(&self, change: ListChange<S>) -> ListChange<E> {
        match change {
            ListChange::Permutation { indices } => ListChange::Permutation { indices },
            ListChange::Update { local_changes } => ListChange::Update {
                local_changes: local_changes
                    .into_iter()
                    .map(|local_change| self.map_local_change(local_change))
                    .collect(),
            },
        }
    }

    fn map_local_change(&self, local_change: LocalChange<S>) -> LocalChange<E> {
        let transform = &self.transform;
        match local_change {
            LocalChange::Insertion { index, elements } => LocalChange::Insertion {
                index,
                elements: elements.iter().map(|element| transform(element)).collect(),
            },
            LocalChange::Removal { index, elements } => LocalChange::Removal {
                index,
                elements: elements.iter().map(|element| transform(element)).collect(),
            },
            LocalChange::Update {
                index,
                old_elements,
                new_elements,
            } => LocalChange::Update {
                index,
                old_elements: old_elements.iter().map(|element| transform(element)).collect(),
                new_elements: new_elements.iter().map(|element| transform(element)).collect(),
            },
        }
    }
}

/// A content binding from an observable set.
pub struct SetBinding<S: Clone + Hash + Eq + 'static, E> {
    source: ObservableSet<S>,
    buffer: Rc<RefCell<VecDeque<SetChange<S>>>>,
    transform: Box<dyn Fn(&S) -> E>,
    invalidation_listener: InvalidationListener,
    change_listener: SetChangeListener<S>,
}

impl<S, E> SetBinding<S, E>
where
    S: Clone + Hash + Eq + 'static,
    E: Hash + Eq,
{
    /// Subscribes to `source`, buffering every change it emits.
    pub fn new(
        source: &ObservableSet<S>,
        transform: impl Fn(&S) -> E + 'static,
        invalidator: impl Fn() + 'static,
    ) -> Self {
        let invalidation_listener = InvalidationListener::new(invalidator);
        source.add_invalidation_listener(invalidation_listener.downgrade());

        let buffer = Rc::new(RefCell::new(VecDeque::new()));
        let change_listener = {
            let buffer = buffer.clone();
            SetChange::listener(move |change: &SetChange<S>| {
                buffer.borrow_mut().push_back(change.clone());
            })
        };
        source.add_change_listener(change_listener.downgrade());

        Self {
            source: source.clone(),
            buffer,
            transform: Box::new(transform),
            invalidation_listener,
            change_listener,
        }
    }

    /// Drains the buffered changes, transformed, in original order.
    pub fn get_changes(&self) -> Vec<SetChange<E>> {
        let transform = &self.transform;
        self.buffer
            .borrow_mut()
            .drain(..)
            .map(|change| SetChange {
                added: change.added.iter().map(|element| transform(element)).collect(),
                removed: change.removed.iter().map(|element| transform(element)).collect(),
            })
            .collect()
    }

    /// Unsubscribes from the source.
    pub fn release(&self) {
        self.source
            .remove_invalidation_listener(&self.invalidation_listener);
        self.source.remove_change_listener(&self.change_listener);
    }
}

/// A content binding from an observable map, transforming values.
pub struct MapBinding<K, S, V>
where
    K: Clone + Hash + Eq + 'static,
    S: Clone + PartialEq + 'static,
{
    source: ObservableMap<K, S>,
    buffer: Rc<RefCell<VecDeque<MapChange<K, S>>>>,
    transform: Box<dyn Fn(&S) -> V>,
    invalidation_listener: InvalidationListener,
    change_listener: MapChangeListener<K, S>,
}

impl<K, S, V> MapBinding<K, S, V>
where
    K: Clone + Hash + Eq + 'static,
    S: Clone + PartialEq + 'static,
{
    /// Subscribes to `source`, buffering every change it emits.
    pub fn new(
        source: &ObservableMap<K, S>,
        transform: impl Fn(&S) -> V + 'static,
        invalidator: impl Fn() + 'static,
    ) -> Self {
        let invalidation_listener = InvalidationListener::new(invalidator);
        source.add_invalidation_listener(invalidation_listener.downgrade());

        let buffer = Rc::new(RefCell::new(VecDeque::new()));
        let change_listener = {
            let buffer = buffer.clone();
            MapChange::listener(move |change: &MapChange<K, S>| {
                buffer.borrow_mut().push_back(change.clone());
            })
        };
        source.add_change_listener(change_listener.downgrade());

        Self {
            source: source.clone(),
            buffer,
            transform: Box::new(transform),
            invalidation_listener,
            change_listener,
        }
    }

    /// Drains the buffered changes with transformed values, in original
    /// order.
    pub fn get_changes(&self) -> Vec<MapChange<K, V>> {
        let transform = &self.transform;
        self.buffer
            .borrow_mut()
            .drain(..)
            .map(|change| MapChange {
                added: change
                    .added
                    .into_iter()
                    .map(|(key, value)| (key, transform(&value)))
                    .collect::<HashMap<K, V>>(),
                removed: change
                    .removed
                    .into_iter()
                    .map(|(key, value)| (key, transform(&value)))
                    .collect::<HashMap<K, V>>(),
                updated: change
                    .updated
                    .into_iter()
                    .map(|(key, (old, new))| (key, (transform(&old), transform(&new))))
                    .collect::<HashMap<K, (V, V)>>(),
            })
            .collect()
    }

    /// Unsubscribes from the source.
    pub fn release(&self) {
        self.source
            .remove_invalidation_listener(&self.invalidation_listener);
        self.source.remove_change_listener(&self.change_listener);
    }
}

/// A content binding from an observable deque.
pub struct DequeBinding<S: Clone + PartialEq + 'static, E> {
    source: ObservableDeque<S>,
    buffer: Rc<RefCell<VecDeque<DequeChange<S>>>>,
    transform: Box<dyn Fn(&S) -> E>,
    invalidation_listener: InvalidationListener,
    change_listener: DequeChangeListener<S>,
}

impl<S: Clone + PartialEq + 'static, E> DequeBinding<S, E> {
    /// Subscribes to `source`, buffering every change it emits.
    pub fn new(
        source: &ObservableDeque<S>,
        transform: impl Fn(&S) -> E + 'static,
        invalidator: impl Fn() + 'static,
    ) -> Self {
        let invalidation_listener = InvalidationListener::new(invalidator);
        source.add_invalidation_listener(invalidation_listener.downgrade());

        let buffer = Rc::new(RefCell::new(VecDeque::new()));
        let change_listener = {
            let buffer = buffer.clone();
            DequeChange::listener(move |change: &DequeChange<S>| {
                buffer.borrow_mut().push_back(change.clone());
            })
        };
        source.add_change_listener(change_listener.downgrade());

        Self {
            source: source.clone(),
            buffer,
            transform: Box::new(transform),
            invalidation_listener,
            change_listener,
        }
    }

    /// Drains the buffered changes, transformed, in original order.
    pub fn get_changes(&self) -> Vec<DequeChange<E>> {
        let transform = &self.transform;
        self.buffer
            .borrow_mut()
            .drain(..)
            .map(|change| DequeChange {
                local_changes: change
                    .local_changes
                    .into_iter()
                    .map(|local_change| match local_change {
                        DequeLocalChange::Insertion { site, elements } => {
                            DequeLocalChange::Insertion {
                                site,
                                elements: elements
                                    .iter()
                                    .map(|element| transform(element))
                                    .collect(),
                            }
                        }
                        DequeLocalChange::Removal { site, elements } => {
                            DequeLocalChange::Removal {
                                site,
                                elements: elements
                                    .iter()
                                    .map(|element| transform(element))
                                    .collect(),
                            }
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    /// Unsubscribes from the source.
    pub fn release(&self) {
        self.source
            .remove_invalidation_listener(&self.invalidation_listener);
        self.source.remove_change_listener(&self.change_listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};
    use alloc::vec;

    #[test]
    fn test_list_binding_buffers_and_transforms() {
        let source: ObservableList<i32> = ObservableList::new();
        let binding: ListBinding<i32, String> =
            ListBinding::new(&source, |element| element.to_string(), || {});

        source.push(1);
        source.push(2);

        let changes = binding.get_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0],
            ListChange::Update {
                local_changes: vec![LocalChange::Insertion {
                    index: 0,
                    elements: vec!["1".to_string()]
                }]
            }
        );

        // The buffer drains on read.
        assert!(binding.get_changes().is_empty());
    }

    #[test]
    fn test_list_binding_transform_is_deferred_until_drain() {
        let source: ObservableList<i32> = ObservableList::new();
        let transforms = Rc::new(RefCell::new(0));

        let binding: ListBinding<i32, i32> = {
            let transforms = transforms.clone();
            ListBinding::new(
                &source,
                move |element| {
                    *transforms.borrow_mut() += 1;
                    *element * 2
                },
                || {},
            )
        };

        source.push(1);
        source.push(2);
        assert_eq!(*transforms.borrow(), 0);

        binding.get_changes();
        assert_eq!(*transforms.borrow(), 2);
    }

    #[test]
    fn test_list_binding_invalidator_fires() {
        let source: ObservableList<i32> = ObservableList::new();
        let fired = Rc::new(RefCell::new(0));

        let _binding: ListBinding<i32, i32> = {
            let fired = fired.clone();
            ListBinding::new(&source, |element| *element, move || {
                *fired.borrow_mut() += 1;
            })
        };

        source.push(1);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_list_binding_release_unsubscribes() {
        let source: ObservableList<i32> = ObservableList::new();
        let fired = Rc::new(RefCell::new(0));

        let binding: ListBinding<i32, i32> = {
            let fired = fired.clone();
            ListBinding::new(&source, |element| *element, move || {
                *fired.borrow_mut() += 1;
            })
        };

        binding.release();
        source.push(1);

        assert_eq!(*fired.borrow(), 0);
        assert!(binding.get_changes().is_empty());
    }

    #[test]
    fn test_dropped_binding_detaches_from_source() {
        let source: ObservableList<i32> = ObservableList::new();

        {
            let _binding: ListBinding<i32, i32> =
                ListBinding::new(&source, |element| *element, || {});
        }

        // The source only held weak handles; mutation after the drop must
        // not observe them.
        source.push(1);
        source.push(2);
        assert_eq!(source.to_vec(), [1, 2]);
    }

    #[test]
    fn test_set_binding_transforms_elements() {
        let source: ObservableSet<i32> = ObservableSet::new();
        let binding: SetBinding<i32, String> =
            SetBinding::new(&source, |element| element.to_string(), || {});

        source.insert(7);

        let changes = binding.get_changes();
        assert_eq!(changes.len(), 1);
        assert!(changes[0].added.contains("7"));
    }

    #[test]
    fn test_map_binding_transforms_values() {
        let source: ObservableMap<String, i32> = ObservableMap::new();
        let binding: MapBinding<String, i32, String> =
            MapBinding::new(&source, |value| value.to_string(), || {});

        source.insert("a".to_string(), 1);
        source.insert("a".to_string(), 2);

        let changes = binding.get_changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].added.get("a"), Some(&"1".to_string()));
        assert_eq!(
            changes[1].updated.get("a"),
            Some(&("1".to_string(), "2".to_string()))
        );
    }

    #[test]
    fn test_deque_binding_preserves_sites() {
        let source: ObservableDeque<i32> = ObservableDeque::new();
        let binding: DequeBinding<i32, String> =
            DequeBinding::new(&source, |element| element.to_string(), || {});

        source.push_front(1);

        let changes = binding.get_changes();
        assert_eq!(
            changes[0],
            DequeChange {
                local_changes: vec![DequeLocalChange::Insertion {
                    site: crate::deque::Site::Head,
                    elements: vec!["1".to_string()]
                }]
            }
        );
    }
}
