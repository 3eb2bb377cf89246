//! Observable maps.
//!
//! A map change is key-keyed and carries three buckets: added entries,
//! removed entries, and updated entries as `key -> (old, new)`. Within one
//! transaction, remove-then-add of the same key becomes an update (or cancels
//! entirely when the value returns to its original), and chained updates keep
//! the first old value, so the emitted change is the net effect of the
//! transaction.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;

use argus_core::{InvalidationListener, Listener, ListenerSet, Observable, ObservableId};
use hashbrown::HashMap;

/// Callback handle invoked with an aggregated map change.
pub type MapChangeListener<K, V> = Listener<dyn Fn(&MapChange<K, V>)>;

/// The net effect of one map transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct MapChange<K: Hash + Eq, V> {
    /// Entries that were added.
    pub added: HashMap<K, V>,
    /// Entries that were removed.
    pub removed: HashMap<K, V>,
    /// Entries whose value changed, as `key -> (old, new)`.
    pub updated: HashMap<K, (V, V)>,
}

impl<K: Hash + Eq + 'static, V: 'static> MapChange<K, V> {
    /// Creates a change listener from a closure.
    pub fn listener(callback: impl Fn(&MapChange<K, V>) + 'static) -> MapChangeListener<K, V> {
        let callback: Rc<dyn Fn(&MapChange<K, V>)> = Rc::new(callback);
        Listener::wrap(callback)
    }
}

struct MapChangeBuilder<K: Hash + Eq, V> {
    added: HashMap<K, V>,
    removed: HashMap<K, V>,
    updated: HashMap<K, (V, V)>,
    depth: usize,
}

impl<K, V> MapChangeBuilder<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn new() -> Self {
        Self {
            added: HashMap::new(),
            removed: HashMap::new(),
            updated: HashMap::new(),
            depth: 0,
        }
    }

    fn log_add(&mut self, key: K, value: V) {
        match self.removed.remove(&key) {
            /* A remove-then-add of the same key is an update, or cancels
             * entirely when the value returns to the original. */
            Some(old) => {
                if old != value {
                    self.updated.insert(key, (old, value));
                }
            }
            None => {
                self.added.insert(key, value);
            }
        }
    }

    fn log_remove(&mut self, key: K, value: V) {
        if self.added.remove(&key).is_some() {
            return;
        }

        match self.updated.remove(&key) {
            Some((old, _)) => {
                self.removed.insert(key, old);
            }
            None => {
                self.removed.insert(key, value);
            }
        }
    }

    fn log_update(&mut self, key: K, old: V, new: V) {
        if let Some(pending) = self.added.get_mut(&key) {
            /* An update of an entry added within this transaction stays an
             * addition. */
            *pending = new;
            return;
        }

        match self.updated.get_mut(&key) {
            Some(pending) => pending.1 = new,
            None => {
                self.updated.insert(key, (old, new));
            }
        }
    }

    fn build(mut self) -> Option<MapChange<K, V>> {
        self.updated.retain(|_, (old, new)| old != new);

        if self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty() {
            return None;
        }

        Some(MapChange {
            added: self.added,
            removed: self.removed,
            updated: self.updated,
        })
    }
}

struct MapInner<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    items: RefCell<HashMap<K, V>>,
    builder: RefCell<Option<MapChangeBuilder<K, V>>>,
    change_listeners: ListenerSet<dyn Fn(&MapChange<K, V>)>,
    invalidation_listeners: ListenerSet<dyn Fn()>,
}

/// An observable hash map.
///
/// Handles are cheap to clone and share the same backing store. Every
/// mutation emits exactly one `MapChange` per outermost transaction.
///
/// # Example
///
/// ```rust
/// use argus_collections::{MapChange, ObservableMap};
///
/// let map = ObservableMap::new();
/// map.add_change_listener(MapChange::listener(|change: &MapChange<&str, i32>| {
///     // one aggregated change per transaction
/// }));
///
/// map.insert("answer", 42);
/// ```
pub struct ObservableMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    inner: Rc<MapInner<K, V>>,
}

impl<K, V> Clone for ObservableMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Default for ObservableMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> From<HashMap<K, V>> for ObservableMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Wraps an existing map without emitting any change.
    fn from(items: HashMap<K, V>) -> Self {
        Self {
            inner: Rc::new(MapInner {
                items: RefCell::new(items),
                builder: RefCell::new(None),
                change_listeners: ListenerSet::new(),
                invalidation_listeners: ListenerSet::new(),
            }),
        }
    }
}

impl<K, V> ObservableMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Creates a new empty observable map.
    pub fn new() -> Self {
        Self::from(HashMap::new())
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.items.borrow().get(key).cloned()
    }

    /// Returns true if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.items.borrow().contains_key(key)
    }

    /// Returns a snapshot of the current keys.
    pub fn keys(&self) -> Vec<K> {
        self.inner.items.borrow().keys().cloned().collect()
    }

    /// Returns a snapshot of the current contents.
    pub fn to_map(&self) -> HashMap<K, V> {
        self.inner.items.borrow().clone()
    }

    /// Opens a transaction frame.
    ///
    /// Nested frames share one change builder; the aggregated change is
    /// emitted when the outermost frame is dropped.
    pub fn begin_change(&self) -> MapTransaction<K, V> {
        {
            let mut builder = self.inner.builder.borrow_mut();
            builder.get_or_insert_with(MapChangeBuilder::new).depth += 1;
        }

        MapTransaction {
            inner: self.inner.clone(),
        }
    }

    fn with_builder(&self, log: impl FnOnce(&mut MapChangeBuilder<K, V>)) {
        if let Some(builder) = self.inner.builder.borrow_mut().as_mut() {
            log(builder);
        }
    }

    /// Inserts an entry, returning the previous value for the key.
    ///
    /// A fresh key emits an addition; an existing key with a different value
    /// emits an update; an existing key with an equal value is a no-op and
    /// emits nothing.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let previous = self
            .inner
            .items
            .borrow_mut()
            .insert(key.clone(), value.clone());

        match &previous {
            Some(old) if *old == value => {}
            Some(old) => {
                let _tx = self.begin_change();
                self.with_builder(|builder| builder.log_update(key, old.clone(), value));
            }
            None => {
                let _tx = self.begin_change();
                self.with_builder(|builder| builder.log_add(key, value));
            }
        }

        previous
    }

    /// Removes the entry for `key`, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.inner.items.borrow_mut().remove(key);

        if let Some(value) = &removed {
            let _tx = self.begin_change();
            self.with_builder(|builder| builder.log_remove(key.clone(), value.clone()));
        }

        removed
    }

    /// Removes all entries in one transaction.
    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }

        let _tx = self.begin_change();
        let keys = self.keys();
        for key in keys {
            self.remove(&key);
        }
    }

    /// Inserts every entry in one transaction.
    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let _tx = self.begin_change();
        for (key, value) in entries {
            self.insert(key, value);
        }
    }

    /// Adds a change listener.
    ///
    /// Returns true iff the listener was not already registered.
    pub fn add_change_listener(&self, listener: MapChangeListener<K, V>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &MapChangeListener<K, V>) -> bool {
        self.inner.change_listeners.remove(listener)
    }

    /// Returns a read-through, unmodifiable view of this map.
    pub fn unmodifiable_view(&self) -> MapView<K, V> {
        MapView {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Observable for ObservableMap<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
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

/// An open transaction frame on an observable map.
pub struct MapTransaction<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    inner: Rc<MapInner<K, V>>,
}

impl<K, V> Drop for MapTransaction<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
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

/// A read-through, unmodifiable view of an observable map.
pub struct MapView<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    inner: Rc<MapInner<K, V>>,
}

impl<K, V> Clone for MapView<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> MapView<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns true if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns a clone of the value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.items.borrow().get(key).cloned()
    }

    /// Returns true if the map contains `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.items.borrow().contains_key(key)
    }

    /// Returns a snapshot of the current contents.
    pub fn to_map(&self) -> HashMap<K, V> {
        self.inner.items.borrow().clone()
    }

    /// Adds a change listener.
    pub fn add_change_listener(&self, listener: MapChangeListener<K, V>) -> bool {
        self.inner.change_listeners.add(listener)
    }

    /// Removes a change listener.
    pub fn remove_change_listener(&self, listener: &MapChangeListener<K, V>) -> bool {
        self.inner.change_listeners.remove(listener)
    }
}

impl<K, V> Observable for MapView<K, V>
where
    K: Clone + Hash + Eq + 'static,
    V: Clone + PartialEq + 'static,
{
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
