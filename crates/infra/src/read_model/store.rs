use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fieldstock_core::Entity;

/// Key/value store abstraction for disposable read models.
///
/// Rows are keyed by their entity id. `list` and `filter` return rows in
/// first-insertion order; updating a row keeps its position.
pub trait ReadStore<V>: Send + Sync
where
    V: Entity,
{
    fn get(&self, id: &V::Id) -> Option<V>;
    fn upsert(&self, row: V);
    fn remove(&self, id: &V::Id) -> Option<V>;
    fn list(&self) -> Vec<V>;
    fn filter(&self, predicate: &dyn Fn(&V) -> bool) -> Vec<V>;
    /// Clear every row (rebuild support).
    fn clear(&self);
}

impl<V, S> ReadStore<V> for Arc<S>
where
    V: Entity,
    S: ReadStore<V> + ?Sized,
{
    fn get(&self, id: &V::Id) -> Option<V> {
        (**self).get(id)
    }

    fn upsert(&self, row: V) {
        (**self).upsert(row)
    }

    fn remove(&self, id: &V::Id) -> Option<V> {
        (**self).remove(id)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn filter(&self, predicate: &dyn Fn(&V) -> bool) -> Vec<V> {
        (**self).filter(predicate)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

#[derive(Debug)]
struct Rows<K, V> {
    next_slot: u64,
    slots: HashMap<K, u64>,
    ordered: BTreeMap<u64, V>,
}

impl<K, V> Default for Rows<K, V> {
    fn default() -> Self {
        Self {
            next_slot: 0,
            slots: HashMap::new(),
            ordered: BTreeMap::new(),
        }
    }
}

/// In-memory, insertion-ordered read store for tests/dev.
#[derive(Debug)]
pub struct InMemoryReadStore<V>
where
    V: Entity,
{
    inner: RwLock<Rows<V::Id, V>>,
}

impl<V> InMemoryReadStore<V>
where
    V: Entity,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Rows::default()),
        }
    }
}

impl<V> InMemoryReadStore<V>
where
    V: Entity,
{
    // Poisoning is logged and recovered. Rows are at most one fold stale
    // and a projection reset rebuilds them.
    fn read_rows(&self) -> RwLockReadGuard<'_, Rows<V::Id, V>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("read model lock poisoned, continuing with last written rows");
            poisoned.into_inner()
        })
    }

    fn write_rows(&self) -> RwLockWriteGuard<'_, Rows<V::Id, V>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("read model lock poisoned, continuing with last written rows");
            poisoned.into_inner()
        })
    }
}

impl<V> Default for InMemoryReadStore<V>
where
    V: Entity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ReadStore<V> for InMemoryReadStore<V>
where
    V: Entity + Clone + Send + Sync + 'static,
    V::Id: Send + Sync,
{
    fn get(&self, id: &V::Id) -> Option<V> {
        let rows = self.read_rows();
        let slot = rows.slots.get(id)?;
        rows.ordered.get(slot).cloned()
    }

    fn upsert(&self, row: V) {
        let mut rows = self.write_rows();
        let slot = match rows.slots.get(row.id()) {
            Some(slot) => *slot,
            None => {
                let slot = rows.next_slot;
                rows.next_slot += 1;
                rows.slots.insert(row.id().clone(), slot);
                slot
            }
        };
        rows.ordered.insert(slot, row);
    }

    fn remove(&self, id: &V::Id) -> Option<V> {
        let mut rows = self.write_rows();
        let slot = rows.slots.remove(id)?;
        rows.ordered.remove(&slot)
    }

    fn list(&self) -> Vec<V> {
        self.read_rows().ordered.values().cloned().collect()
    }

    fn filter(&self, predicate: &dyn Fn(&V) -> bool) -> Vec<V> {
        self.read_rows().ordered.values().filter(|v| predicate(v)).cloned().collect()
    }

    fn clear(&self) {
        *self.write_rows() = Rows::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        id: u32,
        label: &'static str,
    }

    impl Entity for Row {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }
    }

    #[test]
    fn keeps_first_insertion_order_across_updates() {
        let store = InMemoryReadStore::new();
        store.upsert(Row { id: 9, label: "a" });
        store.upsert(Row { id: 1, label: "b" });
        store.upsert(Row { id: 5, label: "c" });
        store.upsert(Row { id: 9, label: "a2" });

        let ids: Vec<u32> = store.list().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![9, 1, 5]);
        assert_eq!(store.get(&9).unwrap().label, "a2");
    }

    #[test]
    fn filter_and_remove() {
        let store = InMemoryReadStore::new();
        store.upsert(Row { id: 1, label: "x" });
        store.upsert(Row { id: 2, label: "y" });
        store.upsert(Row { id: 3, label: "x" });

        let xs: Vec<u32> = store.filter(&|r: &Row| r.label == "x").iter().map(|r| r.id).collect();
        assert_eq!(xs, vec![1, 3]);

        assert_eq!(store.remove(&1).unwrap().id, 1);
        assert!(store.get(&1).is_none());
        store.clear();
        assert!(store.list().is_empty());
    }

    #[test]
    fn poisoned_lock_keeps_rows_readable_and_writable() {
        let store: Arc<InMemoryReadStore<Row>> = Arc::new(InMemoryReadStore::new());
        store.upsert(Row { id: 1, label: "before" });

        let holder = Arc::clone(&store);
        let panicked = std::thread::spawn(move || {
            let _guard = holder.inner.write().unwrap();
            panic!("projection fold failed");
        })
        .join();
        assert!(panicked.is_err());
        assert!(store.inner.is_poisoned());

        store.upsert(Row { id: 2, label: "after" });
        assert_eq!(store.get(&1).unwrap().label, "before");
        assert_eq!(store.get(&2).unwrap().label, "after");
        assert_eq!(store.list().len(), 2);
    }
}
