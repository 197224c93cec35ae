//! Publication of the current synonym table to concurrent readers.
//!
//! [`LiveTable`] is the single atomically swappable reference every new
//! consumer starts from. [`ConsumerRegistry`] tracks consumers that are
//! currently rewriting a token stream so a reload can hand them the new
//! table; membership is scoped to a [`ConsumerHandle`] and never keeps a
//! consumer alive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::synonym::map::SynonymMap;

/// The current table of one filter configuration.
///
/// Single writer, many readers. Readers never take a lock and always see a
/// complete table, either the previous one or the new one.
#[derive(Debug)]
pub struct LiveTable {
    current: ArcSwap<SynonymMap>,
    version: AtomicU64,
}

impl LiveTable {
    /// Create a live table serving `initial`.
    pub fn new(initial: Arc<SynonymMap>) -> Self {
        LiveTable {
            current: ArcSwap::new(initial),
            version: AtomicU64::new(0),
        }
    }

    /// The table currently being served.
    pub fn load(&self) -> Arc<SynonymMap> {
        self.current.load_full()
    }

    /// Replace the served table, returning the new version number.
    pub fn publish(&self, table: Arc<SynonymMap>) -> u64 {
        self.current.store(table);
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// How many tables have been published after the initial one.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

/// The private table reference of one consumer.
#[derive(Debug)]
pub struct ConsumerSlot {
    table: ArcSwap<SynonymMap>,
}

impl ConsumerSlot {
    fn new(table: Arc<SynonymMap>) -> Self {
        ConsumerSlot {
            table: ArcSwap::new(table),
        }
    }

    /// The table this consumer currently rewrites with.
    pub fn load(&self) -> Arc<SynonymMap> {
        self.table.load_full()
    }

    fn update(&self, table: Arc<SynonymMap>) {
        self.table.store(table);
    }
}

/// Non-owning set of active consumers of one configuration.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    next_id: AtomicU64,
    slots: Mutex<HashMap<u64, Weak<ConsumerSlot>>>,
}

impl ConsumerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new consumer starting from `initial`.
    ///
    /// The consumer stays registered until the returned handle is dropped.
    pub fn attach(self: &Arc<Self>, initial: Arc<SynonymMap>) -> ConsumerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(ConsumerSlot::new(initial));
        self.slots.lock().insert(id, Arc::downgrade(&slot));

        ConsumerHandle {
            id,
            slot,
            registry: Arc::downgrade(self),
        }
    }

    /// Hand `table` to every consumer registered at the time of the call.
    ///
    /// Returns the number of consumers updated. Consumers attached while the
    /// broadcast runs may miss it; they already started from the live table.
    pub fn broadcast(&self, table: &Arc<SynonymMap>) -> usize {
        let live: Vec<Arc<ConsumerSlot>> = {
            let mut slots = self.slots.lock();
            slots.retain(|_, slot| slot.strong_count() > 0);
            slots.values().filter_map(Weak::upgrade).collect()
        };

        for slot in &live {
            slot.update(Arc::clone(table));
        }
        live.len()
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    /// Whether no consumer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn detach(&self, id: u64) {
        self.slots.lock().remove(&id);
    }
}

/// Scoped registration of one consumer; dropping it deregisters.
#[derive(Debug)]
pub struct ConsumerHandle {
    id: u64,
    slot: Arc<ConsumerSlot>,
    registry: Weak<ConsumerRegistry>,
}

impl ConsumerHandle {
    /// Registry-unique id of this consumer.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The table this consumer currently rewrites with.
    pub fn table(&self) -> Arc<SynonymMap> {
        self.slot.load()
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::synonym::map::SynonymMapBuilder;

    fn table(input: &str, output: &str) -> Arc<SynonymMap> {
        let mut builder = SynonymMapBuilder::new();
        builder
            .add(&[input.to_string()], &[output.to_string()])
            .unwrap();
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_publish_is_visible() {
        let live = LiveTable::new(Arc::new(SynonymMap::empty()));
        assert!(live.load().is_empty());

        let next = table("quick", "fast");
        assert_eq!(live.publish(Arc::clone(&next)), 1);
        assert!(Arc::ptr_eq(&live.load(), &next));
        assert_eq!(live.version(), 1);
    }

    #[test]
    fn test_publish_visible_from_other_threads() {
        let live = Arc::new(LiveTable::new(Arc::new(SynonymMap::empty())));

        for round in 0..20 {
            let next = table("quick", &format!("fast{round}"));
            live.publish(Arc::clone(&next));

            let reader = Arc::clone(&live);
            let seen = thread::spawn(move || reader.load()).join().unwrap();
            assert!(Arc::ptr_eq(&seen, &next));
        }
    }

    #[test]
    fn test_broadcast_reaches_attached_consumers() {
        let registry = Arc::new(ConsumerRegistry::new());
        let first = registry.attach(Arc::new(SynonymMap::empty()));
        let second = registry.attach(Arc::new(SynonymMap::empty()));
        assert_eq!(registry.len(), 2);

        let next = table("quick", "fast");
        assert_eq!(registry.broadcast(&next), 2);
        assert!(Arc::ptr_eq(&first.table(), &next));
        assert!(Arc::ptr_eq(&second.table(), &next));
    }

    #[test]
    fn test_dropped_handle_deregisters() {
        let registry = Arc::new(ConsumerRegistry::new());
        let handle = registry.attach(Arc::new(SynonymMap::empty()));
        let kept = registry.attach(Arc::new(SynonymMap::empty()));
        assert_eq!(registry.len(), 2);

        drop(handle);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.broadcast(&table("a", "b")), 1);
        assert_ne!(kept.id(), 0);
    }

    #[test]
    fn test_handle_outliving_registry() {
        let registry = Arc::new(ConsumerRegistry::new());
        let handle = registry.attach(table("a", "b"));
        drop(registry);

        assert!(!handle.table().is_empty());
        drop(handle);
    }

    #[test]
    fn test_broadcast_while_consumers_come_and_go() {
        let registry = Arc::new(ConsumerRegistry::new());
        let churn = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..500 {
                    let handle = registry.attach(Arc::new(SynonymMap::empty()));
                    drop(handle);
                }
            })
        };

        let next = table("quick", "fast");
        for _ in 0..100 {
            registry.broadcast(&next);
        }
        churn.join().unwrap();
        assert!(registry.is_empty());
    }
}
