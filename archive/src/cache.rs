use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use meridian_primitives::Epoch;
use parking_lot::Mutex;

use crate::{config::CacheConfig, error::ArchiveError, index::SharedIndexes};

struct CacheSlot<H> {
    indexes: SharedIndexes<H>,
    last_used: Instant,
}

/// Bounded cache of past-epoch indices.
///
/// Entries load lazily on first read and are dropped once more than the
/// configured number of past epochs has been touched, least recently used
/// first. The current epoch never lives here; the open state keeps it in
/// memory permanently. A single mutex serialises mutation, and readers only
/// ever take `Arc` snapshots out of it.
pub(crate) struct IndexCache<H> {
    slots: Mutex<HashMap<Epoch, CacheSlot<H>>>,
    config: CacheConfig,
}

impl<H> IndexCache<H> {
    pub fn new(config: CacheConfig) -> IndexCache<H> {
        IndexCache {
            slots: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Returns the cached indices for `epoch`, loading them with `load` on a
    /// miss. The second result lists epochs evicted to make room.
    pub fn get_or_load(
        &self,
        epoch: Epoch,
        load: impl FnOnce() -> Result<SharedIndexes<H>, ArchiveError>,
    ) -> Result<(SharedIndexes<H>, Vec<Epoch>), ArchiveError> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&epoch) {
            slot.last_used = Instant::now();
            return Ok((SharedIndexes::clone(&slot.indexes), Vec::new()));
        }
        drop(slots);

        // Load outside the lock; reads of distinct epochs should not
        // serialise on each other's file I/O.
        let indexes = load()?;

        let mut slots = self.slots.lock();
        slots.insert(
            epoch,
            CacheSlot {
                indexes: SharedIndexes::clone(&indexes),
                last_used: Instant::now(),
            },
        );
        let evicted = Self::shrink(&mut slots, self.config.past_epochs);
        Ok((indexes, evicted))
    }

    /// Inserts the already materialised indices of a freshly completed
    /// epoch, as the writer rolls over. Returns the epochs evicted.
    pub fn insert(&self, epoch: Epoch, indexes: SharedIndexes<H>) -> Vec<Epoch> {
        let mut slots = self.slots.lock();
        slots.insert(
            epoch,
            CacheSlot {
                indexes,
                last_used: Instant::now(),
            },
        );
        Self::shrink(&mut slots, self.config.past_epochs)
    }

    fn shrink(slots: &mut HashMap<Epoch, CacheSlot<H>>, keep: usize) -> Vec<Epoch> {
        let mut evicted = Vec::new();
        while slots.len() > keep {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(&epoch, _)| epoch)
                .expect("cache is non-empty while over capacity");
            slots.remove(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    /// Drops every entry that has not been used for `max_age`. Driven by the
    /// background expiry task.
    pub fn expire(&self, max_age: Duration) -> Vec<Epoch> {
        let mut slots = self.slots.lock();
        let now = Instant::now();
        let expired: Vec<Epoch> = slots
            .iter()
            .filter(|(_, slot)| now.duration_since(slot.last_used) >= max_age)
            .map(|(&epoch, _)| epoch)
            .collect();
        for epoch in &expired {
            slots.remove(epoch);
        }
        expired
    }

    /// Drops everything; used after truncation, when cached epochs may no
    /// longer exist on disk.
    pub fn restart(&self) -> Vec<Epoch> {
        let mut slots = self.slots.lock();
        let mut evicted: Vec<Epoch> = slots.keys().copied().collect();
        evicted.sort_unstable();
        slots.clear();
        evicted
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use meridian_primitives::Hash32;
    use meridian_test_log::test;

    use super::*;
    use crate::index::EpochIndexes;

    fn cache(past_epochs: usize) -> IndexCache<Hash32> {
        IndexCache::new(CacheConfig {
            past_epochs,
            expiry: Duration::from_secs(300),
        })
    }

    fn indexes() -> SharedIndexes<Hash32> {
        Arc::new(EpochIndexes::empty())
    }

    #[test]
    fn it_keeps_the_most_recently_used_epochs() {
        let cache = cache(2);
        assert!(cache.insert(Epoch::new(0), indexes()).is_empty());
        assert!(cache.insert(Epoch::new(1), indexes()).is_empty());

        // Touch epoch 0 so epoch 1 is the eviction candidate.
        let (_, evicted) = cache
            .get_or_load(Epoch::new(0), || panic!("cached"))
            .unwrap();
        assert!(evicted.is_empty());

        let evicted = cache.insert(Epoch::new(2), indexes());
        assert_eq!(evicted, vec![Epoch::new(1)]);
    }

    #[test]
    fn it_loads_on_miss_and_restarts() {
        let cache = cache(4);
        let (_, evicted) = cache
            .get_or_load(Epoch::new(7), || Ok(indexes()))
            .unwrap();
        assert!(evicted.is_empty());
        // Second access is served from the cache.
        let (_, _) = cache
            .get_or_load(Epoch::new(7), || panic!("cached"))
            .unwrap();

        assert_eq!(cache.restart(), vec![Epoch::new(7)]);
        assert!(cache
            .get_or_load(Epoch::new(7), || Ok(indexes()))
            .is_ok());
    }

    #[test]
    fn it_expires_idle_entries() {
        let cache = cache(4);
        cache.insert(Epoch::new(1), indexes());
        assert!(cache.expire(Duration::from_secs(60)).is_empty());
        assert_eq!(cache.expire(Duration::ZERO), vec![Epoch::new(1)]);
    }
}
