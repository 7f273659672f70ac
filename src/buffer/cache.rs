//! The page cache: ARC-style adaptive eviction over `(resourceId,
//! pageNumber)` keys.
//!
//! State is an arena of slots (no back-pointers, following the same
//! free-list-of-indices pattern the teacher's own LRU cache used) plus four
//! ordered lists: `T1`/`T2` hold resident slot indices, `B1`/`B2` hold
//! ghost keys for pages evicted from `T1`/`T2` respectively. A single
//! `parking_lot::Mutex` guards this bookkeeping; it never guards page
//! bytes, which live behind each slot's own `RwLock`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, StorageError};
use crate::page::Page;
use crate::types::PageId;

pub type ResourceId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource_id: ResourceId,
    pub page_number: u32,
}

impl CacheKey {
    pub fn new(resource_id: ResourceId, page_number: u32) -> Self {
        Self {
            resource_id,
            page_number,
        }
    }
}

struct Slot {
    key: CacheKey,
    page: Arc<RwLock<Page>>,
    pin_count: u32,
    dirty: bool,
    expired: bool,
}

/// What was displaced by `add_page`, if anything.
pub struct EvictedEntry {
    pub key: CacheKey,
    /// Present only if the evicted page was dirty; the caller (the buffer
    /// pool) must write this back through the resource manager before the
    /// slot's buffer is reused for anything else.
    pub dirty_page: Option<Arc<RwLock<Page>>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Which {
    T1,
    T2,
}

struct CacheInner {
    capacity: usize,
    slots: Vec<Option<Slot>>,
    free_slots: Vec<usize>,
    index: HashMap<CacheKey, usize>,
    t1: VecDeque<usize>,
    t2: VecDeque<usize>,
    b1: VecDeque<CacheKey>,
    b2: VecDeque<CacheKey>,
    /// Adaptive target size for T1, in `[0, capacity]`.
    p: usize,
}

impl CacheInner {
    fn resident_count(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn take_unpinned(list: &mut VecDeque<usize>, slots: &[Option<Slot>]) -> Option<usize> {
        let pos = list
            .iter()
            .position(|&idx| slots[idx].as_ref().map(|s| s.pin_count == 0).unwrap_or(false))?;
        list.remove(pos)
    }

    fn pop_first_expired(&mut self) -> Option<usize> {
        if let Some(pos) = self.t1.iter().position(|&idx| self.slots[idx].as_ref().unwrap().expired) {
            return self.t1.remove(pos);
        }
        if let Some(pos) = self.t2.iter().position(|&idx| self.slots[idx].as_ref().unwrap().expired) {
            return self.t2.remove(pos);
        }
        None
    }

    fn retire_slot(&mut self, slot_idx: usize, ghost_from: Option<Which>) -> (CacheKey, bool, Arc<RwLock<Page>>) {
        let slot = self.slots[slot_idx].take().expect("retiring a live slot");
        self.free_slots.push(slot_idx);
        self.index.remove(&slot.key);
        if let Some(which) = ghost_from {
            let ghosts = match which {
                Which::T1 => &mut self.b1,
                Which::T2 => &mut self.b2,
            };
            ghosts.push_back(slot.key);
            if ghosts.len() > self.capacity {
                ghosts.pop_front();
            }
        }
        (slot.key, slot.dirty, slot.page)
    }

    /// Evict one victim if the cache has no room left. Returns `None` when
    /// there was room already (including the warm-up period where resident
    /// count has not yet reached capacity).
    fn evict(&mut self) -> Result<Option<(CacheKey, bool, Arc<RwLock<Page>>)>> {
        if let Some(idx) = self.pop_first_expired() {
            return Ok(Some(self.retire_slot(idx, None)));
        }
        if self.resident_count() < self.capacity {
            return Ok(None);
        }

        let prefer_t1 = self.t1.len() >= self.p;
        let primary_is_t1 = prefer_t1;
        let victim = if primary_is_t1 {
            Self::take_unpinned(&mut self.t1, &self.slots)
                .map(|idx| (idx, Which::T1))
                .or_else(|| Self::take_unpinned(&mut self.t2, &self.slots).map(|idx| (idx, Which::T2)))
        } else {
            Self::take_unpinned(&mut self.t2, &self.slots)
                .map(|idx| (idx, Which::T2))
                .or_else(|| Self::take_unpinned(&mut self.t1, &self.slots).map(|idx| (idx, Which::T1)))
        };

        let (idx, from) = victim.ok_or(StorageError::CachePinned)?;
        Ok(Some(self.retire_slot(idx, Some(from))))
    }

    fn alloc_slot(&mut self, key: CacheKey, page: Page) -> usize {
        let slot = Slot {
            key,
            page: Arc::new(RwLock::new(page)),
            pin_count: 0,
            dirty: false,
            expired: false,
        };
        if let Some(idx) = self.free_slots.pop() {
            self.slots[idx] = Some(slot);
            self.index.insert(key, idx);
            idx
        } else {
            self.slots.push(Some(slot));
            let idx = self.slots.len() - 1;
            self.index.insert(key, idx);
            idx
        }
    }
}

pub struct PageCache {
    inner: Mutex<CacheInner>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                capacity,
                slots: Vec::with_capacity(capacity),
                free_slots: Vec::new(),
                index: HashMap::with_capacity(capacity),
                t1: VecDeque::new(),
                t2: VecDeque::new(),
                b1: VecDeque::new(),
                b2: VecDeque::new(),
                p: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Non-pinning lookup: the cache never fetches on a miss, so this
    /// simply reports what is already resident.
    pub fn get_page(&self, key: CacheKey) -> Option<Arc<RwLock<Page>>> {
        let inner = self.inner.lock();
        let idx = *inner.index.get(&key)?;
        inner.slots[idx].as_ref().map(|s| Arc::clone(&s.page))
    }

    /// Pin and access a page, promoting it from `T1` to `T2` on first
    /// re-access (or refreshing its position in `T2` on a later one).
    pub fn get_and_pin(&self, key: CacheKey) -> Result<Option<Arc<RwLock<Page>>>> {
        let mut inner = self.inner.lock();
        let Some(&idx) = inner.index.get(&key) else {
            return Ok(None);
        };
        if inner.slots[idx].as_ref().unwrap().expired {
            return Err(StorageError::PageExpired(PageId::new(key.page_number)));
        }
        if let Some(pos) = inner.t1.iter().position(|&i| i == idx) {
            inner.t1.remove(pos);
            inner.t2.push_back(idx);
        } else if let Some(pos) = inner.t2.iter().position(|&i| i == idx) {
            inner.t2.remove(pos);
            inner.t2.push_back(idx);
        }
        let slot = inner.slots[idx].as_mut().unwrap();
        slot.pin_count += 1;
        Ok(Some(Arc::clone(&slot.page)))
    }

    pub fn unpin(&self, key: CacheKey) -> Result<()> {
        let mut inner = self.inner.lock();
        let idx = *inner
            .index
            .get(&key)
            .ok_or_else(|| StorageError::illegal_operation("unpin of a page not resident in the cache"))?;
        let slot = inner.slots[idx].as_mut().unwrap();
        if slot.pin_count == 0 {
            return Err(StorageError::illegal_operation("pin count would go negative"));
        }
        slot.pin_count -= 1;
        Ok(())
    }

    /// Debug/global reset of every pin count to zero.
    pub fn unpin_all(&self) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut().flatten() {
            slot.pin_count = 0;
        }
    }

    pub fn mark_dirty(&self, key: CacheKey) -> Result<()> {
        let mut inner = self.inner.lock();
        let idx = *inner
            .index
            .get(&key)
            .ok_or_else(|| StorageError::illegal_operation("mark_dirty of a page not resident in the cache"))?;
        inner.slots[idx].as_mut().unwrap().dirty = true;
        Ok(())
    }

    /// Insert a freshly-loaded page, applying the ARC ghost-hit adaptation
    /// rule before evicting room for it if necessary.
    pub fn add_page(&self, key: CacheKey, page: Page) -> Result<Option<EvictedEntry>> {
        let mut inner = self.inner.lock();
        if inner.index.contains_key(&key) {
            return Err(StorageError::DuplicateCacheEntry(PageId::new(key.page_number)));
        }

        let b1_pos = inner.b1.iter().position(|k| *k == key);
        let b2_pos = if b1_pos.is_none() {
            inner.b2.iter().position(|k| *k == key)
        } else {
            None
        };

        let was_ghost = b1_pos.is_some() || b2_pos.is_some();

        let evicted = if let Some(pos) = b1_pos {
            let grow = (inner.b2.len() / inner.b1.len().max(1)).max(1);
            inner.p = (inner.p + grow).min(inner.capacity);
            inner.b1.remove(pos);
            inner.evict()?
        } else if let Some(pos) = b2_pos {
            let shrink = (inner.b1.len() / inner.b2.len().max(1)).max(1);
            inner.p = inner.p.saturating_sub(shrink);
            inner.b2.remove(pos);
            inner.evict()?
        } else {
            inner.evict()?
        };

        let slot_idx = inner.alloc_slot(key, page);
        if was_ghost {
            inner.t2.push_back(slot_idx);
        } else {
            inner.t1.push_back(slot_idx);
        }

        Ok(evicted.map(|(key, dirty, page)| EvictedEntry {
            key,
            dirty_page: if dirty { Some(page) } else { None },
        }))
    }

    /// Mark every resident page of `resource_id` as expired. Subsequent
    /// accesses through `get_and_pin` fail with `PageExpired`; expired
    /// pages are evicted ahead of everything else.
    pub fn expel_all_for_resource(&self, resource_id: ResourceId) {
        let mut inner = self.inner.lock();
        for slot in inner.slots.iter_mut().flatten() {
            if slot.key.resource_id == resource_id {
                slot.expired = true;
            }
        }
    }

    /// Collect every dirty page belonging to `resource_id`, clearing their
    /// dirty flags as they're collected. Used by the buffer pool's flush
    /// path; does not evict or unpin anything.
    pub fn drain_dirty(&self, resource_id: ResourceId) -> Vec<(CacheKey, Arc<RwLock<Page>>)> {
        let mut inner = self.inner.lock();
        let mut out = Vec::new();
        for slot in inner.slots.iter_mut().flatten() {
            if slot.key.resource_id == resource_id && slot.dirty {
                slot.dirty = false;
                out.push((slot.key, Arc::clone(&slot.page)));
            }
        }
        out
    }

    // --- introspection for tests / bookkeeping invariants -----------

    pub fn t1_len(&self) -> usize {
        self.inner.lock().t1.len()
    }
    pub fn t2_len(&self) -> usize {
        self.inner.lock().t2.len()
    }
    pub fn b1_len(&self) -> usize {
        self.inner.lock().b1.len()
    }
    pub fn b2_len(&self) -> usize {
        self.inner.lock().b2.len()
    }
    pub fn target_p(&self) -> usize {
        self.inner.lock().p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::LeafNodePage;
    use crate::types::Kind;

    fn leaf_page(page_number: u32) -> Page {
        Page::Leaf(LeafNodePage::new_empty(page_number, 4096, Kind::Int).unwrap())
    }

    #[test]
    fn add_then_get_round_trips() {
        let cache = PageCache::new(4);
        let key = CacheKey::new(1, 1);
        cache.add_page(key, leaf_page(1)).unwrap();
        assert!(cache.get_page(key).is_some());
        assert_eq!(cache.t1_len(), 1);
    }

    #[test]
    fn add_page_rejects_duplicate_key() {
        let cache = PageCache::new(4);
        let key = CacheKey::new(1, 1);
        cache.add_page(key, leaf_page(1)).unwrap();
        assert!(matches!(
            cache.add_page(key, leaf_page(1)),
            Err(StorageError::DuplicateCacheEntry(_))
        ));
    }

    #[test]
    fn scenario_arc_eviction_and_ghost_promotion() {
        // N = 4. Access sequence 1,2,3,4,5 evicts 1 into B1; re-adding 1
        // then promotes it to T2 and grows p.
        let cache = PageCache::new(4);
        for i in 1..=4u32 {
            cache.add_page(CacheKey::new(1, i), leaf_page(i)).unwrap();
        }
        cache.add_page(CacheKey::new(1, 5), leaf_page(5)).unwrap();
        assert_eq!(cache.b1_len(), 1);
        assert!(cache.get_page(CacheKey::new(1, 1)).is_none());

        let p_before = cache.target_p();
        cache.add_page(CacheKey::new(1, 1), leaf_page(1)).unwrap();
        assert!(cache.target_p() >= p_before);
        assert_eq!(cache.t2_len(), 1);
    }

    #[test]
    fn pin_blocks_eviction() {
        let cache = PageCache::new(4);
        for i in 1..=4u32 {
            cache.add_page(CacheKey::new(1, i), leaf_page(i)).unwrap();
            cache.get_and_pin(CacheKey::new(1, i)).unwrap();
        }
        let result = cache.add_page(CacheKey::new(1, 5), leaf_page(5));
        assert!(matches!(result, Err(StorageError::CachePinned)));
        for i in 1..=4u32 {
            assert!(cache.get_page(CacheKey::new(1, i)).is_some());
        }
    }

    #[test]
    fn unpin_does_not_go_negative() {
        let cache = PageCache::new(2);
        let key = CacheKey::new(1, 1);
        cache.add_page(key, leaf_page(1)).unwrap();
        assert!(cache.unpin(key).is_err());
    }

    #[test]
    fn expel_all_for_resource_marks_expired() {
        let cache = PageCache::new(2);
        let key = CacheKey::new(7, 1);
        cache.add_page(key, leaf_page(1)).unwrap();
        cache.expel_all_for_resource(7);
        assert!(matches!(cache.get_and_pin(key), Err(StorageError::PageExpired(_))));
    }

    #[test]
    fn evicting_dirty_page_surfaces_it_for_write_back() {
        let cache = PageCache::new(1);
        let key1 = CacheKey::new(1, 1);
        cache.add_page(key1, leaf_page(1)).unwrap();
        cache.mark_dirty(key1).unwrap();

        let evicted = cache.add_page(CacheKey::new(1, 2), leaf_page(2)).unwrap();
        let evicted = evicted.expect("capacity 1 forces an eviction");
        assert_eq!(evicted.key, key1);
        assert!(evicted.dirty_page.is_some());
    }
}
