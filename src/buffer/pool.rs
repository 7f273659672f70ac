//! Buffer pool: composes a `PageCache` with a `ResourceManager`, fetching
//! on a cache miss and writing back whatever the cache evicts to make
//! room.
//!
//! Unlike the teacher's `PageGuard`/`PageGuardMut`, pinning here is not
//! RAII: callers pair every `get_and_pin` with an explicit `unpin` call.
//! This matches the cache's own discipline and avoids tying page lifetime
//! to a borrow of the pool.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::cache::{CacheKey, PageCache, ResourceId};
use crate::error::Result;
use crate::page::Page;
use crate::storage::ResourceManager;
use crate::types::PageType;

pub trait BufferPool: Send + Sync {
    fn get_and_pin(&self, page_number: u32) -> Result<Arc<RwLock<Page>>>;
    fn unpin(&self, page_number: u32) -> Result<()>;
    fn mark_dirty(&self, page_number: u32) -> Result<()>;
    fn new_page(&self, page_type: PageType) -> Result<Arc<RwLock<Page>>>;
    /// Warm the cache for `page_number` without pinning it. Best-effort: a
    /// race against a concurrent fetch (`DuplicateCacheEntry`) is not an
    /// error here.
    fn prefetch(&self, page_number: u32) -> Result<()>;
    fn flush_all(&self) -> Result<()>;
    fn expel_all(&self);
    fn capacity(&self) -> usize;
}

pub struct IndexBufferPool {
    resource_manager: Arc<dyn ResourceManager>,
    cache: Arc<PageCache>,
    resource_id: ResourceId,
}

impl IndexBufferPool {
    pub fn new(resource_manager: Arc<dyn ResourceManager>, cache: Arc<PageCache>, resource_id: ResourceId) -> Self {
        Self {
            resource_manager,
            cache,
            resource_id,
        }
    }

    fn key(&self, page_number: u32) -> CacheKey {
        CacheKey::new(self.resource_id, page_number)
    }

    /// Write an evicted dirty page back through the resource manager.
    /// Clean evictions (or none at all) are a no-op.
    fn write_back_if_dirty(&self, evicted: Option<crate::buffer::cache::EvictedEntry>) -> Result<()> {
        let Some(entry) = evicted else { return Ok(()) };
        let Some(page) = entry.dirty_page else { return Ok(()) };
        let page = page.read();
        self.resource_manager.write_page(&page)
    }
}

impl BufferPool for IndexBufferPool {
    fn get_and_pin(&self, page_number: u32) -> Result<Arc<RwLock<Page>>> {
        let key = self.key(page_number);
        if let Some(page) = self.cache.get_and_pin(key)? {
            return Ok(page);
        }

        let page = self.resource_manager.read_page(page_number)?;
        let evicted = self.cache.add_page(key, page)?;
        self.write_back_if_dirty(evicted)?;

        Ok(self
            .cache
            .get_and_pin(key)?
            .expect("page was just inserted into the cache"))
    }

    fn unpin(&self, page_number: u32) -> Result<()> {
        self.cache.unpin(self.key(page_number))
    }

    fn mark_dirty(&self, page_number: u32) -> Result<()> {
        self.cache.mark_dirty(self.key(page_number))
    }

    fn new_page(&self, page_type: PageType) -> Result<Arc<RwLock<Page>>> {
        let page = self.resource_manager.reserve_new_page(page_type)?;
        let key = self.key(page.page_number());
        let evicted = self.cache.add_page(key, page)?;
        self.write_back_if_dirty(evicted)?;
        self.mark_dirty(key.page_number)?;

        Ok(self
            .cache
            .get_and_pin(key)?
            .expect("page was just inserted into the cache"))
    }

    fn prefetch(&self, page_number: u32) -> Result<()> {
        let key = self.key(page_number);
        if self.cache.get_page(key).is_some() {
            return Ok(());
        }
        let pages = self.resource_manager.read_pages(page_number, 1)?;
        let page = pages.into_iter().next().expect("read_pages(_, 1) returns exactly one page");
        match self.cache.add_page(key, page) {
            Ok(evicted) => self.write_back_if_dirty(evicted),
            Err(crate::error::StorageError::DuplicateCacheEntry(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn flush_all(&self) -> Result<()> {
        for (_, page) in self.cache.drain_dirty(self.resource_id) {
            let page = page.read();
            self.resource_manager.write_page(&page)?;
        }
        Ok(())
    }

    fn expel_all(&self) {
        self.cache.expel_all_for_resource(self.resource_id)
    }

    fn capacity(&self) -> usize {
        self.cache.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileResourceManager;
    use crate::types::{Kind, PageSize};
    use tempfile::tempdir;

    fn pool(capacity: usize) -> (tempfile::TempDir, IndexBufferPool) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let rm = FileResourceManager::open(&path, PageSize::Kb4, 0, false, Kind::Int).unwrap();
        rm.truncate().unwrap();
        let pool = IndexBufferPool::new(Arc::new(rm), Arc::new(PageCache::new(capacity)), 1);
        (dir, pool)
    }

    #[test]
    fn fetch_missing_page_faults_in_from_disk() {
        let (_dir, pool) = pool(4);
        let page = pool.get_and_pin(1).unwrap();
        assert_eq!(page.read().page_number(), 1);
        pool.unpin(1).unwrap();
    }

    #[test]
    fn new_page_is_pinned_and_dirty() {
        let (_dir, pool) = pool(4);
        let page = pool.new_page(PageType::LeafNode).unwrap();
        let page_number = page.read().page_number();
        pool.unpin(page_number).unwrap();

        pool.flush_all().unwrap();
        let reopened = pool.get_and_pin(page_number).unwrap();
        assert_eq!(reopened.read().page_number(), page_number);
    }

    #[test]
    fn unpin_without_pin_is_an_error() {
        let (_dir, pool) = pool(4);
        assert!(pool.unpin(99).is_err());
    }
}
