//! # relindex
//!
//! A typed, disk-based B+-Tree index engine for an educational relational
//! database.
//!
//! ## Architecture
//!
//! - **Types** (`types`): scalar `Kind`s, the `Field` codec, `Rid`, `PageId`.
//! - **Page Layer** (`page`): generic index-page header plus the inner-node
//!   and leaf-node page formats.
//! - **Storage Layer** (`storage`): the index resource header and the
//!   resource manager mediating all file I/O.
//! - **Buffer Pool** (`buffer`): an adaptive (ARC) page cache plus the pool
//!   that faults pages in from the resource manager and writes evictions
//!   back.
//! - **B+-Tree Layer** (`btree`): the index itself and its lazy cursors.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relindex::{Config, Index};
//! use relindex::types::{Field, Kind, Rid};
//!
//! let config = Config::new("orders_by_customer.idx", Kind::Int).unique(false);
//! let index = Index::open(config)?;
//!
//! index.insert(&Field::Int(42), Rid::from_parts(3, 0))?;
//!
//! let mut cursor = index.lookup(&Field::Int(42))?;
//! while let Some(rid) = cursor.next()? {
//!     println!("{rid}");
//! }
//! ```

pub mod btree;
pub mod buffer;
pub mod error;
pub mod page;
pub mod storage;
pub mod types;

pub use error::{Result, StorageError};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use btree::{BTreeIndex, KeyCursor, RidCursor};
use buffer::{BufferPool, IndexBufferPool, PageCache};
use storage::{FileResourceManager, ResourceManager};
use types::{Field, Kind, PageSize, Rid};

/// Index configuration.
///
/// Mirrors the fields persisted in the index resource header 1:1: page
/// size, indexed column number, and the unique-index flag. `kind` is not
/// persisted (the header stores only the column's ordinal position, not
/// its type) and must be supplied by the caller on every open, the same as
/// `BTreeIndex::new` requires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the index file.
    pub path: PathBuf,
    /// Page size, one of the closed enumeration.
    pub page_size: PageSize,
    /// Ordinal position of the indexed column in its owning table.
    pub indexed_column_number: u32,
    /// Scalar kind of the indexed column.
    pub kind: Kind,
    /// Whether the index enforces key uniqueness.
    pub unique: bool,
    /// Buffer pool capacity, in resident pages.
    pub buffer_pool_size: usize,
}

impl Config {
    /// Create a configuration with default page size (4 KiB) and buffer
    /// pool capacity (1000 pages).
    pub fn new<P: Into<PathBuf>>(path: P, kind: Kind) -> Self {
        Self {
            path: path.into(),
            page_size: PageSize::Kb4,
            indexed_column_number: 0,
            kind,
            unique: false,
            buffer_pool_size: 1000,
        }
    }

    pub fn page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn indexed_column_number(mut self, column_number: u32) -> Self {
        self.indexed_column_number = column_number;
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn buffer_pool_size(mut self, size: usize) -> Self {
        self.buffer_pool_size = size;
        self
    }
}

/// A single open index: the resource manager, cache, buffer pool, and
/// B+-Tree wired together behind one handle.
///
/// Every open `Index` is assigned its own resource id within the shared
/// cache, so several indexes may share one `PageCache` if they're opened
/// against the same cache instance; `Index::open` gives each index a
/// private one.
pub struct Index {
    buffer_pool: Arc<dyn BufferPool>,
    resource_manager: Arc<dyn ResourceManager>,
    tree: BTreeIndex,
    config: Config,
}

impl Index {
    /// Open or create an index file at `config.path`.
    pub fn open(config: Config) -> Result<Self> {
        let resource_manager = Arc::new(FileResourceManager::open(
            &config.path,
            config.page_size,
            config.indexed_column_number,
            config.unique,
            config.kind,
        )?);
        let cache = Arc::new(PageCache::new(config.buffer_pool_size));
        let buffer_pool: Arc<dyn BufferPool> = Arc::new(IndexBufferPool::new(
            resource_manager.clone(),
            cache,
            resource_id_for(&config.path),
        ));
        let tree = BTreeIndex::new(buffer_pool.clone(), resource_manager.clone(), config.kind, config.unique);

        Ok(Self {
            buffer_pool,
            resource_manager,
            tree,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn kind(&self) -> Kind {
        self.config.kind
    }

    pub fn unique(&self) -> bool {
        self.config.unique
    }

    /// Insert a key/RID pair. Errors with `StorageError::Duplicate` if the
    /// index is unique and the key is already present.
    pub fn insert(&self, key: &Field, rid: Rid) -> Result<()> {
        self.tree.insert(key, rid)
    }

    /// Delete one key/RID pair. Leaf-local only: no rebalancing of
    /// underflowing nodes. Returns whether the pair was found.
    pub fn delete(&self, key: &Field, rid: Rid) -> Result<bool> {
        self.tree.delete_key_rid_pair(key, rid)
    }

    /// Cursor over every RID stored under `key`.
    pub fn lookup(&self, key: &Field) -> Result<RidCursor> {
        self.tree.lookup_rids(key)
    }

    /// Cursor over every RID in `[lo, hi]` (bound inclusivity controlled by
    /// `lo_incl`/`hi_incl`; either bound may be `None` for unbounded).
    pub fn lookup_range(
        &self,
        lo: Option<&Field>,
        hi: Option<&Field>,
        lo_incl: bool,
        hi_incl: bool,
    ) -> Result<RidCursor> {
        self.tree.lookup_range_rids(lo, hi, lo_incl, hi_incl)
    }

    /// Cursor over every key in `[lo, hi]`, one yield per matching RID.
    pub fn lookup_range_keys(
        &self,
        lo: Option<&Field>,
        hi: Option<&Field>,
        lo_incl: bool,
        hi_incl: bool,
    ) -> Result<KeyCursor> {
        self.tree.lookup_range_keys(lo, hi, lo_incl, hi_incl)
    }

    /// Flush every dirty resident page through to disk.
    pub fn flush(&self) -> Result<()> {
        self.buffer_pool.flush_all()
    }

    /// Page cache capacity, in resident pages.
    pub fn buffer_pool_size(&self) -> usize {
        self.buffer_pool.capacity()
    }

    /// Close the underlying file handle, releasing its exclusive lock.
    pub fn close(&self) -> Result<()> {
        self.flush()?;
        self.resource_manager.close()
    }

    /// Snapshot of the index's current header and cache capacity, suitable
    /// for logging or reporting to an operator.
    pub fn stats(&self) -> IndexStats {
        let header = self.resource_manager.header();
        IndexStats {
            page_size: header.page_size.bytes(),
            root_page_number: header.root_page_number,
            first_leaf_page_number: header.first_leaf_page_number,
            buffer_pool_size: self.buffer_pool.capacity(),
        }
    }
}

/// Serializable snapshot of an index's on-disk header plus its runtime
/// buffer pool capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub page_size: usize,
    pub root_page_number: u32,
    pub first_leaf_page_number: u32,
    pub buffer_pool_size: usize,
}

/// Derive a per-path resource id for the shared cache from the absolute
/// path's hash. Two `Index`es opened against the same path collide by
/// design: they are the same resource.
fn resource_id_for(path: &Path) -> buffer::ResourceId {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn insert_and_lookup_round_trip() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let config = Config::new(&path, Kind::Int).unique(true);
        let index = Index::open(config)?;

        index.insert(&Field::Int(1), Rid::from_parts(0, 0))?;
        index.insert(&Field::Int(2), Rid::from_parts(0, 1))?;

        let mut cursor = index.lookup(&Field::Int(1))?;
        assert_eq!(cursor.next()?, Some(Rid::from_parts(0, 0)));
        assert_eq!(cursor.next()?, None);

        Ok(())
    }

    #[test]
    fn unique_index_rejects_duplicate() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let index = Index::open(Config::new(&path, Kind::Int).unique(true))?;

        index.insert(&Field::Int(1), Rid::from_parts(0, 0))?;
        assert!(index.insert(&Field::Int(1), Rid::from_parts(0, 1)).is_err());

        Ok(())
    }

    #[test]
    fn delete_then_lookup_finds_nothing() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let index = Index::open(Config::new(&path, Kind::Int).unique(false))?;

        index.insert(&Field::Int(7), Rid::from_parts(0, 0))?;
        assert!(index.delete(&Field::Int(7), Rid::from_parts(0, 0))?);
        assert!(!index.delete(&Field::Int(7), Rid::from_parts(0, 0))?);

        let mut cursor = index.lookup(&Field::Int(7))?;
        assert_eq!(cursor.next()?, None);

        Ok(())
    }

    #[test]
    fn range_scan_respects_bounds() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let index = Index::open(Config::new(&path, Kind::Int).unique(true))?;

        for i in 0..10 {
            index.insert(&Field::Int(i), Rid::from_parts(0, i as u32))?;
        }

        let mut cursor = index.lookup_range(Some(&Field::Int(3)), Some(&Field::Int(6)), true, false)?;
        let mut seen = Vec::new();
        while let Some(rid) = cursor.next()? {
            seen.push(rid.tuple_index());
        }
        assert_eq!(seen, vec![3, 4, 5]);

        Ok(())
    }

    #[test]
    fn flush_and_reopen_preserves_data() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        {
            let index = Index::open(Config::new(&path, Kind::Int).unique(true))?;
            index.insert(&Field::Int(5), Rid::from_parts(1, 1))?;
            index.close()?;
        }

        let index = Index::open(Config::new(&path, Kind::Int).unique(true))?;
        let mut cursor = index.lookup(&Field::Int(5))?;
        assert_eq!(cursor.next()?, Some(Rid::from_parts(1, 1)));

        Ok(())
    }

    #[test]
    fn stats_reflect_first_insert() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let index = Index::open(Config::new(&path, Kind::Int).unique(true).buffer_pool_size(16))?;

        index.insert(&Field::Int(1), Rid::from_parts(0, 0))?;

        let stats = index.stats();
        assert_eq!(stats.page_size, 4096);
        assert_eq!(stats.buffer_pool_size, 16);
        assert_ne!(stats.first_leaf_page_number, 0);

        Ok(())
    }
}
