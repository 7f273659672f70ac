//! `BTreeIndex`: ordered mapping from a fixed-width key to a set of RIDs,
//! persistent across page boundaries via the buffer pool.

use std::sync::Arc;

use log::{debug, trace};

use crate::btree::cursor::{EntryCursor, KeyCursor, RidCursor};
use crate::buffer::BufferPool;
use crate::error::{Result, StorageError};
use crate::page::Page;
use crate::storage::ResourceManager;
use crate::types::{Field, Kind, PageType, Rid};

pub struct BTreeIndex {
    buffer_pool: Arc<dyn BufferPool>,
    resource_manager: Arc<dyn ResourceManager>,
    kind: Kind,
    unique: bool,
}

impl BTreeIndex {
    /// `kind` is the indexed column's scalar type; the resource header
    /// only records its ordinal position, not its type, so the catalog
    /// (out of scope here) must supply it. `unique` mirrors the flag
    /// already persisted in the resource header at file-creation time.
    pub fn new(buffer_pool: Arc<dyn BufferPool>, resource_manager: Arc<dyn ResourceManager>, kind: Kind, unique: bool) -> Self {
        Self {
            buffer_pool,
            resource_manager,
            kind,
            unique,
        }
    }

    fn root_page_number(&self) -> u32 {
        self.resource_manager.header().root_page_number
    }

    fn encode_key(&self, key: &Field) -> Result<Vec<u8>> {
        let width = self.kind.key_byte_len()?;
        let mut buf = vec![0u8; width];
        key.encode(&mut buf, 0)?;
        Ok(buf)
    }

    fn decode_key(&self, bytes: &[u8]) -> Result<Field> {
        Field::decode(self.kind, bytes, 0, bytes.len())
    }

    fn ensure_root(&self) -> Result<()> {
        if self.root_page_number() != 0 {
            return Ok(());
        }
        let page = self.buffer_pool.new_page(PageType::LeafNode)?;
        let page_number = page.read().page_number();
        self.buffer_pool.unpin(page_number)?;
        self.resource_manager.update_root_page_number(page_number)?;
        Ok(())
    }

    /// Descend from the root picking, at each inner node, the smallest
    /// position `i` with `key[i] >= target` (or the last pointer if none),
    /// left-biased on ties. `lo_bytes = None` always takes the leftmost
    /// child, reaching the first leaf in the tree.
    fn descend_to_leaf(&self, lo_bytes: Option<&[u8]>) -> Result<Option<(u32, Arc<parking_lot::RwLock<Page>>)>> {
        let root = self.root_page_number();
        if root == 0 {
            return Ok(None);
        }
        let mut current = root;
        loop {
            let page_arc = self.buffer_pool.get_and_pin(current)?;
            let is_leaf = page_arc.read().is_leaf();
            if is_leaf {
                return Ok(Some((current, page_arc)));
            }
            let next = {
                let guard = page_arc.read();
                let inner = guard.as_inner().expect("checked is_leaf above");
                match lo_bytes {
                    Some(lb) => inner.find_child(lb)?,
                    None => inner.child_at(0),
                }
            };
            self.buffer_pool.unpin(current)?;
            current = next;
        }
    }

    fn build_cursor(&self, lo: Option<&Field>, hi: Option<&Field>, lo_incl: bool, hi_incl: bool) -> Result<EntryCursor> {
        let lo_bytes = lo.map(|f| self.encode_key(f)).transpose()?;
        let hi_bytes = hi.map(|f| self.encode_key(f)).transpose()?;

        let Some((page_number, page_arc)) = self.descend_to_leaf(lo_bytes.as_deref())? else {
            return Ok(EntryCursor::empty(Arc::clone(&self.buffer_pool), self.kind));
        };

        let mut pos = match &lo_bytes {
            Some(lb) => page_arc.read().as_leaf().expect("descend_to_leaf returns a leaf").lower_bound(lb)?,
            None => 0,
        };

        if let (Some(lb), false) = (&lo_bytes, lo_incl) {
            let lo_field = self.decode_key(lb)?;
            loop {
                let guard = page_arc.read();
                let leaf = guard.as_leaf().unwrap();
                if pos >= leaf.num_entries() {
                    break;
                }
                let candidate = self.decode_key(leaf.key_at(pos))?;
                if Field::compare(&candidate, &lo_field)? == 0 {
                    pos += 1;
                } else {
                    break;
                }
            }
        }

        let next_leaf = { page_arc.read().as_leaf().unwrap().next_leaf() };
        if let Some(pn) = next_leaf {
            let _ = self.buffer_pool.prefetch(pn);
        }

        Ok(EntryCursor::new(
            Arc::clone(&self.buffer_pool),
            self.kind,
            page_number,
            page_arc,
            pos,
            hi_bytes,
            hi_incl,
        ))
    }

    /// Exact-match lookup; possibly many RIDs for a non-unique index.
    pub fn lookup_rids(&self, key: &Field) -> Result<RidCursor> {
        Ok(RidCursor {
            inner: self.build_cursor(Some(key), Some(key), true, true)?,
        })
    }

    pub fn lookup_range_rids(
        &self,
        lo: Option<&Field>,
        hi: Option<&Field>,
        lo_incl: bool,
        hi_incl: bool,
    ) -> Result<RidCursor> {
        Ok(RidCursor {
            inner: self.build_cursor(lo, hi, lo_incl, hi_incl)?,
        })
    }

    pub fn lookup_range_keys(
        &self,
        lo: Option<&Field>,
        hi: Option<&Field>,
        lo_incl: bool,
        hi_incl: bool,
    ) -> Result<KeyCursor> {
        Ok(KeyCursor {
            inner: self.build_cursor(lo, hi, lo_incl, hi_incl)?,
        })
    }

    /// Insert `(key, rid)`. Fails with `Duplicate` on a unique index if the
    /// key is already present.
    pub fn insert(&self, key: &Field, rid: Rid) -> Result<()> {
        self.ensure_root()?;
        let key_bytes = self.encode_key(key)?;
        let root = self.root_page_number();

        if let Some((separator, new_child)) = self.insert_recursive(root, &key_bytes, rid)? {
            self.split_root(separator, root, new_child)?;
        }
        Ok(())
    }

    fn insert_recursive(&self, page_number: u32, key_bytes: &[u8], rid: Rid) -> Result<Option<(Vec<u8>, u32)>> {
        let page_arc = self.buffer_pool.get_and_pin(page_number)?;
        let is_leaf = page_arc.read().is_leaf();

        if is_leaf {
            let needs_split = {
                let mut guard = page_arc.write();
                let leaf = guard.as_leaf_mut().expect("checked is_leaf above");
                match leaf.insert(key_bytes, rid, self.unique) {
                    Ok(()) => false,
                    Err(StorageError::PageFull { .. }) => true,
                    Err(e) => {
                        drop(guard);
                        self.buffer_pool.unpin(page_number)?;
                        return Err(e);
                    }
                }
            };

            if !needs_split {
                self.buffer_pool.mark_dirty(page_number)?;
                self.buffer_pool.unpin(page_number)?;
                return Ok(None);
            }

            trace!("leaf {page_number} full, splitting on insert");
            let result = self.split_leaf_and_insert(page_number, &page_arc, key_bytes, rid)?;
            self.buffer_pool.unpin(page_number)?;
            return Ok(Some(result));
        }

        let child = {
            let guard = page_arc.read();
            guard.as_inner().expect("not a leaf").find_child(key_bytes)?
        };
        self.buffer_pool.unpin(page_number)?;

        let Some((separator, new_child)) = self.insert_recursive(child, key_bytes, rid)? else {
            return Ok(None);
        };

        let page_arc = self.buffer_pool.get_and_pin(page_number)?;
        let needs_split = {
            let mut guard = page_arc.write();
            let inner = guard.as_inner_mut().expect("not a leaf");
            match inner.insert(&separator, new_child) {
                Ok(()) => false,
                Err(StorageError::PageFull { .. }) => true,
                Err(e) => {
                    drop(guard);
                    self.buffer_pool.unpin(page_number)?;
                    return Err(e);
                }
            }
        };

        if !needs_split {
            self.buffer_pool.mark_dirty(page_number)?;
            self.buffer_pool.unpin(page_number)?;
            return Ok(None);
        }

        trace!("inner node {page_number} full, splitting on propagate");
        let result = self.split_inner_and_insert(page_number, &page_arc, &separator, new_child)?;
        self.buffer_pool.unpin(page_number)?;
        Ok(Some(result))
    }

    fn split_leaf_and_insert(
        &self,
        page_number: u32,
        page_arc: &Arc<parking_lot::RwLock<Page>>,
        key_bytes: &[u8],
        rid: Rid,
    ) -> Result<(Vec<u8>, u32)> {
        let new_page = self.buffer_pool.new_page(PageType::LeafNode)?;
        let new_page_number = new_page.read().page_number();

        let separator = {
            let mut guard = page_arc.write();
            let left = guard.as_leaf_mut().expect("checked is_leaf above");
            let mut right = left.split(new_page_number)?;

            let sep = right.first_key().expect("right half non-empty after split").to_vec();
            let sep_field = self.decode_key(&sep)?;
            let target = self.decode_key(key_bytes)?;

            if Field::compare(&target, &sep_field)? >= 0 {
                right.insert(key_bytes, rid, self.unique)?;
            } else {
                left.insert(key_bytes, rid, self.unique)?;
            }

            *new_page.write() = Page::Leaf(right);
            sep
        };

        self.buffer_pool.mark_dirty(page_number)?;
        self.buffer_pool.mark_dirty(new_page_number)?;
        self.buffer_pool.unpin(new_page_number)?;
        debug!("split leaf {page_number} -> new leaf {new_page_number}, separator promoted");
        Ok((separator, new_page_number))
    }

    fn split_inner_and_insert(
        &self,
        page_number: u32,
        page_arc: &Arc<parking_lot::RwLock<Page>>,
        sep_key: &[u8],
        new_child: u32,
    ) -> Result<(Vec<u8>, u32)> {
        let new_page = self.buffer_pool.new_page(PageType::InnerNode)?;
        let new_page_number = new_page.read().page_number();

        let promoted = {
            let mut guard = page_arc.write();
            let left = guard.as_inner_mut().expect("checked is_leaf above");
            let (promoted, mut right) = left.split(new_page_number)?;

            let promoted_field = self.decode_key(&promoted)?;
            let target = self.decode_key(sep_key)?;

            if Field::compare(&target, &promoted_field)? >= 0 {
                right.insert(sep_key, new_child)?;
            } else {
                left.insert(sep_key, new_child)?;
            }

            *new_page.write() = Page::Inner(right);
            promoted
        };

        self.buffer_pool.mark_dirty(page_number)?;
        self.buffer_pool.mark_dirty(new_page_number)?;
        self.buffer_pool.unpin(new_page_number)?;
        debug!("split inner node {page_number} -> new inner node {new_page_number}, key dropped not copied");
        Ok((promoted, new_page_number))
    }

    fn split_root(&self, separator: Vec<u8>, old_root: u32, new_child: u32) -> Result<()> {
        let new_root = self.buffer_pool.new_page(PageType::InnerNode)?;
        let new_root_number = new_root.read().page_number();
        {
            let mut guard = new_root.write();
            let inner = guard.as_inner_mut().expect("just created as an inner node");
            inner.set_first_child(old_root);
            inner.insert(&separator, new_child)?;
        }
        self.buffer_pool.mark_dirty(new_root_number)?;
        self.buffer_pool.unpin(new_root_number)?;
        self.resource_manager.update_root_page_number(new_root_number)?;
        debug!("root split: new root {new_root_number} over {old_root} and {new_child}");
        Ok(())
    }

    /// Leaf-local delete of a single `(key, rid)` pair. Does not rebalance
    /// with siblings; a leaf may become sparse.
    pub fn delete_key_rid_pair(&self, key: &Field, rid: Rid) -> Result<bool> {
        let key_bytes = self.encode_key(key)?;
        let Some((page_number, page_arc)) = self.descend_to_leaf(Some(&key_bytes))? else {
            return Ok(false);
        };
        let deleted = {
            let mut guard = page_arc.write();
            let leaf = guard.as_leaf_mut().expect("descend_to_leaf returns a leaf");
            leaf.delete(&key_bytes, rid)?
        };
        if deleted {
            self.buffer_pool.mark_dirty(page_number)?;
        }
        self.buffer_pool.unpin(page_number)?;
        Ok(deleted)
    }
}
