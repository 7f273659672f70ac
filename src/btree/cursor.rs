//! Lazy, finite, non-restartable cursors over a leaf chain.
//!
//! A cursor holds at most one pinned leaf at a time. Advancing past the
//! last entry pins the next leaf (prefetched ahead of time where
//! possible), unpins the one it was holding, and continues. Dropping a
//! cursor before exhaustion still unpins whatever leaf it was holding.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::buffer::BufferPool;
use crate::error::Result;
use crate::page::Page;
use crate::types::{Field, Kind, Rid};

struct CursorLeaf {
    page_number: u32,
    page: Arc<RwLock<Page>>,
    pos: usize,
}

pub(crate) struct EntryCursor {
    buffer_pool: Arc<dyn BufferPool>,
    kind: Kind,
    hi: Option<Vec<u8>>,
    hi_incl: bool,
    current: Option<CursorLeaf>,
}

impl EntryCursor {
    pub(crate) fn empty(buffer_pool: Arc<dyn BufferPool>, kind: Kind) -> Self {
        Self {
            buffer_pool,
            kind,
            hi: None,
            hi_incl: true,
            current: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        buffer_pool: Arc<dyn BufferPool>,
        kind: Kind,
        page_number: u32,
        page: Arc<RwLock<Page>>,
        pos: usize,
        hi: Option<Vec<u8>>,
        hi_incl: bool,
    ) -> Self {
        Self {
            buffer_pool,
            kind,
            hi,
            hi_incl,
            current: Some(CursorLeaf { page_number, page, pos }),
        }
    }

    fn finish(&mut self) {
        if let Some(cur) = self.current.take() {
            let _ = self.buffer_pool.unpin(cur.page_number);
        }
    }

    pub(crate) fn next_pair(&mut self) -> Result<Option<(Field, Rid)>> {
        loop {
            let Some(cur) = self.current.as_mut() else {
                return Ok(None);
            };

            let (entry, next_leaf) = {
                let guard = cur.page.read();
                let leaf = guard.as_leaf().expect("cursor only holds leaf pages");
                if cur.pos < leaf.num_entries() {
                    let key = leaf.key_at(cur.pos).to_vec();
                    let rid = leaf.rid_at(cur.pos)?;
                    (Some((key, rid)), leaf.next_leaf())
                } else {
                    (None, leaf.next_leaf())
                }
            };

            if let Some((key_bytes, rid)) = entry {
                let field = Field::decode(self.kind, &key_bytes, 0, key_bytes.len())?;
                if let Some(hi) = &self.hi {
                    let hi_field = Field::decode(self.kind, hi, 0, hi.len())?;
                    let cmp = Field::compare(&field, &hi_field)?;
                    if cmp > 0 || (cmp == 0 && !self.hi_incl) {
                        self.finish();
                        return Ok(None);
                    }
                }
                cur.pos += 1;
                return Ok(Some((field, rid)));
            }

            let finished_page_number = cur.page_number;
            match next_leaf {
                Some(next_pn) => {
                    let next_page = self.buffer_pool.get_and_pin(next_pn)?;
                    self.buffer_pool.unpin(finished_page_number)?;
                    let next_next = {
                        let guard = next_page.read();
                        guard.as_leaf().and_then(|l| l.next_leaf())
                    };
                    if let Some(pn) = next_next {
                        let _ = self.buffer_pool.prefetch(pn);
                    }
                    self.current = Some(CursorLeaf {
                        page_number: next_pn,
                        page: next_page,
                        pos: 0,
                    });
                }
                None => {
                    self.buffer_pool.unpin(finished_page_number)?;
                    self.current = None;
                }
            }
        }
    }
}

impl Drop for EntryCursor {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Cursor over the RIDs matched by a point or range lookup.
pub struct RidCursor {
    pub(crate) inner: EntryCursor,
}

impl RidCursor {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Rid>> {
        Ok(self.inner.next_pair()?.map(|(_, rid)| rid))
    }
}

/// Cursor over the keys matched by a range lookup (one entry per indexed
/// row, so a key with several RIDs is yielded once per RID).
pub struct KeyCursor {
    pub(crate) inner: EntryCursor,
}

impl KeyCursor {
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Field>> {
        Ok(self.inner.next_pair()?.map(|(key, _)| key))
    }
}
