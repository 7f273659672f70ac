//! Resource manager: maps an open index file to typed page reads/writes.
//!
//! Per open file (a "resource"): an exclusive OS-level lock is held for the
//! lifetime of the handle; every page is read or written at exactly
//! `pageNumber * pageSize`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fs2::FileExt;
use parking_lot::RwLock;

use crate::error::{Result, StorageError};
use crate::page::{InnerNodePage, LeafNodePage, Page};
use crate::storage::index_header::{IndexHeader, INDEX_HEADER_SIZE};
use crate::types::{Kind, PageSize, PageType};

/// Trait for resource I/O, abstracted so the buffer pool and cache can be
/// tested against a mock implementation.
pub trait ResourceManager: Send + Sync {
    fn page_size(&self) -> PageSize;

    /// Read a single page. Bounds-checks against the file length and parses
    /// via the page-type factory.
    fn read_page(&self, page_num: u32) -> Result<Page>;

    /// Contiguous prefetch of a run of pages starting at `first_page_num`.
    fn read_pages(&self, first_page_num: u32, count: usize) -> Result<Vec<Page>>;

    /// At-position write of a single page.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Contiguous write; asserts the pages are numbered sequentially.
    fn write_pages(&self, pages: &[Page]) -> Result<()>;

    /// Allocate the next page number, initialize its header for `page_type`,
    /// and return the fresh (in-memory) page. The file is extended on its
    /// first write.
    fn reserve_new_page(&self, page_type: PageType) -> Result<Page>;

    /// Reset the file to a single empty initial leaf page.
    fn truncate(&self) -> Result<()>;

    fn header(&self) -> IndexHeader;

    /// Persist a new root page number immediately.
    fn update_root_page_number(&self, new_root: u32) -> Result<()>;

    fn close(&self) -> Result<()>;
}

pub struct FileResourceManager {
    file: RwLock<File>,
    header: RwLock<IndexHeader>,
    kind: Kind,
}

impl FileResourceManager {
    /// Open or create an index file, taking an exclusive OS-level lock that
    /// is held for the lifetime of the returned handle.
    pub fn open(path: &Path, page_size: PageSize, indexed_column_number: u32, unique: bool, kind: Kind) -> Result<Self> {
        let exists = path.exists();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        file.try_lock_exclusive().map_err(StorageError::Io)?;

        let header = if exists && file.metadata()?.len() >= INDEX_HEADER_SIZE as u64 {
            let mut file_ref = &file;
            let mut buf = vec![0u8; INDEX_HEADER_SIZE];
            file_ref.seek(SeekFrom::Start(0))?;
            file_ref.read_exact(&mut buf)?;
            IndexHeader::read(&buf)?
        } else {
            let header = IndexHeader::new(page_size, indexed_column_number, unique);
            let mut buf = vec![0u8; page_size.bytes()];
            header.write(&mut buf);
            let mut file_ref = &file;
            file_ref.seek(SeekFrom::Start(0))?;
            file_ref.write_all(&buf)?;
            file_ref.sync_all()?;
            header
        };

        Ok(Self {
            file: RwLock::new(file),
            header: RwLock::new(header),
            kind,
        })
    }

    fn offset_of(&self, page_num: u32) -> u64 {
        page_num as u64 * self.header().page_size.bytes() as u64
    }

    fn flush_header(&self) -> Result<()> {
        let header = self.header.read();
        let page_size = header.page_size.bytes();
        let mut buf = vec![0u8; page_size];
        header.write(&mut buf);
        drop(header);

        let mut file = self.file.write();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        Ok(())
    }

    fn parse_page(&self, page_num: u32, bytes: &[u8]) -> Result<Page> {
        let generic = crate::page::GenericHeader::read(bytes)?;
        let page = match generic.page_type {
            PageType::InnerNode => Page::Inner(InnerNodePage::parse(bytes, self.kind)?),
            PageType::LeafNode => Page::Leaf(LeafNodePage::parse(bytes, self.kind)?),
        };
        if page.page_number() != page_num {
            return Err(StorageError::page_format(
                crate::types::PageId::new(page_num),
                "page number mismatch between slot and header",
            ));
        }
        Ok(page)
    }
}

impl ResourceManager for FileResourceManager {
    fn page_size(&self) -> PageSize {
        self.header().page_size
    }

    fn read_page(&self, page_num: u32) -> Result<Page> {
        if page_num == 0 {
            return Err(StorageError::illegal_operation("page 0 is the resource header, not a node page"));
        }
        let page_size = self.page_size().bytes();
        let offset = self.offset_of(page_num);

        let mut file = self.file.write();
        let len = file.metadata()?.len();
        if offset + page_size as u64 > len {
            return Err(StorageError::PageNotFound(crate::types::PageId::new(page_num)));
        }
        let mut buf = vec![0u8; page_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        drop(file);
        self.parse_page(page_num, &buf)
    }

    fn read_pages(&self, first_page_num: u32, count: usize) -> Result<Vec<Page>> {
        let mut pages = Vec::with_capacity(count);
        for i in 0..count as u32 {
            pages.push(self.read_page(first_page_num + i)?);
        }
        Ok(pages)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let page_size = self.page_size().bytes();
        let offset = self.offset_of(page.page_number());
        let bytes = page.as_bytes();
        if bytes.len() != page_size {
            return Err(StorageError::bad_format("page buffer does not match configured page size"));
        }
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn write_pages(&self, pages: &[Page]) -> Result<()> {
        for window in pages.windows(2) {
            if window[1].page_number() != window[0].page_number() + 1 {
                return Err(StorageError::illegal_operation(
                    "write_pages requires sequentially numbered pages",
                ));
            }
        }
        for page in pages {
            self.write_page(page)?;
        }
        Ok(())
    }

    fn reserve_new_page(&self, page_type: PageType) -> Result<Page> {
        let page_size = self.page_size().bytes();
        let len = self.file.read().metadata()?.len();
        let page_num = (len / page_size as u64) as u32;

        let page = match page_type {
            PageType::InnerNode => Page::Inner(InnerNodePage::new_empty(page_num, page_size, self.kind)?),
            PageType::LeafNode => Page::Leaf(LeafNodePage::new_empty(page_num, page_size, self.kind)?),
        };
        self.write_page(&page)?;

        if page_type == PageType::LeafNode {
            let mut header = self.header.write();
            if header.first_leaf_page_number == 0 {
                header.first_leaf_page_number = page_num;
            }
        }
        self.flush_header()?;
        Ok(page)
    }

    fn truncate(&self) -> Result<()> {
        let page_size = self.page_size().bytes();
        {
            let mut file = self.file.write();
            file.set_len(page_size as u64)?;
        }
        {
            let mut header = self.header.write();
            header.root_page_number = 0;
            header.first_leaf_page_number = 0;
        }
        self.flush_header()?;

        let leaf = self.reserve_new_page(PageType::LeafNode)?;
        self.update_root_page_number(leaf.page_number())
    }

    fn header(&self) -> IndexHeader {
        *self.header.read()
    }

    fn update_root_page_number(&self, new_root: u32) -> Result<()> {
        {
            let mut header = self.header.write();
            header.root_page_number = new_root;
        }
        self.flush_header()
    }

    fn close(&self) -> Result<()> {
        self.flush_header()?;
        let file = self.file.write();
        file.sync_all()?;
        file.unlock()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_reopen_preserves_header() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let rm = FileResourceManager::open(&path, PageSize::Kb4, 0, true, Kind::Int)?;
            rm.truncate()?;
            rm.update_root_page_number(1)?;
        }

        let rm = FileResourceManager::open(&path, PageSize::Kb4, 0, true, Kind::Int)?;
        let header = rm.header();
        assert_eq!(header.root_page_number, 1);
        assert_eq!(header.first_leaf_page_number, 1);
        assert!(header.unique);
        Ok(())
    }

    #[test]
    fn reserve_and_read_back_page() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let rm = FileResourceManager::open(&path, PageSize::Kb4, 0, false, Kind::Int)?;
        rm.truncate()?;

        let page = rm.reserve_new_page(PageType::LeafNode)?;
        let page_num = page.page_number();
        rm.write_page(&page)?;

        let read_back = rm.read_page(page_num)?;
        assert_eq!(read_back.page_number(), page_num);
        Ok(())
    }
}
