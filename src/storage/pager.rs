//! The pager owns the database file and a cache of its pages.
//!
//! Pages are read lazily the first time they are requested and stay in memory
//! until the pager is flushed. Page `N` lives at byte offset `N * PAGE_SIZE`.
use super::btree::Node;
use crate::errors::Error;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, trace};

/// Page size 4 kilobytes because it’s the same size as a page used in
/// the virtual memory systems of most computer architectures.
pub const PAGE_SIZE: usize = 4096;

pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: u32,
    pages: Vec<Option<Box<Node>>>,
}

impl Pager {
    /// Opens (or creates) the database file.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be opened and `Error::Storage`
    /// if its length is not a whole number of pages.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let file_length = file.metadata()?.len();

        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Storage,
                "DB file is not a whole number of pages. Corrupt file."
            ));
        }

        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        debug!(path = %path.display(), file_length, num_pages, "Opened database file");

        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages: (0..num_pages).map(|_| None).collect(),
        })
    }

    /// Number of pages known to the pager, on disk or freshly allocated.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Returns the cached page, loading it from disk on first access.
    ///
    /// # Errors
    /// Returns `Error::Storage` if `page_num` was never allocated or the file
    /// is shorter than expected, and `Error::Io` on read failures.
    pub fn get_page(&mut self, page_num: u32) -> Result<&mut Node, Error> {
        if page_num >= self.num_pages {
            return Err(err!(
                Storage,
                "Tried to fetch page number out of bounds. {} >= {}",
                page_num,
                self.num_pages
            ));
        }

        let slot = &mut self.pages[page_num as usize];
        if slot.is_none() {
            let mut node = Box::new(Node::new());
            let offset = page_num as u64 * PAGE_SIZE as u64;
            if offset < self.file_length {
                trace!(page_num, "Page cache miss, reading from file");
                self.file.seek(SeekFrom::Start(offset))?;
                self.file
                    .read_exact(node.as_mut_slice())
                    .map_err(|e| match e.kind() {
                        ErrorKind::UnexpectedEof => {
                            err!(Storage, "Short read on page {}", page_num)
                        }
                        _ => Error::Io(e),
                    })?;
            }
            *slot = Some(node);
        }

        match slot.as_deref_mut() {
            Some(node) => Ok(node),
            None => Err(err!(Storage, "Page {} is not cached", page_num)),
        }
    }

    /// Appends a zeroed page and returns its number.
    ///
    /// Pages are never freed, so the next unused page is always the one after
    /// the last.
    pub fn allocate_page(&mut self) -> Result<u32, Error> {
        if self.num_pages == u32::MAX {
            return Err(err!(Storage, "Page numbers exhausted"));
        }
        let page_num = self.num_pages;
        self.pages.push(Some(Box::new(Node::new())));
        self.num_pages += 1;
        trace!(page_num, "Allocated page");
        Ok(page_num)
    }

    /// Writes every cached page back to its slot in the file.
    ///
    /// Pages that were never loaded are already on disk and are skipped.
    pub fn flush_all(&mut self) -> Result<(), Error> {
        let mut written = 0;
        for (page_num, page) in self.pages.iter().enumerate() {
            let Some(node) = page else {
                continue;
            };
            self.file
                .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.write_all(node.as_slice())?;
            written += 1;
        }
        self.file.sync_all()?;
        self.file_length = self.num_pages as u64 * PAGE_SIZE as u64;
        info!(pages = written, "Flushed pages.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.num_pages(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_open_rejects_partial_page() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 10]).unwrap();

        let result = Pager::open(&path);
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn test_get_page_out_of_bounds() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&dir.path().join("test.db")).unwrap();
        assert!(matches!(pager.get_page(0), Err(Error::Storage(_))));

        assert_eq!(pager.allocate_page().unwrap(), 0);
        assert!(pager.get_page(0).is_ok());
        assert!(pager.get_page(1).is_err());
    }

    #[test]
    fn test_flush_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut pager = Pager::open(&path).unwrap();
            for _ in 0..3 {
                pager.allocate_page().unwrap();
            }
            pager.get_page(2).unwrap().as_mut_slice()[100] = 0xAB;
            pager.flush_all().unwrap();
        }

        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            3 * PAGE_SIZE as u64
        );

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.num_pages(), 3);
        assert_eq!(pager.get_page(2).unwrap().as_slice()[100], 0xAB);
        assert_eq!(pager.get_page(1).unwrap().as_slice()[100], 0);
    }
}
