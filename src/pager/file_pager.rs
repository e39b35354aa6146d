//! File-backed [`Pager`] implementation with a bounded, pin-aware buffer
//! pool.
//!
//! Grounded on the reference engine's page cache: a fixed-capacity pool
//! keyed by page number, tracking per-page pin counts. Unlike the reference
//! cache — whose `pin_count` field is bookkept but never consulted by the
//! eviction path — this pool genuinely refuses to evict a pinned frame,
//! which is what §5's pinning discipline requires of the shared resource.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{IndexError, IndexResult};
use crate::page::{PageNum, PAGE_SIZE};

use super::Pager;

/// Default number of frames kept resident. Tree operations pin at most
/// three pages at a time (§5), so this comfortably bounds in-flight pins
/// for any reasonable interleaving of concurrent scans on one handle.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

struct Frame {
    data: Vec<u8>,
    pin_count: u32,
    dirty: bool,
}

/// A [`Pager`] backed by a single file, one fixed-size page per slot.
pub struct FilePager<F> {
    file: F,
    num_pages: PageNum,
    free_list: Vec<PageNum>,
    pool: HashMap<PageNum, Frame>,
    /// Recency order of unpinned-or-pinned frames, oldest first, used to
    /// pick an eviction candidate. Pinned frames are skipped and
    /// re-appended so the scan makes progress without evicting them.
    recency: VecDeque<PageNum>,
    capacity: usize,
}

impl<F: Read + Write + Seek> FilePager<F> {
    /// Wrap `file`, assumed to already contain `existing_pages` pages (0 for
    /// a brand-new file).
    pub fn new(file: F, existing_pages: PageNum) -> Self {
        FilePager {
            file,
            num_pages: existing_pages,
            free_list: Vec::new(),
            pool: HashMap::new(),
            recency: VecDeque::new(),
            capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    pub fn with_capacity(file: F, existing_pages: PageNum, capacity: usize) -> Self {
        let mut pager = Self::new(file, existing_pages);
        pager.capacity = capacity.max(4);
        pager
    }

    pub fn into_inner(self) -> F {
        self.file
    }

    fn read_page_from_disk(&mut self, page_num: PageNum) -> IndexResult<Vec<u8>> {
        let offset = (page_num as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; PAGE_SIZE];
        self.file.read_exact(&mut data)?;
        Ok(data)
    }

    fn write_page_to_disk(&mut self, page_num: PageNum, data: &[u8]) -> IndexResult<()> {
        let offset = (page_num as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn evict_one(&mut self) -> IndexResult<()> {
        let mut scanned = 0;
        let len = self.recency.len();
        while scanned < len {
            let candidate = match self.recency.pop_front() {
                Some(p) => p,
                None => break,
            };
            scanned += 1;
            let pinned = self.pool.get(&candidate).map(|f| f.pin_count > 0).unwrap_or(true);
            if pinned {
                // Still referenced or already gone from the pool; keep
                // cycling it to the back only if it's a live pinned frame.
                if self.pool.contains_key(&candidate) {
                    self.recency.push_back(candidate);
                }
                continue;
            }
            if let Some(frame) = self.pool.remove(&candidate) {
                if frame.dirty {
                    self.write_page_to_disk(candidate, &frame.data)?;
                }
            }
            return Ok(());
        }
        Err(IndexError::Internal(
            "buffer pool exhausted: every resident frame is pinned".into(),
        ))
    }

    fn ensure_capacity(&mut self) -> IndexResult<()> {
        if self.pool.len() >= self.capacity {
            self.evict_one()?;
        }
        Ok(())
    }
}

impl<F: Read + Write + Seek> Pager for FilePager<F> {
    fn allocate(&mut self) -> IndexResult<PageNum> {
        self.ensure_capacity()?;
        let page_num = match self.free_list.pop() {
            Some(p) => p,
            None => {
                let p = self.num_pages;
                self.num_pages += 1;
                p
            }
        };
        let data = vec![0u8; PAGE_SIZE];
        self.write_page_to_disk(page_num, &data)?;
        self.pool.insert(page_num, Frame { data, pin_count: 1, dirty: false });
        self.recency.push_back(page_num);
        Ok(page_num)
    }

    fn get_this(&mut self, page_num: PageNum) -> IndexResult<()> {
        if let Some(frame) = self.pool.get_mut(&page_num) {
            frame.pin_count += 1;
            return Ok(());
        }
        self.ensure_capacity()?;
        let data = self.read_page_from_disk(page_num)?;
        self.pool.insert(page_num, Frame { data, pin_count: 1, dirty: false });
        self.recency.push_back(page_num);
        Ok(())
    }

    fn get_data(&mut self, page_num: PageNum) -> IndexResult<&mut [u8]> {
        self.pool
            .get_mut(&page_num)
            .map(|f| f.data.as_mut_slice())
            .ok_or_else(|| IndexError::Internal(format!("page {page_num} not pinned")))
    }

    fn mark_dirty(&mut self, page_num: PageNum) {
        if let Some(frame) = self.pool.get_mut(&page_num) {
            frame.dirty = true;
        }
    }

    fn unpin(&mut self, page_num: PageNum) -> IndexResult<()> {
        let frame = self
            .pool
            .get_mut(&page_num)
            .ok_or_else(|| IndexError::Internal(format!("unpin of unpinned page {page_num}")))?;
        if frame.pin_count == 0 {
            return Err(IndexError::Internal(format!("double unpin of page {page_num}")));
        }
        frame.pin_count -= 1;
        Ok(())
    }

    fn dispose(&mut self, page_num: PageNum) -> IndexResult<()> {
        if let Some(frame) = self.pool.get(&page_num) {
            if frame.pin_count > 0 {
                return Err(IndexError::Internal(format!("dispose of pinned page {page_num}")));
            }
        }
        self.pool.remove(&page_num);
        self.free_list.push(page_num);
        Ok(())
    }

    fn force_pages(&mut self) -> IndexResult<()> {
        let dirty: Vec<PageNum> = self
            .pool
            .iter()
            .filter(|(_, f)| f.dirty)
            .map(|(p, _)| *p)
            .collect();
        for page_num in dirty {
            let data = self.pool.get(&page_num).unwrap().data.clone();
            self.write_page_to_disk(page_num, &data)?;
            if let Some(frame) = self.pool.get_mut(&page_num) {
                frame.dirty = false;
            }
        }
        self.file.flush()?;
        Ok(())
    }
}
