//! Fixed-size page buffers and the sentinel values used to terminate
//! sibling chains and signal split/delete outcomes.

/// Page numbers are non-negative; `u32` mirrors the pager's own addressing.
pub type PageNum = u32;

/// Fixed page size for this engine. The reference engine supports several
/// page sizes as a Btrieve wire-format compatibility concern; this engine
/// has no such constraint and fixes one size.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel marking the end of a sibling chain. Page numbers are `u32` on
/// the wire (there is no page "-1"), so the sentinel is represented as
/// `u32::MAX` in storage and widened to `i64` at the API boundary wherever
/// a signed comparison against `NO_MORE_NODE` is natural to express.
pub const NO_MORE_NODE: PageNum = u32::MAX;

/// Sentinel meaning "do not propagate a split upward" returned by the
/// leaf/internal insert helpers.
pub const DONT_SPLIT: PageNum = u32::MAX;

/// Sentinel meaning "no node was disposed" returned by the delete helpers.
pub const NOT_DELETED: PageNum = u32::MAX;

/// A page is not a real tree node if its number equals any sentinel value.
pub fn is_sentinel(page_num: PageNum) -> bool {
    page_num == NO_MORE_NODE
}

/// Raw fixed-size byte buffer backing one page.
#[derive(Clone)]
pub struct Page {
    pub page_num: PageNum,
    pub data: Vec<u8>,
}

impl Page {
    pub fn new(page_num: PageNum) -> Self {
        Page {
            page_num,
            data: vec![0u8; PAGE_SIZE],
        }
    }

    pub fn from_data(page_num: PageNum, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE);
        Page { page_num, data }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").field("page_num", &self.page_num).finish()
    }
}
