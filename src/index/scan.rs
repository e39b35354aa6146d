//! Range and equality scan cursor.
//!
//! The cursor holds no long-lived pointer into page memory between `next`
//! calls — each call re-pins the current leaf — and relocates by
//! `(key, last_returned_rid)` rather than by numeric slot index, so it
//! survives deletion of the entry it just returned (§4.4).

use std::cmp::Ordering;

use crate::error::{IndexError, IndexResult};
use crate::key::compare_keys;
use crate::page::{PageNum, NO_MORE_NODE};
use crate::rid::Rid;

use super::handle::IndexHandle;
use super::node::LeafEntry;
use crate::pager::Pager;

/// Comparator a scan is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
    NoOp,
}

/// An open range/equality scan. Obtained from
/// [`IndexHandle::open_scan`], driven with [`IndexHandle::scan_next`], and
/// released with [`IndexHandle::close_scan`].
pub struct Scan {
    op: CompareOp,
    key: Option<Vec<u8>>,
    current_leaf: PageNum,
    last_returned: Option<(Vec<u8>, Rid)>,
    done: bool,
}

impl Scan {
    pub(super) fn new(op: CompareOp, key: Option<Vec<u8>>, start_leaf: PageNum) -> Self {
        Scan { op, key, current_leaf: start_leaf, last_returned: None, done: false }
    }
}

/// First index `i` with `entries[i].key >= target` (lower bound).
fn lower_bound(entries: &[LeafEntry], target: &[u8], attr_type: crate::key::AttrType) -> usize {
    entries
        .iter()
        .position(|e| compare_keys(attr_type, &e.key, target) != Ordering::Less)
        .unwrap_or(entries.len())
}

/// First index `i` with `entries[i].key > target` (upper bound).
fn upper_bound(entries: &[LeafEntry], target: &[u8], attr_type: crate::key::AttrType) -> usize {
    entries
        .iter()
        .position(|e| compare_keys(attr_type, &e.key, target) == Ordering::Greater)
        .unwrap_or(entries.len())
}

impl<P: Pager> IndexHandle<P> {
    /// Open a new scan. Only one scan may be open on a handle at a time.
    pub fn open_scan(&mut self, op: CompareOp, key: Option<&[u8]>) -> IndexResult<Scan> {
        if !self.is_open {
            return Err(IndexError::FileClosed);
        }
        if self.scan_open {
            return Err(IndexError::ScanOpen);
        }
        if op != CompareOp::NoOp && key.is_none() {
            return Err(IndexError::NullPointer);
        }
        let key = key.map(|k| k.to_vec());

        let start_leaf = match op {
            CompareOp::Eq | CompareOp::Ge | CompareOp::Gt => {
                self.descend_to_leaf_at_least(key.as_deref().unwrap())?
            }
            CompareOp::Lt | CompareOp::Le | CompareOp::NoOp | CompareOp::Ne => {
                self.leftmost_leaf()?
            }
        };

        self.scan_open = true;
        Ok(Scan::new(op, key, start_leaf))
    }

    /// Advance the scan, returning the next matching RID or `IxEof`.
    pub fn scan_next(&mut self, scan: &mut Scan) -> IndexResult<Rid> {
        if !self.scan_open {
            return Err(IndexError::ScanClosed);
        }
        if scan.done {
            return Err(IndexError::IxEof);
        }

        loop {
            self.pager.get_this(scan.current_leaf)?;
            let node = self.read_node_pinned(scan.current_leaf)?;
            debug_assert!(node.is_leaf, "scan must always be positioned at a leaf");

            let start_idx = match &scan.last_returned {
                None => match scan.op {
                    CompareOp::Eq | CompareOp::Ge => {
                        lower_bound(&node.leaf_entries, scan.key.as_deref().unwrap(), self.attr_type)
                    }
                    CompareOp::Gt => {
                        upper_bound(&node.leaf_entries, scan.key.as_deref().unwrap(), self.attr_type)
                    }
                    CompareOp::Lt | CompareOp::Le | CompareOp::NoOp | CompareOp::Ne => 0,
                },
                Some((last_key, _)) => lower_bound(&node.leaf_entries, last_key, self.attr_type),
            };

            if start_idx >= node.leaf_entries.len() {
                let next_leaf = node.next_node;
                self.pager.unpin(scan.current_leaf)?;
                if next_leaf == NO_MORE_NODE {
                    scan.done = true;
                    return Err(IndexError::IxEof);
                }
                scan.current_leaf = next_leaf;
                scan.last_returned = None;
                continue;
            }

            let candidate = &node.leaf_entries[start_idx];
            let satisfies = match scan.op {
                CompareOp::NoOp => true,
                CompareOp::Eq => compare_keys(self.attr_type, &candidate.key, scan.key.as_deref().unwrap()) == Ordering::Equal,
                CompareOp::Lt => compare_keys(self.attr_type, &candidate.key, scan.key.as_deref().unwrap()) == Ordering::Less,
                CompareOp::Le => compare_keys(self.attr_type, &candidate.key, scan.key.as_deref().unwrap()) != Ordering::Greater,
                CompareOp::Gt | CompareOp::Ge => true,
                CompareOp::Ne => compare_keys(self.attr_type, &candidate.key, scan.key.as_deref().unwrap()) != Ordering::Equal,
            };

            if scan.op == CompareOp::Ne && !satisfies {
                // skip entries equal to the reference key and keep scanning
                scan.last_returned = Some((candidate.key.clone(), candidate.rid));
                self.pager.unpin(scan.current_leaf)?;
                continue;
            }

            if !satisfies {
                scan.done = true;
                self.pager.unpin(scan.current_leaf)?;
                return Err(IndexError::IxEof);
            }

            let rid = candidate.rid;
            let key = candidate.key.clone();
            self.pager.unpin(scan.current_leaf)?;
            scan.last_returned = Some((key, rid));
            return Ok(rid);
        }
    }

    /// Release the scan. The handle becomes eligible for a new scan.
    pub fn close_scan(&mut self, _scan: Scan) -> IndexResult<()> {
        if !self.scan_open {
            return Err(IndexError::ScanClosed);
        }
        self.scan_open = false;
        Ok(())
    }

    fn leftmost_leaf(&mut self) -> IndexResult<PageNum> {
        let mut current = 0u32;
        loop {
            self.pager.get_this(current)?;
            let node = self.read_node_pinned(current)?;
            self.pager.unpin(current)?;
            if node.is_leaf {
                return Ok(current);
            }
            current = node.leftmost_child;
        }
    }

    /// Descend choosing `child_ptr[j]` at the first `key[j] >= target`.
    fn descend_to_leaf_at_least(&mut self, target: &[u8]) -> IndexResult<PageNum> {
        let mut current = 0u32;
        loop {
            self.pager.get_this(current)?;
            let node = self.read_node_pinned(current)?;
            self.pager.unpin(current)?;
            if node.is_leaf {
                return Ok(current);
            }
            let j = node
                .internal_entries
                .iter()
                .position(|e| compare_keys(self.attr_type, &e.key, target) != Ordering::Less)
                .unwrap_or(node.internal_entries.len());
            current = if j == 0 { node.leftmost_child } else { node.internal_entries[j - 1].child };
        }
    }
}
