//! Index handle: recursive descent insertion and deletion, splits, lazy
//! deletion, and root contraction.

use std::cmp::Ordering;

use crate::error::{IndexError, IndexResult};
use crate::key::{compare_keys, AttrType};
use crate::page::{Page, PageNum, NO_MORE_NODE};
use crate::pager::Pager;
use crate::rid::Rid;

use super::node::{IndexNode, InternalEntry, LeafEntry};

/// Number of sibling leaves a leftward duplicate-key walk may cross before
/// it is logged as a diagnostic signal for pathological duplicate
/// clustering (SPEC_FULL.md §B.3).
const DUPLICATE_WALK_WARN_THRESHOLD: u32 = 8;

/// Owns a pager file handle and implements the tree-maintenance
/// primitives. Parameterized over the [`Pager`] implementation so the
/// concrete page store (e.g. [`crate::pager::FilePager`]) can be swapped
/// without touching this logic.
pub struct IndexHandle<P: Pager> {
    pub(super) pager: P,
    pub(super) attr_type: AttrType,
    pub(super) attr_length: u16,
    pub(super) is_open: bool,
    pub(super) scan_open: bool,
}

enum InsertOutcome {
    Done,
    Split { separator_key: Vec<u8>, new_page: PageNum },
}

enum DeleteOutcome {
    Ok { smallest_key: Option<Vec<u8>> },
    /// The named page was disposed. Carries the page's own identity because
    /// the leftward duplicate walk may dispose a page that is not the one
    /// the caller actually recursed into (see `erase_child`).
    Disposed(PageNum),
}

impl<P: Pager> IndexHandle<P> {
    pub(crate) fn new(pager: P, attr_type: AttrType, attr_length: u16) -> Self {
        IndexHandle { pager, attr_type, attr_length, is_open: true, scan_open: false }
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    pub fn attr_length(&self) -> u16 {
        self.attr_length
    }

    /// Forward all dirty pages to stable storage.
    pub fn force(&mut self) -> IndexResult<()> {
        if !self.is_open {
            return Err(IndexError::FileClosed);
        }
        self.pager.force_pages()
    }

    pub(crate) fn mark_closed(&mut self) {
        self.is_open = false;
    }

    pub(super) fn read_node_pinned(&mut self, page_num: PageNum) -> IndexResult<IndexNode> {
        let attr_length = self.attr_length;
        let data = self.pager.get_data(page_num)?;
        let page = Page::from_data(page_num, data.to_vec());
        IndexNode::from_page(&page, attr_length)
    }

    pub(super) fn write_node(&mut self, node: &IndexNode) -> IndexResult<()> {
        let mut page = Page::new(node.page_num);
        node.write_to_page(&mut page, self.attr_type, self.attr_length)?;
        let data = self.pager.get_data(node.page_num)?;
        data.copy_from_slice(&page.data);
        self.pager.mark_dirty(node.page_num);
        Ok(())
    }

    fn key_cmp(&self, a: &[u8], b: &[u8]) -> Ordering {
        compare_keys(self.attr_type, a, b)
    }

    /// First `j` with `internal_entries[j].key` strictly greater than `key`;
    /// `j == len` means "follow the rightmost child". Used by both insert
    /// and delete descent, per the "ties descend left of equal keys" rule.
    fn descend_index(&self, node: &IndexNode, key: &[u8]) -> usize {
        node.internal_entries
            .iter()
            .position(|e| self.key_cmp(&e.key, key) == Ordering::Greater)
            .unwrap_or(node.internal_entries.len())
    }

    fn child_at(&self, node: &IndexNode, j: usize) -> PageNum {
        if j == 0 {
            node.leftmost_child
        } else {
            node.internal_entries[j - 1].child
        }
    }

    // ---------------------------------------------------------------
    // Insertion
    // ---------------------------------------------------------------

    pub fn insert_entry(&mut self, key: Option<&[u8]>, rid: Rid) -> IndexResult<()> {
        if !self.is_open {
            return Err(IndexError::FileClosed);
        }
        let key = key.ok_or(IndexError::NullPointer)?;
        if !rid.is_viable() {
            return Err(IndexError::InviableRid);
        }
        debug_assert_eq!(key.len(), self.attr_length as usize);

        match self.insert(0, key, rid)? {
            InsertOutcome::Done => Ok(()),
            InsertOutcome::Split { separator_key, new_page } => {
                self.split_root(separator_key, new_page)
            }
        }
    }

    fn insert(&mut self, page_num: PageNum, key: &[u8], rid: Rid) -> IndexResult<InsertOutcome> {
        self.pager.get_this(page_num)?;
        let result = self.insert_inner(page_num, key, rid);
        self.pager.unpin(page_num)?;
        result
    }

    fn insert_inner(&mut self, page_num: PageNum, key: &[u8], rid: Rid) -> IndexResult<InsertOutcome> {
        let node = self.read_node_pinned(page_num)?;

        if node.is_leaf {
            self.check_duplicate_leftward(&node, key, rid)?;
            self.insert_into_leaf(node, key, rid)
        } else {
            let j = self.descend_index(&node, key);
            let child = self.child_at(&node, j);
            match self.insert(child, key, rid)? {
                InsertOutcome::Done => Ok(InsertOutcome::Done),
                InsertOutcome::Split { separator_key, new_page } => {
                    self.insert_separator_into_internal(node, child, separator_key, new_page)
                }
            }
        }
    }

    /// Scan this leaf right-to-left for `(key, rid)`; if absent but the
    /// leaf's smallest key equals `key`, the run of duplicates may extend
    /// into `prev_node`, so continue the check there without inserting
    /// anywhere. Iterative so at most one sibling leaf is pinned at a time
    /// (§5: "every path pins at most one page at a time" outside split).
    fn check_duplicate_leftward(&mut self, node: &IndexNode, key: &[u8], rid: Rid) -> IndexResult<()> {
        for entry in node.leaf_entries.iter().rev() {
            if self.key_cmp(&entry.key, key) == Ordering::Equal && entry.rid == rid {
                return Err(IndexError::EntryExists);
            }
        }

        let mut continues_left = node
            .leaf_entries
            .first()
            .map(|e| self.key_cmp(&e.key, key) == Ordering::Equal)
            .unwrap_or(false);
        let mut current_prev = node.prev_node;
        let mut hops = 0u32;

        while continues_left && current_prev != NO_MORE_NODE {
            self.pager.get_this(current_prev)?;
            let prev_node = self.read_node_pinned(current_prev);
            let prev_node = match prev_node {
                Ok(n) => n,
                Err(e) => {
                    self.pager.unpin(current_prev)?;
                    return Err(e);
                }
            };

            for entry in prev_node.leaf_entries.iter().rev() {
                if self.key_cmp(&entry.key, key) == Ordering::Equal && entry.rid == rid {
                    self.pager.unpin(current_prev)?;
                    return Err(IndexError::EntryExists);
                }
            }

            hops += 1;
            if hops == DUPLICATE_WALK_WARN_THRESHOLD {
                tracing::warn!(hops, key_len = key.len(), "long duplicate-key walk during insert");
            }

            continues_left = prev_node
                .leaf_entries
                .first()
                .map(|e| self.key_cmp(&e.key, key) == Ordering::Equal)
                .unwrap_or(false);
            let next_prev = prev_node.prev_node;
            self.pager.unpin(current_prev)?;
            current_prev = next_prev;
        }
        Ok(())
    }

    fn insert_into_leaf(&mut self, mut node: IndexNode, key: &[u8], rid: Rid) -> IndexResult<InsertOutcome> {
        let entry_size = IndexNode::leaf_entry_size(self.attr_length);
        let would_fit =
            super::node::HEADER_SIZE + (node.leaf_entries.len() + 1) * entry_size <= crate::page::PAGE_SIZE;

        if would_fit {
            let pos = node
                .leaf_entries
                .iter()
                .position(|e| self.key_cmp(&e.key, key) == Ordering::Greater)
                .unwrap_or(node.leaf_entries.len());
            node.leaf_entries.insert(pos, LeafEntry { key: key.to_vec(), rid });
            self.write_node(&node)?;
            Ok(InsertOutcome::Done)
        } else {
            self.split_leaf_and_insert(node, key, rid)
        }
    }

    fn split_leaf_and_insert(&mut self, mut node: IndexNode, key: &[u8], rid: Rid) -> IndexResult<InsertOutcome> {
        let pivot = node.leaf_entries.len() / 2;
        let insert_right = self.key_cmp(key, &node.leaf_entries[pivot].key) == Ordering::Greater;

        let new_page_num = self.pager.allocate()?;
        let mut right = IndexNode::new_leaf(new_page_num);
        right.leaf_entries = node.leaf_entries.split_off(pivot);

        let old_next = node.next_node;
        right.prev_node = node.page_num;
        right.next_node = old_next;
        node.next_node = new_page_num;

        if old_next != NO_MORE_NODE {
            self.patch_neighbor_prev(old_next, new_page_num)?;
        }

        let target = if insert_right { &mut right.leaf_entries } else { &mut node.leaf_entries };
        let pos = target
            .iter()
            .position(|e| self.key_cmp(&e.key, key) == Ordering::Greater)
            .unwrap_or(target.len());
        target.insert(pos, LeafEntry { key: key.to_vec(), rid });

        let separator = right.leaf_entries[0].key.clone();
        self.write_node(&node)?;
        self.write_node(&right)?;
        self.pager.unpin(new_page_num)?;

        Ok(InsertOutcome::Split { separator_key: separator, new_page: new_page_num })
    }

    fn patch_neighbor_prev(&mut self, neighbor: PageNum, new_prev: PageNum) -> IndexResult<()> {
        self.pager.get_this(neighbor)?;
        let mut n = self.read_node_pinned(neighbor)?;
        n.prev_node = new_prev;
        self.write_node(&n)?;
        self.pager.unpin(neighbor)
    }

    fn patch_neighbor_next(&mut self, neighbor: PageNum, new_next: PageNum) -> IndexResult<()> {
        self.pager.get_this(neighbor)?;
        let mut n = self.read_node_pinned(neighbor)?;
        n.next_node = new_next;
        self.write_node(&n)?;
        self.pager.unpin(neighbor)
    }

    /// `(key, child)` propagated up after the child at `old_child` split.
    fn insert_separator_into_internal(
        &mut self,
        mut node: IndexNode,
        old_child: PageNum,
        sep_key: Vec<u8>,
        new_child: PageNum,
    ) -> IndexResult<InsertOutcome> {
        let j = if node.leftmost_child == old_child {
            0
        } else {
            1 + node
                .internal_entries
                .iter()
                .position(|e| e.child == old_child)
                .ok_or_else(|| IndexError::invariant("split child not found in parent"))?
        };

        let entry_size = IndexNode::internal_entry_size(self.attr_length);
        let would_fit = super::node::HEADER_SIZE
            + std::mem::size_of::<PageNum>()
            + (node.internal_entries.len() + 1) * entry_size
            <= crate::page::PAGE_SIZE;

        if would_fit {
            node.internal_entries.insert(j, InternalEntry { key: sep_key, child: new_child });
            self.write_node(&node)?;
            Ok(InsertOutcome::Done)
        } else {
            self.split_internal_and_insert(node, j, sep_key, new_child)
        }
    }

    /// Split an overflowing internal node, using the unified "median
    /// promote" construction: build the conceptual n+1-entry array with the
    /// new entry spliced in at position `j`, then split it into a left half,
    /// a promoted median (propagated upward, placed in neither half), and a
    /// right half whose `leftmost_child` is the promoted entry's child.
    /// This single construction reproduces all three cases the original
    /// source special-cases (new entry left of pivot, right of pivot, or
    /// exactly at the pivot) and preserves (I5) by induction, since the
    /// promoted key already equalled the smallest key of its right subtree
    /// before the split.
    fn split_internal_and_insert(
        &mut self,
        mut node: IndexNode,
        j: usize,
        sep_key: Vec<u8>,
        new_child: PageNum,
    ) -> IndexResult<InsertOutcome> {
        let n = node.internal_entries.len();
        let pivot = (n + 1) / 2;
        let new_page_num = self.pager.allocate()?;

        let mut combined = node.internal_entries.clone();
        combined.insert(j, InternalEntry { key: sep_key, child: new_child });

        let right_entries = combined.split_off(pivot + 1);
        let promoted = combined.split_off(pivot).into_iter().next().unwrap();
        let left_entries = combined;

        let old_next = node.next_node;
        let mut right = IndexNode::new_internal(new_page_num, promoted.child);
        right.internal_entries = right_entries;
        right.prev_node = node.page_num;
        right.next_node = old_next;

        node.internal_entries = left_entries;
        node.next_node = new_page_num;

        if old_next != NO_MORE_NODE {
            self.patch_neighbor_prev(old_next, new_page_num)?;
        }

        self.write_node(&node)?;
        self.write_node(&right)?;
        self.pager.unpin(new_page_num)?;

        Ok(InsertOutcome::Split { separator_key: promoted.key, new_page: new_page_num })
    }

    /// Fixed-root discipline: copy the former root's (already split, left
    /// half) contents into a fresh page `L`, then re-initialize page 0 as a
    /// new internal root pointing at `L` and the split's right sibling.
    fn split_root(&mut self, separator_key: Vec<u8>, new_right: PageNum) -> IndexResult<()> {
        self.pager.get_this(0)?;
        let former_root = self.read_node_pinned(0)?;
        self.pager.unpin(0)?;

        let left_page_num = self.pager.allocate()?;
        let mut left = former_root;
        left.page_num = left_page_num;
        left.prev_node = NO_MORE_NODE;
        // The split that produced `new_right` set `next_node = new_right` on
        // the node while it was still page 0, but page 0's header always
        // overloads prev/next as (attr_type, attr_length) on every read and
        // write (node.rs), so that link never survived the round trip
        // through storage. Re-establish it explicitly now that `left` is a
        // page whose header is a real sibling pointer again.
        left.next_node = new_right;
        self.write_node(&left)?;
        self.pager.unpin(left_page_num)?;

        self.patch_neighbor_prev(new_right, left_page_num)?;

        self.pager.get_this(0)?;
        let mut new_root = IndexNode::new_internal(0, left_page_num);
        new_root.internal_entries.push(InternalEntry { key: separator_key, child: new_right });
        self.write_node(&new_root)?;
        self.pager.unpin(0)?;

        tracing::debug!(left_page_num, new_right, "root split");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Deletion
    // ---------------------------------------------------------------

    pub fn delete_entry(&mut self, key: Option<&[u8]>, rid: Rid) -> IndexResult<()> {
        if !self.is_open {
            return Err(IndexError::FileClosed);
        }
        let key = key.ok_or(IndexError::NullPointer)?;
        if !rid.is_viable() {
            return Err(IndexError::InviableRid);
        }

        match self.delete(0, key, rid)? {
            DeleteOutcome::Disposed(_) => {
                Err(IndexError::invariant("root reported itself disposed"))
            }
            DeleteOutcome::Ok { .. } => {
                self.maybe_contract_root()?;
                Ok(())
            }
        }
    }

    fn delete(&mut self, page_num: PageNum, key: &[u8], rid: Rid) -> IndexResult<DeleteOutcome> {
        self.pager.get_this(page_num)?;
        let result = self.delete_inner(page_num, key, rid);
        // If `page_num` itself was the page disposed, `remove_leaf_entry`
        // already unpinned (and disposed) it. Otherwise the leftward
        // duplicate walk disposed a *different*, earlier leaf, and this
        // pin is still ours to release.
        let already_released = matches!(&result, Ok(DeleteOutcome::Disposed(p)) if *p == page_num);
        if !already_released {
            self.pager.unpin(page_num)?;
        }
        result
    }

    fn delete_inner(&mut self, page_num: PageNum, key: &[u8], rid: Rid) -> IndexResult<DeleteOutcome> {
        let node = self.read_node_pinned(page_num)?;

        if node.is_leaf {
            self.delete_from_leaf(node, key, rid)
        } else {
            let j = self.descend_index(&node, key);
            let child = self.child_at(&node, j);
            let mut node = node;
            match self.delete(child, key, rid)? {
                DeleteOutcome::Ok { smallest_key: Some(sk) } => {
                    if j > 0 {
                        node.internal_entries[j - 1].key = sk;
                        self.write_node(&node)?;
                        Ok(DeleteOutcome::Ok { smallest_key: None })
                    } else {
                        // No separator slot at this level references the
                        // leftmost child; keep bubbling up.
                        Ok(DeleteOutcome::Ok { smallest_key: Some(sk) })
                    }
                }
                DeleteOutcome::Ok { smallest_key: None } => Ok(DeleteOutcome::Ok { smallest_key: None }),
                DeleteOutcome::Disposed(disposed_page) => self.erase_child(&mut node, disposed_page),
            }
        }
    }

    /// Remove the child pointer naming `disposed_page` from `node`. If it
    /// is not one of `node`'s own children, the leftward duplicate walk
    /// disposed a page belonging to an earlier sibling subtree; walk this
    /// level's sibling chain to find and patch the owning node instead
    /// (§4.3: "find the child pointer by identity, walking `prev_node`
    /// across sibling internal nodes if necessary").
    fn erase_child(&mut self, node: &mut IndexNode, disposed_page: PageNum) -> IndexResult<DeleteOutcome> {
        if node.leftmost_child == disposed_page {
            if node.internal_entries.is_empty() {
                return Err(IndexError::invariant("internal node left with no children"));
            }
            let promoted = node.internal_entries.remove(0);
            node.leftmost_child = promoted.child;
            self.write_node(node)?;
            let sk = if node.prev_node != NO_MORE_NODE {
                node.smallest_key().map(|s| s.to_vec())
            } else {
                None
            };
            return Ok(DeleteOutcome::Ok { smallest_key: sk });
        }
        if let Some(pos) = node.internal_entries.iter().position(|e| e.child == disposed_page) {
            node.internal_entries.remove(pos);
            self.write_node(node)?;
            return Ok(DeleteOutcome::Ok { smallest_key: None });
        }

        let mut prev = node.prev_node;
        while prev != NO_MORE_NODE {
            self.pager.get_this(prev)?;
            let mut sibling = self.read_node_pinned(prev)?;
            let found = sibling.leftmost_child == disposed_page
                || sibling.internal_entries.iter().any(|e| e.child == disposed_page);
            if found {
                if sibling.leftmost_child == disposed_page {
                    let promoted = sibling.internal_entries.remove(0);
                    sibling.leftmost_child = promoted.child;
                } else {
                    let pos = sibling.internal_entries.iter().position(|e| e.child == disposed_page).unwrap();
                    sibling.internal_entries.remove(pos);
                }
                self.write_node(&sibling)?;
                self.pager.unpin(prev)?;
                return Ok(DeleteOutcome::Ok { smallest_key: None });
            }
            let next_prev = sibling.prev_node;
            self.pager.unpin(prev)?;
            prev = next_prev;
        }
        Err(IndexError::invariant("disposed child not found in any ancestor sibling"))
    }

    /// Locate `(key, rid)` in `node`, walking `prev_node` leftward while the
    /// run of duplicate keys may continue there.
    fn delete_from_leaf(&mut self, node: IndexNode, key: &[u8], rid: Rid) -> IndexResult<DeleteOutcome> {
        if let Some(pos) = node.leaf_entries.iter().position(|e| self.key_cmp(&e.key, key) == Ordering::Equal && e.rid == rid) {
            return self.remove_leaf_entry(node, pos, key);
        }

        let mut current_prev = node.prev_node;
        let should_continue = node
            .leaf_entries
            .first()
            .map(|e| self.key_cmp(&e.key, key) == Ordering::Equal)
            .unwrap_or(true);
        if !should_continue {
            return Err(IndexError::EntryNotFound);
        }

        let mut hops = 0u32;
        while current_prev != NO_MORE_NODE {
            self.pager.get_this(current_prev)?;
            let candidate = self.read_node_pinned(current_prev)?;
            if let Some(pos) = candidate.leaf_entries.iter().position(|e| self.key_cmp(&e.key, key) == Ordering::Equal && e.rid == rid) {
                let this_page = candidate.page_num;
                let outcome = self.remove_leaf_entry(candidate, pos, key)?;
                if !matches!(&outcome, DeleteOutcome::Disposed(p) if *p == this_page) {
                    self.pager.unpin(this_page)?;
                }
                return Ok(outcome);
            }

            hops += 1;
            if hops == DUPLICATE_WALK_WARN_THRESHOLD {
                tracing::warn!(hops, key_len = key.len(), "long duplicate-key walk during delete");
            }

            let next_prev = candidate.prev_node;
            let keep_going = candidate
                .leaf_entries
                .first()
                .map(|e| self.key_cmp(&e.key, key) == Ordering::Equal)
                .unwrap_or(true);
            self.pager.unpin(current_prev)?;
            if !keep_going {
                break;
            }
            current_prev = next_prev;
        }
        Err(IndexError::EntryNotFound)
    }

    fn remove_leaf_entry(&mut self, mut node: IndexNode, pos: usize, removed_key: &[u8]) -> IndexResult<DeleteOutcome> {
        let page_num = node.page_num;
        node.leaf_entries.remove(pos);

        if node.leaf_entries.is_empty() && page_num != 0 {
            let prev = node.prev_node;
            let next = node.next_node;
            if prev != NO_MORE_NODE {
                self.patch_neighbor_next(prev, next)?;
            }
            if next != NO_MORE_NODE {
                self.patch_neighbor_prev(next, prev)?;
            }
            self.pager.unpin(page_num)?;
            self.pager.dispose(page_num)?;
            return Ok(DeleteOutcome::Disposed(page_num));
        }

        let new_smallest = node.leaf_entries.first().map(|e| e.key.clone());
        self.write_node(&node)?;

        if pos == 0 && node.prev_node != NO_MORE_NODE {
            if let Some(nk) = new_smallest {
                if nk != removed_key {
                    return Ok(DeleteOutcome::Ok { smallest_key: Some(nk) });
                }
            }
        }
        Ok(DeleteOutcome::Ok { smallest_key: None })
    }

    /// If the root is an internal node with zero keys (a single child
    /// pointer), follow that child — disposing pages along the way — until
    /// a leaf or a non-trivial internal node is found, then copy it into
    /// page 0.
    fn maybe_contract_root(&mut self) -> IndexResult<()> {
        self.pager.get_this(0)?;
        let root = self.read_node_pinned(0)?;
        self.pager.unpin(0)?;
        if root.is_leaf || !root.internal_entries.is_empty() {
            return Ok(());
        }

        let mut current = root.leftmost_child;
        loop {
            self.pager.get_this(current)?;
            let node = self.read_node_pinned(current)?;
            if !node.is_leaf && node.internal_entries.is_empty() {
                let next_child = node.leftmost_child;
                self.pager.unpin(current)?;
                self.pager.dispose(current)?;
                current = next_child;
                continue;
            }

            self.pager.get_this(0)?;
            let mut final_node = node;
            final_node.page_num = 0;
            final_node.prev_node = NO_MORE_NODE;
            final_node.next_node = NO_MORE_NODE;
            self.write_node(&final_node)?;
            self.pager.unpin(0)?;
            self.pager.unpin(current)?;
            self.pager.dispose(current)?;
            break;
        }
        tracing::debug!("root contracted");
        Ok(())
    }
}
