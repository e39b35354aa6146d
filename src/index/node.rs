//! Binary-level accessors for the fixed page header and entry arrays.
//!
//! Every page's first 12 bytes are a header (`flags`, `num_keys`, `prev`,
//! `next`); at page 0 the `prev`/`next` slots are overloaded to store the
//! file-level `attr_type`/`attr_length` metadata instead of sibling
//! pointers (§6). This module is the one place that overload is read and
//! written, so the rest of the engine can work with a typed [`IndexNode`]
//! and never has to remember the special case.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{IndexError, IndexResult};
use crate::key::AttrType;
use crate::page::{Page, PageNum, NO_MORE_NODE, PAGE_SIZE};
use crate::rid::{Rid, RID_SIZE};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u16 {
        const LEAF = 0x0001;
    }
}

/// Size in bytes of the fixed page header.
pub const HEADER_SIZE: usize = 12;

/// The raw, uninterpreted contents of a page header. At page 0 `prev`/`next`
/// hold `attr_type`/`attr_length`, not sibling pointers; this type exists so
/// [`IndexManager::open`](crate::index::manager::IndexManager::open) can
/// recover that metadata before the rest of the tree's shape is known.
#[derive(Debug, Clone, Copy)]
pub struct RawHeader {
    pub flags: NodeFlags,
    pub num_keys: u16,
    pub prev: u32,
    pub next: u32,
}

impl RawHeader {
    pub fn from_bytes(data: &[u8]) -> IndexResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(IndexError::Internal("page shorter than header".into()));
        }
        let mut cur = Cursor::new(data);
        let flags = NodeFlags::from_bits_truncate(cur.read_u16::<LittleEndian>()?);
        let num_keys = cur.read_u16::<LittleEndian>()?;
        let prev = cur.read_u32::<LittleEndian>()?;
        let next = cur.read_u32::<LittleEndian>()?;
        Ok(RawHeader { flags, num_keys, prev, next })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        {
            let mut cur = Cursor::new(&mut buf[..]);
            cur.write_u16::<LittleEndian>(self.flags.bits()).unwrap();
            cur.write_u16::<LittleEndian>(self.num_keys).unwrap();
            cur.write_u32::<LittleEndian>(self.prev).unwrap();
            cur.write_u32::<LittleEndian>(self.next).unwrap();
        }
        buf
    }
}

/// One `(child_ptr, key)` pair of an internal node, where `child` is the
/// pointer that *follows* `key` (`child_ptr[i+1]` in the spec's indexing).
#[derive(Debug, Clone)]
pub struct InternalEntry {
    pub key: Vec<u8>,
    pub child: PageNum,
}

/// One `(key, rid)` pair of a leaf node.
#[derive(Debug, Clone)]
pub struct LeafEntry {
    pub key: Vec<u8>,
    pub rid: Rid,
}

/// A fully parsed tree node: either an internal node (`leftmost_child` plus
/// `internal_entries`) or a leaf (`leaf_entries`), tagged with the sibling
/// pointers that apply at every page except page 0.
#[derive(Debug, Clone)]
pub struct IndexNode {
    pub page_num: PageNum,
    pub is_leaf: bool,
    pub prev_node: PageNum,
    pub next_node: PageNum,
    pub leftmost_child: PageNum,
    pub internal_entries: Vec<InternalEntry>,
    pub leaf_entries: Vec<LeafEntry>,
}

impl IndexNode {
    /// A fresh, empty leaf. Used both for a brand-new index's root and for
    /// newly allocated sibling pages during a split.
    pub fn new_leaf(page_num: PageNum) -> Self {
        IndexNode {
            page_num,
            is_leaf: true,
            prev_node: NO_MORE_NODE,
            next_node: NO_MORE_NODE,
            leftmost_child: NO_MORE_NODE,
            internal_entries: Vec::new(),
            leaf_entries: Vec::new(),
        }
    }

    pub fn new_internal(page_num: PageNum, leftmost_child: PageNum) -> Self {
        IndexNode {
            page_num,
            is_leaf: false,
            prev_node: NO_MORE_NODE,
            next_node: NO_MORE_NODE,
            leftmost_child,
            internal_entries: Vec::new(),
            leaf_entries: Vec::new(),
        }
    }

    pub fn num_keys(&self) -> u16 {
        if self.is_leaf {
            self.leaf_entries.len() as u16
        } else {
            self.internal_entries.len() as u16
        }
    }

    /// Parse a node out of a page's raw bytes. `attr_length` comes from the
    /// file header (known to the caller before any node but page 0 can be
    /// read, and recovered from page 0's own overloaded header for page 0
    /// itself — see [`RawHeader`]).
    pub fn from_page(page: &Page, attr_length: u16) -> IndexResult<Self> {
        let raw = RawHeader::from_bytes(&page.data)?;
        let is_leaf = raw.flags.contains(NodeFlags::LEAF);
        let (prev_node, next_node) = if page.page_num == 0 {
            (NO_MORE_NODE, NO_MORE_NODE)
        } else {
            (raw.prev, raw.next)
        };

        let attr_length = attr_length as usize;
        let mut cursor = Cursor::new(&page.data[HEADER_SIZE..]);

        if is_leaf {
            let mut leaf_entries = Vec::with_capacity(raw.num_keys as usize);
            for _ in 0..raw.num_keys {
                let mut key = vec![0u8; attr_length];
                std::io::Read::read_exact(&mut cursor, &mut key)?;
                let rid = Rid::read_from(&mut cursor)?;
                leaf_entries.push(LeafEntry { key, rid });
            }
            Ok(IndexNode {
                page_num: page.page_num,
                is_leaf: true,
                prev_node,
                next_node,
                leftmost_child: NO_MORE_NODE,
                internal_entries: Vec::new(),
                leaf_entries,
            })
        } else {
            let leftmost_child = cursor.read_u32::<LittleEndian>()?;
            let mut internal_entries = Vec::with_capacity(raw.num_keys as usize);
            for _ in 0..raw.num_keys {
                let mut key = vec![0u8; attr_length];
                std::io::Read::read_exact(&mut cursor, &mut key)?;
                let child = cursor.read_u32::<LittleEndian>()?;
                internal_entries.push(InternalEntry { key, child });
            }
            Ok(IndexNode {
                page_num: page.page_num,
                is_leaf: false,
                prev_node,
                next_node,
                leftmost_child,
                internal_entries,
                leaf_entries: Vec::new(),
            })
        }
    }

    /// Serialize this node into `page`, re-establishing the page-0 metadata
    /// overload when `page.page_num == 0`.
    pub fn write_to_page(&self, page: &mut Page, attr_type: AttrType, attr_length: u16) -> IndexResult<()> {
        let mut flags = NodeFlags::empty();
        if self.is_leaf {
            flags |= NodeFlags::LEAF;
        }
        let (prev, next) = if self.page_num == 0 {
            (attr_type.as_raw(), attr_length as u32)
        } else {
            (self.prev_node, self.next_node)
        };
        let header = RawHeader {
            flags,
            num_keys: self.num_keys(),
            prev,
            next,
        };

        page.data.clear();
        page.data.resize(PAGE_SIZE, 0);
        page.data[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        let mut body = Cursor::new(&mut page.data[HEADER_SIZE..]);
        if self.is_leaf {
            for entry in &self.leaf_entries {
                std::io::Write::write_all(&mut body, &entry.key)?;
                entry.rid.write_to(&mut body)?;
            }
        } else {
            body.write_u32::<LittleEndian>(self.leftmost_child)?;
            for entry in &self.internal_entries {
                std::io::Write::write_all(&mut body, &entry.key)?;
                body.write_u32::<LittleEndian>(entry.child)?;
            }
        }
        Ok(())
    }

    /// Bytes a leaf with `attr_length`-byte keys occupies per entry.
    pub fn leaf_entry_size(attr_length: u16) -> usize {
        attr_length as usize + RID_SIZE
    }

    /// Bytes an internal node occupies per entry (one child pointer + one key).
    pub fn internal_entry_size(attr_length: u16) -> usize {
        attr_length as usize + std::mem::size_of::<PageNum>()
    }

    /// Whether this node, as currently populated, fits in one page.
    pub fn fits(&self, attr_length: u16) -> bool {
        let body = if self.is_leaf {
            self.leaf_entries.len() * Self::leaf_entry_size(attr_length)
        } else {
            std::mem::size_of::<PageNum>()
                + self.internal_entries.len() * Self::internal_entry_size(attr_length)
        };
        HEADER_SIZE + body <= PAGE_SIZE
    }

    /// Smallest key reachable from this node (used to check (I5) and to
    /// compute a propagated separator after a split).
    pub fn smallest_key(&self) -> Option<&[u8]> {
        if self.is_leaf {
            self.leaf_entries.first().map(|e| e.key.as_slice())
        } else {
            self.internal_entries.first().map(|e| e.key.as_slice())
        }
    }
}
