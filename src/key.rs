//! Typed key comparison.
//!
//! A key is a fixed-width byte slice whose interpretation is fixed at
//! index-creation time and stored in the file header (`attr_type`,
//! `attr_length`). The index itself never allocates or owns key bytes
//! beyond what it copies into node entry arrays.

use byteorder::{BigEndian, ByteOrder};
use std::cmp::Ordering;

use crate::error::{IndexError, IndexResult};

/// Longest permitted `STRING` key, matching the reference engine's bound
/// on fixed-length key attributes.
pub const MAX_STRING_LEN: u16 = 255;

/// Attribute type of an index's declared key. Stored as the `prev_node`
/// overload at page 0 (see [`crate::index::node`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AttrType {
    Int = 0,
    Float = 1,
    String = 2,
}

impl AttrType {
    pub fn from_raw(raw: u32) -> IndexResult<Self> {
        match raw {
            0 => Ok(AttrType::Int),
            1 => Ok(AttrType::Float),
            2 => Ok(AttrType::String),
            _ => Err(IndexError::InvalidAttr),
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Validate `(attr_type, attr_length)` at index-creation time.
    pub fn validate(self, attr_length: u16) -> IndexResult<()> {
        match self {
            AttrType::Int | AttrType::Float if attr_length == 4 => Ok(()),
            AttrType::Int | AttrType::Float => Err(IndexError::InvalidAttr),
            AttrType::String if (1..=MAX_STRING_LEN).contains(&attr_length) => Ok(()),
            AttrType::String => Err(IndexError::InvalidAttr),
        }
    }
}

/// Compare two keys of `attr_length` bytes according to `attr_type`.
///
/// Integers and floats are compared numerically (big-endian on-the-wire
/// representation so that unsigned byte comparison is not relied upon);
/// strings are compared lexicographically over their raw bytes.
pub fn compare_keys(attr_type: AttrType, a: &[u8], b: &[u8]) -> Ordering {
    match attr_type {
        AttrType::Int => {
            let x = BigEndian::read_i32(a);
            let y = BigEndian::read_i32(b);
            x.cmp(&y)
        }
        AttrType::Float => {
            let x = BigEndian::read_f32(a);
            let y = BigEndian::read_f32(b);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        AttrType::String => a.cmp(b),
    }
}

/// Encode a signed 32-bit integer key into its on-disk representation.
pub fn encode_int(value: i32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_i32(&mut buf, value);
    buf
}

/// Encode an IEEE-754 float key into its on-disk representation.
pub fn encode_float(value: f32) -> [u8; 4] {
    let mut buf = [0u8; 4];
    BigEndian::write_f32(&mut buf, value);
    buf
}
