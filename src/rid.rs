//! Record identifier — opaque payload carried by leaf entries.
//!
//! The index never interprets a RID beyond comparing it for equality; it is
//! owned by the record manager, an external collaborator referenced only
//! through this type.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::page::PageNum;

/// Byte width of a serialized RID (page + slot).
pub const RID_SIZE: usize = 6;

/// Opaque record identifier: a `(page, slot)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page: PageNum,
    pub slot: u16,
}

impl Rid {
    pub fn new(page: PageNum, slot: u16) -> Self {
        Rid { page, slot }
    }

    /// `page >= 0` is the contract's viability bound; page 0 specifically is
    /// reserved (it is always the index root), so a RID naming page 0 is
    /// rejected by `insert_entry`/`delete_entry` preconditions even though it
    /// is representable.
    pub fn is_viable(&self) -> bool {
        self.page > 0
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let page = r.read_u32::<LittleEndian>()?;
        let slot = r.read_u16::<LittleEndian>()?;
        Ok(Rid { page, slot })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.page)?;
        w.write_u16::<LittleEndian>(self.slot)?;
        Ok(())
    }
}
