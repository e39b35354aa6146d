//! B+-tree index engine for the TinyBase storage stack.
//!
//! Maintains, for one attribute of one relation, a disk-resident,
//! duplicate-tolerant ordered index mapping a typed key to one or more
//! record identifiers. See [`index::manager`] for the file-level entry
//! points (`create`/`open`/`destroy`), [`index::IndexHandle`] for
//! insertion and deletion, and [`index::Scan`] for range/equality cursors.

pub mod error;
pub mod index;
pub mod key;
pub mod pager;
pub mod page;
pub mod rid;

pub use error::{IndexError, IndexResult};
pub use index::{manager, CompareOp, IndexHandle, Scan};
pub use key::AttrType;
pub use page::{PageNum, PAGE_SIZE};
pub use rid::Rid;
