//! `create`/`destroy`/`open`/`close` of named index files.
//!
//! Grounded on the reference engine's open-file table: path canonicalization
//! and page-0 bootstrapping follow the same shape as
//! `file_manager::open_files::OpenFile`, stripped of the `Arc<RwLock<_>>`
//! sharing and reference counting that engine needs for its multi-client
//! wire protocol — this engine is single-threaded per handle (§5), so one
//! handle owns its file outright.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, IndexResult};
use crate::index::handle::IndexHandle;
use crate::index::node::{IndexNode, RawHeader, HEADER_SIZE};
use crate::key::AttrType;
use crate::page::{Page, PAGE_SIZE};
use crate::pager::FilePager;

/// Derives the canonical on-disk file name for `(relation_name, index_no)`.
///
/// Legacy variants (`name.NNN`, `name.N`, `name.ixN`, `name.indexN`) are
/// recognized by [`find_existing`] for diagnostic tooling, but `create`
/// always writes this one canonical form.
fn canonical_file_name(relation_name: &str, index_no: u32) -> String {
    format!("{relation_name}.idx{index_no}")
}

/// Resolve the path to open for `(relation_name, index_no)`, accepting the
/// legacy naming variants alongside the canonical one.
fn find_existing(dir: &Path, relation_name: &str, index_no: u32) -> Option<PathBuf> {
    let candidates = [
        canonical_file_name(relation_name, index_no),
        format!("{relation_name}.{index_no:03}"),
        format!("{relation_name}.{index_no}"),
        format!("{relation_name}.ix{index_no}"),
        format!("{relation_name}.index{index_no}"),
    ];
    candidates.into_iter().map(|name| dir.join(name)).find(|p| p.exists())
}

/// Create a fresh, empty index file for `(relation_name, index_no)` under
/// `dir`. The new file's page 0 is an empty leaf root carrying the
/// `(attr_type, attr_length)` metadata overload (§4.1, §6).
pub fn create(dir: &Path, relation_name: &str, index_no: u32, attr_type: AttrType, attr_length: u16) -> IndexResult<()> {
    attr_type.validate(attr_length)?;

    let path = dir.join(canonical_file_name(relation_name, index_no));
    if path.exists() {
        return Err(IndexError::FileOpen);
    }

    let mut file = OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;

    let root = IndexNode::new_leaf(0);
    let mut page = Page::new(0);
    root.write_to_page(&mut page, attr_type, attr_length)?;
    std::io::Write::write_all(&mut file, &page.data)?;
    file.sync_all()?;
    Ok(())
}

/// Remove the backing file for `(relation_name, index_no)`.
pub fn destroy(dir: &Path, relation_name: &str, index_no: u32) -> IndexResult<()> {
    let path = find_existing(dir, relation_name, index_no).ok_or(IndexError::FileClosed)?;
    fs::remove_file(path)?;
    Ok(())
}

/// Open an existing index, recovering `(attr_type, attr_length)` from page
/// 0's overloaded header before any tree traversal is possible.
pub fn open(dir: &Path, relation_name: &str, index_no: u32) -> IndexResult<IndexHandle<FilePager<File>>> {
    let path = find_existing(dir, relation_name, index_no).ok_or(IndexError::FileClosed)?;
    let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

    let mut header_probe = [0u8; HEADER_SIZE];
    std::io::Read::read_exact(&mut file, &mut header_probe)?;
    let raw = RawHeader::from_bytes(&header_probe)?;
    let attr_type = AttrType::from_raw(raw.prev)?;
    let attr_length = raw.next as u16;
    attr_type.validate(attr_length)?;

    let file_len = {
        use std::io::Seek;
        file.seek(std::io::SeekFrom::End(0))?
    };
    let num_pages = (file_len as usize / PAGE_SIZE) as u32;

    let pager = FilePager::new(file, num_pages);
    Ok(IndexHandle::new(pager, attr_type, attr_length))
}

/// Force dirty pages and mark the handle closed. The handle is consumed:
/// further use after `close` is a type error, not a runtime one.
pub fn close<P: crate::pager::Pager>(mut handle: IndexHandle<P>) -> IndexResult<()> {
    handle.force()?;
    handle.mark_closed();
    Ok(())
}
