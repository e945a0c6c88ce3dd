// src/catalog/model.rs
//! Row types shared between the destination and reference catalogs.

/// The catalog's `file.type` discriminant. Only `F`, `S`, `D` are defined;
/// the reference implementation's unused `N` ("new file") code is not
/// carried forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    Symlink,
    Directory,
}

impl FileType {
    pub fn as_code(self) -> &'static str {
        match self {
            FileType::Regular => "F",
            FileType::Symlink => "S",
            FileType::Directory => "D",
        }
    }
}

/// A `file` row read from the reference catalog, restricted to the fields
/// the whole-file reuse decision needs.
#[derive(Debug, Clone)]
pub struct ReferenceFileRow {
    pub id: i64,
    pub mtime_ns: i64,
    pub size: i64,
}

/// A `block` row, in the order blocks were written for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRow {
    pub offset: i64,
    pub size: i64,
    pub hash: String,
}
