use crate::platform::FileStat;
use std::path::Path;

/// One indexed directory. `id` is 0 until the row is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRecord {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub parent_id: Option<i64>,
}

/// One indexed regular file. `size` is 0 when its metadata could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub extension: String,
    pub size: i64,
    pub parent_id: i64,
}

/// Everything indexed at or below one folder.
#[derive(Debug, Clone, Default)]
pub struct Subtree {
    pub folders: Vec<FolderRecord>,
    pub files: Vec<FileRecord>,
}

/// Row totals across the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub folders: i64,
    pub files: i64,
    pub total_bytes: i64,
}

/// Rows removed by a subtree delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalStats {
    pub folders: usize,
    pub files: usize,
}

impl FolderRecord {
    pub fn new(path: &Path, parent_id: Option<i64>) -> Self {
        FolderRecord {
            id: 0,
            name: base_name(path),
            path: path_string(path),
            parent_id,
        }
    }
}

impl FileRecord {
    pub fn new(path: &Path, parent_id: i64, stat: FileStat) -> Self {
        FileRecord {
            id: 0,
            name: stat.name,
            path: path_string(path),
            extension: stat.extension,
            size: stat.size as i64,
            parent_id,
        }
    }
}

pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Last path component; filesystem roots such as `/` have none and keep their full path.
pub fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path_string(path),
    }
}

/// Suffix from the last `.` inclusive, or "" when there is none or it ends the name.
/// Dot-files keep their whole name: `.bashrc` has extension `.bashrc`.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => &name[idx..],
        _ => "",
    }
}
