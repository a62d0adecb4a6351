use crate::storage::models::{base_name, extension_of};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name, extension and size of one file as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub name: String,
    pub extension: String,
    pub size: u64,
}

impl FileStat {
    pub fn new(path: &Path, size: u64) -> Self {
        let name = base_name(path);
        FileStat {
            extension: extension_of(&name).to_string(),
            name,
            size,
        }
    }
}

/// The host filesystem as seen by the scanner.
///
/// Listings fail with `PermissionDenied` or `NotFound` for unreadable or vanished
/// directories; the scanner treats those as a skipped branch.
pub trait FileSystem {
    /// Immediate subdirectories of `path`, sorted. Symlinks are not followed.
    fn list_directories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Immediate regular files of `path`, sorted. A symlink is listed only when it
    /// resolves to a regular file.
    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn stat_file(&self, path: &Path) -> io::Result<FileStat>;

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    File,
}

impl HostFileSystem {
    fn has_kind(entry: &DirEntry, want: EntryKind) -> io::Result<bool> {
        let file_type = entry.file_type()?;
        Ok(match want {
            EntryKind::Directory => file_type.is_dir(),
            // Links to directories are never descended into or recorded.
            EntryKind::File if file_type.is_symlink() => fs::metadata(entry.path())?.is_file(),
            EntryKind::File => file_type.is_file(),
        })
    }

    /// Entries of `path` with kind `want`. Only a failure to open `path` itself is
    /// an error; an entry that cannot be read is logged and left out.
    fn list_entries(path: &Path, want: EntryKind) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Could not read an entry of {}: {}", path.display(), err);
                    continue;
                }
            };
            match Self::has_kind(&entry, want) {
                Ok(true) => paths.push(entry.path()),
                Ok(false) => {}
                Err(err) => warn!("Skipping {}: {}", entry.path().display(), err),
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl FileSystem for HostFileSystem {
    fn list_directories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        Self::list_entries(path, EntryKind::Directory)
    }

    fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        Self::list_entries(path, EntryKind::File)
    }

    fn stat_file(&self, path: &Path) -> io::Result<FileStat> {
        let metadata = fs::metadata(path)?;
        Ok(FileStat::new(path, metadata.len()))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_host_listing_splits_dirs_and_files() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("b_dir")).unwrap();
        fs::create_dir(tmp.path().join("a_dir")).unwrap();
        fs::write(tmp.path().join("z.txt"), "hello").unwrap();
        fs::write(tmp.path().join("m.log"), "").unwrap();

        let host = HostFileSystem;
        let dirs = host.list_directories(tmp.path()).unwrap();
        assert_eq!(
            dirs,
            vec![tmp.path().join("a_dir"), tmp.path().join("b_dir")]
        );
        let files = host.list_files(tmp.path()).unwrap();
        assert_eq!(files, vec![tmp.path().join("m.log"), tmp.path().join("z.txt")]);

        let stat = host.stat_file(&tmp.path().join("z.txt")).unwrap();
        assert_eq!(stat.name, "z.txt");
        assert_eq!(stat.extension, ".txt");
        assert_eq!(stat.size, 5);
    }

    #[test]
    fn test_host_listing_missing_dir_is_not_found() {
        let tmp = tempdir().unwrap();
        let err = HostFileSystem
            .list_directories(&tmp.path().join("gone"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_host_listing_ignores_directory_symlinks() {
        use std::os::unix::fs::symlink;

        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("real")).unwrap();
        fs::write(tmp.path().join("real").join("f.txt"), "data").unwrap();
        symlink(tmp.path().join("real"), tmp.path().join("link.d")).unwrap();
        symlink(tmp.path().join("real").join("f.txt"), tmp.path().join("f.lnk")).unwrap();
        symlink(tmp.path().join("missing"), tmp.path().join("dangling")).unwrap();

        let host = HostFileSystem;
        assert_eq!(
            host.list_directories(tmp.path()).unwrap(),
            vec![tmp.path().join("real")]
        );
        // Only the link to a regular file survives; the dangling one is skipped.
        assert_eq!(
            host.list_files(tmp.path()).unwrap(),
            vec![tmp.path().join("f.lnk")]
        );
    }
}
