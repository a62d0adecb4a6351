use crate::error::Error;
use crate::platform::{FileStat, FileSystem};
use crate::progress::ProgressReporter;
use crate::storage::models::{FileRecord, FolderRecord};
use crate::storage::Database;
use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, trace, warn};

/// Per-invocation scan settings.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Scan roots are depth 1. A directory's contents are recorded only while its depth
    /// is below `max_depth`; 0 means unlimited.
    pub max_depth: u32,
    pub ignore_patterns: Vec<Pattern>,
}

impl ScanOptions {
    /// Compile `ignore_globs`, logging and dropping any that are invalid.
    pub fn new(max_depth: u32, ignore_globs: &[String]) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();
        ScanOptions {
            max_depth,
            ignore_patterns,
        }
    }

    pub fn descends_into(&self, depth: u32) -> bool {
        self.max_depth == 0 || depth < self.max_depth
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub folders: usize,
    pub files: usize,
    pub total_bytes: u64,
    pub skipped_branches: usize,
    pub degraded_files: usize,
    /// Entries left out because their path is not valid UTF-8.
    pub skipped_names: usize,
}

/// Depth-first, pre-order walk that writes each directory's files and child folders
/// to the store as one batch apiece, then recurses into the children.
///
/// Runs inside the caller's transaction; nothing here commits.
pub struct Scanner<'a, F: FileSystem + ?Sized> {
    db: &'a Database,
    fs: &'a F,
    options: &'a ScanOptions,
    reporter: &'a dyn ProgressReporter,
    cancel_token: &'a AtomicBool,
    stats: ScanStats,
}

impl<'a, F: FileSystem + ?Sized> Scanner<'a, F> {
    pub fn new(
        db: &'a Database,
        fs: &'a F,
        options: &'a ScanOptions,
        reporter: &'a dyn ProgressReporter,
        cancel_token: &'a AtomicBool,
    ) -> Self {
        Scanner {
            db,
            fs,
            options,
            reporter,
            cancel_token,
            stats: ScanStats::default(),
        }
    }

    /// Insert the folders a scan starts from and return their ids in input order.
    pub fn insert_scan_roots(&mut self, roots: &[FolderRecord]) -> Result<Vec<i64>, Error> {
        let ids = self.db.insert_folders(roots)?;
        self.stats.folders += ids.len();
        Ok(ids)
    }

    /// Record the contents of `dir`, whose own row already exists as `folder_id`, and
    /// recurse. Unreadable or vanished directories are logged and skipped.
    pub fn scan(&mut self, dir: &Path, folder_id: i64, depth: u32) -> Result<(), Error> {
        if self.cancel_token.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        if !self.options.descends_into(depth) {
            trace!("Depth limit reached at {} (depth {})", dir.display(), depth);
            return Ok(());
        }

        let child_dirs = match self.fs.list_directories(dir) {
            Ok(dirs) => dirs,
            Err(err) => return self.skip_branch(dir, err),
        };
        let file_paths = match self.fs.list_files(dir) {
            Ok(files) => files,
            Err(err) => return self.skip_branch(dir, err),
        };

        let file_paths = self.keep_entries(file_paths);
        let files: Vec<FileRecord> = file_paths
            .iter()
            .map(|path| FileRecord::new(path, folder_id, self.stat_file(path)))
            .collect();

        let child_dirs = self.keep_entries(child_dirs);
        let folders: Vec<FolderRecord> = child_dirs
            .iter()
            .map(|path| FolderRecord::new(path, Some(folder_id)))
            .collect();

        self.db.insert_files(&files)?;
        let child_ids = self.db.insert_folders(&folders)?;

        self.stats.files += files.len();
        self.stats.folders += child_ids.len();
        self.stats.total_bytes += files.iter().map(|f| f.size as u64).sum::<u64>();
        self.reporter
            .on_folder_scanned(dir, self.stats.folders, self.stats.files);
        debug!(
            "Scanned {}: {} files, {} folders (depth {})",
            dir.display(),
            files.len(),
            child_ids.len(),
            depth
        );

        for (child, child_id) in child_dirs.iter().zip(child_ids) {
            self.scan(child, child_id, depth + 1)?;
        }
        Ok(())
    }

    pub fn into_stats(self) -> ScanStats {
        self.stats
    }

    /// Drop ignored entries and entries whose path cannot be stored exactly. Stored
    /// paths are text, so two names differing only in invalid bytes would collide.
    fn keep_entries(&mut self, paths: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut kept = Vec::with_capacity(paths.len());
        for path in paths {
            if self.options.is_ignored(&path) {
                continue;
            }
            if path.to_str().is_none() {
                warn!("Skipping non UTF-8 path: {}", path.display());
                self.stats.skipped_names += 1;
                continue;
            }
            kept.push(path);
        }
        kept
    }

    fn stat_file(&mut self, path: &Path) -> FileStat {
        match self.fs.stat_file(path) {
            Ok(stat) => stat,
            Err(err) => {
                warn!("Could not read metadata for {}: {}", path.display(), err);
                self.stats.degraded_files += 1;
                FileStat::new(path, 0)
            }
        }
    }

    fn skip_branch(&mut self, dir: &Path, err: io::Error) -> Result<(), Error> {
        match err.kind() {
            io::ErrorKind::PermissionDenied => {
                warn!("Access denied: {}", dir.display());
            }
            io::ErrorKind::NotFound => {
                warn!("Could not find: {}", dir.display());
            }
            _ => {
                return Err(Error::Io(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                )));
            }
        }
        self.stats.skipped_branches += 1;
        self.reporter.on_branch_skipped(dir, &err);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use std::collections::{BTreeMap, BTreeSet};

    /// In-memory tree: directories, files with an optional size (None = stat fails),
    /// and directories whose listing is denied.
    #[derive(Default)]
    struct FakeFs {
        dirs: BTreeSet<PathBuf>,
        files: BTreeMap<PathBuf, Option<u64>>,
        denied: BTreeSet<PathBuf>,
    }

    impl FakeFs {
        fn dir(mut self, path: impl Into<PathBuf>) -> Self {
            self.dirs.insert(path.into());
            self
        }

        fn file(mut self, path: impl Into<PathBuf>, size: Option<u64>) -> Self {
            self.files.insert(path.into(), size);
            self
        }

        fn deny(mut self, path: &str) -> Self {
            self.denied.insert(PathBuf::from(path));
            self
        }

        fn check(&self, path: &Path) -> io::Result<()> {
            if self.denied.contains(path) {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            if !self.dirs.contains(path) {
                return Err(io::Error::from(io::ErrorKind::NotFound));
            }
            Ok(())
        }
    }

    impl FileSystem for FakeFs {
        fn list_directories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
            self.check(path)?;
            Ok(self
                .dirs
                .iter()
                .filter(|d| d.parent() == Some(path))
                .cloned()
                .collect())
        }

        fn list_files(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
            self.check(path)?;
            Ok(self
                .files
                .keys()
                .filter(|f| f.parent() == Some(path))
                .cloned()
                .collect())
        }

        fn stat_file(&self, path: &Path) -> io::Result<FileStat> {
            match self.files.get(path) {
                Some(Some(size)) => Ok(FileStat::new(path, *size)),
                _ => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        }

        fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
            Ok(path.to_path_buf())
        }

        fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }
    }

    fn scan_tree(
        fs: &FakeFs,
        options: &ScanOptions,
        cancel: &AtomicBool,
    ) -> (Database, Result<ScanStats, Error>) {
        let db = Database::open_in_memory().unwrap();
        let result = {
            let mut scanner = Scanner::new(&db, fs, options, &SilentReporter, cancel);
            let root = FolderRecord::new(Path::new("/a"), None);
            scanner.insert_scan_roots(&[root]).and_then(|ids| {
                scanner.scan(Path::new("/a"), ids[0], 1)?;
                Ok(scanner.into_stats())
            })
        };
        (db, result)
    }

    fn folder_paths(db: &Database) -> Vec<String> {
        db.connection()
            .prepare("SELECT path FROM folders ORDER BY path")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn sample_tree() -> FakeFs {
        FakeFs::default()
            .dir("/a")
            .dir("/a/x")
            .dir("/a/x/deep")
            .dir("/a/y")
            .file("/a/top.md", Some(3))
            .file("/a/x/file1.txt", Some(10))
            .file("/a/x/deep/inner.txt", Some(4))
    }

    #[test]
    fn test_unlimited_depth_records_everything() {
        let fs = sample_tree();
        let (db, result) = scan_tree(&fs, &ScanOptions::default(), &AtomicBool::new(false));
        let stats = result.unwrap();

        assert_eq!(folder_paths(&db), vec!["/a", "/a/x", "/a/x/deep", "/a/y"]);
        assert_eq!(stats.folders, 4);
        assert_eq!(stats.files, 3);
        assert_eq!(stats.total_bytes, 17);
    }

    #[test]
    fn test_depth_limit_stops_below_boundary() {
        let fs = sample_tree();
        let options = ScanOptions::new(2, &[]);
        let (db, result) = scan_tree(&fs, &options, &AtomicBool::new(false));
        let stats = result.unwrap();

        // Depth 2 folders are recorded by their parent, but not opened.
        assert_eq!(folder_paths(&db), vec!["/a", "/a/x", "/a/y"]);
        assert_eq!(stats.files, 1);
        assert_eq!(db.files_with_extension(".txt").unwrap().len(), 0);
        assert_eq!(db.files_with_extension(".md").unwrap().len(), 1);
    }

    #[test]
    fn test_depth_limit_of_one_records_root_only() {
        let fs = sample_tree();
        let options = ScanOptions::new(1, &[]);
        let (db, result) = scan_tree(&fs, &options, &AtomicBool::new(false));
        result.unwrap();
        assert_eq!(folder_paths(&db), vec!["/a"]);
        assert_eq!(db.index_stats().unwrap().files, 0);
    }

    #[test]
    fn test_access_denied_skips_branch_only() {
        let fs = sample_tree().deny("/a/x");
        let (db, result) = scan_tree(&fs, &ScanOptions::default(), &AtomicBool::new(false));
        let stats = result.unwrap();

        assert_eq!(stats.skipped_branches, 1);
        // The denied folder itself was recorded by its parent; its contents were not.
        assert_eq!(folder_paths(&db), vec!["/a", "/a/x", "/a/y"]);
        assert!(db.files_with_extension(".txt").unwrap().is_empty());
        assert_eq!(db.files_with_extension(".md").unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_metadata_degrades_size() {
        let fs = sample_tree().file("/a/y/vanished.bin", None);
        let (db, result) = scan_tree(&fs, &ScanOptions::default(), &AtomicBool::new(false));
        let stats = result.unwrap();

        assert_eq!(stats.degraded_files, 1);
        let bins = db.files_with_extension(".bin").unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].path, "/a/y/vanished.bin");
        assert_eq!(bins[0].size, 0);
    }

    #[test]
    fn test_ignore_patterns_skip_dirs_and_files() {
        let fs = sample_tree();
        let options = ScanOptions::new(0, &["/a/x".to_string(), "*.md".to_string()]);
        let (db, result) = scan_tree(&fs, &options, &AtomicBool::new(false));
        result.unwrap();

        assert_eq!(folder_paths(&db), vec!["/a", "/a/y"]);
        assert_eq!(db.index_stats().unwrap().files, 0);
    }

    #[test]
    fn test_invalid_glob_is_dropped() {
        let options = ScanOptions::new(0, &["[".to_string(), "*.tmp".to_string()]);
        assert_eq!(options.ignore_patterns.len(), 1);
    }

    #[test]
    fn test_cancelled_scan_returns_error() {
        let fs = sample_tree();
        let (_db, result) = scan_tree(&fs, &ScanOptions::default(), &AtomicBool::new(true));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bad_dir = Path::new("/a").join(OsStr::from_bytes(b"bad\xff"));
        let other_bad_dir = Path::new("/a").join(OsStr::from_bytes(b"bad\xfe"));
        let bad_file = Path::new("/a/y").join(OsStr::from_bytes(b"f\xff.txt"));
        let fs = sample_tree()
            .dir(bad_dir.clone())
            .dir(other_bad_dir)
            .file(bad_dir.join("inside.txt"), Some(1))
            .file(bad_file, Some(2));
        let (db, result) = scan_tree(&fs, &ScanOptions::default(), &AtomicBool::new(false));
        let stats = result.unwrap();

        assert_eq!(stats.skipped_names, 3);
        assert_eq!(folder_paths(&db), vec!["/a", "/a/x", "/a/x/deep", "/a/y"]);
        assert_eq!(stats.files, 3);
    }
}
