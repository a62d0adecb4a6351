use crate::config;
use crate::error::Error;
use crate::platform::{FileSystem, HostFileSystem};
use crate::progress::ProgressReporter;
use crate::scanner::{ScanOptions, ScanStats, Scanner};
use crate::storage::models::{
    path_string, FileRecord, FolderRecord, IndexStats, RemovalStats, Subtree,
};
use crate::storage::Database;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Keeps a [`Database`] in step with the filesystem.
///
/// Every mutating operation runs in exactly one transaction and compacts the store
/// after committing. A failure anywhere, including cancellation, rolls the whole
/// operation back.
pub struct Indexer<F: FileSystem = HostFileSystem> {
    db: Database,
    fs: F,
    ignore_patterns: Vec<String>,
    cancel_token: Arc<AtomicBool>,
}

impl Indexer<HostFileSystem> {
    /// Open (or create) the index stored at `db_path`.
    pub fn initialize(db_path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = Database::open(db_path)?;
        Ok(Self::with_file_system(db, HostFileSystem))
    }
}

impl<F: FileSystem> Indexer<F> {
    pub fn with_file_system(db: Database, fs: F) -> Self {
        Self {
            db,
            fs,
            ignore_patterns: Vec::new(),
            cancel_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.ignore_patterns = patterns.to_vec();
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Token checked before every directory enumeration. Each scan resets it on entry.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_token)
    }

    /// Replace the whole index with a fresh scan of `roots`.
    ///
    /// Roots nested inside other roots are dropped. Folders not reachable from the
    /// remaining roots disappear from the index.
    pub fn full_rescan<P: AsRef<Path>>(
        &self,
        roots: &[P],
        max_depth: u32,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanStats, Error> {
        self.cancel_token.store(false, Ordering::Relaxed);
        let roots: Vec<PathBuf> = roots
            .iter()
            .map(|root| self.canonical_or_given(root.as_ref()))
            .collect();
        let roots = config::non_overlapping_directories(roots);
        info!("Rescanning {:?} (max depth {})", roots, max_depth);
        reporter.on_scan_start(&roots);

        let start = Instant::now();
        let options = ScanOptions::new(max_depth, &self.ignore_patterns);
        let tx = self.db.begin()?;
        self.db.clear_index()?;

        let mut scanner =
            Scanner::new(&self.db, &self.fs, &options, reporter, &self.cancel_token);
        let records: Vec<FolderRecord> = roots
            .iter()
            .map(|root| FolderRecord::new(root, None))
            .collect();
        let ids = scanner.insert_scan_roots(&records)?;
        for (root, id) in roots.iter().zip(ids) {
            scanner.scan(root, id, 1)?;
        }
        let stats = scanner.into_stats();
        tx.commit()?;

        self.finish_scan(&stats, start, reporter)?;
        Ok(stats)
    }

    /// Index `path` and everything below it without touching existing rows.
    ///
    /// The new folder hangs off its filesystem parent when that parent is indexed;
    /// otherwise it becomes a root. Adding a path that is already indexed fails with
    /// [`Error::ConstraintViolation`].
    pub fn add_folder(
        &self,
        path: impl AsRef<Path>,
        max_depth: u32,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanStats, Error> {
        self.cancel_token.store(false, Ordering::Relaxed);
        let path = self.fs.canonicalize(path.as_ref())?;
        info!("Adding {} (max depth {})", path.display(), max_depth);
        reporter.on_scan_start(std::slice::from_ref(&path));

        let start = Instant::now();
        let options = ScanOptions::new(max_depth, &self.ignore_patterns);
        let tx = self.db.begin()?;

        let parent_id = match path.parent() {
            Some(parent) => self.db.resolve_folder_id(&path_string(parent))?,
            None => None,
        };
        if parent_id.is_none() {
            debug!("Parent of {} is not indexed, adding it as a root", path.display());
        }

        let mut scanner =
            Scanner::new(&self.db, &self.fs, &options, reporter, &self.cancel_token);
        let ids = scanner.insert_scan_roots(&[FolderRecord::new(&path, parent_id)])?;
        scanner.scan(&path, ids[0], 1)?;
        let stats = scanner.into_stats();
        tx.commit()?;

        self.finish_scan(&stats, start, reporter)?;
        Ok(stats)
    }

    /// Remove `path`, every folder beneath it, and all of their files.
    pub fn remove_folder(&self, path: impl AsRef<Path>) -> Result<RemovalStats, Error> {
        let key = path_string(&self.canonical_or_given(path.as_ref()));
        let tx = self.db.begin()?;
        let root_id = self
            .db
            .resolve_folder_id(&key)?
            .ok_or_else(|| Error::NotIndexed(key.clone()))?;
        let removed = self.db.delete_subtree(root_id)?;
        tx.commit()?;

        info!(
            "Removed {}: {} folders, {} files",
            key, removed.folders, removed.files
        );
        self.db.compact()?;
        Ok(removed)
    }

    /// Every indexed file whose extension is exactly `extension` (e.g. ".zip").
    pub fn files_with_extension(&self, extension: &str) -> Result<Vec<FileRecord>, Error> {
        Ok(self.db.files_with_extension(extension)?)
    }

    /// Folder ids for the indexed subset of `paths`.
    pub fn folder_ids<S: AsRef<str>>(
        &self,
        paths: &[S],
    ) -> Result<AHashMap<String, i64>, Error> {
        Ok(self.db.resolve_folder_ids(paths)?)
    }

    /// Every indexed folder and file at or below `path`, each sorted by path.
    pub fn subtree(&self, path: impl AsRef<Path>) -> Result<Subtree, Error> {
        let key = path_string(&self.canonical_or_given(path.as_ref()));
        let root_id = self
            .db
            .resolve_folder_id(&key)?
            .ok_or(Error::NotIndexed(key))?;
        let ids = self.db.descendant_folder_ids(root_id)?;

        let mut folders = self.db.folders_by_ids(&ids)?;
        let mut files = self.db.files_in_folders(&ids)?;
        folders.sort_by(|a, b| a.path.cmp(&b.path));
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Subtree { folders, files })
    }

    /// Recreate the indexed folder hierarchy of `path` under `destination`, which
    /// stands in for `path` itself. Files are not copied. Returns the number of
    /// directories created or already present.
    pub fn replicate_folders(
        &self,
        path: impl AsRef<Path>,
        destination: impl AsRef<Path>,
    ) -> Result<usize, Error> {
        let subtree = self.subtree(path)?;
        let root = match subtree.folders.first() {
            Some(root) => PathBuf::from(&root.path),
            None => return Ok(0),
        };
        let destination = destination.as_ref();

        let mut created = 0;
        for folder in &subtree.folders {
            match Path::new(&folder.path).strip_prefix(&root) {
                Ok(relative) => {
                    self.fs.create_dir_all(&destination.join(relative))?;
                    created += 1;
                }
                Err(_) => warn!("{} is not under {}, skipping", folder.path, root.display()),
            }
        }
        info!(
            "Replicated {} folders from {} to {}",
            created,
            root.display(),
            destination.display()
        );
        Ok(created)
    }

    pub fn stats(&self) -> Result<IndexStats, Error> {
        Ok(self.db.index_stats()?)
    }

    fn canonical_or_given(&self, path: &Path) -> PathBuf {
        match self.fs.canonicalize(path) {
            Ok(canonical) => canonical,
            Err(err) => {
                warn!("Could not canonicalize {}: {}", path.display(), err);
                path.to_path_buf()
            }
        }
    }

    fn finish_scan(
        &self,
        stats: &ScanStats,
        start: Instant,
        reporter: &dyn ProgressReporter,
    ) -> Result<(), Error> {
        let secs = start.elapsed().as_secs_f64();
        info!(
            "Indexed {} folders and {} files ({} bytes) in {:.2}s, {} branches skipped",
            stats.folders, stats.files, stats.total_bytes, secs, stats.skipped_branches
        );
        reporter.on_scan_complete(stats, secs);

        reporter.on_compact_start();
        let compact_start = Instant::now();
        self.db.compact()?;
        reporter.on_compact_complete(compact_start.elapsed().as_secs_f64());
        Ok(())
    }
}
