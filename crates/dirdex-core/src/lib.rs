pub mod config;
pub mod error;
pub mod indexer;
pub mod platform;
pub mod progress;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use platform::{FileStat, FileSystem, HostFileSystem};
pub use progress::{ProgressReporter, SilentReporter};
pub use scanner::{ScanOptions, ScanStats};
pub use storage::models::{FileRecord, FolderRecord, IndexStats, RemovalStats, Subtree};
pub use storage::Database;
