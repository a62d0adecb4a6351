use crate::scanner::ScanStats;
use std::io;
use std::path::{Path, PathBuf};

/// Trait for reporting scan progress.
///
/// The CLI implements it with an indicatif spinner. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _roots: &[PathBuf]) {}
    fn on_folder_scanned(&self, _path: &Path, _folders_found: usize, _files_found: usize) {}
    fn on_branch_skipped(&self, _path: &Path, _reason: &io::Error) {}
    fn on_scan_complete(&self, _stats: &ScanStats, _duration_secs: f64) {}
    fn on_compact_start(&self) {}
    fn on_compact_complete(&self, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
