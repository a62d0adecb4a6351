use dirdex_core::{ProgressReporter, ScanStats};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using an indicatif spinner.
///
/// - Scan phase: spinner with running folder/file counts
/// - Compaction: spinner
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: &str) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars(TICK_CHARS));
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));

        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, roots: &[PathBuf]) {
        self.start_spinner(&format!("Scanning {} root(s)...", roots.len()));
    }

    fn on_folder_scanned(&self, _path: &Path, folders_found: usize, files_found: usize) {
        self.with_bar(|pb| {
            pb.set_message(format!(
                "Scanning... {} folders, {} files",
                folders_found, files_found
            ))
        });
    }

    fn on_branch_skipped(&self, path: &Path, reason: &io::Error) {
        self.with_bar(|pb| pb.println(format!("  skipped {}: {}", path.display(), reason)));
    }

    fn on_scan_complete(&self, stats: &ScanStats, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} folders, {} files in {:.2}s",
            stats.folders, stats.files, duration_secs
        );
    }

    fn on_compact_start(&self) {
        self.start_spinner("Compacting index...");
    }

    fn on_compact_complete(&self, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Compaction complete in {:.2}s",
            duration_secs
        );
    }
}
