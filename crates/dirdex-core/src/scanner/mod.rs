mod walk;

pub use walk::{ScanOptions, ScanStats, Scanner};
