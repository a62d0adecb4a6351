use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "dirdex")]
#[command(about = "Index folders and files into SQLite", long_about = None)]
pub struct Cli {
    /// Index database file, overriding the configured `database_path`
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rebuild the whole index from the given roots (or the configured root_paths)
    Rescan {
        roots: Vec<PathBuf>,
        /// Deepest level to record below each root; 0 is unlimited
        #[arg(long)]
        max_depth: Option<u32>,
    },
    /// Index one more folder without touching existing rows
    Add {
        path: PathBuf,
        #[arg(long)]
        max_depth: Option<u32>,
    },
    /// Remove a folder and everything beneath it from the index
    Remove { path: PathBuf },
    /// List indexed files with an exact extension, e.g. ".zip"
    Ext { extension: String },
    /// List every indexed folder and file under a folder
    Tree { path: PathBuf },
    /// Recreate the indexed folder hierarchy of a folder somewhere else
    Replicate { path: PathBuf, destination: PathBuf },
    /// Show row counts
    Stats,
    /// Print configuration values
    PrintConfig,
}
