mod commands;
mod logging;
mod progress;

use std::path::PathBuf;
use std::process;

use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dirdex_core::{AppConfig, Indexer};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match dirdex_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();
    let database = args
        .database
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.database_path));

    let command = match args.command {
        Some(command) => command,
        None => {
            let _ = Cli::command().print_long_help();
            return Ok(());
        }
    };

    let indexer = match Indexer::initialize(&database) {
        Ok(indexer) => indexer.with_ignore_patterns(&config.ignore_patterns),
        Err(err) => {
            error!("Error opening index {}: {}", database.display(), err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&indexer, &config, command) {
        error!("Error: {}", err);
        process::exit(1);
    }

    Ok(())
}

fn run(
    indexer: &Indexer,
    config: &AppConfig,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    let reporter = CliReporter::new();

    match command {
        Commands::Rescan { roots, max_depth } => {
            let roots = if roots.is_empty() {
                config.root_paths.iter().map(PathBuf::from).collect()
            } else {
                roots
            };
            if roots.is_empty() {
                return Err("no roots given and none configured in root_paths".into());
            }
            let stats =
                indexer.full_rescan(&roots, max_depth.unwrap_or(config.max_depth), &reporter)?;
            info!(
                "{} folders, {} files, {} bytes indexed ({} branches skipped)",
                format!("{}", stats.folders).green(),
                format!("{}", stats.files).green(),
                format!("{}", stats.total_bytes).green(),
                format!("{}", stats.skipped_branches).yellow(),
            );
        }
        Commands::Add { path, max_depth } => {
            let stats =
                indexer.add_folder(&path, max_depth.unwrap_or(config.max_depth), &reporter)?;
            info!(
                "Added {}: {} folders, {} files",
                path.display(),
                format!("{}", stats.folders).green(),
                format!("{}", stats.files).green(),
            );
        }
        Commands::Remove { path } => {
            let removed = indexer.remove_folder(&path)?;
            info!(
                "Removed {}: {} folders, {} files",
                path.display(),
                format!("{}", removed.folders).red(),
                format!("{}", removed.files).red(),
            );
        }
        Commands::Ext { extension } => {
            let files = indexer.files_with_extension(&extension)?;
            for file in &files {
                println!("{}\t{}", file.size, file.path);
            }
            info!("{} files with extension {}", format!("{}", files.len()).cyan(), extension);
        }
        Commands::Tree { path } => {
            let subtree = indexer.subtree(&path)?;
            for folder in &subtree.folders {
                println!("{}", folder.path.blue());
            }
            for file in &subtree.files {
                println!("{}\t{}", file.size, file.path);
            }
        }
        Commands::Replicate { path, destination } => {
            let created = indexer.replicate_folders(&path, &destination)?;
            info!(
                "{} folders replicated to {}",
                format!("{}", created).green(),
                destination.display()
            );
        }
        Commands::Stats => {
            let stats = indexer.stats()?;
            println!(
                "{} folders, {} files, {} bytes",
                format!("{}", stats.folders).cyan(),
                format!("{}", stats.files).cyan(),
                format!("{}", stats.total_bytes).cyan(),
            );
        }
        Commands::PrintConfig => println!("Configuration: {:?}", config),
    }

    Ok(())
}
