//! versionfs - a versioned file store backed by rdiff-backup.
//!
//! Every write through this tool records a new version of the file. Old
//! versions can be listed, read back and pruned.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "versionfs")]
#[command(author, version, about = "Versioned file store backed by rdiff-backup", long_about = None)]
struct Cli {
    /// Root directory of the store
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to versionfs.json in the root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append logs to a file in the log directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file, recording a new version
    Upload {
        /// Local file to read
        file: PathBuf,

        /// Name in the store (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Read the current or a historical version of a file
    Download {
        /// Name in the store
        name: String,

        /// Version to read (defaults to the current content)
        #[arg(long)]
        version: Option<u64>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List files with their current version
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the recorded versions of a file
    History {
        /// Name in the store
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop versions older than a version number or timestamp
    Prune {
        /// Name in the store
        name: String,

        /// Oldest version to keep, or an rdiff-backup timestamp
        boundary: String,
    },

    /// Remove a file or directory and its history
    Rm {
        /// Name in the store
        name: String,

        /// Remove a non-empty directory
        #[arg(short, long)]
        recursive: bool,
    },

    /// Move a file or directory, keeping its history
    Mv {
        /// Source name
        src: String,

        /// Destination name
        dst: String,

        /// Replace an existing destination file
        #[arg(short, long)]
        force: bool,
    },

    /// Create a directory
    Mkdir {
        /// Name in the store
        name: String,

        /// Create missing parents
        #[arg(short, long)]
        parents: bool,
    },

    /// Repair a file's version counter from the backup history
    Reconcile {
        /// Name in the store
        name: String,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = init_logging(cli.verbose, cli.log_file);
    if let Some(path) = &log_file {
        tracing::debug!(path = %path.display(), "Logging to file");
    }

    let config = load_config(&cli.root, cli.config.as_deref()).await?;
    if let Commands::Config = cli.command {
        return show_config(&config);
    }

    let vfs = open_store(&cli.root, config).await?;

    match cli.command {
        Commands::Upload { file, name } => handle_upload(&vfs, &file, name).await,
        Commands::Download {
            name,
            version,
            output,
        } => handle_download(&vfs, &name, version, output).await,
        Commands::List { json } => handle_list(&vfs, json).await,
        Commands::History { name, json } => handle_history(&vfs, &name, json).await,
        Commands::Prune { name, boundary } => handle_prune(&vfs, &name, &boundary).await,
        Commands::Rm { name, recursive } => handle_remove(&vfs, &name, recursive).await,
        Commands::Mv { src, dst, force } => handle_move(&vfs, &src, &dst, force).await,
        Commands::Mkdir { name, parents } => handle_mkdir(&vfs, &name, parents).await,
        Commands::Reconcile { name } => handle_reconcile(&vfs, &name).await,
        Commands::Config => show_config(vfs.config()),
    }
}
