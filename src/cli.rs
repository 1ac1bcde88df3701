use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "downsort")]
#[command(about = "Keeps a downloads folder organized", long_about = None)]
pub struct Cli {
    /// Index database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Downloads folder to operate on (overrides the stored setting)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk the downloads folder and refresh the index
    Scan,
    /// Preview or apply category moves
    Organize {
        /// Actually move files; without this flag only the plan is printed
        #[arg(long)]
        apply: bool,
    },
    /// Preview or apply temp-file deletion and old-file archival
    Cleanup {
        #[arg(long)]
        apply: bool,
    },
    /// List groups of files with identical content
    Duplicates,
    /// Print dashboard statistics
    Stats,
    /// Print storage usage
    Storage,
    /// List indexed files
    Files {
        /// Only this category (Images, Documents, ...)
        #[arg(long)]
        category: Option<String>,
        /// Substring match on file name
        #[arg(long)]
        search: Option<String>,
    },
    /// Show the most recent activity entries
    Activity {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the stored settings
    Settings,
    /// Print the extension-to-category rules
    Rules,
    /// Watch the downloads folder and keep the index fresh until interrupted
    Watch,
}
