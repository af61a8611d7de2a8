use crate::reconcile::ImageDir;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line interface for the blog image sweeper.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the uploads root (the directory served as `/uploads`).
    #[arg(long, global = true)]
    pub uploads_dir: Option<PathBuf>,
    /// Override the SQLite database path.
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,
    /// Enable or disable logging (true/false).
    #[arg(long, global = true)]
    pub logging: Option<bool>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Default)]
pub enum Command {
    /// Sweep on the configured schedule until interrupted.
    #[default]
    Run,
    /// Sweep once and exit.
    Sweep,
    /// Print the image names posts currently reference.
    Refs {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create the database and posts table if they are missing.
    InitDb,
    /// Store a base64 data URL read from a file as a blog image.
    Upload {
        /// Directory the image belongs to.
        #[arg(long, value_enum)]
        target: ImageDir,
        /// File containing the `data:<mime>;base64,...` string.
        file: PathBuf,
    },
}
