use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root of the uploads tree, served publicly as `/uploads`.
    pub uploads_dir: PathBuf,
    /// SQLite database holding the blog posts.
    pub database: PathBuf,
    /// Bound on acquiring a connection and on SQLite busy waits.
    pub store_timeout: Duration,
    /// Period between scheduled sweeps.
    pub interval: Duration,
    /// Sweep once as soon as the scheduler starts.
    pub run_on_start: bool,
    /// Bound on a single sweep.
    pub run_timeout: Duration,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    paths: FilePaths,
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    schedule: FileSchedule,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize)]
struct FilePaths {
    #[serde(default = "default_uploads_dir")]
    uploads_dir: PathBuf,
}

#[derive(Deserialize)]
struct FileDatabase {
    #[serde(default = "default_database")]
    path: PathBuf,
    #[serde(default = "default_store_timeout")]
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct FileSchedule {
    #[serde(default = "default_interval")]
    interval_secs: u64,
    #[serde(default)]
    run_on_start: bool,
    #[serde(default = "default_run_timeout")]
    run_timeout_secs: u64,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_database() -> PathBuf {
    PathBuf::from("./data/blog.db")
}

fn default_store_timeout() -> u64 {
    10
}

fn default_interval() -> u64 {
    24 * 60 * 60
}

fn default_run_timeout() -> u64 {
    300
}

fn default_logging() -> bool {
    true
}

impl Default for FilePaths {
    fn default() -> Self {
        Self {
            uploads_dir: default_uploads_dir(),
        }
    }
}

impl Default for FileDatabase {
    fn default() -> Self {
        Self {
            path: default_database(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl Default for FileSchedule {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            run_on_start: false,
            run_timeout_secs: default_run_timeout(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("BLOGSWEEP_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/blogsweep.toml"));

        let file_cfg = match fs::read(&config_path) {
            Ok(bytes) => {
                let contents = String::from_utf8_lossy(&bytes);
                toml::from_str::<FileConfig>(&contents).context("invalid config file")?
            }
            Err(_) => FileConfig::default(),
        };

        let mut uploads_dir = file_cfg.paths.uploads_dir;
        let mut database = file_cfg.database.path;
        let mut interval_secs = file_cfg.schedule.interval_secs;
        let mut run_timeout_secs = file_cfg.schedule.run_timeout_secs;
        let mut store_timeout_secs = file_cfg.database.timeout_secs;
        let mut logging = file_cfg.logging.enabled;

        // environment overrides
        if let Ok(dir) = std::env::var("BLOGSWEEP_UPLOADS_DIR") {
            uploads_dir = PathBuf::from(dir);
        }
        if let Ok(db) = std::env::var("BLOGSWEEP_DATABASE") {
            database = PathBuf::from(db);
        }
        if let Ok(secs) = std::env::var("BLOGSWEEP_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                interval_secs = secs;
            }
        }
        if let Ok(secs) = std::env::var("BLOGSWEEP_RUN_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                run_timeout_secs = secs;
            }
        }
        if let Ok(secs) = std::env::var("BLOGSWEEP_STORE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                store_timeout_secs = secs;
            }
        }
        if let Ok(l) = std::env::var("BLOGSWEEP_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }

        // CLI overrides
        if let Some(dir) = &cli.uploads_dir {
            uploads_dir = dir.clone();
        }
        if let Some(db) = &cli.database {
            database = db.clone();
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        if interval_secs == 0 {
            anyhow::bail!("invalid_interval");
        }
        if run_timeout_secs == 0 {
            anyhow::bail!("invalid_run_timeout");
        }
        if store_timeout_secs == 0 {
            anyhow::bail!("invalid_store_timeout");
        }

        Ok(Self {
            uploads_dir,
            database,
            store_timeout: Duration::from_secs(store_timeout_secs),
            interval: Duration::from_secs(interval_secs),
            run_on_start: file_cfg.schedule.run_on_start,
            run_timeout: Duration::from_secs(run_timeout_secs),
            logging_enabled: logging,
        })
    }

    /// Directory holding featured post images.
    pub fn featured_dir(&self) -> PathBuf {
        self.uploads_dir.join("images").join("blog")
    }

    /// Directory holding images embedded in post bodies.
    pub fn content_dir(&self) -> PathBuf {
        self.featured_dir().join("content")
    }
}
