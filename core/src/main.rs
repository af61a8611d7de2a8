use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blogsweep::{
    cli::{Cli, Command},
    config::Config,
    reconcile::ImageDir,
    services::{files::LocalFiles, scheduler::Scheduler, storage::SqliteStore},
    upload::save_data_url,
    SweepOutcome, Sweeper,
};

type BlogSweeper = Sweeper<SqliteStore, LocalFiles>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(&cli)?;
    let level = if cfg.logging_enabled { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Command::Run => {
            let sweeper = open_sweeper(&cfg);
            info!(
                featured = %sweeper.featured_dir().display(),
                content = %sweeper.content_dir().display(),
                "watching image directories"
            );
            let mut scheduler =
                Scheduler::new(sweeper, cfg.interval).run_on_start(cfg.run_on_start);
            scheduler.start();
            info!("image sweeper running - press Ctrl+C to exit");
            shutdown_signal().await?;
            scheduler.stop().await;
        }
        Command::Sweep => {
            let sweeper = open_sweeper(&cfg);
            match tokio::task::spawn_blocking(move || sweeper.run()).await? {
                SweepOutcome::Completed(report) => {
                    for dir in &report.dirs {
                        println!(
                            "{:<9} scanned {:>5}  removed {:>5}  failed {:>3}",
                            dir.kind, dir.scanned, dir.removed, dir.failed
                        );
                    }
                    println!("{} orphaned images removed", report.removed());
                }
                SweepOutcome::Skipped => println!("another sweep is running"),
                SweepOutcome::Aborted => anyhow::bail!("sweep aborted, see log for details"),
            }
        }
        Command::Refs { json } => {
            let sweeper = open_sweeper(&cfg);
            let refs = tokio::task::spawn_blocking(move || sweeper.refs()).await??;
            if json {
                println!("{}", serde_json::to_string_pretty(&refs)?);
            } else {
                for name in &refs.featured {
                    println!("featured {name}");
                }
                for name in &refs.content {
                    println!("content  {name}");
                }
            }
        }
        Command::InitDb => {
            SqliteStore::create(&cfg.database, cfg.store_timeout)?;
            info!(path = %cfg.database.display(), "database ready");
        }
        Command::Upload { target, file } => {
            let data = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let dir = match target {
                ImageDir::Featured => cfg.featured_dir(),
                ImageDir::Content => cfg.content_dir(),
            };
            let saved = save_data_url(&dir, target, &data).await?;
            info!(path = %saved.path.display(), "image stored");
            println!("{}", saved.url);
        }
    }
    Ok(())
}

fn open_sweeper(cfg: &Config) -> Arc<BlogSweeper> {
    let store = SqliteStore::open(&cfg.database, cfg.store_timeout);
    let sweeper = Sweeper::new(store, LocalFiles, cfg.featured_dir(), cfg.content_dir())
        .with_run_timeout(cfg.run_timeout);
    Arc::new(sweeper)
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = terminate.recv() => info!("received terminate signal, shutting down"),
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}
