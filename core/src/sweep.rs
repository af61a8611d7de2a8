use crate::{
    reconcile::{ensure_dir, reconcile_dir, stale_cutoff, DirReport, ImageDir, WatchedDir},
    refs::ImageRefs,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};
use store_api::{ContentStore, FileStore, StoreError};
use thiserror::Error;
use tracing::{error, info, warn};

/// Default bound on a single run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to prepare {dir} directory {path}: {source}")]
    Setup {
        dir: ImageDir,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reference scan exceeded the {0:?} run deadline")]
    Timeout(Duration),
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Idle,
    Scanning,
    Reconciling,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub featured_refs: usize,
    pub content_refs: usize,
    pub dirs: Vec<DirReport>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.dirs.iter().map(|d| d.removed).sum()
    }

    pub fn interrupted(&self) -> bool {
        self.dirs.iter().any(|d| d.interrupted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another run was still in progress.
    Skipped,
    /// The run failed or hit its deadline. Details were logged.
    Aborted,
}

/// Removes uploaded blog images that no post references any more.
pub struct Sweeper<S, F> {
    store: S,
    files: F,
    featured: WatchedDir,
    content: WatchedDir,
    run_timeout: Duration,
    phase: Mutex<SweepPhase>,
}

struct PhaseGuard<'a>(&'a Mutex<SweepPhase>);

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = SweepPhase::Idle;
    }
}

impl<S: ContentStore, F: FileStore> Sweeper<S, F> {
    pub fn new(
        store: S,
        files: F,
        featured_dir: impl Into<PathBuf>,
        content_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            files,
            featured: WatchedDir::new(ImageDir::Featured, featured_dir),
            content: WatchedDir::new(ImageDir::Content, content_dir),
            run_timeout: DEFAULT_RUN_TIMEOUT,
            phase: Mutex::new(SweepPhase::Idle),
        }
    }

    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn featured_dir(&self) -> &Path {
        &self.featured.path
    }

    pub fn content_dir(&self) -> &Path {
        &self.content.path
    }

    pub fn phase(&self) -> SweepPhase {
        *self.phase.lock()
    }

    /// Current reference sets, without touching the file system.
    pub fn refs(&self) -> Result<ImageRefs, StoreError> {
        let posts = self.store.post_images()?;
        Ok(ImageRefs::extract(&posts))
    }

    /// Run one sweep now. Never fails: errors are logged and the outcome
    /// returned for callers that want it.
    pub fn run(&self) -> SweepOutcome {
        self.run_at(SystemTime::now())
    }

    /// Run one sweep judging file age against `now`.
    pub fn run_at(&self, now: SystemTime) -> SweepOutcome {
        let Some(_guard) = self.begin() else {
            warn!("previous image sweep still running, skipping");
            return SweepOutcome::Skipped;
        };
        info!("starting orphan image sweep");
        match self.sweep(now) {
            Ok(report) if report.interrupted() => {
                warn!(
                    removed = report.removed(),
                    "image sweep stopped at its deadline"
                );
                SweepOutcome::Aborted
            }
            Ok(report) => {
                info!(removed = report.removed(), "image sweep finished");
                SweepOutcome::Completed(report)
            }
            Err(err) => {
                error!(error = %err, "image sweep aborted, nothing removed");
                SweepOutcome::Aborted
            }
        }
    }

    fn begin(&self) -> Option<PhaseGuard<'_>> {
        let mut phase = self.phase.lock();
        if *phase != SweepPhase::Idle {
            return None;
        }
        *phase = SweepPhase::Scanning;
        Some(PhaseGuard(&self.phase))
    }

    fn sweep(&self, now: SystemTime) -> Result<SweepReport, SweepError> {
        let deadline = Instant::now() + self.run_timeout;

        for dir in [&self.featured, &self.content] {
            ensure_dir(&self.files, dir).map_err(|source| SweepError::Setup {
                dir: dir.kind,
                path: dir.path.clone(),
                source,
            })?;
        }

        // a store failure must end the run here, before any deletion
        let refs = self.refs()?;
        info!(
            featured = refs.featured.len(),
            content = refs.content.len(),
            "collected image references"
        );
        if Instant::now() >= deadline {
            return Err(SweepError::Timeout(self.run_timeout));
        }

        *self.phase.lock() = SweepPhase::Reconciling;
        let cutoff = stale_cutoff(now);
        let mut dirs = Vec::with_capacity(2);
        for (dir, names) in [
            (&self.featured, &refs.featured),
            (&self.content, &refs.content),
        ] {
            match reconcile_dir(&self.files, dir, names, cutoff, deadline) {
                Ok(report) => dirs.push(report),
                Err(err) => {
                    error!(dir = %dir.kind, error = %err, "failed to scan image directory");
                }
            }
        }

        Ok(SweepReport {
            featured_refs: refs.featured.len(),
            content_refs: refs.content.len(),
            dirs,
        })
    }
}
