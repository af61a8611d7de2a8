use serde::Serialize;
use std::{
    collections::BTreeSet,
    fmt, io,
    path::PathBuf,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use store_api::FileStore;
use tracing::{debug, info, warn};

/// Files younger than this are never removed, referenced or not. Uploads are
/// written before the post that points at them is saved.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Which of the two image directories a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageDir {
    Featured,
    Content,
}

impl ImageDir {
    /// Names that are never deletion candidates in this directory.
    pub fn protected(self) -> &'static [&'static str] {
        match self {
            // the content directory is nested inside the featured one
            ImageDir::Featured => &[".gitkeep", "default-post.jpg", "content"],
            ImageDir::Content => &[".gitkeep"],
        }
    }
}

impl fmt::Display for ImageDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageDir::Featured => f.pad("featured"),
            ImageDir::Content => f.pad("content"),
        }
    }
}

/// A directory under sweep together with its kind.
#[derive(Debug, Clone)]
pub struct WatchedDir {
    pub kind: ImageDir,
    pub path: PathBuf,
}

impl WatchedDir {
    pub fn new(kind: ImageDir, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Outcome of reconciling one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirReport {
    pub kind: ImageDir,
    /// Entries returned by the listing.
    pub scanned: usize,
    pub removed: usize,
    /// Files whose stat or delete failed.
    pub failed: usize,
    /// Set when the run deadline stopped the scan early.
    pub interrupted: bool,
}

impl DirReport {
    fn empty(kind: ImageDir) -> Self {
        Self {
            kind,
            scanned: 0,
            removed: 0,
            failed: 0,
            interrupted: false,
        }
    }
}

/// Modification times strictly before this instant are stale.
pub fn stale_cutoff(now: SystemTime) -> SystemTime {
    now.checked_sub(RETENTION_WINDOW).unwrap_or(UNIX_EPOCH)
}

/// Create `dir` if it is missing. Returns whether it had to be created.
pub fn ensure_dir<F: FileStore + ?Sized>(files: &F, dir: &WatchedDir) -> io::Result<bool> {
    if files.exists(&dir.path) {
        return Ok(false);
    }
    info!(dir = %dir.kind, path = %dir.path.display(), "image directory missing, creating");
    files.create_dir_all(&dir.path)?;
    Ok(true)
}

/// Delete every file in `dir` that is unprotected, stale and absent from `refs`.
///
/// Per-file stat and delete failures are logged and skipped. Only creating or
/// listing the directory itself can fail the call. No removal is attempted
/// once `deadline` has passed.
pub fn reconcile_dir<F: FileStore + ?Sized>(
    files: &F,
    dir: &WatchedDir,
    refs: &BTreeSet<String>,
    cutoff: SystemTime,
    deadline: Instant,
) -> io::Result<DirReport> {
    let mut report = DirReport::empty(dir.kind);
    if ensure_dir(files, dir)? {
        return Ok(report);
    }

    let entries = files.list(&dir.path)?;
    report.scanned = entries.len();
    let protected = dir.kind.protected();

    for entry in entries {
        if entry.is_dir || protected.contains(&entry.name.as_str()) {
            continue;
        }
        let path = dir.path.join(&entry.name);
        let modified = match files.modified(&path) {
            Ok(modified) => modified,
            Err(err) => {
                warn!(dir = %dir.kind, file = %entry.name, error = %err, "failed to stat image");
                report.failed += 1;
                continue;
            }
        };
        if modified >= cutoff || refs.contains(&entry.name) {
            continue;
        }
        if Instant::now() >= deadline {
            warn!(dir = %dir.kind, "run deadline reached, leaving remaining files");
            report.interrupted = true;
            break;
        }
        match files.remove(&path) {
            Ok(()) => {
                info!(dir = %dir.kind, file = %entry.name, reason = "orphaned and stale", "removed image");
                report.removed += 1;
            }
            Err(err) => {
                warn!(dir = %dir.kind, file = %entry.name, error = %err, "failed to remove image");
                report.failed += 1;
            }
        }
    }

    debug!(dir = %dir.kind, scanned = report.scanned, removed = report.removed, "directory reconciled");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::files::LocalFiles;
    use std::fs;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn far_deadline() -> Instant {
        Instant::now() + HOUR
    }

    fn refs(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn missing_directory_is_created_and_reports_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = WatchedDir::new(ImageDir::Content, tmp.path().join("content"));
        let report = reconcile_dir(
            &LocalFiles,
            &dir,
            &refs(&[]),
            stale_cutoff(SystemTime::now()),
            far_deadline(),
        )
        .unwrap();
        assert!(dir.path.is_dir());
        assert_eq!(report, DirReport::empty(ImageDir::Content));
    }

    #[test]
    fn retention_window_protects_recent_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("fresh.png"), b"x").unwrap();
        let dir = WatchedDir::new(ImageDir::Featured, tmp.path());

        // an hour after the upload the file is still inside the window
        let cutoff = stale_cutoff(SystemTime::now() + HOUR);
        let report = reconcile_dir(&LocalFiles, &dir, &refs(&[]), cutoff, far_deadline()).unwrap();
        assert_eq!(report.removed, 0);
        assert!(tmp.path().join("fresh.png").exists());

        // thirty hours later it is not
        let cutoff = stale_cutoff(SystemTime::now() + 30 * HOUR);
        let report = reconcile_dir(&LocalFiles, &dir, &refs(&[]), cutoff, far_deadline()).unwrap();
        assert_eq!(report.removed, 1);
        assert!(!tmp.path().join("fresh.png").exists());
    }

    #[test]
    fn referenced_and_protected_files_survive() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["kept.jpg", "orphan.jpg", "default-post.jpg", ".gitkeep"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        fs::create_dir(tmp.path().join("content")).unwrap();
        let dir = WatchedDir::new(ImageDir::Featured, tmp.path());

        let cutoff = stale_cutoff(SystemTime::now() + 30 * HOUR);
        let report =
            reconcile_dir(&LocalFiles, &dir, &refs(&["kept.jpg"]), cutoff, far_deadline())
                .unwrap();

        assert_eq!(report.scanned, 5);
        assert_eq!(report.removed, 1);
        assert!(!tmp.path().join("orphan.jpg").exists());
        for name in ["kept.jpg", "default-post.jpg", ".gitkeep", "content"] {
            assert!(tmp.path().join(name).exists(), "{name} was removed");
        }
    }

    #[test]
    fn passed_deadline_stops_deletions() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("old.png"), b"x").unwrap();
        let dir = WatchedDir::new(ImageDir::Content, tmp.path());

        let cutoff = stale_cutoff(SystemTime::now() + 30 * HOUR);
        let report = reconcile_dir(&LocalFiles, &dir, &refs(&[]), cutoff, Instant::now()).unwrap();
        assert!(report.interrupted);
        assert_eq!(report.removed, 0);
        assert!(tmp.path().join("old.png").exists());
    }

    #[test]
    fn cutoff_saturates_at_epoch() {
        assert_eq!(stale_cutoff(UNIX_EPOCH), UNIX_EPOCH);
    }
}
