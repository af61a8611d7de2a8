use std::{fs, io, path::Path, time::SystemTime};
use store_api::{DirEntry, FileStore};

/// [`FileStore`] over the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFiles;

impl FileStore for LocalFiles {
    fn exists(&self, dir: &Path) -> bool {
        dir.exists()
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            // non-UTF-8 names can never match a reference, treat them as opaque
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry { name, is_dir });
        }
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}
