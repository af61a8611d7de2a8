use serde::{Deserialize, Serialize};
use std::{io, path::Path, time::SystemTime};
use thiserror::Error;

/// The two columns of a blog post the image sweep cares about.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PostImages {
    /// Featured image path, e.g. `/images/blog/foo.jpg`.
    pub image: Option<String>,
    /// HTML body of the post.
    pub content: Option<String>,
}

/// Failures of the content store. None of these may be read as "no posts".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    #[error("content store query failed: {0}")]
    Query(String),

    #[error("content store timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Read-only view over the posts table.
pub trait ContentStore: Send + Sync {
    /// Fetch the image and content field of every post.
    fn post_images(&self) -> Result<Vec<PostImages>, StoreError>;
}

/// One entry of a non-recursive directory listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// File system operations used by the sweep. Every call may fail on its own.
pub trait FileStore: Send + Sync {
    fn exists(&self, dir: &Path) -> bool;
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;
    fn remove(&self, path: &Path) -> io::Result<()>;
}

impl<T: ContentStore + ?Sized> ContentStore for std::sync::Arc<T> {
    fn post_images(&self) -> Result<Vec<PostImages>, StoreError> {
        (**self).post_images()
    }
}

impl<T: FileStore + ?Sized> FileStore for std::sync::Arc<T> {
    fn exists(&self, dir: &Path) -> bool {
        (**self).exists(dir)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        (**self).create_dir_all(dir)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        (**self).list(dir)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        (**self).modified(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        (**self).remove(path)
    }
}
