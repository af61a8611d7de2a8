use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode, OpenFlags};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use store_api::{ContentStore, PostImages, StoreError};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blog_posts (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  slug TEXT NOT NULL UNIQUE,
  excerpt TEXT,
  content TEXT NOT NULL,
  date INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
  image TEXT,
  author TEXT,
  category TEXT,
  tags TEXT,
  published INTEGER NOT NULL DEFAULT 0,
  featured INTEGER NOT NULL DEFAULT 0,
  meta_description TEXT,
  last_modified INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
"#;

/// Blog post store backed by a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
    timeout: Duration,
}

/// Fields needed to seed a post.
#[derive(Debug, Clone, Default)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub image: Option<&'a str>,
    pub content: &'a str,
}

impl SqliteStore {
    /// Open an existing database at `path`.
    ///
    /// Never creates the file or the schema: a wrong path must fail the
    /// sweep rather than look like a blog without posts. No connection is
    /// made until the first query. `timeout` bounds both pool checkout and
    /// SQLite's busy wait.
    pub fn open<P: AsRef<Path>>(path: P, timeout: Duration) -> Self {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        Self::with_flags(path.as_ref(), timeout, flags)
    }

    /// Create the database at `path` if missing and run migrations.
    pub fn create<P: AsRef<Path>>(path: P, timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = Self::with_flags(path, timeout, OpenFlags::default());
        store
            .pool
            .get()
            .with_context(|| format!("opening database {}", path.display()))?
            .execute_batch(SCHEMA)?;
        Ok(store)
    }

    fn with_flags(path: &Path, timeout: Duration, flags: OpenFlags) -> Self {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(flags)
            .with_init(move |conn| conn.busy_timeout(timeout));
        let pool = Pool::builder()
            .max_size(4)
            .min_idle(Some(0))
            .connection_timeout(timeout)
            .build_unchecked(manager);
        Self {
            pool,
            path: path.to_path_buf(),
            timeout,
        }
    }

    /// Insert a post and return its row id.
    pub fn insert_post(&self, post: &NewPost<'_>) -> Result<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO blog_posts (title, slug, image, content) VALUES (?1, ?2, ?3, ?4)",
            params![post.title, post.slug, post.image, post.content],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_error(&self, err: rusqlite::Error) -> StoreError {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Timeout(self.timeout)
            }
            Some(ErrorCode::CannotOpen) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

impl ContentStore for SqliteStore {
    fn post_images(&self) -> Result<Vec<PostImages>, StoreError> {
        if !self.path.is_file() {
            return Err(StoreError::Unavailable(format!(
                "database {} does not exist",
                self.path.display()
            )));
        }
        let conn = self
            .pool
            .get()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT image, content FROM blog_posts")
            .map_err(|e| self.query_error(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PostImages {
                    image: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(|e| self.query_error(e))?;
        let posts = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.query_error(e))?;
        Ok(posts)
    }
}
