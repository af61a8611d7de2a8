use crate::{reconcile::ImageDir, refs::CONTENT_URL_MARKER};
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([A-Za-z+/-]+);base64,(.+)$").unwrap());

/// Public URL prefix of featured images.
pub const FEATURED_URL_PREFIX: &str = "/uploads/images/blog/";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("not a base64 image data URL")]
    InvalidDataUrl,

    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// An image written to one of the blog image directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,
    /// Path the site serves the image under.
    pub url: String,
}

/// Decode a `data:<mime>;base64,<payload>` string and store it in `dir`
/// under a fresh `<uuid>.<subtype>` name.
pub async fn save_data_url<P: AsRef<Path>>(
    dir: P,
    kind: ImageDir,
    data_url: &str,
) -> Result<SavedImage, UploadError> {
    let caps = DATA_URL_RE
        .captures(data_url.trim())
        .ok_or(UploadError::InvalidDataUrl)?;
    let extension = caps[1]
        .split_once('/')
        .map(|(_, sub)| sub)
        .filter(|sub| !sub.is_empty() && !sub.contains('/'))
        .ok_or(UploadError::InvalidDataUrl)?;
    let bytes = STANDARD.decode(&caps[2])?;

    let name = format!("{}.{}", Uuid::new_v4(), extension);
    fs::create_dir_all(dir.as_ref()).await?;
    let path = dir.as_ref().join(&name);
    fs::write(&path, bytes).await?;

    let prefix = match kind {
        ImageDir::Featured => FEATURED_URL_PREFIX,
        ImageDir::Content => CONTENT_URL_MARKER,
    };
    Ok(SavedImage {
        path,
        url: format!("{prefix}{name}"),
    })
}
