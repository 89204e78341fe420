//! Image storage
//!
//! Post images live on disk under the configured directory, one folder per
//! post: `post_<id>/<uuid><ext>`. The database only records that relative
//! path.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::config::StorageConfig;

/// Longest file extension kept from an uploaded name, dot excluded
const MAX_EXTENSION_LEN: usize = 10;

/// Error types for image storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Image is empty")]
    Empty,

    #[error("Image too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid image path: {0}")]
    InvalidPath(String),

    #[error("Image storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File-system store for post images
#[derive(Debug, Clone)]
pub struct ImageStorage {
    base_dir: PathBuf,
    max_file_size: u64,
}

impl ImageStorage {
    pub fn new(base_dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_file_size,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.path.clone(), config.max_file_size)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Write a new image for a post and return its relative path.
    pub async fn store(
        &self,
        post_id: i64,
        file_name: Option<&str>,
        data: &[u8],
    ) -> Result<String, StorageError> {
        if data.is_empty() {
            return Err(StorageError::Empty);
        }
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(StorageError::TooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let relative = format!(
            "{}/{}{}",
            post_dir_name(post_id),
            Uuid::new_v4(),
            extension_of(file_name)
        );
        let full = self.resolve(&relative)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full, data).await?;

        tracing::info!(post_id, path = %relative, size, "Stored post image");
        Ok(relative)
    }

    /// Read a stored image
    pub async fn read(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(relative)?;
        match fs::read(&full).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(relative.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored image; a file that is already gone is not an error.
    pub async fn delete(&self, relative: &str) -> Result<(), StorageError> {
        let full = self.resolve(relative)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the whole image folder of a post
    pub async fn delete_post_dir(&self, post_id: i64) -> Result<(), StorageError> {
        let dir = self.base_dir.join(post_dir_name(post_id));
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Join a stored relative path onto the base directory. Only plain
    /// relative components are accepted.
    fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(relative);
        let plain = !relative.is_empty()
            && path.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.base_dir.join(path))
    }
}

fn post_dir_name(post_id: i64) -> String {
    format!("post_{}", post_id)
}

/// Extension of an uploaded file name including the dot, or empty.
pub fn extension_of(file_name: Option<&str>) -> String {
    let Some(name) = file_name else {
        return String::new();
    };
    let Some((_, ext)) = name.rsplit_once('.') else {
        return String::new();
    };
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return String::new();
    }
    format!(".{}", ext.to_ascii_lowercase())
}

/// Content type for a stored image, guessed from its extension
pub fn content_type_for(relative: &str) -> &'static str {
    let ext = relative
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
