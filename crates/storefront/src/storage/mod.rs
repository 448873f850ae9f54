//! Remote object storage for product images.
//!
//! Images are uploaded under a UUID-prefixed, sanitized file name and the
//! returned public URL is stored as the product's image.

mod b2;
mod memory;

pub use b2::B2Client;
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Longest sanitized file name kept after the UUID prefix.
const MAX_FILE_NAME_LENGTH: usize = 100;

/// Errors that can occur when storing objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storage API answered with an error status.
    #[error("storage API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The configured bucket does not exist or is not visible to the key.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// File type is not an accepted image.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// Storage could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Write-only object storage with public URLs.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `bytes` as `object_name` and return its public URL.
    async fn upload(
        &self,
        object_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError>;
}

/// Content type for an accepted image file name, by extension.
#[must_use]
pub fn image_content_type(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Reduce an uploaded file name to `[A-Za-z0-9._-]`, without leading dots.
#[must_use]
pub fn sanitize_filename(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "upload".to_owned();
    }
    // Keep the extension when truncating.
    if cleaned.len() > MAX_FILE_NAME_LENGTH {
        let ext = cleaned.rsplit_once('.').map_or("", |(_, ext)| ext);
        let keep = MAX_FILE_NAME_LENGTH.saturating_sub(ext.len() + 1);
        if ext.is_empty() || keep == 0 {
            return cleaned[..MAX_FILE_NAME_LENGTH].to_owned();
        }
        return format!("{}.{ext}", &cleaned[..keep]);
    }
    cleaned.to_owned()
}

/// Unique object name for an uploaded file.
#[must_use]
pub fn object_name(file_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_filename(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_odd_characters() {
        assert_eq!(sanitize_filename("mug.png"), "mug.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\photos\My Mug (1).JPG"), "My_Mug__1_.JPG");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("tée.png"), "t_e.png");
    }

    #[test]
    fn test_sanitize_truncates_keeping_extension() {
        let long = format!("{}.webp", "a".repeat(300));
        let cleaned = sanitize_filename(&long);
        assert_eq!(cleaned.len(), MAX_FILE_NAME_LENGTH);
        assert!(cleaned.ends_with(".webp"));
    }

    #[test]
    fn test_object_names_are_unique() {
        let a = object_name("mug.png");
        let b = object_name("mug.png");
        assert_ne!(a, b);
        assert!(a.ends_with("-mug.png"));
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type("a.JPG"), Some("image/jpeg"));
        assert_eq!(image_content_type("a.webp"), Some("image/webp"));
        assert_eq!(image_content_type("a.exe"), None);
        assert_eq!(image_content_type("noext"), None);
    }
}
