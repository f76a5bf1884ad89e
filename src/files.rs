//! File storage for revision uploads
//!
//! The engine never interprets document contents; it stores the bytes and
//! keeps the returned URL as the round's document snapshot.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::RoutingConfig;
use crate::errors::{AppError, Result};

/// An uploaded revision, as received from the HTTP layer
#[derive(Debug, Clone)]
pub struct RevisionUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Storage seam for uploaded documents
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Validate and persist an upload, returning a stable URL for it
    async fn store_revision(&self, upload: RevisionUpload) -> Result<String>;
}

/// Stores uploads on the local filesystem under a timestamped name
pub struct LocalFileStore {
    root: PathBuf,
    url_prefix: String,
    max_bytes: usize,
}

impl LocalFileStore {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            root: PathBuf::from(&config.upload_dir),
            url_prefix: config.upload_url_prefix.trim_end_matches('/').to_string(),
            max_bytes: config.max_upload_bytes,
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store_revision(&self, upload: RevisionUpload) -> Result<String> {
        if upload.content_type != "application/pdf" {
            return Err(AppError::validation("Only PDF files are allowed"));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(AppError::validation(format!(
                "File size must be less than {} bytes",
                self.max_bytes
            )));
        }

        tokio::fs::create_dir_all(&self.root).await?;

        let name = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            sanitize_filename(&upload.filename)
        );
        let path = self.root.join(&name);
        tokio::fs::write(&path, &upload.bytes).await?;

        info!(path = %path.display(), size = upload.bytes.len(), "Stored revision upload");

        Ok(format!("{}/{}", self.url_prefix, name))
    }
}

/// Keep only the final path component and drop characters that could
/// escape the uploads directory
fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("revision.pdf");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "revision.pdf".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("thesis v2.pdf"), "thesis_v2.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(""), "revision.pdf");
    }

    #[tokio::test]
    async fn test_rejects_non_pdf() {
        let store = LocalFileStore::new(&crate::config::AppConfig::default().routing);
        let err = store
            .store_revision(RevisionUpload {
                filename: "notes.txt".into(),
                content_type: "text/plain".into(),
                bytes: vec![1, 2, 3],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_rejects_oversize() {
        let mut config = crate::config::AppConfig::default().routing;
        config.max_upload_bytes = 8;
        let store = LocalFileStore::new(&config);
        let err = store
            .store_revision(RevisionUpload {
                filename: "big.pdf".into(),
                content_type: "application/pdf".into(),
                bytes: vec![0; 16],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
