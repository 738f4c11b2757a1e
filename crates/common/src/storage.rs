//! File storage for rendered permit documents.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{AppError, AppResult};

/// Storage configuration.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem storage.
    Local {
        /// Directory files are written under.
        base_path: PathBuf,
        /// URL prefix the directory is served from.
        base_url: String,
    },
}

/// A file as written by a [`StorageBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
    /// Hex MD5 digest of the content.
    pub checksum: String,
}

/// Where final permit documents are kept.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `data` under `key`, replacing any previous content.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile>;

    /// Remove the file at `key`. Missing files are not an error.
    async fn remove(&self, key: &str) -> AppResult<()>;

    /// Whether a file exists at `key`.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Public URL of `key`.
    fn url_for(&self, key: &str) -> String;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Create a local storage backend from configuration.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        match config {
            StorageConfig::Local {
                base_path,
                base_url,
            } => Self::new(base_path.clone(), base_url.clone()),
        }
    }

    /// Map a key to a path below the base directory.
    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(AppError::BadRequest(format!("Invalid storage key: {key}")));
        }
        Ok(self.base_path.join(relative))
    }
}

fn io_error(action: &str, path: &Path, e: &std::io::Error) -> AppError {
    AppError::ExternalService(format!("Failed to {action} {}: {e}", path.display()))
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create", parent, &e))?;
        }

        // Readers never see a half-written document.
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, data)
            .await
            .map_err(|e| io_error("write", &partial, &e))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| io_error("move into place", &path, &e))?;

        Ok(StoredFile {
            key: key.to_string(),
            url: self.url_for(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            checksum: format!("{:x}", md5::compute(data)),
        })
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, &e)),
        }
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| io_error("inspect", &path, &e))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url.trim_end_matches('/'))
    }
}

/// Storage key of a final permit document.
///
/// Documents are grouped by issue month and request:
/// `permits/YYYY/MM/{request_id}/{filename}`. Characters outside
/// `[A-Za-z0-9._-]` in the file name become `_`.
#[must_use]
pub fn permit_document_key(request_id: &str, filename: &str, issued_at: DateTime<Utc>) -> String {
    let filename: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let filename = filename.trim_start_matches('.');
    let filename = if filename.is_empty() {
        "permit"
    } else {
        filename
    };

    format!(
        "permits/{}/{request_id}/{filename}",
        issued_at.format("%Y/%m")
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("permit-hub-{}", ulid::Ulid::new()))
    }

    #[test]
    fn test_permit_document_key() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();

        assert_eq!(
            permit_document_key("r1", "domicile-PRM-20260314-ABCDEFGH.json", at),
            "permits/2026/03/r1/domicile-PRM-20260314-ABCDEFGH.json"
        );
        assert_eq!(
            permit_document_key("r1", "../KEC/01 permit.json", at),
            "permits/2026/03/r1/_KEC_01_permit.json"
        );
        assert_eq!(permit_document_key("r1", "..", at), "permits/2026/03/r1/permit");
    }

    #[tokio::test]
    async fn test_local_storage_put_and_remove() {
        let base = scratch_dir();
        let storage = LocalStorage::new(base.clone(), "https://files.example/".to_string());

        let file = storage
            .put("permits/2026/03/r1/permit.json", b"{}", "application/json")
            .await
            .unwrap();

        assert_eq!(file.url, "https://files.example/permits/2026/03/r1/permit.json");
        assert_eq!(file.size, 2);
        assert_eq!(file.checksum, "99914b932bd37a50b983c5e7c90ae93b");
        assert!(storage.exists(&file.key).await.unwrap());
        assert!(!base.join("permits/2026/03/r1/permit.partial").exists());

        storage.remove(&file.key).await.unwrap();
        assert!(!storage.exists(&file.key).await.unwrap());
        storage.remove(&file.key).await.unwrap();

        let _ = tokio::fs::remove_dir_all(base).await;
    }

    #[tokio::test]
    async fn test_local_storage_rejects_escaping_keys() {
        let storage = LocalStorage::new(scratch_dir(), "/files".to_string());

        for key in ["", "../outside.json", "/etc/passwd", "permits/../../x"] {
            let result = storage.put(key, b"{}", "application/json").await;
            assert!(matches!(result, Err(AppError::BadRequest(_))), "accepted {key:?}");
        }
    }
}
