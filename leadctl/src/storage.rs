//! Local disk storage for multipart uploads.
//!
//! Files land in `{root}/<area>/<uuid>-<sanitized name>`; the path relative to
//! `root` is what gets persisted on the owning row (e.g. `tickets.document_path`).

use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::{config::UploadsConfig, errors::Error};

/// Upload areas, one directory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadArea {
    Tasks,
    TaskSubmissions,
    Tickets,
    Applications,
}

impl UploadArea {
    pub fn dir(self) -> &'static str {
        match self {
            UploadArea::Tasks => "tasks",
            UploadArea::TaskSubmissions => "task-submissions",
            UploadArea::Tickets => "tickets",
            UploadArea::Applications => "applications",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the upload root, with forward slashes
    pub relative_path: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_file_size: u64,
}

/// Keep the final path component and replace anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "file".to_string() } else { cleaned.chars().take(100).collect() }
}

impl UploadStore {
    pub fn new(config: &UploadsConfig) -> Self {
        Self {
            root: config.root.clone(),
            max_file_size: config.max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn resolve(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Stream `body` to disk, enforcing the size limit as chunks arrive.
    ///
    /// A partially written file is removed before an error is returned.
    #[instrument(skip(self, body), fields(area = area.dir()), err)]
    pub async fn save<S, B, E>(&self, area: UploadArea, file_name: &str, body: S) -> Result<StoredFile, Error>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let relative_path = format!("{}/{}-{}", area.dir(), Uuid::new_v4(), sanitize_filename(file_name));
        let full_path = self.resolve(&relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Error::Internal {
                operation: format!("create upload dir: {e}"),
            })?;
        }

        let result = self.write_limited(&full_path, body).await;
        match result {
            Ok(size_bytes) => {
                debug!(path = %relative_path, size_bytes, "Stored upload");
                Ok(StoredFile { relative_path, size_bytes })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&full_path).await {
                    warn!(path = %full_path.display(), error = %cleanup, "Failed to remove partial upload");
                }
                Err(e)
            }
        }
    }

    async fn write_limited<S, B, E>(&self, path: &Path, body: S) -> Result<u64, Error>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        let mut file = fs::File::create(path).await.map_err(|e| Error::Internal {
            operation: format!("create upload file: {e}"),
        })?;
        let mut written: u64 = 0;
        let mut body = std::pin::pin!(body);

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::BadRequest {
                message: format!("Failed to read upload: {e}"),
            })?;
            let bytes = chunk.as_ref();
            written += bytes.len() as u64;
            if written > self.max_file_size {
                return Err(Error::PayloadTooLarge {
                    limit_bytes: self.max_file_size,
                });
            }
            file.write_all(bytes).await.map_err(|e| Error::Internal {
                operation: format!("write upload: {e}"),
            })?;
        }

        file.sync_all().await.map_err(|e| Error::Internal {
            operation: format!("flush upload: {e}"),
        })?;
        Ok(written)
    }

    pub async fn remove(&self, relative_path: &str) -> std::io::Result<()> {
        fs::remove_file(self.resolve(relative_path)).await
    }

    /// Unlink a stored file without waiting; failures are only logged.
    pub fn remove_in_background(&self, relative_path: String) {
        let store = self.clone();
        tokio::spawn(async move {
            match store.remove(&relative_path).await {
                Ok(()) => debug!(path = %relative_path, "Removed upload"),
                Err(e) => warn!(path = %relative_path, error = %e, "Failed to remove upload"),
            }
        });
    }

    pub fn remove_all_in_background(&self, relative_paths: impl IntoIterator<Item = String>) {
        for path in relative_paths {
            self.remove_in_background(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn store(root: &Path, max_file_size: u64) -> UploadStore {
        UploadStore::new(&UploadsConfig {
            root: root.to_path_buf(),
            max_file_size,
        })
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<&'static [u8], std::io::Error>> {
        stream::iter(parts.iter().copied().map(Ok).collect::<Vec<_>>())
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report final.pdf"), "report_final.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.docx"), "cv.docx");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 1024);

        let stored = store
            .save(UploadArea::Tickets, "log.txt", chunks(&[b"hello ".as_slice(), b"world".as_slice()]))
            .await
            .unwrap();
        assert!(stored.relative_path.starts_with("tickets/"));
        assert!(stored.relative_path.ends_with("-log.txt"));
        assert_eq!(stored.size_bytes, 11);

        let content = tokio::fs::read(store.resolve(&stored.relative_path)).await.unwrap();
        assert_eq!(content, b"hello world");

        store.remove(&stored.relative_path).await.unwrap();
        assert!(!store.resolve(&stored.relative_path).exists());
        assert!(store.remove(&stored.relative_path).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), 8);

        let err = store
            .save(UploadArea::Applications, "cv.pdf", chunks(&[b"12345".as_slice(), b"67890".as_slice()]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { limit_bytes: 8 }));

        let mut entries = tokio::fs::read_dir(dir.path().join("applications")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
