//! Upload validation and persistence into the incoming area.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::FileServerError;

/// Distinguishes temp files of uploads started within the same clock tick.
static UPLOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// A file that was fully written to the incoming directory.
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub filename: String,
    pub size: u64,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadAcceptor {
    incoming_dir: PathBuf,
    max_size: u64,
    allowed_extensions: Arc<[String]>,
}

impl UploadAcceptor {
    pub fn new(
        incoming_dir: PathBuf,
        max_size: u64,
        allowed_extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            incoming_dir,
            max_size,
            allowed_extensions: allowed_extensions.into_iter().collect(),
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// `ext` carries its leading dot (`.png`), or is empty for none.
    /// An empty allow-list allows everything.
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        self.allowed_extensions.iter().any(|allowed| {
            let allowed = allowed.trim();
            let allowed = allowed.strip_prefix('.').unwrap_or(allowed);
            let ext = ext.strip_prefix('.').unwrap_or(ext);
            !ext.is_empty() && allowed.eq_ignore_ascii_case(ext)
        })
    }

    pub fn check_size(&self, size: u64) -> Result<(), FileServerError> {
        if size > self.max_size {
            return Err(FileServerError::TooLarge {
                size,
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Validate a declared file name and return the name it is stored under.
    ///
    /// Only the final path component is kept; the content of the name is
    /// otherwise untouched, so two uploads with the same name overwrite each
    /// other.
    pub fn check_name(&self, declared_name: &str) -> Result<String, FileServerError> {
        let file_name = Path::new(declared_name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                warn!("Rejected upload with invalid filename: {:?}", declared_name);
                FileServerError::InvalidPath(format!("Invalid filename: {}", declared_name))
            })?;

        let ext = Path::new(&file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        if !self.is_allowed_extension(&ext) {
            warn!("Rejected upload {:?}: extension not allowed", file_name);
            return Err(FileServerError::ExtensionNotAllowed(ext));
        }

        Ok(file_name)
    }

    /// Stream `data` into the incoming directory under `declared_name`.
    ///
    /// The data lands in a hidden temporary file first and is renamed into
    /// place once complete, so a rejected or failed upload leaves nothing
    /// behind. Exactly `max_size` bytes is accepted.
    pub async fn accept<S>(&self, declared_name: &str, data: S) -> Result<StoredFile, FileServerError>
    where
        S: Stream<Item = Result<Bytes, FileServerError>>,
    {
        let file_name = self.check_name(declared_name)?;

        fs::create_dir_all(&self.incoming_dir).await.map_err(|e| {
            error!("Failed to create incoming directory: {}", e);
            FileServerError::Storage(e)
        })?;

        let final_path = self.incoming_dir.join(&file_name);
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        // Independent of the file name so any name the filesystem accepts
        // also fits as a temp file.
        let seq = UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        let temp_path = self
            .incoming_dir
            .join(format!(".upload-{}-{}", nonce, seq));

        let result = self.write_stream(&temp_path, data).await;
        let size = match result {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            error!("Failed to move upload into place: {}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(FileServerError::Storage(e));
        }

        info!(filename = %file_name, size, "File uploaded successfully");

        Ok(StoredFile {
            filename: file_name,
            size,
            path: final_path,
        })
    }

    async fn write_stream<S>(&self, temp_path: &Path, data: S) -> Result<u64, FileServerError>
    where
        S: Stream<Item = Result<Bytes, FileServerError>>,
    {
        let mut data = std::pin::pin!(data);
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(FileServerError::Storage)?;

        let mut total_size = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            total_size = total_size.saturating_add(chunk.len() as u64);
            self.check_size(total_size)?;
            file.write_all(&chunk)
                .await
                .map_err(FileServerError::Storage)?;
        }
        file.flush().await.map_err(FileServerError::Storage)?;

        Ok(total_size)
    }
}
