//! Transient upload files

use std::path::{Path, PathBuf};

use super::validation::secure_filename;

/// Upload written to disk for the duration of one request.
///
/// The file is removed when the guard drops, whatever the outcome.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `data` to `{dir}/{uuid}_{secure name}`.
    ///
    /// A partially written file is removed when the write fails.
    pub async fn write(dir: &Path, filename: &str, data: &[u8]) -> std::io::Result<Self> {
        let name = format!("{}_{}", uuid::Uuid::new_v4(), secure_filename(filename));
        let upload = Self {
            path: dir.join(name),
        };
        tokio::fs::write(&upload.path, data).await?;
        tracing::debug!(path = %upload.path.display(), bytes = data.len(), "Stored upload");
        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Upload was never stored")
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to remove upload: {}", e)
            }
        }
    }
}
