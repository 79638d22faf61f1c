//! Delivery of finished recordings.
//!
//! The session hands one [`FinishedRecording`] to a [`RecordingSink`] per
//! completed stop. The file sink is what the service and CLI use.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::media::CaptureMode;
use crate::recorder::mime::container_extension;

/// Concatenated output tagged with its negotiated MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Blob {
    pub fn from_chunks(chunks: Vec<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: chunks.concat(),
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FinishedRecording {
    pub mode: CaptureMode,
    pub blob: Blob,
    pub suggested_name: String,
}

impl FinishedRecording {
    /// Suggested name plus the container's extension.
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}",
            self.suggested_name,
            container_extension(&self.blob.mime_type)
        )
    }
}

/// `interview_<mode>_<unixEpochMillis>`
pub fn suggested_name(mode: CaptureMode, epoch_millis: i64) -> String {
    format!("interview_{}_{}", mode.as_str(), epoch_millis)
}

#[async_trait]
pub trait RecordingSink: Send + Sync {
    async fn deliver(&self, recording: &FinishedRecording) -> Result<()>;
}

/// Attempts per recording before giving up: the plain name, then `-1` to `-99`.
const NAME_ATTEMPTS: usize = 100;

/// Writes recordings into a directory. An existing file is never replaced.
pub struct FileRecordingSink {
    directory: PathBuf,
}

impl FileRecordingSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn candidate_path(&self, recording: &FinishedRecording, attempt: usize) -> PathBuf {
        if attempt == 0 {
            return self.directory.join(recording.file_name());
        }
        let ext = container_extension(&recording.blob.mime_type);
        self.directory
            .join(format!("{}-{}.{}", recording.suggested_name, attempt, ext))
    }

    /// Claim the first free name. The file is created atomically, so a name
    /// taken in the meantime is skipped rather than truncated.
    async fn create_unique(&self, recording: &FinishedRecording) -> Result<(PathBuf, File)> {
        for attempt in 0..NAME_ATTEMPTS {
            let path = self.candidate_path(recording, attempt);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {:?}", path));
                }
            }
        }
        bail!(
            "No free file name for {} in {:?} after {} attempts",
            recording.suggested_name,
            self.directory,
            NAME_ATTEMPTS
        )
    }
}

#[async_trait]
impl RecordingSink for FileRecordingSink {
    async fn deliver(&self, recording: &FinishedRecording) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", self.directory))?;

        let (path, mut file) = self.create_unique(recording).await?;
        file.write_all(&recording.blob.bytes)
            .await
            .with_context(|| format!("Failed to write recording to {:?}", path))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to flush {:?}", path))?;

        info!(
            "Recording saved: {:?} ({} bytes, {})",
            path,
            recording.blob.len(),
            recording.blob.mime_type
        );
        Ok(())
    }
}
