//! Append-only CSV log of failed sends.
//!
//! The file is truncated when opened, starts with the `email,unsubscribeId`
//! header and receives one line per failure. Every append is flushed before
//! returning so a crash later in the run cannot lose it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::recipients::Recipient;

/// Header row of the failure log.
pub const FAILURE_LOG_HEADER: &str = "email,unsubscribeId";

/// Errors raised by the failure log.
#[derive(Debug, Error)]
pub enum FailureLogError {
    #[error("failed to open failure log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write failure log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One failed attempt, kept for a later retry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub email: String,
    pub unsubscribe_id: String,
}

impl From<&Recipient> for FailureRecord {
    fn from(recipient: &Recipient) -> Self {
        Self {
            email: recipient.email.clone(),
            unsubscribe_id: recipient.unsubscribe_id.clone(),
        }
    }
}

/// Writer for the failure log.
#[derive(Debug)]
pub struct FailureSink {
    path: PathBuf,
    file: File,
    records: u64,
}

impl FailureSink {
    /// Create (or truncate) the log file.
    pub async fn open(path: &Path) -> Result<Self, FailureLogError> {
        let file = File::create(path)
            .await
            .map_err(|source| FailureLogError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), "failure_log_opened");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            records: 0,
        })
    }

    /// Open the log and write its header.
    pub async fn create(path: &Path) -> Result<Self, FailureLogError> {
        let mut sink = Self::open(path).await?;
        sink.write_header().await?;
        Ok(sink)
    }

    pub async fn write_header(&mut self) -> Result<(), FailureLogError> {
        self.write_line(FAILURE_LOG_HEADER).await
    }

    /// Append one record as its own line.
    pub async fn append(&mut self, record: &FailureRecord) -> Result<(), FailureLogError> {
        let line = format!("{},{}", record.email, record.unsubscribe_id);
        self.write_line(&line).await?;
        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    async fn write_line(&mut self, line: &str) -> Result<(), FailureLogError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let result = async {
            self.file.write_all(&bytes).await?;
            self.file.flush().await
        }
        .await;

        result.map_err(|source| FailureLogError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
