// Error taxonomy shared by the loader, the API client and the batch runner.
// Configuration and input errors stop the run before any job starts; the
// remaining kinds only fail the job that raised them.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input format error: {0}")]
    InputFormat(String),

    #[error("Video file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to upload chunk {index}: {reason}")]
    UploadChunk { index: u64, reason: String },

    /// `status` is `None` when the request never got a response.
    #[error("{}", api_message(.status, .message))]
    Api { status: Option<u16>, message: String },
}

fn api_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP Error: {} - {}", code, message),
        None => format!("Request failed: {}", message),
    }
}

impl SchedulerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn input_format(msg: impl Into<String>) -> Self {
        Self::InputFormat(msg.into())
    }

    pub fn upload_chunk(index: u64, reason: impl ToString) -> Self {
        Self::UploadChunk {
            index,
            reason: reason.to_string(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(err: impl ToString) -> Self {
        Self::Api {
            status: None,
            message: err.to_string(),
        }
    }

    /// Fatal errors abort the whole batch instead of a single job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InputFormat(_))
    }
}
