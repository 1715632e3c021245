use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::uploader::queue::{UploadQueue, UploadRecord};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Queue full: maximum {limit} files allowed")]
    QueueFull { limit: usize },

    #[error("Upload failed: {reason}")]
    UploadFailed { reason: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn upload_failed(reason: impl Into<String>) -> Self {
        Self::UploadFailed {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::UploadFailed { .. } | AppError::Io(_)
        )
    }
}

/// Shared queue state type
pub type QueueState = Arc<Mutex<UploadQueue>>;

/// Safe per-record update. Silently no-ops when the record no longer exists
/// (removed mid-flight) so late transport callbacks cannot resurrect state.
pub fn safe_record_update<F>(queue: &QueueState, file_name: &str, operation: &str, f: F) -> bool
where
    F: FnOnce(&mut UploadRecord),
{
    match queue.lock() {
        Ok(mut queue) => {
            if let Some(record) = queue.record_mut(file_name) {
                f(record);
                true
            } else {
                log::debug!(
                    "Record for {} not found during {} (likely removed mid-flight)",
                    file_name,
                    operation
                );
                false
            }
        }
        Err(e) => {
            log::error!(
                "Failed to acquire queue lock for {} on {} (non-critical): {}",
                operation,
                file_name,
                e
            );
            false
        }
    }
}

pub fn safe_queue_read<F, R>(queue: &QueueState, operation: &str, f: F) -> Option<R>
where
    F: FnOnce(&UploadQueue) -> R,
{
    match queue.lock() {
        Ok(queue) => Some(f(&queue)),
        Err(e) => {
            log::error!(
                "Failed to acquire queue lock for {} (non-critical): {}",
                operation,
                e
            );
            None
        }
    }
}
