use std::collections::HashMap;
use std::fmt;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};

/// A file offered for admission. Size is always the actual payload length.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// An admitted file. Immutable once queued; the payload is opaque to the core.
#[derive(Debug, Clone)]
pub struct QueuedFile {
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl From<CandidateFile> for QueuedFile {
    fn from(candidate: CandidateFile) -> Self {
        let size = candidate.size();
        Self {
            name: candidate.name,
            size,
            content_type: candidate.content_type,
            data: candidate.data,
        }
    }
}

/// Upload lifecycle. Progress only exists while uploading, so a progress value
/// on a settled record is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Pending,
    Uploading { progress: u8 },
    Success,
    Error { reason: String },
}

impl UploadStatus {
    /// Pending and failed records both count as work for the next upload pass.
    pub fn is_pending_work(&self) -> bool {
        matches!(self, UploadStatus::Pending | UploadStatus::Error { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadStatus::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading { .. } => "uploading",
            UploadStatus::Success => "success",
            UploadStatus::Error { .. } => "error",
        }
    }
}

/// Per-file bookkeeping. The preview handle is set by the caller and never
/// interpreted here.
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub status: UploadStatus,
    pub preview: Option<String>,
}

impl UploadRecord {
    pub fn new() -> Self {
        Self {
            status: UploadStatus::Pending,
            preview: None,
        }
    }

    /// Display progress: 100 once succeeded, live value while uploading, else 0.
    pub fn progress(&self) -> u8 {
        match &self.status {
            UploadStatus::Uploading { progress } => *progress,
            UploadStatus::Success => 100,
            _ => 0,
        }
    }
}

impl Default for UploadRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidType { content_type: String },
    TooLarge { size: u64, limit: u64 },
    Duplicate,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidType { content_type } => {
                write!(f, "invalid file type: {}", content_type)
            }
            RejectReason::TooLarge { size, limit } => {
                write!(f, "file too large: {} bytes (limit {})", size, limit)
            }
            RejectReason::Duplicate => write!(f, "file already added"),
        }
    }
}

/// Result of an admission pass.
#[derive(Debug, Default)]
pub struct AdmitOutcome {
    pub admitted: Vec<String>,
    pub rejected: Vec<(String, RejectReason)>,
}

/// Aggregate view over the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub total_files: usize,
    pub total_bytes: u64,
    pub succeeded_count: usize,
    pub success_rate_percent: u8,
}

/// The upload queue: file payloads and their records, kept in lock-step and
/// keyed by file name, plus the admission order for stable iteration.
#[derive(Debug, Default)]
pub struct UploadQueue {
    files: HashMap<String, QueuedFile>,
    records: HashMap<String, UploadRecord>,
    order: Vec<String>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Validate candidates against the configured policy and admit the ones
    /// that pass, preserving input order.
    ///
    /// The count check runs first and covers the whole batch: if admitting all
    /// candidates would exceed `max_files`, nothing is admitted and the batch
    /// is rejected as one `QueueFull` error.
    pub fn admit(
        &mut self,
        candidates: Vec<CandidateFile>,
        config: &UploaderConfig,
    ) -> AppResult<AdmitOutcome> {
        if self.len() + candidates.len() > config.max_files {
            log::warn!(
                "Rejecting batch of {}: queue holds {} of {} allowed files",
                candidates.len(),
                self.len(),
                config.max_files
            );
            return Err(AppError::QueueFull {
                limit: config.max_files,
            });
        }

        let mut outcome = AdmitOutcome::default();

        for candidate in candidates {
            if !config.allows_type(&candidate.content_type) {
                log::warn!(
                    "Rejecting {}: content type {} not allowed",
                    candidate.name,
                    candidate.content_type
                );
                outcome.rejected.push((
                    candidate.name,
                    RejectReason::InvalidType {
                        content_type: candidate.content_type,
                    },
                ));
                continue;
            }

            let size = candidate.size();
            if size > config.max_file_size {
                log::warn!(
                    "Rejecting {}: {} bytes exceeds limit of {}",
                    candidate.name,
                    size,
                    config.max_file_size
                );
                outcome.rejected.push((
                    candidate.name,
                    RejectReason::TooLarge {
                        size,
                        limit: config.max_file_size,
                    },
                ));
                continue;
            }

            // Also catches a name repeated within the same batch.
            if self.files.contains_key(&candidate.name) {
                log::warn!("Rejecting {}: already queued", candidate.name);
                outcome
                    .rejected
                    .push((candidate.name, RejectReason::Duplicate));
                continue;
            }

            let name = candidate.name.clone();
            self.files.insert(name.clone(), candidate.into());
            self.records.insert(name.clone(), UploadRecord::new());
            self.order.push(name.clone());

            log::info!("Admitted {} to upload queue", name);
            outcome.admitted.push(name);
        }

        Ok(outcome)
    }

    /// Remove a file and its record together. Returns false if absent.
    /// Any in-flight upload for the file is left to finish; its completion
    /// callback will find no record and no-op.
    pub fn remove(&mut self, file_name: &str) -> bool {
        if self.files.remove(file_name).is_none() {
            return false;
        }
        self.records.remove(file_name);
        self.order.retain(|name| name != file_name);
        log::info!("Removed {} from upload queue", file_name);
        true
    }

    /// Drop everything at once.
    pub fn clear(&mut self) {
        let count = self.len();
        self.files.clear();
        self.records.clear();
        self.order.clear();
        if count > 0 {
            log::info!("Cleared {} files from upload queue", count);
        }
    }

    pub fn file(&self, file_name: &str) -> Option<&QueuedFile> {
        self.files.get(file_name)
    }

    pub fn record(&self, file_name: &str) -> Option<&UploadRecord> {
        self.records.get(file_name)
    }

    pub fn record_mut(&mut self, file_name: &str) -> Option<&mut UploadRecord> {
        self.records.get_mut(file_name)
    }

    /// File names in admission order.
    pub fn file_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Files due for the next upload pass: everything not yet succeeded, in
    /// admission order. Failed files are retried implicitly.
    pub fn eligible_files(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| {
                self.records
                    .get(*name)
                    .map(|record| !record.status.is_success())
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Whether an upload action is currently worthwhile.
    pub fn has_pending_work(&self) -> bool {
        self.records
            .values()
            .any(|record| record.status.is_pending_work())
    }

    /// Attach an opaque preview handle to an existing record.
    pub fn set_preview(&mut self, file_name: &str, handle: impl Into<String>) -> bool {
        match self.records.get_mut(file_name) {
            Some(record) => {
                record.preview = Some(handle.into());
                true
            }
            None => false,
        }
    }

    /// Read-only aggregation over current state.
    pub fn stats(&self) -> QueueStats {
        let total_files = self.files.len();
        let total_bytes = self.files.values().map(|file| file.size).sum();
        let succeeded_count = self
            .records
            .values()
            .filter(|record| record.status.is_success())
            .count();
        let success_rate_percent = if self.records.is_empty() {
            0
        } else {
            ((succeeded_count as f64 / self.records.len() as f64) * 100.0).round() as u8
        };

        QueueStats {
            total_files,
            total_bytes,
            succeeded_count,
            success_rate_percent,
        }
    }
}
