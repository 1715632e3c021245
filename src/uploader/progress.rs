use crate::errors::{safe_record_update, QueueState};

use super::queue::UploadStatus;

/// Move a record into the uploading state at progress 0. Only pending and
/// failed records transition; anything else (including a record that was
/// removed and re-admitted under the same name) is left alone.
pub fn mark_uploading(queue: &QueueState, file_name: &str) -> bool {
    let mut transitioned = false;
    safe_record_update(queue, file_name, "mark uploading", |record| {
        if record.status.is_pending_work() {
            record.status = UploadStatus::Uploading { progress: 0 };
            transitioned = true;
            log::debug!("Progress: {} entering upload", file_name);
        } else {
            log::debug!(
                "Skipping upload start for {}: status is {}",
                file_name,
                record.status.label()
            );
        }
    });
    transitioned
}

/// Apply an in-flight progress event. No-ops unless the record still exists
/// and is still uploading, and only ever moves forward; a late event racing a
/// status change must not wind progress back. Returns whether the record
/// actually changed, so callers can re-render only on movement.
pub fn update_progress(queue: &QueueState, file_name: &str, percent: u8) -> bool {
    let mut changed = false;
    safe_record_update(queue, file_name, "progress update", |record| {
        if let UploadStatus::Uploading { progress } = &mut record.status {
            if percent > *progress {
                *progress = percent.min(100);
                changed = true;
                log::debug!("Progress: {} at {}%", file_name, percent.min(100));
            }
        }
    });
    changed
}

/// Settle an in-flight upload as succeeded.
pub fn mark_success(queue: &QueueState, file_name: &str) {
    safe_record_update(queue, file_name, "success update", |record| {
        if matches!(record.status, UploadStatus::Uploading { .. }) {
            record.status = UploadStatus::Success;
            log::info!("Progress: Successfully uploaded {}", file_name);
        }
    });
}

/// Settle an in-flight upload as failed, recording the reason.
pub fn mark_error(queue: &QueueState, file_name: &str, reason: String) {
    safe_record_update(queue, file_name, "failure update", |record| {
        if matches!(record.status, UploadStatus::Uploading { .. }) {
            log::warn!("Progress: Failed to upload {} - {}", file_name, reason);
            record.status = UploadStatus::Error { reason };
        }
    });
}
