use crate::uploader::queue::{QueueStats, UploadQueue};

/// UI-facing collaborator. Called after every state-changing queue or upload
/// operation; the core never reads anything back from it.
pub trait Renderer: Send + Sync {
    fn render(&self, queue: &UploadQueue);
    fn render_stats(&self, stats: &QueueStats);
}

/// Renderer that mirrors queue state into the log.
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render(&self, queue: &UploadQueue) {
        for name in queue.file_names() {
            if let Some(record) = queue.record(&name) {
                log::debug!(
                    "  {} [{}] {}%",
                    name,
                    record.status.label(),
                    record.progress()
                );
            }
        }
    }

    fn render_stats(&self, stats: &QueueStats) {
        log::debug!(
            "Stats: {} files, {} bytes, {} uploaded ({}% success)",
            stats.total_files,
            stats.total_bytes,
            stats.succeeded_count,
            stats.success_rate_percent
        );
    }
}

/// Renderer that does nothing, for headless use.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, _queue: &UploadQueue) {}

    fn render_stats(&self, _stats: &QueueStats) {}
}
