use std::sync::{Arc, Mutex};

use crate::config::UploaderConfig;
use crate::errors::{safe_queue_read, AppError, AppResult, QueueState};
use crate::render::Renderer;

use super::batch;
use super::blob_client::{BlobClient, BlobTransport};
use super::endpoint::EndpointResolver;
use super::queue::{AdmitOutcome, CandidateFile, QueueStats, UploadQueue};

/// The upload widget core: one explicitly constructed instance owning the
/// queue, policy, endpoint resolver, transport and renderer.
pub struct UploadManager {
    config: UploaderConfig,
    queue: QueueState,
    transport: Arc<dyn BlobTransport>,
    resolver: EndpointResolver,
    renderer: Arc<dyn Renderer>,
}

impl UploadManager {
    pub fn new(config: UploaderConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self::with_transport(config, Arc::new(BlobClient::new()), renderer)
    }

    /// Construct with a custom transport (tests, alternative stores).
    pub fn with_transport(
        config: UploaderConfig,
        transport: Arc<dyn BlobTransport>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let resolver = EndpointResolver::from_config(&config);
        Self {
            config,
            queue: Arc::new(Mutex::new(UploadQueue::new())),
            transport,
            resolver,
            renderer,
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Shared handle to the queue state, for callers that integrate the queue
    /// into their own rendering loop.
    pub fn queue(&self) -> QueueState {
        Arc::clone(&self.queue)
    }

    /// Validate and admit candidate files; renders the new state afterwards.
    pub fn add_files(&self, candidates: Vec<CandidateFile>) -> AppResult<AdmitOutcome> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|e| AppError::Internal(format!("queue lock poisoned: {}", e)))?;

        let outcome = queue.admit(candidates, &self.config)?;

        self.renderer.render(&queue);
        self.renderer.render_stats(&queue.stats());
        Ok(outcome)
    }

    /// Remove a single file. Confirmation prompts belong to the caller; this
    /// deletes unconditionally. Returns false if the file was not queued.
    pub fn remove_file(&self, file_name: &str) -> bool {
        match self.queue.lock() {
            Ok(mut queue) => {
                let removed = queue.remove(file_name);
                if removed {
                    self.renderer.render(&queue);
                    self.renderer.render_stats(&queue.stats());
                }
                removed
            }
            Err(e) => {
                log::error!("Failed to acquire queue lock for remove: {}", e);
                false
            }
        }
    }

    /// Drop every queued file.
    pub fn clear(&self) {
        match self.queue.lock() {
            Ok(mut queue) => {
                queue.clear();
                self.renderer.render(&queue);
                self.renderer.render_stats(&queue.stats());
            }
            Err(e) => {
                log::error!("Failed to acquire queue lock for clear: {}", e);
            }
        }
    }

    /// Attach a caller-generated preview handle to a queued file.
    pub fn set_preview(&self, file_name: &str, handle: impl Into<String>) -> bool {
        match self.queue.lock() {
            Ok(mut queue) => {
                let updated = queue.set_preview(file_name, handle);
                if updated {
                    self.renderer.render(&queue);
                }
                updated
            }
            Err(e) => {
                log::error!("Failed to acquire queue lock for preview: {}", e);
                false
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        safe_queue_read(&self.queue, "stats", |queue| queue.stats()).unwrap_or(QueueStats {
            total_files: 0,
            total_bytes: 0,
            succeeded_count: 0,
            success_rate_percent: 0,
        })
    }

    pub fn has_pending_work(&self) -> bool {
        safe_queue_read(&self.queue, "pending check", |queue| queue.has_pending_work())
            .unwrap_or(false)
    }

    /// Run a full upload pass over everything not yet succeeded. Returns
    /// whether pending or failed files remain afterwards.
    pub async fn upload_all(&self) -> AppResult<bool> {
        batch::upload_all(
            &self.queue,
            self.transport.as_ref(),
            &self.resolver,
            &self.renderer,
            self.config.concurrency_limit,
        )
        .await
    }
}
