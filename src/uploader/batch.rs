use futures::future::join_all;
use std::sync::Arc;

use crate::errors::{safe_queue_read, AppResult, QueueState};
use crate::render::Renderer;

use super::blob_client::{BlobTransport, ProgressFn};
use super::endpoint::EndpointResolver;
use super::progress;

/// Upload a single queued file, settling its record either way. Never returns
/// an error: transport failures land in the record, and every path ends with
/// a statistics refresh.
pub async fn upload_one(
    queue: &QueueState,
    file_name: &str,
    transport: &dyn BlobTransport,
    resolver: &EndpointResolver,
    renderer: &Arc<dyn Renderer>,
) {
    if !progress::mark_uploading(queue, file_name) {
        // Removed or settled between selection and start.
        refresh_stats(queue, renderer);
        return;
    }
    render_queue(queue, renderer);

    let payload = safe_queue_read(queue, "payload read", |q| {
        q.file(file_name)
            .map(|file| (file.data.clone(), file.content_type.clone()))
    })
    .flatten();

    let Some((body, content_type)) = payload else {
        log::warn!("Payload for {} vanished before upload", file_name);
        progress::mark_error(queue, file_name, "File removed before upload".to_string());
        refresh_stats(queue, renderer);
        return;
    };

    let target = resolver.resolve(file_name);

    let progress_queue = Arc::clone(queue);
    let progress_name = file_name.to_string();
    let progress_renderer = Arc::clone(renderer);
    let on_progress: ProgressFn = Arc::new(move |percent| {
        if progress::update_progress(&progress_queue, &progress_name, percent) {
            render_queue(&progress_queue, &progress_renderer);
        }
    });

    match transport.put(&target, body, &content_type, on_progress).await {
        Ok(outcome) if outcome.is_success() => {
            progress::mark_success(queue, file_name);
        }
        Ok(outcome) => {
            let reason = match outcome.message {
                Some(message) => format!(
                    "Upload failed with status {}: {}",
                    outcome.status,
                    message.lines().next().unwrap_or("")
                ),
                None => format!("Upload failed with status {}", outcome.status),
            };
            progress::mark_error(queue, file_name, reason);
        }
        Err(e) => {
            log::error!(
                "Transport failure for {}{}: {}",
                file_name,
                if e.is_retryable() { " (retryable)" } else { "" },
                e
            );
            progress::mark_error(queue, file_name, e.to_string());
        }
    }

    render_queue(queue, renderer);
    refresh_stats(queue, renderer);
}

/// Upload every queued file that has not yet succeeded, in admission order.
///
/// Files are partitioned into consecutive groups of at most `concurrency_limit`.
/// Groups run strictly in sequence; within a group every upload runs
/// concurrently and the whole group settles before the next starts. One file's
/// failure never aborts its siblings or later groups.
///
/// Returns whether pending or failed files remain, i.e. whether another
/// upload action should be offered.
pub async fn upload_all(
    queue: &QueueState,
    transport: &dyn BlobTransport,
    resolver: &EndpointResolver,
    renderer: &Arc<dyn Renderer>,
    concurrency_limit: usize,
) -> AppResult<bool> {
    // Credential problems block the whole pass with records untouched.
    resolver.validate_credentials()?;

    let eligible =
        safe_queue_read(queue, "eligible selection", |q| q.eligible_files()).unwrap_or_default();

    if eligible.is_empty() {
        log::info!("No files to upload");
        return Ok(false);
    }

    let group_size = concurrency_limit.max(1);
    let total_groups = eligible.len().div_ceil(group_size);
    log::info!(
        "Uploading {} file(s) in {} group(s) of up to {}",
        eligible.len(),
        total_groups,
        group_size
    );

    for (group_index, group) in eligible.chunks(group_size).enumerate() {
        log::info!(
            "Processing group {} of {} ({} files)",
            group_index + 1,
            total_groups,
            group.len()
        );

        join_all(
            group
                .iter()
                .map(|name| upload_one(queue, name, transport, resolver, renderer)),
        )
        .await;
    }

    let has_pending =
        safe_queue_read(queue, "pending recompute", |q| q.has_pending_work()).unwrap_or(false);

    if has_pending {
        log::info!("Upload pass finished with files still pending or failed");
    } else {
        log::info!("All files processed");
    }

    Ok(has_pending)
}

fn render_queue(queue: &QueueState, renderer: &Arc<dyn Renderer>) {
    safe_queue_read(queue, "render", |q| renderer.render(q));
}

fn refresh_stats(queue: &QueueState, renderer: &Arc<dyn Renderer>) {
    if let Some(stats) = safe_queue_read(queue, "stats refresh", |q| q.stats()) {
        renderer.render_stats(&stats);
    }
}
