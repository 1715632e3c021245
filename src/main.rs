use std::path::Path;
use std::sync::Arc;

use blobdrop::uploader::queue::CandidateFile;
use blobdrop::{config, LogRenderer, UploadManager};

/// Content type from the file extension, the only signal available for local
/// files. Unknown extensions fall through to octet-stream and get rejected by
/// the allow-set.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting blobdrop");

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("Usage: blobdrop [--reset-config] <image files...>");
        std::process::exit(2);
    }

    if paths[0] == "--reset-config" {
        config::reset_config()?;
        println!("Configuration reset to defaults");
        return Ok(());
    }

    let config = config::load_config()?;
    let manager = UploadManager::new(config, Arc::new(LogRenderer));

    let mut candidates = Vec::new();
    for path in &paths {
        let path = Path::new(path);
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                log::error!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        candidates.push(CandidateFile::new(name, guess_content_type(path), data));
    }

    let outcome = manager.add_files(candidates)?;
    for (name, reason) in &outcome.rejected {
        log::warn!("{}: {}", name, reason);
    }

    if outcome.admitted.is_empty() {
        anyhow::bail!("No files admitted to the upload queue");
    }

    let has_pending = manager.upload_all().await?;

    let stats = manager.stats();
    println!(
        "{} of {} file(s) uploaded ({} bytes queued, {}% success)",
        stats.succeeded_count, stats.total_files, stats.total_bytes, stats.success_rate_percent
    );

    if has_pending {
        log::warn!("Some files did not upload; re-run to retry them");
        std::process::exit(1);
    }

    Ok(())
}
