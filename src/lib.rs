pub mod config;
pub mod errors;
pub mod render;
pub mod uploader;

pub use config::UploaderConfig;
pub use errors::{AppError, AppResult, QueueState};
pub use render::{LogRenderer, NullRenderer, Renderer};
pub use uploader::manager::UploadManager;
pub use uploader::queue::{CandidateFile, QueueStats, UploadQueue, UploadStatus};
