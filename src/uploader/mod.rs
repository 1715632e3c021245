// Main uploader module - orchestrates all upload functionality
//
// This module is responsible for validating queued images and pushing them
// to blob storage in bounded concurrent batches

pub mod batch;
pub mod blob_client;
pub mod endpoint;
pub mod manager;
pub mod progress;
pub mod queue;

pub use batch::{upload_all, upload_one};
pub use manager::UploadManager;
