use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

/// Upload policy and storage target. Loaded from the platform config dir;
/// the SAS token is supplied externally and only passed through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default)]
    pub storage_account: String,
    #[serde(default = "default_container_name")]
    pub container_name: String,
    #[serde(default)]
    pub sas_token: String,
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

fn default_max_files() -> usize {
    10
}

fn default_concurrency_limit() -> usize {
    3
}

fn default_container_name() -> String {
    "raw-images".to_string()
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
            max_files: default_max_files(),
            concurrency_limit: default_concurrency_limit(),
            storage_account: String::new(),
            container_name: default_container_name(),
            sas_token: String::new(),
        }
    }
}

impl UploaderConfig {
    pub fn allows_type(&self, content_type: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
    }
}

fn get_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join("blobdrop");

    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("config.json"))
}

pub fn load_config() -> AppResult<UploaderConfig> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        let config_str = fs::read_to_string(&config_path)?;
        let config: UploaderConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
            log::warn!("Failed to parse config file: {}. Using defaults.", e);
            UploaderConfig::default()
        });

        validate_config(&config)?;

        Ok(config)
    } else {
        let default_config = UploaderConfig::default();
        save_config_internal(&default_config)?;
        Ok(default_config)
    }
}

fn save_config_internal(config: &UploaderConfig) -> AppResult<()> {
    let config_path = get_config_path()?;

    // Create backup of existing config
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.bak");
        if let Err(e) = fs::copy(&config_path, &backup_path) {
            log::warn!("Failed to create config backup: {}", e);
        }
    }

    let config_str = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_str)?;

    log::info!("Configuration saved successfully");
    Ok(())
}

pub fn validate_config(config: &UploaderConfig) -> AppResult<()> {
    if config.max_files == 0 {
        return Err(AppError::validation("max_files", "Must be at least 1"));
    }

    if config.max_file_size == 0 {
        return Err(AppError::validation(
            "max_file_size",
            "Must be greater than 0",
        ));
    }

    if config.concurrency_limit == 0 || config.concurrency_limit > 16 {
        return Err(AppError::validation(
            "concurrency_limit",
            "Must be between 1 and 16",
        ));
    }

    if config.allowed_types.is_empty() {
        return Err(AppError::validation(
            "allowed_types",
            "At least one MIME type is required",
        ));
    }

    for mime in &config.allowed_types {
        if !mime.contains('/') {
            return Err(AppError::validation(
                "allowed_types",
                &format!("'{}' is not a valid MIME type", mime),
            ));
        }
    }

    Ok(())
}

// Reset configuration to defaults
pub fn reset_config() -> AppResult<()> {
    let config_path = get_config_path()?;

    // Backup existing config
    if config_path.exists() {
        let backup_path = config_path.with_extension("json.reset_backup");
        fs::copy(&config_path, &backup_path)?;
        log::info!("Existing config backed up to {}", backup_path.display());
    }

    let default_config = UploaderConfig::default();
    save_config_internal(&default_config)?;

    log::info!("Configuration reset to defaults");
    Ok(())
}
