use chrono::Utc;
use regex::Regex;

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};

/// Placeholder values shipped in example configs; never valid for upload.
const PLACEHOLDER_ACCOUNT: &str = "yourstorageaccount";
const PLACEHOLDER_SAS_TOKEN: &str = "YOUR_SAS_TOKEN_HERE";

/// A one-time write target in the blob store.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub blob_name: String,
    pub url: String,
}

/// Builds pre-signed PUT targets under a storage account/container namespace.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    storage_account: String,
    container_name: String,
    sas_token: String,
}

impl EndpointResolver {
    pub fn from_config(config: &UploaderConfig) -> Self {
        Self {
            storage_account: config.storage_account.trim().to_string(),
            container_name: config.container_name.trim().to_string(),
            // Tolerate a token pasted with its leading '?'
            sas_token: config
                .sas_token
                .trim()
                .trim_start_matches('?')
                .to_string(),
        }
    }

    /// Check credentials before any upload is attempted. A failure here blocks
    /// the whole upload action; queued records stay untouched.
    pub fn validate_credentials(&self) -> AppResult<()> {
        if self.storage_account.is_empty() || self.storage_account == PLACEHOLDER_ACCOUNT {
            return Err(AppError::config(
                "Storage account is not configured",
            ));
        }

        // Azure account names: 3-24 lowercase alphanumerics
        let account_pattern = Regex::new(r"^[a-z0-9]{3,24}$").unwrap();
        if !account_pattern.is_match(&self.storage_account) {
            return Err(AppError::config(format!(
                "Invalid storage account name: {}",
                self.storage_account
            )));
        }

        // Container names: 3-63 chars, lowercase alphanumerics and single dashes
        let container_pattern = Regex::new(r"^[a-z0-9](-?[a-z0-9]){2,62}$").unwrap();
        if !container_pattern.is_match(&self.container_name) {
            return Err(AppError::config(format!(
                "Invalid container name: {}",
                self.container_name
            )));
        }

        if self.sas_token.is_empty() || self.sas_token == PLACEHOLDER_SAS_TOKEN {
            return Err(AppError::config("SAS token is not configured"));
        }

        Ok(())
    }

    /// Replace every character outside [A-Za-z0-9.-] so the name is safe as a
    /// blob path segment.
    pub fn sanitize_file_name(file_name: &str) -> String {
        let unsafe_chars = Regex::new(r"[^A-Za-z0-9.-]").unwrap();
        unsafe_chars.replace_all(file_name.trim(), "_").to_string()
    }

    /// Produce a write target unique across invocations. Epoch millis plus a
    /// random component: concurrent uploads in the same millisecond must not
    /// collide in the remote store.
    pub fn resolve(&self, file_name: &str) -> UploadTarget {
        let disambiguator = uuid::Uuid::new_v4().simple().to_string();
        let blob_name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            &disambiguator[..8],
            Self::sanitize_file_name(file_name)
        );

        let url = format!(
            "https://{}.blob.core.windows.net/{}/{}?{}",
            self.storage_account, self.container_name, blob_name, self.sas_token
        );

        log::debug!("Resolved {} to blob {}", file_name, blob_name);

        UploadTarget { blob_name, url }
    }
}
