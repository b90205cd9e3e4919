//! Social service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on a single storage access.
pub const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;

/// Configuration for the friend service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    /// Upper bound on each storage snapshot or commit, in milliseconds
    pub storage_timeout_ms: u64,

    /// Location of the file-backed store document
    pub data_path: PathBuf,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            storage_timeout_ms: DEFAULT_STORAGE_TIMEOUT_MS,
            data_path: PathBuf::from("data/social.json"),
        }
    }
}

impl SocialConfig {
    /// Storage timeout as a [`Duration`].
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }

    /// Override the storage timeout.
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        let config: SocialConfig = serde_json::from_str(r#"{"storage_timeout_ms": 250}"#).unwrap();

        assert_eq!(config.storage_timeout(), Duration::from_millis(250));
        assert_eq!(config.data_path, SocialConfig::default().data_path);
    }
}
