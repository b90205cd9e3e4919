//! CLI configuration file

use crate::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tablemate_social::{MemoryUserDirectory, SocialConfig, UserRef};

/// One `[[users]]` entry seeding the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Human-readable handle
    pub handle: String,
    /// Opaque user identifier
    pub id: String,
}

/// Contents of the TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Friend service settings
    pub social: SocialConfig,
    /// Known users
    pub users: Vec<UserEntry>,
}

impl CliConfig {
    /// Load configuration from `path`. A missing file yields defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(CliError::FileSystem(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    err
                )))
            }
        };
        Self::parse(&contents).map_err(|err| match err {
            CliError::Configuration(reason) => {
                CliError::Configuration(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: CliConfig = toml::from_str(contents)
            .map_err(|e| CliError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Directory seeded from the `[[users]]` entries.
    pub fn directory(&self) -> MemoryUserDirectory {
        MemoryUserDirectory::from_entries(
            self.users
                .iter()
                .map(|entry| (entry.handle.clone(), UserRef::new(entry.id.clone()))),
        )
    }

    fn validate(&self) -> Result<()> {
        let mut handles = std::collections::BTreeSet::new();
        let mut ids = std::collections::BTreeSet::new();
        for entry in &self.users {
            if entry.handle.is_empty() || entry.id.is_empty() {
                return Err(CliError::Configuration(
                    "user entries need a non-empty handle and id".to_string(),
                ));
            }
            if !handles.insert(entry.handle.as_str()) {
                return Err(CliError::Configuration(format!(
                    "duplicate handle '{}'",
                    entry.handle
                )));
            }
            if !ids.insert(entry.id.as_str()) {
                return Err(CliError::Configuration(format!(
                    "duplicate user id '{}'",
                    entry.id
                )));
            }
        }
        Ok(())
    }
}
