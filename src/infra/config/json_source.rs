use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::config::{ConfigError, ConfigSource, RawConfig};

/// Moderation settings read from a JSON file using the admin-console field
/// names (`BadWordsList`, `BlockNewUserPMTime`, ...).
pub struct JsonConfigSource {
    path: PathBuf,
}

impl JsonConfigSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ConfigSource for JsonConfigSource {
    async fn load(&self) -> Result<RawConfig, ConfigError> {
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "Config file missing, every filter is off");
            return Ok(RawConfig::default());
        }

        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", self.path.display(), e)))?;

        let config: RawConfig = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Load(format!("{}: {}", self.path.display(), e)))?;
        Ok(config)
    }
}
