use super::config_models::{ConfigError, DisposableDomains, ModerationConfig, RawConfig};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Where configuration fields come from. Called whenever an administrator
/// changes the settings.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<RawConfig, ConfigError>;
}

/// Holder of the active configuration snapshot.
///
/// Readers clone the `Arc` under a read lock and work from that snapshot;
/// writers swap the whole snapshot under the write lock.
pub struct ConfigHandle {
    current: RwLock<Arc<ModerationConfig>>,
    builtin_domains: Arc<DisposableDomains>,
}

impl ConfigHandle {
    /// Start with an empty configuration (every filter off).
    pub fn new(builtin_domains: Arc<DisposableDomains>) -> Self {
        let initial = ModerationConfig {
            builtin_domains: Arc::clone(&builtin_domains),
            ..Default::default()
        };
        Self {
            current: RwLock::new(Arc::new(initial)),
            builtin_domains,
        }
    }

    /// The active snapshot.
    pub fn current(&self) -> Arc<ModerationConfig> {
        Arc::clone(&self.current.read())
    }

    /// Publish a new snapshot.
    ///
    /// # Panics
    /// When handed the snapshot that is already published. That means some
    /// caller kept a handle to the live config and expects to mutate it.
    pub fn replace(&self, next: Arc<ModerationConfig>) {
        let mut current = self.current.write();
        if Arc::ptr_eq(&current, &next) {
            panic!("ConfigHandle::replace called with the existing configuration");
        }
        *current = next;
    }

    /// Compile `raw` and publish it. On error the previous snapshot stays active.
    pub fn apply(&self, raw: RawConfig) -> Result<Arc<ModerationConfig>, ConfigError> {
        let compiled = Arc::new(ModerationConfig::compile(
            raw,
            Arc::clone(&self.builtin_domains),
        )?);
        self.replace(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Load from `source` and publish. On error the previous snapshot stays active.
    pub async fn reload<S: ConfigSource + ?Sized>(&self, source: &S) -> Result<(), ConfigError> {
        let raw = source.load().await.map_err(|e| {
            tracing::error!("Failed to load moderation configuration: {}", e);
            e
        })?;

        match self.apply(raw) {
            Ok(config) => {
                tracing::info!(
                    reject_posts = config.raw.reject_posts,
                    builtin_bad_domains = config.raw.builtin_bad_domains,
                    block_new_user_pm = config.raw.block_new_user_pm,
                    block_new_user_links = config.raw.block_new_user_links,
                    block_new_user_images = config.raw.block_new_user_images,
                    "Moderation configuration reloaded"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("Rejected moderation configuration, keeping previous: {}", e);
                Err(e)
            }
        }
    }
}
