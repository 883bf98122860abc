//! Config store for loading and saving rollout.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::paths::config_path_in;
use super::{RolloutConfig, parser};

#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    /// `./rollout.toml` in the working directory.
    pub fn from_current_dir() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("Could not determine working directory")?;
        Ok(Self::from_path(config_path_in(&cwd)))
    }

    pub fn from_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Missing file means default configuration.
    pub fn load(&self) -> anyhow::Result<RolloutConfig> {
        if !self.config_path.exists() {
            tracing::debug!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(RolloutConfig::new());
        }
        parser::parse_rollout_toml(&self.config_path)
    }

    pub fn save(&self, config: &RolloutConfig) -> anyhow::Result<()> {
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = self.config_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.config_path, content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;
        Ok(())
    }
}
