//! Configuration schema for rollout.toml

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::paths::expand_tilde;
use crate::release::NameFormat;
use crate::remote::SshOptions;
use crate::target::{ConnectionTarget, Transport};

/// Root configuration structure for rollout.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolloutConfig {
    #[serde(default)]
    pub release: ReleaseSettings,

    #[serde(default)]
    pub ssh: SshSettings,

    #[serde(default)]
    pub hooks: HookSettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseSettings {
    /// How generated release ids look
    #[serde(default)]
    pub name_format: NameFormat,

    /// Keep a partially populated release when populating it fails
    #[serde(default)]
    pub keep_on_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Where control sockets live (defaults to the system temp dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_dir: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default = "default_strict_host_key_checking")]
    pub strict_host_key_checking: String,

    #[serde(default = "default_askpass")]
    pub askpass: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_strict_host_key_checking() -> String {
    "accept-new".to_string()
}

fn default_askpass() -> bool {
    true
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            control_dir: None,
            connect_timeout: default_connect_timeout(),
            strict_host_key_checking: default_strict_host_key_checking(),
            askpass: default_askpass(),
        }
    }
}

impl From<&SshSettings> for SshOptions {
    fn from(settings: &SshSettings) -> Self {
        let defaults = SshOptions::default();
        SshOptions {
            control_dir: settings
                .control_dir
                .as_deref()
                .map(expand_tilde)
                .unwrap_or(defaults.control_dir),
            connect_timeout: settings.connect_timeout,
            strict_host_key_checking: settings.strict_host_key_checking.clone(),
            askpass: settings.askpass,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookSettings {
    /// Shell snippets run inside `current` after a successful promotion
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_deploy: Vec<String>,
}

/// One `[[targets]]` entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Key file path or inline key material
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,

    #[serde(default, alias = "ssh_keyphrase", skip_serializing_if = "Option::is_none")]
    pub ssh_passphrase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    pub base_path: String,

    #[serde(default)]
    pub transport: Transport,
}

impl RolloutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions::from(&self.ssh)
    }

    /// Targets named in `names`, in the order given; every target when empty.
    pub fn select_targets(&self, names: &[String]) -> anyhow::Result<Vec<&TargetConfig>> {
        if names.is_empty() {
            return Ok(self.targets.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.target(name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Unknown target '{}'. Configured targets: {}",
                        name,
                        self.target_names().join(", ")
                    )
                })
            })
            .collect()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                anyhow::bail!("Every [[targets]] entry needs a non-empty 'name'");
            }
            if !seen.insert(target.name.as_str()) {
                anyhow::bail!("Duplicate target name: '{}'", target.name);
            }
            ConnectionTarget::from_config(target)
                .with_context(|| format!("Invalid target configuration: '{}'", target.name))?;
        }

        if self.ssh.connect_timeout == 0 {
            anyhow::bail!("ssh.connect_timeout must be greater than zero");
        }

        for hook in &self.hooks.post_deploy {
            if hook.trim().is_empty() {
                anyhow::bail!("hooks.post_deploy entries must not be empty");
            }
        }
        Ok(())
    }
}

impl TargetConfig {
    pub fn key_path(&self) -> Option<PathBuf> {
        self.ssh_key
            .as_deref()
            .filter(|key| !key.trim_start().starts_with("-----BEGIN"))
            .map(expand_tilde)
    }
}
