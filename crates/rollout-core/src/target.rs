//! Deployment targets: where a release tree lives and how to reach it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TargetConfig;
use crate::credentials::{CredentialError, Credentials};
use crate::fs::is_absolute_path;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// How commands and file operations reach the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Ssh,
    Local,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Ssh => "ssh",
            Transport::Local => "local",
        }
    }
}

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Target '{target}' is missing required field '{field}'")]
    MissingField { target: String, field: &'static str },

    #[error("Target '{target}' sets both 'password' and 'ssh_key'; choose one")]
    AmbiguousCredentials { target: String },

    #[error("Target '{target}' needs either 'password' or 'ssh_key'")]
    MissingCredentials { target: String },

    #[error("Target '{target}' has relative base_path '{path}'; it must be absolute")]
    RelativeBasePath { target: String, path: String },

    #[error("Target '{target}' has invalid credentials")]
    Credentials {
        target: String,
        #[source]
        source: CredentialError,
    },
}

/// A validated target. Built once per host per run.
#[derive(Debug, Clone)]
pub struct ConnectionTarget {
    name: String,
    host: String,
    port: u16,
    transport: Transport,
    credentials: Option<Credentials>,
    base_path: String,
}

impl ConnectionTarget {
    pub fn ssh(
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        credentials: Credentials,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            transport: Transport::Ssh,
            credentials: Some(credentials),
            base_path: base_path.into(),
        }
    }

    pub fn local(name: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: "localhost".to_string(),
            port: 0,
            transport: Transport::Local,
            credentials: None,
            base_path: base_path.into(),
        }
    }

    /// Validate a configured target and load its credentials.
    pub fn from_config(config: &TargetConfig) -> Result<Self, TargetError> {
        let name = config.name.clone();

        if !is_absolute_path(&config.base_path) {
            return Err(TargetError::RelativeBasePath {
                target: name,
                path: config.base_path.clone(),
            });
        }

        if config.transport == Transport::Local {
            return Ok(Self::local(name, config.base_path.clone()));
        }

        let host = config
            .host
            .clone()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| TargetError::MissingField {
                target: name.clone(),
                field: "host",
            })?;
        let user = config
            .user
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| TargetError::MissingField {
                target: name.clone(),
                field: "user",
            })?;

        let credentials = match (&config.password, &config.ssh_key) {
            (Some(_), Some(_)) => return Err(TargetError::AmbiguousCredentials { target: name }),
            (None, None) => return Err(TargetError::MissingCredentials { target: name }),
            (Some(password), None) => Credentials::password(user, password.clone()),
            (None, Some(key)) => {
                let passphrase = config.ssh_passphrase.clone();
                match config.key_path() {
                    Some(path) => Credentials::key_from_file(user, &path, passphrase),
                    None => Credentials::key_from_material(user, key.clone(), passphrase),
                }
            }
        }
        .map_err(|source| TargetError::Credentials {
            target: name.clone(),
            source,
        })?;

        Ok(Self::ssh(
            name,
            host,
            config.port.unwrap_or(DEFAULT_SSH_PORT),
            credentials,
            config.base_path.clone(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// `user@host:port` for ssh targets, `local` otherwise.
    pub fn address(&self) -> String {
        match (&self.transport, &self.credentials) {
            (Transport::Ssh, Some(creds)) => {
                format!("{}@{}:{}", creds.username(), self.host, self.port)
            }
            _ => "local".to_string(),
        }
    }
}
