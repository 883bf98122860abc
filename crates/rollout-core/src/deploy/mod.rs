//! Deploy orchestration for a single target and across targets.
//!
//! A deploy is `setup → create → populate → promote → post-deploy hooks`.
//! Until promotion succeeds `current` is untouched, so a failure at any
//! earlier step leaves the previously live release serving.

pub mod parallel;
pub mod source;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::RolloutConfig;
use crate::fs::{Filesystem, LocalFilesystem, RemoteFilesystem};
use crate::release::{NameFormat, ReleaseError, ReleaseManager, TimestampGenerator};
use crate::remote::{
    ConnectionError, LocalShellExecutor, RemoteExecutor, SessionNamer, SshExecutor, SshOptions,
};
use crate::target::{ConnectionTarget, Transport};

pub use parallel::{TargetOutcome, deploy_all, run_per_target};
pub use source::{DirectorySource, ReleaseSource};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to open a session to target '{target}'")]
    Connect {
        target: String,
        #[source]
        source: ConnectionError,
    },

    #[error("Failed to prepare the release directory")]
    Setup(#[source] ReleaseError),

    #[error("Failed to plan the release")]
    Plan(#[source] ReleaseError),

    #[error("Failed to create the release")]
    Create(#[source] ReleaseError),

    #[error("Failed to populate release '{release}'")]
    Populate {
        release: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to promote release '{release}'")]
    Promote {
        release: String,
        #[source]
        source: ReleaseError,
    },

    #[error("Post-deploy hook `{command}` exited with status {code}; release '{release}' is live")]
    Hook {
        release: String,
        command: String,
        code: i32,
    },

    #[error("Failed to run post-deploy hook `{command}`; release '{release}' is live")]
    HookExecution {
        release: String,
        command: String,
        #[source]
        source: ConnectionError,
    },
}

impl DeployError {
    /// Release the failure belongs to, once one was created.
    pub fn release(&self) -> Option<&str> {
        match self {
            DeployError::Populate { release, .. }
            | DeployError::Promote { release, .. }
            | DeployError::Hook { release, .. }
            | DeployError::HookExecution { release, .. } => Some(release),
            _ => None,
        }
    }
}

/// Per-run deploy settings, usually taken from `rollout.toml`.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Explicit release id; generated when absent.
    pub release_id: Option<String>,
    pub keep_on_failure: bool,
    pub post_deploy: Vec<String>,
    pub name_format: NameFormat,
    pub ssh: SshOptions,
}

impl DeployOptions {
    pub fn from_config(config: &RolloutConfig) -> Self {
        Self {
            release_id: None,
            keep_on_failure: config.release.keep_on_failure,
            post_deploy: config.hooks.post_deploy.clone(),
            name_format: config.release.name_format,
            ssh: config.ssh_options(),
        }
    }
}

/// What a deploy would do, computed without mutating the target.
#[derive(Debug, Clone, Serialize)]
pub struct DeployPlan {
    pub target: String,
    pub base_path: String,
    pub release_id: String,
    pub release_path: String,
    pub current: Option<String>,
    pub hooks: Vec<String>,
}

/// Outcome of a successful deploy.
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub target: String,
    pub release_id: String,
    pub release_path: String,
    pub previous: Option<String>,
    pub hooks_run: usize,
}

/// An open connection to one target: its release manager plus the executor
/// hooks run through. Filesystem and executor share the same session.
pub struct TargetSession {
    target: ConnectionTarget,
    manager: ReleaseManager<Box<dyn Filesystem>>,
    executor: Arc<dyn RemoteExecutor>,
}

impl TargetSession {
    pub fn open(
        target: &ConnectionTarget,
        namer: &SessionNamer,
        ssh: &SshOptions,
        name_format: NameFormat,
    ) -> Result<Self, DeployError> {
        let executor: Arc<dyn RemoteExecutor> = match target.transport() {
            Transport::Local => Arc::new(LocalShellExecutor::new(namer)),
            Transport::Ssh => Arc::new(SshExecutor::connect(target, namer, ssh.clone()).map_err(
                |source| DeployError::Connect {
                    target: target.name().to_string(),
                    source,
                },
            )?),
        };
        let fs: Box<dyn Filesystem> = match target.transport() {
            Transport::Local => Box::new(LocalFilesystem::new()),
            Transport::Ssh => Box::new(RemoteFilesystem::new(executor.clone())),
        };

        let manager = ReleaseManager::new(target.base_path(), fs)
            .with_generator(TimestampGenerator::new(name_format));

        Ok(Self {
            target: target.clone(),
            manager,
            executor,
        })
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn manager(&self) -> &ReleaseManager<Box<dyn Filesystem>> {
        &self.manager
    }

    pub fn executor(&self) -> &dyn RemoteExecutor {
        self.executor.as_ref()
    }

    pub fn deployer(&self) -> Deployer<'_, Box<dyn Filesystem>> {
        Deployer::new(self.target.name(), &self.manager, self.executor.as_ref())
    }
}

impl std::fmt::Debug for TargetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetSession")
            .field("target", &self.target.name())
            .field("session", &self.executor.name())
            .finish()
    }
}

/// Drives one deploy against one target.
pub struct Deployer<'a, F> {
    target: &'a str,
    manager: &'a ReleaseManager<F>,
    executor: &'a dyn RemoteExecutor,
}

impl<'a, F: Filesystem> Deployer<'a, F> {
    pub fn new(
        target: &'a str,
        manager: &'a ReleaseManager<F>,
        executor: &'a dyn RemoteExecutor,
    ) -> Self {
        Self {
            target,
            manager,
            executor,
        }
    }

    /// Resolve the release id and current release without touching the target.
    pub fn plan(&self, options: &DeployOptions) -> Result<DeployPlan, DeployError> {
        let release_id = self
            .manager
            .plan_release_id(options.release_id.as_deref())
            .map_err(DeployError::Plan)?;
        let current = self.current_release().map_err(DeployError::Plan)?;

        Ok(DeployPlan {
            target: self.target.to_string(),
            base_path: self.manager.base_path().to_string(),
            release_path: self.manager.release_path(&release_id),
            release_id,
            current,
            hooks: options.post_deploy.clone(),
        })
    }

    pub fn deploy(
        &self,
        source: &dyn ReleaseSource,
        options: &DeployOptions,
    ) -> Result<DeployReport, DeployError> {
        self.manager.setup().map_err(DeployError::Setup)?;
        let previous = self.current_release().map_err(DeployError::Setup)?;

        let release = self
            .manager
            .create_release(options.release_id.as_deref())
            .map_err(DeployError::Create)?;
        let release_path = self.manager.release_path(&release);

        if let Err(err) = source.populate(self.manager.filesystem(), &release_path) {
            self.discard(&release, options.keep_on_failure);
            return Err(DeployError::Populate {
                release,
                source: err,
            });
        }

        self.manager
            .set_current_release(&release)
            .map_err(|source| DeployError::Promote {
                release: release.clone(),
                source,
            })?;
        tracing::info!(target_name = %self.target, "Release {} is live", release);

        let hooks_run = self.run_hooks(&release, &options.post_deploy)?;

        Ok(DeployReport {
            target: self.target.to_string(),
            release_id: release,
            release_path,
            previous,
            hooks_run,
        })
    }

    /// Current release, treating a dangling pointer as no release.
    fn current_release(&self) -> Result<Option<String>, ReleaseError> {
        match self.manager.get_current_release() {
            Ok(current) => Ok(current),
            Err(ReleaseError::DanglingCurrentPointer { target }) => {
                tracing::warn!(
                    target_name = %self.target,
                    "current points at {}, which is not a release",
                    target
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn discard(&self, release: &str, keep: bool) {
        if keep {
            tracing::warn!(
                target_name = %self.target,
                "Keeping partially populated release {}",
                release
            );
            return;
        }
        if let Err(err) = self.manager.remove_release(release) {
            tracing::warn!(
                target_name = %self.target,
                "Failed to remove partially populated release {}: {}",
                release,
                err
            );
        }
    }

    fn run_hooks(&self, release: &str, hooks: &[String]) -> Result<usize, DeployError> {
        let current = self.manager.current_path();
        let target = self.target;
        for command in hooks {
            let mut sink = |line: &str| tracing::info!(target_name = %target, "| {}", line);
            let code = self
                .executor
                .run(command, &[], Some(&current), &mut sink)
                .map_err(|source| DeployError::HookExecution {
                    release: release.to_string(),
                    command: command.clone(),
                    source,
                })?;
            if code != 0 {
                return Err(DeployError::Hook {
                    release: release.to_string(),
                    command: command.clone(),
                    code,
                });
            }
        }
        Ok(hooks.len())
    }
}
