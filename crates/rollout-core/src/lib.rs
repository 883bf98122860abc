//! Rollout Core Library
//!
//! Atomic release management on local and remote hosts: a `releases/`
//! directory holding one tree per release, and a `current` symlink that is
//! only ever swapped from one complete release to another.

pub mod config;
pub mod credentials;
pub mod deploy;
pub mod fs;
pub mod release;
pub mod remote;
pub mod status;
pub mod target;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, RolloutConfig, TargetConfig};

    // Filesystem
    pub use crate::fs::{Filesystem, FsError, LocalFilesystem, RemoteFilesystem};

    // Releases
    pub use crate::release::{
        NameFormat, NameGenerator, ReleaseError, ReleaseManager, TimestampGenerator,
    };

    // Remote execution
    pub use crate::remote::{
        ConnectionError, LineSink, LocalShellExecutor, RemoteExecutor, SessionNamer, SshExecutor,
        SshOptions,
    };

    // Targets
    pub use crate::credentials::Credentials;
    pub use crate::target::{ConnectionTarget, Transport};

    // Deploy
    pub use crate::deploy::{
        DeployError, DeployOptions, DeployReport, Deployer, DirectorySource, ReleaseSource,
        TargetSession, deploy_all,
    };
    pub use crate::status::{TargetStatus, collect_status};
}
