//! Configuration loaded from `rollout.toml`.
//!
//! The file is optional: without it there are no targets, and every other
//! section falls back to its defaults.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_rollout_toml, parse_rollout_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, config_path_in, expand_tilde};
pub use schema::{HookSettings, ReleaseSettings, RolloutConfig, SshSettings, TargetConfig};
pub use store::ConfigStore;
