//! End-to-end deploys against `transport = "local"` targets
//!
//! Config is parsed from TOML, targets are built from it, and the whole
//! setup → create → populate → promote → hooks pipeline runs on temp dirs.

#![cfg(unix)]

use std::path::Path;

use rollout_core::config::parse_rollout_toml_str;
use rollout_core::deploy::{
    DeployError, DeployOptions, DirectorySource, TargetSession, deploy_all,
};
use rollout_core::remote::SessionNamer;
use rollout_core::status::session_status;
use rollout_core::target::ConnectionTarget;
use tempfile::TempDir;

fn config_for(root: &Path, hooks: &[&str]) -> String {
    let hooks = hooks
        .iter()
        .map(|h| format!("{h:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
[release]
name_format = "compact"

[hooks]
post_deploy = [{hooks}]

[[targets]]
name = "blue"
base_path = "{root}/blue"
transport = "local"

[[targets]]
name = "green"
base_path = "{root}/green"
transport = "local"
"#,
        root = root.display()
    )
}

fn build_dir() -> TempDir {
    let build = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir_all(build.path().join("public")).expect("mkdir should succeed");
    std::fs::write(build.path().join("public/index.html"), "<h1>v1</h1>")
        .expect("write should succeed");
    std::fs::write(build.path().join("VERSION"), "v1").expect("write should succeed");
    build
}

fn targets(config: &rollout_core::config::RolloutConfig) -> Vec<ConnectionTarget> {
    config
        .targets
        .iter()
        .map(|t| ConnectionTarget::from_config(t).expect("target should build"))
        .collect()
}

#[test]
fn deploy_to_all_targets_from_config() {
    let root = TempDir::new().expect("Failed to create temp dir");
    let build = build_dir();
    let config = parse_rollout_toml_str(&config_for(root.path(), &["cp VERSION deployed.txt"]))
        .expect("config should parse");

    let mut options = DeployOptions::from_config(&config);
    options.release_id = Some("20240101000000".to_string());
    let outcomes = deploy_all(
        &targets(&config),
        &DirectorySource::new(build.path()),
        &options,
        &SessionNamer::new("it"),
    );

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        let report = outcome.result.as_ref().expect("deploy should succeed");
        assert_eq!(report.hooks_run, 1);

        let current = root.path().join(&outcome.target).join("current");
        assert_eq!(
            std::fs::read_to_string(current.join("public/index.html"))
                .expect("read should succeed"),
            "<h1>v1</h1>"
        );
        assert_eq!(
            std::fs::read_to_string(current.join("deployed.txt")).expect("read should succeed"),
            "v1"
        );
    }
}

#[test]
fn status_follows_deploys_and_activation() {
    let root = TempDir::new().expect("Failed to create temp dir");
    let build = build_dir();
    let config =
        parse_rollout_toml_str(&config_for(root.path(), &[])).expect("config should parse");
    let target = targets(&config).remove(0);
    let namer = SessionNamer::new("it");
    let session = TargetSession::open(
        &target,
        &namer,
        &config.ssh_options(),
        config.release.name_format,
    )
    .expect("session should open");

    let before = session_status(&session).expect("status should succeed");
    assert!(!before.initialized);

    let source = DirectorySource::new(build.path());
    for id in ["a", "b"] {
        let options = DeployOptions {
            release_id: Some(id.to_string()),
            ..DeployOptions::from_config(&config)
        };
        session
            .deployer()
            .deploy(&source, &options)
            .expect("deploy should succeed");
    }

    let status = session_status(&session).expect("status should succeed");
    assert_eq!(status.releases, vec!["a", "b"]);
    assert_eq!(status.current.as_deref(), Some("b"));
    assert_eq!(status.address, "local");

    session
        .manager()
        .set_current_release("a")
        .expect("activate should succeed");
    let status = session_status(&session).expect("status should succeed");
    assert_eq!(status.current.as_deref(), Some("a"));
}

#[test]
fn failing_target_does_not_stop_others() {
    let root = TempDir::new().expect("Failed to create temp dir");
    let build = build_dir();
    let config =
        parse_rollout_toml_str(&config_for(root.path(), &[])).expect("config should parse");

    // A file where green's base directory should be makes its setup fail.
    std::fs::write(root.path().join("green"), "not a directory").expect("write should succeed");

    let outcomes = deploy_all(
        &targets(&config),
        &DirectorySource::new(build.path()),
        &DeployOptions::from_config(&config),
        &SessionNamer::new("it"),
    );

    assert!(outcomes[0].is_ok(), "blue should deploy");
    assert_eq!(outcomes[1].target, "green");
    assert!(matches!(
        outcomes[1].result,
        Err(DeployError::Setup(_))
    ));
}

#[test]
fn dry_run_plan_touches_nothing() {
    let root = TempDir::new().expect("Failed to create temp dir");
    let config = parse_rollout_toml_str(&config_for(root.path(), &["echo done"]))
        .expect("config should parse");
    let target = targets(&config).remove(0);
    let namer = SessionNamer::new("it");
    let session = TargetSession::open(
        &target,
        &namer,
        &config.ssh_options(),
        config.release.name_format,
    )
    .expect("session should open");

    let plan = session
        .deployer()
        .plan(&DeployOptions::from_config(&config))
        .expect("plan should succeed");
    assert_eq!(plan.release_id.len(), "YYYYMMDDHHMMSS".len());
    assert_eq!(plan.hooks, vec!["echo done"]);
    assert!(!root.path().join("blue").exists());
}
