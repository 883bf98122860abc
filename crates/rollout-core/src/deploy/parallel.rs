//! One thread per target. Hosts are driven independently; a failing target
//! never stops the others.

use std::thread;

use super::{DeployError, DeployOptions, DeployReport, ReleaseSource, TargetSession};
use crate::remote::SessionNamer;
use crate::target::ConnectionTarget;

/// Result of a job on a single target.
#[derive(Debug)]
pub struct TargetOutcome<T, E = DeployError> {
    pub target: String,
    pub result: Result<T, E>,
}

impl<T, E> TargetOutcome<T, E> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `job` for every target concurrently and collect one outcome per
/// target, in input order. A panicking job is re-raised on the caller.
pub fn run_per_target<T, E, F>(targets: &[ConnectionTarget], job: F) -> Vec<TargetOutcome<T, E>>
where
    F: Fn(&ConnectionTarget) -> Result<T, E> + Sync,
    T: Send,
    E: Send,
{
    let job = &job;
    thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| (target.name(), scope.spawn(move || job(target))))
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| match handle.join() {
                Ok(result) => TargetOutcome {
                    target: name.to_string(),
                    result,
                },
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

/// Open a session to every target and deploy `source` to each of them.
pub fn deploy_all(
    targets: &[ConnectionTarget],
    source: &dyn ReleaseSource,
    options: &DeployOptions,
    namer: &SessionNamer,
) -> Vec<TargetOutcome<DeployReport>> {
    tracing::info!("Deploying to {} target(s)", targets.len());
    run_per_target(targets, |target| {
        let session = TargetSession::open(target, namer, &options.ssh, options.name_format)?;
        let report = session.deployer().deploy(source, options);
        match &report {
            Ok(report) => tracing::info!(
                target_name = %target.name(),
                "Deployed release {}",
                report.release_id
            ),
            Err(err) => tracing::error!(target_name = %target.name(), "Deploy failed: {}", err),
        }
        report
    })
}
