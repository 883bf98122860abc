//! Terminal rendering for command results.

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};

use rollout_core::deploy::{DeployError, DeployPlan, DeployReport, TargetOutcome};
use rollout_core::status::TargetStatus;

/// Full error chain on one line, e.g. `Failed to create the release: Path already exists: ...`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

pub fn print_deploy_outcomes(outcomes: &[TargetOutcome<DeployReport>]) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                let previous = report
                    .previous
                    .as_deref()
                    .map(|p| format!(" (was {p})"))
                    .unwrap_or_default();
                println!(
                    "{} {:<16} release {}{}",
                    style("✔").green(),
                    outcome.target,
                    style(&report.release_id).bold(),
                    previous
                );
            }
            Err(err) => print_failure(&outcome.target, err),
        }
    }
}

fn print_failure(target: &str, err: &DeployError) {
    println!(
        "{} {:<16} {}",
        style("✘").red(),
        target,
        style(error_chain(err)).red()
    );
}

pub fn print_plans(outcomes: &[TargetOutcome<DeployPlan>]) {
    println!("{}", style("Dry run: nothing will be changed").yellow());
    for outcome in outcomes {
        match &outcome.result {
            Ok(plan) => {
                println!();
                println!("{}", style(&plan.target).bold());
                println!("  Base path: {}", plan.base_path);
                println!(
                    "  Release:   {} -> {}",
                    style(&plan.release_id).green(),
                    plan.release_path
                );
                println!(
                    "  Current:   {}",
                    plan.current.as_deref().unwrap_or("(none)")
                );
                for hook in &plan.hooks {
                    println!("  Hook:      {hook}");
                }
            }
            Err(err) => print_failure(&outcome.target, err),
        }
    }
}

pub fn print_status_table(statuses: &[TargetStatus]) {
    println!(
        "{:<16} {:<28} {:<16} {:>8}",
        style("TARGET").bold(),
        style("ADDRESS").bold(),
        style("CURRENT").bold(),
        style("RELEASES").bold()
    );
    for status in statuses {
        let current = if !status.initialized {
            style("not set up".to_string()).yellow()
        } else if let Some(target) = &status.dangling_current {
            style(format!("dangling -> {target}")).red()
        } else {
            match &status.current {
                Some(current) => style(current.clone()).green(),
                None => style("(none)".to_string()).dim(),
            }
        };
        println!(
            "{:<16} {:<28} {:<16} {:>8}",
            status.target,
            status.address,
            current,
            status.releases.len()
        );
    }
}

pub fn print_releases(target: &str, releases: &[String], current: Option<&str>) {
    if releases.is_empty() {
        println!("No releases on {target}");
        return;
    }
    println!("Releases on {} ({}):", target, releases.len());
    for release in releases {
        if Some(release.as_str()) == current {
            println!("  {} {}", style("*").green(), style(release).green().bold());
        } else {
            println!("    {release}");
        }
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
