//! Deployment command.

use anyhow::{Context, Result, bail};
use configit_config::load_manifest;
use configit_engine::deploy::EnvironmentResult;
use configit_engine::{ConfigState, DeployOptions, DeployReport, Deployer, SkipReason};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{OutputFormat, cancel_on_ctrl_c, platform, print_json, select_environments};

#[derive(Serialize)]
#[serde(untagged)]
enum EnvironmentOutput<'a> {
    Report(&'a DeployReport),
    Invalid { errors: Vec<String> },
}

/// Deploy every selected environment of a manifest.
pub async fn run(
    path: &Path,
    environments: &[String],
    concurrency: usize,
    output: OutputFormat,
) -> Result<()> {
    let manifest = load_manifest(path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))?;
    let environments = select_environments(&manifest.environments, environments)?;

    let deployer = Deployer::new(platform())
        .with_options(DeployOptions { concurrency })
        .with_cancellation(cancel_on_ctrl_c());
    let results = deployer
        .deploy_projects(&manifest.projects, &environments)
        .await;

    match output {
        OutputFormat::Json => {
            let json: BTreeMap<&String, EnvironmentOutput> = results
                .iter()
                .map(|(environment, result)| {
                    let out = match result {
                        Ok(report) => EnvironmentOutput::Report(report),
                        Err(errors) => EnvironmentOutput::Invalid {
                            errors: errors.iter().map(ToString::to_string).collect(),
                        },
                    };
                    (environment, out)
                })
                .collect();
            print_json(&json)?;
        }
        OutputFormat::Text => {
            for (environment, result) in &results {
                print_text(environment, result);
            }
        }
    }

    let success = results
        .values()
        .all(|r| r.as_ref().is_ok_and(DeployReport::is_success));
    if !success {
        bail!("Deployment failed");
    }
    Ok(())
}

fn print_text(environment: &str, result: &EnvironmentResult) {
    match result {
        Err(errors) => {
            println!("Environment '{}' was not deployed:", environment);
            for error in errors {
                println!("  ✗ {}", error);
            }
        }
        Ok(report) => {
            println!(
                "Environment '{}' (run {}): {} deployed, {} failed, {} skipped",
                environment,
                report.run_id,
                report.deployed_count(),
                report.failures().len(),
                report.skipped_count()
            );
            for (coordinate, state) in &report.states {
                let status = match state {
                    ConfigState::Deployed { remote_id } => format!("✓ deployed ({remote_id})"),
                    ConfigState::Failed { error } => format!("✗ failed: {error}"),
                    ConfigState::Skipped {
                        reason: SkipReason::Explicit,
                    } => "⊘ skipped".to_string(),
                    ConfigState::Skipped {
                        reason: SkipReason::DependencyFailed { dependency },
                    } => format!("⊘ skipped: {dependency} was not deployed"),
                    ConfigState::Pending | ConfigState::Resolving => "○ pending".to_string(),
                };
                println!("  {} - {}", coordinate, status);
            }
        }
    }
}
