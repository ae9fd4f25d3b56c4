//! Manifest validation command.

use anyhow::{Context, Result, bail};
use configit_config::load_manifest;
use configit_engine::{DependencyGraph, GraphError, Wave, sort_waves};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::{OutputFormat, print_json, select_environments};

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum EnvironmentPlan {
    Waves(Vec<Wave>),
    Errors(Vec<String>),
}

/// Parse a manifest and order each environment into waves.
pub fn run(path: &Path, environments: &[String], output: OutputFormat) -> Result<()> {
    let manifest = load_manifest(path)
        .with_context(|| format!("Failed to load manifest: {}", path.display()))?;
    let environments = select_environments(&manifest.environments, environments)?;

    let mut plans = BTreeMap::new();
    for environment in &environments {
        let plan = match plan(manifest.configs_for(environment)) {
            Ok(waves) => EnvironmentPlan::Waves(waves),
            Err(errors) => EnvironmentPlan::Errors(errors.iter().map(ToString::to_string).collect()),
        };
        plans.insert(environment.clone(), plan);
    }

    match output {
        OutputFormat::Json => print_json(&plans)?,
        OutputFormat::Text => {
            for (environment, plan) in &plans {
                match plan {
                    EnvironmentPlan::Waves(waves) => {
                        println!("Environment '{}': {} waves", environment, waves.len());
                        for (i, wave) in waves.iter().enumerate() {
                            let names: Vec<String> = wave.iter().map(ToString::to_string).collect();
                            println!("  {}. {}", i + 1, names.join(", "));
                        }
                    }
                    EnvironmentPlan::Errors(errors) => {
                        println!("Environment '{}' is invalid:", environment);
                        for error in errors {
                            println!("  ✗ {}", error);
                        }
                    }
                }
            }
        }
    }

    if plans
        .values()
        .any(|p| matches!(p, EnvironmentPlan::Errors(_)))
    {
        bail!("Configuration is invalid");
    }
    Ok(())
}

fn plan(configs: Vec<configit_core::Config>) -> Result<Vec<Wave>, Vec<GraphError>> {
    let graph = DependencyGraph::build(configs)?;
    sort_waves(&graph).map_err(|e| vec![e])
}
