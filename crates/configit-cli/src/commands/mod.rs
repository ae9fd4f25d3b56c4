//! CLI command implementations.

pub mod delete;
pub mod deploy;
pub mod validate;

use anyhow::{Result, bail};
use clap::ValueEnum;
use configit_client::InMemoryClient;
use configit_core::{ApiClient, ClientSet};
use configit_engine::CancellationFlag;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Clients for the platform the commands run against.
pub fn platform() -> ClientSet {
    let client = InMemoryClient::new();
    info!(platform = client.name(), "Using in-memory platform");
    ClientSet::uniform(Arc::new(client))
}

/// Cancel the run on Ctrl-C. Work already started is allowed to finish.
pub fn cancel_on_ctrl_c() -> CancellationFlag {
    let cancel = CancellationFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing work in flight");
            flag.cancel();
        }
    });
    cancel
}

/// Pick the environments to work on, defaulting to all declared ones.
pub fn select_environments(declared: &[String], requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(declared.to_vec());
    }
    for environment in requested {
        if !declared.contains(environment) {
            bail!(
                "Unknown environment '{}' (declared: {})",
                environment,
                declared.join(", ")
            );
        }
    }
    Ok(requested.to_vec())
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
