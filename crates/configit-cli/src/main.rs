//! configit CLI tool.

use clap::{Parser, Subcommand};
use configit_engine::deploy::DEFAULT_CONCURRENCY;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(name = "configit")]
#[command(about = "Deploy configuration-as-code projects", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a manifest and print the deployment order
    Validate {
        /// Path to the manifest
        #[arg(default_value = "manifest.kdl")]
        manifest: PathBuf,
        /// Environments to check (default: all declared)
        #[arg(short, long = "environment")]
        environments: Vec<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Deploy a manifest
    Deploy {
        /// Path to the manifest
        #[arg(default_value = "manifest.kdl")]
        manifest: PathBuf,
        /// Environments to deploy (default: all declared)
        #[arg(short, long = "environment")]
        environments: Vec<String>,
        /// Maximum number of configs applied at once
        #[arg(long, env = "CONFIGIT_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY as u64,
              value_parser = clap::value_parser!(u64).range(1..))]
        concurrency: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Delete the objects listed in a delete file
    Delete {
        /// Path to the delete file
        #[arg(default_value = "delete.kdl")]
        file: PathBuf,
        /// Maximum number of entries processed at once
        #[arg(long, env = "CONFIGIT_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY as u64,
              value_parser = clap::value_parser!(u64).range(1..))]
        concurrency: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate {
            manifest,
            environments,
            output,
        } => {
            commands::validate::run(&manifest, &environments, output)?;
        }
        Commands::Deploy {
            manifest,
            environments,
            concurrency,
            output,
        } => {
            commands::deploy::run(&manifest, &environments, concurrency as usize, output).await?;
        }
        Commands::Delete {
            file,
            concurrency,
            output,
        } => {
            commands::delete::run(&file, concurrency as usize, output).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_arguments() {
        let cli = Cli::try_parse_from([
            "configit",
            "deploy",
            "infra.kdl",
            "-e",
            "dev",
            "--environment",
            "prod",
            "--concurrency",
            "2",
            "--output",
            "json",
        ])
        .unwrap();

        let Commands::Deploy {
            manifest,
            environments,
            concurrency,
            output,
        } = cli.command
        else {
            panic!("expected deploy");
        };
        assert_eq!(manifest, PathBuf::from("infra.kdl"));
        assert_eq!(environments, vec!["dev", "prod"]);
        assert_eq!(concurrency, 2);
        assert_eq!(output, OutputFormat::Json);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["configit", "delete", "d.kdl", "--concurrency", "0"]).is_err());
    }
}
