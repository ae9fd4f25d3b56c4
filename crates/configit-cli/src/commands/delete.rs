//! Delete command.

use anyhow::{Context, Result, bail};
use configit_config::load_delete_file;
use configit_engine::{DeleteOptions, DeleteOutcome, Deleter};
use std::path::Path;

use super::{OutputFormat, cancel_on_ctrl_c, platform, print_json};

/// Delete the objects listed in a delete file.
pub async fn run(path: &Path, concurrency: usize, output: OutputFormat) -> Result<()> {
    let entries = load_delete_file(path)
        .with_context(|| format!("Failed to load delete file: {}", path.display()))?;

    let report = Deleter::new(platform())
        .with_options(DeleteOptions { concurrency })
        .with_cancellation(cancel_on_ctrl_c())
        .delete(entries)
        .await;

    match output {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            for result in &report.results {
                let status = match &result.outcome {
                    DeleteOutcome::Deleted { ids } => format!("✓ deleted {}", ids.join(", ")),
                    DeleteOutcome::NotFound => "! nothing found".to_string(),
                    DeleteOutcome::UnknownType => "! unknown type".to_string(),
                    DeleteOutcome::Failed { error } => format!("✗ failed: {error}"),
                };
                println!("  {} - {}", result.entry, status);
            }
            println!(
                "{} deleted, {} warnings, {} errors",
                report.deleted_count(),
                report.warnings().count(),
                report.errors().count()
            );
        }
    }

    if !report.is_success() {
        bail!("Delete failed");
    }
    Ok(())
}
