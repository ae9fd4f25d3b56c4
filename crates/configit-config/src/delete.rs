//! Delete file parsing.
//!
//! ```kdl
//! delete "auto-tag/my tag"
//! delete type="builtin:alerting.profile" id="p1" project="infra"
//! delete type="management-zone" name="Zone"
//! ```

use crate::node::{string_arg, string_prop};
use crate::{ConfigError, ConfigResult, read_file};
use configit_core::DeleteEntry;
use kdl::{KdlDocument, KdlNode};
use std::path::Path;
use tracing::debug;

/// Read and parse a delete file.
pub fn load_delete_file(path: impl AsRef<Path>) -> ConfigResult<Vec<DeleteEntry>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading delete file");
    parse_delete_file(&read_file(path)?)
}

/// Parse delete entries from KDL text.
///
/// Either every entry is valid and all are returned, or every problem is
/// reported and none are.
pub fn parse_delete_file(kdl: &str) -> ConfigResult<Vec<DeleteEntry>> {
    let doc: KdlDocument = kdl.parse()?;

    let mut entries = Vec::new();
    let mut errors = Vec::new();
    for (index, node) in doc.nodes().iter().enumerate() {
        let result = match node.name().value() {
            "delete" => parse_entry(node, index),
            other => Err(ConfigError::invalid(
                format!("delete entry {index}"),
                format!("expected 'delete', found '{other}'"),
            )),
        };
        match result {
            Ok(entry) => entries.push(entry),
            Err(e) => errors.push(e),
        }
    }

    ConfigError::collect(errors)?;
    if entries.is_empty() {
        return Err(ConfigError::MissingField("delete entries".to_string()));
    }
    Ok(entries)
}

fn parse_entry(node: &KdlNode, index: usize) -> ConfigResult<DeleteEntry> {
    let field = format!("delete entry {index}");

    if let Some(short) = string_arg(node, 0) {
        // Identifiers may contain '/', the type never does.
        let (config_type, identifier) = short.split_once('/').ok_or_else(|| {
            ConfigError::invalid(&field, format!("'{short}' is not of the form type/identifier"))
        })?;
        if config_type.is_empty() || identifier.is_empty() {
            return Err(ConfigError::invalid(
                &field,
                format!("'{short}' has an empty type or identifier"),
            ));
        }
        return Ok(DeleteEntry::new(config_type, identifier));
    }

    let config_type = string_prop(node, "type")
        .ok_or_else(|| ConfigError::MissingField(format!("type of {field}")))?;
    let identifier = match (string_prop(node, "id"), string_prop(node, "name")) {
        (Some(id), None) => id,
        (None, Some(name)) => name,
        (Some(_), Some(_)) => {
            return Err(ConfigError::invalid(&field, "only one of 'id' and 'name' may be set"));
        }
        (None, None) => return Err(ConfigError::MissingField(format!("id or name of {field}"))),
    };

    let entry = DeleteEntry::new(config_type, identifier);
    Ok(match string_prop(node, "project") {
        Some(project) => entry.with_project(project),
        None => entry,
    })
}
