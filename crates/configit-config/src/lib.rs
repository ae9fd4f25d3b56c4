//! KDL configuration parsing for configit.
//!
//! This crate handles parsing of:
//! - Project manifests (environments, projects and their configs)
//! - Delete files

pub mod delete;
pub mod error;
pub mod manifest;
mod node;

pub use delete::{load_delete_file, parse_delete_file};
pub use error::{ConfigError, ConfigResult};
pub use manifest::{Manifest, load_manifest, parse_manifest};

/// Read a file into a string, naming the path on failure.
pub(crate) fn read_file(path: &std::path::Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
