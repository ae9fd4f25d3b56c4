//! Delete entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An object to delete, addressed by type and identifier.
///
/// For classic APIs the identifier is the object name. For other types it is
/// either the remote object id or, together with `project`, the config id the
/// object was deployed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeleteEntry {
    pub config_type: String,
    pub identifier: String,
    pub project: Option<String>,
}

impl DeleteEntry {
    pub fn new(config_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            config_type: config_type.into(),
            identifier: identifier.into(),
            project: None,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}

impl fmt::Display for DeleteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}/{} (project {})", self.config_type, self.identifier, project),
            None => write!(f, "{}/{}", self.config_type, self.identifier),
        }
    }
}
