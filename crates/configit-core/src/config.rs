//! Configs and config types.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::coordinate::{Coordinate, Reference};
use crate::parameter::Parameter;
use crate::template::Template;

/// Parameter holding the display name of an object. Classic APIs match
/// remote objects by it.
pub const NAME_PARAMETER: &str = "name";

/// Parameter holding the scope of a settings object.
pub const SCOPE_PARAMETER: &str = "scope";

/// Classic configuration APIs known to the platform.
pub const KNOWN_APIS: &[&str] = &[
    "alerting-profile",
    "application-web",
    "auto-tag",
    "calculated-metrics-service",
    "conditional-naming-host",
    "conditional-naming-service",
    "custom-service-java",
    "dashboard",
    "maintenance-window",
    "management-zone",
    "notification",
    "request-attributes",
    "request-naming-service",
    "slo",
    "synthetic-location",
    "synthetic-monitor",
];

/// Automation resources managed through the automation API.
pub const AUTOMATION_RESOURCES: &[&str] = &["workflow", "business-calendar", "scheduling-rule"];

pub const BUCKET_TYPE: &str = "bucket";

/// Broad family of a config type. Each family has its own client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum ConfigKind {
    #[display("classic-api")]
    ClassicApi,
    #[display("settings")]
    Settings,
    #[display("automation")]
    Automation,
    #[display("bucket")]
    Bucket,
}

/// How a config is matched against existing remote objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// By the resolved `name` parameter.
    Name,
    /// By the external identifier derived from the coordinate.
    ExternalId,
}

/// The type of a config, with the details its API needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigType {
    ClassicApi {
        api: String,
    },
    Settings {
        schema_id: String,
        schema_version: Option<String>,
    },
    Automation {
        resource: String,
    },
    Bucket,
}

impl ConfigType {
    /// Classify a type name as used in coordinates and delete files.
    ///
    /// Returns `None` for names that are neither a known API, a settings
    /// schema, an automation resource nor a bucket.
    pub fn from_type_name(name: &str) -> Option<Self> {
        if KNOWN_APIS.contains(&name) {
            Some(ConfigType::ClassicApi {
                api: name.to_string(),
            })
        } else if AUTOMATION_RESOURCES.contains(&name) {
            Some(ConfigType::Automation {
                resource: name.to_string(),
            })
        } else if name == BUCKET_TYPE {
            Some(ConfigType::Bucket)
        } else if name.contains(':') && !name.starts_with(':') && !name.ends_with(':') {
            Some(ConfigType::Settings {
                schema_id: name.to_string(),
                schema_version: None,
            })
        } else {
            None
        }
    }

    /// The name this type has in coordinates.
    pub fn type_name(&self) -> &str {
        match self {
            ConfigType::ClassicApi { api } => api,
            ConfigType::Settings { schema_id, .. } => schema_id,
            ConfigType::Automation { resource } => resource,
            ConfigType::Bucket => BUCKET_TYPE,
        }
    }

    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigType::ClassicApi { .. } => ConfigKind::ClassicApi,
            ConfigType::Settings { .. } => ConfigKind::Settings,
            ConfigType::Automation { .. } => ConfigKind::Automation,
            ConfigType::Bucket => ConfigKind::Bucket,
        }
    }

    pub fn identity(&self) -> Identity {
        match self {
            ConfigType::ClassicApi { .. } => Identity::Name,
            _ => Identity::ExternalId,
        }
    }
}

impl std::fmt::Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One deployable configuration object in one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub coordinate: Coordinate,
    pub config_type: ConfigType,
    /// Environment this instance of the config belongs to.
    pub environment: String,
    pub parameters: BTreeMap<String, Parameter>,
    pub template: Template,
    /// Excluded from deployment. Still part of the graph.
    pub skip: bool,
    /// Remote identifier from a previous download or deployment.
    pub origin_object_id: Option<String>,
}

impl Config {
    pub fn new(
        coordinate: Coordinate,
        config_type: ConfigType,
        environment: impl Into<String>,
        template: Template,
    ) -> Self {
        debug_assert_eq!(
            coordinate.config_type,
            config_type.type_name(),
            "coordinate type must match the config type"
        );
        Self {
            coordinate,
            config_type,
            environment: environment.into(),
            parameters: BTreeMap::new(),
            template,
            skip: false,
            origin_object_id: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_origin_object_id(mut self, id: impl Into<String>) -> Self {
        self.origin_object_id = Some(id.into());
        self
    }

    /// Union of the references of all parameters.
    pub fn references(&self) -> BTreeSet<Reference> {
        self.parameters
            .values()
            .flat_map(Parameter::references)
            .collect()
    }
}
