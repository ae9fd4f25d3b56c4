//! Projects and config sets.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::coordinate::Coordinate;

/// Configs of one environment grouped by type name, in load order.
pub type ConfigsPerType = BTreeMap<String, Vec<Config>>;

/// Configs grouped by environment name, then by type name.
pub type ConfigSet = BTreeMap<String, ConfigsPerType>;

/// A named group of configs, instantiated for every environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub configs: ConfigSet,
}

impl Project {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            configs: ConfigSet::new(),
        }
    }

    /// Add a config under its environment and type.
    pub fn push(&mut self, config: Config) {
        self.configs
            .entry(config.environment.clone())
            .or_default()
            .entry(config.coordinate.config_type.clone())
            .or_default()
            .push(config);
    }

    /// All configs of one environment.
    pub fn configs_for(&self, environment: &str) -> impl Iterator<Item = &Config> {
        self.configs
            .get(environment)
            .into_iter()
            .flat_map(|per_type| per_type.values().flatten())
    }
}

/// Every environment any of the projects has configs for.
pub fn environments(projects: &[Project]) -> BTreeSet<String> {
    projects
        .iter()
        .flat_map(|p| p.configs.keys().cloned())
        .collect()
}

/// Collect the configs of one environment across all projects.
pub fn configs_for_environment(projects: &[Project], environment: &str) -> Vec<Config> {
    projects
        .iter()
        .flat_map(|p| p.configs_for(environment).cloned())
        .collect()
}

/// Coordinates that occur more than once, reported once per extra occurrence.
pub fn find_duplicate_coordinates<'a>(
    configs: impl IntoIterator<Item = &'a Config>,
) -> Vec<Coordinate> {
    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for config in configs {
        if !seen.insert(&config.coordinate) {
            duplicates.push(config.coordinate.clone());
        }
    }
    duplicates
}
