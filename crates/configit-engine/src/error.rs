//! Engine errors.

use configit_core::{Coordinate, ParameterError};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Structural problems of an environment's config set. Any of these stops
/// the environment from being deployed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate config: {coordinate} is defined more than once")]
    DuplicateCoordinate { coordinate: Coordinate },

    #[error("undefined reference: {referrer} references {target}, which is not defined")]
    UndefinedReference {
        referrer: Coordinate,
        target: Coordinate,
    },

    #[error("self reference: {coordinate} references itself")]
    SelfReference { coordinate: Coordinate },

    #[error("dependency cycle detected: {}", join_coordinates(cycle))]
    Cycle { cycle: Vec<Coordinate> },

    #[error("configs could not be ordered: {}", join_coordinates(remaining))]
    Unsortable { remaining: Vec<Coordinate> },
}

fn join_coordinates(coordinates: &[Coordinate]) -> String {
    coordinates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Why a single config could not be deployed.
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error("failed to resolve parameter '{name}': {source}")]
    Parameter {
        name: String,
        source: ParameterError,
    },

    #[error("depends on skipped config {dependency}")]
    DependsOnSkipped { dependency: Coordinate },

    #[error("failed to render template: {0}")]
    Render(ParameterError),

    #[error("settings objects require a 'scope' parameter")]
    MissingScope,

    #[error("objects of this type are matched by name but the config has no 'name' parameter")]
    MissingName,

    #[error("{count} existing objects are named '{name}'")]
    Ambiguous { name: String, count: usize },

    #[error("platform call failed: {0}")]
    Remote(#[from] configit_core::Error),

    #[error("deployment was cancelled before the config was applied")]
    Cancelled,
}

impl Serialize for DeployError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_names_every_coordinate() {
        let a = Coordinate::new("p", "auto-tag", "a");
        let b = Coordinate::new("p", "auto-tag", "b");
        let err = GraphError::Cycle {
            cycle: vec![a.clone(), b.clone(), a],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle detected: p:auto-tag:a -> p:auto-tag:b -> p:auto-tag:a"
        );
    }

    #[test]
    fn test_undefined_reference_message() {
        let err = GraphError::UndefinedReference {
            referrer: Coordinate::new("p", "slo", "s1"),
            target: Coordinate::new("p", "management-zone", "gone"),
        };
        let msg = err.to_string();
        assert!(msg.contains("undefined reference"));
        assert!(msg.contains("p:slo:s1"));
        assert!(msg.contains("p:management-zone:gone"));
    }

    #[test]
    fn test_deploy_error_serializes_as_message() {
        let err = DeployError::Remote(configit_core::Error::Conflict("taken".to_string()));
        assert_eq!(
            serde_json::to_string(&err).unwrap(),
            "\"platform call failed: conflict: taken\""
        );
    }
}
