//! Coordinates and references between configuration objects.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// Separates project, type and id in the string form of a coordinate.
///
/// Only config types may contain it.
pub const SEPARATOR: char = ':';

/// Prefix of every external identifier derived from a coordinate.
pub const EXTERNAL_ID_PREFIX: &str = "configit-";

/// The property name under which the remote identifier of a config is resolved.
pub const ID_PROPERTY: &str = "id";

/// Unique key of a config within a run: `(project, type, id)`.
///
/// Coordinates order by their string form `project:type:id` so that every
/// sorted view of a config set is reproducible. Equal string forms fall back
/// to field order, so only equal coordinates compare `Equal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub project: String,
    pub config_type: String,
    pub config_id: String,
}

impl Coordinate {
    pub fn new(
        project: impl Into<String>,
        config_type: impl Into<String>,
        config_id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            config_type: config_type.into(),
            config_id: config_id.into(),
        }
    }

    /// Reference to a property of the config at this coordinate.
    pub fn property(&self, property: impl Into<String>) -> Reference {
        Reference::new(self.clone(), property)
    }

    /// Stable identifier derived from the coordinate.
    ///
    /// Used to find an object this tool created earlier when no origin
    /// object id is known.
    pub fn external_id(&self) -> String {
        let digest = Sha256::digest(self.to_string().as_bytes());
        format!("{EXTERNAL_ID_PREFIX}{}", hex::encode(digest))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.project, self.config_type, self.config_id)
    }
}

impl Ord for Coordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_string().cmp(&other.to_string()).then_with(|| {
            (&self.project, &self.config_type, &self.config_id).cmp(&(
                &other.project,
                &other.config_type,
                &other.config_id,
            ))
        })
    }
}

impl PartialOrd for Coordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Error returned when a coordinate string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinate '{0}': expected project:type:id")]
pub struct ParseCoordinateError(pub String);

impl std::str::FromStr for Coordinate {
    type Err = ParseCoordinateError;

    /// Parses `project:type:id`. The type may itself contain `:`
    /// (settings schemas such as `builtin:alerting.profile`), so the project
    /// ends at the first separator and the id starts after the last one.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || ParseCoordinateError(s.to_string());
        let (project, rest) = s.split_once(SEPARATOR).ok_or_else(err)?;
        let (config_type, config_id) = rest.rsplit_once(SEPARATOR).ok_or_else(err)?;
        if project.is_empty() || config_type.is_empty() || config_id.is_empty() {
            return Err(err());
        }
        Ok(Self::new(project, config_type, config_id))
    }
}

/// A pointer to the resolved value of `property` on the config at `coordinate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    pub coordinate: Coordinate,
    pub property: String,
}

impl Reference {
    pub fn new(coordinate: Coordinate, property: impl Into<String>) -> Self {
        Self {
            coordinate,
            property: property.into(),
        }
    }

    /// Whether this reference points at the remote identifier.
    pub fn is_id(&self) -> bool {
        self.property == ID_PROPERTY
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.coordinate, self.property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let coord = Coordinate::new("infra", "management-zone", "mz1");
        assert_eq!(coord.to_string(), "infra:management-zone:mz1");
        assert_eq!("infra:management-zone:mz1".parse::<Coordinate>().unwrap(), coord);
    }

    #[test]
    fn test_parse_settings_type() {
        let coord: Coordinate = "infra:builtin:alerting.profile:p1".parse().unwrap();
        assert_eq!(coord.project, "infra");
        assert_eq!(coord.config_type, "builtin:alerting.profile");
        assert_eq!(coord.config_id, "p1");
    }

    #[test]
    fn test_parse_rejects_incomplete() {
        assert!("infra:mz1".parse::<Coordinate>().is_err());
        assert!("infra".parse::<Coordinate>().is_err());
        assert!(":type:id".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_ordering_follows_string_form() {
        // Tuple ordering would put "a" before "a-b"; the string form does not.
        let short = Coordinate::new("a", "t", "x");
        let dashed = Coordinate::new("a-b", "t", "x");
        assert!(dashed < short);
        assert_eq!(
            dashed.to_string().cmp(&short.to_string()),
            dashed.cmp(&short)
        );
    }

    #[test]
    fn test_same_string_form_is_not_equal() {
        let id_with_colon = Coordinate::new("p", "auto-tag", "x:y");
        let type_with_colon = Coordinate::new("p", "auto-tag:x", "y");
        assert_eq!(id_with_colon.to_string(), type_with_colon.to_string());
        assert_ne!(id_with_colon.cmp(&type_with_colon), Ordering::Equal);
        assert_eq!(
            id_with_colon.cmp(&type_with_colon),
            type_with_colon.cmp(&id_with_colon).reverse()
        );

        let set = std::collections::BTreeSet::from([id_with_colon, type_with_colon]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_external_id_is_stable() {
        let a = Coordinate::new("p", "dashboard", "d1");
        let b = Coordinate::new("p", "dashboard", "d1");
        let c = Coordinate::new("p", "dashboard", "d2");
        assert_eq!(a.external_id(), b.external_id());
        assert_ne!(a.external_id(), c.external_id());
        assert!(a.external_id().starts_with(EXTERNAL_ID_PREFIX));
    }
}
