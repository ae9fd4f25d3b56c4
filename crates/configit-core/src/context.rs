//! Values resolved while deploying one environment.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::coordinate::{Coordinate, Reference};

/// What a successfully applied config contributes to later references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub coordinate: Coordinate,
    /// Identifier the platform assigned (or already had) for the object.
    pub remote_id: String,
    /// Resolved parameter values by parameter name.
    pub properties: BTreeMap<String, Value>,
}

impl ResolvedEntity {
    pub fn new(coordinate: Coordinate, remote_id: impl Into<String>) -> Self {
        Self {
            coordinate,
            remote_id: remote_id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }
}

/// Store of resolved values for one environment within one run.
///
/// Only entities of configs that were applied successfully are present.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    entities: BTreeMap<Coordinate, ResolvedEntity>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: ResolvedEntity) {
        self.entities.insert(entity.coordinate.clone(), entity);
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<&ResolvedEntity> {
        self.entities.get(coordinate)
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.entities.contains_key(coordinate)
    }

    /// Look up the value a reference points at.
    ///
    /// The `id` property yields the remote identifier unless the config
    /// declared a parameter named `id` itself.
    pub fn lookup(&self, reference: &Reference) -> Option<Value> {
        let entity = self.entities.get(&reference.coordinate)?;
        match entity.properties.get(&reference.property) {
            Some(value) => Some(value.clone()),
            None if reference.is_id() => Some(Value::String(entity.remote_id.clone())),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &ResolvedEntity> {
        self.entities.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_id_and_properties() {
        let coord = Coordinate::new("p", "management-zone", "mz1");
        let mut ctx = ResolutionContext::new();
        ctx.insert(
            ResolvedEntity::new(coord.clone(), "remote-42")
                .with_properties(BTreeMap::from([("name".to_string(), json!("Zone"))])),
        );

        assert_eq!(ctx.lookup(&coord.property("id")), Some(json!("remote-42")));
        assert_eq!(ctx.lookup(&coord.property("name")), Some(json!("Zone")));
        assert_eq!(ctx.lookup(&coord.property("missing")), None);
        assert!(ctx.contains(&coord));
    }

    #[test]
    fn test_lookup_unknown_coordinate() {
        let ctx = ResolutionContext::new();
        let reference = Coordinate::new("p", "t", "x").property("id");
        assert_eq!(ctx.lookup(&reference), None);
        assert!(ctx.is_empty());
    }
}
