//! In-memory platform.

use async_trait::async_trait;
use configit_core::client::{ApiClient, Payload, RemoteObject};
use configit_core::{ConfigType, Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

/// An object held by the in-memory platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub remote: RemoteObject,
    pub scope: Option<String>,
    pub content: String,
}

#[derive(Debug, Default)]
struct Store {
    /// Objects per type name.
    objects: BTreeMap<String, Vec<StoredObject>>,
    creates: usize,
    updates: usize,
    deletes: usize,
}

/// Platform that keeps every object in memory.
///
/// Behaves like the real platform for listing and matching: created objects
/// carry the name and external id they were created with, and updating or
/// deleting an unknown id fails with [`Error::NotFound`].
#[derive(Debug, Default)]
pub struct InMemoryClient {
    store: Mutex<Store>,
    /// Payload names that are rejected on create and update.
    rejected_names: BTreeSet<String>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject creates and updates of objects with the given name.
    pub fn rejecting(mut self, name: impl Into<String>) -> Self {
        self.rejected_names.insert(name.into());
        self
    }

    /// Add an existing object, returning its id.
    pub fn seed(&self, config_type: &ConfigType, remote: RemoteObject) -> String {
        let id = remote.id.clone();
        self.lock()
            .objects
            .entry(config_type.type_name().to_string())
            .or_default()
            .push(StoredObject {
                remote,
                scope: None,
                content: String::new(),
            });
        id
    }

    /// Objects of a type currently held.
    pub fn objects(&self, config_type: &ConfigType) -> Vec<StoredObject> {
        self.lock()
            .objects
            .get(config_type.type_name())
            .cloned()
            .unwrap_or_default()
    }

    pub fn create_count(&self) -> usize {
        self.lock().creates
    }

    pub fn update_count(&self) -> usize {
        self.lock().updates
    }

    pub fn delete_count(&self) -> usize {
        self.lock().deletes
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // The store holds plain data, a panic elsewhere cannot leave it torn.
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_rejected(&self, payload: &Payload) -> Result<()> {
        match &payload.name {
            Some(name) if self.rejected_names.contains(name) => Err(Error::InvalidInput(format!(
                "object '{name}' was rejected by the platform"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ApiClient for InMemoryClient {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn list_existing(&self, config_type: &ConfigType) -> Result<Vec<RemoteObject>> {
        Ok(self
            .objects(config_type)
            .into_iter()
            .map(|object| object.remote)
            .collect())
    }

    async fn create(&self, config_type: &ConfigType, payload: &Payload) -> Result<String> {
        self.check_rejected(payload)?;

        let id = Uuid::now_v7().to_string();
        let mut store = self.lock();
        store
            .objects
            .entry(config_type.type_name().to_string())
            .or_default()
            .push(StoredObject {
                remote: RemoteObject {
                    id: id.clone(),
                    name: payload.name.clone(),
                    external_id: Some(payload.external_id.clone()),
                },
                scope: payload.scope.clone(),
                content: payload.content.clone(),
            });
        store.creates += 1;
        debug!(%config_type, %id, coordinate = %payload.coordinate, "Created object");
        Ok(id)
    }

    async fn update(&self, config_type: &ConfigType, id: &str, payload: &Payload) -> Result<()> {
        self.check_rejected(payload)?;

        let mut store = self.lock();
        let object = store
            .objects
            .get_mut(config_type.type_name())
            .and_then(|objects| objects.iter_mut().find(|o| o.remote.id == id))
            .ok_or_else(|| Error::NotFound(format!("{config_type} object {id}")))?;

        if payload.name.is_some() {
            object.remote.name = payload.name.clone();
        }
        object.remote.external_id = Some(payload.external_id.clone());
        object.scope = payload.scope.clone();
        object.content = payload.content.clone();
        store.updates += 1;
        debug!(%config_type, %id, "Updated object");
        Ok(())
    }

    async fn delete(&self, config_type: &ConfigType, id: &str) -> Result<()> {
        let mut store = self.lock();
        let objects = store
            .objects
            .get_mut(config_type.type_name())
            .ok_or_else(|| Error::NotFound(format!("{config_type} object {id}")))?;
        let before = objects.len();
        objects.retain(|o| o.remote.id != id);
        if objects.len() == before {
            return Err(Error::NotFound(format!("{config_type} object {id}")));
        }
        store.deletes += 1;
        debug!(%config_type, %id, "Deleted object");
        Ok(())
    }
}
