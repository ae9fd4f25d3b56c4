//! Platform client trait.
//!
//! Clients talk to the remote management platform. The engine only needs to
//! list, create, update and delete objects of a config type; transport,
//! authentication and retries are the client's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;
use crate::config::{ConfigKind, ConfigType};
use crate::coordinate::Coordinate;

/// An object as it exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Identifier assigned by the platform.
    pub id: String,
    /// Display name, for types that have one.
    pub name: Option<String>,
    /// External identifier, if the object was created with one.
    pub external_id: Option<String>,
}

/// Everything a client needs to create or update one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub coordinate: Coordinate,
    pub name: Option<String>,
    pub external_id: String,
    /// Scope of a settings object.
    pub scope: Option<String>,
    /// Rendered template.
    pub content: String,
}

/// Trait for platform clients.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Name of this client.
    fn name(&self) -> &'static str;

    /// List the objects of a type that currently exist.
    async fn list_existing(&self, config_type: &ConfigType) -> Result<Vec<RemoteObject>>;

    /// Create an object, returning the identifier the platform assigned.
    async fn create(&self, config_type: &ConfigType, payload: &Payload) -> Result<String>;

    /// Replace the object with the given identifier.
    async fn update(&self, config_type: &ConfigType, id: &str, payload: &Payload) -> Result<()>;

    /// Delete the object with the given identifier.
    async fn delete(&self, config_type: &ConfigType, id: &str) -> Result<()>;
}

/// One client per config kind.
#[derive(Clone)]
pub struct ClientSet {
    classic: Arc<dyn ApiClient>,
    settings: Arc<dyn ApiClient>,
    automation: Arc<dyn ApiClient>,
    bucket: Arc<dyn ApiClient>,
}

impl ClientSet {
    /// Use the same client for every kind.
    pub fn uniform(client: Arc<dyn ApiClient>) -> Self {
        Self {
            classic: client.clone(),
            settings: client.clone(),
            automation: client.clone(),
            bucket: client,
        }
    }

    /// Replace the client for one kind.
    pub fn with_client(mut self, kind: ConfigKind, client: Arc<dyn ApiClient>) -> Self {
        match kind {
            ConfigKind::ClassicApi => self.classic = client,
            ConfigKind::Settings => self.settings = client,
            ConfigKind::Automation => self.automation = client,
            ConfigKind::Bucket => self.bucket = client,
        }
        self
    }

    pub fn client_for(&self, config_type: &ConfigType) -> &Arc<dyn ApiClient> {
        match config_type.kind() {
            ConfigKind::ClassicApi => &self.classic,
            ConfigKind::Settings => &self.settings,
            ConfigKind::Automation => &self.automation,
            ConfigKind::Bucket => &self.bucket,
        }
    }
}

impl std::fmt::Debug for ClientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSet")
            .field("classic", &self.classic.name())
            .field("settings", &self.settings.name())
            .field("automation", &self.automation.name())
            .field("bucket", &self.bucket.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedClient(&'static str);

    #[async_trait]
    impl ApiClient for NamedClient {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn list_existing(&self, _config_type: &ConfigType) -> Result<Vec<RemoteObject>> {
            Ok(vec![])
        }

        async fn create(&self, _config_type: &ConfigType, _payload: &Payload) -> Result<String> {
            Ok(self.0.to_string())
        }

        async fn update(
            &self,
            _config_type: &ConfigType,
            _id: &str,
            _payload: &Payload,
        ) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _config_type: &ConfigType, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_client_for_kind() {
        let clients = ClientSet::uniform(Arc::new(NamedClient("default")))
            .with_client(ConfigKind::Settings, Arc::new(NamedClient("settings")));

        let settings = ConfigType::from_type_name("builtin:tagging.auto").unwrap();
        let classic = ConfigType::from_type_name("auto-tag").unwrap();
        assert_eq!(clients.client_for(&settings).name(), "settings");
        assert_eq!(clients.client_for(&classic).name(), "default");
        assert_eq!(clients.client_for(&ConfigType::Bucket).name(), "default");
    }
}
