//! Client registry for resolving a drive API by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use drivekit_common::{Error, Result};

use crate::config::{create_graph_client, create_onedrive_client};
use crate::options::DriveApi;
use crate::provider::DriveClient;

/// Factory function type for creating clients.
pub type ClientFactory = Box<dyn Fn(Value) -> Result<Arc<dyn DriveClient>> + Send + Sync>;

/// Registry of drive client factories.
///
/// Resolves a client by API name and JSON configuration.
pub struct ClientRegistry {
    factories: HashMap<String, ClientFactory>,
}

impl ClientRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a client factory.
    ///
    /// # Postconditions
    /// - On success, [`resolve`](Self::resolve) finds `name`
    /// - On failure, the existing factory is kept
    ///
    /// # Errors
    /// - `AlreadyExists` if `name` is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: ClientFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Client '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Build a client by name from `config`.
    ///
    /// # Preconditions
    /// - `config` is in the shape the named factory expects
    ///   (a [`DriveConfig`](crate::config::DriveConfig) for the built-in APIs)
    ///
    /// # Errors
    /// - `NotFound` for an unknown name
    /// - Whatever the factory reports for an invalid configuration
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn DriveClient>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Client '{}' is not registered", name)))?;
        factory(config)
    }

    /// Names of the registered clients, sorted.
    pub fn clients(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_client(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with both drive APIs.
pub fn create_default_registry() -> ClientRegistry {
    let mut registry = ClientRegistry::new();
    registry.factories.insert(
        DriveApi::OneDrive.name().to_string(),
        Box::new(create_onedrive_client),
    );
    registry.factories.insert(
        DriveApi::Graph.name().to_string(),
        Box::new(create_graph_client),
    );
    registry
}
