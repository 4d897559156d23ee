//! Plugin-based backend registry
//!
//! The registry allows remote backends to be registered dynamically at
//! runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use achsync_core::ClientRegistry;
//!
//! let registry = ClientRegistry::new();
//! achsync_retroachievements::register(&registry);
//!
//! let client = registry.create_client(&config.remote)?;
//! ```

use crate::client::{RemoteClientFactory, RemoteSyncClient};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of remote backend factories keyed by type name
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Box<dyn RemoteClientFactory>>>,
}

impl ClientRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory
    ///
    /// # Parameters
    ///
    /// - `name`: Backend type name (e.g., "retroachievements")
    /// - `factory`: Factory object for creating client instances
    pub fn register_client(&self, name: impl Into<String>, factory: Box<dyn RemoteClientFactory>) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(name.into(), factory);
    }

    /// Create a backend from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn RemoteSyncClient>)`: Created client instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_client(&self, config: &RemoteConfig) -> Result<Box<dyn RemoteSyncClient>> {
        let client_type = config.type_name();
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);

        let factory = clients
            .get(client_type)
            .ok_or_else(|| Error::config(format!("Unknown backend type: {}", client_type)))?;

        factory.create(config)
    }

    /// List all registered backend types
    pub fn list_clients(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.keys().cloned().collect()
    }

    /// Check if a backend type is registered
    pub fn has_client(&self, name: &str) -> bool {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.contains_key(name)
    }
}
