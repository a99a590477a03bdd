//! Capabilities borrowed from the home-automation host.
//!
//! The assistant never owns entities, services or persisted state. It talks to
//! the host through these traits; `memory` provides standalone implementations
//! used by the CLI and the tests.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;

/// Current state of one host entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
}

/// Read access to the host's state machine and registries
pub trait EntityDirectory: Send + Sync {
    /// All entity states known to the host
    fn all_states(&self) -> Vec<EntityState>;

    /// Device owning the entity, if the entity is registered to one
    fn device_of(&self, entity_id: &str) -> Option<String>;

    /// Area (room) the device is assigned to
    fn area_of(&self, device_id: &str) -> Option<String>;
}

/// A single host service invocation, e.g. `light.turn_on`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: String,
    pub data: Map<String, Value>,
}

impl ServiceCall {
    pub fn new(domain: impl Into<String>, service: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data,
        }
    }
}

impl fmt::Display for ServiceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}

/// The host's service-call mechanism
#[async_trait]
pub trait ServiceDispatcher: Send + Sync {
    async fn call(&self, call: ServiceCall) -> Result<(), AppError>;
}

/// Last known state of an entity owned by this integration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoredState {
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// The host's state restoration mechanism
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn last_state(&self, unique_id: &str) -> Option<StoredState>;

    async fn write_state(&self, unique_id: &str, state: StoredState) -> Result<(), AppError>;
}

/// Resolves user ids carried in a conversation context
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Option<String>;
}

/// Host event bus
pub trait EventBus: Send + Sync {
    fn fire(&self, event_type: &str, data: Value);
}

/// Bundle of host capabilities handed to the agent at construction
#[derive(Clone)]
pub struct HostContext {
    pub entities: Arc<dyn EntityDirectory>,
    pub services: Arc<dyn ServiceDispatcher>,
    pub states: Arc<dyn StateStore>,
    pub users: Arc<dyn UserDirectory>,
    pub events: Arc<dyn EventBus>,
}
