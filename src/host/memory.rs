//! Standalone host adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    EntityDirectory, EntityState, EventBus, ServiceCall, ServiceDispatcher, StateStore, StoredState,
    UserDirectory,
};
use crate::error::AppError;

/// One entity in a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Entity snapshot file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(default)]
    pub entities: Vec<SnapshotEntity>,
    /// device id -> area id
    #[serde(default)]
    pub devices: HashMap<String, Option<String>>,
}

/// Entity directory backed by a fixed snapshot
#[derive(Debug, Default)]
pub struct StaticEntityDirectory {
    snapshot: Mutex<EntitySnapshot>,
}

impl StaticEntityDirectory {
    pub fn new(snapshot: EntitySnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
        let snapshot: EntitySnapshot = serde_json::from_str(&content)
            .map_err(|e| AppError::ConfigError(format!("Invalid snapshot {}: {}", path.display(), e)))?;
        Ok(Self::new(snapshot))
    }

    /// Change the state of an entity, adding it when unknown
    pub fn set_state(&self, entity_id: &str, state: &str) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        match snapshot.entities.iter_mut().find(|e| e.entity_id == entity_id) {
            Some(entity) => entity.state = state.to_string(),
            None => snapshot.entities.push(SnapshotEntity {
                entity_id: entity_id.to_string(),
                state: state.to_string(),
                device_id: None,
            }),
        }
    }
}

impl EntityDirectory for StaticEntityDirectory {
    fn all_states(&self) -> Vec<EntityState> {
        let snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        snapshot
            .entities
            .iter()
            .map(|e| EntityState {
                entity_id: e.entity_id.clone(),
                state: e.state.clone(),
            })
            .collect()
    }

    fn device_of(&self, entity_id: &str) -> Option<String> {
        let snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        snapshot
            .entities
            .iter()
            .find(|e| e.entity_id == entity_id)
            .and_then(|e| e.device_id.clone())
    }

    fn area_of(&self, device_id: &str) -> Option<String> {
        let snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        snapshot.devices.get(device_id).cloned().flatten()
    }
}

/// Dispatcher that logs and records calls without executing them
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<ServiceCall>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ServiceDispatcher for RecordingDispatcher {
    async fn call(&self, call: ServiceCall) -> Result<(), AppError> {
        let data = serde_json::Value::Object(call.data.clone());
        info!(service = %call, data = %data, "Service call");
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        Ok(())
    }
}

/// State store kept in memory and optionally mirrored to a JSON file
#[derive(Debug, Default)]
pub struct JsonStateStore {
    path: Option<PathBuf>,
    states: Mutex<HashMap<String, StoredState>>,
}

impl JsonStateStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store. A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let states = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable state file");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self {
            path: Some(path),
            states: Mutex::new(states),
        }
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn last_state(&self, unique_id: &str) -> Option<StoredState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(unique_id)
            .cloned()
    }

    async fn write_state(&self, unique_id: &str, state: StoredState) -> Result<(), AppError> {
        let serialized = {
            let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
            states.insert(unique_id.to_string(), state);
            match &self.path {
                Some(_) => Some(serde_json::to_string_pretty(&*states)?),
                None => None,
            }
        };

        if let (Some(path), Some(serialized)) = (&self.path, serialized) {
            tokio::fs::write(path, serialized)
                .await
                .map_err(|e| AppError::StateError(format!("Cannot write {}: {}", path.display(), e)))?;
            debug!(unique_id, path = %path.display(), "State persisted");
        }
        Ok(())
    }
}

/// User directory backed by a fixed map
#[derive(Debug, Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, String>,
}

impl StaticUserDirectory {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn display_name(&self, user_id: &str) -> Option<String> {
        self.users.get(user_id).cloned()
    }
}

/// Event bus that logs and records fired events
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<(String, Value)>>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl EventBus for RecordingEventBus {
    fn fire(&self, event_type: &str, data: Value) {
        debug!(event_type, %data, "Event fired");
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((event_type.to_string(), data));
    }
}
