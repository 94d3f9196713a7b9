//! State Store - declared, typed states addressed by dotted ids
//!
//! The home-automation backend owns the real state tree. This module defines
//! the narrow contract the synchronization engine needs from it
//! ([`StateStore`]) and an in-memory implementation ([`MemoryStateStore`])
//! used by the replay binary and the tests.
//!
//! ## Write semantics
//!
//! - `ensure` declares a state (idempotent, re-declaring replaces the shape)
//! - `set_if_changed` writes an acknowledged value only when it differs
//! - `set_acknowledged` always writes an acknowledged value
//!
//! ```rust,no_run
//! use neomind_robovac::store::{MemoryStateStore, StateDeclaration, StateStore};
//!
//! # async fn demo() -> neomind_robovac::Result<()> {
//! let store = MemoryStateStore::new();
//! store.ensure("robovac.0.deviceStatus.battery", &StateDeclaration::number("battery")).await?;
//! store.set_acknowledged("robovac.0.deviceStatus.battery", 87.into()).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{Result, RobovacError};
use crate::profile::ValueTable;
use crate::value::{StateDataType, StateValue};

/// Default channel capacity for state change notifications.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Shape of a state: type, allowed values and access flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDeclaration {
    /// Human-readable name
    pub name: String,
    /// Declared value type
    pub data_type: StateDataType,
    /// Semantic role hint for UIs (value, level, button, switch, json)
    pub role: String,
    /// Unit of measurement
    #[serde(default)]
    pub unit: Option<String>,
    /// Allowed values (code -> label) for enumerated numeric states
    #[serde(default)]
    pub allowed_values: Option<ValueTable>,
    pub readable: bool,
    pub writable: bool,
}

impl StateDeclaration {
    /// Create a read-only declaration.
    pub fn new(name: impl Into<String>, data_type: StateDataType) -> Self {
        let role = match data_type {
            StateDataType::Json => "json",
            _ => "value",
        };
        Self {
            name: name.into(),
            data_type,
            role: role.to_string(),
            unit: None,
            allowed_values: None,
            readable: true,
            writable: false,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, StateDataType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, StateDataType::Boolean)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, StateDataType::String)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, StateDataType::Json)
    }

    /// Write-only trigger state.
    pub fn button(name: impl Into<String>) -> Self {
        Self {
            role: "button".to_string(),
            readable: false,
            writable: true,
            ..Self::boolean(name)
        }
    }

    /// Read-write boolean control.
    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            role: "switch".to_string(),
            writable: true,
            ..Self::boolean(name)
        }
    }

    pub fn with_states(mut self, table: ValueTable) -> Self {
        self.allowed_values = Some(table);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// Builds fully qualified state ids below a device prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    prefix: String,
}

impl StatePaths {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Id of a folder below the device prefix.
    pub fn folder(&self, folder: &str) -> String {
        format!("{}.{}", self.prefix, folder)
    }

    /// Id of a state inside a folder.
    pub fn state(&self, folder: &str, key: &str) -> String {
        format!("{}.{}.{}", self.prefix, folder, key)
    }

    /// Id of the editable command twin of a status property.
    pub fn command(&self, key: &str) -> String {
        format!(
            "{}.{}.set_{}",
            self.prefix,
            crate::config::folders::COMMANDS,
            key
        )
    }
}

/// Contract the engine needs from the state tree.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Declare a state. Safe to call repeatedly with the same shape.
    async fn ensure(&self, id: &str, declaration: &StateDeclaration) -> Result<()>;

    /// Write an acknowledged value if it differs from the current one.
    ///
    /// Returns `true` if a write happened.
    async fn set_if_changed(&self, id: &str, value: StateValue) -> Result<bool>;

    /// Write an acknowledged value unconditionally.
    async fn set_acknowledged(&self, id: &str, value: StateValue) -> Result<()>;

    /// Declare `folder_id.key` with a type inferred from the raw value and
    /// persist it. Used for properties without a value table.
    async fn persist_in_folder(&self, folder_id: &str, key: &str, value: &Value) -> Result<()> {
        let value = StateValue::from(value);
        let declaration = StateDeclaration::new(key, value.data_type());
        let id = format!("{folder_id}.{key}");
        self.ensure(&id, &declaration).await?;
        self.set_acknowledged(&id, value).await
    }
}

/// A stored state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateEntry {
    pub declaration: StateDeclaration,
    pub value: Option<StateValue>,
    /// Whether the current value was reported by the device
    pub ack: bool,
    /// Unix timestamp (ms) of the last write
    pub updated_at: i64,
}

/// Notification emitted for every write.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub id: String,
    pub value: StateValue,
    pub ack: bool,
    pub timestamp: i64,
}

/// In-memory state tree with change notifications.
pub struct MemoryStateStore {
    states: DashMap<String, StateEntry>,
    writes: AtomicU64,
    tx: broadcast::Sender<StateChange>,
}

impl MemoryStateStore {
    /// Create an empty store with default channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create an empty store buffering `capacity` change events for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            states: DashMap::new(),
            writes: AtomicU64::new(0),
            tx,
        }
    }

    /// Subscribe to state writes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<StateEntry> {
        self.states.get(id).map(|entry| entry.clone())
    }

    pub fn value(&self, id: &str) -> Option<StateValue> {
        self.states.get(id).and_then(|entry| entry.value.clone())
    }

    pub fn declaration(&self, id: &str) -> Option<StateDeclaration> {
        self.states.get(id).map(|entry| entry.declaration.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    /// Number of value writes performed so far (declarations do not count).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// All declared ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.states.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Current values as a sorted id -> JSON map.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.states
            .iter()
            .map(|e| {
                let value = e.value.as_ref().map_or(Value::Null, StateValue::to_json);
                (e.key().clone(), value)
            })
            .collect()
    }

    /// Write an unacknowledged value, as a UI edit would.
    pub fn set_pending(&self, id: &str, value: StateValue) -> Result<()> {
        self.write(id, value, false)
    }

    fn write(&self, id: &str, value: StateValue, ack: bool) -> Result<()> {
        let mut entry = self
            .states
            .get_mut(id)
            .ok_or_else(|| RobovacError::UndeclaredState(id.to_string()))?;

        if !entry.declaration.data_type.accepts(&value) {
            return Err(RobovacError::Store(format!(
                "{} expects {}, got {:?}",
                id, entry.declaration.data_type, value
            )));
        }

        let timestamp = chrono::Utc::now().timestamp_millis();
        entry.value = Some(value.clone());
        entry.ack = ack;
        entry.updated_at = timestamp;
        drop(entry);

        self.writes.fetch_add(1, Ordering::Relaxed);
        // No subscribers is fine
        let _ = self.tx.send(StateChange {
            id: id.to_string(),
            value,
            ack,
            timestamp,
        });
        Ok(())
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn ensure(&self, id: &str, declaration: &StateDeclaration) -> Result<()> {
        match self.states.get_mut(id) {
            Some(mut entry) => {
                if entry.declaration != *declaration {
                    entry.declaration = declaration.clone();
                }
            }
            None => {
                self.states.insert(
                    id.to_string(),
                    StateEntry {
                        declaration: declaration.clone(),
                        value: None,
                        ack: false,
                        updated_at: 0,
                    },
                );
            }
        }
        Ok(())
    }

    async fn set_if_changed(&self, id: &str, value: StateValue) -> Result<bool> {
        let unchanged = self
            .states
            .get(id)
            .map(|entry| entry.ack && entry.value.as_ref() == Some(&value))
            .unwrap_or(false);
        if unchanged {
            return Ok(false);
        }
        self.write(id, value, true)?;
        Ok(true)
    }

    async fn set_acknowledged(&self, id: &str, value: StateValue) -> Result<()> {
        self.write(id, value, true)
    }
}
