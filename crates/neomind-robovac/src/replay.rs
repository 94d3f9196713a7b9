//! File-backed collaborators for replaying a recorded device.
//!
//! A replay file captures what the robot answered during one session:
//!
//! ```json
//! {
//!   "config": { "device_id": "r1", "model": "roborock.vacuum.s5" },
//!   "status": { "state": 8, "battery": 100 },
//!   "payloads": [ { "state": 5, "fan_power": 102 } ],
//!   "firmware_features": [111, 125],
//!   "network": { "ip": "10.0.0.7" },
//!   "timers": []
//! }
//! ```
//!
//! [`ReplayDevice`] answers transport requests from the file and stands in
//! for the map and consumable subsystems, logging every call it receives.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::services::{ConsumableService, DeviceTimer, DeviceTransport, MapService};
use crate::status::StatusPayload;

/// Recorded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFile {
    pub config: SessionConfig,
    /// Answer to `get_status` during initialization
    #[serde(default)]
    pub status: StatusPayload,
    /// Payloads pushed after initialization, in order
    #[serde(default)]
    pub payloads: Vec<StatusPayload>,
    #[serde(default)]
    pub firmware_features: Vec<i64>,
    #[serde(default)]
    pub network: Map<String, Value>,
    #[serde(default)]
    pub timers: Vec<DeviceTimer>,
}

impl ReplayFile {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(json)?;
        file.config.validate()?;
        Ok(file)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading replay file");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Transport, map and consumable collaborator backed by a [`ReplayFile`].
#[derive(Debug)]
pub struct ReplayDevice {
    status: StatusPayload,
    firmware_features: Vec<i64>,
    network: Map<String, Value>,
    timers: Vec<DeviceTimer>,
    current_index: AtomicI64,
    calls: Mutex<Vec<String>>,
}

impl ReplayDevice {
    pub fn new(file: &ReplayFile) -> Self {
        Self {
            status: file.status.clone(),
            firmware_features: file.firmware_features.clone(),
            network: file.network.clone(),
            timers: file.timers.clone(),
            current_index: AtomicI64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Names of the collaborator calls received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: &str) {
        tracing::debug!(call, "Replay call");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.to_string());
        }
    }
}

#[async_trait]
impl DeviceTransport for ReplayDevice {
    async fn get_status(&self) -> Result<StatusPayload> {
        self.record("get_status");
        Ok(self.status.clone())
    }

    async fn get_firmware_features(&self) -> Result<Vec<i64>> {
        self.record("get_firmware_features");
        Ok(self.firmware_features.clone())
    }

    async fn get_network_info(&self) -> Result<Map<String, Value>> {
        self.record("get_network_info");
        Ok(self.network.clone())
    }

    async fn get_timers(&self) -> Result<Vec<DeviceTimer>> {
        self.record("get_timers");
        Ok(self.timers.clone())
    }
}

#[async_trait]
impl MapService for ReplayDevice {
    async fn update_multi_maps_list(&self) -> Result<()> {
        self.record("update_multi_maps_list");
        Ok(())
    }

    async fn update_map(&self) -> Result<()> {
        self.record("update_map");
        Ok(())
    }

    async fn update_room_mapping(&self) -> Result<()> {
        self.record("update_room_mapping");
        Ok(())
    }

    async fn update_current_map_index(&self, index: i64) -> Result<bool> {
        self.record("update_current_map_index");
        Ok(self.current_index.swap(index, Ordering::SeqCst) != index)
    }

    fn current_index(&self) -> i64 {
        self.current_index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsumableService for ReplayDevice {
    async fn update_consumables(&self) -> Result<()> {
        self.record("update_consumables");
        Ok(())
    }

    async fn update_consumables_percent(&self) -> Result<()> {
        self.record("update_consumables_percent");
        Ok(())
    }
}
