//! Collaborator interfaces consumed by a device session.
//!
//! The map, consumable and transport subsystems are implemented elsewhere;
//! a session only needs the narrow async contracts below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::status::StatusPayload;

/// Multi-floor maps, map images and room mapping.
#[async_trait]
pub trait MapService: Send + Sync {
    /// Reload the list of saved floors/maps.
    async fn update_multi_maps_list(&self) -> Result<()>;

    /// Fetch and store the current map image.
    async fn update_map(&self) -> Result<()>;

    /// Synchronize room names with the current floor.
    async fn update_room_mapping(&self) -> Result<()>;

    /// Record the floor the robot reports. Returns `true` if it changed.
    async fn update_current_map_index(&self, index: i64) -> Result<bool>;

    /// Index of the current floor.
    fn current_index(&self) -> i64;
}

/// Consumable usage tracking.
#[async_trait]
pub trait ConsumableService: Send + Sync {
    /// Fetch raw consumable counters from the device.
    async fn update_consumables(&self) -> Result<()>;

    /// Derive remaining-life percentages from the last counters.
    async fn update_consumables_percent(&self) -> Result<()>;
}

/// A scheduled cleaning job stored on the robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTimer {
    pub id: String,
    /// Cron expression as reported by the device
    pub cron: String,
    pub enabled: bool,
}

/// Request/response access to the robot.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Current status snapshot.
    async fn get_status(&self) -> Result<StatusPayload>;

    /// Numeric ids of the firmware features the robot advertises.
    async fn get_firmware_features(&self) -> Result<Vec<i64>>;

    /// Flat network information (ip, ssid, rssi, ...).
    async fn get_network_info(&self) -> Result<Map<String, Value>>;

    /// Scheduled cleaning jobs.
    async fn get_timers(&self) -> Result<Vec<DeviceTimer>>;
}
