//! Status Dispatcher - routes one status payload to per-property handlers
//!
//! A payload is a flat JSON object of protocol property names to raw values.
//! Each key is classified into a [`StatusProperty`]; table-driven properties
//! are declared with the profile's code -> label table and written only when
//! they change, user-adjustable ones are mirrored into their command twin,
//! and everything else is persisted as-is under `deviceStatus`.
//!
//! ## Order
//!
//! 1. `dss` is removed and decoded first; it never reaches a property handler
//! 2. remaining keys are handled concurrently as one task group
//! 3. the clean-motor-mode preset is resolved once all handlers succeeded

use serde_json::{Map, Value};

use crate::config::folders;
use crate::docking::apply_docking_status;
use crate::error::Result;
use crate::profile::ValueTable;
use crate::session::RobovacSession;
use crate::store::StateDeclaration;
use crate::task_group::TaskGroup;
use crate::value::{json_code, StateValue};

/// Flat property name -> raw value map delivered by the transport.
pub type StatusPayload = Map<String, Value>;

/// Protocol key of the packed docking-station status word.
pub const DOCKING_STATION_KEY: &str = "dss";

/// Known status properties.
///
/// The docking-station word is not a property: [`RobovacSession::process_status`]
/// removes and decodes it before any key is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusProperty {
    State,
    ErrorCode,
    FanPower,
    MopMode,
    WaterBoxMode,
    DockType,
    MapStatus,
    DistanceOff,
    /// Any key without a dedicated handler
    Other(String),
}

impl StatusProperty {
    pub fn classify(key: &str) -> Self {
        match key {
            "state" => Self::State,
            "error_code" => Self::ErrorCode,
            "fan_power" => Self::FanPower,
            "mop_mode" => Self::MopMode,
            "water_box_mode" => Self::WaterBoxMode,
            "dock_type" => Self::DockType,
            "map_status" => Self::MapStatus,
            "distance_off" => Self::DistanceOff,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::State => "state",
            Self::ErrorCode => "error_code",
            Self::FanPower => "fan_power",
            Self::MopMode => "mop_mode",
            Self::WaterBoxMode => "water_box_mode",
            Self::DockType => "dock_type",
            Self::MapStatus => "map_status",
            Self::DistanceOff => "distance_off",
            Self::Other(key) => key,
        }
    }
}

/// Values needed to resolve a clean-motor-mode preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct MotorModeInputs {
    fan_power: Option<i64>,
    mop_mode: Option<i64>,
    water_box_mode: Option<i64>,
}

impl MotorModeInputs {
    fn from_payload(payload: &StatusPayload) -> Self {
        let code = |key: &str| payload.get(key).and_then(json_code);
        Self {
            fan_power: code("fan_power"),
            mop_mode: code("mop_mode"),
            water_box_mode: code("water_box_mode"),
        }
    }
}

impl RobovacSession {
    /// Persist one status payload.
    ///
    /// Per-key handlers run concurrently. If any fails, the first error is
    /// returned and writes made by the other handlers remain in place.
    pub async fn process_status(&self, mut payload: StatusPayload) -> Result<()> {
        if let Some(word) = payload.remove(DOCKING_STATION_KEY) {
            apply_docking_status(&word, self.store.as_ref(), &self.paths).await?;
        }

        let motor_mode = MotorModeInputs::from_payload(&payload);

        let mut group = TaskGroup::new("status");
        for (key, value) in payload {
            let property = StatusProperty::classify(&key);
            group.spawn(key, self.handle_property(property, value));
        }
        tracing::debug!(device_id = %self.config.device_id, properties = group.len(), "Processing status");
        group.join().await?;

        self.apply_clean_motor_mode(motor_mode).await
    }

    async fn handle_property(&self, property: StatusProperty, value: Value) -> Result<()> {
        match &property {
            StatusProperty::State => {
                let table = self.profile.state_table();
                self.persist_mapped(property.key(), &value, table, false).await
            }
            StatusProperty::ErrorCode => {
                let table = self.profile.error_table();
                self.persist_mapped(property.key(), &value, table, false).await
            }
            StatusProperty::FanPower => {
                let table = &self.profile.fan_power;
                self.persist_mapped(property.key(), &value, table, true).await
            }
            StatusProperty::MopMode => match &self.profile.mop_mode {
                Some(table) => self.persist_mapped(property.key(), &value, table, true).await,
                None => {
                    tracing::trace!(key = property.key(), "Profile has no table, skipping");
                    Ok(())
                }
            },
            StatusProperty::WaterBoxMode => match &self.profile.water_box_mode {
                Some(table) => self.persist_mapped(property.key(), &value, table, true).await,
                None => {
                    tracing::trace!(key = property.key(), "Profile has no table, skipping");
                    Ok(())
                }
            },
            StatusProperty::DockType => {
                self.persist_generic(property.key(), &value).await?;
                match json_code(&value) {
                    Some(code) => self.process_dock_type(code).await,
                    None => Ok(()),
                }
            }
            StatusProperty::MapStatus => {
                self.persist_generic(property.key(), &value).await?;
                match json_code(&value) {
                    Some(map_status) => self.apply_map_index(map_status >> 2).await,
                    None => Ok(()),
                }
            }
            StatusProperty::DistanceOff if self.profile.features.distance_off => {
                self.persist_distance_off(&value).await
            }
            StatusProperty::DistanceOff | StatusProperty::Other(_) => {
                self.persist_generic(property.key(), &value).await
            }
        }
    }

    /// Declare `deviceStatus.<key>` with `table`, write if changed and
    /// optionally mirror into the command twin.
    async fn persist_mapped(
        &self,
        key: &str,
        value: &Value,
        table: &ValueTable,
        mirror: bool,
    ) -> Result<()> {
        let Some(code) = json_code(value) else {
            tracing::warn!(key, value = %value, "Ignoring non-numeric value for mapped property");
            return Ok(());
        };
        if !table.contains_key(&code) {
            tracing::debug!(key, code, "Code not in value table");
        }

        let id = self.paths.state(folders::DEVICE_STATUS, key);
        let declaration = StateDeclaration::number(key).with_states(table.clone());
        self.store.ensure(&id, &declaration).await?;
        self.store.set_if_changed(&id, StateValue::Integer(code)).await?;

        if mirror {
            let command = StateDeclaration::number(key)
                .with_role("level")
                .with_states(table.clone())
                .writable();
            self.mirror_command(key, &command, StateValue::Integer(code))
                .await?;
        }
        Ok(())
    }

    /// Overwrite the command twin with the device-reported value.
    async fn mirror_command(
        &self,
        key: &str,
        declaration: &StateDeclaration,
        value: StateValue,
    ) -> Result<()> {
        let id = self.paths.command(key);
        self.store.ensure(&id, declaration).await?;
        self.store.set_acknowledged(&id, value).await
    }

    async fn persist_generic(&self, key: &str, value: &Value) -> Result<()> {
        let folder = self.paths.folder(folders::DEVICE_STATUS);
        self.store.persist_in_folder(&folder, key, value).await
    }

    async fn persist_distance_off(&self, value: &Value) -> Result<()> {
        let key = StatusProperty::DistanceOff.key();
        let Some(distance) = json_code(value) else {
            tracing::warn!(key, value = %value, "Ignoring non-numeric value for mapped property");
            return Ok(());
        };
        let id = self.paths.state(folders::DEVICE_STATUS, key);
        let declaration = StateDeclaration::number(key).with_unit("cm");
        self.store.ensure(&id, &declaration).await?;
        self.store.set_if_changed(&id, StateValue::Integer(distance)).await?;

        let command = StateDeclaration::number(key)
            .with_unit("cm")
            .with_role("level")
            .writable();
        self.mirror_command(key, &command, StateValue::Integer(distance))
            .await
    }

    async fn apply_map_index(&self, index: i64) -> Result<()> {
        if !self.maps.update_current_map_index(index).await? {
            return Ok(());
        }
        tracing::info!(device_id = %self.config.device_id, index, "Current map changed");

        let id = self.paths.state(folders::MAP, "current_index");
        self.store
            .ensure(&id, &StateDeclaration::number("Current map index"))
            .await?;
        self.store.set_if_changed(&id, StateValue::Integer(index)).await?;
        self.maps.update_map().await
    }

    async fn apply_clean_motor_mode(&self, inputs: MotorModeInputs) -> Result<()> {
        let MotorModeInputs {
            fan_power: Some(fan_power),
            mop_mode: Some(mop_mode),
            water_box_mode: Some(water_box_mode),
        } = inputs
        else {
            return Ok(());
        };
        let Some((preset, label)) =
            self.profile
                .match_clean_motor_mode(fan_power, mop_mode, water_box_mode)
        else {
            return Ok(());
        };

        let key = "clean_motor_mode";
        let id = self.paths.state(folders::DEVICE_STATUS, key);
        self.store
            .ensure(&id, &StateDeclaration::string(key))
            .await?;
        self.store.set_if_changed(&id, StateValue::from(label)).await?;

        let command = StateDeclaration::string(key).writable();
        self.mirror_command(key, &command, StateValue::from(preset))
            .await
    }
}
