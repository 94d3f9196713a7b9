//! Session configuration and shared constants.
//!
//! Constants for folder names and environment variables live here so the
//! session, the replay binary and the tests agree on them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, RobovacError};
use crate::features::Feature;

/// Folder names below a device prefix.
pub mod folders {
    pub const DEVICE_STATUS: &str = "deviceStatus";
    pub const COMMANDS: &str = "commands";
    pub const DOCKING_STATION: &str = "dockingStationStatus";
    pub const CONSUMABLES: &str = "consumables";
    pub const DEVICE_INFO: &str = "deviceInfo";
    pub const FIRMWARE: &str = "deviceInfo.firmware";
    pub const NETWORK: &str = "deviceInfo.network";
    pub const TIMERS: &str = "timers";
    pub const CLEANING_INFO: &str = "cleaningInfo";
    pub const MAP: &str = "map";
}

/// Default values.
pub mod defaults {
    /// Adapter namespace used when no prefix is configured
    pub const STATE_NAMESPACE: &str = "robovac.0";
    /// Model used when none is configured
    pub const MODEL: &str = "default";
}

/// Environment variable names
pub mod env_vars {
    /// Overrides the adapter namespace (e.g. `robovac.1`)
    pub const STATE_NAMESPACE: &str = "ROBOVAC_STATE_NAMESPACE";
    /// `true` switches the replay binary to JSON log output
    pub const LOG_JSON: &str = "ROBOVAC_LOG_JSON";

    /// Adapter namespace from the environment, or the default.
    pub fn state_namespace() -> String {
        std::env::var(STATE_NAMESPACE)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| super::defaults::STATE_NAMESPACE.to_string())
    }

    /// Whether JSON logging was requested.
    pub fn log_json() -> bool {
        std::env::var(LOG_JSON)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(false)
    }
}

/// Configuration of one device session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device identifier (DUID)
    pub device_id: String,

    /// Model identifier used to select the value-mapping profile
    #[serde(default = "default_model")]
    pub model: String,

    /// Capabilities known to exist regardless of runtime detection
    #[serde(default, deserialize_with = "deserialize_features")]
    pub features: Vec<Feature>,

    /// Prefix of all state ids; defaults to `<namespace>.Devices.<device_id>`
    #[serde(default)]
    pub state_prefix: Option<String>,
}

fn default_model() -> String {
    defaults::MODEL.to_string()
}

/// Unknown capability names are skipped, not rejected.
fn deserialize_features<'de, D>(deserializer: D) -> std::result::Result<Vec<Feature>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    let mut features = Vec::with_capacity(names.len());
    for name in names {
        match name.parse::<Feature>() {
            Ok(feature) if !features.contains(&feature) => features.push(feature),
            Ok(_) => {}
            Err(_) => tracing::warn!(feature = %name, "Ignoring unknown configured capability"),
        }
    }
    Ok(features)
}

impl SessionConfig {
    pub fn new(device_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            model: model.into(),
            features: Vec::new(),
            state_prefix: None,
        }
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        if !self.features.contains(&feature) {
            self.features.push(feature);
        }
        self
    }

    pub fn with_state_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.state_prefix = Some(prefix.into());
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Prefix under which this device's states live.
    pub fn resolved_prefix(&self) -> String {
        match &self.state_prefix {
            Some(prefix) => prefix.trim_end_matches('.').to_string(),
            None => format!("{}.Devices.{}", env_vars::state_namespace(), self.device_id),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_id.trim().is_empty() {
            return Err(RobovacError::Config("device_id must not be empty".to_string()));
        }
        if self.device_id.contains('.') {
            return Err(RobovacError::Config(format!(
                "device_id must not contain '.': {}",
                self.device_id
            )));
        }
        if self.model.trim().is_empty() {
            return Err(RobovacError::Config("model must not be empty".to_string()));
        }
        if let Some(prefix) = &self.state_prefix {
            if prefix.trim_end_matches('.').is_empty() {
                return Err(RobovacError::Config("state_prefix must not be empty".to_string()));
            }
        }
        Ok(())
    }
}
