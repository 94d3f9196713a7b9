//! Value-Mapping Profiles
//!
//! A profile holds the code -> label tables for one robot model together
//! with the model's optional capability flags. Profiles are plain data:
//! handlers in [`crate::status`] decide what to do with them.
//!
//! Built-in templates live in process-wide statics. A session never holds a
//! reference to a template: [`Profile::for_model`] and
//! [`Profile::default_template`] hand out an owned deep copy, so editing one
//! session's tables can never leak into another session or the template.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Code -> display label.
pub type ValueTable = BTreeMap<i64, String>;

/// Build a table from static pairs.
pub fn table(entries: &[(i64, &str)]) -> ValueTable {
    entries
        .iter()
        .map(|(code, label)| (*code, (*label).to_string()))
        .collect()
}

/// Capability flags consulted by status handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFeatures {
    /// Model exposes an adjustable obstacle distance-off control
    #[serde(default)]
    pub distance_off: bool,
}

/// Value-mapping tables and flags for one robot model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Model identifier this profile was built for
    pub model: String,
    pub fan_power: ValueTable,
    #[serde(default)]
    pub mop_mode: Option<ValueTable>,
    #[serde(default)]
    pub water_box_mode: Option<ValueTable>,
    #[serde(default)]
    pub error_code: Option<ValueTable>,
    #[serde(default)]
    pub state: Option<ValueTable>,
    #[serde(default)]
    pub features: ProfileFeatures,
    /// JSON-encoded `{fan_power, mop_mode, water_box_mode}` -> label
    #[serde(default)]
    pub clean_motor_mode_presets: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub consumable_life_hours: Option<BTreeMap<String, u32>>,
}

impl Profile {
    /// Owned copy of the default profile.
    pub fn default_template() -> Self {
        DEFAULT_PROFILE.clone()
    }

    /// Owned copy of the built-in profile for `model`, or of the default
    /// profile (renamed to `model`) when the model is unknown.
    pub fn for_model(model: &str) -> Self {
        match BUILTIN_PROFILES.get(model) {
            Some(profile) => profile.clone(),
            None => {
                tracing::debug!(model = %model, "No built-in profile, using default tables");
                Self {
                    model: model.to_string(),
                    ..Self::default_template()
                }
            }
        }
    }

    /// Parse a profile from JSON. Integer table keys may be quoted.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Operating-state table, falling back to the protocol default.
    pub fn state_table(&self) -> &ValueTable {
        self.state.as_ref().unwrap_or(&defaults::STATE_CODES)
    }

    /// Error-code table, falling back to the protocol default.
    pub fn error_table(&self) -> &ValueTable {
        self.error_code.as_ref().unwrap_or(&defaults::ERROR_CODES)
    }

    /// Consumable name -> rated life in hours.
    pub fn consumable_life_hours(&self) -> &BTreeMap<String, u32> {
        self.consumable_life_hours
            .as_ref()
            .unwrap_or(&defaults::CONSUMABLE_LIFE_HOURS)
    }

    /// Find the preset matching a fan/mop/water combination.
    ///
    /// Returns `(preset key, label)`. Preset keys that are not valid JSON
    /// objects never match.
    pub fn match_clean_motor_mode(
        &self,
        fan_power: i64,
        mop_mode: i64,
        water_box_mode: i64,
    ) -> Option<(&str, &str)> {
        let presets = self.clean_motor_mode_presets.as_ref()?;
        presets.iter().find_map(|(key, label)| {
            let parsed: Value = serde_json::from_str(key).ok()?;
            let field = |name: &str| parsed.get(name).and_then(Value::as_i64);
            let matches = field("fan_power") == Some(fan_power)
                && field("mop_mode") == Some(mop_mode)
                && field("water_box_mode") == Some(water_box_mode);
            matches.then_some((key.as_str(), label.as_str()))
        })
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::default_template()
    }
}

/// Models with a built-in profile.
pub fn builtin_models() -> Vec<&'static str> {
    let mut models: Vec<&'static str> = BUILTIN_PROFILES.keys().copied().collect();
    models.sort_unstable();
    models
}

/// Process-wide fallback tables.
pub mod defaults {
    use super::*;

    pub static STATE_CODES: Lazy<ValueTable> = Lazy::new(|| {
        table(&[
            (0, "Unknown"),
            (1, "Initiating"),
            (2, "Sleeping"),
            (3, "Idle"),
            (4, "Remote Control"),
            (5, "Cleaning"),
            (6, "Returning Dock"),
            (7, "Manual Mode"),
            (8, "Charging"),
            (9, "Charging Error"),
            (10, "Paused"),
            (11, "Spot Cleaning"),
            (12, "In Error"),
            (13, "Shutting Down"),
            (14, "Updating"),
            (15, "Docking"),
            (16, "Go To"),
            (17, "Zone Clean"),
            (18, "Room Clean"),
            (22, "Emptying dust container"),
            (23, "Washing the mop"),
            (26, "Going to wash the mop"),
            (28, "In call"),
            (29, "Mapping"),
            (100, "Fully Charged"),
        ])
    });

    pub static ERROR_CODES: Lazy<ValueTable> = Lazy::new(|| {
        table(&[
            (0, "No error"),
            (1, "Laser sensor fault"),
            (2, "Collision sensor fault"),
            (3, "Wheel floating"),
            (4, "Cliff sensor fault"),
            (5, "Main brush blocked"),
            (6, "Side brush blocked"),
            (7, "Wheel blocked"),
            (8, "Device stuck"),
            (9, "Dust bin missing"),
            (10, "Filter blocked"),
            (11, "Magnetic field detected"),
            (12, "Low battery"),
            (13, "Charging problem"),
            (14, "Battery failure"),
            (15, "Wall sensor fault"),
            (16, "Uneven surface"),
            (17, "Side brush failure"),
            (18, "Suction fan failure"),
            (19, "Unpowered charging station"),
            (20, "Unknown Error"),
            (21, "Laser pressure sensor problem"),
            (22, "Charge sensor problem"),
            (23, "Dock problem"),
            (24, "No-go zone or invisible wall detected"),
            (254, "Bin full"),
            (255, "Internal error"),
        ])
    });

    pub static FAN_POWER: Lazy<ValueTable> = Lazy::new(|| {
        table(&[
            (101, "Quiet"),
            (102, "Balanced"),
            (103, "Turbo"),
            (104, "Max"),
            (105, "Off"),
        ])
    });

    pub static CONSUMABLE_LIFE_HOURS: Lazy<BTreeMap<String, u32>> = Lazy::new(|| {
        [
            ("main_brush_work_time", 300),
            ("side_brush_work_time", 200),
            ("filter_work_time", 150),
            ("sensor_dirty_time", 30),
        ]
        .into_iter()
        .map(|(name, hours)| (name.to_string(), hours))
        .collect()
    });

    pub static FIRMWARE_FEATURES: Lazy<BTreeMap<i64, &'static str>> = Lazy::new(|| {
        BTreeMap::from([
            (111, "segment_clean"),
            (112, "map_edit"),
            (113, "multi_floor_maps"),
            (114, "carpet_boost"),
            (116, "remote_control_video"),
            (117, "no_mop_zones"),
            (118, "pet_mode"),
            (119, "dust_collection_modes"),
            (120, "child_lock"),
            (122, "mop_lift"),
            (125, "custom_water_level"),
        ])
    });

    /// Name of a firmware feature id. Unknown ids keep a stable fallback name.
    pub fn firmware_feature_name(id: i64) -> String {
        FIRMWARE_FEATURES
            .get(&id)
            .map(|name| (*name).to_string())
            .unwrap_or_else(|| format!("feature_{id}"))
    }
}

static DEFAULT_PROFILE: Lazy<Profile> = Lazy::new(|| Profile {
    model: "default".to_string(),
    fan_power: defaults::FAN_POWER.clone(),
    mop_mode: None,
    water_box_mode: None,
    error_code: None,
    state: None,
    features: ProfileFeatures::default(),
    clean_motor_mode_presets: None,
    consumable_life_hours: None,
});

static BUILTIN_PROFILES: Lazy<HashMap<&'static str, Profile>> = Lazy::new(|| {
    HashMap::from([
        ("roborock.vacuum.s5", s5_profile()),
        ("roborock.vacuum.a15", s7_profile()),
        ("roborock.vacuum.a70", s8_pro_ultra_profile()),
    ])
});

/// S5: no mop controls, default tables.
fn s5_profile() -> Profile {
    Profile {
        model: "roborock.vacuum.s5".to_string(),
        fan_power: table(&[(101, "Quiet"), (102, "Balanced"), (103, "Turbo"), (104, "Max"), (105, "Mop")]),
        ..Profile::default_template()
    }
}

/// S7: mop intensity and scrub routes.
fn s7_profile() -> Profile {
    Profile {
        model: "roborock.vacuum.a15".to_string(),
        fan_power: table(&[
            (101, "Quiet"),
            (102, "Balanced"),
            (103, "Turbo"),
            (104, "Max"),
            (105, "Off"),
            (106, "Custom"),
        ]),
        mop_mode: Some(table(&[(300, "Standard"), (301, "Deep"), (302, "Custom"), (303, "Deep+")])),
        water_box_mode: Some(table(&[(200, "Off"), (201, "Mild"), (202, "Moderate"), (203, "Intense"), (204, "Custom")])),
        ..Profile::default_template()
    }
}

/// S8 Pro Ultra: mop controls, clean-motor presets and distance-off control.
fn s8_pro_ultra_profile() -> Profile {
    let presets = [
        (r#"{"fan_power":102,"mop_mode":300,"water_box_mode":200}"#, "Vacuum"),
        (r#"{"fan_power":105,"mop_mode":300,"water_box_mode":202}"#, "Mop"),
        (r#"{"fan_power":102,"mop_mode":300,"water_box_mode":202}"#, "Vacuum & Mop"),
        (r#"{"fan_power":106,"mop_mode":302,"water_box_mode":204}"#, "Custom"),
    ]
    .into_iter()
    .map(|(key, label)| (key.to_string(), label.to_string()))
    .collect();

    let mut consumables = defaults::CONSUMABLE_LIFE_HOURS.clone();
    consumables.insert("dust_collection_work_times".to_string(), 100);

    Profile {
        model: "roborock.vacuum.a70".to_string(),
        fan_power: table(&[
            (101, "Quiet"),
            (102, "Balanced"),
            (103, "Turbo"),
            (104, "Max"),
            (105, "Off"),
            (106, "Custom"),
            (108, "Max+"),
        ]),
        mop_mode: Some(table(&[(300, "Standard"), (301, "Deep"), (302, "Custom"), (303, "Deep+"), (304, "Fast")])),
        water_box_mode: Some(table(&[(200, "Off"), (201, "Low"), (202, "Medium"), (203, "High"), (204, "Custom")])),
        features: ProfileFeatures { distance_off: true },
        clean_motor_mode_presets: Some(presets),
        consumable_life_hours: Some(consumables),
        ..Profile::default_template()
    }
}
