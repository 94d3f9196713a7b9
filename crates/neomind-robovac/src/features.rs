//! Capability registry and runtime detection rules.
//!
//! Optional device behavior (dock controls, mop washing, cleaning records,
//! ...) is switched on at runtime once the robot shows evidence of it. The
//! [`FeatureRegistry`] keeps the per-session set of enabled capabilities and
//! runs each capability's setup routine exactly once.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::folders;
use crate::docking;
use crate::error::{Result, RobovacError};
use crate::profile::Profile;
use crate::status::StatusPayload;
use crate::store::{StateDeclaration, StatePaths, StateStore};

/// Optional capability of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CleaningRecords,
    Map,
    WaterShortage,
    Consumables,
    AutoEmptyDock,
    MopWash,
    MopDry,
    DockingStationStatus,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Self::CleaningRecords,
        Self::Map,
        Self::WaterShortage,
        Self::Consumables,
        Self::AutoEmptyDock,
        Self::MopWash,
        Self::MopDry,
        Self::DockingStationStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CleaningRecords => "cleaning_records",
            Self::Map => "map",
            Self::WaterShortage => "water_shortage",
            Self::Consumables => "consumables",
            Self::AutoEmptyDock => "auto_empty_dock",
            Self::MopWash => "mop_wash",
            Self::MopDry => "mop_dry",
            Self::DockingStationStatus => "docking_station_status",
        }
    }

    /// States and controls this capability adds to the tree.
    pub fn setup_states(&self, profile: &Profile) -> Vec<FeatureState> {
        match self {
            Self::CleaningRecords => vec![
                FeatureState::new(
                    folders::CLEANING_INFO,
                    "clean_area",
                    StateDeclaration::number("Total clean area").with_unit("m²"),
                ),
                FeatureState::new(
                    folders::CLEANING_INFO,
                    "clean_time",
                    StateDeclaration::number("Total clean time").with_unit("min"),
                ),
                FeatureState::new(
                    folders::CLEANING_INFO,
                    "records",
                    StateDeclaration::json("Cleaning records"),
                ),
            ],
            Self::Map => vec![FeatureState::new(
                folders::MAP,
                "current_index",
                StateDeclaration::number("Current map index"),
            )],
            Self::WaterShortage => vec![FeatureState::new(
                folders::DEVICE_STATUS,
                "water_shortage_status",
                StateDeclaration::number("Water shortage"),
            )],
            Self::Consumables => profile
                .consumable_life_hours()
                .keys()
                .map(|name| {
                    FeatureState::new(
                        folders::CONSUMABLES,
                        name,
                        StateDeclaration::number(name.as_str())
                            .with_unit("%")
                            .with_role("level"),
                    )
                })
                .collect(),
            Self::AutoEmptyDock => vec![
                FeatureState::new(
                    folders::COMMANDS,
                    "app_start_collect_dust",
                    StateDeclaration::button("Start dust collection"),
                ),
                FeatureState::new(
                    folders::COMMANDS,
                    "app_stop_collect_dust",
                    StateDeclaration::button("Stop dust collection"),
                ),
            ],
            Self::MopWash => vec![
                FeatureState::new(
                    folders::COMMANDS,
                    "app_start_wash",
                    StateDeclaration::button("Start mop wash"),
                ),
                FeatureState::new(
                    folders::COMMANDS,
                    "app_stop_wash",
                    StateDeclaration::button("Stop mop wash"),
                ),
            ],
            Self::MopDry => vec![FeatureState::new(
                folders::COMMANDS,
                "app_set_dryer_status",
                StateDeclaration::switch("Mop dryer"),
            )],
            Self::DockingStationStatus => docking::FIELD_NAMES
                .iter()
                .map(|name| {
                    FeatureState::new(
                        folders::DOCKING_STATION,
                        *name,
                        StateDeclaration::number(*name).with_states(docking::component_states()),
                    )
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = RobovacError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.as_str() == s)
            .ok_or_else(|| RobovacError::Config(format!("Unknown capability: {s}")))
    }
}

/// One state declared by a capability's setup routine.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureState {
    pub folder: &'static str,
    pub key: String,
    pub declaration: StateDeclaration,
}

impl FeatureState {
    fn new(folder: &'static str, key: impl Into<String>, declaration: StateDeclaration) -> Self {
        Self {
            folder,
            key: key.into(),
            declaration,
        }
    }
}

/// What a setup routine needs from its session.
#[derive(Clone, Copy)]
pub struct FeatureContext<'a> {
    pub store: &'a dyn StateStore,
    pub paths: &'a StatePaths,
    pub profile: &'a Profile,
}

/// Monotonic per-session set of enabled capabilities.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    enabled: RwLock<BTreeSet<Feature>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.read().await.contains(&feature)
    }

    /// Enabled capabilities in declaration order.
    pub async fn enabled(&self) -> Vec<Feature> {
        self.enabled.read().await.iter().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.enabled.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.enabled.read().await.is_empty()
    }

    /// Enable `feature`, running its setup routine on first enable.
    ///
    /// Returns `true` only for the call that made the transition. If the
    /// setup routine fails the capability is left disabled so a later
    /// payload retries it.
    pub async fn enable(&self, feature: Feature, ctx: FeatureContext<'_>) -> Result<bool> {
        if !self.enabled.write().await.insert(feature) {
            return Ok(false);
        }

        tracing::info!(feature = %feature, prefix = %ctx.paths.prefix(), "Enabling capability");
        if let Err(e) = Self::run_setup(feature, ctx).await {
            tracing::warn!(feature = %feature, error = %e, "Capability setup failed");
            self.enabled.write().await.remove(&feature);
            return Err(e);
        }
        Ok(true)
    }

    async fn run_setup(feature: Feature, ctx: FeatureContext<'_>) -> Result<()> {
        for state in feature.setup_states(ctx.profile) {
            let id = ctx.paths.state(state.folder, &state.key);
            ctx.store.ensure(&id, &state.declaration).await?;
        }
        Ok(())
    }
}

/// Capabilities whose evidence is present in `payload`, in rule order.
///
/// Consumables are always included; enabling is idempotent.
pub fn detect_from_payload(payload: &StatusPayload) -> Vec<Feature> {
    let mut detected = Vec::with_capacity(4);
    if payload.contains_key("clean_area") || payload.contains_key("clean_time") {
        detected.push(Feature::CleaningRecords);
    }
    if payload.contains_key("map_status") {
        detected.push(Feature::Map);
    }
    if payload
        .get("water_shortage_status")
        .is_some_and(|value| !value.is_null())
    {
        detected.push(Feature::WaterShortage);
    }
    detected.push(Feature::Consumables);
    detected
}
