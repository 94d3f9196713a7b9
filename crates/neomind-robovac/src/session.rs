//! Device Session - lifecycle of one robot in the state tree
//!
//! A [`RobovacSession`] owns the robot's profile and capability set and
//! talks to the collaborators in [`crate::services`]. It provides:
//! - ordered bring-up ([`initialize_device_data`](RobovacSession::initialize_device_data))
//! - runtime capability detection on every status payload
//! - status processing (see [`crate::status`])
//! - dock-type driven capability enablement
//!
//! ## Bring-up order
//!
//! ```text
//! 1. multi-map list ──> 2. status + detection + rooms ──> 3. map image
//!                                                              │
//!        ┌────────────────┬──────────────┬─────────────────────┘
//!        v                v              v              v
//! 4. firmware features  consumables  network info    timers     (concurrent)
//!        └────────────────┴──────────────┴──────────────┘
//!                                  │
//!                                  v
//!                     5. consumable percentages
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::Instrument;

use crate::config::{folders, SessionConfig};
use crate::dock_type;
use crate::error::Result;
use crate::features::{self, Feature, FeatureContext, FeatureRegistry};
use crate::profile::{defaults, Profile};
use crate::services::{ConsumableService, DeviceTransport, MapService};
use crate::status::StatusPayload;
use crate::store::{StateDeclaration, StatePaths, StateStore};
use crate::task_group::TaskGroup;
use crate::value::StateValue;

/// Phases of [`RobovacSession::initialize_device_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    MultiMaps,
    Status,
    MapImage,
    Refresh,
    ConsumablePercent,
}

impl std::fmt::Display for InitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultiMaps => write!(f, "multi_maps"),
            Self::Status => write!(f, "status"),
            Self::MapImage => write!(f, "map_image"),
            Self::Refresh => write!(f, "refresh"),
            Self::ConsumablePercent => write!(f, "consumable_percent"),
        }
    }
}

/// Collaborators a session depends on.
#[derive(Clone)]
pub struct SessionServices {
    pub store: Arc<dyn StateStore>,
    pub transport: Arc<dyn DeviceTransport>,
    pub maps: Arc<dyn MapService>,
    pub consumables: Arc<dyn ConsumableService>,
}

/// One robot's synchronization session.
pub struct RobovacSession {
    pub(crate) config: SessionConfig,
    pub(crate) paths: StatePaths,
    pub(crate) profile: Profile,
    features: FeatureRegistry,
    runtime_detection_complete: AtomicBool,
    pub(crate) store: Arc<dyn StateStore>,
    transport: Arc<dyn DeviceTransport>,
    pub(crate) maps: Arc<dyn MapService>,
    consumables: Arc<dyn ConsumableService>,
}

impl RobovacSession {
    /// Create a session using the built-in profile for the configured model.
    pub fn new(config: SessionConfig, services: SessionServices) -> Result<Self> {
        let profile = Profile::for_model(&config.model);
        Self::with_profile(config, profile, services)
    }

    /// Create a session with an explicit profile.
    pub fn with_profile(
        config: SessionConfig,
        profile: Profile,
        services: SessionServices,
    ) -> Result<Self> {
        config.validate()?;
        let paths = StatePaths::new(config.resolved_prefix());
        tracing::info!(
            device_id = %config.device_id,
            model = %config.model,
            prefix = %paths.prefix(),
            "Created robovac session"
        );

        Ok(Self {
            config,
            paths,
            profile,
            features: FeatureRegistry::new(),
            runtime_detection_complete: AtomicBool::new(false),
            store: services.store,
            transport: services.transport,
            maps: services.maps,
            consumables: services.consumables,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    /// Whether the first detection pass has completed.
    pub fn runtime_detection_complete(&self) -> bool {
        self.runtime_detection_complete.load(Ordering::SeqCst)
    }

    pub async fn enabled_features(&self) -> Vec<Feature> {
        self.features.enabled().await
    }

    pub async fn is_feature_enabled(&self, feature: Feature) -> bool {
        self.features.is_enabled(feature).await
    }

    /// Enable one capability. Returns `true` if it was newly enabled.
    pub async fn enable_feature(&self, feature: Feature) -> Result<bool> {
        let ctx = FeatureContext {
            store: self.store.as_ref(),
            paths: &self.paths,
            profile: &self.profile,
        };
        self.features.enable(feature, ctx).await
    }

    /// Index of the floor the robot is currently on.
    pub fn current_map_index(&self) -> i64 {
        self.maps.current_index()
    }

    /// Bring a freshly constructed session to a fully populated state.
    ///
    /// Phases 1-3 and 5 run strictly in order and abort the sequence on
    /// failure. Phase 4 runs its four refreshes concurrently; if one fails
    /// the phase fails, but refreshes that succeeded keep their writes.
    pub async fn initialize_device_data(&self) -> Result<()> {
        tracing::info!(device_id = %self.config.device_id, "Initializing device data");

        self.run_phase(InitPhase::MultiMaps, self.maps.update_multi_maps_list())
            .await?;

        self.run_phase(InitPhase::Status, async {
            let status = self.transport.get_status().await?;
            self.detect_and_apply_runtime_features(status).await?;
            self.maps.update_room_mapping().await
        })
        .await?;

        self.run_phase(InitPhase::MapImage, self.maps.update_map())
            .await?;

        self.run_phase(InitPhase::Refresh, async {
            let mut group = TaskGroup::new("refresh");
            group.spawn("firmware_features", self.refresh_firmware_features());
            group.spawn("consumables", self.consumables.update_consumables());
            group.spawn("network_info", self.refresh_network_info());
            group.spawn("timers", self.refresh_timers());
            group.join().await
        })
        .await?;

        self.run_phase(
            InitPhase::ConsumablePercent,
            self.consumables.update_consumables_percent(),
        )
        .await?;

        tracing::info!(device_id = %self.config.device_id, "Device data initialized");
        Ok(())
    }

    async fn run_phase<F, T>(&self, phase: InitPhase, task: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!("init_phase", device_id = %self.config.device_id, phase = %phase);
        task.instrument(span)
            .await
            .map_err(|e| e.in_phase(phase))
    }

    /// Enable every capability the payload (or static configuration) shows
    /// evidence of, and process the payload if it carries a `state`.
    ///
    /// Returns `true` if any capability was newly enabled, or if this is
    /// the first detection pass to complete.
    pub async fn detect_and_apply_runtime_features(&self, payload: StatusPayload) -> Result<bool> {
        let mut changed = false;

        let candidates = self
            .config
            .features
            .iter()
            .copied()
            .chain(features::detect_from_payload(&payload));
        for feature in candidates {
            changed |= self.enable_feature(feature).await?;
        }

        if payload.get("state").is_some_and(|state| !state.is_null()) {
            self.process_status(payload).await?;
        }

        if !self.runtime_detection_complete.swap(true, Ordering::SeqCst) {
            tracing::info!(device_id = %self.config.device_id, "Runtime feature detection complete");
            changed = true;
        }
        Ok(changed)
    }

    /// Handle one status payload pushed by the transport.
    ///
    /// Runs detection first. Payloads without a `state` are not processed
    /// by detection, so they are dispatched here; partial updates such as
    /// a lone `fan_power` or `dss` change reach the state tree either way.
    pub async fn handle_status_update(&self, payload: StatusPayload) -> Result<bool> {
        let has_state = payload.get("state").is_some_and(|state| !state.is_null());
        let pending = (!has_state).then(|| payload.clone());

        let changed = self.detect_and_apply_runtime_features(payload).await?;
        if let Some(payload) = pending {
            self.process_status(payload).await?;
        }
        Ok(changed)
    }

    /// Enable the capabilities implied by a dock type, in table order.
    pub async fn process_dock_type(&self, code: i64) -> Result<()> {
        let capabilities = dock_type::capabilities_for(code);
        if capabilities.is_empty() {
            tracing::debug!(device_id = %self.config.device_id, dock_type = code, "Dock type implies no capabilities");
            return Ok(());
        }
        for feature in capabilities {
            self.enable_feature(*feature).await?;
        }
        Ok(())
    }

    async fn refresh_firmware_features(&self) -> Result<()> {
        let ids = self.transport.get_firmware_features().await?;
        tracing::debug!(device_id = %self.config.device_id, count = ids.len(), "Firmware features");
        for id in ids {
            let name = defaults::firmware_feature_name(id);
            let state_id = self.paths.state(folders::FIRMWARE, &name);
            self.store
                .ensure(&state_id, &StateDeclaration::boolean(name.as_str()))
                .await?;
            self.store.set_acknowledged(&state_id, true.into()).await?;
        }
        Ok(())
    }

    async fn refresh_network_info(&self) -> Result<()> {
        let info = self.transport.get_network_info().await?;
        let folder = self.paths.folder(folders::NETWORK);
        for (key, value) in &info {
            self.store.persist_in_folder(&folder, key, value).await?;
        }
        Ok(())
    }

    async fn refresh_timers(&self) -> Result<()> {
        let timers = self.transport.get_timers().await?;
        for timer in timers {
            let key = timer.id.replace('.', "_");
            let state_id = self.paths.state(folders::TIMERS, &key);
            self.store
                .ensure(&state_id, &StateDeclaration::json(key.as_str()))
                .await?;
            let value = StateValue::Json(serde_json::to_value(&timer)?);
            self.store.set_acknowledged(&state_id, value).await?;
        }
        Ok(())
    }
}
