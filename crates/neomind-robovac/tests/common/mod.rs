//! Shared mock collaborators for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use neomind_robovac::{
    ConsumableService, DeviceTimer, DeviceTransport, MapService, MemoryStateStore, Profile,
    Result, RobovacError, RobovacSession, SessionConfig, SessionServices, StateDeclaration,
    StateStore, StateValue, StatusPayload,
};
use serde_json::{Map, Value};

pub const PREFIX: &str = "robovac.0.Devices.r1";

pub fn payload(value: Value) -> StatusPayload {
    value.as_object().cloned().expect("payload must be an object")
}

/// Transport, map and consumable mock that records every call in order.
#[derive(Default)]
pub struct RecordingDevice {
    pub status: Mutex<StatusPayload>,
    pub firmware_features: Vec<i64>,
    pub network: Map<String, Value>,
    pub timers: Vec<DeviceTimer>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    current_index: AtomicI64,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, status: Value) -> Self {
        *self.status.lock().unwrap() = payload(status);
        self
    }

    /// Make the named call fail from now on.
    pub fn fail_on(&self, call: &str) {
        self.failing.lock().unwrap().insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    async fn record(&self, call: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        // Give sibling tasks a chance to run
        tokio::task::yield_now().await;
        if self.failing.lock().unwrap().contains(call) {
            return Err(RobovacError::Transport(format!("{call} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceTransport for RecordingDevice {
    async fn get_status(&self) -> Result<StatusPayload> {
        self.record("get_status").await?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn get_firmware_features(&self) -> Result<Vec<i64>> {
        self.record("get_firmware_features").await?;
        Ok(self.firmware_features.clone())
    }

    async fn get_network_info(&self) -> Result<Map<String, Value>> {
        self.record("get_network_info").await?;
        Ok(self.network.clone())
    }

    async fn get_timers(&self) -> Result<Vec<DeviceTimer>> {
        self.record("get_timers").await?;
        Ok(self.timers.clone())
    }
}

#[async_trait]
impl MapService for RecordingDevice {
    async fn update_multi_maps_list(&self) -> Result<()> {
        self.record("update_multi_maps_list").await
    }

    async fn update_map(&self) -> Result<()> {
        self.record("update_map").await
    }

    async fn update_room_mapping(&self) -> Result<()> {
        self.record("update_room_mapping").await
    }

    async fn update_current_map_index(&self, index: i64) -> Result<bool> {
        self.record("update_current_map_index").await?;
        Ok(self.current_index.swap(index, Ordering::SeqCst) != index)
    }

    fn current_index(&self) -> i64 {
        self.current_index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsumableService for RecordingDevice {
    async fn update_consumables(&self) -> Result<()> {
        self.record("update_consumables").await
    }

    async fn update_consumables_percent(&self) -> Result<()> {
        self.record("update_consumables_percent").await
    }
}

/// Store wrapper that rejects writes to ids containing a marker.
pub struct FailingStore {
    pub inner: Arc<MemoryStateStore>,
    marker: String,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStateStore>, marker: impl Into<String>) -> Self {
        Self {
            inner,
            marker: marker.into(),
        }
    }

    fn check(&self, id: &str) -> Result<()> {
        if id.contains(&self.marker) {
            return Err(RobovacError::Store(format!("write rejected: {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FailingStore {
    async fn ensure(&self, id: &str, declaration: &StateDeclaration) -> Result<()> {
        self.inner.ensure(id, declaration).await
    }

    async fn set_if_changed(&self, id: &str, value: StateValue) -> Result<bool> {
        self.check(id)?;
        self.inner.set_if_changed(id, value).await
    }

    async fn set_acknowledged(&self, id: &str, value: StateValue) -> Result<()> {
        self.check(id)?;
        self.inner.set_acknowledged(id, value).await
    }
}

pub struct Harness {
    pub session: RobovacSession,
    pub store: Arc<MemoryStateStore>,
    pub device: Arc<RecordingDevice>,
}

impl Harness {
    pub fn new(model: &str) -> Self {
        Self::with_device(SessionConfig::new("r1", model), RecordingDevice::new())
    }

    pub fn with_device(config: SessionConfig, device: RecordingDevice) -> Self {
        let store = Arc::new(MemoryStateStore::new());
        let device = Arc::new(device);
        let session = RobovacSession::new(config, services(store.clone(), device.clone())).unwrap();
        Self {
            session,
            store,
            device,
        }
    }

    pub fn with_profile(profile: Profile) -> Self {
        let store = Arc::new(MemoryStateStore::new());
        let device = Arc::new(RecordingDevice::new());
        let session = RobovacSession::with_profile(
            SessionConfig::new("r1", profile.model.clone()),
            profile,
            services(store.clone(), device.clone()),
        )
        .unwrap();
        Self {
            session,
            store,
            device,
        }
    }

    pub fn id(&self, suffix: &str) -> String {
        format!("{PREFIX}.{suffix}")
    }

    pub fn value(&self, suffix: &str) -> Option<StateValue> {
        self.store.value(&self.id(suffix))
    }
}

pub fn services(
    store: Arc<dyn StateStore>,
    device: Arc<RecordingDevice>,
) -> SessionServices {
    SessionServices {
        store,
        transport: device.clone(),
        maps: device.clone(),
        consumables: device,
    }
}
