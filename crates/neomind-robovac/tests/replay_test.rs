//! Tests for file-driven replay

use std::io::Write;
use std::sync::Arc;

use neomind_robovac::replay::{ReplayDevice, ReplayFile};
use neomind_robovac::{Feature, MemoryStateStore, RobovacSession, SessionServices, StateValue};
use serde_json::json;
use tempfile::NamedTempFile;

fn write_replay(value: serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_replay_file_drives_session() {
    let file = write_replay(json!({
        "config": {
            "device_id": "r1",
            "model": "roborock.vacuum.a70",
            "state_prefix": "home.vacuum",
        },
        "status": {"state": 8, "battery": 100, "dock_type": 7},
        "payloads": [
            {"state": 5, "fan_power": 102, "mop_mode": 300, "water_box_mode": 202},
            {"state": 5, "dss": 168},
            {"fan_power": 104, "dss": 0},
        ],
        "firmware_features": [111],
        "network": {"ip": "10.0.0.7"},
    }));

    let replay = ReplayFile::load(file.path()).unwrap();
    let store = Arc::new(MemoryStateStore::new());
    let device = Arc::new(ReplayDevice::new(&replay));
    let session = RobovacSession::new(
        replay.config.clone(),
        SessionServices {
            store: store.clone(),
            transport: device.clone(),
            maps: device.clone(),
            consumables: device.clone(),
        },
    )
    .unwrap();

    session.initialize_device_data().await.unwrap();
    for payload in replay.payloads {
        session.handle_status_update(payload).await.unwrap();
    }

    assert!(session.is_feature_enabled(Feature::MopDry).await);
    assert!(session.is_feature_enabled(Feature::Consumables).await);

    let snapshot = store.snapshot();
    assert_eq!(snapshot["home.vacuum.deviceStatus.state"], json!(5));
    assert_eq!(snapshot["home.vacuum.deviceStatus.battery"], json!(100));
    assert_eq!(
        snapshot["home.vacuum.deviceStatus.clean_motor_mode"],
        json!("Vacuum & Mop")
    );
    // The last payload has no `state` and still reaches the tree
    assert_eq!(snapshot["home.vacuum.deviceStatus.fan_power"], json!(104));
    assert_eq!(snapshot["home.vacuum.commands.set_fan_power"], json!(104));
    assert_eq!(
        snapshot["home.vacuum.dockingStationStatus.dirty_water_box_status"],
        json!(0)
    );
    assert_eq!(
        store.value("home.vacuum.deviceInfo.network.ip"),
        Some(StateValue::String("10.0.0.7".to_string()))
    );

    let calls = device.calls();
    assert_eq!(calls.first().map(String::as_str), Some("update_multi_maps_list"));
    assert_eq!(calls.last().map(String::as_str), Some("update_consumables_percent"));
}

#[tokio::test]
async fn test_replay_file_errors() {
    let missing = ReplayFile::load("/nonexistent/replay.json");
    assert!(matches!(missing, Err(neomind_robovac::RobovacError::Io(_))));

    let file = write_replay(json!({"config": {"device_id": "a.b"}}));
    assert!(matches!(
        ReplayFile::load(file.path()),
        Err(neomind_robovac::RobovacError::Config(_))
    ));
}
