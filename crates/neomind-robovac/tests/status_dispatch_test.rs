//! Tests for status payload processing

mod common;

use std::sync::Arc;

use common::{payload, services, FailingStore, Harness, RecordingDevice, PREFIX};
use neomind_robovac::{
    Feature, MemoryStateStore, RobovacError, RobovacSession, SessionConfig, StateValue,
};
use serde_json::json;
use tokio::test;

const A70: &str = "roborock.vacuum.a70";

#[test]
async fn test_state_and_fan_power_with_default_profile() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"state": 5, "fan_power": 102})))
        .await
        .unwrap();

    assert_eq!(h.value("deviceStatus.state"), Some(StateValue::Integer(5)));
    let declaration = h.store.declaration(&h.id("deviceStatus.state")).unwrap();
    assert_eq!(
        declaration.allowed_values.unwrap().get(&5).map(String::as_str),
        Some("Cleaning")
    );

    assert_eq!(h.value("deviceStatus.fan_power"), Some(StateValue::Integer(102)));
    let declaration = h.store.declaration(&h.id("deviceStatus.fan_power")).unwrap();
    assert_eq!(
        declaration.allowed_values.unwrap().get(&102).map(String::as_str),
        Some("Balanced")
    );

    // Only user-adjustable properties get a command twin
    let mirror = h.store.get(&h.id("commands.set_fan_power")).unwrap();
    assert_eq!(mirror.value, Some(StateValue::Integer(102)));
    assert!(mirror.ack);
    assert!(mirror.declaration.writable);
    assert!(!h.store.contains(&h.id("commands.set_state")));

    assert_eq!(h.store.write_count(), 3);
}

#[test]
async fn test_docking_word_is_decoded_and_never_forwarded() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"dss": 0b10_01_00_11_10_01})))
        .await
        .unwrap();

    let expected = [
        ("clean_fluid_status", 1),
        ("water_box_filter_status", 2),
        ("dust_bag_status", 3),
        ("dirty_water_box_status", 0),
        ("clear_water_box_status", 1),
        ("water_ready_status", 2),
    ];
    for (name, code) in expected {
        assert_eq!(
            h.value(&format!("dockingStationStatus.{name}")),
            Some(StateValue::Integer(code)),
            "{name}"
        );
    }
    assert!(!h.store.contains(&h.id("deviceStatus.dss")));
    assert_eq!(h.store.write_count(), 6);
}

#[test]
async fn test_non_numeric_docking_word_writes_nothing() {
    let h = Harness::new("default");
    for word in [json!("168"), json!(null), json!(true)] {
        h.session
            .process_status(payload(json!({ "dss": word })))
            .await
            .unwrap();
    }

    assert_eq!(h.store.write_count(), 0);
    assert!(h
        .store
        .ids()
        .iter()
        .all(|id| !id.contains("dockingStationStatus") && !id.ends_with(".dss")));
}

#[test]
async fn test_negative_docking_word_is_decoded() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"dss": -4})))
        .await
        .unwrap();

    assert_eq!(h.store.write_count(), 6);
    assert_eq!(
        h.value("dockingStationStatus.clean_fluid_status"),
        Some(StateValue::Integer(0))
    );
    for name in [
        "water_box_filter_status",
        "dust_bag_status",
        "dirty_water_box_status",
        "clear_water_box_status",
        "water_ready_status",
    ] {
        assert_eq!(
            h.value(&format!("dockingStationStatus.{name}")),
            Some(StateValue::Integer(3)),
            "{name}"
        );
    }
}

#[test]
async fn test_unchanged_state_is_not_rewritten() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"state": 5})))
        .await
        .unwrap();
    let writes = h.store.write_count();
    assert_eq!(writes, 1);

    h.session
        .process_status(payload(json!({"state": 5})))
        .await
        .unwrap();
    assert_eq!(h.store.write_count(), writes);

    h.session
        .process_status(payload(json!({"state": 8})))
        .await
        .unwrap();
    assert_eq!(h.store.write_count(), writes + 1);
    assert_eq!(h.value("deviceStatus.state"), Some(StateValue::Integer(8)));
}

#[test]
async fn test_mirror_overwrites_pending_edit() {
    let h = Harness::new("default");
    let command = h.id("commands.set_fan_power");

    h.session
        .process_status(payload(json!({"fan_power": 102})))
        .await
        .unwrap();
    h.store.set_pending(&command, StateValue::Integer(104)).unwrap();
    assert!(!h.store.get(&command).unwrap().ack);

    h.session
        .process_status(payload(json!({"fan_power": 102})))
        .await
        .unwrap();

    let mirror = h.store.get(&command).unwrap();
    assert_eq!(mirror.value, Some(StateValue::Integer(102)));
    assert!(mirror.ack);
    // Unchanged status value is not rewritten, the mirror always is
    assert_eq!(h.store.write_count(), 4);
}

#[test]
async fn test_missing_mop_tables_write_nothing() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"mop_mode": 300, "water_box_mode": 200})))
        .await
        .unwrap();

    assert!(!h.store.contains(&h.id("deviceStatus.mop_mode")));
    assert!(!h.store.contains(&h.id("commands.set_mop_mode")));
    assert!(!h.store.contains(&h.id("deviceStatus.water_box_mode")));
    assert_eq!(h.store.write_count(), 0);
}

#[test]
async fn test_non_numeric_mapped_value_is_skipped() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"state": "cleaning", "battery": 80})))
        .await
        .unwrap();

    assert!(h.value("deviceStatus.state").is_none());
    assert_eq!(h.value("deviceStatus.battery"), Some(StateValue::Integer(80)));
}

#[test]
async fn test_generic_properties_infer_type() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({
            "battery": 87,
            "msg_ver": "2",
            "in_cleaning": false,
        })))
        .await
        .unwrap();

    assert_eq!(h.value("deviceStatus.battery"), Some(StateValue::Integer(87)));
    assert_eq!(
        h.value("deviceStatus.msg_ver"),
        Some(StateValue::String("2".to_string()))
    );
    assert_eq!(
        h.value("deviceStatus.in_cleaning"),
        Some(StateValue::Boolean(false))
    );
}

#[test]
async fn test_clean_motor_mode_preset() {
    let h = Harness::new(A70);
    h.session
        .process_status(payload(json!({
            "fan_power": 105,
            "mop_mode": 300,
            "water_box_mode": 202,
        })))
        .await
        .unwrap();

    assert_eq!(
        h.value("deviceStatus.clean_motor_mode"),
        Some(StateValue::String("Mop".to_string()))
    );
    let preset = h.value("commands.set_clean_motor_mode").unwrap();
    let preset: serde_json::Value = serde_json::from_str(preset.as_str().unwrap()).unwrap();
    assert_eq!(
        preset,
        json!({"fan_power": 105, "mop_mode": 300, "water_box_mode": 202})
    );
    assert_eq!(h.value("commands.set_mop_mode"), Some(StateValue::Integer(300)));
    assert_eq!(
        h.value("commands.set_water_box_mode"),
        Some(StateValue::Integer(202))
    );
}

#[test]
async fn test_unmatched_or_partial_preset_writes_no_mode() {
    let h = Harness::new(A70);
    h.session
        .process_status(payload(json!({
            "fan_power": 101,
            "mop_mode": 300,
            "water_box_mode": 200,
        })))
        .await
        .unwrap();
    h.session
        .process_status(payload(json!({"fan_power": 105, "mop_mode": 300})))
        .await
        .unwrap();

    assert!(!h.store.contains(&h.id("deviceStatus.clean_motor_mode")));
    assert!(!h.store.contains(&h.id("commands.set_clean_motor_mode")));
}

#[test]
async fn test_distance_off_mirrored_only_when_flagged() {
    let flagged = Harness::new(A70);
    flagged
        .session
        .process_status(payload(json!({"distance_off": 60})))
        .await
        .unwrap();
    assert_eq!(
        flagged.value("commands.set_distance_off"),
        Some(StateValue::Integer(60))
    );

    let plain = Harness::new("default");
    plain
        .session
        .process_status(payload(json!({"distance_off": 60})))
        .await
        .unwrap();
    assert_eq!(
        plain.value("deviceStatus.distance_off"),
        Some(StateValue::Integer(60))
    );
    assert!(!plain.store.contains(&plain.id("commands.set_distance_off")));
}

#[test]
async fn test_map_status_tracks_current_floor() {
    let h = Harness::new("default");

    // 7 >> 2 == 1
    h.session
        .process_status(payload(json!({"map_status": 7})))
        .await
        .unwrap();
    assert_eq!(h.session.current_map_index(), 1);
    assert_eq!(h.value("map.current_index"), Some(StateValue::Integer(1)));
    assert_eq!(h.value("deviceStatus.map_status"), Some(StateValue::Integer(7)));
    assert_eq!(h.device.count("update_map"), 1);

    h.session
        .process_status(payload(json!({"map_status": 5})))
        .await
        .unwrap();
    assert_eq!(h.device.count("update_map"), 1);

    h.session
        .process_status(payload(json!({"map_status": 3})))
        .await
        .unwrap();
    assert_eq!(h.session.current_map_index(), 0);
    assert_eq!(h.value("map.current_index"), Some(StateValue::Integer(0)));
    assert_eq!(h.device.count("update_map"), 2);
}

#[test]
async fn test_dock_type_enables_capabilities() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"dock_type": 17})))
        .await
        .unwrap();

    assert_eq!(
        h.session.enabled_features().await,
        vec![
            Feature::AutoEmptyDock,
            Feature::MopWash,
            Feature::MopDry,
            Feature::DockingStationStatus,
        ]
    );
    assert!(h.store.contains(&h.id("commands.app_start_wash")));
    assert!(h.store.contains(&h.id("commands.app_set_dryer_status")));
    assert!(h.store.contains(&h.id("dockingStationStatus.dust_bag_status")));
    assert_eq!(h.value("deviceStatus.dock_type"), Some(StateValue::Integer(17)));
}

#[test]
async fn test_unknown_dock_type_enables_nothing() {
    let h = Harness::new("default");
    h.session
        .process_status(payload(json!({"dock_type": 99})))
        .await
        .unwrap();

    assert!(h.session.enabled_features().await.is_empty());
    assert_eq!(h.value("deviceStatus.dock_type"), Some(StateValue::Integer(99)));
}

#[test]
async fn test_handler_failure_keeps_sibling_writes() {
    let memory = Arc::new(MemoryStateStore::new());
    let store = Arc::new(FailingStore::new(memory.clone(), "fan_power"));
    let device = Arc::new(RecordingDevice::new());
    let session = RobovacSession::new(
        SessionConfig::new("r1", "default"),
        services(store, device),
    )
    .unwrap();

    let err = session
        .process_status(payload(json!({"state": 5, "fan_power": 102, "battery": 50})))
        .await
        .unwrap_err();
    assert!(matches!(err, RobovacError::Store(_)), "{err}");

    assert_eq!(
        memory.value(&format!("{PREFIX}.deviceStatus.state")),
        Some(StateValue::Integer(5))
    );
    assert_eq!(
        memory.value(&format!("{PREFIX}.deviceStatus.battery")),
        Some(StateValue::Integer(50))
    );
}
