//! A control and an equipment in one system, wired through registries.

use crosspoint_core::{
    Advertisement, AdvertisementKind, ConnectResult, ControlCrosspoint, CrosspointEvent,
    CrosspointId, CrosspointMessage, CrosspointRegistry, EquipmentCrosspoint, HostInfo,
    RemoteCrosspointTracker, SigType, SigValue,
};
use std::sync::Arc;

#[test]
fn control_connects_to_registered_equipment() {
    let equipment_registry = Arc::new(CrosspointRegistry::<EquipmentCrosspoint>::new(1));
    let equipment = Arc::new(EquipmentCrosspoint::new(5, Some("Amplifier".into())).unwrap());
    equipment_registry.register(equipment.clone()).unwrap();

    let registry = equipment_registry.clone();
    let control = ControlCrosspoint::new(9, Some("Touchpanel".into()))
        .unwrap()
        .with_connect_strategy(move |equipment_id: CrosspointId| {
            match registry.try_get(equipment_id) {
                Some(equipment) if equipment.initialize(9) => ConnectResult::Connected,
                _ => ConnectResult::ConnectFailed,
            }
        });
    let mut events = control.subscribe();

    assert!(control.initialize(5));
    assert_eq!(control.equipment_id(), 5);
    assert!(equipment.is_bound(9));

    let mut status_changes = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CrosspointEvent::StatusChanged { .. }) {
            status_changes += 1;
        }
    }
    assert_eq!(status_changes, 1);

    assert!(!control.initialize(77));
    assert_eq!(control.equipment_id(), 0);
}

#[test]
fn wire_round_trip_between_peers() {
    let control = ControlCrosspoint::new(9, None).unwrap();
    let mut update = CrosspointMessage::control_data(9, 5, [SigValue::digital(1, 20, true)]);
    update.add_sig(SigValue::serial(1, 3, "Lobby"));
    control.send_output_data(update.clone());

    let received = CrosspointMessage::from_json(&update.to_json().unwrap()).unwrap();
    assert_eq!(received.control_ids(), update.control_ids());
    assert_eq!(received.equipment_id(), update.equipment_id());
    assert_eq!(received.sigs(), update.sigs());

    let clear = control.clear_message();
    assert_eq!(clear.sigs().len(), 2);
    assert!(
        clear
            .sigs()
            .iter()
            .any(|sig| sig.sig_type() == SigType::Serial && !sig.has_value())
    );
}

#[test]
fn advertisement_feeds_tracker() {
    let host = HostInfo::new("192.168.1.20", 30010);
    let controls = CrosspointRegistry::<ControlCrosspoint>::new(1);
    let equipment = CrosspointRegistry::<EquipmentCrosspoint>::new(1);
    controls
        .register(Arc::new(ControlCrosspoint::new(9, None).unwrap()))
        .unwrap();
    equipment
        .register(Arc::new(EquipmentCrosspoint::new(5, Some("DSP".into())).unwrap()))
        .unwrap();

    let advertisement = Advertisement::new(
        host.clone(),
        controls.infos(&host),
        equipment.infos(&host),
        AdvertisementKind::Broadcast,
    );
    let json = advertisement.to_json().unwrap();

    let tracker = RemoteCrosspointTracker::new();
    tracker.ingest(&Advertisement::from_json(&json, AdvertisementKind::Broadcast).unwrap());

    assert_eq!(tracker.len(), 2);
    assert_eq!(tracker.try_get(5).map(|info| info.host), Some(host));
}
