use crosspoint_core::{
    AdvertisementKind, ConnectResult, ControlCrosspoint, CrosspointId, CrosspointMessage,
    EquipmentCrosspoint, HostInfo, MessageKind,
};
use crosspoint_daemon::listener::run_direct_listener;
use crosspoint_daemon::{CrosspointService, UdpTransport};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn loopback(transport: &UdpTransport) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], transport.local_addr().unwrap().port()))
}

#[tokio::test]
async fn peer_learns_inventory_then_connects() {
    let amp_host = HostInfo::new("127.0.0.1", 30010);
    let amp_side = Arc::new(CrosspointService::new(1, amp_host.clone()));
    amp_side
        .equipment()
        .register(Arc::new(EquipmentCrosspoint::new(5, Some("Amp".into())).unwrap()))
        .unwrap();

    let panel_side = Arc::new(CrosspointService::new(1, HostInfo::new("127.0.0.1", 30020)));
    let panel = Arc::new(ControlCrosspoint::new(9, None).unwrap());
    panel_side.controls().register(panel.clone()).unwrap();

    let amp_direct = Arc::new(UdpTransport::direct(0).await.unwrap());
    let amp_addr = loopback(&amp_direct);
    let listener = tokio::spawn(run_direct_listener(amp_side.clone(), amp_direct));

    // The amp side announces itself directly, the way it answers a new peer.
    let panel_direct = Arc::new(UdpTransport::direct(0).await.unwrap());
    let panel_addr = loopback(&panel_direct);
    let panel_listener = tokio::spawn(run_direct_listener(panel_side.clone(), panel_direct));
    let announce = amp_side.advertisement(AdvertisementKind::Direct).to_json().unwrap();
    let sender = UdpTransport::direct(0).await.unwrap();
    sender.send_to(&announce, panel_addr).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while panel_side.locate(5).is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(panel_side.locate(5), Some(amp_host));

    // Connect the panel to the amp over the wire.
    let client = UdpTransport::direct(0).await.unwrap();
    panel.set_connect_strategy(move |equipment_id: CrosspointId| {
        assert_eq!(equipment_id, 5);
        ConnectResult::Connected
    });
    assert!(panel.initialize(5));
    client
        .send_to(&CrosspointMessage::control_connect(9, 5).to_json().unwrap(), amp_addr)
        .await
        .unwrap();
    let (reply, _) = tokio::time::timeout(Duration::from_secs(5), client.recv())
        .await
        .unwrap()
        .unwrap();
    let reply = CrosspointMessage::from_json(&reply).unwrap();
    assert_eq!(reply.kind(), MessageKind::EquipmentConnect);
    assert!(amp_side.equipment().get(5).unwrap().is_bound(9));

    listener.abort();
    panel_listener.abort();
}
