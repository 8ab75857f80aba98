//! Receive loops for the two sockets.
//!
//! Invalid datagrams are logged and dropped. Neither loop ever exits on bad
//! input; only a socket failure ends them.

use crate::service::CrosspointService;
use crate::transport::{TransportError, UdpTransport};
use crosspoint_core::{AdvertisementKind, ports};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Listen for multicast advertisements. A newly discovered program gets a
/// direct advertisement back so it learns about us without waiting for our
/// next broadcast.
pub async fn run_broadcast_listener(
    service: Arc<CrosspointService>,
    multicast: Arc<UdpTransport>,
    direct: Arc<UdpTransport>,
) -> Result<(), TransportError> {
    loop {
        let (text, from) = match multicast.recv().await {
            Ok(datagram) => datagram,
            Err(TransportError::NotUtf8(from)) => {
                warn!("Dropped non-UTF-8 advertisement from {}", from);
                continue;
            }
            Err(e) => return Err(e),
        };
        match service.handle_advertisement(&text, AdvertisementKind::Broadcast) {
            Ok(true) => reply_direct(&service, &direct, from).await,
            Ok(false) => {}
            Err(e) => warn!("Invalid advertisement from {}: {}", from, e),
        }
    }
}

async fn reply_direct(service: &CrosspointService, direct: &UdpTransport, from: SocketAddr) {
    let Some(port) = ports::direct_port_for(from.port()) else {
        debug!(%from, "advertisement from a port outside the slot range, not replying");
        return;
    };
    let target = SocketAddr::new(from.ip(), port);
    let payload = match service.advertisement(AdvertisementKind::Direct).to_json() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to encode direct advertisement: {}", e);
            return;
        }
    };
    if let Err(e) = direct.send_to(&payload, target).await {
        warn!("Direct advertisement to {} failed: {}", target, e);
    }
}

/// Serve the direct socket: direct advertisements and crosspoint messages.
/// Replies go back to the sender.
pub async fn run_direct_listener(
    service: Arc<CrosspointService>,
    direct: Arc<UdpTransport>,
) -> Result<(), TransportError> {
    loop {
        let (text, from) = match direct.recv().await {
            Ok(datagram) => datagram,
            Err(TransportError::NotUtf8(from)) => {
                warn!("Dropped non-UTF-8 datagram from {}", from);
                continue;
            }
            Err(e) => return Err(e),
        };
        match service.handle_direct(&text) {
            Ok(Some(reply)) => {
                if let Err(e) = direct.send_to(&reply, from).await {
                    warn!("Reply to {} failed: {}", from, e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Invalid message from {}: {}", from, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspoint_core::{CrosspointMessage, EquipmentCrosspoint, HostInfo, MessageKind};
    use std::time::Duration;

    fn loopback(transport: &UdpTransport) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], transport.local_addr().unwrap().port()))
    }

    #[tokio::test]
    async fn direct_listener_answers_and_survives_garbage() {
        let service = Arc::new(CrosspointService::new(1, HostInfo::new("127.0.0.1", 30010)));
        service
            .equipment()
            .register(Arc::new(EquipmentCrosspoint::new(5, None).unwrap()))
            .unwrap();
        let server = Arc::new(UdpTransport::direct(0).await.unwrap());
        let server_addr = loopback(&server);
        let task = tokio::spawn(run_direct_listener(service, server));

        let client = UdpTransport::direct(0).await.unwrap();
        client.send_to("not json", server_addr).await.unwrap();
        client
            .send_to(&CrosspointMessage::control_connect(9, 5).to_json().unwrap(), server_addr)
            .await
            .unwrap();

        let (reply, _) = tokio::time::timeout(Duration::from_secs(5), client.recv())
            .await
            .unwrap()
            .unwrap();
        let reply = CrosspointMessage::from_json(&reply).unwrap();
        assert_eq!(reply.kind(), MessageKind::EquipmentConnect);
        assert!(reply.control_ids().contains(&9));

        task.abort();
    }
}
