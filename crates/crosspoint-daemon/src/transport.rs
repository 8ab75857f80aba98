//! UDP discovery transport.
//!
//! Each program binds its own slot port. Advertisements go to the multicast
//! group on every slot port of the system, so every program hears them
//! whatever slot it owns. The direct socket carries crosspoint messages and
//! direct advertisements between two programs.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;
use tracing::debug;

const MAX_DATAGRAM: usize = 64 * 1024;

/// Where the broadcaster hands finished advertisements.
pub trait AdvertisementSink: Send + Sync {
    fn publish(&self, payload: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}

pub struct UdpTransport {
    socket: UdpSocket,
    targets: Vec<SocketAddr>,
}

impl UdpTransport {
    /// Bind `port`, join `group` and publish to `group` on every port in
    /// `slot_ports`.
    pub async fn multicast(
        port: u16,
        group: Ipv4Addr,
        slot_ports: &[u16],
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).await?;
        socket.join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_loop_v4(true)?;
        let targets = slot_ports
            .iter()
            .map(|&slot_port| SocketAddr::V4(SocketAddrV4::new(group, slot_port)))
            .collect();
        Ok(Self { socket, targets })
    }

    /// Bind `port` for point-to-point traffic.
    pub async fn direct(port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).await?;
        Ok(Self {
            socket,
            targets: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn send_to(&self, payload: &str, target: SocketAddr) -> Result<(), TransportError> {
        let sent = self.socket.send_to(payload.as_bytes(), target).await?;
        if sent != payload.len() {
            return Err(TransportError::Truncated {
                sent,
                len: payload.len(),
            });
        }
        Ok(())
    }

    /// Wait for one datagram. Each datagram is one complete JSON document.
    pub async fn recv(&self) -> Result<(String, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        let text = String::from_utf8(buf).map_err(|_| TransportError::NotUtf8(from))?;
        Ok((text, from))
    }
}

impl AdvertisementSink for UdpTransport {
    async fn publish(&self, payload: &str) -> Result<(), TransportError> {
        for &target in &self.targets {
            self.send_to(payload, target).await?;
        }
        debug!(targets = self.targets.len(), bytes = payload.len(), "advertisement published");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sent {sent} of {len} bytes")]
    Truncated { sent: usize, len: usize },
    #[error("datagram from {0} is not valid UTF-8")]
    NotUtf8(SocketAddr),
    #[error("failed to encode advertisement: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn direct_round_trip_on_loopback() {
        let a = UdpTransport::direct(0).await.unwrap();
        let b = UdpTransport::direct(0).await.unwrap();
        let b_addr = SocketAddr::from(([127, 0, 0, 1], b.local_addr().unwrap().port()));

        a.send_to(r#"{"T":6}"#, b_addr).await.unwrap();
        let (text, from) = b.recv().await.unwrap();
        assert_eq!(text, r#"{"T":6}"#);
        assert_eq!(from.port(), a.local_addr().unwrap().port());
    }
}
