//! Crosspoint discovery daemon.
//!
//! Hosts a set of local control and equipment crosspoints, advertises them
//! over UDP multicast and routes crosspoint messages arriving on the direct
//! socket.
//!
//! Logging goes through `tracing`; the binary installs a `tracing-subscriber`
//! filter driven by `RUST_LOG`.

pub mod broadcaster;
pub mod config;
pub mod listener;
pub mod service;
pub mod transport;

pub use broadcaster::{BroadcastTrigger, Broadcaster};
pub use config::{ConfigError, DaemonConfig};
pub use service::{CrosspointService, ServiceError};
pub use transport::{AdvertisementSink, TransportError, UdpTransport};
