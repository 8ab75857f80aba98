//! Crosspoint daemon.
//!
//!   crosspoint-daemon --config crosspoint.toml
//!   crosspoint-daemon --config crosspoint.toml --system-id 2 --program-slot 3

use anyhow::Context;
use clap::Parser;
use crosspoint_core::ports;
use crosspoint_daemon::listener::{run_broadcast_listener, run_direct_listener};
use crosspoint_daemon::{Broadcaster, CrosspointService, DaemonConfig, UdpTransport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crosspoint-daemon", about = "Advertise and route crosspoints")]
struct Args {
    /// Path to the TOML config.
    #[arg(short, long, env = "CROSSPOINT_CONFIG", default_value = "crosspoint.toml")]
    config: PathBuf,

    /// Override the configured system id.
    #[arg(long)]
    system_id: Option<u32>,

    /// Override the configured program slot.
    #[arg(long)]
    program_slot: Option<u8>,

    /// Override the advertisement interval, in seconds.
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("crosspoint_daemon=info".parse()?)
                .add_directive("crosspoint_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = DaemonConfig::load(&args.config)?;
    if let Some(system_id) = args.system_id {
        config.system_id = system_id;
    }
    if let Some(slot) = args.program_slot {
        config.program_slot = slot;
    }
    if let Some(secs) = args.interval {
        config.advertisement_interval_secs = secs;
    }
    config.validate()?;

    let service = Arc::new(CrosspointService::from_config(&config)?);
    let advertisement_port = config.advertisement_port()?;
    let direct_port = config.direct_port()?;

    let multicast = Arc::new(
        UdpTransport::multicast(
            advertisement_port,
            config.multicast_group,
            &ports::advertisement_ports(config.system_id)?,
        )
        .await
        .with_context(|| format!("binding advertisement port {advertisement_port}"))?,
    );
    let direct = Arc::new(
        UdpTransport::direct(direct_port)
            .await
            .with_context(|| format!("binding direct port {direct_port}"))?,
    );

    tracing::info!(
        "System {} slot {} on {} (direct {}), {} controls, {} equipment",
        config.system_id,
        config.program_slot,
        service.host(),
        direct_port,
        service.controls().len(),
        service.equipment().len()
    );

    let broadcaster = Broadcaster::new(
        service.clone(),
        multicast.clone(),
        config.advertisement_interval(),
    );
    tokio::spawn(broadcaster.run());

    let broadcast_listener = tokio::spawn(run_broadcast_listener(
        service.clone(),
        multicast,
        direct.clone(),
    ));
    let direct_listener = tokio::spawn(run_direct_listener(service.clone(), direct));

    tokio::select! {
        result = broadcast_listener => {
            result?.context("advertisement listener stopped")?;
        }
        result = direct_listener => {
            result?.context("direct listener stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}
