//! Periodic inventory broadcast.

use crate::service::CrosspointService;
use crate::transport::{AdvertisementSink, TransportError};
use crosspoint_core::AdvertisementKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Advertises the service's inventory on a fixed interval, and immediately
/// whenever [`BroadcastTrigger::broadcast_now`] is called.
pub struct Broadcaster<S> {
    service: Arc<CrosspointService>,
    sink: Arc<S>,
    interval: Duration,
    trigger: Arc<Notify>,
}

/// Handle for requesting an out-of-schedule broadcast.
#[derive(Clone)]
pub struct BroadcastTrigger(Arc<Notify>);

impl BroadcastTrigger {
    pub fn broadcast_now(&self) {
        self.0.notify_one();
    }
}

impl<S: AdvertisementSink> Broadcaster<S> {
    pub fn new(service: Arc<CrosspointService>, sink: Arc<S>, interval: Duration) -> Self {
        Self {
            service,
            sink,
            interval,
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn trigger(&self) -> BroadcastTrigger {
        BroadcastTrigger(self.trigger.clone())
    }

    /// Build a fresh advertisement and publish it once.
    pub async fn broadcast_once(&self) -> Result<(), TransportError> {
        let advertisement = self.service.advertisement(AdvertisementKind::Broadcast);
        let payload = advertisement.to_json()?;
        self.sink.publish(&payload).await?;
        debug!(
            controls = advertisement.controls().len(),
            equipment = advertisement.equipment().len(),
            "inventory advertised"
        );
        Ok(())
    }

    /// Broadcast forever. The first tick fires immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.trigger.notified() => {}
            }
            if let Err(e) = self.broadcast_once().await {
                warn!("Advertisement failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspoint_core::{Advertisement, EquipmentCrosspoint, HostInfo};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.published.lock().unwrap().len()
        }
    }

    impl AdvertisementSink for RecordingSink {
        async fn publish(&self, payload: &str) -> Result<(), TransportError> {
            self.published.lock().unwrap().push(payload.to_string());
            Ok(())
        }
    }

    fn service() -> Arc<CrosspointService> {
        Arc::new(CrosspointService::new(1, HostInfo::new("10.0.0.1", 30010)))
    }

    #[tokio::test]
    async fn broadcast_reflects_current_registry() {
        let service = service();
        let sink = Arc::new(RecordingSink::default());
        let broadcaster = Broadcaster::new(service.clone(), sink.clone(), Duration::from_secs(30));

        broadcaster.broadcast_once().await.unwrap();
        service
            .equipment()
            .register(Arc::new(EquipmentCrosspoint::new(5, None).unwrap()))
            .unwrap();
        broadcaster.broadcast_once().await.unwrap();

        let published = sink.published.lock().unwrap().clone();
        let first = Advertisement::from_json(&published[0], AdvertisementKind::Broadcast).unwrap();
        let second = Advertisement::from_json(&published[1], AdvertisementKind::Broadcast).unwrap();
        assert!(first.is_empty());
        assert_eq!(second.equipment().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_on_interval_and_on_demand() {
        let sink = Arc::new(RecordingSink::default());
        let broadcaster = Broadcaster::new(service(), sink.clone(), Duration::from_secs(30));
        let trigger = broadcaster.trigger();
        let task = tokio::spawn(broadcaster.run());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(sink.count(), 2);

        trigger.broadcast_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.count(), 3);

        task.abort();
    }
}
