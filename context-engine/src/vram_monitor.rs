//! `VRAMMonitor`: polls the provider's VRAM probe on a timer and publishes
//! the latest reading through a lock-free single-writer slot, process-wide
//! and read-only to consumers (§3 ownership rule, §9 "global … service
//! locator with a single init point" guidance).

use crate::events::{EngineEvent, EventBus};
use crate::provider::ProviderAdapter;
use crate::types::{SizingConfig, VRAMSample};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Single-writer slot: the polling task is the only writer; any number of
/// readers may call `latest()` without blocking the writer.
#[derive(Clone)]
pub struct VRAMMonitor {
    latest: Arc<RwLock<VRAMSample>>,
    provider: Arc<dyn ProviderAdapter>,
    config: SizingConfig,
    events: EventBus,
}

impl VRAMMonitor {
    pub fn new(provider: Arc<dyn ProviderAdapter>, config: SizingConfig, events: EventBus) -> Self {
        Self {
            latest: Arc::new(RwLock::new(VRAMSample::Unknown)),
            provider,
            config,
            events,
        }
    }

    pub fn latest(&self) -> VRAMSample {
        *self.latest.read().expect("VRAM slot poisoned")
    }

    /// Spawns the polling task; probe failures fall back to `Unknown`
    /// without crashing the monitor.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(monitor.config.poll_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => monitor.poll_once().await,
                }
            }
        })
    }

    async fn poll_once(&self) {
        let sample = self.provider.vram().await;
        *self.latest.write().expect("VRAM slot poisoned") = sample;

        let VRAMSample::Reading(reading) = sample else {
            debug!("VRAM probe returned Unknown");
            return;
        };

        let free_ratio = reading.free_ratio();
        if free_ratio <= self.config.critical_memory_free_ratio {
            warn!(free_bytes = reading.free_bytes, total_bytes = reading.total_bytes, "critical VRAM pressure");
            self.events.publish(EngineEvent::CriticalMemory {
                free_bytes: reading.free_bytes,
                total_bytes: reading.total_bytes,
            });
        } else if free_ratio <= self.config.low_memory_free_ratio {
            self.events.publish(EngineEvent::LowMemory {
                free_bytes: reading.free_bytes,
                total_bytes: reading.total_bytes,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FixedVramProvider;
    use crate::types::VRAMReading;
    use chrono::Utc;

    #[tokio::test]
    async fn critical_pressure_below_threshold_emits_critical_event() {
        let provider = Arc::new(FixedVramProvider {
            sample: VRAMSample::Reading(VRAMReading {
                total_bytes: 10_000,
                used_bytes: 9_500,
                free_bytes: 500,
                sampled_at: Utc::now(),
            }),
        });
        let events = EventBus::new(4);
        let mut rx = events.subscribe();
        let monitor = VRAMMonitor::new(provider, SizingConfig::default(), events);

        monitor.poll_once().await;

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, EngineEvent::CriticalMemory { .. }));
        assert!(matches!(monitor.latest(), VRAMSample::Reading(_)));
    }

    #[tokio::test]
    async fn probe_failure_falls_back_to_unknown_without_panicking() {
        let provider = Arc::new(FixedVramProvider { sample: VRAMSample::Unknown });
        let monitor = VRAMMonitor::new(provider, SizingConfig::default(), EventBus::default());
        monitor.poll_once().await;
        assert!(matches!(monitor.latest(), VRAMSample::Unknown));
    }
}
