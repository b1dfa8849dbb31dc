use crate::alerts::AlertCounters;
use crate::models::Technology;
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub hosts_tracked: u32,
    pub contracts_loaded: u32,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
    pub compliance_runs: u64,
    pub compliance_failures: u64,
    pub alerts_queued: u64,
    pub alerts_dropped: u64,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<parking_lot::Mutex<String>>,
    compliance_runs: Arc<AtomicU64>,
    compliance_failures: Arc<AtomicU64>,
    alerts: Arc<AlertCounters>,
}

impl HealthTracker {
    pub fn new(alerts: Arc<AlertCounters>) -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(parking_lot::Mutex::new("disabled".to_string())),
            compliance_runs: Arc::new(AtomicU64::new(0)),
            compliance_failures: Arc::new(AtomicU64::new(0)),
            alerts,
        }
    }

    pub fn mark_mqtt_connecting(&self) {
        *self.mqtt_status.lock() = "connecting".to_string();
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn record_compliance_run(&self, succeeded: bool) {
        self.compliance_runs.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.compliance_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Un store en erreur compte pour zéro : le health ne doit jamais échouer
    pub fn get_health(&self, store: &dyn EntityStore) -> KernelHealth {
        let hosts_tracked = store.list_current_hosts().map(|h| h.len()).unwrap_or(0) as u32;
        let contracts_loaded = Technology::ALL
            .iter()
            .map(|t| store.list_contracts_by_technology(*t).map(|c| c.len()).unwrap_or(0))
            .sum::<usize>() as u32;

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            hosts_tracked,
            contracts_loaded,
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
            compliance_runs: self.compliance_runs.load(Ordering::Relaxed),
            compliance_failures: self.compliance_failures.load(Ordering::Relaxed),
            alerts_queued: self.alerts.queued(),
            alerts_dropped: self.alerts.dropped(),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return kb as f32 / 1024.0;
            }
        }
    }
    0.0
}
