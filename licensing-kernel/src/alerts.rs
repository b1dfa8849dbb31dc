/**
 * ALERTS - Canal latéral des anomalies du moteur
 *
 * RÔLE : Le moteur signale les anomalies (ex: standby sans primary) sans jamais
 * attendre ni échouer à cause du collaborateur d'alerting.
 *
 * FONCTIONNEMENT :
 * - AlertSink trait = publish() synchrone, non bloquant
 * - AlertQueue = handoff vers une file tokio bornée (try_send)
 * - Un forwarder (voir mqtt.rs) vide la file et publie sur le broker
 *
 * LIVRAISON : at-most-once. File pleine ou fermée = alerte perdue + warning.
 * Aucun retry côté forwarder.
 */

use crate::models::Alert;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

pub trait AlertSink: Send + Sync {
    fn publish(&self, alert: Alert);
}

/// Compteurs partagés entre la file et le health tracker
#[derive(Debug, Default)]
pub struct AlertCounters {
    queued: AtomicU64,
    dropped: AtomicU64,
}

impl AlertCounters {
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub struct AlertQueue {
    tx: mpsc::Sender<Alert>,
    counters: Arc<AlertCounters>,
}

/// Crée la file d'alertes et son récepteur (à confier au forwarder)
pub fn alert_channel(capacity: usize) -> (AlertQueue, mpsc::Receiver<Alert>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let queue = AlertQueue {
        tx,
        counters: Arc::new(AlertCounters::default()),
    };
    (queue, rx)
}

impl AlertQueue {
    pub fn counters(&self) -> Arc<AlertCounters> {
        self.counters.clone()
    }
}

impl AlertSink for AlertQueue {
    fn publish(&self, alert: Alert) {
        match self.tx.try_send(alert) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
                debug!("alert queued");
            }
            Err(TrySendError::Full(alert)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(alert_id = %alert.id, code = ?alert.code, "alert queue full, alert dropped");
            }
            Err(TrySendError::Closed(alert)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(alert_id = %alert.id, code = ?alert.code, "alert forwarder stopped, alert dropped");
            }
        }
    }
}
