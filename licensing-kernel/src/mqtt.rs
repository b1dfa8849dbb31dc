use crate::config::MqttConf;
use crate::health::HealthTracker;
use crate::models::Alert;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

pub fn create_mqtt_client(conf: &MqttConf) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new(&conf.client_id, &conf.host, conf.port);
    opts.set_keep_alive(Duration::from_secs(15));
    AsyncClient::new(opts, 10)
}

/// Fait tourner l'event loop rumqttc ; sans poll aucun publish ne part
pub fn spawn_event_loop(mut eventloop: EventLoop, health: HealthTracker) -> JoinHandle<()> {
    health.mark_mqtt_connecting();
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    health.mark_mqtt_connected();
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = ?e, "mqtt connection error");
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

pub fn alert_payload(alert: &Alert) -> Result<String, serde_json::Error> {
    serde_json::to_string(alert)
}

/// Vide la file d'alertes vers le broker. Un échec de publish est journalisé,
/// jamais rejoué.
pub fn spawn_alert_forwarder(mut rx: mpsc::Receiver<Alert>, client: AsyncClient, topic: String) -> JoinHandle<()> {
    task::spawn(async move {
        while let Some(alert) = rx.recv().await {
            let payload = match alert_payload(&alert) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "alert serialization failed");
                    continue;
                }
            };
            match client.publish(topic.as_str(), QoS::AtLeastOnce, false, payload).await {
                Ok(()) => debug!(alert_id = %alert.id, topic = %topic, "alert published"),
                Err(e) => warn!(alert_id = %alert.id, error = ?e, "alert publish failed"),
            }
        }
        debug!("alert queue closed, forwarder stopped");
    })
}

/// Sans broker configuré les alertes sont seulement journalisées
pub fn spawn_alert_logger(mut rx: mpsc::Receiver<Alert>) -> JoinHandle<()> {
    task::spawn(async move {
        while let Some(alert) = rx.recv().await {
            warn!(alert_id = %alert.id, code = ?alert.code, description = %alert.description, "alert (mqtt disabled)");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{alert_channel, AlertSink};

    #[test]
    fn test_alert_payload_is_json() {
        let alert = Alert::missing_primary_database("host-b", "ERCOLE");
        let payload = alert_payload(&alert).unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["category"], "ENGINE");
        assert_eq!(value["status"], "NEW");
        assert_eq!(value["id"], alert.id.to_string());
    }

    #[tokio::test]
    async fn test_logger_stops_when_queue_is_dropped() {
        let (queue, rx) = alert_channel(4);
        let handle = spawn_alert_logger(rx);
        queue.publish(Alert::missing_primary_database("a", "DB1"));
        drop(queue);
        handle.await.unwrap();
    }
}
