/**
 * LICENSING KERNEL - Point d'entrée du serveur de conformité
 *
 * RÔLE : Orchestration des modules : config, store inventaire, file d'alertes,
 * MQTT, health, moteur de conformité et API REST.
 */

use anyhow::Context;
use licensing_kernel::alerts::{alert_channel, AlertSink};
use licensing_kernel::config::load_config;
use licensing_kernel::health::HealthTracker;
use licensing_kernel::http::{build_router, AppState};
use licensing_kernel::licensing::LicenseEngine;
use licensing_kernel::mqtt;
use licensing_kernel::store::{EntityStore, JsonSnapshotStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = load_config().await;

    // inventaire : un snapshot illisible au démarrage laisse un store vide, rechargeable via /store/reload
    let store = match JsonSnapshotStore::load(&cfg.data_dir).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, data_dir = %cfg.data_dir.display(), "failed to load inventory snapshot");
            JsonSnapshotStore::empty(&cfg.data_dir)
        }
    };
    let store = Arc::new(store);

    // file d'alertes at-most-once
    let (alert_queue, alert_rx) = alert_channel(cfg.compliance.alert_queue_capacity);
    let health = HealthTracker::new(alert_queue.counters());

    match &cfg.mqtt {
        Some(mqtt_cfg) => {
            let (client, eventloop) = mqtt::create_mqtt_client(mqtt_cfg);
            mqtt::spawn_event_loop(eventloop, health.clone());
            mqtt::spawn_alert_forwarder(alert_rx, client, mqtt_cfg.alert_topic.clone());
            info!(host = %mqtt_cfg.host, port = mqtt_cfg.port, topic = %mqtt_cfg.alert_topic, "alert forwarder started");
        }
        None => {
            warn!("mqtt disabled, alerts will only be logged");
            mqtt::spawn_alert_logger(alert_rx);
        }
    }

    let entity_store: Arc<dyn EntityStore> = store.clone();
    let alerts: Arc<dyn AlertSink> = Arc::new(alert_queue);
    let engine = LicenseEngine::new(entity_store, alerts, cfg.compliance.clone());

    // fabrique l'état unique pour Axum
    let app = build_router(AppState { engine, store, health });

    let listener = TcpListener::bind(&cfg.http.bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http.bind))?;
    info!(bind = %cfg.http.bind, "listening");
    axum::serve(listener, app).await.context("http server stopped")?;
    Ok(())
}
