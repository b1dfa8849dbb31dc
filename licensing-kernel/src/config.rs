use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub http: HttpConf,
    /// Répertoire du snapshot inventaire (hosts.json, clusters.json, contracts/...)
    pub data_dir: PathBuf,
    pub mqtt: Option<MqttConf>,
    pub compliance: ComplianceSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub bind: String, // ex: "0.0.0.0:8080"
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
}

/// Réglages du moteur de conformité
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ComplianceSettings {
    /// Core factor appliqué quand aucune règle du catalogue ne correspond au CPU
    pub default_core_factor: f64,
    /// Taille de la file d'alertes ; au-delà les alertes sont perdues (at-most-once)
    pub alert_queue_capacity: usize,
}

fn default_client_id() -> String {
    "licensing-kernel".into()
}

fn default_alert_topic() -> String {
    "licensing/alerts/new@v1".into()
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            default_core_factor: 1.0,
            alert_queue_capacity: 256,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            http: HttpConf::default(),
            data_dir: PathBuf::from("./data"),
            mqtt: Some(MqttConf {
                host: "localhost".into(),
                port: 1883,
                client_id: default_client_id(),
                alert_topic: default_alert_topic(),
            }),
            compliance: ComplianceSettings::default(),
        }
    }
}

pub fn parse_config(txt: &str) -> Result<KernelConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt)
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("LICENSING_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt).unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "invalid config, using defaults");
            KernelConfig::default()
        })
    } else {
        warn!(path = %path, "no config file, using defaults");
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg = parse_config(
            "data_dir: /var/lib/licensing\ncompliance:\n  default_core_factor: 0.5\nmqtt:\n  host: broker\n  port: 1884\n",
        )
        .unwrap();

        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/licensing"));
        assert_eq!(cfg.compliance.default_core_factor, 0.5);
        assert_eq!(cfg.compliance.alert_queue_capacity, 256);
        assert_eq!(cfg.http.bind, "0.0.0.0:8080");

        let mqtt = cfg.mqtt.unwrap();
        assert_eq!(mqtt.host, "broker");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(mqtt.alert_topic, "licensing/alerts/new@v1");
    }

    #[test]
    fn test_empty_config_is_default() {
        let cfg = parse_config("  \n").unwrap();
        assert_eq!(cfg.compliance.default_core_factor, 1.0);
        assert!(cfg.mqtt.is_some());
    }

    #[test]
    fn test_mqtt_can_be_disabled() {
        let cfg = parse_config("mqtt: null\n").unwrap();
        assert!(cfg.mqtt.is_none());
    }
}
