//! Shared inventory fixtures for the integration tests.
#![allow(dead_code)]

use licensing_kernel::alerts::AlertSink;
use licensing_kernel::config::ComplianceSettings;
use licensing_kernel::licensing::LicenseEngine;
use licensing_kernel::models::{
    Alert, Cluster, Contract, CoreFactorRule, Database, DatabaseExtra, DatabaseRole, DatabaseStatus, Host,
    LicenseEntry, LicenseMetric, LicenseType, MySqlEdition, OracleEdition, Technology,
};
use licensing_kernel::store::{EntityStore, InMemoryStore, Snapshot};
use parking_lot::Mutex;
use std::sync::Arc;

pub const XEON: &str = "Intel(R) Xeon(R) CPU E5-2680 v4 @ 2.40GHz";

#[derive(Default)]
pub struct RecordingSink {
    pub alerts: Mutex<Vec<Alert>>,
}

impl AlertSink for RecordingSink {
    fn publish(&self, alert: Alert) {
        self.alerts.lock().push(alert);
    }
}

/// Host sans télémétrie CPU : les comptes observés sont conservés
pub fn host(hostname: &str, databases: Vec<Database>) -> Host {
    Host {
        hostname: hostname.into(),
        location: "Italy".into(),
        environment: "PROD".into(),
        cpu_model: String::new(),
        cpu_sockets: 0,
        cpu_cores: 0,
        cpu_threads: 0,
        cores_per_socket: 0,
        cluster: None,
        databases,
        created_at: None,
        archived: false,
    }
}

pub fn xeon_host(hostname: &str, cores: u32, databases: Vec<Database>) -> Host {
    Host {
        cpu_model: XEON.into(),
        cpu_sockets: 1,
        cpu_cores: cores,
        cpu_threads: cores * 2,
        cores_per_socket: cores,
        ..host(hostname, databases)
    }
}

pub fn license(part_id: &str, count: f64) -> LicenseEntry {
    LicenseEntry {
        license_type_id: part_id.into(),
        name: format!("{} license", part_id),
        count,
        ignored: false,
        ignored_comment: None,
        propagated: false,
    }
}

pub fn oracle_db(name: &str, db_id: u64, role: DatabaseRole, licenses: Vec<LicenseEntry>) -> Database {
    let status = match role {
        DatabaseRole::Primary => DatabaseStatus::Open,
        _ => DatabaseStatus::Mounted,
    };
    Database {
        name: name.into(),
        db_id,
        role,
        status,
        extra: DatabaseExtra::Oracle { edition: OracleEdition::Enterprise, rac: false },
        licenses,
    }
}

pub fn mysql_db(name: &str, licenses: Vec<LicenseEntry>) -> Database {
    Database {
        name: name.into(),
        db_id: 100,
        role: DatabaseRole::Primary,
        status: DatabaseStatus::Open,
        extra: DatabaseExtra::MySql { edition: MySqlEdition::Enterprise },
        licenses,
    }
}

pub fn processor_type(part_id: &str) -> LicenseType {
    LicenseType {
        id: part_id.into(),
        item_description: format!("{} Processor Perpetual", part_id),
        technology: Technology::Oracle,
        metric: LicenseMetric::Processor,
        core_factors: vec![
            CoreFactorRule { processor: "SPARC".into(), factor: 0.25 },
            CoreFactorRule { processor: "xeon".into(), factor: 0.5 },
        ],
        default_core_factor: None,
    }
}

pub fn contract(contract_id: &str, part_ids: &[&str], covered: f64) -> Contract {
    Contract {
        contract_id: contract_id.into(),
        technology: Technology::Oracle,
        part_ids: part_ids.iter().map(|p| p.to_string()).collect(),
        unlimited: false,
        basket: false,
        restricted: false,
        covered_licenses_count: covered,
        hosts: Vec::new(),
    }
}

pub fn cluster(name: &str, hostnames: &[&str], cpu: Option<f64>) -> Cluster {
    Cluster {
        name: name.into(),
        hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
        cpu,
    }
}

pub fn engine_with_store(store: Arc<dyn EntityStore>) -> (LicenseEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let engine = LicenseEngine::new(store, sink.clone(), ComplianceSettings::default());
    (engine, sink)
}

pub fn engine(snapshot: Snapshot) -> (LicenseEngine, Arc<RecordingSink>) {
    engine_with_store(Arc::new(InMemoryStore::new(snapshot)))
}
