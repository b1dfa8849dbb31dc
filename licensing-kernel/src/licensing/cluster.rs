//! Cluster aggregator
//!
//! Collapses per-database consumption into one record per (part, key), where
//! the key is the cluster of the host or the host itself. Within a group the
//! consumption is the maximum, never the sum: a cluster licenses its hardware
//! once whatever the number of databases it runs.

use crate::models::{Cluster, Host, Technology};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Ratio appliqué à la capacité CPU déclarée d'un cluster
pub const CLUSTER_CAPACITY_CORE_FACTOR: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AggregationKey {
    Cluster(String),
    Host(String),
}

impl AggregationKey {
    pub fn name(&self) -> &str {
        match self {
            AggregationKey::Cluster(name) | AggregationKey::Host(name) => name,
        }
    }
}

impl fmt::Display for AggregationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationKey::Cluster(name) => write!(f, "cluster_{}", name),
            AggregationKey::Host(name) => write!(f, "host_{}", name),
        }
    }
}

impl Serialize for AggregationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Consommation d'une part par une base, après calcul et propagation
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseUsage {
    pub part_id: String,
    pub technology: Technology,
    pub hostname: String,
    pub database: String,
    pub consumed: f64,
}

/// Extrait les entrées en usage. Les entrées ignorées ou nulles ne comptent pas.
pub fn collect_usages(hosts: &[Host], technology: Option<Technology>) -> Vec<DatabaseUsage> {
    let mut usages = Vec::new();
    for host in hosts {
        for database in &host.databases {
            let db_technology = database.technology();
            if technology.is_some_and(|t| t != db_technology) {
                continue;
            }
            for license in database.licenses.iter().filter(|l| !l.ignored && l.count > 0.0) {
                usages.push(DatabaseUsage {
                    part_id: license.part_id().to_string(),
                    technology: db_technology,
                    hostname: host.hostname.clone(),
                    database: database.name.clone(),
                    consumed: license.count,
                });
            }
        }
    }
    usages
}

/// Appartenance host → cluster et capacités déclarées
#[derive(Debug, Default)]
pub struct ClusterIndex {
    membership: BTreeMap<String, String>,
    capacities: BTreeMap<String, f64>,
}

impl ClusterIndex {
    /// Le champ `cluster` du host prime ; sinon le plus petit nom de cluster qui le liste.
    pub fn build(hosts: &[Host], clusters: &[Cluster]) -> Self {
        let mut sorted: Vec<&Cluster> = clusters.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut membership = BTreeMap::new();
        let mut capacities = BTreeMap::new();
        for cluster in sorted {
            for hostname in &cluster.hostnames {
                membership.entry(hostname.clone()).or_insert_with(|| cluster.name.clone());
            }
            if let Some(cpu) = cluster.cpu.filter(|cpu| *cpu > 0.0) {
                capacities.entry(cluster.name.clone()).or_insert(cpu);
            }
        }

        for host in hosts {
            if let Some(cluster) = host.cluster.as_deref().filter(|c| !c.is_empty()) {
                membership.insert(host.hostname.clone(), cluster.to_string());
            }
        }

        Self { membership, capacities }
    }

    pub fn key_for(&self, hostname: &str) -> AggregationKey {
        match self.membership.get(hostname) {
            Some(cluster) => AggregationKey::Cluster(cluster.clone()),
            None => AggregationKey::Host(hostname.to_string()),
        }
    }

    pub fn capacity(&self, key: &AggregationKey) -> Option<f64> {
        match key {
            AggregationKey::Cluster(name) => self.capacities.get(name).copied(),
            AggregationKey::Host(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRecord {
    pub part_id: String,
    pub technology: Technology,
    pub key: AggregationKey,
    pub hostnames: BTreeSet<String>,
    pub consumed: f64,
}

/// Un record par (part, clé), triés par part puis clé
pub fn aggregate_by_cluster(usages: &[DatabaseUsage], index: &ClusterIndex) -> Vec<ConsumptionRecord> {
    let mut groups: BTreeMap<(String, AggregationKey), ConsumptionRecord> = BTreeMap::new();

    for usage in usages {
        let key = index.key_for(&usage.hostname);
        let record = groups
            .entry((usage.part_id.clone(), key.clone()))
            .or_insert_with(|| ConsumptionRecord {
                part_id: usage.part_id.clone(),
                technology: usage.technology,
                key,
                hostnames: BTreeSet::new(),
                consumed: 0.0,
            });
        record.hostnames.insert(usage.hostname.clone());
        record.consumed = record.consumed.max(usage.consumed);
    }

    groups
        .into_values()
        .map(|mut record| {
            if let Some(capacity) = index.capacity(&record.key) {
                let consumed = capacity * CLUSTER_CAPACITY_CORE_FACTOR;
                debug!(
                    part_id = %record.part_id,
                    key = %record.key,
                    observed_max = record.consumed,
                    consumed,
                    "cluster capacity supersedes per-database maximum"
                );
                record.consumed = consumed;
            }
            record
        })
        .collect()
}
