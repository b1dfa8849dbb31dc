/**
 * ENTITY STORE - Accès lecture seule à l'inventaire
 *
 * RÔLE :
 * Abstraction du store de documents : hosts (avec leurs bases inline), bases
 * primary ouvertes, clusters, contrats par technologie, catalogue license types.
 *
 * FONCTIONNEMENT :
 * - EntityStore trait = interface commune que le moteur de conformité consomme
 * - InMemoryStore = snapshot en mémoire (cache du store JSON, tests)
 * - JsonSnapshotStore = snapshot chargé depuis un répertoire de fichiers JSON
 *
 * Le moteur lit chaque collection une seule fois par calcul, sur la vue figée
 * rendue par pin_snapshot() quand le store en fournit une : un reload concurrent
 * ne mélange jamais deux snapshots dans un même calcul.
 */

pub mod json;
pub mod memory;

pub use json::JsonSnapshotStore;
pub use memory::{InMemoryStore, Snapshot};

use crate::error::StoreError;
use crate::models::{Cluster, Contract, Host, HostedDatabase, LicenseType, Technology};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Filtre pour la recherche des bases primary ouvertes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimaryFilter {
    pub technology: Option<Technology>,
}

pub trait EntityStore: Send + Sync {
    /// Vue courante : un snapshot par hostname, bases inline
    fn list_current_hosts(&self) -> Result<Vec<Host>, StoreError>;

    /// Bases Role=Primary et Status=Open sur tout l'inventaire courant
    fn list_open_primary_databases(&self, filter: &PrimaryFilter) -> Result<Vec<HostedDatabase>, StoreError>;

    fn list_contracts_by_technology(&self, technology: Technology) -> Result<Vec<Contract>, StoreError>;

    fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError>;

    /// `Ok(None)` si la part n'existe pas dans le catalogue
    fn lookup_license_type(&self, part_id: &str) -> Result<Option<LicenseType>, StoreError>;

    /// Vue figée du store pour toute la durée d'un calcul, si l'implémentation
    /// sait en fournir une. Sinon le moteur lit le store directement.
    fn pin_snapshot(&self) -> Option<Arc<dyn EntityStore>> {
        None
    }
}

/// Garde le snapshot non archivé le plus récent de chaque hostname.
/// À date égale le premier rencontré l'emporte. Résultat trié par hostname.
pub fn current_hosts(snapshots: &[Host]) -> Vec<Host> {
    let mut latest: BTreeMap<&str, &Host> = BTreeMap::new();
    for host in snapshots.iter().filter(|h| !h.archived) {
        match latest.get(host.hostname.as_str()) {
            Some(existing) if existing.created_at >= host.created_at => {}
            _ => {
                latest.insert(host.hostname.as_str(), host);
            }
        }
    }
    latest.into_values().cloned().collect()
}

pub fn open_primary_databases(hosts: &[Host], filter: &PrimaryFilter) -> Vec<HostedDatabase> {
    hosts
        .iter()
        .flat_map(|host| {
            host.databases
                .iter()
                .filter(|db| db.is_open_primary())
                .filter(|db| filter.technology.map_or(true, |t| db.technology() == t))
                .map(move |db| HostedDatabase {
                    hostname: host.hostname.clone(),
                    database: db.clone(),
                })
        })
        .collect()
}
