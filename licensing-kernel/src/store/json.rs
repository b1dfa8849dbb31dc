/**
 * JSON SNAPSHOT STORE - Inventaire chargé depuis un répertoire de fichiers JSON
 *
 * FONCTIONNEMENT :
 * - {data_dir}/hosts.json         : tableau de snapshots Host (courants + historiques)
 * - {data_dir}/clusters.json      : tableau de Cluster
 * - {data_dir}/license_types.json : catalogue des license types
 * - {data_dir}/contracts/<fichier>.json : un contrat ou un tableau de contrats par fichier
 *
 * Seul le flag `ignored` des licences est modifiable : hosts.json est alors réécrit.
 *
 * Un fichier absent = collection vide. Un fichier illisible fait échouer le
 * chargement complet : on ne calcule jamais une conformité sur un inventaire partiel.
 */

use super::{EntityStore, InMemoryStore, PrimaryFilter, Snapshot};
use crate::error::StoreError;
use crate::models::{Cluster, Contract, Host, HostedDatabase, LicenseType, Technology};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Un fichier de contrats contient soit un contrat, soit une liste
#[derive(Deserialize)]
#[serde(untagged)]
enum ContractFile {
    Many(Vec<Contract>),
    One(Contract),
}

pub struct JsonSnapshotStore {
    data_dir: PathBuf,
    inner: InMemoryStore,
    /// Sérialise les écritures de hosts.json
    write_lock: Mutex<()>,
}

impl JsonSnapshotStore {
    /// Charge le snapshot initial depuis le répertoire
    pub async fn load<P: Into<PathBuf>>(data_dir: P) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        let snapshot = read_snapshot(&data_dir).await?;
        Ok(Self {
            data_dir,
            inner: InMemoryStore::new(snapshot),
            write_lock: Mutex::new(()),
        })
    }

    /// Store vide rattaché au répertoire, peuplé au prochain reload()
    pub fn empty<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            inner: InMemoryStore::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Relit le répertoire ; en cas d'erreur le snapshot précédent reste en place
    pub async fn reload(&self) -> Result<(), StoreError> {
        let snapshot = read_snapshot(&self.data_dir).await?;
        self.inner.replace(snapshot);
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Catalogue des license types, trié par part id
    pub fn list_license_types(&self, technology: Option<Technology>) -> Vec<LicenseType> {
        let mut types: Vec<LicenseType> = self
            .inner
            .current()
            .license_types
            .iter()
            .filter(|lt| technology.map_or(true, |t| lt.technology == t))
            .cloned()
            .collect();
        types.sort_by(|a, b| a.id.cmp(&b.id));
        types
    }

    /// Bascule le flag `ignored` d'une part sur une base du host courant,
    /// persiste hosts.json puis publie le nouveau snapshot.
    /// `Ok(false)` si host, base ou part sont introuvables.
    pub async fn set_license_ignored(
        &self,
        hostname: &str,
        dbname: &str,
        part_id: &str,
        ignored: bool,
        comment: Option<String>,
    ) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = Snapshot::clone(&self.inner.current());
        if !snapshot.set_license_ignored(hostname, dbname, part_id, ignored, comment) {
            return Ok(false);
        }

        let path = self.data_dir.join("hosts.json");
        let content = serde_json::to_string_pretty(&snapshot.hosts)?;
        fs::write(&path, content).await?;
        self.inner.replace(snapshot);

        info!(hostname, database = dbname, part_id, ignored, "license ignored flag updated");
        Ok(true)
    }
}

impl EntityStore for JsonSnapshotStore {
    fn list_current_hosts(&self) -> Result<Vec<Host>, StoreError> {
        self.inner.list_current_hosts()
    }

    fn list_open_primary_databases(&self, filter: &PrimaryFilter) -> Result<Vec<HostedDatabase>, StoreError> {
        self.inner.list_open_primary_databases(filter)
    }

    fn list_contracts_by_technology(&self, technology: Technology) -> Result<Vec<Contract>, StoreError> {
        self.inner.list_contracts_by_technology(technology)
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        self.inner.list_clusters()
    }

    fn lookup_license_type(&self, part_id: &str) -> Result<Option<LicenseType>, StoreError> {
        self.inner.lookup_license_type(part_id)
    }

    fn pin_snapshot(&self) -> Option<Arc<dyn EntityStore>> {
        self.inner.pin_snapshot()
    }
}

async fn read_snapshot(data_dir: &Path) -> Result<Snapshot, StoreError> {
    let snapshot = Snapshot {
        hosts: read_collection(&data_dir.join("hosts.json")).await?,
        clusters: read_collection(&data_dir.join("clusters.json")).await?,
        license_types: read_collection(&data_dir.join("license_types.json")).await?,
        contracts: load_contracts_from_dir(&data_dir.join("contracts")).await?,
    };

    info!(
        data_dir = %data_dir.display(),
        hosts = snapshot.hosts.len(),
        clusters = snapshot.clusters.len(),
        contracts = snapshot.contracts.len(),
        license_types = snapshot.license_types.len(),
        "inventory snapshot loaded"
    );
    Ok(snapshot)
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !fs::try_exists(path).await? {
        debug!(path = %path.display(), "collection file missing, using empty collection");
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| StoreError::InvalidDocument {
        path: path.display().to_string(),
        source,
    })
}

/// Charge tous les contrats du dossier contracts/, par ordre de nom de fichier
async fn load_contracts_from_dir(contracts_dir: &Path) -> Result<Vec<Contract>, StoreError> {
    if !fs::try_exists(contracts_dir).await? {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(contracts_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut contracts = Vec::new();
    for path in paths {
        let content = fs::read_to_string(&path).await?;
        let file: ContractFile = serde_json::from_str(&content).map_err(|source| StoreError::InvalidDocument {
            path: path.display().to_string(),
            source,
        })?;
        match file {
            ContractFile::Many(many) => contracts.extend(many),
            ContractFile::One(one) => contracts.push(one),
        }
        debug!(path = %path.display(), "loaded contract file");
    }
    Ok(contracts)
}
