use super::{current_hosts, open_primary_databases, EntityStore, PrimaryFilter};
use crate::error::StoreError;
use crate::models::{Cluster, Contract, Host, HostedDatabase, LicenseType, Technology};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Contenu complet de l'inventaire à un instant donné.
/// `hosts` peut contenir des snapshots historiques (archived = true).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub license_types: Vec<LicenseType>,
}

impl Snapshot {
    /// Position du snapshot courant d'un hostname (même règle que `current_hosts`)
    fn current_host_index(&self, hostname: &str) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, host) in self.hosts.iter().enumerate() {
            if host.archived || host.hostname != hostname {
                continue;
            }
            match best {
                Some(b) if self.hosts[b].created_at >= host.created_at => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Marque (ou démarque) comme ignorées les entrées d'une part sur une base
    /// du host courant. `false` si host, base ou part sont introuvables.
    pub fn set_license_ignored(
        &mut self,
        hostname: &str,
        dbname: &str,
        part_id: &str,
        ignored: bool,
        comment: Option<String>,
    ) -> bool {
        let Some(index) = self.current_host_index(hostname) else {
            return false;
        };
        let Some(database) = self.hosts[index].databases.iter_mut().find(|db| db.name == dbname) else {
            return false;
        };

        let mut found = false;
        for license in database.licenses.iter_mut().filter(|l| l.part_id() == part_id) {
            license.ignored = ignored;
            license.ignored_comment = if ignored { comment.clone() } else { None };
            found = true;
        }
        found
    }
}

/// Un snapshot figé se lit comme un store : c'est la vue cohérente d'un calcul
impl EntityStore for Snapshot {
    fn list_current_hosts(&self) -> Result<Vec<Host>, StoreError> {
        Ok(current_hosts(&self.hosts))
    }

    fn list_open_primary_databases(&self, filter: &PrimaryFilter) -> Result<Vec<HostedDatabase>, StoreError> {
        Ok(open_primary_databases(&current_hosts(&self.hosts), filter))
    }

    fn list_contracts_by_technology(&self, technology: Technology) -> Result<Vec<Contract>, StoreError> {
        Ok(self.contracts.iter().filter(|c| c.technology == technology).cloned().collect())
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        Ok(self.clusters.clone())
    }

    fn lookup_license_type(&self, part_id: &str) -> Result<Option<LicenseType>, StoreError> {
        Ok(self.license_types.iter().find(|lt| lt.id == part_id).cloned())
    }
}

/// Store en mémoire, remplaçable d'un bloc (reload)
pub struct InMemoryStore {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl InMemoryStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Remplace le snapshot courant ; les calculs en cours gardent le leur
    pub fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write() = Arc::new(snapshot);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl EntityStore for InMemoryStore {
    fn list_current_hosts(&self) -> Result<Vec<Host>, StoreError> {
        self.current().list_current_hosts()
    }

    fn list_open_primary_databases(&self, filter: &PrimaryFilter) -> Result<Vec<HostedDatabase>, StoreError> {
        self.current().list_open_primary_databases(filter)
    }

    fn list_contracts_by_technology(&self, technology: Technology) -> Result<Vec<Contract>, StoreError> {
        self.current().list_contracts_by_technology(technology)
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        self.current().list_clusters()
    }

    fn lookup_license_type(&self, part_id: &str) -> Result<Option<LicenseType>, StoreError> {
        self.current().lookup_license_type(part_id)
    }

    fn pin_snapshot(&self) -> Option<Arc<dyn EntityStore>> {
        Some(self.current())
    }
}
