//! Standby license propagator
//!
//! A standby (or any non-primary database open or mounted) inherits the
//! license obligations of its primary, found by (technology, db_id, name)
//! across the whole current inventory. Units are recomputed with the standby host's own CPU.

use super::context::ComputationContext;
use super::units::license_units;
use crate::alerts::AlertSink;
use crate::error::StoreError;
use crate::models::{Alert, Host, HostedDatabase, LicenseEntry, Technology};
use std::collections::HashMap;
use tracing::{debug, warn};

type PrimaryKey = (Technology, u64, String);

/// Index (technology, db_id, name) → primary ouverte.
/// Plusieurs candidates pour une même clé : le plus petit hostname l'emporte.
#[derive(Debug, Default)]
pub struct PrimaryIndex {
    by_key: HashMap<PrimaryKey, HostedDatabase>,
}

impl PrimaryIndex {
    pub fn build(mut primaries: Vec<HostedDatabase>) -> Self {
        primaries.sort_by(|a, b| a.hostname.cmp(&b.hostname));

        let mut by_key: HashMap<PrimaryKey, HostedDatabase> = HashMap::with_capacity(primaries.len());
        for primary in primaries {
            let key = (
                primary.database.technology(),
                primary.database.db_id,
                primary.database.name.clone(),
            );
            if let Some(kept) = by_key.get(&key) {
                debug!(
                    database = %primary.database.name,
                    db_id = primary.database.db_id,
                    kept = %kept.hostname,
                    ignored = %primary.hostname,
                    "duplicate primary database"
                );
                continue;
            }
            by_key.insert(key, primary);
        }
        Self { by_key }
    }

    pub fn find(&self, technology: Technology, db_id: u64, name: &str) -> Option<&HostedDatabase> {
        self.by_key.get(&(technology, db_id, name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Entrées de standby écrasées ou ajoutées
    pub updated: usize,
    /// Standby sans primary correspondante (une alerte chacune)
    pub missing_primary: usize,
}

pub fn propagate_standby_licenses(
    hosts: &mut [Host],
    ctx: &mut ComputationContext,
    alerts: &dyn AlertSink,
) -> Result<PropagationOutcome, StoreError> {
    let default_factor = ctx.default_core_factor();
    let mut outcome = PropagationOutcome::default();

    for host in hosts.iter_mut() {
        let mut databases = std::mem::take(&mut host.databases);

        for standby in databases.iter_mut().filter(|db| db.is_standby_candidate()) {
            let primary_licenses = ctx
                .primary_index()?
                .find(standby.technology(), standby.db_id, &standby.name)
                .map(|primary| primary.database.licenses.clone());

            let Some(primary_licenses) = primary_licenses else {
                warn!(
                    hostname = %host.hostname,
                    database = %standby.name,
                    db_id = standby.db_id,
                    "no open primary database for standby, license propagation skipped"
                );
                alerts.publish(Alert::missing_primary_database(&host.hostname, &standby.name));
                outcome.missing_primary += 1;
                continue;
            };

            for source in primary_licenses.into_iter().filter(|l| l.count > 0.0) {
                let license_type = ctx.license_type(source.part_id())?;
                let units = license_units(host, &standby.extra, license_type, default_factor);
                let count = if units > 0.0 { units } else { source.count };

                match standby.licenses.iter_mut().find(|l| l.same_license(&source)) {
                    Some(existing) => existing.count = count,
                    None => standby.licenses.push(LicenseEntry {
                        count,
                        ignored: false,
                        ignored_comment: None,
                        propagated: true,
                        ..source
                    }),
                }
                outcome.updated += 1;
            }
        }

        host.databases = databases;
    }

    if outcome.missing_primary > 0 {
        debug!(missing = outcome.missing_primary, "standby databases without primary");
    }
    Ok(outcome)
}
