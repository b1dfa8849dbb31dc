/**
 * LICENSING - Moteur de conformité des licences base de données
 *
 * RÔLE :
 * Réconcilie l'inventaire (hosts, bases, clusters) avec les contrats pour
 * produire un verdict par part : unités consommées vs unités couvertes.
 *
 * FONCTIONNEMENT (un calcul) :
 * 1. Lectures en bloc : hosts courants, clusters, contrats par technologie
 * 2. units       : unités recalculées depuis le CPU du host
 * 3. propagation : les standby héritent des licences de leur primary
 * 4. cluster     : un record par (part, cluster ou host), max du groupe
 * 5. coverage    : budgets des contrats affectés aux records
 * 6. reducer     : verdicts par part + agrégat
 *
 * Aucun état entre deux appels : le ComputationContext vit le temps du calcul
 * et toutes les lectures passent par le même snapshot figé.
 * Seule une erreur du store interrompt un calcul.
 */

pub mod cluster;
pub mod context;
pub mod coverage;
pub mod propagation;
pub mod reducer;
pub mod units;

pub use context::ComputationContext;
pub use reducer::{ComplianceReport, ComplianceSummary, LicenseUsage, PartCompliance};

use crate::alerts::AlertSink;
use crate::config::ComplianceSettings;
use crate::error::ComplianceError;
use crate::models::{Host, Technology};
use crate::store::EntityStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Périmètre d'un calcul. La corrélation standby → primary ignore ce filtre.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeFilter {
    pub technology: Option<Technology>,
    /// Vide = toutes les locations
    pub locations: Vec<String>,
    pub environment: Option<String>,
}

impl ScopeFilter {
    pub fn includes_host(&self, host: &Host) -> bool {
        let location_ok = self.locations.is_empty() || self.locations.iter().any(|l| *l == host.location);
        let environment_ok = self.environment.as_ref().map_or(true, |e| *e == host.environment);
        location_ok && environment_ok
    }

    pub fn technologies(&self) -> Vec<Technology> {
        match self.technology {
            Some(technology) => vec![technology],
            None => Technology::ALL.to_vec(),
        }
    }
}

#[derive(Clone)]
pub struct LicenseEngine {
    store: Arc<dyn EntityStore>,
    alerts: Arc<dyn AlertSink>,
    settings: ComplianceSettings,
}

impl LicenseEngine {
    pub fn new(store: Arc<dyn EntityStore>, alerts: Arc<dyn AlertSink>, settings: ComplianceSettings) -> Self {
        Self { store, alerts, settings }
    }

    pub fn compute_license_compliance(&self, filter: &ScopeFilter) -> Result<ComplianceReport, ComplianceError> {
        // Une seule vue de l'inventaire pour tout le calcul, même si un reload survient
        let pinned = self.store.pin_snapshot();
        let store: &dyn EntityStore = pinned.as_deref().unwrap_or(self.store.as_ref());

        let mut hosts: Vec<Host> = store
            .list_current_hosts()?
            .into_iter()
            .filter(|h| filter.includes_host(h))
            .collect();
        let clusters = store.list_clusters()?;
        let mut contracts = Vec::new();
        for technology in filter.technologies() {
            contracts.extend(store.list_contracts_by_technology(technology)?);
        }
        debug!(
            hosts = hosts.len(),
            clusters = clusters.len(),
            contracts = contracts.len(),
            "inventory loaded for compliance"
        );

        let mut ctx = ComputationContext::new(store, &self.settings);
        units::apply_host_units(&mut hosts, &mut ctx)?;
        let propagation = propagation::propagate_standby_licenses(&mut hosts, &mut ctx, self.alerts.as_ref())?;

        let usages = cluster::collect_usages(&hosts, filter.technology);
        let index = cluster::ClusterIndex::build(&hosts, &clusters);
        let records = cluster::aggregate_by_cluster(&usages, &index);
        let coverage = coverage::resolve_coverage(&records, &contracts);
        let catalog = ctx.resolve_catalog(coverage.parts.keys().map(String::as_str))?;
        let report = reducer::reduce(&records, &coverage, &catalog);

        info!(
            parts = report.aggregate.count,
            used = report.aggregate.used,
            compliant = report.aggregate.compliant,
            propagated = propagation.updated,
            missing_primary = propagation.missing_primary,
            "license compliance computed"
        );
        Ok(report)
    }
}
