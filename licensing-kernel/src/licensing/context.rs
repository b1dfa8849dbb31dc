use super::propagation::PrimaryIndex;
use crate::config::ComplianceSettings;
use crate::error::StoreError;
use crate::models::LicenseType;
use crate::store::{EntityStore, PrimaryFilter};
use std::collections::HashMap;
use tracing::warn;

/// État d'un seul calcul de conformité.
///
/// Remplace les caches globaux : l'index des primary et le catalogue des
/// license types sont mémoïsés ici et jetés à la fin de l'appel.
pub struct ComputationContext<'a> {
    store: &'a dyn EntityStore,
    settings: &'a ComplianceSettings,
    license_types: HashMap<String, Option<LicenseType>>,
    primaries: Option<PrimaryIndex>,
}

impl<'a> ComputationContext<'a> {
    pub fn new(store: &'a dyn EntityStore, settings: &'a ComplianceSettings) -> Self {
        Self {
            store,
            settings,
            license_types: HashMap::new(),
            primaries: None,
        }
    }

    pub fn default_core_factor(&self) -> f64 {
        self.settings.default_core_factor
    }

    /// Entrée du catalogue, lue au plus une fois par part et par calcul
    pub fn license_type(&mut self, part_id: &str) -> Result<Option<&LicenseType>, StoreError> {
        if !self.license_types.contains_key(part_id) {
            let found = self.store.lookup_license_type(part_id)?;
            if found.is_none() {
                warn!(part_id, "license type missing from catalog, using processor metric and default core factor");
            }
            self.license_types.insert(part_id.to_string(), found);
        }
        Ok(self.license_types.get(part_id).and_then(Option::as_ref))
    }

    /// Résout un ensemble de parts ; les parts inconnues du catalogue sont absentes du résultat
    pub fn resolve_catalog<'p, I>(&mut self, part_ids: I) -> Result<HashMap<String, LicenseType>, StoreError>
    where
        I: IntoIterator<Item = &'p str>,
    {
        let mut catalog = HashMap::new();
        for part_id in part_ids {
            if catalog.contains_key(part_id) {
                continue;
            }
            if let Some(license_type) = self.license_type(part_id)? {
                catalog.insert(part_id.to_string(), license_type.clone());
            }
        }
        Ok(catalog)
    }

    /// Index des primary ouvertes de tout l'inventaire, chargé au premier besoin
    pub fn primary_index(&mut self) -> Result<&PrimaryIndex, StoreError> {
        if self.primaries.is_none() {
            let primaries = self.store.list_open_primary_databases(&PrimaryFilter::default())?;
            self.primaries = Some(PrimaryIndex::build(primaries));
        }
        Ok(self.primaries.get_or_insert_with(PrimaryIndex::default))
    }
}
