//! License unit calculator
//!
//! Derives consumable license units from the CPU attributes of the host that
//! runs a database:
//! - Processor: cores × core factor (occupied sockets for Oracle Standard edition)
//! - Named User Plus: processor units × 25 minimum users
//! - Per socket / per core / per host
//!
//! A missing catalog entry or core-factor rule is never fatal: the engine
//! default factor applies and the computation goes on.

use super::context::ComputationContext;
use crate::error::StoreError;
use crate::models::{DatabaseExtra, Host, LicenseMetric, LicenseType};
use tracing::{debug, warn};

/// Minimum Named User Plus par processor
pub const NAMED_USER_PLUS_PER_PROCESSOR: f64 = 25.0;

fn valid_factor(factor: f64) -> bool {
    factor.is_finite() && factor >= 0.0
}

/// Core factor du host pour ce license type : première règle dont le fragment
/// apparaît dans le modèle CPU, sinon défaut du type, sinon défaut moteur.
/// Un facteur du catalogue négatif ou non fini est écarté avec un warning.
pub fn core_factor(license_type: Option<&LicenseType>, host: &Host, default_factor: f64) -> f64 {
    let Some(license_type) = license_type else {
        return default_factor;
    };

    let model = host.cpu_model.to_lowercase();
    let matched = license_type
        .core_factors
        .iter()
        .find(|rule| !rule.processor.is_empty() && model.contains(&rule.processor.to_lowercase()));

    if let Some(rule) = matched {
        if valid_factor(rule.factor) {
            return rule.factor;
        }
        warn!(
            part_id = %license_type.id,
            processor = %rule.processor,
            factor = rule.factor,
            "invalid core factor rule in catalog, falling back to default"
        );
    }

    let factor = match license_type.default_core_factor {
        Some(factor) if valid_factor(factor) => factor,
        Some(factor) => {
            warn!(
                part_id = %license_type.id,
                factor,
                "invalid default core factor in catalog, using engine default"
            );
            default_factor
        }
        None => default_factor,
    };
    debug!(
        part_id = %license_type.id,
        hostname = %host.hostname,
        cpu_model = %host.cpu_model,
        factor,
        "no usable core factor rule for processor, using default"
    );
    factor
}

/// Unités consommées par une base sur ce host (toujours ≥ 0)
pub fn license_units(host: &Host, extra: &DatabaseExtra, license_type: Option<&LicenseType>, default_factor: f64) -> f64 {
    let metric = license_type.map_or(LicenseMetric::Processor, |lt| lt.metric);
    let processors = || {
        if extra.counts_processors_by_socket() {
            host.cpu_sockets as f64
        } else {
            host.cpu_cores as f64 * core_factor(license_type, host, default_factor)
        }
    };

    let units = match metric {
        LicenseMetric::Processor => processors(),
        LicenseMetric::NamedUserPlus => processors() * NAMED_USER_PLUS_PER_PROCESSOR,
        LicenseMetric::PerSocket => host.cpu_sockets as f64,
        LicenseMetric::PerCore => host.cpu_cores as f64,
        LicenseMetric::Host => 1.0,
    };
    units.max(0.0)
}

/// Recalcule les entrées en usage (count > 0) de toutes les bases des hosts.
/// Sans télémétrie CPU (unités dérivées nulles) le compte observé est conservé.
pub fn apply_host_units(hosts: &mut [Host], ctx: &mut ComputationContext) -> Result<(), StoreError> {
    let default_factor = ctx.default_core_factor();

    for host in hosts.iter_mut() {
        let mut databases = std::mem::take(&mut host.databases);
        for database in databases.iter_mut() {
            for license in database.licenses.iter_mut().filter(|l| l.count > 0.0) {
                let part_id = license.part_id().to_string();
                let license_type = ctx.license_type(&part_id)?;
                let units = license_units(host, &database.extra, license_type, default_factor);

                if units > 0.0 {
                    license.count = units;
                } else {
                    debug!(
                        hostname = %host.hostname,
                        database = %database.name,
                        part_id = %part_id,
                        observed = license.count,
                        "no cpu telemetry, keeping observed license count"
                    );
                }
            }
        }
        host.databases = databases;
    }
    Ok(())
}
