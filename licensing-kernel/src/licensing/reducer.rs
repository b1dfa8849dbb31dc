use super::cluster::{AggregationKey, ConsumptionRecord};
use super::coverage::CoverageOutcome;
use crate::models::{LicenseMetric, LicenseType, Technology};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Tolérance sur covered ≥ consumed (cumul de flottants)
pub const COMPLIANCE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartCompliance {
    pub part_id: String,
    pub item_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<Technology>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<LicenseMetric>,
    pub consumed: f64,
    pub covered: f64,
    /// Affichage uniquement, borné à [0, 1]
    pub ratio: f64,
    pub unlimited: bool,
    pub compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseUsage {
    pub part_id: String,
    pub key: AggregationKey,
    pub hostnames: BTreeSet<String>,
    pub consumed: f64,
    pub covered: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub count: usize,
    pub used: f64,
    pub compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub parts: Vec<PartCompliance>,
    pub usages: Vec<LicenseUsage>,
    pub aggregate: ComplianceSummary,
}

impl ComplianceReport {
    pub fn part(&self, part_id: &str) -> Option<&PartCompliance> {
        self.parts.iter().find(|p| p.part_id == part_id)
    }
}

pub fn is_compliant(consumed: f64, covered: f64, unlimited: bool) -> bool {
    unlimited || consumed == 0.0 || covered >= consumed - COMPLIANCE_TOLERANCE
}

pub fn coverage_ratio(consumed: f64, covered: f64, unlimited: bool) -> f64 {
    if unlimited || consumed == 0.0 {
        1.0
    } else {
        (covered / consumed).clamp(0.0, 1.0)
    }
}

/// Verdict par part et agrégat, dans l'ordre des part ids
pub fn reduce(
    records: &[ConsumptionRecord],
    coverage: &CoverageOutcome,
    catalog: &HashMap<String, LicenseType>,
) -> ComplianceReport {
    let mut consumed_by_part: BTreeMap<&str, f64> = BTreeMap::new();
    let mut usages = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        *consumed_by_part.entry(record.part_id.as_str()).or_default() += record.consumed;
        usages.push(LicenseUsage {
            part_id: record.part_id.clone(),
            key: record.key.clone(),
            hostnames: record.hostnames.clone(),
            consumed: record.consumed,
            covered: coverage.record_coverage.get(i).copied().unwrap_or_default(),
        });
    }

    let part_ids: BTreeSet<&str> = consumed_by_part
        .keys()
        .copied()
        .chain(coverage.parts.keys().map(String::as_str))
        .collect();

    let parts: Vec<PartCompliance> = part_ids
        .into_iter()
        .map(|part_id| {
            let consumed = consumed_by_part.get(part_id).copied().unwrap_or_default();
            let part = coverage.parts.get(part_id).copied().unwrap_or_default();
            let license_type = catalog.get(part_id);
            PartCompliance {
                part_id: part_id.to_string(),
                item_description: license_type.map(|lt| lt.item_description.clone()).unwrap_or_default(),
                technology: license_type.map(|lt| lt.technology),
                metric: license_type.map(|lt| lt.metric),
                consumed,
                covered: part.covered,
                ratio: coverage_ratio(consumed, part.covered, part.unlimited),
                unlimited: part.unlimited,
                compliant: is_compliant(consumed, part.covered, part.unlimited),
            }
        })
        .collect();

    let aggregate = ComplianceSummary {
        count: parts.len(),
        used: parts.iter().map(|p| p.consumed).sum(),
        compliant: parts.iter().all(|p| p.compliant),
    };

    ComplianceReport { parts, usages, aggregate }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::licensing::coverage::PartCoverage;

    fn record(part: &str, hostname: &str, consumed: f64) -> ConsumptionRecord {
        ConsumptionRecord {
            part_id: part.into(),
            technology: Technology::Oracle,
            key: AggregationKey::Host(hostname.into()),
            hostnames: BTreeSet::from([hostname.to_string()]),
            consumed,
        }
    }

    fn outcome(record_coverage: Vec<f64>, parts: &[(&str, f64, bool)]) -> CoverageOutcome {
        CoverageOutcome {
            record_coverage,
            parts: parts
                .iter()
                .map(|(id, covered, unlimited)| (id.to_string(), PartCoverage { covered: *covered, unlimited: *unlimited }))
                .collect(),
        }
    }

    #[test]
    fn test_verdict_rules() {
        assert!(is_compliant(0.0, 0.0, false));
        assert!(is_compliant(100.0, 0.0, true));
        assert!(is_compliant(3.0, 3.0, false));
        assert!(is_compliant(0.1 + 0.2, 0.3, false));
        assert!(!is_compliant(12.0, 10.0, false));

        assert_eq!(coverage_ratio(0.0, 5.0, false), 1.0);
        assert_eq!(coverage_ratio(4.0, 0.0, true), 1.0);
        assert_eq!(coverage_ratio(4.0, 8.0, false), 1.0);
        assert!((coverage_ratio(12.0, 10.0, false) - 0.8333).abs() < 1e-3);
    }

    #[test]
    fn test_under_covered_part() {
        let records = [record("A90611", "a", 6.0), record("A90611", "b", 6.0)];
        let report = reduce(&records, &outcome(vec![6.0, 4.0], &[("A90611", 10.0, false)]), &HashMap::new());

        let part = report.part("A90611").unwrap();
        assert_eq!(part.consumed, 12.0);
        assert_eq!(part.covered, 10.0);
        assert!(!part.compliant);
        assert!((part.ratio - 10.0 / 12.0).abs() < 1e-12);
        assert_eq!(report.usages[1].covered, 4.0);
        assert_eq!(report.aggregate, ComplianceSummary { count: 1, used: 12.0, compliant: false });
    }

    #[test]
    fn test_contract_only_parts_are_listed_and_compliant() {
        let report = reduce(
            &[record("L1", "a", 2.0)],
            &outcome(vec![2.0], &[("L1", 2.0, false), ("L0", 5.0, false)]),
            &HashMap::new(),
        );
        let ids: Vec<&str> = report.parts.iter().map(|p| p.part_id.as_str()).collect();
        assert_eq!(ids, vec!["L0", "L1"]);
        assert!(report.part("L0").unwrap().compliant);
        assert_eq!(report.part("L0").unwrap().ratio, 1.0);
        assert!(report.aggregate.compliant);
        assert_eq!(report.aggregate.used, 2.0);
    }

    #[test]
    fn test_catalog_enriches_parts() {
        let catalog = HashMap::from([(
            "L1".to_string(),
            LicenseType {
                id: "L1".into(),
                item_description: "Oracle Database Enterprise Edition".into(),
                technology: Technology::Oracle,
                metric: LicenseMetric::Processor,
                core_factors: Vec::new(),
                default_core_factor: None,
            },
        )]);
        let report = reduce(&[record("L1", "a", 1.0)], &outcome(vec![0.0], &[("L1", 0.0, false)]), &catalog);

        let part = report.part("L1").unwrap();
        assert_eq!(part.item_description, "Oracle Database Enterprise Edition");
        assert_eq!(part.metric, Some(LicenseMetric::Processor));
        assert!(!part.compliant);
        assert_eq!(part.ratio, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let report = reduce(&[], &CoverageOutcome::default(), &HashMap::new());
        assert!(report.parts.is_empty());
        assert_eq!(report.aggregate, ComplianceSummary { count: 0, used: 0.0, compliant: true });
    }
}
