//! Contract coverage resolver
//!
//! Contract units become budgets that consumption records draw from:
//! - one budget per listed part for a regular contract
//! - one budget shared by every part of a basket contract
//!
//! Records of a part held by an unlimited contract are fully covered without
//! drawing anything. Otherwise budgets first cover the hosts (or clusters)
//! listed on their contract, restricted budgets before the others, then
//! non-restricted budgets pool their remaining units towards any uncovered
//! record of their parts.
//!
//! Contracts are walked in a total order so the result never depends on the
//! order the store returned them in.

use super::cluster::{AggregationKey, ConsumptionRecord};
use crate::models::Contract;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartCoverage {
    pub covered: f64,
    pub unlimited: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageOutcome {
    /// Unités couvertes, dans l'ordre des records reçus
    pub record_coverage: Vec<f64>,
    /// Toutes les parts consommées ou sous contrat
    pub parts: BTreeMap<String, PartCoverage>,
}

struct Budget<'c> {
    contract: &'c Contract,
    parts: BTreeSet<&'c str>,
    remaining: f64,
}

impl Budget<'_> {
    fn draws_for(&self, part_id: &str) -> bool {
        self.parts.contains(part_id)
    }

    /// Le contrat nomme un des hosts du record ou son cluster
    fn lists(&self, record: &ConsumptionRecord) -> bool {
        let hosts = &self.contract.hosts;
        let cluster_listed = match &record.key {
            AggregationKey::Cluster(name) => hosts.contains(name),
            AggregationKey::Host(_) => false,
        };
        cluster_listed || record.hostnames.iter().any(|h| hosts.contains(h))
    }

    fn draw(&mut self, need: &mut f64, covered: &mut f64) {
        let units = need.min(self.remaining);
        if units > 0.0 {
            self.remaining -= units;
            *need -= units;
            *covered += units;
        }
    }
}

pub fn resolve_coverage(records: &[ConsumptionRecord], contracts: &[Contract]) -> CoverageOutcome {
    let mut sorted: Vec<&Contract> = contracts.iter().collect();
    sorted.sort_by(|a, b| contract_order(a, b));

    let unlimited: BTreeSet<&str> = sorted
        .iter()
        .filter(|c| c.unlimited)
        .flat_map(|c| c.part_ids.iter().map(String::as_str))
        .collect();

    let mut budgets = build_budgets(&sorted, &unlimited);

    let mut coverage = vec![0.0; records.len()];
    let mut needs: Vec<f64> = records
        .iter()
        .map(|r| if unlimited.contains(r.part_id.as_str()) { 0.0 } else { r.consumed })
        .collect();
    for (i, record) in records.iter().enumerate() {
        if unlimited.contains(record.part_id.as_str()) {
            coverage[i] = record.consumed;
        }
    }

    // hosts et clusters listés sur le contrat, budgets restreints d'abord
    for restricted in [true, false] {
        for budget in budgets.iter_mut().filter(|b| b.contract.restricted == restricted) {
            for (i, record) in records.iter().enumerate() {
                if needs[i] > 0.0 && budget.draws_for(&record.part_id) && budget.lists(record) {
                    budget.draw(&mut needs[i], &mut coverage[i]);
                }
            }
        }
    }

    // pool : non-basket puis basket, jamais les contrats restreints
    let mut pool: Vec<&mut Budget> = budgets.iter_mut().filter(|b| !b.contract.restricted).collect();
    pool.sort_by_key(|b| b.contract.basket);
    for budget in pool {
        for (i, record) in records.iter().enumerate() {
            if needs[i] > 0.0 && budget.draws_for(&record.part_id) {
                budget.draw(&mut needs[i], &mut coverage[i]);
            }
        }
    }

    let mut parts: BTreeMap<String, PartCoverage> = BTreeMap::new();
    for (record, covered) in records.iter().zip(&coverage) {
        parts.entry(record.part_id.clone()).or_default().covered += covered;
    }
    for budget in budgets.iter().filter(|b| !b.contract.restricted && b.remaining > 0.0) {
        for part in &budget.parts {
            parts.entry(part.to_string()).or_default().covered += budget.remaining;
        }
    }
    for part in &unlimited {
        let raw: f64 = sorted
            .iter()
            .filter(|c| c.covers_part(part))
            .map(|c| c.covered_licenses_count)
            .sum();
        parts.insert(part.to_string(), PartCoverage { covered: raw, unlimited: true });
    }
    for contract in &sorted {
        for part in &contract.part_ids {
            parts.entry(part.clone()).or_default();
        }
    }

    CoverageOutcome { record_coverage: coverage, parts }
}

/// Ordre total : id, restreint avant flexible, puis le reste du contenu
fn contract_order(a: &Contract, b: &Contract) -> Ordering {
    a.contract_id
        .cmp(&b.contract_id)
        .then_with(|| b.restricted.cmp(&a.restricted))
        .then_with(|| a.unlimited.cmp(&b.unlimited))
        .then_with(|| a.basket.cmp(&b.basket))
        .then_with(|| a.hosts.cmp(&b.hosts))
        .then_with(|| a.part_ids.cmp(&b.part_ids))
        .then_with(|| a.covered_licenses_count.total_cmp(&b.covered_licenses_count))
}

fn build_budgets<'c>(contracts: &[&'c Contract], unlimited: &BTreeSet<&str>) -> Vec<Budget<'c>> {
    let mut budgets = Vec::new();
    for contract in contracts.iter().copied().filter(|c| !c.unlimited) {
        let parts: BTreeSet<&str> = contract
            .part_ids
            .iter()
            .map(String::as_str)
            .filter(|p| !unlimited.contains(p))
            .collect();
        if parts.is_empty() {
            continue;
        }
        if contract.covered_licenses_count < 0.0 {
            debug!(contract_id = %contract.contract_id, "negative covered count, contract ignored");
            continue;
        }

        if contract.basket {
            budgets.push(Budget {
                contract,
                parts,
                remaining: contract.covered_licenses_count,
            });
        } else {
            for part in parts {
                budgets.push(Budget {
                    contract,
                    parts: BTreeSet::from([part]),
                    remaining: contract.covered_licenses_count,
                });
            }
        }
    }
    budgets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Technology;

    fn record(part: &str, key: AggregationKey, hostnames: &[&str], consumed: f64) -> ConsumptionRecord {
        ConsumptionRecord {
            part_id: part.into(),
            technology: Technology::Oracle,
            key,
            hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
            consumed,
        }
    }

    fn host_record(part: &str, hostname: &str, consumed: f64) -> ConsumptionRecord {
        record(part, AggregationKey::Host(hostname.into()), &[hostname], consumed)
    }

    fn contract(id: &str, parts: &[&str], count: f64) -> Contract {
        Contract {
            contract_id: id.into(),
            technology: Technology::Oracle,
            part_ids: parts.iter().map(|p| p.to_string()).collect(),
            unlimited: false,
            basket: false,
            restricted: false,
            covered_licenses_count: count,
            hosts: Vec::new(),
        }
    }

    #[test]
    fn test_partial_coverage_is_pooled_across_hosts() {
        let records = [host_record("A90611", "a", 6.0), host_record("A90611", "b", 6.0)];
        let outcome = resolve_coverage(&records, &[contract("C1", &["A90611"], 10.0)]);

        assert_eq!(outcome.record_coverage, vec![6.0, 4.0]);
        assert_eq!(outcome.parts["A90611"], PartCoverage { covered: 10.0, unlimited: false });
    }

    #[test]
    fn test_no_contract_means_no_coverage() {
        let outcome = resolve_coverage(&[host_record("L1", "a", 4.0)], &[]);
        assert_eq!(outcome.record_coverage, vec![0.0]);
        assert_eq!(outcome.parts["L1"].covered, 0.0);
    }

    #[test]
    fn test_restricted_contract_only_covers_listed_hosts() {
        let mut restricted = contract("C1", &["L1"], 10.0);
        restricted.restricted = true;
        restricted.hosts = vec!["a".into()];
        let records = [host_record("L1", "a", 2.0), host_record("L1", "b", 3.0)];

        let outcome = resolve_coverage(&records, &[restricted]);

        assert_eq!(outcome.record_coverage, vec![2.0, 0.0]);
        // le reliquat restreint n'est pas mobilisable
        assert_eq!(outcome.parts["L1"].covered, 2.0);
    }

    #[test]
    fn test_listed_hosts_are_served_before_the_pool() {
        let mut dedicated = contract("C2", &["L1"], 3.0);
        dedicated.hosts = vec!["b".into()];
        let records = [host_record("L1", "a", 3.0), host_record("L1", "b", 3.0)];

        let outcome = resolve_coverage(&records, &[contract("C1", &["L1"], 1.0), dedicated]);

        assert_eq!(outcome.record_coverage, vec![1.0, 3.0]);
        assert_eq!(outcome.parts["L1"].covered, 4.0);
    }

    #[test]
    fn test_cluster_name_listed_on_contract() {
        let mut c = contract("C1", &["L1"], 8.0);
        c.restricted = true;
        c.hosts = vec!["X".into()];
        let records = [record("L1", AggregationKey::Cluster("X".into()), &["a", "b"], 8.0)];

        let outcome = resolve_coverage(&records, &[c]);
        assert_eq!(outcome.record_coverage, vec![8.0]);
    }

    #[test]
    fn test_basket_pools_units_across_parts() {
        let mut basket = contract("B1", &["L1", "L2"], 5.0);
        basket.basket = true;
        let records = [host_record("L1", "a", 2.0), host_record("L2", "a", 2.0)];

        let outcome = resolve_coverage(&records, &[basket]);

        assert_eq!(outcome.record_coverage, vec![2.0, 2.0]);
        assert_eq!(outcome.parts["L1"].covered, 3.0);
        assert_eq!(outcome.parts["L2"].covered, 3.0);
    }

    #[test]
    fn test_non_basket_contract_budgets_each_part() {
        let records = [host_record("L1", "a", 2.0), host_record("L2", "a", 2.0)];
        let outcome = resolve_coverage(&records, &[contract("C1", &["L1", "L2"], 2.0)]);
        assert_eq!(outcome.record_coverage, vec![2.0, 2.0]);
        assert_eq!(outcome.parts["L1"].covered, 2.0);
    }

    #[test]
    fn test_regular_budgets_drain_before_basket() {
        let mut basket = contract("A-basket", &["L1", "L2"], 4.0);
        basket.basket = true;
        let records = [host_record("L1", "a", 3.0), host_record("L2", "a", 1.0)];

        let outcome = resolve_coverage(&records, &[basket, contract("Z-regular", &["L1"], 3.0)]);

        assert_eq!(outcome.record_coverage, vec![3.0, 1.0]);
        // 3 unités de basket restent disponibles pour L1 et L2
        assert_eq!(outcome.parts["L1"].covered, 6.0);
        assert_eq!(outcome.parts["L2"].covered, 4.0);
    }

    #[test]
    fn test_unlimited_part_is_fully_covered_without_drawing() {
        let mut unlimited = contract("C1", &["L1"], 0.0);
        unlimited.unlimited = true;
        let records = [host_record("L1", "a", 40.0)];

        let outcome = resolve_coverage(&records, &[unlimited, contract("C2", &["L1"], 2.0)]);

        assert_eq!(outcome.record_coverage, vec![40.0]);
        assert_eq!(outcome.parts["L1"], PartCoverage { covered: 2.0, unlimited: true });
    }

    #[test]
    fn test_contracted_part_without_consumption_is_reported() {
        let outcome = resolve_coverage(&[], &[contract("C1", &["L9"], 4.0)]);
        assert!(outcome.record_coverage.is_empty());
        assert_eq!(outcome.parts["L9"].covered, 4.0);
    }

    #[test]
    fn test_result_does_not_depend_on_contract_order() {
        let mut restricted = contract("AGR-1", &["L1"], 3.0);
        restricted.restricted = true;
        restricted.hosts = vec!["a".into()];
        let mut flexible = contract("AGR-1", &["L1"], 3.0);
        flexible.hosts = vec!["a".into()];
        let records = [host_record("L1", "a", 3.0), host_record("L1", "b", 3.0)];

        let first = resolve_coverage(&records, &[restricted.clone(), flexible.clone()]);
        let second = resolve_coverage(&records, &[flexible, restricted]);

        assert_eq!(first, second);
        assert_eq!(first.record_coverage, vec![3.0, 3.0]);
        assert_eq!(first.parts["L1"].covered, 6.0);
    }

    #[test]
    fn test_restricted_budget_serves_its_hosts_before_flexible_one() {
        let mut flexible = contract("A-flex", &["L1"], 3.0);
        flexible.hosts = vec!["a".into()];
        let mut restricted = contract("B-restr", &["L1"], 3.0);
        restricted.restricted = true;
        restricted.hosts = vec!["a".into()];
        let records = [host_record("L1", "a", 3.0), host_record("L1", "b", 3.0)];

        let outcome = resolve_coverage(&records, &[flexible, restricted]);

        assert_eq!(outcome.record_coverage, vec![3.0, 3.0]);
        assert_eq!(outcome.parts["L1"].covered, 6.0);
    }
}
