//! # Timber Reconciler
//!
//! A library for reconciling timber stock between a regulatory tracking
//! system (per-species balance reports, transformations, consumption) and an
//! internal ERP (dated entry/exit ledgers per SKU).
//!
//! ## Core Concepts
//!
//! - **Raw rows**: ledger rows as extracted from source documents, quantities
//!   kept as text so malformed values degrade instead of failing
//! - **Reconstruction**: every running balance is recomputed from a carried
//!   opening balance; source balances are never trusted
//! - **Groups**: raw item identities from either system are mapped onto
//!   canonical group names, and ERP groups are linked to regulatory groups
//! - **Reconciliation**: per-group net flows from both systems joined
//!   side-by-side, difference = regulatory − ERP
//!
//! ## Example
//!
//! ```rust,ignore
//! use timber_reconciler::*;
//! use chrono::NaiveDate;
//!
//! let mut store = MemoryMovementStore::new();
//! store.upsert_batch(rows_from_report, DedupeKey::Month)?;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
//! let ledger = build_period_ledger(&store, start, end)?;
//!
//! let resolver = GroupResolver::new(memberships, links);
//! let erp_nets = net_totals(&aggregate_movements(&ledger.rows, &resolver));
//! let rows = reconcile(&regulatory_nets, &erp_nets);
//! ```

pub mod aggregate;
pub mod error;
pub mod grouping;
pub mod ledger;
pub mod movement;
pub mod naming;
pub mod normalize;
pub mod schema;
pub mod similarity;
pub mod store;
pub mod utils;

pub use aggregate::{
    aggregate_flows, aggregate_movements, closing_balances, net_totals, reconcile, FlowEntry,
    FlowRole, FlowTotals, GroupResolver,
};
pub use error::{ReconcilerError, Result};
pub use grouping::{GroupingStore, LinkStore};
pub use ledger::{reconstruct, DataQualityReport, LedgerView};
pub use movement::{
    BatchOutcome, ConsumptionStore, DedupeKey, MemoryConsumptionStore, MemoryMovementStore,
    MemoryTransformationStore, MovementStore, TransformationStore,
};
pub use naming::suggest_group_name;
pub use normalize::{categorize, normalize};
pub use schema::*;
pub use similarity::{score, sequence_ratio, suggest_links, LinkSuggestion, DEFAULT_LINK_THRESHOLD};
pub use store::{MemoryTable, Table};
pub use utils::*;

use chrono::NaiveDate;
use log::{debug, info};

/// Queries a movement store over `[start, end]` and reconstructs the period
/// ledger: prior balances are fetched for every known item, raw rows are
/// cleaned, and running balances are recomputed.
pub fn build_period_ledger<S: MovementStore>(
    store: &S,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<LedgerView> {
    let registry = store.item_registry()?;
    let keys: Vec<String> = registry.iter().map(|i| i.key.clone()).collect();
    let prior = store.last_balance_before(start, &keys)?;
    let raw = store.query(start, end)?;

    debug!(
        "period {}..{}: {} raw row(s), {} known item(s), {} prior balance(s)",
        start,
        end,
        raw.len(),
        registry.len(),
        prior.len()
    );

    let view = reconstruct(&raw, &prior, &registry);
    if view.report.malformed_values > 0 || view.report.duplicate_summaries > 0 {
        info!(
            "reconstruction repaired {} malformed value(s) and {} duplicate summary row(s)",
            view.report.malformed_values, view.report.duplicate_summaries
        );
    }
    Ok(view)
}

/// Compares regulatory flow records (transformations and consumption) against
/// the ERP period ledger, per group. The regulatory side nets generated
/// volumes against origins and consumption; the ERP side nets ledger entries
/// against exits. Groups present on only one side compare against 0.
pub fn run_flow_audit(
    transformations: &[TransformationRecord],
    consumption: &[ConsumptionRecord],
    erp_ledger: &LedgerView,
    regulatory_resolver: &GroupResolver,
    erp_resolver: &GroupResolver,
) -> Vec<ReconciliationRow> {
    let mut regulatory = aggregate_flows(transformations, regulatory_resolver);
    for (group, totals) in aggregate_flows(consumption, regulatory_resolver) {
        let entry = regulatory.entry(group).or_default();
        entry.entry_total += totals.entry_total;
        entry.exit_total += totals.exit_total;
    }

    let erp = aggregate_movements(&erp_ledger.rows, erp_resolver);

    info!(
        "flow audit: {} regulatory group(s) vs {} ERP group(s)",
        regulatory.len(),
        erp.len()
    );
    reconcile(&net_totals(&regulatory), &net_totals(&erp))
}

/// Sums per-group closing balances from both period ledgers side by side.
pub fn compare_closing_balances(
    regulatory_ledger: &LedgerView,
    erp_ledger: &LedgerView,
    regulatory_resolver: &GroupResolver,
    erp_resolver: &GroupResolver,
) -> Vec<ReconciliationRow> {
    let regulatory = closing_balances(&regulatory_ledger.rows, regulatory_resolver);
    let erp = closing_balances(&erp_ledger.rows, erp_resolver);
    reconcile(&regulatory, &erp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn raw_row(item: &str, date: &str, entry: &str, exit: &str, balance: &str) -> RawMovementRow {
        RawMovementRow {
            seq: 0,
            item_key: item.to_string(),
            display_name: item.to_string(),
            category: "SERRADA".to_string(),
            date: Some(d(date)),
            kind_label: "NF".to_string(),
            entry: entry.to_string(),
            exit: exit.to_string(),
            balance: balance.to_string(),
            unit_value: String::new(),
            total_value: String::new(),
            document: String::new(),
        }
    }

    #[test]
    fn test_build_period_ledger_end_to_end() {
        let mut store = MemoryMovementStore::new();
        store
            .upsert_batch(
                vec![
                    raw_row("SKU-1", "2024-02-20", "100", "0", "100"),
                    raw_row("SKU-1", "2024-03-05", "10", "0", "110"),
                    raw_row("SKU-1", "2024-03-10", "0", "4", "106"),
                ],
                DedupeKey::Date,
            )
            .unwrap();

        let view = build_period_ledger(&store, d("2024-03-01"), d("2024-03-31")).unwrap();
        let total = view
            .rows
            .iter()
            .find(|r| r.kind == RowKind::Total)
            .unwrap();
        assert_eq!(
            total.balance_after, 106.0,
            "February balance must carry into March"
        );
        assert_eq!(total.entry_qty, 10.0);
        assert_eq!(total.exit_qty, 4.0);
    }

    #[test]
    fn test_run_flow_audit_end_to_end() {
        let transformations = vec![TransformationRecord {
            number: "77".to_string(),
            date: Some(d("2024-03-03")),
            role: TransformationRole::Generated,
            product: "20 - Madeira Serrada em Bruto".to_string(),
            species: "IPE".to_string(),
            volume: 12.0,
            unit: "M3".to_string(),
        }];
        let consumption = vec![ConsumptionRecord {
            date: Some(d("2024-03-08")),
            product: "20 - Madeira Serrada em Bruto".to_string(),
            species: "IPE".to_string(),
            volume: 2.0,
            document: "NF 9".to_string(),
        }];

        let mut store = MemoryMovementStore::new();
        store
            .upsert_batch(
                vec![
                    raw_row("SKU-1", "2024-03-05", "12", "0", "12"),
                    raw_row("SKU-1", "2024-03-09", "0", "3", "9"),
                ],
                DedupeKey::Date,
            )
            .unwrap();
        let erp_ledger = build_period_ledger(&store, d("2024-03-01"), d("2024-03-31")).unwrap();

        let mut reg_memberships = BTreeMap::new();
        reg_memberships.insert(
            "20 - Madeira Serrada em Bruto - IPE".to_string(),
            "IPE SERRADA".to_string(),
        );
        let mut erp_memberships = BTreeMap::new();
        erp_memberships.insert("SKU-1".to_string(), "IPE SKU".to_string());
        let mut links = BTreeMap::new();
        links.insert("IPE SKU".to_string(), "IPE SERRADA".to_string());

        let rows = run_flow_audit(
            &transformations,
            &consumption,
            &erp_ledger,
            &GroupResolver::new(reg_memberships, BTreeMap::new()),
            &GroupResolver::new(erp_memberships, links),
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group_name, "IPE SERRADA");
        assert!((rows[0].net_regulatory - 10.0).abs() < 1e-9);
        assert!((rows[0].net_erp - 9.0).abs() < 1e-9);
        assert!((rows[0].difference - 1.0).abs() < 1e-9);
    }
}
