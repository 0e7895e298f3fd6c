use crate::schema::{
    ConsumptionRecord, MovementRecord, ReconciliationRow, RowKind, TransformationRecord,
    TransformationRole,
};
use log::debug;
use std::collections::BTreeMap;

/// Summed inflow/outflow volumes for one group over a period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowTotals {
    pub entry_total: f64,
    pub exit_total: f64,
}

impl FlowTotals {
    pub fn net(&self) -> f64 {
        self.entry_total - self.exit_total
    }
}

/// Resolves a raw item identity to its canonical group name. Memberships win
/// over links; identities known to neither fall through unchanged so that
/// ungrouped items still show up in comparisons under their own name.
#[derive(Debug, Clone, Default)]
pub struct GroupResolver {
    memberships: BTreeMap<String, String>,
    links: BTreeMap<String, String>,
}

impl GroupResolver {
    pub fn new(memberships: BTreeMap<String, String>, links: BTreeMap<String, String>) -> Self {
        Self { memberships, links }
    }

    pub fn resolve(&self, raw_identity: &str) -> String {
        let group = match self.memberships.get(raw_identity) {
            Some(g) => g.clone(),
            None => raw_identity.to_string(),
        };
        match self.links.get(&group) {
            Some(linked) => linked.clone(),
            None => group,
        }
    }
}

/// Sums reconstructed ledger rows into per-group flow totals. Only movement
/// rows contribute; opening and total rows are frame rows whose quantities
/// would double-count the period.
pub fn aggregate_movements(
    rows: &[MovementRecord],
    resolver: &GroupResolver,
) -> BTreeMap<String, FlowTotals> {
    let mut totals: BTreeMap<String, FlowTotals> = BTreeMap::new();
    for row in rows {
        if row.kind != RowKind::Movement {
            continue;
        }
        let group = resolver.resolve(&row.item_key);
        let entry = totals.entry(group).or_default();
        entry.entry_total += row.entry_qty;
        entry.exit_total += row.exit_qty;
    }
    totals
}

/// Sums closing balances (total-row `balance_after`) per group.
pub fn closing_balances(
    rows: &[MovementRecord],
    resolver: &GroupResolver,
) -> BTreeMap<String, f64> {
    let mut balances: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        if row.kind != RowKind::Total {
            continue;
        }
        *balances.entry(resolver.resolve(&row.item_key)).or_default() += row.balance_after;
    }
    balances
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRole {
    Entry,
    Exit,
}

/// Anything that contributes a directed volume to a group's flow totals.
pub trait FlowEntry {
    fn raw_identity(&self) -> String;
    fn volume(&self) -> f64;
    fn role(&self) -> FlowRole;
}

impl FlowEntry for TransformationRecord {
    fn raw_identity(&self) -> String {
        TransformationRecord::raw_identity(self)
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    // A generated product enters stock; an origin product leaves it.
    fn role(&self) -> FlowRole {
        match self.role {
            TransformationRole::Generated => FlowRole::Entry,
            TransformationRole::Origin => FlowRole::Exit,
        }
    }
}

impl FlowEntry for ConsumptionRecord {
    fn raw_identity(&self) -> String {
        ConsumptionRecord::raw_identity(self)
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn role(&self) -> FlowRole {
        FlowRole::Exit
    }
}

/// Sums directed flow records (transformations, consumption) into per-group
/// totals.
pub fn aggregate_flows<R: FlowEntry>(
    records: &[R],
    resolver: &GroupResolver,
) -> BTreeMap<String, FlowTotals> {
    let mut totals: BTreeMap<String, FlowTotals> = BTreeMap::new();
    for record in records {
        let group = resolver.resolve(&record.raw_identity());
        let entry = totals.entry(group).or_default();
        match record.role() {
            FlowRole::Entry => entry.entry_total += record.volume(),
            FlowRole::Exit => entry.exit_total += record.volume(),
        }
    }
    totals
}

/// Collapses flow totals to net volumes per group.
pub fn net_totals(totals: &BTreeMap<String, FlowTotals>) -> BTreeMap<String, f64> {
    totals.iter().map(|(g, t)| (g.clone(), t.net())).collect()
}

/// Joins the two systems' per-group nets into comparison rows. The join is
/// outer: a group present on only one side compares against 0 on the other.
/// Rows come back sorted by group name.
pub fn reconcile(
    nets_regulatory: &BTreeMap<String, f64>,
    nets_erp: &BTreeMap<String, f64>,
) -> Vec<ReconciliationRow> {
    let mut groups: Vec<&String> = nets_regulatory.keys().chain(nets_erp.keys()).collect();
    groups.sort();
    groups.dedup();

    let rows: Vec<ReconciliationRow> = groups
        .into_iter()
        .map(|group| {
            let net_regulatory = nets_regulatory.get(group).copied().unwrap_or(0.0);
            let net_erp = nets_erp.get(group).copied().unwrap_or(0.0);
            ReconciliationRow {
                group_name: group.clone(),
                net_regulatory,
                net_erp,
                difference: net_regulatory - net_erp,
            }
        })
        .collect();
    debug!("reconciled {} group(s)", rows.len());
    rows
}
