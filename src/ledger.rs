use crate::schema::{Category, ItemRef, MovementRecord, RawMovementRow, RowKind};
use crate::utils::parse_quantity;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Counters for the defects tolerated (and repaired) during reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataQualityReport {
    /// Non-empty quantity fields that could not be parsed and were read as 0.
    pub malformed_values: usize,
    /// Redundant opening/total marker rows discarded (latest one wins).
    pub duplicate_summaries: usize,
}

/// A reconstructed period ledger: per-item rows with recomputed running
/// balances, each item closed by a total row. Opening rows appear only when
/// the source carried a marker or the item had no period activity; the
/// carried balance always travels in `opening_balance`.
#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    pub rows: Vec<MovementRecord>,
    pub report: DataQualityReport,
}

struct ItemRows<'a> {
    display_name: String,
    category: Category,
    movements: Vec<&'a RawMovementRow>,
    opening: Option<&'a RawMovementRow>,
    total: Option<&'a RawMovementRow>,
}

/// Rebuilds the period ledger from raw rows. Running balances are always
/// recomputed from the carried opening balance, never trusted from the
/// source; summary markers only contribute when an item has no movements in
/// the period.
///
/// `prior_balances` supplies the balance carried into the period for items
/// whose raw rows include no opening marker (items absent there open at 0).
/// `registry` items with no rows at all still appear, framed by an opening
/// and total row at their carried balance, so a reconciliation over the
/// period sees every known item.
pub fn reconstruct(
    raw_rows: &[RawMovementRow],
    prior_balances: &BTreeMap<String, f64>,
    registry: &[ItemRef],
) -> LedgerView {
    let mut report = DataQualityReport::default();
    let mut items: BTreeMap<String, ItemRows<'_>> = BTreeMap::new();

    for row in raw_rows {
        let entry = items
            .entry(row.item_key.clone())
            .or_insert_with(|| ItemRows {
                display_name: row.display_name.clone(),
                category: Category::from_label(&row.category).unwrap_or(Category::Other),
                movements: Vec::new(),
                opening: None,
                total: None,
            });
        entry.display_name = row.display_name.clone();
        if let Some(cat) = Category::from_label(&row.category) {
            entry.category = cat;
        }
        match row.kind() {
            RowKind::Movement => entry.movements.push(row),
            RowKind::Opening => keep_latest(&mut entry.opening, row, &mut report),
            RowKind::Total => keep_latest(&mut entry.total, row, &mut report),
        }
    }

    let mut rows = Vec::new();
    for (item_key, item) in &mut items {
        item.movements.sort_by_key(|r| (r.date, r.seq));

        let opening_balance = match item.opening {
            Some(marker) => quantity(&marker.balance, &mut report),
            None => prior_balances.get(item_key).copied().unwrap_or(0.0),
        };

        // An opening row is emitted only when the source carried one, or to
        // frame an item with no period activity. Items with movements and no
        // marker carry the prior balance through `opening_balance` alone.
        if item.opening.is_some() || item.movements.is_empty() {
            rows.push(stamped(
                MovementRecord::opening(
                    item_key.clone(),
                    item.display_name.clone(),
                    item.category,
                    opening_balance,
                ),
                opening_balance,
            ));
        }

        if item.movements.is_empty() {
            // No period activity: carry the marker totals through, or frame
            // the balance with an empty total.
            let (entry_total, exit_total, closing) = match item.total {
                Some(marker) => (
                    quantity(&marker.entry, &mut report),
                    quantity(&marker.exit, &mut report),
                    quantity(&marker.balance, &mut report),
                ),
                None => (0.0, 0.0, opening_balance),
            };
            rows.push(stamped(
                MovementRecord::total(
                    item_key.clone(),
                    item.display_name.clone(),
                    item.category,
                    entry_total,
                    exit_total,
                    closing,
                ),
                opening_balance,
            ));
            continue;
        }

        if item.total.is_some() {
            debug!(
                "recomputing total for '{}' from {} movement(s), ignoring source marker",
                item_key,
                item.movements.len()
            );
        }

        let mut balance = opening_balance;
        let mut entry_total = 0.0;
        let mut exit_total = 0.0;
        for raw in &item.movements {
            let entry_qty = quantity(&raw.entry, &mut report);
            let exit_qty = quantity(&raw.exit, &mut report);
            balance += entry_qty - exit_qty;
            entry_total += entry_qty;
            exit_total += exit_qty;

            let date = match raw.date {
                Some(d) => d,
                None => continue, // unreachable: movements without a date are filtered at ingest
            };
            let mut record = MovementRecord::movement(
                item_key.clone(),
                item.display_name.clone(),
                item.category,
                date,
                entry_qty,
                exit_qty,
                balance,
            );
            record.opening_balance = opening_balance;
            record.unit_value = parse_quantity(&raw.unit_value);
            record.total_value = parse_quantity(&raw.total_value);
            if !raw.document.trim().is_empty() {
                record.origin_document = Some(raw.document.trim().to_string());
            }
            rows.push(record);
        }

        rows.push(stamped(
            MovementRecord::total(
                item_key.clone(),
                item.display_name.clone(),
                item.category,
                entry_total,
                exit_total,
                balance,
            ),
            opening_balance,
        ));
    }

    // Items known to the store but silent this period.
    for item in registry {
        if items.contains_key(&item.key) {
            continue;
        }
        let balance = prior_balances.get(&item.key).copied().unwrap_or(0.0);
        rows.push(stamped(
            MovementRecord::opening(
                item.key.clone(),
                item.display_name.clone(),
                item.category,
                balance,
            ),
            balance,
        ));
        rows.push(stamped(
            MovementRecord::total(
                item.key.clone(),
                item.display_name.clone(),
                item.category,
                0.0,
                0.0,
                balance,
            ),
            balance,
        ));
    }

    rows.sort_by(|a, b| {
        a.item_key
            .cmp(&b.item_key)
            .then(kind_rank(a.kind).cmp(&kind_rank(b.kind)))
            .then(a.date.cmp(&b.date))
    });

    LedgerView { rows, report }
}

fn kind_rank(kind: RowKind) -> u8 {
    match kind {
        RowKind::Opening => 0,
        RowKind::Movement => 1,
        RowKind::Total => 2,
    }
}

fn stamped(mut record: MovementRecord, opening_balance: f64) -> MovementRecord {
    record.opening_balance = opening_balance;
    record
}

fn keep_latest<'a>(
    slot: &mut Option<&'a RawMovementRow>,
    row: &'a RawMovementRow,
    report: &mut DataQualityReport,
) {
    match slot {
        Some(existing) => {
            report.duplicate_summaries += 1;
            if row.seq > existing.seq {
                *slot = Some(row);
            }
        }
        None => *slot = Some(row),
    }
}

/// Parses a raw quantity field. Empty fields read as zero; non-empty fields
/// that fail to parse also read as zero but are counted as defects.
fn quantity(raw: &str, report: &mut DataQualityReport) -> f64 {
    if raw.trim().is_empty() {
        return 0.0;
    }
    match parse_quantity(raw) {
        Some(v) => v,
        None => {
            warn!("unparseable quantity '{}' read as 0", raw);
            report.malformed_values += 1;
            0.0
        }
    }
}
