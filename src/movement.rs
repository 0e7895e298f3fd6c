use crate::error::Result;
use crate::schema::{
    Category, ConsumptionRecord, ItemRef, RawMovementRow, RowKind, TransformationRecord,
};
use crate::utils::{month_key, parse_quantity};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Granularity used to decide whether a period already holds data. Daily
/// reports dedupe per date; monthly reports dedupe per calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeKey {
    Date,
    Month,
}

fn period_key(date: NaiveDate, mode: DedupeKey) -> String {
    match mode {
        DedupeKey::Date => date.to_string(),
        DedupeKey::Month => month_key(date),
    }
}

/// Result of a gap-fill batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub skipped_existing: usize,
    pub skipped_undated: usize,
}

/// Storage for raw ERP movement rows.
pub trait MovementStore {
    /// Inserts rows whose period is not yet present in the store. Periods
    /// that already hold rows are left untouched, so re-importing an
    /// overlapping report only fills the gaps. Rows without a parseable date
    /// are skipped.
    fn upsert_batch(&mut self, rows: Vec<RawMovementRow>, mode: DedupeKey) -> Result<BatchOutcome>;

    /// Returns movement rows dated within `[start, end]`, plus every opening
    /// and total marker row regardless of its date. The markers anchor
    /// balance reconstruction and must always travel with the window.
    fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawMovementRow>>;

    /// For each item key, the balance of its most recent row strictly before
    /// `cutoff`, ordered by date then insertion order. Items with no prior
    /// dated row are absent from the result.
    fn last_balance_before(
        &self,
        cutoff: NaiveDate,
        keys: &[String],
    ) -> Result<BTreeMap<String, f64>>;

    /// Every item ever seen in the store, with its latest display name and
    /// category.
    fn item_registry(&self) -> Result<Vec<ItemRef>>;
}

/// In-memory movement store. Insertion order is preserved through a
/// monotonically increasing sequence number stamped on each row.
#[derive(Debug, Default)]
pub struct MemoryMovementStore {
    rows: Vec<RawMovementRow>,
    next_seq: u64,
}

impl MemoryMovementStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_periods(&self, mode: DedupeKey) -> BTreeSet<String> {
        self.rows
            .iter()
            .filter_map(|r| r.date)
            .map(|d| period_key(d, mode))
            .collect()
    }
}

impl MovementStore for MemoryMovementStore {
    fn upsert_batch(&mut self, rows: Vec<RawMovementRow>, mode: DedupeKey) -> Result<BatchOutcome> {
        let existing = self.existing_periods(mode);
        let mut outcome = BatchOutcome::default();
        for mut row in rows {
            let date = match row.date {
                Some(d) => d,
                None => {
                    warn!(
                        "skipping undated row for '{}' ({})",
                        row.item_key, row.kind_label
                    );
                    outcome.skipped_undated += 1;
                    continue;
                }
            };
            if existing.contains(&period_key(date, mode)) {
                outcome.skipped_existing += 1;
                continue;
            }
            row.seq = self.next_seq;
            self.next_seq += 1;
            self.rows.push(row);
            outcome.inserted += 1;
        }
        info!(
            "movements: inserted {}, skipped {} already-loaded, {} undated",
            outcome.inserted, outcome.skipped_existing, outcome.skipped_undated
        );
        Ok(outcome)
    }

    fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<RawMovementRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| match (r.kind(), r.date) {
                (RowKind::Movement, Some(d)) => d >= start && d <= end,
                (RowKind::Movement, None) => false,
                // opening/total markers always accompany the window
                _ => true,
            })
            .cloned()
            .collect())
    }

    fn last_balance_before(
        &self,
        cutoff: NaiveDate,
        keys: &[String],
    ) -> Result<BTreeMap<String, f64>> {
        let wanted: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
        let mut latest: BTreeMap<String, (NaiveDate, u64, f64)> = BTreeMap::new();
        for row in &self.rows {
            let date = match row.date {
                Some(d) if d < cutoff => d,
                _ => continue,
            };
            if !wanted.contains(row.item_key.as_str()) {
                continue;
            }
            let balance = match parse_quantity(&row.balance) {
                Some(b) => b,
                None => continue,
            };
            let candidate = (date, row.seq, balance);
            match latest.get(&row.item_key) {
                Some((d, s, _)) if (*d, *s) >= (date, row.seq) => {}
                _ => {
                    latest.insert(row.item_key.clone(), candidate);
                }
            }
        }
        Ok(latest.into_iter().map(|(k, (_, _, b))| (k, b)).collect())
    }

    fn item_registry(&self) -> Result<Vec<ItemRef>> {
        let mut seen: BTreeMap<String, ItemRef> = BTreeMap::new();
        for row in &self.rows {
            seen.insert(
                row.item_key.clone(),
                ItemRef {
                    key: row.item_key.clone(),
                    display_name: row.display_name.clone(),
                    category: Category::from_label(&row.category).unwrap_or(Category::Other),
                },
            );
        }
        Ok(seen.into_values().collect())
    }
}

/// Storage for regulatory transformation records.
pub trait TransformationStore {
    fn upsert_batch(
        &mut self,
        records: Vec<TransformationRecord>,
        mode: DedupeKey,
    ) -> Result<BatchOutcome>;
    fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TransformationRecord>>;
}

/// Storage for regulatory consumption records.
pub trait ConsumptionStore {
    fn upsert_batch(
        &mut self,
        records: Vec<ConsumptionRecord>,
        mode: DedupeKey,
    ) -> Result<BatchOutcome>;
    fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ConsumptionRecord>>;
}

fn gap_fill<R>(
    store: &mut Vec<R>,
    records: Vec<R>,
    mode: DedupeKey,
    date_of: impl Fn(&R) -> Option<NaiveDate>,
    label: &str,
) -> BatchOutcome {
    let existing: BTreeSet<String> = store
        .iter()
        .filter_map(|r| date_of(r))
        .map(|d| period_key(d, mode))
        .collect();
    let mut outcome = BatchOutcome::default();
    for record in records {
        let date = match date_of(&record) {
            Some(d) => d,
            None => {
                warn!("{}: skipping undated record", label);
                outcome.skipped_undated += 1;
                continue;
            }
        };
        if existing.contains(&period_key(date, mode)) {
            outcome.skipped_existing += 1;
            continue;
        }
        store.push(record);
        outcome.inserted += 1;
    }
    info!(
        "{}: inserted {}, skipped {} already-loaded, {} undated",
        label, outcome.inserted, outcome.skipped_existing, outcome.skipped_undated
    );
    outcome
}

#[derive(Debug, Default)]
pub struct MemoryTransformationStore {
    records: Vec<TransformationRecord>,
}

impl MemoryTransformationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransformationStore for MemoryTransformationStore {
    fn upsert_batch(
        &mut self,
        records: Vec<TransformationRecord>,
        mode: DedupeKey,
    ) -> Result<BatchOutcome> {
        Ok(gap_fill(
            &mut self.records,
            records,
            mode,
            |r| r.date,
            "transformations",
        ))
    }

    fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TransformationRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.date.is_some_and(|d| d >= start && d <= end))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryConsumptionStore {
    records: Vec<ConsumptionRecord>,
}

impl MemoryConsumptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsumptionStore for MemoryConsumptionStore {
    fn upsert_batch(
        &mut self,
        records: Vec<ConsumptionRecord>,
        mode: DedupeKey,
    ) -> Result<BatchOutcome> {
        Ok(gap_fill(
            &mut self.records,
            records,
            mode,
            |r| r.date,
            "consumption",
        ))
    }

    fn query(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ConsumptionRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.date.is_some_and(|d| d >= start && d <= end))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(item: &str, date: &str, entry: &str, balance: &str) -> RawMovementRow {
        RawMovementRow {
            seq: 0,
            item_key: item.to_string(),
            display_name: item.to_string(),
            category: "SERRADA".to_string(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            kind_label: String::new(),
            entry: entry.to_string(),
            exit: "0".to_string(),
            balance: balance.to_string(),
            unit_value: String::new(),
            total_value: String::new(),
            document: String::new(),
        }
    }

    fn marker(item: &str, label: &str, date: &str, balance: &str) -> RawMovementRow {
        let mut row = movement(item, date, "0", balance);
        row.kind_label = label.to_string();
        row
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_gap_fill_skips_loaded_dates() {
        let mut store = MemoryMovementStore::new();
        let first = store
            .upsert_batch(vec![movement("IPE", "2024-03-01", "10", "10")], DedupeKey::Date)
            .unwrap();
        assert_eq!(first.skipped_existing, 0);

        // Same date again plus a new date: only the new date lands.
        let second = store
            .upsert_batch(
                vec![
                    movement("IPE", "2024-03-01", "99", "99"),
                    movement("IPE", "2024-03-02", "5", "15"),
                ],
                DedupeKey::Date,
            )
            .unwrap();
        assert_eq!(second.skipped_existing, 1);
        let rows = store.query(d("2024-03-01"), d("2024-03-31")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry, "10", "existing period must not be overwritten");
    }

    #[test]
    fn test_gap_fill_by_month() {
        let mut store = MemoryMovementStore::new();
        store
            .upsert_batch(vec![movement("IPE", "2024-03-05", "10", "10")], DedupeKey::Month)
            .unwrap();
        let outcome = store
            .upsert_batch(
                vec![
                    movement("IPE", "2024-03-20", "1", "11"),
                    movement("IPE", "2024-04-02", "2", "12"),
                ],
                DedupeKey::Month,
            )
            .unwrap();
        assert_eq!(outcome.skipped_existing, 1, "March already loaded");
        assert_eq!(store.query(d("2024-01-01"), d("2024-12-31")).unwrap().len(), 2);
    }

    #[test]
    fn test_undated_rows_are_skipped() {
        let mut store = MemoryMovementStore::new();
        let mut row = movement("IPE", "2024-03-01", "10", "10");
        row.date = None;
        let outcome = store.upsert_batch(vec![row], DedupeKey::Date).unwrap();
        assert_eq!(outcome.skipped_undated, 1);
        assert!(store.query(d("2000-01-01"), d("2100-01-01")).unwrap().is_empty());
    }

    #[test]
    fn test_query_always_includes_markers() {
        let mut store = MemoryMovementStore::new();
        store
            .upsert_batch(
                vec![
                    marker("IPE", "ANTERIOR", "2024-01-31", "100"),
                    movement("IPE", "2024-02-10", "5", "105"),
                    movement("IPE", "2024-03-10", "5", "110"),
                    marker("IPE", "TOTAL", "2024-03-31", "110"),
                ],
                DedupeKey::Date,
            )
            .unwrap();
        let rows = store.query(d("2024-03-01"), d("2024-03-31")).unwrap();
        let kinds: Vec<RowKind> = rows.iter().map(|r| r.kind()).collect();
        assert!(kinds.contains(&RowKind::Opening), "opening marker outside window must appear");
        assert!(kinds.contains(&RowKind::Total));
        assert_eq!(
            rows.iter().filter(|r| r.kind() == RowKind::Movement).count(),
            1,
            "only the March movement is in range"
        );
    }

    #[test]
    fn test_last_balance_before_picks_latest() {
        let mut store = MemoryMovementStore::new();
        store
            .upsert_batch(
                vec![
                    movement("IPE", "2024-02-10", "5", "105"),
                    movement("IPE", "2024-02-20", "5", "110"),
                    movement("IPE", "2024-03-01", "5", "115"),
                ],
                DedupeKey::Date,
            )
            .unwrap();
        let balances = store
            .last_balance_before(d("2024-03-01"), &["IPE".to_string()])
            .unwrap();
        assert_eq!(balances["IPE"], 110.0, "March 1 row is not strictly before the cutoff");
    }

    #[test]
    fn test_last_balance_before_absent_item() {
        let store = MemoryMovementStore::new();
        let balances = store
            .last_balance_before(d("2024-03-01"), &["IPE".to_string()])
            .unwrap();
        assert!(balances.is_empty());
    }

    #[test]
    fn test_item_registry_latest_name_wins() {
        let mut store = MemoryMovementStore::new();
        let mut a = movement("IPE", "2024-02-10", "5", "5");
        a.display_name = "Ipe Serrado".to_string();
        let mut b = movement("IPE", "2024-02-11", "5", "10");
        b.display_name = "IPE SERRADO 10X10".to_string();
        store.upsert_batch(vec![a, b], DedupeKey::Date).unwrap();
        let registry = store.item_registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry[0].display_name, "IPE SERRADO 10X10");
    }
}
