use crate::error::Result;
use std::collections::BTreeMap;

/// Minimal ordered key/value table. Keys are slash-delimited paths so that
/// prefix scans act as namespace queries; values are JSON documents.
pub trait Table {
    /// Returns all entries whose key starts with `prefix`, in key order.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Inserts or replaces the value at `key`.
    fn upsert(&mut self, key: &str, value: &str) -> Result<()>;

    /// Deletes every entry matching the predicate, returning how many were
    /// removed.
    fn delete_where(&mut self, pred: &dyn Fn(&str, &str) -> bool) -> Result<usize>;
}

/// In-memory table backed by a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryTable {
    entries: BTreeMap<String, String>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Table for MemoryTable {
    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn upsert(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_where(&mut self, pred: &dyn Fn(&str, &str) -> bool) -> Result<usize> {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(k, v)| pred(k, v))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.entries.remove(key);
        }
        Ok(doomed.len())
    }
}
