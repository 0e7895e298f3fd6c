use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceSystem {
    #[schemars(description = "The governmental timber-tracking system (balance reports per product/species)")]
    Regulatory,

    #[schemars(description = "The internal ERP stock system (dated entry/exit ledger per SKU)")]
    Erp,
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSystem::Regulatory => write!(f, "REGULATORY"),
            SourceSystem::Erp => write!(f, "ERP"),
        }
    }
}

/// Closed product classification. `Other` is the reserved catch-all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[schemars(description = "Unprocessed native logs")]
    RoundLogs,

    #[schemars(description = "Rough or dressed sawn timber (boards, beams, rafters, planks)")]
    Sawn,

    #[schemars(description = "Finished/processed timber (decking, flooring, lining)")]
    Processed,

    #[schemars(description = "Anything that does not fit the other categories")]
    Other,
}

impl Category {
    /// Vocabulary token used inside product names for this category.
    pub fn label(&self) -> &'static str {
        match self {
            Category::RoundLogs => "TORAS",
            Category::Sawn => "SERRADAS",
            Category::Processed => "BENEFICIADAS",
            Category::Other => "OUTROS",
        }
    }

    /// Folds the singular/plural/variant spellings found in source data into
    /// the closed enum. Returns `None` for labels that match nothing.
    pub fn from_label(label: &str) -> Option<Category> {
        let l = label.trim().to_uppercase();
        if l.is_empty() {
            return None;
        }
        match l.as_str() {
            "TORAS" | "TOROS" | "TORA" | "TORO" => Some(Category::RoundLogs),
            "SERRADAS" | "SERRADA" | "SERRADOS" | "SERRADO" => Some(Category::Sawn),
            "BENEFICIADAS" | "BENEFICIADA" | "BENEFICIADOS" | "BENEFICIADO" => {
                Some(Category::Processed)
            }
            "OUTROS" | "OUTRAS" => Some(Category::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Row role inside a reconstructed per-item ledger view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowKind {
    Opening,
    Movement,
    Total,
}

impl RowKind {
    /// Maps the messy summary labels emitted by the ERP exports
    /// ("ANTERIOR", "ANTERIOR:", "TOTAL", "TOTAL:", "TOTAL ") onto row
    /// kinds. Anything else is a dated movement.
    pub fn from_label(label: &str) -> RowKind {
        match label.trim().to_uppercase().as_str() {
            "ANTERIOR" | "ANTERIOR:" => RowKind::Opening,
            "TOTAL" | "TOTAL:" => RowKind::Total,
            _ => RowKind::Movement,
        }
    }
}

/// One raw ledger row as produced by the external extraction layer, before
/// any cleaning. Quantities are kept as the original text so that malformed
/// values can be recovered (substituted with zero) instead of failing the
/// whole reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawMovementRow {
    #[schemars(description = "Insertion order within the store; later rows win on duplicate summary kinds")]
    pub seq: u64,

    #[schemars(description = "Stable item identity: the SKU for ERP rows, the 'PRODUCT - SPECIES' composite for regulatory rows")]
    pub item_key: String,

    #[schemars(description = "Human-readable product description as it appeared in the source document")]
    pub display_name: String,

    #[schemars(description = "Raw category label from the source document (may be empty or a variant spelling)")]
    pub category: String,

    #[schemars(description = "Movement date; None for summary rows (opening balance / period total)")]
    pub date: Option<NaiveDate>,

    #[schemars(description = "Raw row-type label: a document reference for movements, 'ANTERIOR'/'TOTAL' for summary rows")]
    pub kind_label: String,

    #[schemars(description = "Entry quantity as extracted (pt-BR decimal format tolerated)")]
    pub entry: String,

    #[schemars(description = "Exit quantity as extracted (pt-BR decimal format tolerated)")]
    pub exit: String,

    #[schemars(description = "Balance after this row as extracted")]
    pub balance: String,

    #[schemars(description = "Unit monetary value, empty if absent")]
    pub unit_value: String,

    #[schemars(description = "Total monetary value, empty if absent")]
    pub total_value: String,

    #[schemars(description = "Invoice/note number or other origin document reference")]
    pub document: String,
}

impl RawMovementRow {
    pub fn kind(&self) -> RowKind {
        RowKind::from_label(&self.kind_label)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(RawMovementRow);
        serde_json::to_string_pretty(&schema)
    }
}

/// One cleaned, reconstructed ledger row. Produced only by the ledger
/// reconstruction pass; never built directly from raw text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRecord {
    pub item_key: String,
    pub display_name: String,
    pub category: Category,
    /// None only for Opening/Total rows.
    pub date: Option<NaiveDate>,
    pub kind: RowKind,
    pub entry_qty: f64,
    pub exit_qty: f64,
    pub balance_after: f64,
    /// Carried balance at range start, repeated on every row of the item.
    pub opening_balance: f64,
    pub unit_value: Option<f64>,
    pub total_value: Option<f64>,
    pub origin_document: Option<String>,
}

impl MovementRecord {
    pub fn opening(item_key: String, display_name: String, category: Category, balance: f64) -> Self {
        MovementRecord {
            item_key,
            display_name,
            category,
            date: None,
            kind: RowKind::Opening,
            entry_qty: 0.0,
            exit_qty: 0.0,
            balance_after: balance,
            opening_balance: balance,
            unit_value: None,
            total_value: None,
            origin_document: None,
        }
    }

    pub fn total(
        item_key: String,
        display_name: String,
        category: Category,
        entry_total: f64,
        exit_total: f64,
        balance: f64,
    ) -> Self {
        MovementRecord {
            item_key,
            display_name,
            category,
            date: None,
            kind: RowKind::Total,
            entry_qty: entry_total,
            exit_qty: exit_total,
            balance_after: balance,
            opening_balance: 0.0,
            unit_value: None,
            total_value: None,
            origin_document: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn movement(
        item_key: String,
        display_name: String,
        category: Category,
        date: NaiveDate,
        entry_qty: f64,
        exit_qty: f64,
        balance_after: f64,
    ) -> Self {
        MovementRecord {
            item_key,
            display_name,
            category,
            date: Some(date),
            kind: RowKind::Movement,
            entry_qty,
            exit_qty,
            balance_after,
            opening_balance: 0.0,
            unit_value: None,
            total_value: None,
            origin_document: None,
        }
    }
}

/// An item known to a movement store: identity plus the latest seen
/// description and category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRef {
    pub key: String,
    pub display_name: String,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformationRole {
    #[schemars(description = "Input product consumed by the transformation (an outflow)")]
    Origin,

    #[schemars(description = "Output product created by the transformation (an inflow)")]
    Generated,
}

/// One side of a registered transformation (sawing, processing) in the
/// regulatory system: either the consumed origin product or a generated one.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransformationRecord {
    #[schemars(description = "Transformation request number")]
    pub number: String,

    #[schemars(description = "Date the transformation was carried out")]
    pub date: Option<NaiveDate>,

    pub role: TransformationRole,

    #[schemars(description = "Product description")]
    pub product: String,

    #[schemars(description = "Species (essence) the product is made of, empty if not stated")]
    pub species: String,

    #[schemars(description = "Volume in the document's unit")]
    pub volume: f64,

    #[schemars(description = "Volume unit, e.g. M3")]
    pub unit: String,
}

impl TransformationRecord {
    /// Identity used for grouping: "PRODUCT - SPECIES", or just the product
    /// when no species is recorded.
    pub fn raw_identity(&self) -> String {
        if self.species.trim().is_empty() {
            self.product.clone()
        } else {
            format!("{} - {}", self.product, self.species)
        }
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(TransformationRecord);
        serde_json::to_string_pretty(&schema)
    }
}

/// One consumption (debit) record in the regulatory system, always an
/// outflow.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsumptionRecord {
    pub date: Option<NaiveDate>,
    pub product: String,
    pub species: String,
    pub volume: f64,

    #[schemars(description = "Invoice or permit reference backing the consumption")]
    pub document: String,
}

impl ConsumptionRecord {
    pub fn raw_identity(&self) -> String {
        if self.species.trim().is_empty() {
            self.product.clone()
        } else {
            format!("{} - {}", self.product, self.species)
        }
    }
}

/// Persistent mapping of one raw item identity onto a canonical group,
/// within one source system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMembership {
    pub item_identity: String,
    pub source: SourceSystem,
    pub group_name: String,
    pub category: Category,
}

/// Persistent one-to-one mapping of an ERP canonical group onto a
/// regulatory canonical group. Keyed by the ERP group name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub erp_group: String,
    pub regulatory_group: String,
}

/// One line of the final side-by-side comparison. Never persisted;
/// recomputed from current movements, memberships and links on every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconciliationRow {
    pub group_name: String,
    pub net_regulatory: f64,
    pub net_erp: f64,
    /// net_regulatory − net_erp.
    pub difference: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_kind_labels() {
        assert_eq!(RowKind::from_label("ANTERIOR"), RowKind::Opening);
        assert_eq!(RowKind::from_label("anterior:"), RowKind::Opening);
        assert_eq!(RowKind::from_label("TOTAL"), RowKind::Total);
        assert_eq!(RowKind::from_label(" total: "), RowKind::Total);
        assert_eq!(RowKind::from_label("NF 12345"), RowKind::Movement);
        assert_eq!(RowKind::from_label(""), RowKind::Movement);
    }

    #[test]
    fn test_category_label_variants() {
        assert_eq!(Category::from_label("TOROS"), Some(Category::RoundLogs));
        assert_eq!(Category::from_label("tora"), Some(Category::RoundLogs));
        assert_eq!(Category::from_label("SERRADA"), Some(Category::Sawn));
        assert_eq!(Category::from_label("BENEFICIADOS"), Some(Category::Processed));
        assert_eq!(Category::from_label("OUTROS"), Some(Category::Other));
        assert_eq!(Category::from_label("DECK 20MM"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn test_raw_row_schema_generation() {
        let schema_json = RawMovementRow::schema_as_json().unwrap();
        assert!(schema_json.contains("item_key"));
        assert!(schema_json.contains("kind_label"));
        assert!(schema_json.contains("balance"));
    }

    #[test]
    fn test_transformation_identity() {
        let rec = TransformationRecord {
            number: "101".to_string(),
            date: None,
            role: TransformationRole::Generated,
            product: "20 - Madeira Serrada em Bruto".to_string(),
            species: "IPE".to_string(),
            volume: 10.0,
            unit: "M3".to_string(),
        };
        assert_eq!(rec.raw_identity(), "20 - Madeira Serrada em Bruto - IPE");

        let no_species = TransformationRecord {
            species: "  ".to_string(),
            ..rec
        };
        assert_eq!(no_species.raw_identity(), "20 - Madeira Serrada em Bruto");
    }

    #[test]
    fn test_movement_record_constructors() {
        let opening = MovementRecord::opening("10".into(), "IPE".into(), Category::RoundLogs, 40.0);
        assert_eq!(opening.kind, RowKind::Opening);
        assert_eq!(opening.date, None);
        assert_eq!(opening.balance_after, 40.0);
        assert_eq!(opening.opening_balance, 40.0);

        let mv = MovementRecord::movement(
            "10".into(),
            "IPE".into(),
            Category::RoundLogs,
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            50.0,
            0.0,
            90.0,
        );
        assert_eq!(mv.kind, RowKind::Movement);
        assert!(mv.date.is_some());
    }
}
