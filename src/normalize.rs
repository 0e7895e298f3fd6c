use crate::schema::{Category, SourceSystem};

/// Filler vocabulary stripped before names are compared. Covers material and
/// cut descriptors plus Portuguese connectors; what remains after stripping
/// is the species "essence" of the name.
const COMPARISON_STOP_WORDS: &[&str] = &[
    "MADEIRA",
    "NATIVA",
    "SERRADA",
    "SERRADOS",
    "SERRADO",
    "BENEFICIADA",
    "BENEFICIADO",
    "BENEFICIADOS",
    "TORAS",
    "TOROS",
    "TORA",
    "TORO",
    "EM",
    "DE",
    "DO",
    "DA",
    "BRUTO",
    "APROVEITAMENTO",
    "TABUA",
    "VIGA",
    "CAIBRO",
    "PRANCHA",
    "RIPA",
    "SARRAFO",
    "DECK",
    "ASSOALHO",
    "FORRO",
];

/// Reduces a raw product description to its comparable essence: uppercased,
/// punctuation replaced by spaces, filler words and purely numeric tokens
/// dropped. Falls back to the uppercased original if nothing survives, so the
/// result is never empty.
pub fn normalize(raw: &str) -> String {
    let upper = raw.to_uppercase();
    let cleaned: String = upper
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let parts: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|t| !COMPARISON_STOP_WORDS.contains(t) && !is_numeric_token(t))
        .collect();

    if parts.is_empty() {
        upper.trim().to_string()
    } else {
        parts.join(" ")
    }
}

pub(crate) fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Infers the category of a raw item description. Pure and total, with a
/// fixed priority order so the result never depends on evaluation order:
/// regulatory items classify by product-code prefix, ERP items by keyword,
/// checking Processed before RoundLogs before Sawn.
pub fn categorize(text: &str, source: SourceSystem) -> Category {
    match source {
        SourceSystem::Regulatory => {
            let code: String = text
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            match code.as_str() {
                "10" => Category::RoundLogs,
                "20" | "3030" => Category::Sawn,
                "50" => Category::Processed,
                _ => Category::Other,
            }
        }
        SourceSystem::Erp => {
            let t = text.to_uppercase();
            if ["BENEF", "DECK", "FORRO", "ASSOALHO"].iter().any(|k| t.contains(k)) {
                Category::Processed
            } else if t.contains("TORA") || t.contains("TORO") {
                Category::RoundLogs
            } else if ["SERRAD", "CAIBRO", "VIGA", "PRANCH", "RIPA"]
                .iter()
                .any(|k| t.contains(k))
            {
                Category::Sawn
            } else {
                Category::Other
            }
        }
    }
}
