use crate::error::{ReconcilerError, Result};
use crate::normalize::is_numeric_token;
use crate::schema::{Category, SourceSystem};

/// Regulatory description fragments that carry no species information.
const GENERIC_TERMS: &[&str] = &[
    "TORAS DE MADEIRA NATIVA",
    "MADEIRA SERRADA EM BRUTO",
    "MADEIRA SERRADA APROVEITAMENTO",
    "MADEIRA BENEFICIADA",
    "MADEIRA",
    "TORAS",
    "SERRADA",
    "BENEFICIADA",
];

/// Tokens stripped when reducing a candidate name down to a species essence.
/// More aggressive than the comparison stop words because the result is shown
/// to users as a proposed group name.
const NAME_STOP_WORDS: &[&str] = &[
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
    "BRUTO",
    "APROVEITAMENTO",
    "TABUA",
    "TABUAS",
    "VIGA",
    "VIGAS",
    "CAIBRO",
    "CAIBROS",
    "PRANCHA",
    "PRANCHAO",
    "RIPA",
    "RIPAS",
    "SARRAFO",
    "DECK",
    "ASSOALHO",
    "FORRO",
    "LAMBRI",
    "RODAPE",
    "ALISAR",
    "BATENTE",
];

/// Proposes a group name for a selection of raw item names, based on the
/// first selected item: extract the most specific fragment, strip it down to
/// a species essence, then append the category label when the essence does
/// not already carry it.
pub fn suggest_group_name(
    selected: &[String],
    category_hint: Option<Category>,
    source: SourceSystem,
) -> Result<String> {
    let first = selected
        .first()
        .ok_or_else(|| ReconcilerError::EmptySelection("no items selected".to_string()))?;

    let (fragment, detected) = match source {
        SourceSystem::Regulatory => extract_regulatory_fragment(first),
        SourceSystem::Erp => extract_erp_fragment(first),
    };

    let essence = strip_to_essence(&fragment);
    let category = category_hint.or(detected);

    let name = match category {
        Some(cat) if cat != Category::Other => append_category(&essence, cat),
        _ => essence,
    };

    if name.trim().is_empty() {
        return Err(ReconcilerError::InvalidGroupName(format!(
            "could not derive a group name from '{}'",
            first
        )));
    }
    Ok(name)
}

/// Regulatory names read "10 - TORAS DE MADEIRA NATIVA - CUMARU". The species
/// is the last fragment that is neither a product code nor a generic term.
fn extract_regulatory_fragment(raw: &str) -> (String, Option<Category>) {
    let parts: Vec<&str> = raw.split(" - ").map(str::trim).collect();
    let detected = parts
        .first()
        .and_then(|p| p.chars().next())
        .filter(|c| c.is_ascii_digit())
        .and_then(|_| category_from_code(parts[0]));

    let candidates: Vec<&str> = parts
        .iter()
        .copied()
        .filter(|p| !p.is_empty() && !is_numeric_token(p) && !GENERIC_TERMS.contains(&p.to_uppercase().as_str()))
        .collect();

    let fragment = candidates
        .last()
        .or(parts.last())
        .copied()
        .unwrap_or(raw)
        .to_string();
    (fragment, detected)
}

/// ERP names read "CUMARU SERRADO 10X10 (M3) - LOTE 7". Take the portion
/// before any parenthesized unit, then the portion after the first " - "
/// separator when one is present.
fn extract_erp_fragment(raw: &str) -> (String, Option<Category>) {
    let before_unit = raw.split(" (").next().unwrap_or(raw).trim();
    let fragment = match before_unit.split_once(" - ") {
        Some((_, rest)) => rest.trim(),
        None => before_unit,
    };
    let detected = category_from_keywords(&fragment.to_uppercase());
    (fragment.to_string(), detected)
}

fn category_from_code(code_part: &str) -> Option<Category> {
    let code: String = code_part.chars().take_while(|c| c.is_ascii_digit()).collect();
    match code.as_str() {
        "10" => Some(Category::RoundLogs),
        "20" | "3030" => Some(Category::Sawn),
        "50" => Some(Category::Processed),
        _ => None,
    }
}

fn category_from_keywords(upper: &str) -> Option<Category> {
    if upper.contains("BENEF")
        || upper.contains("DECK")
        || upper.contains("FORRO")
        || upper.contains("ASSOALHO")
    {
        Some(Category::Processed)
    } else if upper.contains("TORA") || upper.contains("TORO") {
        Some(Category::RoundLogs)
    } else if upper.contains("SERRAD")
        || upper.contains("CAIBRO")
        || upper.contains("VIGA")
        || upper.contains("PRANCH")
        || upper.contains("RIPA")
    {
        Some(Category::Sawn)
    } else {
        None
    }
}

/// Uppercases, flattens punctuation, and drops stop words and numeric tokens,
/// leaving the species essence. Falls back to the uppercased input when
/// everything gets stripped.
fn strip_to_essence(fragment: &str) -> String {
    let upper = fragment.to_uppercase().replace(['.', '-'], " ");
    let kept: Vec<&str> = upper
        .split_whitespace()
        .filter(|t| !NAME_STOP_WORDS.contains(t) && !is_numeric_token(t))
        .collect();
    if kept.is_empty() {
        fragment.trim().to_uppercase()
    } else {
        kept.join(" ")
    }
}

/// Appends the category label unless the essence already carries it. The
/// label is singularized before the check so "CUMARU SERRADAS" and
/// "CUMARU SERRADA" both count as already labelled; "TORAS" stays plural.
fn append_category(essence: &str, category: Category) -> String {
    let label = category.label();
    let suffix = if label == "TORAS" {
        label.to_string()
    } else {
        label.strip_suffix('S').unwrap_or(label).to_string()
    };
    let root = if suffix.len() > 3 {
        &suffix[..suffix.len() - 1]
    } else {
        suffix.as_str()
    };
    if essence.contains(root) {
        essence.to_string()
    } else {
        format!("{} {}", essence, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regulatory_name_takes_species_fragment() {
        let name = suggest_group_name(
            &["10 - TORAS DE MADEIRA NATIVA - CUMARU".to_string()],
            None,
            SourceSystem::Regulatory,
        )
        .unwrap();
        assert_eq!(name, "CUMARU TORAS");
    }

    #[test]
    fn test_regulatory_sawn_code() {
        let name = suggest_group_name(
            &["20 - MADEIRA SERRADA EM BRUTO - IPE".to_string()],
            None,
            SourceSystem::Regulatory,
        )
        .unwrap();
        assert_eq!(name, "IPE SERRADA");
    }

    #[test]
    fn test_erp_name_strips_unit_and_dimensions() {
        let name = suggest_group_name(
            &["CUMARU SERRADO 10X10 (M3)".to_string()],
            None,
            SourceSystem::Erp,
        )
        .unwrap();
        // SERRADO is stripped, 10X10 is not purely numeric so it survives
        assert!(name.starts_with("CUMARU"), "got {}", name);
        assert!(name.contains("SERRADA"), "category suffix missing: {}", name);
    }

    #[test]
    fn test_category_hint_overrides_detection() {
        let name = suggest_group_name(
            &["ANGELIM PEDRA (M3)".to_string()],
            Some(Category::RoundLogs),
            SourceSystem::Erp,
        )
        .unwrap();
        assert_eq!(name, "ANGELIM PEDRA TORAS");
    }

    #[test]
    fn test_essence_already_carrying_label_is_kept() {
        let name = append_category("CUMARU SERRADA", Category::Sawn);
        assert_eq!(name, "CUMARU SERRADA");
        let plural = append_category("CUMARU SERRADAS", Category::Sawn);
        assert_eq!(plural, "CUMARU SERRADAS");
    }

    #[test]
    fn test_other_category_gets_no_suffix() {
        let name = suggest_group_name(
            &["RESIDUO GENERICO".to_string()],
            Some(Category::Other),
            SourceSystem::Erp,
        )
        .unwrap();
        assert_eq!(name, "RESIDUO GENERICO");
    }

    #[test]
    fn test_empty_selection_errors() {
        let err = suggest_group_name(&[], None, SourceSystem::Erp);
        assert!(err.is_err());
    }
}
