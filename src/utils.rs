use chrono::{Datelike, NaiveDate};

/// Parses a quantity in the formats the source exports actually use:
/// pt-BR "1.234,56", comma-decimal "130,5", or plain "42.5". Returns `None`
/// for anything unparsable; callers substitute 0.0 and count the recovery.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let cleaned = if s.contains(',') && s.contains('.') {
        // "1.234,56": dot as thousands separator, comma as decimal
        s.replace('.', "").replace(',', ".")
    } else if s.contains(',') {
        s.replace(',', ".")
    } else {
        s.to_string()
    };
    cleaned.parse::<f64>().ok()
}

/// Parses a date as ISO "YYYY-MM-DD" first, then "DD/MM/YYYY". Returns
/// `None` on failure: malformed dates are a recoverable data-quality
/// condition.
pub fn parse_date_flexible(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    // ISO timestamps are truncated to their date part.
    let head = if s.len() > 10 { s.get(..10).unwrap_or(s) } else { s };
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}

/// Calendar-month bucket key ("YYYY-MM") used by the gap-fill dedupe.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity_formats() {
        assert_eq!(parse_quantity("1.234,56"), Some(1234.56));
        assert_eq!(parse_quantity("130,5"), Some(130.5));
        assert_eq!(parse_quantity("42"), Some(42.0));
        assert_eq!(parse_quantity("42.5"), Some(42.5));
        assert_eq!(parse_quantity("  7,0000 "), Some(7.0));
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("n/a"), None);
        assert_eq!(parse_quantity("TOTAL"), None);
    }

    #[test]
    fn test_parse_date_flexible() {
        assert_eq!(
            parse_date_flexible("2025-02-28"),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(
            parse_date_flexible("28/02/2025"),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(
            parse_date_flexible("2025-02-28T13:45:00"),
            NaiveDate::from_ymd_opt(2025, 2, 28)
        );
        assert_eq!(parse_date_flexible("Total"), None);
        assert_eq!(parse_date_flexible(""), None);
    }

    #[test]
    fn test_month_key() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(month_key(d), "2025-03");
    }
}
