//! Cell value parsing for slip tables and legacy ledger files.

use chrono::NaiveDate;

/// Month/day/year, the format the extraction prompt asks for.
pub const SLIP_DATE_FORMAT: &str = "%m/%d/%Y";

/// Parse a currency cell such as `$1,250.00`.
///
/// Dollar signs and grouping commas are stripped before parsing. Returns `None`
/// for anything that is not a finite, non-negative number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse a date cell; blank or malformed cells yield `None`.
pub fn parse_slip_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, SLIP_DATE_FORMAT).ok()
}
