//! Date text normalization.
//!
//! Campaign pages phrase dates a dozen ways: `"Ended: March 15, 2025"`,
//! `"🚚 Ships June 2025"`, bare ISO timestamps, sometimes two dates joined
//! by `" / "`. Everything funnels down to a single `Month Day Year` core
//! parse; whatever survives comes out as `YYYY-MM-DD`, everything else as
//! the `"Unknown"` sentinel so downstream typing stays uniform.

use crate::record::UNKNOWN;
use chrono::{Datelike, NaiveDate, Utc};

/// Label prefixes stripped before the core parse, longest first so
/// `"estimated to ship on"` wins over `"ships"`.
const LABEL_PREFIXES: &[&str] = &[
    "estimated to ship on",
    "estimated to ship:",
    "estimated to ship",
    "campaign ended",
    "ended on",
    "ends on",
    "ended:",
    "ends:",
    "shipped",
    "ships",
    "ended",
    "ends",
];

/// Normalize arbitrary date text to `YYYY-MM-DD`, or `"Unknown"`.
pub fn normalize(raw: &str) -> String {
    parse(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse(raw: &str) -> Option<NaiveDate> {
    let trimmed = trim_noise(raw);
    if trimmed.is_empty() {
        return None;
    }

    // Already-ISO text (and ISO timestamps) pass straight through.
    if let Some(date) = leading_iso(trimmed) {
        return Some(date);
    }

    // Two dates joined by " / " keep only the primary one.
    let primary = trim_noise(trimmed.split(" / ").next().unwrap_or(trimmed));
    let stripped = strip_label(primary);

    if let Some(date) = parse_month_phrase(stripped) {
        return Some(date);
    }

    // "Sold out! Ships August 2025" carries the date mid-text.
    if let Some(pos) = primary.to_lowercase().find("ships ") {
        if let Some(date) = parse_month_phrase(&primary[pos + "ships ".len()..]) {
            return Some(date);
        }
    }

    // Last resort: scan the whole text for the first month name.
    find_month_phrase(trimmed)
}

fn trim_noise(text: &str) -> &str {
    text.trim_matches(|c: char| !c.is_alphanumeric())
}

fn leading_iso(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() < 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let (y, m, d) = (
        text.get(0..4)?.parse().ok()?,
        text.get(5..7)?.parse().ok()?,
        text.get(8..10)?.parse().ok()?,
    );
    NaiveDate::from_ymd_opt(y, m, d)
}

fn strip_label(text: &str) -> &str {
    let lower = text.to_lowercase();
    for prefix in LABEL_PREFIXES {
        if lower.starts_with(prefix) {
            return trim_noise(&text[prefix.len()..]);
        }
    }
    text
}

/// Core parse: up to three whitespace tokens read as month / day / year.
/// Month-only phrasings land on the first of the month; a missing year
/// assumes the current one.
fn parse_month_phrase(text: &str) -> Option<NaiveDate> {
    let cleaned = text.replace(',', " ");
    let mut tokens = cleaned.split_whitespace();

    let month = month_number(tokens.next()?)?;
    let second = tokens.next();
    let third = tokens.next();

    if let Some(second) = second {
        if let Some(year) = parse_year(second) {
            return NaiveDate::from_ymd_opt(year, month, 1);
        }
        if let Some(day) = parse_day(second) {
            let year = third.and_then(parse_year).unwrap_or_else(current_year);
            return NaiveDate::from_ymd_opt(year, month, day);
        }
    }
    None
}

fn find_month_phrase(text: &str) -> Option<NaiveDate> {
    let cleaned = text.replace(',', " ");
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if month_number(token).is_some() {
            return parse_month_phrase(&tokens[i..].join(" "));
        }
    }
    None
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.trim_end_matches('.').to_lowercase();
    if token.len() < 3 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let month = match &token[..3] {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn parse_day(token: &str) -> Option<u32> {
    let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
    let rest = &token[digits.len()..];
    if !rest.is_empty() && !matches!(rest.to_lowercase().as_str(), "st" | "nd" | "rd" | "th") {
        return None;
    }
    let day: u32 = digits.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn parse_year(token: &str) -> Option<i32> {
    (token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()))
        .then(|| token.parse().ok())
        .flatten()
}

fn current_year() -> i32 {
    Utc::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_date_with_label() {
        assert_eq!(normalize("Ended: March 15, 2025"), "2025-03-15");
        assert_eq!(normalize("Ends on April 2, 2026"), "2026-04-02");
    }

    #[test]
    fn test_iso_passthrough() {
        assert_eq!(normalize("2025-03-15"), "2025-03-15");
        assert_eq!(normalize("2025-03-15T10:30:00Z"), "2025-03-15");
    }

    #[test]
    fn test_month_only_lands_on_first() {
        assert_eq!(normalize("🚚 Ships June 2025"), "2025-06-01");
        assert_eq!(normalize("Estimated to Ship: July 2025"), "2025-07-01");
    }

    #[test]
    fn test_missing_year_assumes_current() {
        let year = Utc::now().year();
        assert_eq!(normalize("Ends on April 2"), format!("{year}-04-02"));
        assert_eq!(normalize("July 1, 5:00AM GMT+9"), format!("{year}-07-01"));
    }

    #[test]
    fn test_primary_date_wins_on_slash_join() {
        assert_eq!(normalize("March 1, 2025 / June 2, 2025"), "2025-03-01");
    }

    #[test]
    fn test_ships_fragment_mid_text() {
        assert_eq!(normalize("Sold out! Ships August 2025"), "2025-08-01");
    }

    #[test]
    fn test_whole_text_scan() {
        assert_eq!(normalize("Campaign Ended March 15 2025"), "2025-03-15");
    }

    #[test]
    fn test_ordinal_days() {
        assert_eq!(normalize("March 3rd, 2025"), "2025-03-03");
    }

    #[test]
    fn test_unparseable_is_sentinel() {
        assert_eq!(normalize("TBD"), UNKNOWN);
        assert_eq!(normalize(""), UNKNOWN);
        assert_eq!(normalize("February 30, 2025"), UNKNOWN);
    }
}
