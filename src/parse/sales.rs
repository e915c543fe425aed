//! Sales/funded text interpretation.
//!
//! Turns the raw progress-bar texts scraped off a product page into a
//! typed unit count and funding rate. The storefront shows one of three
//! shapes for sales (`"1,234 of 2,000 sold"`, `"1,234 sold"`, `"Sold
//! Out"`) and one for funding (`"150% Funded"`, optionally `"150%+
//! Funded"`). An explicit funded percentage always beats a ratio derived
//! from the sales text — that ordering is load-bearing.

use crate::record::{Rate, Units};
use regex::Regex;

/// Interpret raw sales and funded texts into `(units, rate)`.
///
/// Both inputs may be arbitrary junk; unmatched fields come back as the
/// `Unknown` sentinel, never as an error.
pub fn interpret(sales_raw: &str, funded_raw: &str) -> (Units, Rate) {
    let mut units = Units::Unknown;
    let mut rate = Rate::Unknown;

    // Units: "A of B sold" beats "A sold" beats the bare sold-out phrase.
    if let Some((a, _)) = sold_of_total(sales_raw) {
        units = Units::Sold(a);
    } else if let Some(a) = sold_count(sales_raw) {
        units = Units::Sold(a);
    } else if contains_sold_out(sales_raw) {
        units = Units::SoldOut;
    }

    // Rate: an explicit percentage wins unconditionally.
    if let Some(p) = funded_percent(funded_raw) {
        rate = Rate::Percent(p);
    } else if contains_sold_out(funded_raw) {
        rate = Rate::SoldOut;
    }

    // Derived rate from the A-of-B ratio, only when nothing explicit
    // resolved and the sales text actually carried a total.
    if rate.is_unknown() {
        if let (Units::Sold(_), Some((a, b))) = (units, sold_of_total(sales_raw)) {
            rate = if b == 0 {
                Rate::Percent(0.0)
            } else {
                Rate::Percent(round1(a as f64 / b as f64 * 100.0))
            };
        }
    }

    // Catch-all: neither text matched any pattern but the phrase appears
    // somewhere — treat the whole campaign as sold out.
    if units.is_unknown()
        && rate.is_unknown()
        && (contains_sold_out(sales_raw) || contains_sold_out(funded_raw))
    {
        units = Units::SoldOut;
        rate = Rate::SoldOut;
    }

    (units, rate)
}

fn contains_sold_out(text: &str) -> bool {
    text.to_lowercase().contains("sold out")
}

fn sold_of_total(text: &str) -> Option<(u64, u64)> {
    let re = Regex::new(r"(?i)([0-9,]+)\s+of\s+([0-9,]+)\s+sold").ok()?;
    let caps = re.captures(text)?;
    let a = parse_count(caps.get(1)?.as_str())?;
    let b = parse_count(caps.get(2)?.as_str())?;
    Some((a, b))
}

fn sold_count(text: &str) -> Option<u64> {
    let re = Regex::new(r"(?i)([0-9,]+)\s+sold").ok()?;
    let caps = re.captures(text)?;
    parse_count(caps.get(1)?.as_str())
}

fn funded_percent(text: &str) -> Option<f64> {
    let re = Regex::new(r"(?i)([0-9][0-9,]*(?:\.[0-9]+)?)%(?:\s*\+)?\s+funded").ok()?;
    let caps = re.captures(text)?;
    caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok()
}

fn parse_count(text: &str) -> Option<u64> {
    text.replace(',', "").parse::<u64>().ok()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
