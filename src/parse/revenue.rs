//! Revenue estimation and the category→unit-price fallback table.
//!
//! Revenue is always derived, never scraped: `effective units × resolved
//! price`, rounded to cents. The resolved price prefers the scraped price
//! text, but a missing or zero price falls back to the category table so a
//! finished record never carries a zero price.

use crate::record::Units;
use fnv::FnvHashMap;
use regex::Regex;

/// Category→unit-price lookup with a default for unrecognized lines.
///
/// Keys are stored lowercase. Lookup order: exact match, then substring
/// containment in table order (either direction), then the default.
#[derive(Debug, Clone)]
pub struct CategoryPrices {
    exact: FnvHashMap<String, f64>,
    ordered: Vec<(String, f64)>,
    default_price: f64,
}

impl CategoryPrices {
    /// Price table for the storefront's current product lines. The default
    /// is the cheapest common line (standard plushies).
    pub fn builtin() -> Self {
        Self::new(
            [
                ("hoodies", 59.99),
                ("knitted crewnecks", 59.99),
                ("t-shirts", 29.99),
                ("enamel pins", 19.99),
                ("vinyl figures", 29.99),
                ("plushies", 29.99),
                ("longbois", 36.99),
                ("doughbois", 39.99),
                ("jumbo plushies", 39.99),
                ("keychain plushies", 15.99),
                ("sweatpants", 54.99),
                ("ball cap", 24.99),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v)),
            29.99,
        )
    }

    pub fn new(entries: impl IntoIterator<Item = (String, f64)>, default_price: f64) -> Self {
        let mut exact = FnvHashMap::default();
        let mut ordered = Vec::new();
        for (key, price) in entries {
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            exact.insert(key.clone(), price);
            ordered.push((key, price));
        }
        Self {
            exact,
            ordered,
            default_price,
        }
    }

    pub fn default_price(&self) -> f64 {
        self.default_price
    }

    /// Resolve a unit price for a category string. Never fails — an
    /// unrecognized or sentinel category resolves to the default price.
    pub fn lookup(&self, category: &str) -> f64 {
        let key = category.trim().to_lowercase();
        if key.is_empty() {
            return self.default_price;
        }
        if let Some(&price) = self.exact.get(&key) {
            return price;
        }
        // Containment scan in table order keeps ambiguous inputs
        // deterministic ("plush" hits the first plush line).
        for (known, price) in &self.ordered {
            if key.contains(known.as_str()) || known.contains(&key) {
                return *price;
            }
        }
        self.default_price
    }
}

/// Parse the first dollar-ish number out of a price text (`"$29.99"`,
/// `"Total Price: $1,299.00"`). Zero and negative values are rejected so
/// the category fallback kicks in.
pub fn parse_price(text: &str) -> Option<f64> {
    let re = Regex::new(r"\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)").ok()?;
    let caps = re.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    (value > 0.0).then_some(value)
}

/// Resolve the unit price: scraped text when present and non-zero, else
/// the category table.
pub fn resolve_price(price_text: Option<&str>, category: &str, prices: &CategoryPrices) -> f64 {
    price_text
        .and_then(parse_price)
        .unwrap_or_else(|| prices.lookup(category))
}

/// Estimate revenue for one product.
///
/// Sold-out campaigns assume the minimum commitment quantity; unresolved
/// units yield zero. Rounded to 2 decimals.
pub fn estimate(
    units: Units,
    category: &str,
    price_text: Option<&str>,
    prices: &CategoryPrices,
) -> f64 {
    if units.is_unknown() {
        return 0.0;
    }
    let price = resolve_price(price_text, category, prices);
    round2(units.effective_quantity() as f64 * price)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SOLD_OUT_MIN_UNITS;

    #[test]
    fn test_lookup_case_insensitive() {
        let prices = CategoryPrices::builtin();
        assert_eq!(prices.lookup("Hoodies"), prices.lookup("hoodies"));
        assert_eq!(prices.lookup("HOODIES"), 59.99);
    }

    #[test]
    fn test_lookup_substring_both_directions() {
        let prices = CategoryPrices::builtin();
        // Category text longer than the key.
        assert_eq!(prices.lookup("limited edition plushies"), 29.99);
        // Key longer than the category text.
        assert_eq!(prices.lookup("crewnecks"), 59.99);
    }

    #[test]
    fn test_lookup_unknown_falls_to_default() {
        let prices = CategoryPrices::builtin();
        assert_eq!(prices.lookup("mystery boxes"), 29.99);
        assert_eq!(prices.lookup("Unknown"), 29.99);
        assert_eq!(prices.lookup(""), 29.99);
    }

    #[test]
    fn test_lookup_specific_keys_win_exact() {
        let prices = CategoryPrices::builtin();
        assert_eq!(prices.lookup("keychain plushies"), 15.99);
        assert_eq!(prices.lookup("jumbo plushies"), 39.99);
    }

    #[test]
    fn test_parse_price_shapes() {
        assert_eq!(parse_price("$29.99"), Some(29.99));
        assert_eq!(parse_price("Total Price: $1,299.00"), Some(1299.0));
        assert_eq!(parse_price("36.99 USD"), Some(36.99));
        assert_eq!(parse_price("$0.00"), None);
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn test_estimate_unknown_units_is_zero() {
        let prices = CategoryPrices::builtin();
        assert_eq!(estimate(Units::Unknown, "plushies", Some("29.99"), &prices), 0.0);
    }

    #[test]
    fn test_estimate_sold_out_uses_minimum_commitment() {
        let prices = CategoryPrices::builtin();
        let revenue = estimate(Units::SoldOut, "plushies", None, &prices);
        assert_eq!(revenue, SOLD_OUT_MIN_UNITS as f64 * 29.99);
        assert_eq!(revenue, 5998.0);
    }

    #[test]
    fn test_estimate_sold_out_prefers_scraped_price() {
        let prices = CategoryPrices::builtin();
        let revenue = estimate(Units::SoldOut, "plushies", Some("$39.99"), &prices);
        assert_eq!(revenue, 200.0 * 39.99);
    }

    #[test]
    fn test_estimate_zero_price_text_falls_back_to_table() {
        let prices = CategoryPrices::builtin();
        let revenue = estimate(Units::Sold(10), "hoodies", Some("$0.00"), &prices);
        assert_eq!(revenue, 599.9);
    }

    #[test]
    fn test_estimate_rounds_to_cents() {
        let prices = CategoryPrices::builtin();
        let revenue = estimate(Units::Sold(1234), "plushies", Some("29.99"), &prices);
        assert_eq!(revenue, 37007.66);
    }
}
