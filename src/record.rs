//! Product record types — the unit of data flowing through the pipeline.
//!
//! A record is always complete: every field starts as a typed sentinel and
//! the extractor refines it in place, so downstream code branches on
//! resolution state instead of unwrapping options. Records serialize with
//! camelCase keys; sentinel states serialize as the `"Unknown"` /
//! `"Sold Out"` string literals, resolved counts and rates as plain
//! numbers. Deserialization is tolerant of older exports that stored
//! everything as strings (`"1,234"`, `"61.7%"`).

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal stored in string fields no strategy resolved.
pub const UNKNOWN: &str = "Unknown";

/// Phrase the storefront shows when a campaign hit its commitment cap
/// without displaying an exact count.
pub const SOLD_OUT: &str = "Sold Out";

/// Minimum campaign commitment assumed when a product reads "Sold Out"
/// without a unit count. Revenue for such records is `200 × price`.
pub const SOLD_OUT_MIN_UNITS: u64 = 200;

// ── Campaign status ───────────────────────

/// Whether the campaign behind a product page is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Status {
    Active,
    Ended,
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Anything unrecognized (including values from older exports)
        // collapses to Unknown rather than failing the whole document.
        let text = String::deserialize(deserializer)?;
        Ok(match text.as_str() {
            "Active" => Status::Active,
            "Ended" => Status::Ended,
            _ => Status::Unknown,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Active => f.write_str("Active"),
            Status::Ended => f.write_str("Ended"),
            Status::Unknown => f.write_str(UNKNOWN),
        }
    }
}

// ── Units sold ────────────────────────────

/// Units sold for one product: a resolved count, the sold-out placeholder,
/// or unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    Sold(u64),
    SoldOut,
    #[default]
    Unknown,
}

impl Units {
    /// Interpret a free-form text value: leading count (thousands
    /// separators tolerated), the sold-out phrase, else unresolved.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.to_lowercase().contains("sold out") {
            return Units::SoldOut;
        }
        let digits: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ',')
            .filter(|c| c.is_ascii_digit())
            .collect();
        match digits.parse::<u64>() {
            Ok(n) => Units::Sold(n),
            Err(_) => Units::Unknown,
        }
    }

    /// Quantity that enters revenue derivation: sold-out campaigns assume
    /// the minimum commitment, unresolved counts contribute nothing.
    pub fn effective_quantity(&self) -> u64 {
        match self {
            Units::Sold(n) => *n,
            Units::SoldOut => SOLD_OUT_MIN_UNITS,
            Units::Unknown => 0,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        matches!(self, Units::SoldOut)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Units::Unknown)
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Sold(n) => write!(f, "{n}"),
            Units::SoldOut => f.write_str(SOLD_OUT),
            Units::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for Units {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Units::Sold(n) => serializer.serialize_u64(*n),
            Units::SoldOut => serializer.serialize_str(SOLD_OUT),
            Units::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de> Deserialize<'de> for Units {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u64),
            Float(f64),
            Text(String),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Count(n) => Units::Sold(n),
            Repr::Float(f) if f >= 0.0 => Units::Sold(f as u64),
            Repr::Float(_) => Units::Unknown,
            Repr::Text(t) => Units::from_text(&t),
        })
    }
}

// ── Funding rate ──────────────────────────

/// Funding percentage for one product, with the same sentinel states as
/// [`Units`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Rate {
    Percent(f64),
    SoldOut,
    #[default]
    Unknown,
}

impl Rate {
    /// Interpret a free-form text value: `"61.7%"` or a bare number, the
    /// sold-out phrase, else unresolved.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.to_lowercase().contains("sold out") {
            return Rate::SoldOut;
        }
        let numeric: String = trimmed
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
            .filter(|c| *c != ',')
            .collect();
        match numeric.parse::<f64>() {
            Ok(p) => Rate::Percent(p),
            Err(_) => Rate::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Rate::Unknown)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Percent(p) => write!(f, "{p}%"),
            Rate::SoldOut => f.write_str(SOLD_OUT),
            Rate::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl Serialize for Rate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rate::Percent(p) => serializer.serialize_f64(*p),
            Rate::SoldOut => serializer.serialize_str(SOLD_OUT),
            Rate::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl<'de> Deserialize<'de> for Rate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(p) => Rate::Percent(p),
            Repr::Text(t) => Rate::from_text(&t),
        })
    }
}

// ── Product record ────────────────────────

/// One row per distinct product URL. The URL is the identity; re-scraping
/// a URL replaces the prior record wholesale, never mutates it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductRecord {
    pub url: String,
    pub status: Status,
    pub category: String,
    pub title: String,
    pub creator_name: String,
    pub creator_link: Option<String>,
    pub price: f64,
    pub units_sold: Units,
    pub funded_rate: Rate,
    /// Always derived from `units_sold` and `price`, never scraped.
    pub revenue: f64,
    pub campaign_end_date: String,
    pub ship_date: String,
}

impl Default for ProductRecord {
    fn default() -> Self {
        Self::unresolved("")
    }
}

impl ProductRecord {
    /// All-sentinel record for a URL; each extraction attempt starts from
    /// here and refines fields independently.
    pub fn unresolved(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: Status::Unknown,
            category: UNKNOWN.to_string(),
            title: UNKNOWN.to_string(),
            creator_name: UNKNOWN.to_string(),
            creator_link: None,
            price: 0.0,
            units_sold: Units::Unknown,
            funded_rate: Rate::Unknown,
            revenue: 0.0,
            campaign_end_date: UNKNOWN.to_string(),
            ship_date: UNKNOWN.to_string(),
        }
    }
}
