//! Snapshot documents and URL-keyed reconciliation.
//!
//! A snapshot is one immutable, timestamped export of the full product
//! map. The reconciler merges historical snapshots and current-run results
//! last-write-wins by URL (callers feed sources oldest-first), normalizes
//! every record uniformly regardless of which run produced it, and emits a
//! stable first-seen-ordered product list.

use crate::parse::dates;
use crate::parse::revenue::{round2, CategoryPrices};
use crate::record::ProductRecord;
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use fnv::FnvHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// List key written by older exports.
const LEGACY_PRODUCTS_KEY: &str = "제품_목록";

// ── Snapshot document ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// RFC 3339 UTC generation timestamp.
    pub generated_at: String,
    pub total_count: usize,
    pub products: Vec<ProductRecord>,
}

impl Snapshot {
    pub fn from_records(products: Vec<ProductRecord>) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            total_count: products.len(),
            products,
        }
    }

    /// Write `products_%Y%m%d_%H%M%S.json` into `out_dir` (created if
    /// absent) and return the path.
    pub fn write_to(&self, out_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let filename = format!("products_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = out_dir.join(filename);
        let json = serde_json::to_string_pretty(self).context("failed to serialize snapshot")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), total = self.total_count, "snapshot written");
        Ok(path)
    }
}

/// Load the product list out of a snapshot document. Accepts the
/// `products` key, the legacy localized list key, or — when neither is
/// present — the whole document as a single record.
pub fn load_records(path: &Path) -> Result<Vec<ProductRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let records = if let Some(list) = value
        .get("products")
        .or_else(|| value.get(LEGACY_PRODUCTS_KEY))
    {
        serde_json::from_value(list.clone())
            .with_context(|| format!("{} has a malformed product list", path.display()))?
    } else {
        let record: ProductRecord = serde_json::from_value(value)
            .with_context(|| format!("{} is not a product record", path.display()))?;
        vec![record]
    };
    debug!(path = %path.display(), records = records.len(), "snapshot loaded");
    Ok(records)
}

// ── Reconciler ──

/// URL-keyed merge map preserving first-seen order.
#[derive(Debug, Default)]
pub struct SnapshotReconciler {
    records: FnvHashMap<String, ProductRecord>,
    order: Vec<String>,
}

impl SnapshotReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge records last-write-wins: a URL already present keeps its
    /// first-seen position but takes the newer record wholesale.
    pub fn merge(&mut self, records: impl IntoIterator<Item = ProductRecord>) {
        for record in records {
            if !self.records.contains_key(&record.url) {
                self.order.push(record.url.clone());
            }
            self.records.insert(record.url.clone(), record);
        }
    }

    /// URLs currently stuck on the sold-out sentinel, in first-seen order.
    /// These drive phase-one scheduling.
    pub fn sold_out_urls(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|url| {
                self.records
                    .get(*url)
                    .is_some_and(|r| r.units_sold.is_sold_out())
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<&ProductRecord> {
        self.records.get(url)
    }

    /// Field-level normalization over the whole map. Pure per-record work,
    /// so it runs data-parallel.
    pub fn normalize(&mut self, prices: &CategoryPrices) {
        self.records
            .par_iter_mut()
            .for_each(|(_, record)| normalize_record(record, prices));
    }

    /// Consume into an ordered snapshot document.
    pub fn into_snapshot(mut self) -> Snapshot {
        let mut products = Vec::with_capacity(self.order.len());
        for url in &self.order {
            if let Some(record) = self.records.remove(url) {
                products.push(record);
            }
        }
        Snapshot::from_records(products)
    }
}

/// Uniform cleanup applied to every reconciled record: dates re-normalized,
/// zero/missing prices backfilled from the category table, revenue
/// re-derived. A record whose units resolve to zero always carries zero
/// revenue, whatever an earlier run computed.
fn normalize_record(record: &mut ProductRecord, prices: &CategoryPrices) {
    record.campaign_end_date = dates::normalize(&record.campaign_end_date);
    record.ship_date = dates::normalize(&record.ship_date);
    if record.price <= 0.0 {
        record.price = prices.lookup(&record.category);
    }
    record.revenue = round2(record.units_sold.effective_quantity() as f64 * record.price);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Rate, Units};

    fn record(url: &str, title: &str) -> ProductRecord {
        let mut r = ProductRecord::unresolved(url);
        r.title = title.to_string();
        r
    }

    #[test]
    fn test_last_write_wins_keeps_first_seen_order() {
        let mut rec = SnapshotReconciler::new();
        rec.merge(vec![record("https://s/x", "old"), record("https://s/y", "y")]);
        rec.merge(vec![record("https://s/x", "new")]);

        assert_eq!(rec.len(), 2);
        let snapshot = rec.into_snapshot();
        assert_eq!(snapshot.total_count, 2);
        assert_eq!(snapshot.products[0].url, "https://s/x");
        assert_eq!(snapshot.products[0].title, "new");
        assert_eq!(snapshot.products[1].url, "https://s/y");
    }

    #[test]
    fn test_sold_out_urls_in_order() {
        let mut rec = SnapshotReconciler::new();
        let mut a = record("https://s/a", "a");
        a.units_sold = Units::SoldOut;
        let b = record("https://s/b", "b");
        let mut c = record("https://s/c", "c");
        c.units_sold = Units::SoldOut;
        rec.merge(vec![a, b, c]);

        assert_eq!(rec.sold_out_urls(), vec!["https://s/a", "https://s/c"]);
    }

    #[test]
    fn test_normalize_zero_units_forces_zero_revenue() {
        let mut rec = SnapshotReconciler::new();
        let mut r = record("https://s/z", "z");
        r.units_sold = Units::Sold(0);
        r.price = 29.99;
        r.revenue = 999.9;
        rec.merge(vec![r]);

        rec.normalize(&CategoryPrices::builtin());
        assert_eq!(rec.get("https://s/z").unwrap().revenue, 0.0);
    }

    #[test]
    fn test_normalize_backfills_price_and_revenue() {
        let mut rec = SnapshotReconciler::new();
        let mut r = record("https://s/p", "p");
        r.category = "Plushies".to_string();
        r.units_sold = Units::Sold(100);
        r.funded_rate = Rate::Percent(50.0);
        r.price = 0.0;
        rec.merge(vec![r]);

        rec.normalize(&CategoryPrices::builtin());
        let r = rec.get("https://s/p").unwrap();
        assert_eq!(r.price, 29.99);
        assert_eq!(r.revenue, 2999.0);
    }

    #[test]
    fn test_normalize_cleans_date_phrasings() {
        let mut rec = SnapshotReconciler::new();
        let mut r = record("https://s/d", "d");
        r.campaign_end_date = "Ended: March 15, 2025".to_string();
        r.ship_date = "2025-06-01".to_string();
        rec.merge(vec![r]);

        rec.normalize(&CategoryPrices::builtin());
        let r = rec.get("https://s/d").unwrap();
        assert_eq!(r.campaign_end_date, "2025-03-15");
        assert_eq!(r.ship_date, "2025-06-01");
    }

    #[test]
    fn test_load_records_accepts_all_document_shapes() {
        let dir = tempfile::tempdir().unwrap();

        let current = dir.path().join("current.json");
        std::fs::write(
            &current,
            r#"{"generatedAt":"2025-08-01T00:00:00Z","totalCount":1,
               "products":[{"url":"https://s/a","unitsSold":10}]}"#,
        )
        .unwrap();
        assert_eq!(load_records(&current).unwrap().len(), 1);

        let legacy = dir.path().join("legacy.json");
        std::fs::write(
            &legacy,
            r#"{"제품_목록":[{"url":"https://s/b","unitsSold":"Sold Out"}]}"#,
        )
        .unwrap();
        let records = load_records(&legacy).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].units_sold.is_sold_out());

        let single = dir.path().join("single.json");
        std::fs::write(&single, r#"{"url":"https://s/c"}"#).unwrap();
        assert_eq!(load_records(&single).unwrap()[0].url, "https://s/c");
    }

    #[test]
    fn test_snapshot_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = SnapshotReconciler::new();
        rec.merge(vec![record("https://s/a", "a"), record("https://s/b", "b")]);
        let path = rec.into_snapshot().write_to(dir.path()).unwrap();

        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("products_") && n.ends_with(".json")));
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://s/a");
    }
}
