//! Full-pipeline integration test against the in-memory stub browser:
//! - Two-phase scheduling (sold-out re-scrape strictly before the remainder)
//! - Browsing-context accounting under failure (serialization, closure)
//! - Last-write-wins reconciliation and uniform normalization
//! - Snapshot write/read round trip and document shape

use assert_json_diff::assert_json_include;
use merchwatch::browser::stub::{StubBrowser, StubPage};
use merchwatch::browser::Browser;
use merchwatch::config::PipelineConfig;
use merchwatch::extract::strategies;
use merchwatch::pool::ScrapeWorkerPool;
use merchwatch::progress::{self, Phase, ProgressEventKind};
use merchwatch::proxy::ProxyRotator;
use merchwatch::record::{ProductRecord, Rate, Units};
use merchwatch::snapshot::{self, SnapshotReconciler};
use std::sync::Arc;
use tempfile::TempDir;

// ── Fixture builders ──

const URL_A: &str = "https://www.makeship.com/products/axolotl";
const URL_B: &str = "https://www.makeship.com/products/bat";
const URL_C: &str = "https://www.makeship.com/products/capy";

fn product_page(title: &str, sales: &str, price: &str) -> StubPage {
    StubPage::default()
        .with_text(strategies::ANCHOR, title)
        .with_text(
            r#"[class*="ProductInfo__ProductHeaderWrapper"] a[href*="/shop/"] p"#,
            "Plushies",
        )
        .with_text(r#"p[data-testid="units-sold-text"]"#, sales)
        .with_text(r#"[class*="ProductDetails__Price"]"#, price)
}

fn rotator() -> ProxyRotator {
    ProxyRotator::new(vec!["10.0.0.1:8080".into(), "10.0.0.2:8080".into()]).unwrap()
}

fn pool_config(concurrency: usize) -> PipelineConfig {
    PipelineConfig {
        concurrency,
        settle_ms: 0,
        ..Default::default()
    }
}

fn sold_out_record(url: &str, title: &str) -> ProductRecord {
    let mut r = ProductRecord::unresolved(url);
    r.title = title.to_string();
    r.category = "Plushies".to_string();
    r.units_sold = Units::SoldOut;
    r
}

// ── Scheduling ──

#[tokio::test]
async fn test_rescrape_phase_runs_before_remainder() {
    let browser = StubBrowser::new();
    browser.insert(URL_A, product_page("A", "10 of 100 sold", "$29.99"));
    browser.insert(URL_B, product_page("B", "20 of 100 sold", "$29.99"));
    browser.insert(URL_C, product_page("C", "Sold Out", "$29.99"));

    let (tx, mut rx) = progress::channel();
    let pool = ScrapeWorkerPool::new(Arc::new(browser.clone()), pool_config(4))
        .with_progress(tx, progress::run_id());

    let urls: Vec<String> = [URL_A, URL_B, URL_C].map(String::from).to_vec();
    let rescrape = vec![URL_C.to_string()];
    let outcome = pool.run(&urls, &rescrape, &rotator()).await;
    drop(pool);

    // Phase-one results come first; within a phase, input order is kept.
    let order: Vec<&str> = outcome.results.iter().map(|(u, _)| u.as_str()).collect();
    assert_eq!(order, vec![URL_C, URL_A, URL_B]);
    assert_eq!(outcome.succeeded(), 3);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let phase_starts: Vec<Phase> = events
        .iter()
        .filter_map(|e| match &e.event {
            ProgressEventKind::PhaseStarted { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(phase_starts, vec![Phase::SoldOutRescrape, Phase::Remainder]);
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));

    // The re-scraped URL is tagged with its phase.
    assert!(events.iter().any(|e| matches!(
        &e.event,
        ProgressEventKind::UrlScraped { url, phase: Phase::SoldOutRescrape, .. } if url == URL_C
    )));
}

// ── Context accounting ──

#[tokio::test]
async fn test_concurrency_one_serializes_and_closes_every_context() {
    let browser = StubBrowser::new();
    browser.insert(URL_A, product_page("A", "10 of 100 sold", "$29.99"));
    browser.insert(URL_B, StubPage::failing());
    browser.insert(URL_C, product_page("C", "30 of 100 sold", "$29.99"));

    let pool = ScrapeWorkerPool::new(Arc::new(browser.clone()), pool_config(1));
    let urls: Vec<String> = [URL_A, URL_B, URL_C].map(String::from).to_vec();
    let outcome = pool.run(&urls, &[], &rotator()).await;

    assert_eq!(outcome.succeeded(), 2);
    assert_eq!(outcome.failed(), 1);
    assert!(outcome.results[1].1.is_err());

    // Never more than one live context, and all three were closed even
    // though the middle task failed.
    assert_eq!(browser.peak_active(), 1);
    assert_eq!(browser.opened(), 3);
    assert_eq!(browser.closed(), 3);
    assert_eq!(browser.active_sessions(), 0);
}

// ── Reconciliation ──

#[tokio::test]
async fn test_full_run_reconciles_against_prior_snapshot() {
    let dir = TempDir::new().unwrap();

    // Yesterday's snapshot: A stuck on the sold-out sentinel, B stale.
    let mut prior = SnapshotReconciler::new();
    prior.merge(vec![
        sold_out_record(URL_A, "Old A"),
        sold_out_record(URL_B, "Old B"),
    ]);
    let mut stale_b = sold_out_record(URL_B, "Old B");
    stale_b.units_sold = Units::Sold(5);
    prior.merge(vec![stale_b]);
    let prior_path = prior.into_snapshot().write_to(dir.path()).unwrap();

    // Today's run starts from that file.
    let mut reconciler = SnapshotReconciler::new();
    reconciler.merge(snapshot::load_records(&prior_path).unwrap());
    let rescrape = reconciler.sold_out_urls();
    assert_eq!(rescrape, vec![URL_A]);

    let browser = StubBrowser::new();
    browser.insert(URL_A, product_page("Fresh A", "1,234 of 2,000 sold", "$29.99"));
    browser.insert(URL_B, product_page("Fresh B", "Sold Out", ""));
    let pool = ScrapeWorkerPool::new(Arc::new(browser.clone()), pool_config(4));
    let urls: Vec<String> = [URL_A, URL_B].map(String::from).to_vec();
    let outcome = pool.run(&urls, &rescrape, &rotator()).await;
    assert_eq!(outcome.succeeded(), 2);

    reconciler.merge(outcome.records().cloned());
    reconciler.normalize(&PipelineConfig::default().prices);
    let snap = reconciler.into_snapshot();

    // Fresh results win; first-seen order is kept.
    assert_eq!(snap.total_count, 2);
    assert_eq!(snap.products[0].url, URL_A);
    assert_eq!(snap.products[0].title, "Fresh A");
    assert_eq!(snap.products[0].units_sold, Units::Sold(1234));
    assert_eq!(snap.products[0].funded_rate, Rate::Percent(61.7));
    assert_eq!(snap.products[0].revenue, 37007.66);
    // Sold-out with no scraped price: minimum commitment × category price.
    assert_eq!(snap.products[1].title, "Fresh B");
    assert_eq!(snap.products[1].units_sold, Units::SoldOut);
    assert_eq!(snap.products[1].revenue, 5998.0);

    let path = snap.write_to(dir.path()).unwrap();
    let reloaded = snapshot::load_records(&path).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].units_sold, Units::Sold(1234));
    assert_eq!(reloaded[1].units_sold, Units::SoldOut);
}

// ── Snapshot document ──

#[test]
fn test_snapshot_document_shape() {
    let mut reconciler = SnapshotReconciler::new();
    let mut r = ProductRecord::unresolved(URL_A);
    r.title = "Widget".to_string();
    r.category = "Hoodies".to_string();
    r.units_sold = Units::Sold(10);
    r.funded_rate = Rate::Percent(5.0);
    reconciler.merge(vec![r]);
    reconciler.normalize(&PipelineConfig::default().prices);

    let snap = reconciler.into_snapshot();
    let actual = serde_json::to_value(&snap).unwrap();
    assert_json_include!(
        actual: actual.clone(),
        expected: serde_json::json!({
            "totalCount": 1,
            "products": [{
                "url": URL_A,
                "title": "Widget",
                "category": "Hoodies",
                "unitsSold": 10,
                "fundedRate": 5.0,
                "price": 59.99,
                "revenue": 599.9,
                "status": "Unknown",
            }]
        })
    );
    assert!(actual.get("generatedAt").is_some());
}

#[test]
fn test_legacy_string_forms_coerce_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.json");
    std::fs::write(
        &path,
        r#"{"products":[{"url":"https://www.makeship.com/products/old",
            "unitsSold":"1,234","fundedRate":"61.7%"}]}"#,
    )
    .unwrap();

    let records = snapshot::load_records(&path).unwrap();
    assert_eq!(records[0].units_sold, Units::Sold(1234));
    assert_eq!(records[0].funded_rate, Rate::Percent(61.7));
}
