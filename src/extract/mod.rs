//! Field extraction over an already-loaded product page.
//!
//! Every field runs its own fallback chain ([`strategies`]) and fails
//! independently: a missing creator never aborts the title, and exhausting
//! a chain leaves that field's sentinel in place. `extract` always returns
//! a complete record — only page-load failure (handled by the pool) aborts
//! a whole record.

pub mod strategies;
pub mod text_scan;

use crate::browser::PageSession;
use crate::config::PipelineConfig;
use crate::parse::{dates, revenue, sales, status};
use crate::record::ProductRecord;
use regex::Regex;
use strategies::Probe;
use tracing::{debug, warn};
use url::Url;

/// Base origin for absolutizing relative creator links.
pub const STOREFRONT_ORIGIN: &str = "https://www.makeship.com";

/// Populates a [`ProductRecord`] from one page session.
pub struct FieldExtractor<'a> {
    session: &'a dyn PageSession,
    config: &'a PipelineConfig,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(session: &'a dyn PageSession, config: &'a PipelineConfig) -> Self {
        Self { session, config }
    }

    /// Rebuild a record field-by-field from sentinels. Never fails.
    pub async fn extract(&self, url: &str) -> ProductRecord {
        let mut record = ProductRecord::unresolved(url);
        let field_ms = self.config.field_timeout_ms;
        let probe_ms = self.config.probe_timeout_ms;

        if let Some(title) = self.chain(strategies::TITLE, field_ms).await {
            record.title = title;
        }

        if let Some(name) = self
            .chain(strategies::CREATOR_NAME, field_ms)
            .await
            .map(|text| text.replace("By: ", "").trim().to_string())
            .filter(|name| !name.is_empty())
        {
            record.creator_name = name;
        }

        if let Some(category) = self.chain(strategies::CATEGORY, field_ms).await {
            if let Some(category) = clean_category(&category) {
                record.category = category;
            }
        }

        if let Some(raw) = self.chain(strategies::END_DATE, field_ms).await {
            record.campaign_end_date = dates::normalize(&raw);
            record.status = status::derive(&raw);
        }

        // Sales and funded texts feed one interpreter; the combined
        // visible-text scan only runs when both chains come up empty.
        let mut sales_text = self.chain(strategies::SALES, probe_ms).await;
        let mut funded_text = self.chain(strategies::FUNDED, probe_ms).await;
        if sales_text.is_none() && funded_text.is_none() {
            match self.visible_scan().await {
                Some(text) if text_scan::is_funded_text(&text) => funded_text = Some(text),
                Some(text) => sales_text = Some(text),
                None => {}
            }
        }
        let (units, rate) = sales::interpret(
            sales_text.as_deref().unwrap_or(""),
            funded_text.as_deref().unwrap_or(""),
        );
        if units.is_unknown() {
            if let Some(text) = &sales_text {
                warn!(url, text = %text, "unrecognized sales text");
            }
        }
        if rate.is_unknown() {
            if let Some(text) = &funded_text {
                warn!(url, text = %text, "unrecognized funded text");
            }
        }
        record.units_sold = units;
        record.funded_rate = rate;

        if let Some(raw) = self.chain(strategies::SHIP_DATE, field_ms).await {
            record.ship_date = dates::normalize(&raw);
        }

        if let Some(link) = self.chain(strategies::CREATOR_LINK, field_ms).await {
            record.creator_link = Some(absolutize(&link));
        }

        let price_text = self.chain(strategies::PRICE, field_ms).await;
        record.price =
            revenue::resolve_price(price_text.as_deref(), &record.category, &self.config.prices);
        record.revenue = revenue::estimate(
            record.units_sold,
            &record.category,
            price_text.as_deref(),
            &self.config.prices,
        );

        record
    }

    /// Walk a fallback chain; first non-empty text wins.
    async fn chain(&self, probes: &[Probe], timeout_ms: u64) -> Option<String> {
        for probe in probes {
            if let Some(text) = self.probe(probe, timeout_ms).await {
                debug!(?probe, text = %text, "strategy hit");
                return Some(text);
            }
        }
        None
    }

    async fn probe(&self, probe: &Probe, timeout_ms: u64) -> Option<String> {
        match probe {
            Probe::Text(selector) => self
                .session
                .inner_text(selector, timeout_ms)
                .await
                .ok()
                .flatten(),
            Probe::Attr(selector, attr) => self
                .session
                .attribute(selector, attr, timeout_ms)
                .await
                .ok()
                .flatten(),
            Probe::TextContains(selector, needle) => {
                let script = text_scan::contains_script(selector, needle);
                if let Ok(value) = self.session.evaluate(&script).await {
                    if let Some(text) = value.as_str() {
                        let text = text.trim();
                        if !text.is_empty() {
                            return Some(text.to_string());
                        }
                    }
                }
                let html = self.session.html().await.ok()?;
                text_scan::find_containing(&html, selector, needle)
            }
        }
    }

    /// Combined sales/funded scan: script pass over visible paragraphs,
    /// static scan over the page source when scripting yields nothing.
    async fn visible_scan(&self) -> Option<String> {
        if let Ok(value) = self.session.evaluate(text_scan::scan_script()).await {
            if let Some(text) = value.as_str() {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
        let html = self.session.html().await.ok()?;
        text_scan::scan_html(&html)
    }
}

/// `"Visit X Store"` wrappers reduce to the bare `X`; anything else is
/// already the category text.
fn clean_category(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let visit = Regex::new(r"(?i)^Visit\s+(.*?)\s+Store$").ok()?;
    if let Some(caps) = visit.captures(trimmed) {
        let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !inner.is_empty() {
            return Some(inner.to_string());
        }
        // Wrapper with nothing usable inside: fall back to the first word.
        let word = Regex::new(r"[A-Za-z]+").ok()?;
        return word.find(trimmed).map(|m| m.as_str().to_string());
    }
    Some(trimmed.to_string())
}

fn absolutize(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    Url::parse(STOREFRONT_ORIGIN)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::stub::{StubBrowser, StubPage};
    use crate::browser::Browser;
    use crate::record::{Rate, Status, Units, UNKNOWN};

    async fn extract_from(page: StubPage, url: &str) -> ProductRecord {
        let browser = StubBrowser::new();
        browser.insert(url, page);
        let mut session = browser.new_session(None).await.unwrap();
        session.navigate(url, 1_000).await.unwrap();
        let config = PipelineConfig::default();
        let record = FieldExtractor::new(session.as_ref(), &config)
            .extract(url)
            .await;
        session.close().await.unwrap();
        record
    }

    fn full_page() -> StubPage {
        StubPage::default()
            .with_text(strategies::ANCHOR, "Widget the Axolotl Plushie")
            .with_text(
                r#"[class*="ProductInfo__ProductHeaderWrapper"] a[href*="/shop/"] p"#,
                "Plushies",
            )
            .with_text(
                r#"[class*="ProductPageCountdown__CountdownDate"]"#,
                "Ends on March 15, 2026",
            )
            .with_text(r#"p[data-testid="units-sold-text"]"#, "1,234 of 2,000 sold")
            .with_text(r#"[class*="ProductDetails__Price"]"#, "$29.99")
            .with_text(
                r#"[class*="HybridMessagingContainer"]"#,
                "🚚 Ships September 23, 2026",
            )
            .with_attr(
                r#"[class*="CreatorMessage__CreatorMessageWrapper"] a"#,
                "href",
                "/creators/pixelcat",
            )
            .with_html(r#"<a href="/creators/pixelcat">By: PixelCat Studios</a>"#)
    }

    #[tokio::test]
    async fn test_full_page_extraction() {
        let record = extract_from(full_page(), "https://www.makeship.com/products/widget").await;

        assert_eq!(record.url, "https://www.makeship.com/products/widget");
        assert_eq!(record.title, "Widget the Axolotl Plushie");
        assert_eq!(record.creator_name, "PixelCat Studios");
        assert_eq!(
            record.creator_link.as_deref(),
            Some("https://www.makeship.com/creators/pixelcat")
        );
        assert_eq!(record.category, "Plushies");
        assert_eq!(record.status, Status::Active);
        assert_eq!(record.campaign_end_date, "2026-03-15");
        assert_eq!(record.ship_date, "2026-09-23");
        assert_eq!(record.units_sold, Units::Sold(1234));
        assert_eq!(record.funded_rate, Rate::Percent(61.7));
        assert_eq!(record.price, 29.99);
        assert_eq!(record.revenue, 37007.66);
    }

    #[tokio::test]
    async fn test_sold_out_page_assumes_minimum_commitment() {
        let page = StubPage::default()
            .with_text(strategies::ANCHOR, "Retired Legend Plushie")
            .with_text(
                r#"[class*="ProductInfo__ProductHeaderWrapper"] a[href*="/shop/"] p"#,
                "Plushies",
            )
            .with_html("<p>Sold Out</p>");
        let record = extract_from(page, "https://www.makeship.com/products/legend").await;

        assert_eq!(record.units_sold, Units::SoldOut);
        assert_eq!(record.price, 29.99);
        assert_eq!(record.revenue, 5998.0);
    }

    #[tokio::test]
    async fn test_empty_page_keeps_sentinels() {
        let record = extract_from(StubPage::default(), "https://www.makeship.com/products/x").await;

        assert_eq!(record.title, UNKNOWN);
        assert_eq!(record.creator_name, UNKNOWN);
        assert_eq!(record.category, UNKNOWN);
        assert_eq!(record.campaign_end_date, UNKNOWN);
        assert_eq!(record.ship_date, UNKNOWN);
        assert_eq!(record.creator_link, None);
        assert_eq!(record.status, Status::Unknown);
        assert_eq!(record.units_sold, Units::Unknown);
        assert_eq!(record.funded_rate, Rate::Unknown);
        // Unresolved category resolves to the default price; revenue stays
        // zero because units never resolved.
        assert_eq!(record.price, 29.99);
        assert_eq!(record.revenue, 0.0);
    }

    #[tokio::test]
    async fn test_static_scan_backfills_sales() {
        let page = StubPage::default()
            .with_text(strategies::ANCHOR, "Scanline Plushie")
            .with_html("<p>Ships worldwide</p><p>850 of 1,000 sold</p>");
        let record = extract_from(page, "https://www.makeship.com/products/scanline").await;

        assert_eq!(record.units_sold, Units::Sold(850));
        assert_eq!(record.funded_rate, Rate::Percent(85.0));
    }

    #[tokio::test]
    async fn test_static_scan_classifies_funded_text() {
        let page = StubPage::default()
            .with_text(strategies::ANCHOR, "Encore Plushie")
            .with_html("<p>1,385% Funded</p>");
        let record = extract_from(page, "https://www.makeship.com/products/encore").await;

        assert_eq!(record.units_sold, Units::Unknown);
        assert_eq!(record.funded_rate, Rate::Percent(1385.0));
        assert_eq!(record.revenue, 0.0);
    }

    #[test]
    fn test_clean_category() {
        assert_eq!(clean_category("Plushies").as_deref(), Some("Plushies"));
        assert_eq!(
            clean_category("Visit PixelCat Store").as_deref(),
            Some("PixelCat")
        );
        assert_eq!(clean_category("  ").as_deref(), None);
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("/creators/pixelcat"),
            "https://www.makeship.com/creators/pixelcat"
        );
        assert_eq!(absolutize("https://elsewhere.com/x"), "https://elsewhere.com/x");
    }
}
