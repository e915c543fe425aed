//! Pipeline configuration and input-source loading.
//!
//! The core never discovers inputs implicitly (no "latest file in cwd"
//! scanning): everything the pipeline touches — URL list, proxy list, price
//! table, output directory, timeouts — arrives through [`PipelineConfig`]
//! or an explicit loader call.

use crate::parse::revenue::CategoryPrices;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Malformed or empty pipeline inputs. These are pre-flight failures: the
/// run aborts before any task is scheduled.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("proxy list is empty (every task needs a distinct egress identity)")]
    EmptyProxyList,
    #[error("url list is empty")]
    EmptyUrlList,
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Knobs for one pipeline run. Defaults match the production scrape
/// profile; the CLI overrides individual fields from flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum simultaneously in-flight page loads.
    pub concurrency: usize,
    /// Full page navigation budget.
    pub nav_timeout_ms: u64,
    /// Extra settle delay after the anchor element appears, for
    /// client-side rendering to finish.
    pub settle_ms: u64,
    /// Budget for a required single-field read.
    pub field_timeout_ms: u64,
    /// Budget for a speculative fallback probe. Kept short so a dead
    /// strategy doesn't stall the chain.
    pub probe_timeout_ms: u64,
    /// Where snapshots land (created if absent).
    pub out_dir: PathBuf,
    pub headless: bool,
    /// Explicit chromium executable, bypassing discovery.
    pub chromium: Option<PathBuf>,
    pub prices: CategoryPrices,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            nav_timeout_ms: 30_000,
            settle_ms: 2_000,
            field_timeout_ms: 3_000,
            probe_timeout_ms: 1_000,
            out_dir: PathBuf::from("snapshots"),
            headless: true,
            chromium: None,
            prices: CategoryPrices::builtin(),
        }
    }
}

// ── URL list ──

/// Load product URLs from a newline-delimited file. Lines are either a
/// bare absolute URL or an `"N. <url>"` enumerated line; anything else is
/// skipped silently.
pub fn load_urls(path: &Path) -> Result<Vec<String>, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let urls = parse_url_lines(&text);
    if urls.is_empty() {
        return Err(SourceError::EmptyUrlList);
    }
    Ok(urls)
}

pub fn parse_url_lines(text: &str) -> Vec<String> {
    let enumerated = Regex::new(r"^\d+\.\s*(https?://\S+)").ok();
    let mut urls = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("http://") || line.starts_with("https://") {
            urls.push(line.to_string());
        } else if let Some(caps) = enumerated.as_ref().and_then(|re| re.captures(line)) {
            urls.push(caps[1].to_string());
        } else {
            skipped += 1;
        }
    }
    debug!(kept = urls.len(), skipped, "parsed url list");
    urls
}
