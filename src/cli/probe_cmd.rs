//! `merchwatch probe` — can we reach one product page at all?
//!
//! Walks the egress candidates (direct first, then each proxy in rotation
//! order) until one loads the page or the attempt budget runs out. Useful
//! for separating "the site blocks us" from "the proxy list is dead".

use crate::browser::chromium::ChromiumBrowser;
use crate::browser::{Browser, NavigationResult};
use crate::cli::output::{self, Styled};
use crate::config::PipelineConfig;
use crate::proxy::{Egress, ProxyRotator, RetryOutcome, RetryPolicy};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

/// Run the probe command.
pub async fn run(url: &str, proxies: &Path, attempts: Option<usize>) -> Result<()> {
    let s = Styled::new();
    let config = PipelineConfig::default();
    let rotator = ProxyRotator::load(proxies)?;
    // Default budget: the direct attempt plus one per proxy.
    let policy = RetryPolicy::new(attempts.unwrap_or(rotator.len() + 1));

    let browser = ChromiumBrowser::launch(&config)
        .await
        .context("failed to launch chromium")?;
    let last_nav: Mutex<Option<NavigationResult>> = Mutex::new(None);

    let browser_ref = &browser;
    let last_nav_ref = &last_nav;
    let nav_timeout_ms = config.nav_timeout_ms;
    let outcome = policy
        .run(&rotator, move |egress| {
            let browser = browser_ref;
            let last_nav = last_nav_ref;
            async move {
                let proxy = match &egress {
                    Egress::Direct => None,
                    Egress::Proxy(addr) => Some(addr.as_str()),
                };
                let mut session = browser.new_session(proxy).await?;
                let nav = session.navigate(url, nav_timeout_ms).await;
                let closed = session.close().await;
                let nav = nav?;
                closed?;
                if let Ok(mut slot) = last_nav.lock() {
                    *slot = Some(nav);
                }
                Ok(())
            }
        })
        .await;

    if let Err(e) = browser.shutdown().await {
        warn!("chromium shutdown failed: {e:#}");
    }

    match outcome {
        RetryOutcome::Succeeded { attempt, egress } => {
            let nav = last_nav.into_inner().unwrap_or(None);
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "url": url,
                    "result": "ok",
                    "attempt": attempt,
                    "egress": egress.to_string(),
                    "loadTimeMs": nav.as_ref().map(|n| n.load_time_ms),
                    "finalUrl": nav.as_ref().map(|n| n.final_url.clone()),
                }));
                return Ok(());
            }
            match nav {
                Some(nav) => eprintln!(
                    "  {} Reachable via {egress} (attempt {attempt}, {}ms)",
                    s.ok_sym(),
                    nav.load_time_ms
                ),
                None => eprintln!("  {} Reachable via {egress} (attempt {attempt})", s.ok_sym()),
            }
            Ok(())
        }
        RetryOutcome::Exhausted { attempts } => {
            if output::is_json() {
                output::print_json(&serde_json::json!({
                    "url": url,
                    "result": "exhausted",
                    "attempts": attempts,
                }));
                return Ok(());
            }
            eprintln!("  {} {url} unreachable", s.fail_sym());
            bail!("all {attempts} attempt(s) failed")
        }
    }
}
