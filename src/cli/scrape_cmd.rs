// Copyright 2026 Merchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `merchwatch scrape` — run the full two-phase pipeline.

use crate::browser::chromium::ChromiumBrowser;
use crate::browser::Browser;
use crate::cli::output::{self, Styled};
use crate::config::{self, PipelineConfig};
use crate::pool::ScrapeWorkerPool;
use crate::progress::{self, ProgressEventKind, ProgressReceiver};
use crate::proxy::ProxyRotator;
use crate::snapshot::{self, SnapshotReconciler};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// Flags for one scrape run, resolved onto [`PipelineConfig`] defaults.
pub struct ScrapeOpts {
    pub urls: PathBuf,
    pub proxies: PathBuf,
    /// Prior snapshot files, oldest first.
    pub snapshots: Vec<PathBuf>,
    pub out: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub nav_timeout: Option<u64>,
    pub settle: Option<u64>,
    pub headful: bool,
    pub chromium: Option<PathBuf>,
}

/// Run the scrape command.
pub async fn run(opts: ScrapeOpts) -> Result<()> {
    let s = Styled::new();

    let mut config = PipelineConfig::default();
    if let Some(n) = opts.concurrency {
        config.concurrency = n;
    }
    if let Some(ms) = opts.nav_timeout {
        config.nav_timeout_ms = ms;
    }
    if let Some(ms) = opts.settle {
        config.settle_ms = ms;
    }
    if let Some(dir) = opts.out {
        config.out_dir = dir;
    }
    if opts.headful {
        config.headless = false;
    }
    if let Some(path) = opts.chromium {
        config.chromium = Some(path);
    }

    let url_list = config::load_urls(&opts.urls)?;
    let rotator = ProxyRotator::load(&opts.proxies)?;
    info!(urls = url_list.len(), proxies = rotator.len(), "inputs loaded");

    // Prior snapshots seed the reconciler; their sold-out URLs are scheduled
    // ahead of everything else so ambiguous records get refreshed first.
    let mut reconciler = SnapshotReconciler::new();
    for path in &opts.snapshots {
        let records = snapshot::load_records(path)?;
        info!(path = %path.display(), records = records.len(), "prior snapshot merged");
        reconciler.merge(records);
    }
    let rescrape = reconciler.sold_out_urls();

    if !output::is_quiet() && !output::is_json() {
        eprintln!(
            "  Scraping {} URL(s) ({} sold-out re-scrape), {} prox(ies), concurrency {}",
            url_list.len(),
            rescrape.len(),
            rotator.len(),
            config.concurrency
        );
    }

    let browser: Arc<dyn Browser> = Arc::new(
        ChromiumBrowser::launch(&config)
            .await
            .context("failed to launch chromium")?,
    );

    let (tx, rx) = progress::channel();
    let pool = ScrapeWorkerPool::new(Arc::clone(&browser), config.clone())
        .with_progress(tx, progress::run_id());
    let bars = if output::is_quiet() || output::is_json() {
        drop(rx);
        None
    } else {
        Some(spawn_phase_bars(rx))
    };

    let outcome = pool.run(&url_list, &rescrape, &rotator).await;

    // Persist before anything else can go wrong.
    reconciler.merge(outcome.records().cloned());
    reconciler.normalize(&config.prices);
    let snap = reconciler.into_snapshot();
    let path = snap.write_to(&config.out_dir)?;
    pool.announce_snapshot(&path, snap.total_count);

    if let Err(e) = browser.shutdown().await {
        warn!("chromium shutdown failed: {e:#}");
    }
    drop(pool);
    if let Some(handle) = bars {
        let _ = handle.await;
    }

    if output::is_json() {
        let failed: Vec<serde_json::Value> = outcome
            .results
            .iter()
            .filter_map(|(url, result)| {
                result
                    .as_ref()
                    .err()
                    .map(|e| serde_json::json!({ "url": url, "reason": e.to_string() }))
            })
            .collect();
        output::print_json(&serde_json::json!({
            "snapshot": path.display().to_string(),
            "totalCount": snap.total_count,
            "succeeded": outcome.succeeded(),
            "failed": failed,
            "phases": outcome.reports,
        }));
        return Ok(());
    }

    if !output::is_quiet() {
        eprintln!();
        for report in &outcome.reports {
            let sym = if report.failed == 0 {
                s.ok_sym()
            } else {
                s.warn_sym()
            };
            eprintln!(
                "  {} {}: {}/{} succeeded in {}ms",
                sym, report.phase, report.succeeded, report.scheduled, report.duration_ms
            );
        }
        for (url, result) in &outcome.results {
            if let Err(e) = result {
                eprintln!("    {} {url} — {e}", s.fail_sym());
            }
        }
        eprintln!(
            "  {} Snapshot written: {} ({} records)",
            s.ok_sym(),
            path.display(),
            snap.total_count
        );
    }

    Ok(())
}

/// Drive one indicatif bar per phase off the progress stream. Ends when the
/// pool (the only sender) is dropped.
fn spawn_phase_bars(rx: ProgressReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = BroadcastStream::new(rx);
        let mut bar: Option<ProgressBar> = None;
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(e) => e,
                // A lagged consumer only costs bar ticks.
                Err(BroadcastStreamRecvError::Lagged(_)) => continue,
            };
            match event.event {
                ProgressEventKind::PhaseStarted { phase, scheduled } => {
                    if scheduled == 0 {
                        continue;
                    }
                    let b = ProgressBar::new(u64::from(scheduled));
                    if let Ok(style) =
                        ProgressStyle::with_template("  {prefix:<20} [{bar:32}] {pos}/{len}")
                    {
                        b.set_style(style.progress_chars("=> "));
                    }
                    b.set_prefix(phase.to_string());
                    bar = Some(b);
                }
                ProgressEventKind::UrlScraped { .. } | ProgressEventKind::TaskFailed { .. } => {
                    if let Some(b) = &bar {
                        b.inc(1);
                    }
                }
                ProgressEventKind::PhaseCompleted { .. } => {
                    if let Some(b) = bar.take() {
                        b.finish_and_clear();
                    }
                }
                _ => {}
            }
        }
        if let Some(b) = bar.take() {
            b.finish_and_clear();
        }
    })
}
