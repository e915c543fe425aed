// Copyright 2026 Merchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bounded-concurrency scrape scheduling with per-task isolation.
//!
//! Each task: acquire a semaphore slot, open one proxy-bound browsing
//! context, navigate, wait for the title anchor, settle, extract, close
//! the context on every exit path, release the slot. A failing task is
//! reported as a failure entry for its URL and never cancels siblings.
//!
//! Scheduling runs in two phases: URLs previously stuck on the sold-out
//! sentinel first (their ambiguous state is the most valuable to refine),
//! then the remainder, excluding anything phase one already covered. Phase
//! one fully completes — result collection included — before phase two is
//! scheduled.

use crate::browser::{Browser, PageSession};
use crate::config::PipelineConfig;
use crate::extract::{strategies, FieldExtractor};
use crate::progress::{Phase, ProgressEvent, ProgressEventKind, ProgressSender};
use crate::proxy::ProxyRotator;
use crate::record::ProductRecord;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Why a single task produced no record. Transport-level only — selector
/// and parse failures inside extraction degrade to sentinels instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("browser context creation failed: {0}")]
    Context(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("navigation timed out after {0}ms")]
    Timeout(u64),
    #[error("anchor element never appeared: {0}")]
    AnchorMissing(String),
}

pub type TaskResult = Result<ProductRecord, TaskError>;

/// Per-phase accounting for the run summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub phase: Phase,
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Everything a two-phase run produced, in scheduling order.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<(String, TaskResult)>,
    pub reports: Vec<PhaseReport>,
}

impl RunOutcome {
    /// Successfully extracted records, in scheduling order.
    pub fn records(&self) -> impl Iterator<Item = &ProductRecord> {
        self.results.iter().filter_map(|(_, r)| r.as_ref().ok())
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

struct Emitter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: AtomicU64,
}

impl Emitter {
    fn emit(&self, event: ProgressEventKind) {
        if let Some(tx) = &self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = tx.send(ProgressEvent {
                run_id: self.run_id.clone(),
                seq,
                event,
            });
        }
    }
}

/// Two-phase scrape scheduler over one [`Browser`].
pub struct ScrapeWorkerPool {
    browser: Arc<dyn Browser>,
    config: Arc<PipelineConfig>,
    emitter: Arc<Emitter>,
}

impl ScrapeWorkerPool {
    pub fn new(browser: Arc<dyn Browser>, config: PipelineConfig) -> Self {
        Self {
            browser,
            config: Arc::new(config),
            emitter: Arc::new(Emitter {
                tx: None,
                run_id: crate::progress::run_id(),
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a progress channel; events carry `run_id`.
    pub fn with_progress(mut self, tx: ProgressSender, run_id: impl Into<String>) -> Self {
        self.emitter = Arc::new(Emitter {
            tx: Some(tx),
            run_id: run_id.into(),
            seq: AtomicU64::new(0),
        });
        self
    }

    /// Emit a [`ProgressEventKind::SnapshotWritten`] on this run's stream.
    /// Called by the pipeline after the reconciled snapshot hits disk so
    /// the event keeps the run's monotonic sequence.
    pub fn announce_snapshot(&self, path: &std::path::Path, total_count: usize) {
        self.emitter.emit(ProgressEventKind::SnapshotWritten {
            path: path.display().to_string(),
            total_count: total_count as u32,
        });
    }

    /// Run both phases. `rescrape_first` is scheduled as-is; `urls` minus
    /// that set forms the remainder phase.
    pub async fn run(
        &self,
        urls: &[String],
        rescrape_first: &[String],
        proxies: &ProxyRotator,
    ) -> RunOutcome {
        let phase_one: HashSet<&String> = rescrape_first.iter().collect();
        let remainder: Vec<String> = urls
            .iter()
            .filter(|u| !phase_one.contains(u))
            .cloned()
            .collect();

        self.emitter.emit(ProgressEventKind::RunStarted {
            urls: (rescrape_first.len() + remainder.len()) as u32,
            proxies: proxies.len() as u32,
            concurrency: self.config.concurrency as u32,
        });
        info!(
            rescrape = rescrape_first.len(),
            remainder = remainder.len(),
            concurrency = self.config.concurrency,
            "starting scrape run"
        );

        let (mut results, first) = self
            .run_phase(Phase::SoldOutRescrape, rescrape_first, proxies)
            .await;
        let (second_results, second) = self
            .run_phase(Phase::Remainder, &remainder, proxies)
            .await;
        results.extend(second_results);

        RunOutcome {
            results,
            reports: vec![first, second],
        }
    }

    /// Run one phase to completion and collect its results in scheduling
    /// order.
    pub async fn run_phase(
        &self,
        phase: Phase,
        urls: &[String],
        proxies: &ProxyRotator,
    ) -> (Vec<(String, TaskResult)>, PhaseReport) {
        let started = Instant::now();
        self.emitter.emit(ProgressEventKind::PhaseStarted {
            phase,
            scheduled: urls.len() as u32,
        });

        let results: Arc<DashMap<String, TaskResult>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(urls.len());

        for (i, url) in urls.iter().enumerate() {
            let proxy = proxies.assign(i).to_string();
            let task = ScrapeTask {
                browser: Arc::clone(&self.browser),
                config: Arc::clone(&self.config),
                emitter: Arc::clone(&self.emitter),
                results: Arc::clone(&results),
                semaphore: Arc::clone(&semaphore),
                phase,
            };
            handles.push((url.clone(), tokio::spawn(task.scrape(url.clone(), proxy))));
        }

        for (url, handle) in handles {
            if handle.await.is_err() {
                // A panicked task never reached its result insert.
                warn!(url = %url, "scrape task panicked");
                results.insert(url, Err(TaskError::Context("task panicked".to_string())));
            }
        }

        let ordered: Vec<(String, TaskResult)> = urls
            .iter()
            .filter_map(|url| {
                results
                    .get(url)
                    .map(|entry| (url.clone(), entry.value().clone()))
            })
            .collect();

        let succeeded = ordered.iter().filter(|(_, r)| r.is_ok()).count();
        let report = PhaseReport {
            phase,
            scheduled: urls.len(),
            succeeded,
            failed: ordered.len() - succeeded,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.emitter.emit(ProgressEventKind::PhaseCompleted {
            phase,
            succeeded: report.succeeded as u32,
            failed: report.failed as u32,
            duration_ms: report.duration_ms,
        });
        info!(
            %phase,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "phase complete"
        );
        (ordered, report)
    }
}

struct ScrapeTask {
    browser: Arc<dyn Browser>,
    config: Arc<PipelineConfig>,
    emitter: Arc<Emitter>,
    results: Arc<DashMap<String, TaskResult>>,
    semaphore: Arc<Semaphore>,
    phase: Phase,
}

impl ScrapeTask {
    async fn scrape(self, url: String, proxy: String) {
        let _permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish(url, Err(TaskError::Context("worker pool closed".into())), 0);
                return;
            }
        };
        let started = Instant::now();

        let mut session = match self.browser.new_session(Some(&proxy)).await {
            Ok(session) => session,
            Err(e) => {
                let elapsed = started.elapsed().as_millis() as u64;
                self.finish(url, Err(TaskError::Context(format!("{e:#}"))), elapsed);
                return;
            }
        };

        let result = self.drive(session.as_mut(), &url).await;

        // Context teardown happens on every exit path before the permit is
        // released.
        if let Err(e) = session.close().await {
            debug!(url = %url, "session close failed: {e:#}");
        }

        let elapsed = started.elapsed().as_millis() as u64;
        self.finish(url, result, elapsed);
    }

    async fn drive(&self, session: &mut dyn PageSession, url: &str) -> TaskResult {
        let nav_ms = self.config.nav_timeout_ms;
        let nav_started = Instant::now();
        if let Err(e) = session.navigate(url, nav_ms).await {
            // Deadline exhaustion and hard failures are reported apart.
            return Err(if nav_started.elapsed() >= Duration::from_millis(nav_ms) {
                TaskError::Timeout(nav_ms)
            } else {
                TaskError::Navigation(format!("{e:#}"))
            });
        }

        if let Err(e) = session.wait_for(strategies::ANCHOR, nav_ms).await {
            return Err(TaskError::AnchorMissing(format!("{e:#}")));
        }

        // Client-side rendering settle delay.
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        Ok(FieldExtractor::new(&*session, &self.config).extract(url).await)
    }

    fn finish(&self, url: String, result: TaskResult, elapsed_ms: u64) {
        match &result {
            Ok(record) => {
                debug!(url = %url, units = %record.units_sold, "scraped");
                self.emitter.emit(ProgressEventKind::UrlScraped {
                    url: url.clone(),
                    phase: self.phase,
                    elapsed_ms,
                });
            }
            Err(e) => {
                warn!(url = %url, "task failed: {e}");
                self.emitter.emit(ProgressEventKind::TaskFailed {
                    url: url.clone(),
                    phase: self.phase,
                    reason: e.to_string(),
                });
            }
        }
        self.results.insert(url, result);
    }
}
