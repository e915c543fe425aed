//! Proxy rotation and the bounded retry-across-egress policy.
//!
//! Rotation is stateless round-robin over the loaded list: task `i` gets
//! `proxies[i % len]`. There is no health-checking and no mid-run retry —
//! a dead proxy fails its task and nothing else. The [`RetryPolicy`] type
//! exists for the `probe` diagnostic, which walks egress candidates
//! (direct first, then the rotation) until one works or the attempt budget
//! runs out.

use crate::config::SourceError;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::path::Path;
use tracing::debug;

/// Round-robin proxy assignment. Construction fails on an empty list:
/// every task requires a distinct egress identity to stay under the
/// storefront's rate limits.
#[derive(Debug, Clone)]
pub struct ProxyRotator {
    proxies: Vec<String>,
}

impl ProxyRotator {
    pub fn new(proxies: Vec<String>) -> Result<Self, SourceError> {
        if proxies.is_empty() {
            return Err(SourceError::EmptyProxyList);
        }
        Ok(Self { proxies })
    }

    /// Load and validate `ip:port` lines from a file.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(parse_lines(&text))
    }

    /// The proxy for task `index`, wrapping around the list.
    pub fn assign(&self, index: usize) -> &str {
        &self.proxies[index % self.proxies.len()]
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.proxies
    }
}

/// Keep lines shaped like `ip:port`; skip everything else silently.
pub fn parse_lines(text: &str) -> Vec<String> {
    let shape = Regex::new(r"^\d{1,3}(\.\d{1,3}){3}:\d+$").ok();
    let mut kept = Vec::new();
    let mut skipped = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match &shape {
            Some(re) if re.is_match(line) => kept.push(line.to_string()),
            _ => skipped += 1,
        }
    }
    debug!(kept = kept.len(), skipped, "parsed proxy list");
    kept
}

// ── Retry policy ──

/// One egress identity a task can bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Egress {
    Direct,
    Proxy(String),
}

impl fmt::Display for Egress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Egress::Direct => f.write_str("direct"),
            Egress::Proxy(addr) => f.write_str(addr),
        }
    }
}

/// Terminal state of a bounded retry walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// `attempt` is 1-based.
    Succeeded { attempt: usize, egress: Egress },
    Exhausted { attempts: usize },
}

/// Bounded attempts over egress candidates: direct connection first, then
/// each proxy in rotation order (wrapping if the budget exceeds the list).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
}

impl RetryPolicy {
    pub fn new(attempts: usize) -> Self {
        Self { attempts }
    }

    /// Candidate for a 0-based attempt index.
    pub fn candidate(&self, index: usize, rotator: &ProxyRotator) -> Egress {
        if index == 0 {
            Egress::Direct
        } else {
            Egress::Proxy(rotator.assign(index - 1).to_string())
        }
    }

    /// Drive `op` over the candidates until one succeeds or the budget is
    /// spent. Failures are logged and swallowed; the outcome carries the
    /// terminal state.
    pub async fn run<F, Fut>(&self, rotator: &ProxyRotator, mut op: F) -> RetryOutcome
    where
        F: FnMut(Egress) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        for index in 0..self.attempts {
            let egress = self.candidate(index, rotator);
            match op(egress.clone()).await {
                Ok(()) => {
                    return RetryOutcome::Succeeded {
                        attempt: index + 1,
                        egress,
                    }
                }
                Err(e) => debug!(attempt = index + 1, %egress, "attempt failed: {e:#}"),
            }
        }
        RetryOutcome::Exhausted {
            attempts: self.attempts,
        }
    }
}
