//! Browser abstraction for proxy-bound page scraping.
//!
//! Defines the `Browser` and `PageSession` traits that abstract over the
//! engine (Chromium via chromiumoxide in production, an in-memory stub in
//! tests). One session = one isolated browsing context bound to one egress
//! identity; the pool closes it on every exit path.

pub mod chromium;
pub mod stealth;
pub mod stub;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create isolated, proxy-bound sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Create a new browsing context, optionally routed through `proxy`
    /// (`ip:port`).
    async fn new_session(&self, proxy: Option<&str>) -> Result<Box<dyn PageSession>>;
    /// Shut down the engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently live sessions. Tests and `doctor` read this to
    /// catch context leaks.
    fn active_sessions(&self) -> usize;
}

/// A single browsing context. Read methods return `Ok(None)` when the
/// element never showed up (or stayed empty) within the budget — that is a
/// normal miss that advances a fallback chain, not an error.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Wait until `selector` matches something, or fail.
    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()>;
    /// Inner text of the first match, trimmed; empty text is a miss.
    async fn inner_text(&self, selector: &str, timeout_ms: u64) -> Result<Option<String>>;
    /// Attribute of the first match.
    async fn attribute(&self, selector: &str, attr: &str, timeout_ms: u64)
        -> Result<Option<String>>;
    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Full serialized DOM.
    async fn html(&self) -> Result<String>;
    /// Close this context. Consumes the session so nothing can touch a
    /// disposed page.
    async fn close(self: Box<Self>) -> Result<()>;
}
