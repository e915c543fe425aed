//! In-memory browser stub for pipeline tests.
//!
//! Fixtures are keyed by URL; a session "navigates" by cloning the fixture
//! page. The stub counts opened/closed/live sessions so tests can assert
//! the pool's serialization and close-on-every-exit-path guarantees.

use super::{Browser, NavigationResult, PageSession};
use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One fixture page: selector→text, (selector, attr)→value, raw HTML.
#[derive(Debug, Clone, Default)]
pub struct StubPage {
    pub texts: HashMap<String, String>,
    pub attrs: HashMap<(String, String), String>,
    pub html: String,
    /// Simulate a navigation failure (dead proxy, timeout).
    pub fail_navigation: bool,
}

impl StubPage {
    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_attr(mut self, selector: &str, attr: &str, value: &str) -> Self {
        self.attrs
            .insert((selector.to_string(), attr.to_string()), value.to_string());
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn failing() -> Self {
        Self {
            fail_navigation: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct StubState {
    pages: DashMap<String, StubPage>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Fixture-backed [`Browser`].
#[derive(Debug, Default, Clone)]
pub struct StubBrowser {
    state: Arc<StubState>,
}

impl StubBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, page: StubPage) {
        self.state.pages.insert(url.to_string(), page);
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live sessions observed.
    pub fn peak_active(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for StubBrowser {
    async fn new_session(&self, _proxy: Option<&str>) -> Result<Box<dyn PageSession>> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        let now = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            state: Arc::clone(&self.state),
            current: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }
}

struct StubSession {
    state: Arc<StubState>,
    current: Option<StubPage>,
}

#[async_trait]
impl PageSession for StubSession {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        let page = match self.state.pages.get(url) {
            Some(page) => page.clone(),
            None => bail!("navigation failed: no fixture for {url}"),
        };
        if page.fail_navigation {
            bail!("navigation timed out after 0ms");
        }
        self.current = Some(page);
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 0,
        })
    }

    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let found = self
            .current
            .as_ref()
            .is_some_and(|page| page.texts.contains_key(selector));
        if !found {
            bail!("element {selector:?} did not appear within {timeout_ms}ms");
        }
        Ok(())
    }

    async fn inner_text(&self, selector: &str, _timeout_ms: u64) -> Result<Option<String>> {
        Ok(self
            .current
            .as_ref()
            .and_then(|page| page.texts.get(selector))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    async fn attribute(
        &self,
        selector: &str,
        attr: &str,
        _timeout_ms: u64,
    ) -> Result<Option<String>> {
        Ok(self
            .current
            .as_ref()
            .and_then(|page| page.attrs.get(&(selector.to_string(), attr.to_string())))
            .cloned())
    }

    // Scripted scans always miss on the stub; tests exercise the static
    // HTML fallback instead.
    async fn evaluate(&self, _script: &str) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn html(&self) -> Result<String> {
        Ok(self
            .current
            .as_ref()
            .map(|page| page.html.clone())
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
