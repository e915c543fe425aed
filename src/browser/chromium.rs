//! Chromium-backed browser using chromiumoxide.

use super::{stealth, Browser, NavigationResult, PageSession};
use crate::config::PipelineConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. MERCHWATCH_CHROMIUM env
    if let Ok(p) = std::env::var("MERCHWATCH_CHROMIUM") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.merchwatch/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".merchwatch/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".merchwatch/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".merchwatch/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".merchwatch/chromium/chrome-linux64/chrome"),
                home.join(".merchwatch/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["chromium", "chromium-browser", "google-chrome"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-backed browser. Sessions map to CDP browser contexts, each
/// with its own `--proxy-server`-equivalent routing and stealth patches.
pub struct ChromiumBrowser {
    // create/dispose_browser_context need &mut Browser.
    browser: Arc<Mutex<CdpBrowser>>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumBrowser {
    /// Launch a Chromium instance per the pipeline config.
    pub async fn launch(config: &PipelineConfig) -> Result<Self> {
        let chrome_path = config
            .chromium
            .clone()
            .or_else(find_chromium)
            .context("Chromium not found. Set MERCHWATCH_CHROMIUM or install chromium.")?;
        debug!(path = %chrome_path.display(), "launching chromium");

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let browser_config = builder
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-blink-features=AutomationControlled")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = CdpBrowser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the CDP event-handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Open a page in a freshly created context and stealth-patch it.
    /// Callers own the context: on `Err` they must dispose it themselves.
    async fn attach_page(&self, context_id: &BrowserContextId) -> Result<Page> {
        let target_params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build target params: {e}"))?;
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page(target_params)
                .await
                .context("failed to create page")?
        };

        apply_stealth(&page).await?;
        Ok(page)
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_session(&self, proxy: Option<&str>) -> Result<Box<dyn PageSession>> {
        let context_params = CreateBrowserContextParams {
            proxy_server: proxy.map(|p| p.to_string()),
            ..Default::default()
        };
        let context_id = {
            let mut browser = self.browser.lock().await;
            browser
                .create_browser_context(context_params)
                .await
                .context("failed to create browser context")?
        };

        // The context is live from here on: a failed attach must dispose it,
        // or it outlives the session that never came to be.
        let page = match self.attach_page(&context_id).await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = self.browser.lock().await;
                if let Err(dispose_err) = browser.dispose_browser_context(context_id).await {
                    debug!("context dispose after failed setup: {dispose_err}");
                }
                return Err(e);
            }
        };

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumSession {
            page,
            context_id,
            browser: Arc::clone(&self.browser),
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let _ = browser.close().await;
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Stealth init script plus a jittered viewport, once per context.
async fn apply_stealth(page: &Page) -> Result<()> {
    let script = AddScriptToEvaluateOnNewDocumentParams::builder()
        .source(stealth::INIT_SCRIPT)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build stealth script params: {e}"))?;
    page.execute(script)
        .await
        .context("failed to install stealth script")?;

    let (width, height) = stealth::random_viewport();
    let metrics = SetDeviceMetricsOverrideParams::builder()
        .width(width)
        .height(height)
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build viewport params: {e}"))?;
    page.execute(metrics)
        .await
        .context("failed to set viewport")?;
    Ok(())
}

/// A single proxy-bound Chromium context.
pub struct ChromiumSession {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Mutex<CdpBrowser>>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_response)) => {
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!("element {selector:?} did not appear within {timeout_ms}ms");
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn inner_text(&self, selector: &str, timeout_ms: u64) -> Result<Option<String>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                if let Ok(Some(text)) = element.inner_text().await {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn attribute(
        &self,
        selector: &str,
        attr: &str,
        timeout_ms: u64,
    ) -> Result<Option<String>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                if let Ok(Some(value)) = element.attribute(attr).await {
                    if !value.is_empty() {
                        return Ok(Some(value));
                    }
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn html(&self) -> Result<String> {
        let result = self
            .page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?;

        let html: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        Ok(html)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        let mut browser = self.browser.lock().await;
        let _ = browser.dispose_browser_context(self.context_id).await;
        Ok(())
    }
}
