//! Browser session management for rendered-page extraction.
//!
//! Uses chromiumoxide (CDP) with basic disguise: a realistic user agent,
//! automation flags stripped, and a fixed desktop viewport. Target sites
//! serve different markup to different client fingerprints, so the session
//! presents as an ordinary desktop Chrome.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Errors raised while fetching a rendered page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("page load timed out after {0}s")]
    Timeout(u64),
}

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserOptions {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Settle delay after load, for late-rendering content (milliseconds).
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// User agent presented to target sites.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Viewport passed via --window-size.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_settle_ms() -> u64 {
    750
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_viewport_width() -> u32 {
    1366
}

fn default_viewport_height() -> u32 {
    900
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout_secs: default_timeout(),
            settle_ms: default_settle_ms(),
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            chrome_args: Vec::new(),
        }
    }
}

/// A rendered page as captured from the browser.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: String,
    /// URL after redirects.
    pub final_url: String,
    /// Serialized DOM after rendering settled.
    pub html: String,
}

/// One live browser session, scoped to a single job.
///
/// Strategies fetch through the shared reference; the orchestrator owns the
/// boxed session and closes it on every exit path.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Tear the session down. Consumes the session so it cannot be reused.
    async fn close(self: Box<Self>);
}

/// Opens one session per job. Injected into the worker pool so tests can
/// substitute scripted sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError>;
}

/// Session factory backed by a local Chrome/Chromium binary.
pub struct ChromiumSessionFactory {
    options: BrowserOptions,
}

impl ChromiumSessionFactory {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[cfg(feature = "browser")]
impl ChromiumSessionFactory {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    fn find_chrome() -> Result<std::path::PathBuf, FetchError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(FetchError::Launch(
            "Chrome/Chromium not found; install chromium or google-chrome".into(),
        ))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        let chrome_path = Self::find_chrome()?;

        info!("Launching browser (headless={})", self.options.headless);

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.options.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--metrics-recording-only")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg(format!(
                "--window-size={},{}",
                self.options.viewport_width, self.options.viewport_height
            ));

        for arg in &self.options.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| FetchError::Launch(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Box::new(BrowserSession {
            browser,
            handler_task,
            options: self.options.clone(),
        }))
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn PageSession>, FetchError> {
        Err(FetchError::Launch(
            "browser support not compiled; rebuild with --features browser".into(),
        ))
    }
}

/// Live chromiumoxide session.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    options: BrowserOptions,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    async fn fetch_inner(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        // Override the user agent before any navigation happens.
        page.execute(SetUserAgentOverrideParams::new(
            self.options.user_agent.clone(),
        ))
        .await
        .map_err(|e| FetchError::Navigation(e.to_string()))?;

        debug!("Navigating to {}", url);
        page.goto(url)
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        // Wait for readyState instead of a fixed delay; fall back to a
        // timeout for pages whose load event never fires.
        let ready_script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;
        if let Err(e) = page.evaluate(ready_script.to_string()).await {
            debug!("Could not check ready state: {}", e);
        }

        // Settle delay for late-rendering content.
        tokio::time::sleep(Duration::from_millis(self.options.settle_ms)).await;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        // Close the page to prevent tab accumulation.
        let _ = page.close().await;

        Ok(FetchedPage {
            requested_url: url.to_string(),
            final_url,
            html,
        })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for BrowserSession {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let timeout = Duration::from_secs(self.options.timeout_secs);
        match tokio::time::timeout(timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timed out loading {}", url);
                Err(FetchError::Timeout(self.options.timeout_secs))
            }
        }
    }

    async fn close(mut self: Box<Self>) {
        if let Err(e) = self.browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
