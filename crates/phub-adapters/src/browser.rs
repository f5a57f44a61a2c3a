//! Optional headless-browser capability.
//!
//! The browser is reached through a Browserless-compatible `/content`
//! endpoint. When none is configured the controller runs in degraded mode:
//! `acquire` yields `None` and adapters take their API-only or seed path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("headless browser capability is not available")]
    Unavailable,
    #[error("browser instance was closed")]
    Closed,
    #[error("launching browser: {0}")]
    Launch(String),
    #[error("render request failed: {0}")]
    Render(#[from] reqwest::Error),
    #[error("render of {url} returned http status {status}")]
    RenderStatus { url: String, status: u16 },
}

#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Fully rendered HTML for `url`.
    async fn render(&self, url: &str) -> Result<String, BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>, BrowserError>;
}

#[derive(Debug, Clone)]
pub struct BrowserlessLauncher {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    /// Shared by every session this launcher creates.
    renders: Arc<Semaphore>,
}

impl BrowserlessLauncher {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            timeout,
            renders: Arc::new(Semaphore::new(1)),
        }
    }
}

#[async_trait]
impl BrowserLauncher for BrowserlessLauncher {
    fn name(&self) -> &'static str {
        "browserless"
    }

    async fn launch(&self) -> Result<Arc<dyn BrowserHandle>, BrowserError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        info!(endpoint = %self.base_url, "browser session launched");
        Ok(Arc::new(BrowserlessSession {
            client,
            endpoint: format!("{}/content", self.base_url),
            token: self.token.clone(),
            renders: self.renders.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct BrowserlessSession {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    renders: Arc<Semaphore>,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserHandle for BrowserlessSession {
    /// One render in flight at a time, whoever asks.
    async fn render(&self, url: &str) -> Result<String, BrowserError> {
        if self.is_closed() {
            return Err(BrowserError::Closed);
        }
        let _permit = self
            .renders
            .acquire()
            .await
            .map_err(|_| BrowserError::Closed)?;

        let mut request = self.client.post(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.query(&[("token", token.as_str())]);
        }
        let resp = request
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BrowserError::RenderStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp.text().await?)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Owns the single shared browser instance for the process.
///
/// The instance is not reference counted: `release` closes it for every
/// holder, and the next `acquire` launches a fresh one.
pub struct BrowserController {
    launcher: Option<Arc<dyn BrowserLauncher>>,
    slot: Mutex<Option<Arc<dyn BrowserHandle>>>,
}

impl BrowserController {
    pub fn new(launcher: Option<Arc<dyn BrowserLauncher>>) -> Self {
        Self {
            launcher,
            slot: Mutex::new(None),
        }
    }

    pub fn degraded() -> Self {
        Self::new(None)
    }

    pub fn is_available(&self) -> bool {
        self.launcher.is_some()
    }

    /// `Ok(None)` in degraded mode; otherwise the shared instance, launched
    /// on first use.
    pub async fn acquire(&self) -> Result<Option<Arc<dyn BrowserHandle>>, BrowserError> {
        let Some(launcher) = &self.launcher else {
            return Ok(None);
        };

        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            if !existing.is_closed() {
                return Ok(Some(existing.clone()));
            }
        }

        let handle = launcher.launch().await?;
        *slot = Some(handle.clone());
        Ok(Some(handle))
    }

    /// Like `acquire`, but degraded mode is `BrowserError::Unavailable`.
    pub async fn require(&self) -> Result<Arc<dyn BrowserHandle>, BrowserError> {
        self.acquire().await?.ok_or(BrowserError::Unavailable)
    }

    /// Best-effort close; a no-op when nothing was launched.
    pub async fn release(&self) {
        let taken = self.slot.lock().await.take();
        if let Some(handle) = taken {
            if let Err(err) = handle.close().await {
                warn!(error = %err, "closing browser failed");
            }
        }
    }

    pub async fn is_launched(&self) -> bool {
        self.slot
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_closed())
    }
}

impl std::fmt::Debug for BrowserController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserController")
            .field("launcher", &self.launcher.as_ref().map(|l| l.name()))
            .finish()
    }
}

/// Builds the controller from an optional endpoint. A missing or non-http
/// endpoint selects degraded mode and is never an error.
pub fn detect_browser_capability(
    endpoint: Option<&str>,
    token: Option<&str>,
    timeout: Duration,
) -> BrowserController {
    let endpoint = endpoint
        .map(str::trim)
        .filter(|e| e.starts_with("http://") || e.starts_with("https://"));

    match endpoint {
        Some(endpoint) => {
            info!(endpoint, "headless browser capability detected");
            BrowserController::new(Some(Arc::new(BrowserlessLauncher::new(
                endpoint, token, timeout,
            ))))
        }
        None => {
            info!("no headless browser configured; running in degraded mode");
            BrowserController::degraded()
        }
    }
}
