use anyhow::{anyhow, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, Viewport as ClipRegion};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::pacing::{NavigationPacer, PacingConfig};
use crate::page::Rect;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Owns one browser and the page a session scrapes
pub struct BrowserManager {
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<Page>>>,
    /// Serializes launches so a session never ends up with two Chrome instances
    launch_lock: Mutex<()>,
    pacer: NavigationPacer,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self::with_pacing(PacingConfig::default())
    }

    pub fn with_pacing(pacing: PacingConfig) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            page: Arc::new(Mutex::new(None)),
            launch_lock: Mutex::new(()),
            pacer: NavigationPacer::new(pacing),
        }
    }

    /// Launch browser and navigate to URL
    pub async fn launch(&self, url: &str, headless: bool, viewport: Viewport) -> Result<()> {
        let _launch_guard = self.launch_lock.lock().await;

        self.close().await.ok();

        let mut config = BrowserConfig::builder().window_size(viewport.width, viewport.height);
        if !headless {
            config = config.with_head();
        }
        let config = config
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = timeout(LAUNCH_TIMEOUT, Browser::launch(config))
            .await
            .map_err(|_| anyhow!("Browser launch timeout (30s) - Chrome may not be installed or is unresponsive"))?
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        let default_pages = browser
            .pages()
            .await
            .map_err(|e| anyhow!("Failed to get pages: {}", e))?;

        let page = browser
            .new_page(url)
            .await
            .map_err(|e| anyhow!("Failed to create page: {}", e))?;

        for default_page in default_pages {
            if let Err(e) = default_page.close().await {
                tracing::warn!("Failed to close default page: {}", e);
            }
        }

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow!("Failed to build viewport params: {}", e))?;
        page.execute(metrics)
            .await
            .map_err(|e| anyhow!("Failed to set viewport: {}", e))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| anyhow!("Failed waiting for {}: {}", url, e))?;

        *self.browser.lock().await = Some(browser);
        *self.page.lock().await = Some(page);
        self.pacer.mark().await;

        tracing::info!("Browser launched and navigated to {}", url);
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        let page = self.require_page().await?;
        page.url()
            .await
            .map_err(|e| anyhow!("Failed to get URL: {}", e))?
            .ok_or_else(|| anyhow!("URL is None"))
    }

    /// Load `url` in the session page, paced and retried
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.require_page().await?;
        let page = &page;
        self.pacer.wait().await;
        self.pacer
            .retry("navigate", || async move {
                page.goto(url)
                    .await
                    .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;
                page.wait_for_navigation()
                    .await
                    .map_err(|e| anyhow!("Failed waiting for {}: {}", url, e))?;
                Ok(())
            })
            .await?;
        tracing::info!("Navigated to {}", url);
        Ok(())
    }

    /// Execute JavaScript and return its JSON result
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.require_page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("Failed to evaluate script: {}", e))?;
        result
            .into_value()
            .map_err(|e| anyhow!("Failed to parse script result: {}", e))
    }

    pub async fn close(&self) -> Result<()> {
        let mut page_guard = self.page.lock().await;
        let mut browser_guard = self.browser.lock().await;

        if let Some(page) = page_guard.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = browser_guard.take() {
            let _ = browser.close().await;
        }

        tracing::info!("Browser closed");
        Ok(())
    }

    /// The underlying page, if launched
    pub async fn page(&self) -> Option<Page> {
        self.page.lock().await.clone()
    }

    async fn require_page(&self) -> Result<Page> {
        self.page().await.ok_or_else(|| anyhow!("No page available"))
    }
}

impl Default for BrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Screenshot clipped to `region`, in page coordinates
pub async fn capture_region(page: &Page, region: Rect) -> Result<Vec<u8>> {
    if !region.has_area() {
        return Err(anyhow!("Cannot capture an empty region"));
    }
    let clip = ClipRegion {
        x: region.x,
        y: region.y,
        width: region.width,
        height: region.height,
        scale: 1.0,
    };
    page.screenshot(
        ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(clip)
            .capture_beyond_viewport(true)
            .build(),
    )
    .await
    .map_err(|e| anyhow!("Failed to take screenshot: {}", e))
}
