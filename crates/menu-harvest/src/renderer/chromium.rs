//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{HarvestError, HarvestResult};

/// Environment variable pointing at a Chrome/Chromium binary.
pub const CHROMIUM_ENV: &str = "MENU_HARVEST_CHROMIUM";

/// Find the Chromium binary path.
///
/// `None` means chromiumoxide's own detection gets the last word.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CHROMIUM_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{CHROMIUM_ENV} points at {p}, which does not exist");
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch a Chromium instance.
    ///
    /// Any failure here is [`HarvestError::BrowserUnavailable`]: without a
    /// browser no driver can work.
    pub async fn launch(headless: bool) -> HarvestResult<Self> {
        Self::try_launch(headless)
            .await
            .map_err(|e| HarvestError::BrowserUnavailable(format!("{e:#}")))
    }

    async fn try_launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--lang=en-US")
            .window_size(1366, 900);

        if let Some(path) = find_chromium() {
            tracing::debug!("Using browser at {}", path.display());
            builder = builder.chrome_executable(path);
        }
        if !headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(headless, "Chromium launched");

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser process exits when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium tab.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;

                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::scripts;

    #[tokio::test]
    #[ignore] // Requires Chrome or Chromium to be installed
    async fn test_chromium_renders_text_and_controls() {
        let renderer = ChromiumRenderer::launch(true)
            .await
            .expect("failed to launch browser");
        let mut ctx = renderer.new_context().await.expect("no context");

        ctx.navigate(
            "data:text/html,<main><h2>DRINKS</h2><p>Espresso 2,50</p></main><button>Accept all</button>",
            10_000,
        )
        .await
        .expect("navigation failed");

        let text = ctx
            .execute_js(&scripts::rendered_text(&["main".to_string()]))
            .await
            .expect("text script failed");
        assert!(text.as_str().unwrap().contains("Espresso 2,50"));

        let controls = ctx
            .execute_js(&scripts::scan_controls(15))
            .await
            .expect("scan script failed");
        assert_eq!(controls[0]["text"], "Accept all");

        let html = ctx.get_html().await.expect("get_html failed");
        assert!(html.contains("<h2>DRINKS</h2>"));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
    }
}
