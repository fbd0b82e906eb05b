//! Browser abstraction.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! browser engine (Chromium via chromiumoxide in production, a scripted
//! in-memory browser in tests), plus [`BrowserHandle`], the lazily-acquired
//! tab each worker owns.

pub mod chromium;
pub mod scripts;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ScrapeError;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page and return its JSON result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Serialized DOM of the current page.
    async fn get_html(&self) -> Result<String>;
    async fn get_url(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// One worker's tab, opened on first use and closed by [`BrowserHandle::release`].
///
/// A handle is never shared: each worker creates its own, so no two tasks
/// ever drive the same page.
pub struct BrowserHandle {
    renderer: Arc<dyn Renderer>,
    context: Option<Box<dyn RenderContext>>,
    worker: usize,
}

impl BrowserHandle {
    pub fn new(renderer: Arc<dyn Renderer>, worker: usize) -> Self {
        Self {
            renderer,
            context: None,
            worker,
        }
    }

    pub fn is_acquired(&self) -> bool {
        self.context.is_some()
    }

    /// The worker's tab, opening it if this is the first use.
    ///
    /// Failing to open a tab is reported as [`ScrapeError::Browser`], which
    /// the session treats as fatal.
    pub async fn page(&mut self) -> Result<&mut dyn RenderContext, ScrapeError> {
        let ctx = match self.context.take() {
            Some(ctx) => ctx,
            None => {
                let ctx = self
                    .renderer
                    .new_context()
                    .await
                    .map_err(|e| ScrapeError::Browser(format!("{e:#}")))?;
                tracing::debug!(worker = self.worker, "Browser tab opened");
                ctx
            }
        };
        Ok(self.context.insert(ctx).as_mut())
    }

    /// Close the tab if one is open. Safe to call more than once.
    pub async fn release(&mut self) {
        if let Some(ctx) = self.context.take() {
            match ctx.close().await {
                Ok(()) => tracing::debug!(worker = self.worker, "Browser tab closed"),
                Err(e) => {
                    tracing::warn!(worker = self.worker, "Failed to close browser tab: {e:#}")
                }
            }
        }
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        if self.context.is_some() {
            tracing::warn!(
                worker = self.worker,
                "Browser handle dropped without release; the tab closes with the browser"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBrowser;

    #[tokio::test]
    async fn test_handle_opens_lazily_and_releases() {
        let browser = ScriptedBrowser::new();
        let renderer: Arc<dyn Renderer> = Arc::new(browser.clone());
        let mut handle = BrowserHandle::new(renderer.clone(), 0);

        assert!(!handle.is_acquired());
        assert_eq!(renderer.active_contexts(), 0);

        handle.page().await.unwrap();
        handle.page().await.unwrap();
        assert!(handle.is_acquired());
        assert_eq!(renderer.active_contexts(), 1);

        handle.release().await;
        handle.release().await;
        assert!(!handle.is_acquired());
        assert_eq!(renderer.active_contexts(), 0);
    }

    #[tokio::test]
    async fn test_handle_reports_launch_failure_as_fatal() {
        let browser = ScriptedBrowser::new().failing_launch();
        let mut handle = BrowserHandle::new(Arc::new(browser), 0);
        let err = handle.page().await.err().unwrap();
        assert!(err.is_fatal());
        assert!(!handle.is_acquired());
    }
}
