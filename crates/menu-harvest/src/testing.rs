//! Testing utilities: a scripted, in-memory browser.
//!
//! [`ScriptedBrowser`] implements [`Renderer`] over fixed pages keyed by URL,
//! so the drivers, the discovery crawl and the session can be exercised
//! without launching Chromium. It understands the marked scripts in
//! [`crate::renderer::scripts`] and records every navigation, click and
//! scroll for assertions.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use scraper::Html;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::time::Instant;

use crate::renderer::{scripts, NavigationResult, RenderContext, Renderer};

/// A page the scripted browser can serve.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    html: String,
    rendered_text: Option<String>,
    controls: Vec<String>,
    link_batches: Vec<Vec<String>>,
    hidden_polls: usize,
    fail_navigation: bool,
    fail_scripts: bool,
}

impl ScriptedPage {
    /// A page whose DOM snapshot is `html`.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    /// A listing page: batch 0 is present on load, each scroll reveals the next.
    pub fn listing(batches: Vec<Vec<String>>) -> Self {
        Self {
            link_batches: batches,
            ..Default::default()
        }
    }

    /// A URL whose navigation always fails.
    pub fn unreachable() -> Self {
        Self {
            fail_navigation: true,
            ..Default::default()
        }
    }

    /// Override the text the rendered-text script returns.
    pub fn with_rendered_text(mut self, text: impl Into<String>) -> Self {
        self.rendered_text = Some(text.into());
        self
    }

    /// Visible controls (overlay buttons); a clicked control disappears.
    pub fn with_controls(mut self, labels: &[&str]) -> Self {
        self.controls = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Serve an empty document for the first `polls` snapshots.
    pub fn revealed_after_polls(mut self, polls: usize) -> Self {
        self.hidden_polls = polls;
        self
    }

    /// Every script on this page throws.
    pub fn with_failing_scripts(mut self) -> Self {
        self.fail_scripts = true;
        self
    }

    fn snapshot(&self, scrolls: usize) -> String {
        if self.link_batches.is_empty() {
            return self.html.clone();
        }
        let visible = (scrolls + 1).min(self.link_batches.len());
        let links: String = self.link_batches[..visible]
            .iter()
            .flatten()
            .map(|href| format!(r#"<li class="restaurant-card"><a href="{href}">{href}</a></li>"#))
            .collect();
        format!("<html><body>{}<ul class=\"restaurant-list\">{links}</ul></body></html>", self.html)
    }

    fn text(&self) -> String {
        if let Some(text) = &self.rendered_text {
            return text.clone();
        }
        let document = Html::parse_document(&self.html);
        document
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Something the scripted browser was asked to do.
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    ContextOpened,
    Navigated { url: String, at: Instant },
    Clicked { url: String, label: String },
    Scrolled { url: String },
    ContextClosed,
}

/// An in-memory [`Renderer`] serving [`ScriptedPage`]s.
///
/// Clones share pages and the event log.
#[derive(Clone, Default)]
pub struct ScriptedBrowser {
    pages: Arc<RwLock<HashMap<String, ScriptedPage>>>,
    events: Arc<Mutex<Vec<BrowserEvent>>>,
    active: Arc<AtomicUsize>,
    fail_launch: bool,
    navigation_delay_ms: u64,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `page` at `url`.
    pub fn page(self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.write().unwrap().insert(url.into(), page);
        self
    }

    /// Refuse to open any tab, like a browser that failed to start.
    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    /// Make every navigation take this long.
    pub fn with_navigation_delay(mut self, ms: u64) -> Self {
        self.navigation_delay_ms = ms;
        self
    }

    pub fn events(&self) -> Vec<BrowserEvent> {
        self.events.lock().unwrap().clone()
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.navigation_times().into_iter().map(|(url, _)| url).collect()
    }

    pub fn navigation_times(&self) -> Vec<(String, Instant)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrowserEvent::Navigated { url, at } => Some((url, at)),
                _ => None,
            })
            .collect()
    }

    /// Labels of clicked controls, in order.
    pub fn clicks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BrowserEvent::Clicked { label, .. } => Some(label),
                _ => None,
            })
            .collect()
    }

    pub fn scrolls(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BrowserEvent::Scrolled { .. }))
            .count()
    }

    /// Tabs ever opened.
    pub fn contexts_opened(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, BrowserEvent::ContextOpened))
            .count()
    }

    fn record(&self, event: BrowserEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Renderer for ScriptedBrowser {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        if self.fail_launch {
            bail!("scripted browser refused to start");
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        self.record(BrowserEvent::ContextOpened);
        Ok(Box::new(ScriptedContext {
            browser: self.clone(),
            state: Mutex::new(TabState::default()),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct TabState {
    url: String,
    page: Option<ScriptedPage>,
    scrolls: usize,
}

/// One tab of a [`ScriptedBrowser`].
pub struct ScriptedContext {
    browser: ScriptedBrowser,
    state: Mutex<TabState>,
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        self.browser.record(BrowserEvent::Navigated {
            url: url.to_string(),
            at: Instant::now(),
        });
        if self.browser.navigation_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.browser.navigation_delay_ms))
                .await;
        }

        let page = self.browser.pages.read().unwrap().get(url).cloned();
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.scrolls = 0;
        match page {
            Some(page) if page.fail_navigation => {
                state.page = None;
                bail!("net::ERR_CONNECTION_REFUSED at {url}")
            }
            Some(page) => {
                state.page = Some(page);
                Ok(NavigationResult {
                    final_url: url.to_string(),
                    load_time_ms: self.browser.navigation_delay_ms,
                })
            }
            None => {
                state.page = None;
                bail!("net::ERR_NAME_NOT_RESOLVED at {url}")
            }
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let mut state = self.state.lock().unwrap();
        let url = state.url.clone();
        let scrolls = state.scrolls;
        let page = state.page.as_mut().ok_or_else(|| anyhow!("no page loaded"))?;
        if page.fail_scripts {
            bail!("ReferenceError: document is not defined");
        }

        match scripts::script_name(script) {
            Some("scan-controls") => {
                let limit = scripts::script_arg(script, "limit").unwrap_or(usize::MAX);
                let controls: Vec<_> = page
                    .controls
                    .iter()
                    .take(limit)
                    .map(|label| serde_json::json!({ "text": label, "aria": "" }))
                    .collect();
                Ok(serde_json::Value::Array(controls))
            }
            Some("click-control") => {
                let index = scripts::script_arg(script, "index")
                    .ok_or_else(|| anyhow!("click script without index"))?;
                if index >= page.controls.len() {
                    return Ok(serde_json::Value::Bool(false));
                }
                let label = page.controls.remove(index);
                drop(state);
                self.browser.record(BrowserEvent::Clicked { url, label });
                Ok(serde_json::Value::Bool(true))
            }
            Some("scroll") => {
                state.scrolls = scrolls + 1;
                drop(state);
                self.browser.record(BrowserEvent::Scrolled { url });
                Ok(serde_json::json!((scrolls + 1) * 1000))
            }
            Some("rendered-text") => Ok(serde_json::Value::String(page.text())),
            _ => bail!("scripted browser cannot run this script"),
        }
    }

    async fn get_html(&self) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let scrolls = state.scrolls;
        let page = state.page.as_mut().ok_or_else(|| anyhow!("no page loaded"))?;
        if page.hidden_polls > 0 {
            page.hidden_polls -= 1;
            return Ok("<html><head></head><body></body></html>".into());
        }
        Ok(page.snapshot(scrolls))
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.browser.active.fetch_sub(1, Ordering::SeqCst);
        self.browser.record(BrowserEvent::ContextClosed);
        Ok(())
    }
}

/// A platform-style restaurant page: `sections` of `(heading, [(name, price)])`
/// rendered as list items.
pub fn platform_page(name: &str, sections: &[(&str, &[(&str, &str)])]) -> String {
    let body: String = sections
        .iter()
        .map(|(heading, items)| {
            let lis: String = items
                .iter()
                .map(|(item, price)| {
                    format!(
                        r#"<li class="item-list__item"><h3>{item}</h3><span data-qa="item-price">{price}</span><p class="item-description">{item} description</p></li>"#
                    )
                })
                .collect();
            format!(r#"<section data-qa="item-category"><h2>{heading}</h2><ul>{lis}</ul></section>"#)
        })
        .collect();
    format!(
        r#"<html><head><title>{name} | Order online</title></head><body><header><h1>{name}</h1></header><main>{body}</main></body></html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_reveals_links_per_scroll() {
        let browser = ScriptedBrowser::new().page(
            "https://list.test/",
            ScriptedPage::listing(vec![vec!["/menu/a".into()], vec!["/menu/b".into()]]),
        );
        let mut ctx = browser.new_context().await.unwrap();
        ctx.navigate("https://list.test/", 1000).await.unwrap();

        let before = ctx.get_html().await.unwrap();
        assert!(before.contains("/menu/a") && !before.contains("/menu/b"));

        ctx.execute_js(scripts::SCROLL_TO_BOTTOM).await.unwrap();
        let after = ctx.get_html().await.unwrap();
        assert!(after.contains("/menu/b"));
        assert_eq!(browser.scrolls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_url_fails_navigation() {
        let browser = ScriptedBrowser::new();
        let mut ctx = browser.new_context().await.unwrap();
        assert!(ctx.navigate("https://nowhere.test/", 1000).await.is_err());
        ctx.close().await.unwrap();
        assert_eq!(browser.active_contexts(), 0);
    }

    #[tokio::test]
    async fn test_default_rendered_text_is_line_per_text_node() {
        let browser = ScriptedBrowser::new().page(
            "https://cafe.test/",
            ScriptedPage::html("<main><h2>DRINKS</h2><p>Espresso 2,50</p></main>"),
        );
        let mut ctx = browser.new_context().await.unwrap();
        ctx.navigate("https://cafe.test/", 1000).await.unwrap();
        let text = ctx.execute_js(&scripts::rendered_text(&[])).await.unwrap();
        assert_eq!(text, "DRINKS\nEspresso 2,50");
    }
}
