//! Site drivers: one extraction strategy per family of site layouts.
//!
//! A driver is stateless. It is handed a worker's tab for the duration of one
//! scrape and returns either a [`ScrapedMenu`] or a [`ScrapeError`]; it never
//! owns a browser.

pub mod generic;
pub mod platform;
pub mod template;
pub mod text_menu;

use async_trait::async_trait;
use std::time::Duration;

use crate::config::{HarvestConfig, InterstitialConfig, PageTiming};
use crate::error::ScrapeError;
use crate::interstitial::dismiss_interstitials;
use crate::renderer::{scripts, RenderContext};
use crate::types::{DriverKind, ScrapeTarget, ScrapedMenu};

pub use generic::GenericDriver;
pub use platform::PlatformDriver;
pub use template::{MenuPage, TemplateSiteDriver};
pub use text_menu::{MenuLine, TextMenu, TextMenuParser};

/// A strategy for extracting menus from one family of sites.
#[async_trait]
pub trait SiteDriver: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Pure predicate on the URL's shape.
    fn can_handle(&self, url: &str) -> bool;

    /// Load `target` in `page` and extract its menu.
    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        target: &ScrapeTarget,
    ) -> Result<ScrapedMenu, ScrapeError>;
}

/// How drivers load pages: timeouts, settle delays and overlay handling.
#[derive(Debug, Clone, Default)]
pub struct PageSettings {
    pub timing: PageTiming,
    pub interstitial: InterstitialConfig,
    pub navigation_timeout_ms: u64,
    /// Containers whose rendered text the line parser reads.
    pub content_selectors: Vec<String>,
}

impl PageSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            timing: config.timing.clone(),
            interstitial: config.interstitial.clone(),
            navigation_timeout_ms: config.session.navigation_timeout_ms,
            content_selectors: config.text_menu.content_selectors.clone(),
        }
    }
}

/// Navigate, let the page settle and dismiss overlays.
///
/// Returns the labels of dismissed overlay controls.
pub async fn load_page(
    page: &mut dyn RenderContext,
    url: &str,
    settings: &PageSettings,
) -> Result<Vec<String>, ScrapeError> {
    let nav = page
        .navigate(url, settings.navigation_timeout_ms)
        .await
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: format!("{e:#}"),
        })?;
    tracing::debug!("Loaded {} in {}ms", nav.final_url, nav.load_time_ms);

    settle(settings.timing.load_settle_ms).await;

    Ok(dismiss_interstitials(
        &*page,
        &settings.interstitial,
        settings.timing.interstitial_settle_ms,
    )
    .await)
}

/// The current DOM as HTML.
pub async fn snapshot(page: &dyn RenderContext, url: &str) -> Result<String, ScrapeError> {
    page.get_html().await.map_err(|e| ScrapeError::Script {
        url: url.to_string(),
        reason: format!("{e:#}"),
    })
}

/// The page's rendered text, as a reader would see it.
pub async fn rendered_text(
    page: &dyn RenderContext,
    url: &str,
    settings: &PageSettings,
) -> Result<String, ScrapeError> {
    let value = page
        .execute_js(&scripts::rendered_text(&settings.content_selectors))
        .await
        .map_err(|e| ScrapeError::Script {
            url: url.to_string(),
            reason: format!("{e:#}"),
        })?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

pub(crate) async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Site name from a document title: the part before `|`, ` - ` or ` – `.
pub(crate) fn title_prefix(title: &str) -> &str {
    let end = ["|", " - ", " – "]
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .unwrap_or(title.len());
    title[..end].trim()
}

/// Host of `url`, lower-cased, if it parses.
pub(crate) fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

/// Whether `host` is `domain` or one of its subdomains.
pub(crate) fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}
