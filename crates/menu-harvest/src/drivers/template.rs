//! Website-builder template sites.
//!
//! These sites carry no structural markers for menu items, so the driver
//! reads the rendered text of the content area and hands it to the
//! [`TextMenuParser`].

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use super::{
    load_page, rendered_text, snapshot, title_prefix, PageSettings, SiteDriver, TextMenuParser,
};
use crate::config::{HarvestConfig, TemplateSiteConfig};
use crate::dom;
use crate::error::ScrapeError;
use crate::pacing::HostPacer;
use crate::renderer::RenderContext;
use crate::types::{DriverKind, MenuItem, ScrapeTarget, ScrapedMenu, DEFAULT_CATEGORY};

/// One page of a menu spread over several pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuPage {
    pub url: String,
    /// Category for items the page's text does not put under a header.
    pub label: String,
}

impl MenuPage {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

pub struct TemplateSiteDriver {
    config: TemplateSiteConfig,
    settings: PageSettings,
    parser: TextMenuParser,
}

impl TemplateSiteDriver {
    pub fn new(config: &HarvestConfig) -> Self {
        Self {
            config: config.template_site.clone(),
            settings: PageSettings::from_config(config),
            parser: TextMenuParser::new(config.text_menu.clone()),
        }
    }

    /// Title prefix, then the first `h1`.
    pub fn resolve_name(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        if let Some(title) = dom::document_title(&document) {
            let prefix = title_prefix(&title);
            if !prefix.is_empty() {
                return Some(prefix.to_string());
            }
        }
        let h1 = Selector::parse("h1").ok()?;
        dom::document_text(&document, &[h1])
    }

    /// Load one page and parse its text into items.
    async fn page_items(
        &self,
        page: &mut dyn RenderContext,
        url: &str,
    ) -> Result<(Vec<MenuItem>, String), ScrapeError> {
        load_page(page, url, &self.settings).await?;
        let html = snapshot(&*page, url).await?;
        let text = rendered_text(&*page, url, &self.settings).await?;
        let parsed = self.parser.parse(&text);
        tracing::debug!(
            headers = parsed.headers.len(),
            rejected = parsed.rejected,
            "Parsed {} menu lines on {url}",
            parsed.items.len()
        );
        Ok((parsed.items, html))
    }

    /// Scrape a menu spread over several pages into one menu.
    ///
    /// Items still in the default bucket take their page's label. A page
    /// that fails to load contributes nothing; only a browser failure stops
    /// the whole scrape. Every page load waits on `pacer`.
    pub async fn scrape_pages(
        &self,
        page: &mut dyn RenderContext,
        name: &str,
        base_url: &str,
        pages: &[MenuPage],
        pacer: &HostPacer,
    ) -> Result<ScrapedMenu, ScrapeError> {
        let mut menu = ScrapedMenu::new(name, base_url, DriverKind::TemplateSite);

        for menu_page in pages {
            pacer.wait(&menu_page.url).await;
            match self.page_items(page, &menu_page.url).await {
                Ok((items, _)) => {
                    tracing::info!("Found {} items on {} page", items.len(), menu_page.label);
                    menu.items.extend(items.into_iter().map(|item| {
                        if item.category == DEFAULT_CATEGORY {
                            MenuItem {
                                category: menu_page.label.clone(),
                                ..item
                            }
                        } else {
                            item
                        }
                    }));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("Skipping {} page: {e}", menu_page.label),
            }
        }

        Ok(menu)
    }
}

#[async_trait]
impl SiteDriver for TemplateSiteDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::TemplateSite
    }

    fn can_handle(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.config
            .url_markers
            .iter()
            .any(|marker| url.contains(&marker.to_lowercase()))
    }

    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        target: &ScrapeTarget,
    ) -> Result<ScrapedMenu, ScrapeError> {
        let (items, html) = self.page_items(page, &target.url).await?;

        let name = target
            .name
            .clone()
            .or_else(|| self.resolve_name(&html))
            .unwrap_or_else(|| self.config.fallback_name.clone());
        let mut menu = ScrapedMenu::new(name, &target.url, DriverKind::TemplateSite);
        menu.items = items;

        let priced = menu.items.iter().filter(|i| i.price.is_some()).count();
        if priced == 0 {
            tracing::warn!("No prices found on {}; items extracted by name only", target.url);
        }
        tracing::info!(
            "Scraped {} items ({priced} priced) from {}",
            menu.items.len(),
            menu.name
        );
        Ok(menu)
    }
}
