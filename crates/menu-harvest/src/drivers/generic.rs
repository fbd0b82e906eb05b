//! Fallback driver for sites no other driver claims.
//!
//! Two passes: a structural pass over broad item-container selectors, and,
//! when that finds little, the line parser over the rendered text. Results are
//! concatenated without deduplication.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{
    load_page, rendered_text, snapshot, title_prefix, PageSettings, SiteDriver, TextMenuParser,
};
use crate::config::{GenericConfig, HarvestConfig};
use crate::dom;
use crate::error::{HarvestResult, ItemRejection, ScrapeError};
use crate::normalize;
use crate::renderer::RenderContext;
use crate::types::{DriverKind, MenuItem, ScrapeTarget, ScrapedMenu, DEFAULT_CATEGORY};

pub struct GenericDriver {
    config: GenericConfig,
    settings: PageSettings,
    parser: TextMenuParser,
    item_selectors: Vec<(String, Selector)>,
    name_selectors: Vec<Selector>,
    description_selectors: Vec<Selector>,
}

impl GenericDriver {
    pub fn new(config: &HarvestConfig) -> HarvestResult<Self> {
        let generic = &config.generic;
        let item_selectors = generic
            .item_selectors
            .iter()
            .map(|raw| Ok((raw.clone(), dom::compile(raw, "generic.item_selectors")?)))
            .collect::<HarvestResult<Vec<_>>>()?;

        Ok(Self {
            item_selectors,
            name_selectors: dom::compile_all(&generic.name_selectors, "generic.name_selectors")?,
            description_selectors: dom::compile_all(
                &generic.description_selectors,
                "generic.description_selectors",
            )?,
            config: generic.clone(),
            settings: PageSettings::from_config(config),
            parser: TextMenuParser::new(config.text_menu.clone()),
        })
    }

    /// Structural pass.
    ///
    /// The first selector matching more than `min_container_matches`
    /// elements and yielding at least one item wins; later selectors are not
    /// tried.
    pub fn extract_structured(&self, html: &str) -> Vec<MenuItem> {
        let document = Html::parse_document(html);

        for (raw, selector) in &self.item_selectors {
            let elements: Vec<ElementRef<'_>> = document.select(selector).collect();
            if elements.len() <= self.config.min_container_matches {
                continue;
            }

            let mut rejected = 0;
            let items: Vec<MenuItem> = elements
                .iter()
                .filter_map(|el| match self.structured_item(el) {
                    Ok(item) => Some(item),
                    Err(_) => {
                        rejected += 1;
                        None
                    }
                })
                .collect();

            tracing::debug!(
                selector = %raw,
                elements = elements.len(),
                rejected,
                "Structural pass found {} items",
                items.len()
            );
            if !items.is_empty() {
                return items;
            }
        }

        Vec::new()
    }

    fn structured_item(&self, el: &ElementRef<'_>) -> Result<MenuItem, ItemRejection> {
        let name = dom::first_text(el, &self.name_selectors)
            .or_else(|| {
                el.text()
                    .map(str::trim)
                    .find(|t| !t.is_empty())
                    .map(normalize::clean_text)
            })
            .ok_or(ItemRejection::MissingName)?;
        if name.chars().count() < self.config.min_item_name_chars {
            return Err(ItemRejection::Shape);
        }

        let text = dom::element_text(el);
        let (price, price_raw) = match normalize::find_inline_price(&text) {
            Some(m) => (m.value, m.raw.to_string()),
            None => (None, String::new()),
        };

        let description =
            dom::first_text_where(el, &self.description_selectors, |d| d != name)
                .unwrap_or_default();

        Ok(MenuItem {
            name,
            category: DEFAULT_CATEGORY.to_string(),
            price,
            price_raw,
            description,
        })
    }

    /// Title prefix, `h1` (both only when short), then `og:site_name`.
    pub fn resolve_name(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let short = |s: &str| !s.is_empty() && s.chars().count() < self.config.max_site_name_chars;

        if let Some(title) = dom::document_title(&document) {
            let prefix = title_prefix(&title);
            if short(prefix) {
                return Some(prefix.to_string());
            }
        }
        if let Some(h1) = Selector::parse("h1")
            .ok()
            .and_then(|sel| dom::document_text(&document, &[sel]))
        {
            if short(&h1) {
                return Some(h1);
            }
        }
        dom::meta_content(&document, "og:site_name")
    }
}

#[async_trait]
impl SiteDriver for GenericDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Generic
    }

    fn can_handle(&self, _url: &str) -> bool {
        true
    }

    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        target: &ScrapeTarget,
    ) -> Result<ScrapedMenu, ScrapeError> {
        load_page(page, &target.url, &self.settings).await?;
        let html = snapshot(&*page, &target.url).await?;

        let mut items = self.extract_structured(&html);
        let structured = items.len();

        if structured < self.config.text_pass_below {
            match rendered_text(&*page, &target.url, &self.settings).await {
                Ok(text) => items.extend(self.parser.parse(&text).items),
                Err(e) => tracing::warn!("Text pass skipped: {e}"),
            }
        }

        if items.is_empty() {
            return Err(ScrapeError::NoMenu {
                url: target.url.clone(),
            });
        }

        let name = target
            .name
            .clone()
            .or_else(|| self.resolve_name(&html))
            .unwrap_or_else(|| self.config.fallback_name.clone());
        let mut menu = ScrapedMenu::new(name, &target.url, DriverKind::Generic);
        menu.items = items;

        tracing::info!(
            "Scraped {} items ({structured} structural) from {}",
            menu.items.len(),
            menu.name
        );
        Ok(menu)
    }
}
