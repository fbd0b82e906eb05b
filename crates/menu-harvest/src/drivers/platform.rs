//! Structured ordering platform driver.
//!
//! Platform pages group items into category sections. Within a section the
//! items are either explicit list items (the list-item method) or loose
//! heading/price/description blocks under a common "item" ancestor (the
//! heading-ancestor method). The second method only runs for sections where
//! the first finds no containers at all.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

use super::{load_page, snapshot, PageSettings, SiteDriver};
use crate::config::{HarvestConfig, PlatformConfig};
use crate::discovery::DiscoveryCrawler;
use crate::dom;
use crate::error::{HarvestResult, ItemRejection, ScrapeError};
use crate::normalize;
use crate::renderer::RenderContext;
use crate::types::{DiscoveryResult, DriverKind, MenuItem, ScrapeTarget, ScrapedMenu};

/// Which method produced a section's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    ListItems,
    HeadingAncestors,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListItems => write!(f, "list-items"),
            Self::HeadingAncestors => write!(f, "heading-ancestors"),
        }
    }
}

/// Outcome of extracting one category section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub heading: String,
    pub method: ExtractionMethod,
    pub accepted: usize,
    pub rejected: usize,
}

/// Everything the driver read from one page snapshot.
#[derive(Debug, Clone, Default)]
pub struct PlatformExtraction {
    pub name: Option<String>,
    pub sections: Vec<SectionReport>,
    pub items: Vec<MenuItem>,
}

struct PlatformSelectors {
    names: Vec<Selector>,
    section: Selector,
    heading: Selector,
    item_list: Selector,
    item_name: Vec<Selector>,
    item_price: Vec<Selector>,
    item_description: Selector,
    item_heading: Selector,
    ancestor_price: Vec<Selector>,
    ancestor_description: Selector,
}

impl PlatformSelectors {
    fn compile(config: &PlatformConfig) -> HarvestResult<Self> {
        Ok(Self {
            names: dom::compile_all(&config.name_selectors, "platform.name_selectors")?,
            section: dom::compile(&config.section_selector, "platform.section_selector")?,
            heading: dom::compile(
                &config.section_heading_selector,
                "platform.section_heading_selector",
            )?,
            item_list: dom::compile(&config.item_list_selector, "platform.item_list_selector")?,
            item_name: dom::compile_all(
                &config.item_name_selectors,
                "platform.item_name_selectors",
            )?,
            item_price: dom::compile_all(
                &config.item_price_selectors,
                "platform.item_price_selectors",
            )?,
            item_description: dom::compile(
                &config.item_description_selector,
                "platform.item_description_selector",
            )?,
            item_heading: dom::compile(
                &config.item_heading_selector,
                "platform.item_heading_selector",
            )?,
            ancestor_price: dom::compile_all(
                &config.ancestor_price_selectors,
                "platform.ancestor_price_selectors",
            )?,
            ancestor_description: dom::compile(
                &config.ancestor_description_selector,
                "platform.ancestor_description_selector",
            )?,
        })
    }
}

pub struct PlatformDriver {
    config: PlatformConfig,
    settings: PageSettings,
    selectors: PlatformSelectors,
    discovery: DiscoveryCrawler,
}

impl PlatformDriver {
    pub fn new(config: &HarvestConfig) -> HarvestResult<Self> {
        Ok(Self {
            selectors: PlatformSelectors::compile(&config.platform)?,
            discovery: DiscoveryCrawler::new(
                &config.discovery,
                &config.platform.hosts,
                config.timing.scroll_settle_ms,
            )?,
            config: config.platform.clone(),
            settings: PageSettings::from_config(config),
        })
    }

    /// The platform's listing page for `city`.
    pub fn listing_url(&self, city: &str) -> String {
        self.discovery.config().listing_url(city)
    }

    /// Enumerate restaurant URLs for `city` from the platform's listing page.
    pub async fn discover_listing_urls(
        &self,
        page: &mut dyn RenderContext,
        city: &str,
        max: Option<usize>,
    ) -> Result<DiscoveryResult, ScrapeError> {
        let listing_url = self.listing_url(city);
        tracing::info!("Discovering restaurants in {city} via {listing_url}");
        load_page(page, &listing_url, &self.settings).await?;
        self.discovery.crawl(page, &listing_url, max).await
    }

    /// Extract name, sections and items from a page snapshot.
    pub fn extract(&self, html: &str) -> PlatformExtraction {
        let document = Html::parse_document(html);
        let s = &self.selectors;
        let mut extraction = PlatformExtraction {
            name: dom::document_text(&document, &s.names),
            ..Default::default()
        };

        for section in document.select(&s.section) {
            let heading = section
                .select(&s.heading)
                .next()
                .map(|h| dom::element_text(&h))
                .unwrap_or_default();

            let containers: Vec<ElementRef<'_>> = section.select(&s.item_list).collect();
            let (method, outcomes) = if containers.is_empty() {
                (
                    ExtractionMethod::HeadingAncestors,
                    section
                        .select(&s.item_heading)
                        .map(|h| self.heading_ancestor_item(&h, &section, &heading))
                        .collect::<Vec<_>>(),
                )
            } else {
                (
                    ExtractionMethod::ListItems,
                    containers
                        .iter()
                        .map(|li| self.list_item(li, &heading))
                        .collect::<Vec<_>>(),
                )
            };

            let mut report = SectionReport {
                heading,
                method,
                accepted: 0,
                rejected: 0,
            };
            for outcome in outcomes {
                match outcome {
                    Ok(item) => {
                        report.accepted += 1;
                        extraction.items.push(item);
                    }
                    Err(reason) => {
                        tracing::trace!(section = %report.heading, "Dropped item: {reason}");
                        report.rejected += 1;
                    }
                }
            }
            extraction.sections.push(report);
        }

        extraction
    }

    /// List-item method: name and a currency-looking price are both required.
    fn list_item(&self, li: &ElementRef<'_>, category: &str) -> Result<MenuItem, ItemRejection> {
        let s = &self.selectors;
        let name = dom::first_text(li, &s.item_name).ok_or(ItemRejection::MissingName)?;
        let price_raw = dom::first_text_where(li, &s.item_price, normalize::looks_like_price_text)
            .ok_or(ItemRejection::MissingPrice)?;
        if normalize::parse_price(&price_raw).is_none() {
            return Err(ItemRejection::MissingPrice);
        }
        let description = li
            .select(&s.item_description)
            .next()
            .map(|d| dom::element_text(&d))
            .unwrap_or_default();

        MenuItem::from_raw(&name, category, &price_raw, &description)
            .ok_or(ItemRejection::MissingName)
    }

    /// Heading-ancestor method: the heading names the item, its nearest
    /// "item" ancestor inside the section holds price and description.
    fn heading_ancestor_item(
        &self,
        heading: &ElementRef<'_>,
        section: &ElementRef<'_>,
        category: &str,
    ) -> Result<MenuItem, ItemRejection> {
        let s = &self.selectors;
        let name = dom::element_text(heading);
        if name.is_empty() {
            return Err(ItemRejection::MissingName);
        }
        let block = dom::nearest_marked_ancestor(
            heading,
            section,
            &self.config.item_marker_attributes,
            &self.config.item_marker,
        )
        .ok_or(ItemRejection::Shape)?;

        let price_raw =
            dom::first_text(&block, &s.ancestor_price).ok_or(ItemRejection::MissingPrice)?;
        let description = block
            .select(&s.ancestor_description)
            .next()
            .map(|p| dom::element_text(&p))
            .filter(|d| !normalize::is_item_count_placeholder(d))
            .unwrap_or_default();

        MenuItem::from_raw(&name, category, &price_raw, &description)
            .ok_or(ItemRejection::MissingName)
    }

    fn has_sections(&self, html: &str) -> bool {
        Html::parse_document(html)
            .select(&self.selectors.section)
            .next()
            .is_some()
    }

    /// Poll snapshots until a category section appears or the wait runs out.
    ///
    /// Returns the last snapshot either way.
    async fn wait_for_sections(
        &self,
        page: &dyn RenderContext,
        url: &str,
    ) -> Result<String, ScrapeError> {
        let timing = &self.settings.timing;
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timing.section_wait_ms);
        loop {
            let html = snapshot(page, url).await?;
            if self.has_sections(&html) || tokio::time::Instant::now() >= deadline {
                return Ok(html);
            }
            tokio::time::sleep(Duration::from_millis(timing.poll_interval_ms.max(1))).await;
        }
    }
}

#[async_trait]
impl SiteDriver for PlatformDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Platform
    }

    fn can_handle(&self, url: &str) -> bool {
        super::host_of(url)
            .map(|host| self.config.hosts.iter().any(|h| super::host_matches(&host, h)))
            .unwrap_or(false)
    }

    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        target: &ScrapeTarget,
    ) -> Result<ScrapedMenu, ScrapeError> {
        load_page(page, &target.url, &self.settings).await?;
        let html = self.wait_for_sections(&*page, &target.url).await?;

        let extraction = self.extract(&html);
        if extraction.sections.is_empty() {
            return Err(ScrapeError::NoMenu {
                url: target.url.clone(),
            });
        }
        for report in &extraction.sections {
            tracing::debug!(
                section = %report.heading,
                method = %report.method,
                accepted = report.accepted,
                rejected = report.rejected,
                "Extracted category section"
            );
        }

        let name = target
            .name
            .clone()
            .or(extraction.name)
            .unwrap_or_else(|| self.config.fallback_name.clone());
        let mut menu = ScrapedMenu::new(name, &target.url, DriverKind::Platform);
        menu.items = extraction.items;

        tracing::info!(
            "Scraped {} items in {} sections from {}",
            menu.items.len(),
            extraction.sections.len(),
            menu.name
        );
        Ok(menu)
    }
}
