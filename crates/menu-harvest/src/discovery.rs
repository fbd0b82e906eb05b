//! Restaurant discovery on a platform listing page.
//!
//! Listing pages are virtualized: more restaurants load as the page is
//! scrolled, and nothing marks the end. The crawl scrolls, re-scans and stops
//! once the link set has not grown for `stable_rounds` consecutive rounds, or
//! at `max_iterations` whatever happens.

use indexmap::IndexSet;
use scraper::{Html, Selector};
use url::Url;

use crate::config::DiscoveryConfig;
use crate::drivers::{host_matches, settle, snapshot};
use crate::dom;
use crate::error::{HarvestResult, ScrapeError};
use crate::renderer::{scripts, RenderContext};
use crate::types::{DiscoveryResult, DiscoveryStop};

pub struct DiscoveryCrawler {
    config: DiscoveryConfig,
    hosts: Vec<String>,
    link_selectors: Vec<Selector>,
    scroll_settle_ms: u64,
}

impl DiscoveryCrawler {
    /// `hosts` are the domains restaurant links must belong to.
    pub fn new(
        config: &DiscoveryConfig,
        hosts: &[String],
        scroll_settle_ms: u64,
    ) -> HarvestResult<Self> {
        Ok(Self {
            link_selectors: dom::compile_all(&config.link_selectors, "discovery.link_selectors")?,
            config: config.clone(),
            hosts: hosts.to_vec(),
            scroll_settle_ms,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Add every restaurant link in `html` to `links`; returns how many were new.
    pub fn collect_links(&self, html: &str, base: &Url, links: &mut IndexSet<String>) -> usize {
        let document = Html::parse_document(html);
        let before = links.len();

        for selector in &self.link_selectors {
            for el in document.select(selector) {
                let Some(href) = el.value().attr("href") else {
                    continue;
                };
                if let Some(url) = self.restaurant_url(base, href) {
                    links.insert(url);
                }
            }
        }

        links.len() - before
    }

    fn restaurant_url(&self, base: &Url, href: &str) -> Option<String> {
        let mut url = base.join(href.trim()).ok()?;
        url.set_fragment(None);
        if !url.path().contains(&self.config.link_path_marker) {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        if !self.hosts.iter().any(|h| host_matches(&host, h)) {
            return None;
        }
        Some(url.to_string())
    }

    /// Scroll-and-rescan the listing currently loaded in `page`.
    ///
    /// Link order is first-seen order; `max` truncates the final list.
    pub async fn crawl(
        &self,
        page: &mut dyn RenderContext,
        listing_url: &str,
        max: Option<usize>,
    ) -> Result<DiscoveryResult, ScrapeError> {
        let base = Url::parse(listing_url).map_err(|e| ScrapeError::Navigation {
            url: listing_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut links = IndexSet::new();
        let mut previous = 0;
        let mut unchanged = 0;
        let mut iterations = 0;

        let stop = loop {
            iterations += 1;

            if let Err(e) = page.execute_js(scripts::SCROLL_TO_BOTTOM).await {
                tracing::warn!("Scroll {iterations} on {listing_url} failed: {e:#}");
            }
            settle(self.scroll_settle_ms).await;

            match snapshot(&*page, listing_url).await {
                Ok(html) => {
                    self.collect_links(&html, &base, &mut links);
                }
                Err(e) => tracing::warn!("Listing snapshot failed: {e}"),
            }

            let count = links.len();
            tracing::debug!(iteration = iterations, restaurants = count, "Discovery scroll");

            if count == previous {
                unchanged += 1;
                if unchanged >= self.config.stable_rounds {
                    break DiscoveryStop::Stabilized;
                }
            } else {
                unchanged = 0;
            }
            previous = count;

            if iterations >= self.config.max_iterations {
                tracing::warn!(
                    "Discovery hit the {} iteration cap on {listing_url}",
                    self.config.max_iterations
                );
                break DiscoveryStop::IterationCap;
            }
        };

        let mut urls: Vec<String> = links.into_iter().collect();
        let found = urls.len();
        if let Some(max) = max {
            urls.truncate(max);
        }

        tracing::info!(
            "Discovered {found} restaurants on {listing_url} after {iterations} scrolls (keeping {})",
            urls.len()
        );

        Ok(DiscoveryResult {
            listing_url: listing_url.to_string(),
            urls,
            iterations,
            stop,
        })
    }
}
