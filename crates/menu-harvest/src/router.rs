//! First-match driver dispatch.

use std::sync::Arc;

use crate::config::HarvestConfig;
use crate::drivers::{GenericDriver, PlatformDriver, SiteDriver, TemplateSiteDriver};
use crate::error::HarvestResult;

/// Picks the driver for a URL.
///
/// Specific drivers are tried in registration order; the generic driver
/// handles everything they decline.
pub struct ScraperRouter {
    drivers: Vec<Arc<dyn SiteDriver>>,
    fallback: Arc<dyn SiteDriver>,
    platform: Arc<PlatformDriver>,
    template: Arc<TemplateSiteDriver>,
}

impl ScraperRouter {
    /// The built-in drivers: platform, then template site, then generic.
    pub fn from_config(config: &HarvestConfig) -> HarvestResult<Self> {
        let platform = Arc::new(PlatformDriver::new(config)?);
        let template = Arc::new(TemplateSiteDriver::new(config));
        let generic = Arc::new(GenericDriver::new(config)?);

        Ok(Self {
            drivers: vec![
                platform.clone() as Arc<dyn SiteDriver>,
                template.clone() as Arc<dyn SiteDriver>,
            ],
            fallback: generic,
            platform,
            template,
        })
    }

    /// Register an extra driver ahead of the built-in ones.
    pub fn with_driver(mut self, driver: Arc<dyn SiteDriver>) -> Self {
        self.drivers.insert(0, driver);
        self
    }

    pub fn route(&self, url: &str) -> Arc<dyn SiteDriver> {
        let driver = self
            .drivers
            .iter()
            .find(|d| d.can_handle(url))
            .unwrap_or(&self.fallback)
            .clone();
        tracing::debug!(driver = %driver.kind(), "Routed {url}");
        driver
    }

    /// The platform driver, for discovery.
    pub fn platform(&self) -> &PlatformDriver {
        &self.platform
    }

    /// The template-site driver, for multi-page menus.
    pub fn template(&self) -> &TemplateSiteDriver {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::renderer::RenderContext;
    use crate::types::{DriverKind, ScrapeTarget, ScrapedMenu};
    use async_trait::async_trait;

    fn router() -> ScraperRouter {
        ScraperRouter::from_config(&HarvestConfig::default()).unwrap()
    }

    #[test]
    fn test_route_by_url_shape() {
        let r = router();
        assert_eq!(
            r.route("https://www.thuisbezorgd.nl/en/menu/babs").kind(),
            DriverKind::Platform
        );
        assert_eq!(
            r.route("https://cafe-zuid.squarespace.com/menu").kind(),
            DriverKind::TemplateSite
        );
    }

    #[test]
    fn test_unmatched_urls_fall_back_to_generic() {
        let r = router();
        for url in ["https://www.bistro-noord.nl/", "not a url", ""] {
            assert_eq!(r.route(url).kind(), DriverKind::Generic, "{url}");
        }
    }

    struct Everything;

    #[async_trait]
    impl SiteDriver for Everything {
        fn kind(&self) -> DriverKind {
            DriverKind::TemplateSite
        }

        fn can_handle(&self, _url: &str) -> bool {
            true
        }

        async fn scrape(
            &self,
            _page: &mut dyn RenderContext,
            target: &ScrapeTarget,
        ) -> Result<ScrapedMenu, ScrapeError> {
            Err(ScrapeError::NoMenu {
                url: target.url.clone(),
            })
        }
    }

    #[test]
    fn test_registered_driver_takes_priority() {
        let r = router().with_driver(Arc::new(Everything));
        assert_eq!(
            r.route("https://www.thuisbezorgd.nl/en/menu/babs").kind(),
            DriverKind::TemplateSite
        );
    }
}
