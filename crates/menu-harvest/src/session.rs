//! Acquisition session: batches of restaurants through the router.
//!
//! A batch is served by `workers` independent workers pulling from one queue.
//! Each worker owns its own [`BrowserHandle`], so no tab is ever shared. The
//! only shared state is the queue, the result collection and the per-host
//! pacer. A failed restaurant is logged and skipped; only a browser that
//! cannot open a tab aborts the batch.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use indexmap::IndexSet;

use crate::classify::Classifier;
use crate::collection::RecordCollection;
use crate::config::{HarvestConfig, SessionConfig};
use crate::drivers::MenuPage;
use crate::error::{HarvestError, HarvestResult, ScrapeError};
use crate::pacing::HostPacer;
use crate::progress::{ProgressCallback, ProgressEventKind, ProgressReceiver, ProgressReporter};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{BrowserHandle, Renderer};
use crate::router::ScraperRouter;
use crate::types::{DiscoveryResult, RestaurantRecord, ScrapeTarget};

/// A target that produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTarget {
    pub url: String,
    pub reason: String,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub records: RecordCollection,
    pub skipped: Vec<SkippedTarget>,
    /// Cancellation stopped the batch before every target was dispatched.
    pub cancelled: bool,
}

/// Work shared by the workers of one batch.
struct Batch {
    queue: Mutex<VecDeque<ScrapeTarget>>,
    total: usize,
    completed: AtomicUsize,
    records: Mutex<RecordCollection>,
    skipped: Mutex<Vec<SkippedTarget>>,
    fatal: Mutex<Option<String>>,
    /// Cancelled by the caller, or by a worker hitting a fatal error.
    stop: CancellationToken,
}

impl Batch {
    async fn next(&self) -> Option<ScrapeTarget> {
        self.queue.lock().await.pop_front()
    }

    fn finish_one(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct AcquisitionSession {
    config: SessionConfig,
    renderer: Arc<dyn Renderer>,
    router: ScraperRouter,
    classifier: Classifier,
    pacer: HostPacer,
    progress: ProgressReporter,
}

impl AcquisitionSession {
    pub fn new(config: &HarvestConfig, renderer: Arc<dyn Renderer>) -> HarvestResult<Self> {
        config.validate()?;
        Ok(Self {
            router: ScraperRouter::from_config(config)?,
            classifier: Classifier::new(config.classifier.clone()),
            pacer: HostPacer::new(Duration::from_millis(config.session.request_delay_ms)),
            config: config.session.clone(),
            renderer,
            progress: ProgressReporter::new(),
        })
    }

    /// Start Chromium and build a session on it.
    pub async fn launch(config: &HarvestConfig) -> HarvestResult<Self> {
        let renderer = ChromiumRenderer::launch(config.session.headless).await?;
        Self::new(config, Arc::new(renderer))
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = self.progress.with_callback(callback);
        self
    }

    pub fn subscribe(&mut self) -> ProgressReceiver {
        self.progress.subscribe()
    }

    pub fn router(&self) -> &ScraperRouter {
        &self.router
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Deduplicate by URL (first occurrence wins) and apply `max_restaurants`.
    fn plan(&self, targets: impl IntoIterator<Item = ScrapeTarget>) -> VecDeque<ScrapeTarget> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<ScrapeTarget> = targets
            .into_iter()
            .filter(|t| seen.insert(t.url.clone()))
            .collect();
        if let Some(max) = self.config.max_restaurants {
            queue.truncate(max);
        }
        queue
    }

    /// Scrape a batch of restaurants.
    ///
    /// Returns every record produced before the batch ended. Cancelling
    /// `cancel` stops dispatching; restaurants already in flight finish.
    pub async fn scrape_batch(
        &self,
        targets: impl IntoIterator<Item = ScrapeTarget>,
        cancel: &CancellationToken,
    ) -> HarvestResult<BatchReport> {
        let queue = self.plan(targets);
        let total = queue.len();
        let workers = self.config.workers.clamp(1, total.max(1));
        tracing::info!("Scraping {total} restaurants with {workers} workers");

        let batch = Batch {
            queue: Mutex::new(queue),
            total,
            completed: AtomicUsize::new(0),
            records: Mutex::new(RecordCollection::new()),
            skipped: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
            stop: cancel.child_token(),
        };

        futures::future::join_all((0..workers).map(|w| self.run_worker(w, &batch))).await;

        if let Some(reason) = batch.fatal.into_inner() {
            tracing::error!("Batch aborted: {reason}");
            return Err(HarvestError::BrowserUnavailable(reason));
        }

        let undispatched = batch.queue.into_inner().len();
        let report = BatchReport {
            records: batch.records.into_inner(),
            skipped: batch.skipped.into_inner(),
            cancelled: cancel.is_cancelled() && undispatched > 0,
        };
        if report.cancelled {
            tracing::warn!("Batch cancelled with {undispatched} restaurants not started");
        }

        self.progress.emit(
            batch.completed.load(Ordering::SeqCst),
            total,
            ProgressEventKind::BatchComplete {
                scraped: report.records.len(),
                skipped: report.skipped.len(),
                cancelled: report.cancelled,
            },
        );
        Ok(report)
    }

    async fn run_worker(&self, worker: usize, batch: &Batch) {
        let mut handle = BrowserHandle::new(self.renderer.clone(), worker);

        loop {
            if batch.stop.is_cancelled() {
                break;
            }
            let Some(target) = batch.next().await else {
                break;
            };

            match self.scrape_target(&mut handle, &target).await {
                Ok(record) => {
                    let event = ProgressEventKind::RestaurantScraped {
                        url: record.source_url.clone(),
                        name: record.name.clone(),
                        items: record.items.len(),
                    };
                    batch.records.lock().await.upsert(record);
                    self.progress.emit(batch.finish_one(), batch.total, event);
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(worker, "Browser failure on {}: {e}", target.url);
                    batch.fatal.lock().await.get_or_insert(e.to_string());
                    batch.stop.cancel();
                    break;
                }
                Err(e) => {
                    tracing::warn!(worker, "Skipping {}: {e}", target.url);
                    let reason = e.to_string();
                    batch.skipped.lock().await.push(SkippedTarget {
                        url: target.url.clone(),
                        reason: reason.clone(),
                    });
                    self.progress.emit(
                        batch.finish_one(),
                        batch.total,
                        ProgressEventKind::RestaurantSkipped {
                            url: target.url,
                            reason,
                        },
                    );
                }
            }
        }

        handle.release().await;
    }

    async fn scrape_target(
        &self,
        handle: &mut BrowserHandle,
        target: &ScrapeTarget,
    ) -> Result<RestaurantRecord, ScrapeError> {
        let driver = self.router.route(&target.url);
        self.pacer.wait(&target.url).await;
        let page = handle.page().await?;
        let menu = driver.scrape(page, target).await?;
        Ok(self.classifier.enrich(menu))
    }

    /// Enumerate restaurant URLs for `city` on the platform.
    ///
    /// `max` falls back to the session's `max_restaurants`.
    pub async fn discover(&self, city: &str, max: Option<usize>) -> HarvestResult<DiscoveryResult> {
        let max = max.or(self.config.max_restaurants);
        let listing_url = self.router.platform().listing_url(city);
        self.progress.emit(
            0,
            0,
            ProgressEventKind::DiscoveryStarted {
                city: city.to_string(),
                listing_url: listing_url.clone(),
            },
        );

        self.pacer.wait(&listing_url).await;
        let mut handle = BrowserHandle::new(self.renderer.clone(), 0);
        let result = match handle.page().await {
            Ok(page) => self.router.platform().discover_listing_urls(page, city, max).await,
            Err(e) => Err(e),
        };
        handle.release().await;
        let result = result?;

        self.progress.emit(
            0,
            result.urls.len(),
            ProgressEventKind::DiscoveryFinished {
                city: city.to_string(),
                found: result.urls.len(),
            },
        );
        Ok(result)
    }

    /// Discover restaurants in `city`, then scrape them.
    pub async fn discover_and_scrape(
        &self,
        city: &str,
        max: Option<usize>,
        cancel: &CancellationToken,
    ) -> HarvestResult<BatchReport> {
        let discovered = self.discover(city, max).await?;
        if cancel.is_cancelled() {
            tracing::warn!("Cancelled after discovery, nothing scraped");
            return Ok(BatchReport {
                cancelled: true,
                ..BatchReport::default()
            });
        }
        self.scrape_batch(discovered.urls.into_iter().map(ScrapeTarget::from), cancel)
            .await
    }

    /// Scrape a template-site menu spread over several pages into one record.
    pub async fn scrape_menu_pages(
        &self,
        name: &str,
        base_url: &str,
        pages: &[MenuPage],
    ) -> HarvestResult<RestaurantRecord> {
        let mut handle = BrowserHandle::new(self.renderer.clone(), 0);
        let result = match handle.page().await {
            Ok(page) => {
                self.router
                    .template()
                    .scrape_pages(page, name, base_url, pages, &self.pacer)
                    .await
            }
            Err(e) => Err(e),
        };
        handle.release().await;
        Ok(self.classifier.enrich(result?))
    }

    /// Shut the browser down.
    pub async fn shutdown(&self) -> HarvestResult<()> {
        self.renderer
            .shutdown()
            .await
            .map_err(|e| HarvestError::BrowserUnavailable(format!("shutdown failed: {e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageTiming;
    use crate::testing::{platform_page, ScriptedBrowser, ScriptedPage};
    use crate::types::DriverKind;

    fn config(workers: usize, max: Option<usize>) -> HarvestConfig {
        let mut config = HarvestConfig {
            timing: PageTiming::instant(),
            ..HarvestConfig::default()
        };
        config.session.request_delay_ms = 0;
        config.session.workers = workers;
        config.session.max_restaurants = max;
        config
    }

    fn restaurant(i: usize) -> (String, ScriptedPage) {
        let name = format!("Restaurant {i}");
        (
            format!("https://www.thuisbezorgd.nl/en/menu/restaurant-{i}"),
            ScriptedPage::html(platform_page(&name, &[("Mains", &[("Nasi goreng", "€ 12,50")])])),
        )
    }

    fn browser(n: usize) -> ScriptedBrowser {
        (0..n).map(restaurant).fold(ScriptedBrowser::new(), |b, (url, page)| b.page(url, page))
    }

    fn targets(n: usize) -> Vec<ScrapeTarget> {
        (0..n).map(|i| ScrapeTarget::new(restaurant(i).0)).collect()
    }

    #[tokio::test]
    async fn test_plan_dedups_and_truncates() {
        let session =
            AcquisitionSession::new(&config(1, Some(2)), Arc::new(ScriptedBrowser::new())).unwrap();
        let planned = session.plan(vec![
            ScrapeTarget::named("https://a.test/", "A"),
            ScrapeTarget::new("https://a.test/"),
            ScrapeTarget::new("https://b.test/"),
            ScrapeTarget::new("https://c.test/"),
        ]);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].name.as_deref(), Some("A"));
        assert_eq!(planned[1].url, "https://b.test/");
    }

    #[tokio::test]
    async fn test_workers_share_the_queue_and_release_tabs() {
        let browser = browser(6).with_navigation_delay(10);
        let session = AcquisitionSession::new(&config(3, None), Arc::new(browser.clone())).unwrap();

        let report = session
            .scrape_batch(targets(6), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.records.len(), 6);
        assert!(report.skipped.is_empty());
        assert!(!report.cancelled);
        assert!(report.records.iter().all(|r| r.driver == DriverKind::Platform));
        assert_eq!(browser.contexts_opened(), 3);
        assert_eq!(browser.active_contexts(), 0);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let browser = ScriptedBrowser::new();
        let session = AcquisitionSession::new(&config(4, None), Arc::new(browser.clone())).unwrap();
        let report = session
            .scrape_batch(Vec::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.records.is_empty());
        assert_eq!(browser.contexts_opened(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let browser = browser(3);
        let session = AcquisitionSession::new(&config(1, None), Arc::new(browser.clone())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = session.scrape_batch(targets(3), &cancel).await.unwrap();
        assert!(report.cancelled);
        assert!(report.records.is_empty());
        assert!(browser.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_menu_pages_classifies() {
        let browser = ScriptedBrowser::new().page(
            "https://cafe.test/drinks",
            ScriptedPage::html("").with_rendered_text("Espresso 2,50\nCappuccino 3,20"),
        );
        let session = AcquisitionSession::new(&config(1, None), Arc::new(browser.clone())).unwrap();

        let record = session
            .scrape_menu_pages(
                "Cafe Test",
                "https://cafe.test/",
                &[MenuPage::new("https://cafe.test/drinks", "Drinks")],
            )
            .await
            .unwrap();
        assert_eq!(record.items.len(), 2);
        assert!(record.items.iter().all(|i| i.category == "Drinks"));
        assert!(!record.types.is_empty());
        assert_eq!(browser.active_contexts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_menu_pages_paces_every_page() {
        let browser = ScriptedBrowser::new()
            .page(
                "https://cafe.test/drinks",
                ScriptedPage::html("").with_rendered_text("Espresso 2,50"),
            )
            .page(
                "https://cafe.test/food",
                ScriptedPage::html("").with_rendered_text("Tosti 5,50"),
            )
            .page(
                "https://cafe.test/specials",
                ScriptedPage::html("").with_rendered_text("Shakshuka 12,50"),
            );
        let mut config = config(1, None);
        config.session.request_delay_ms = 300;
        let session = AcquisitionSession::new(&config, Arc::new(browser.clone())).unwrap();

        let record = session
            .scrape_menu_pages(
                "Cafe Test",
                "https://cafe.test/",
                &[
                    MenuPage::new("https://cafe.test/drinks", "Drinks"),
                    MenuPage::new("https://cafe.test/food", "Food"),
                    MenuPage::new("https://cafe.test/specials", "Specials"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(record.items.len(), 3);

        let times = browser.navigation_times();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(300));
        }
    }
}
