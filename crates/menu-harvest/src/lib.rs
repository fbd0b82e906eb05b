//! menu-harvest: multi-site restaurant menu acquisition, normalization and classification.

pub mod classify;
pub mod collection;
pub mod config;
pub mod discovery;
pub mod dom;
pub mod drivers;
pub mod error;
pub mod interstitial;
pub mod normalize;
pub mod pacing;
pub mod progress;
pub mod renderer;
pub mod router;
pub mod session;
pub mod testing;
pub mod types;

pub use classify::{price_stats, Classifier};
pub use collection::{CollectionSummary, RecordCollection};
pub use config::HarvestConfig;
pub use drivers::{GenericDriver, MenuPage, PlatformDriver, SiteDriver, TemplateSiteDriver};
pub use error::{HarvestError, HarvestResult, ItemRejection, ScrapeError};
pub use normalize::parse_price;
pub use progress::{ProgressCallback, ProgressEvent, ProgressEventKind};
pub use router::ScraperRouter;
pub use session::{AcquisitionSession, BatchReport, SkippedTarget};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
