//! Error types for the acquisition engine.
//!
//! Failures are layered the same way extraction is: a bad field becomes
//! `None`, a bad item becomes an [`ItemRejection`], a bad restaurant becomes a
//! [`ScrapeError`], and only [`HarvestError`] can stop a whole session.

/// Session-level errors.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// No browser could be started or no page could be opened in it.
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Invalid selector `{selector}` in {context}")]
    InvalidSelector { selector: String, context: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A single-page operation (discovery, a multi-page menu) failed.
    #[error(transparent)]
    Scrape(ScrapeError),
}

impl From<ScrapeError> for HarvestError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Browser(reason) => HarvestError::BrowserUnavailable(reason),
            other => HarvestError::Scrape(other),
        }
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// A single restaurant could not be scraped.
///
/// Everything except [`ScrapeError::Browser`] is recoverable: the session logs
/// it and moves on to the next restaurant.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScrapeError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("page script failed on {url}: {reason}")]
    Script { url: String, reason: String },

    #[error("no menu found at {url}")]
    NoMenu { url: String },

    #[error("browser unavailable: {0}")]
    Browser(String),
}

impl ScrapeError {
    /// Whether this failure makes every further scrape impossible.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScrapeError::Browser(_))
    }
}

/// Why a candidate item was dropped during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRejection {
    MissingName,
    MissingPrice,
    /// The line or block matched the non-menu vocabulary (hours, address...).
    Noise,
    /// Too short, too long or sentence-shaped to be a menu entry.
    Shape,
}

impl std::fmt::Display for ItemRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "missing name"),
            Self::MissingPrice => write!(f, "missing price"),
            Self::Noise => write!(f, "non-menu text"),
            Self::Shape => write!(f, "not shaped like a menu entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_browser_failures_are_fatal() {
        assert!(ScrapeError::Browser("gone".into()).is_fatal());
        assert!(!ScrapeError::NoMenu {
            url: "https://a.test".into()
        }
        .is_fatal());
        assert!(!ScrapeError::Navigation {
            url: "https://a.test".into(),
            reason: "timeout".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_browser_failure_escalates_to_unavailable() {
        let err: HarvestError = ScrapeError::Browser("crashed".into()).into();
        assert!(matches!(err, HarvestError::BrowserUnavailable(r) if r == "crashed"));

        let err: HarvestError = ScrapeError::NoMenu {
            url: "https://a.test".into(),
        }
        .into();
        assert_eq!(err.to_string(), "no menu found at https://a.test");
    }

    #[test]
    fn test_rejection_display() {
        assert_eq!(ItemRejection::MissingPrice.to_string(), "missing price");
        assert_eq!(ItemRejection::Noise.to_string(), "non-menu text");
    }
}
