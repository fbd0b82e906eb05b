//! Progress reporting for batches and discovery.
//!
//! The session reports through a plain `(completed, total, message)` callback
//! and, for structured consumers, a `tokio::sync::broadcast` channel of
//! [`ProgressEvent`]s. Both are optional; when nobody listens, events are
//! dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback invoked with `(completed, total, message)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// A progress event emitted during a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub completed: usize,
    pub total: usize,
    pub event: ProgressEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    DiscoveryStarted { city: String, listing_url: String },
    DiscoveryFinished { city: String, found: usize },
    RestaurantScraped { url: String, name: String, items: usize },
    RestaurantSkipped { url: String, reason: String },
    BatchComplete { scraped: usize, skipped: usize, cancelled: bool },
}

impl std::fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DiscoveryStarted { city, .. } => write!(f, "Discovering restaurants in {city}"),
            Self::DiscoveryFinished { city, found } => {
                write!(f, "Found {found} restaurants in {city}")
            }
            Self::RestaurantScraped { name, items, .. } => {
                write!(f, "Scraped {name} ({items} items)")
            }
            Self::RestaurantSkipped { url, reason } => write!(f, "Skipped {url}: {reason}"),
            Self::BatchComplete {
                scraped,
                skipped,
                cancelled,
            } => {
                write!(f, "Done: {scraped} scraped, {skipped} skipped")?;
                if *cancelled {
                    write!(f, " (cancelled)")?;
                }
                Ok(())
            }
        }
    }
}

pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Fan-out to the optional callback and the optional channel.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    tx: Option<ProgressSender>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Subscribe to structured events, creating the channel on first use.
    pub fn subscribe(&mut self) -> ProgressReceiver {
        match &self.tx {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = channel();
                self.tx = Some(tx);
                rx
            }
        }
    }

    pub fn emit(&self, completed: usize, total: usize, event: ProgressEventKind) {
        if let Some(callback) = &self.callback {
            callback(completed, total, &event.to_string());
        }
        if let Some(tx) = &self.tx {
            // No receivers is fine
            let _ = tx.send(ProgressEvent {
                completed,
                total,
                event,
            });
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .field("channel", &self.tx.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent {
            completed: 3,
            total: 10,
            event: ProgressEventKind::RestaurantScraped {
                url: "https://a.test/".into(),
                name: "Babs".into(),
                items: 42,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"RestaurantScraped\""));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.completed, 3);
        assert_eq!(parsed.event, event.event);
    }

    #[test]
    fn test_callback_receives_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new().with_callback(Arc::new(
            move |done: usize, total: usize, msg: &str| {
                sink.lock().unwrap().push(format!("{done}/{total} {msg}"));
            },
        ));

        reporter.emit(
            1,
            2,
            ProgressEventKind::RestaurantSkipped {
                url: "https://a.test/".into(),
                reason: "no menu".into(),
            },
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["1/2 Skipped https://a.test/: no menu"]
        );
    }

    #[tokio::test]
    async fn test_subscribe_and_silent_without_listeners() {
        let reporter = ProgressReporter::new();
        reporter.emit(
            0,
            0,
            ProgressEventKind::BatchComplete {
                scraped: 0,
                skipped: 0,
                cancelled: false,
            },
        );

        let mut reporter = reporter;
        let mut rx = reporter.subscribe();
        reporter.emit(
            0,
            0,
            ProgressEventKind::BatchComplete {
                scraped: 1,
                skipped: 2,
                cancelled: true,
            },
        );
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.to_string(), "Done: 1 scraped, 2 skipped (cancelled)");
    }
}
