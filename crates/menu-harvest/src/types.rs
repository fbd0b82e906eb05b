//! Core data types: menu items, scraped menus and classified restaurant records.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::normalize;

/// Category given to items before any sectioning or classification.
pub const DEFAULT_CATEGORY: &str = "Menu";

/// Type tag given to restaurants that match no keyword table entry.
pub const DEFAULT_TYPE_TAG: &str = "restaurant";

/// One entry on a menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub name: String,
    pub category: String,
    /// `None` when a name was found but no positive price could be parsed.
    pub price: Option<f64>,
    /// The matched price text exactly as extracted (empty when none was found).
    pub price_raw: String,
    pub description: String,
}

impl MenuItem {
    /// Build an item from raw extracted text, normalizing the price.
    ///
    /// Returns `None` when the cleaned name is empty.
    pub fn from_raw(
        name: &str,
        category: &str,
        price_raw: &str,
        description: &str,
    ) -> Option<Self> {
        let name = normalize::clean_text(name);
        if name.is_empty() {
            return None;
        }
        let price_raw = price_raw.trim().to_string();
        Some(Self {
            name,
            category: normalize::clean_text(category),
            price: normalize::parse_price(&price_raw),
            price_raw,
            description: normalize::clean_text(description),
        })
    }

    /// Build an item whose price was already parsed by a line matcher.
    pub(crate) fn with_price(
        name: String,
        category: &str,
        price: Option<f64>,
        price_raw: &str,
    ) -> Self {
        Self {
            name,
            category: category.to_string(),
            price: price.filter(|p| *p > 0.0),
            price_raw: price_raw.to_string(),
            description: String::new(),
        }
    }
}

/// Which driver produced a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Structured, category-sectioned ordering platform.
    Platform,
    /// Semi-structured website builder template with plain-text menus.
    TemplateSite,
    /// Fallback for unknown site shapes.
    Generic,
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Platform => write!(f, "platform"),
            Self::TemplateSite => write!(f, "template-site"),
            Self::Generic => write!(f, "generic"),
        }
    }
}

/// A menu as a driver extracted it, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedMenu {
    pub name: String,
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    /// In page order.
    pub items: Vec<MenuItem>,
    pub driver: DriverKind,
}

impl ScrapedMenu {
    pub fn new(name: impl Into<String>, source_url: impl Into<String>, driver: DriverKind) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            fetched_at: Utc::now(),
            items: Vec::new(),
            driver,
        }
    }
}

/// Coarse ordinal bucket derived from the mean item price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Budget,
    Moderate,
    Premium,
    Luxury,
    /// No item carried a price.
    Unknown,
}

impl PriceTier {
    /// The priced tiers, cheapest first.
    pub const ORDERED: [PriceTier; 4] = [
        PriceTier::Budget,
        PriceTier::Moderate,
        PriceTier::Premium,
        PriceTier::Luxury,
    ];

    /// Position in [`PriceTier::ORDERED`]; `None` for `Unknown`.
    pub fn rank(self) -> Option<usize> {
        Self::ORDERED.iter().position(|t| *t == self)
    }
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Budget => write!(f, "budget"),
            Self::Moderate => write!(f, "moderate"),
            Self::Premium => write!(f, "premium"),
            Self::Luxury => write!(f, "luxury"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Mean/min/max over the priced items of a menu, rounded to cents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub priced_items: usize,
}

/// A classified restaurant, the engine's unit of output.
///
/// Only [`crate::classify::Classifier::enrich`] builds these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRecord {
    pub name: String,
    /// Unique key: two records with the same URL are the same restaurant.
    #[serde(rename = "url")]
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<MenuItem>,
    /// Never empty.
    pub types: IndexSet<String>,
    pub price_tier: PriceTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_stats: Option<PriceStats>,
    pub driver: DriverKind,
}

impl RestaurantRecord {
    /// Records without items are kept but not reported downstream.
    pub fn is_reportable(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn priced_item_count(&self) -> usize {
        self.items.iter().filter(|i| i.price.is_some()).count()
    }
}

/// A URL to scrape, optionally with a caller-supplied restaurant name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ScrapeTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
        }
    }

    pub fn named(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: Some(name.into()),
        }
    }
}

impl From<&str> for ScrapeTarget {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for ScrapeTarget {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

/// Why a discovery crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStop {
    /// The link set stopped growing for the configured number of rounds.
    Stabilized,
    /// The iteration cap was reached first.
    IterationCap,
}

/// Restaurant URLs enumerated from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub listing_url: String,
    /// Deduplicated, in first-seen order.
    pub urls: Vec<String>,
    pub iterations: usize,
    pub stop: DiscoveryStop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_item_from_raw_normalizes() {
        let item = MenuItem::from_raw("  Pad  Thai ", "Mains", " € 12,50 ", "Rice noodles").unwrap();
        assert_eq!(item.name, "Pad Thai");
        assert_eq!(item.price, Some(12.5));
        assert_eq!(item.price_raw, "€ 12,50");
    }

    #[test]
    fn test_menu_item_zero_price_becomes_none() {
        let item = MenuItem::from_raw("Tap water", "", "€ 0,00", "").unwrap();
        assert_eq!(item.price, None);
        assert_eq!(item.price_raw, "€ 0,00");
    }

    #[test]
    fn test_menu_item_requires_name() {
        assert!(MenuItem::from_raw("   ", "Mains", "€ 5,00", "").is_none());
    }

    #[test]
    fn test_price_tier_rank_and_display() {
        assert_eq!(PriceTier::Budget.rank(), Some(0));
        assert_eq!(PriceTier::Luxury.rank(), Some(3));
        assert_eq!(PriceTier::Unknown.rank(), None);
        assert_eq!(PriceTier::Premium.to_string(), "premium");
    }

    #[test]
    fn test_record_serialization_shape() {
        let mut types = IndexSet::new();
        types.insert("pizza".to_string());
        let record = RestaurantRecord {
            name: "Pizzeria Roma".into(),
            source_url: "https://example.test/roma".into(),
            fetched_at: Utc::now(),
            items: vec![MenuItem::from_raw("Margherita", "Pizza", "€ 9,50", "").unwrap()],
            types,
            price_tier: PriceTier::Moderate,
            price_stats: None,
            driver: DriverKind::Generic,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["url"], "https://example.test/roma");
        assert!(json.get("fetchedAt").is_some());
        assert_eq!(json["priceTier"], "moderate");
        assert_eq!(json["types"][0], "pizza");
        assert_eq!(json["items"][0]["priceRaw"], "€ 9,50");
        assert_eq!(json["items"][0]["price"], 9.5);
        assert!(json.get("priceStats").is_none());
    }

    #[test]
    fn test_null_price_serializes_as_null() {
        let item = MenuItem::from_raw("House Blend", "DRINKS", "", "").unwrap();
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["price"].is_null());
    }
}
