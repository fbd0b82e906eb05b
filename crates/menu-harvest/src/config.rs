//! Engine configuration.
//!
//! Every heuristic the extractors and the classifier rely on (selector lists,
//! keyword tables, word limits, thresholds, delays) lives here as data so it
//! can be tuned from a TOML file without touching extraction code. The
//! defaults reproduce the values the engine was calibrated with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HarvestError, HarvestResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MENU_HARVEST_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub session: SessionConfig,
    pub timing: PageTiming,
    pub interstitial: InterstitialConfig,
    pub discovery: DiscoveryConfig,
    pub platform: PlatformConfig,
    pub template_site: TemplateSiteConfig,
    pub generic: GenericConfig,
    pub text_menu: TextMenuConfig,
    pub classifier: ClassifierConfig,
}

impl HarvestConfig {
    /// Parse a TOML document; missing sections and fields take defaults.
    pub fn from_toml_str(text: &str) -> HarvestResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> HarvestResult<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Load the first config file found by [`resolve_config_path`], or defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> HarvestResult<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::load(&path),
            None => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> HarvestResult<()> {
        if self.session.workers == 0 {
            return Err(HarvestError::Config("session.workers must be at least 1".into()));
        }
        if self.discovery.stable_rounds == 0 || self.discovery.max_iterations == 0 {
            return Err(HarvestError::Config(
                "discovery.stable_rounds and discovery.max_iterations must be at least 1".into(),
            ));
        }
        if !self.discovery.listing_url_template.contains("{city}") {
            return Err(HarvestError::Config(
                "discovery.listing_url_template must contain {city}".into(),
            ));
        }
        let cutoffs = &self.classifier.tier_cutoffs;
        if cutoffs.windows(2).any(|w| w[0] >= w[1]) || cutoffs.iter().any(|c| *c <= 0.0) {
            return Err(HarvestError::Config(
                "classifier.tier_cutoffs must be positive and strictly ascending".into(),
            ));
        }
        if self.classifier.item_keyword_threshold == 0 {
            return Err(HarvestError::Config(
                "classifier.item_keyword_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config file path.
///
/// Order: explicit path, `MENU_HARVEST_CONFIG`, `./menu-harvest.toml`,
/// `~/.menu-harvest/config.toml`. Only the explicit path is returned without
/// an existence check, so a typo surfaces as an IO error.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd = PathBuf::from("menu-harvest.toml");
    if cwd.exists() {
        return Some(cwd);
    }

    dirs::home_dir()
        .map(|home| home.join(".menu-harvest").join("config.toml"))
        .filter(|p| p.exists())
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Batch-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub headless: bool,
    /// Minimum delay between two requests to the same host.
    pub request_delay_ms: u64,
    /// Upper bound on restaurants scraped per batch.
    pub max_restaurants: Option<usize>,
    /// Independent workers, each with its own browser tab.
    pub workers: usize,
    pub navigation_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            request_delay_ms: 2000,
            max_restaurants: None,
            workers: 1,
            navigation_timeout_ms: 30_000,
        }
    }
}

/// How long to let pages settle at each step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTiming {
    /// After navigation, before looking for overlays.
    pub load_settle_ms: u64,
    /// After clicking an overlay control.
    pub interstitial_settle_ms: u64,
    /// After each scroll of a listing page.
    pub scroll_settle_ms: u64,
    /// How long to wait for the first category section to appear.
    pub section_wait_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for PageTiming {
    fn default() -> Self {
        Self {
            load_settle_ms: 4000,
            interstitial_settle_ms: 1000,
            scroll_settle_ms: 2000,
            section_wait_ms: 10_000,
            poll_interval_ms: 250,
        }
    }
}

impl PageTiming {
    /// No waiting at all; for scripted pages in tests.
    pub fn instant() -> Self {
        Self {
            load_settle_ms: 0,
            interstitial_settle_ms: 0,
            scroll_settle_ms: 0,
            section_wait_ms: 0,
            poll_interval_ms: 1,
        }
    }
}

/// Cookie-banner and modal dismissal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterstitialConfig {
    /// Only the first N visible controls are considered.
    pub max_controls: usize,
    /// Scan-and-click passes; stacked overlays need more than one.
    pub rounds: usize,
    /// Matched as substrings of the lower-cased control text.
    pub affirmative: Vec<String>,
    /// Matched as whole words of the lower-cased control text.
    pub affirmative_words: Vec<String>,
    /// Matched against the whole control text or its `aria-label`.
    pub closing: Vec<String>,
}

impl Default for InterstitialConfig {
    fn default() -> Self {
        Self {
            max_controls: 15,
            rounds: 2,
            affirmative: strings(&[
                "accept",
                "agree",
                "akkoord",
                "toestaan",
                "accepteren",
                "allow all",
                "alle cookies",
                "got it",
            ]),
            affirmative_words: strings(&["ok", "okay"]),
            closing: strings(&["x", "×", "✕", "close", "sluiten", "schließen", "fermer"]),
        }
    }
}

/// Listing-page crawl used to enumerate restaurants on the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// `{city}` is replaced with the lower-cased city name.
    pub listing_url_template: String,
    /// Tried in order every round; all matches are pooled.
    pub link_selectors: Vec<String>,
    /// Only links whose path contains this marker are restaurant pages.
    pub link_path_marker: String,
    /// Consecutive no-growth rounds that end the crawl.
    pub stable_rounds: usize,
    /// Hard cap on scroll iterations.
    pub max_iterations: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            listing_url_template: "https://www.thuisbezorgd.nl/en/order-takeaway-{city}".into(),
            link_selectors: strings(&[
                "a[href*='/menu/']",
                "a[data-qa*='restaurant']",
                "[class*='restaurant'] a",
            ]),
            link_path_marker: "/menu/".into(),
            stable_rounds: 3,
            max_iterations: 100,
        }
    }
}

impl DiscoveryConfig {
    pub fn listing_url(&self, city: &str) -> String {
        let slug = city.trim().to_lowercase().replace(' ', "-");
        self.listing_url_template.replace("{city}", &slug)
    }
}

/// Structured ordering platform: hosts and structural selectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Host suffixes this driver claims.
    pub hosts: Vec<String>,
    pub name_selectors: Vec<String>,
    pub fallback_name: String,
    /// A category section: heading plus a list of items.
    pub section_selector: String,
    pub section_heading_selector: String,
    /// List-item method: item containers inside a section.
    pub item_list_selector: String,
    pub item_name_selectors: Vec<String>,
    pub item_price_selectors: Vec<String>,
    pub item_description_selector: String,
    /// Heading-ancestor method: item headings inside a section.
    pub item_heading_selector: String,
    /// Attributes whose value, containing `item_marker`, tags an item block.
    pub item_marker_attributes: Vec<String>,
    pub item_marker: String,
    pub ancestor_price_selectors: Vec<String>,
    pub ancestor_description_selector: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            hosts: strings(&["thuisbezorgd.nl"]),
            name_selectors: strings(&[
                "h1",
                "[data-testid='restaurant-name']",
                ".restaurant-name",
                "header h1",
            ]),
            fallback_name: "Unknown Restaurant".into(),
            section_selector: "section[data-qa*='category']".into(),
            section_heading_selector: "h2".into(),
            item_list_selector: "li[class*='item-list']".into(),
            item_name_selectors: strings(&["h3", "strong", "[class*='name']"]),
            item_price_selectors: strings(&["[data-qa*='price']", "[class*='price']", "span"]),
            item_description_selector: "p[class*='description'], div[class*='description']".into(),
            item_heading_selector: "h3".into(),
            item_marker_attributes: strings(&["class", "data-qa"]),
            item_marker: "item".into(),
            ancestor_price_selectors: strings(&["[data-qa*='price']", "[class*='price']"]),
            ancestor_description_selector: "p".into(),
        }
    }
}

/// Website-builder template sites with free-text menus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSiteConfig {
    /// Substrings of the URL that identify the template platform.
    pub url_markers: Vec<String>,
    pub fallback_name: String,
}

impl Default for TemplateSiteConfig {
    fn default() -> Self {
        Self {
            url_markers: strings(&["squarespace", "static1.squarespace"]),
            fallback_name: "Cafe/Restaurant".into(),
        }
    }
}

/// Fallback driver for unknown page shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericConfig {
    /// Candidate item containers, most specific first.
    pub item_selectors: Vec<String>,
    pub name_selectors: Vec<String>,
    pub description_selectors: Vec<String>,
    /// A selector must match more than this many elements to be trusted.
    pub min_container_matches: usize,
    /// Run the text-line pass when the structural pass found fewer items.
    pub text_pass_below: usize,
    /// Structural items with shorter names are dropped.
    pub min_item_name_chars: usize,
    /// Titles and headings this long are not taken as the restaurant name.
    pub max_site_name_chars: usize,
    pub fallback_name: String,
}

impl Default for GenericConfig {
    fn default() -> Self {
        Self {
            item_selectors: strings(&[
                ".menu-item",
                "[class*='menu-item']",
                "[class*='product']",
                ".dish",
                "[class*='dish']",
                "li[class*='item']",
                "[class*='food-item']",
            ]),
            name_selectors: strings(&["h3", "h4", ".name", "[class*='name']", "strong", ".title"]),
            description_selectors: strings(&["p", ".description", "[class*='description']"]),
            min_container_matches: 3,
            text_pass_below: 5,
            min_item_name_chars: 3,
            max_site_name_chars: 50,
            fallback_name: "Restaurant".into(),
        }
    }
}

/// Line-oriented parsing of rendered menu text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMenuConfig {
    /// Containers whose rendered text is read, first present wins.
    pub content_selectors: Vec<String>,
    pub header_keywords: Vec<String>,
    /// Lines containing any of these are never menu entries.
    pub skip_keywords: Vec<String>,
    pub upper_header_max_words: usize,
    pub keyword_header_max_words: usize,
    pub priceless_max_words: usize,
    pub min_line_chars: usize,
    pub max_line_chars: usize,
}

impl Default for TextMenuConfig {
    fn default() -> Self {
        Self {
            content_selectors: strings(&[
                "main",
                "[role='main']",
                ".content",
                "#content",
                "article",
                ".page-content",
            ]),
            header_keywords: strings(&[
                "menu",
                "breakfast",
                "lunch",
                "dinner",
                "drinks",
                "coffee",
                "food",
                "starters",
                "appetizers",
                "mains",
                "desserts",
                "sides",
                "specials",
                "pancakes",
                "waffles",
                "sandwiches",
                "burgers",
                "pizza",
            ]),
            skip_keywords: strings(&[
                "order",
                "delivery",
                "pick up",
                "open",
                "closed",
                "hours",
                "address",
                "phone",
            ]),
            upper_header_max_words: 4,
            keyword_header_max_words: 5,
            priceless_max_words: 8,
            min_line_chars: 3,
            max_line_chars: 100,
        }
    }
}

/// One row of a keyword table: a tag and the keywords that signal it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn new(tag: &str, keywords: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            keywords: strings(keywords),
        }
    }
}

/// Keyword tables and thresholds for restaurant and item classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub restaurant_types: Vec<KeywordRule>,
    /// Order matters: the first rule with a matching keyword wins.
    pub item_categories: Vec<KeywordRule>,
    /// Distinct keywords of one type that must appear in the menu text.
    pub item_keyword_threshold: usize,
    /// Ascending mean-price cutoffs between budget/moderate/premium/luxury.
    pub tier_cutoffs: [f64; 3],
    pub default_type: String,
    pub fallback_category: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            restaurant_types: vec![
                KeywordRule::new("burger", &["burger", "burgers", "smash", "beef", "patty"]),
                KeywordRule::new("pizza", &["pizza", "pizzeria", "napoli", "margherita"]),
                KeywordRule::new(
                    "asian",
                    &[
                        "asian", "chinese", "thai", "sushi", "wok", "noodles", "ramen", "dim sum",
                        "pho",
                    ],
                ),
                KeywordRule::new("indian", &["indian", "curry", "tandoori", "biryani", "naan"]),
                KeywordRule::new(
                    "mexican",
                    &["mexican", "burrito", "taco", "quesadilla", "nachos", "tex-mex"],
                ),
                KeywordRule::new("kebab", &["kebab", "doner", "shawarma", "gyros"]),
                KeywordRule::new("fries", &["fries", "friet", "snackbar", "snack"]),
                KeywordRule::new(
                    "italian",
                    &["italian", "pasta", "risotto", "lasagna", "carbonara"],
                ),
                KeywordRule::new(
                    "breakfast",
                    &["breakfast", "pancake", "waffle", "brunch", "eggs"],
                ),
                KeywordRule::new("cafe", &["cafe", "coffee", "cappuccino", "latte", "espresso"]),
                KeywordRule::new("seafood", &["seafood", "fish", "salmon", "shrimp", "lobster"]),
                KeywordRule::new(
                    "vegetarian",
                    &["vegetarian", "vegan", "plant-based", "veggie"],
                ),
                KeywordRule::new("bbq", &["bbq", "barbecue", "grill", "grilled", "ribs"]),
                KeywordRule::new("sandwich", &["sandwich", "sub", "hoagie", "panini"]),
                KeywordRule::new(
                    "dessert",
                    &["dessert", "ice cream", "gelato", "bakery", "pastry"],
                ),
            ],
            item_categories: vec![
                KeywordRule::new(
                    "Starters",
                    &["starter", "appetizer", "voorgerecht", "snack", "finger food"],
                ),
                KeywordRule::new("Mains", &["main", "hoofdgerecht", "entree", "dinner", "lunch"]),
                KeywordRule::new("Sides", &["side", "bijgerecht", "fries", "salad"]),
                KeywordRule::new(
                    "Drinks",
                    &["drink", "beverage", "soda", "juice", "water", "coffee", "tea"],
                ),
                KeywordRule::new(
                    "Desserts",
                    &["dessert", "sweet", "nagerecht", "ice cream", "cake"],
                ),
                KeywordRule::new(
                    "Breakfast",
                    &["breakfast", "ontbijt", "pancake", "waffle", "eggs"],
                ),
                KeywordRule::new("Burgers", &["burger"]),
                KeywordRule::new("Pizza", &["pizza"]),
                KeywordRule::new("Pasta", &["pasta", "spaghetti", "penne", "linguine"]),
                KeywordRule::new("Salads", &["salad", "salade"]),
                KeywordRule::new("Wraps", &["wrap", "burrito", "quesadilla"]),
                KeywordRule::new("Bowls", &["bowl", "poke"]),
                KeywordRule::new("Soups", &["soup", "soep"]),
            ],
            item_keyword_threshold: 3,
            tier_cutoffs: [8.0, 15.0, 25.0],
            default_type: crate::types::DEFAULT_TYPE_TAG.into(),
            fallback_category: "Other".into(),
        }
    }
}
