//! Keyword-driven classification: restaurant types, price tier and item
//! categories.
//!
//! Keyword tables and thresholds come from [`ClassifierConfig`]; nothing here
//! hard-codes a cuisine.

use indexmap::IndexSet;

use crate::config::ClassifierConfig;
use crate::types::{
    MenuItem, PriceStats, PriceTier, RestaurantRecord, ScrapedMenu, DEFAULT_CATEGORY,
};

/// Turns scraped menus into classified records.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Type tags for a restaurant. Never empty.
    ///
    /// Any keyword in the name adds its tag. From the menu text (item names,
    /// descriptions and categories together) a tag is only added when at least
    /// `item_keyword_threshold` distinct keywords of that tag occur.
    pub fn classify_restaurant_types(&self, name: &str, items: &[MenuItem]) -> IndexSet<String> {
        let mut types = IndexSet::new();
        let name = name.to_lowercase();

        for rule in &self.config.restaurant_types {
            if rule.keywords.iter().any(|k| name.contains(&k.to_lowercase())) {
                types.insert(rule.tag.clone());
            }
        }

        let menu_text = items
            .iter()
            .map(|i| format!("{} {} {}", i.name, i.description, i.category))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        for rule in &self.config.restaurant_types {
            let hits = rule
                .keywords
                .iter()
                .filter(|k| menu_text.contains(&k.to_lowercase()))
                .count();
            if hits >= self.config.item_keyword_threshold {
                types.insert(rule.tag.clone());
            }
        }

        if types.is_empty() {
            types.insert(self.config.default_type.clone());
        }
        types
    }

    /// Bucket the mean price against the ascending cutoffs.
    ///
    /// A mean equal to a cutoff falls in the tier above it: `mean < cutoff`
    /// is the test for the lower tier.
    pub fn classify_price_tier(&self, items: &[MenuItem]) -> PriceTier {
        let Some(stats) = price_stats(items) else {
            return PriceTier::Unknown;
        };
        let position = self
            .config
            .tier_cutoffs
            .iter()
            .position(|cutoff| stats.mean < *cutoff)
            .unwrap_or(self.config.tier_cutoffs.len());
        PriceTier::ORDERED[position]
    }

    /// Category for one item.
    ///
    /// A real upstream category (anything but empty or the default bucket) is
    /// kept. Otherwise the first table rule with a keyword in the name wins.
    pub fn categorize_item(&self, name: &str, existing: &str) -> String {
        let existing = existing.trim();
        if !existing.is_empty() && existing != DEFAULT_CATEGORY {
            return existing.to_string();
        }

        let name = name.to_lowercase();
        self.config
            .item_categories
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| name.contains(&k.to_lowercase())))
            .map(|rule| rule.tag.clone())
            .unwrap_or_else(|| self.config.fallback_category.clone())
    }

    /// Classify a scraped menu into its final record.
    pub fn enrich(&self, menu: ScrapedMenu) -> RestaurantRecord {
        let ScrapedMenu {
            name,
            source_url,
            fetched_at,
            items,
            driver,
        } = menu;

        let types = self.classify_restaurant_types(&name, &items);
        let price_tier = self.classify_price_tier(&items);
        let price_stats = price_stats(&items);

        let items: Vec<MenuItem> = items
            .into_iter()
            .map(|item| MenuItem {
                category: self.categorize_item(&item.name, &item.category),
                ..item
            })
            .collect();

        tracing::debug!(
            restaurant = %name,
            types = ?types,
            tier = %price_tier,
            "Classified restaurant"
        );

        RestaurantRecord {
            name,
            source_url,
            fetched_at,
            items,
            types,
            price_tier,
            price_stats,
            driver,
        }
    }
}

/// Mean/min/max over priced items, rounded to cents. `None` without prices.
pub fn price_stats(items: &[MenuItem]) -> Option<PriceStats> {
    let prices: Vec<f64> = items.iter().filter_map(|i| i.price).filter(|p| *p > 0.0).collect();
    if prices.is_empty() {
        return None;
    }
    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(PriceStats {
        mean: round_cents(mean),
        min: round_cents(min),
        max: round_cents(max),
        priced_items: prices.len(),
    })
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DriverKind;
    use proptest::prelude::*;

    fn item(name: &str, price: Option<f64>, description: &str, category: &str) -> MenuItem {
        MenuItem {
            name: name.into(),
            category: category.into(),
            price,
            price_raw: price.map(|p| format!("{p:.2}")).unwrap_or_default(),
            description: description.into(),
        }
    }

    fn priced(prices: &[f64]) -> Vec<MenuItem> {
        prices.iter().map(|p| item("Dish", Some(*p), "", "Mains")).collect()
    }

    #[test]
    fn test_name_keyword_alone_adds_tag() {
        let c = Classifier::default();
        let types = c.classify_restaurant_types("Thai Garden", &[]);
        assert!(types.contains("asian"));
        assert!(!types.contains("restaurant"));
    }

    #[test]
    fn test_single_item_keyword_is_not_enough() {
        let c = Classifier::default();
        let items = vec![
            item("Chicken skewers", Some(9.0), "with a thai peanut sauce", "Mains"),
            item("Club", Some(7.5), "toasted bread", "Mains"),
        ];
        let types = c.classify_restaurant_types("De Hoek", &items);
        assert!(!types.contains("asian"));
        assert_eq!(types.iter().collect::<Vec<_>>(), vec!["restaurant"]);
    }

    #[test]
    fn test_three_distinct_item_keywords_add_tag() {
        let c = Classifier::default();
        let items = vec![
            item("Pad thai", Some(12.0), "rice noodles", "Wok"),
            item("Salmon roll", Some(8.0), "sushi", "Rolls"),
        ];
        let types = c.classify_restaurant_types("De Hoek", &items);
        assert!(types.contains("asian"));
    }

    #[test]
    fn test_repeated_single_keyword_does_not_count_twice() {
        let c = Classifier::default();
        let items = vec![
            item("Thai curry", None, "thai", "thai"),
            item("Thai soup", None, "thai", "thai"),
        ];
        assert!(!c.classify_restaurant_types("Corner", &items).contains("asian"));
    }

    #[test]
    fn test_price_tier_boundaries_go_up() {
        let c = Classifier::default();
        assert_eq!(c.classify_price_tier(&priced(&[7.99])), PriceTier::Budget);
        assert_eq!(c.classify_price_tier(&priced(&[8.0])), PriceTier::Moderate);
        assert_eq!(c.classify_price_tier(&priced(&[14.0, 16.0])), PriceTier::Premium);
        assert_eq!(c.classify_price_tier(&priced(&[25.0])), PriceTier::Luxury);
        assert_eq!(c.classify_price_tier(&[item("Water", None, "", "")]), PriceTier::Unknown);
        assert_eq!(c.classify_price_tier(&[]), PriceTier::Unknown);
    }

    #[test]
    fn test_categorize_keeps_upstream_category() {
        let c = Classifier::default();
        assert_eq!(c.categorize_item("Cheeseburger", "Specials"), "Specials");
    }

    #[test]
    fn test_default_bucket_is_recategorized() {
        let c = Classifier::default();
        assert_eq!(DEFAULT_CATEGORY, "Menu");
        assert_eq!(c.categorize_item("Burger", "Menu"), "Burgers");
        assert_eq!(c.categorize_item("Burger", "Lunch"), "Lunch");
    }

    #[test]
    fn test_categorize_first_rule_wins() {
        let c = Classifier::default();
        // "fries" is a side before anything else matches
        assert_eq!(c.categorize_item("Loaded fries", ""), "Sides");
        assert_eq!(c.categorize_item("Double cheeseburger", DEFAULT_CATEGORY), "Burgers");
        assert_eq!(c.categorize_item("Tomato soup", "  "), "Soups");
        assert_eq!(c.categorize_item("Mystery box", ""), "Other");
    }

    #[test]
    fn test_price_stats_rounding() {
        let stats = price_stats(&priced(&[2.5, 3.0, 4.333])).unwrap();
        assert_eq!(stats.priced_items, 3);
        assert_eq!(stats.min, 2.5);
        assert_eq!(stats.max, 4.33);
        assert_eq!(stats.mean, 3.28);
        assert!(price_stats(&[]).is_none());
    }

    #[test]
    fn test_enrich_builds_complete_record() {
        let c = Classifier::default();
        let mut menu = ScrapedMenu::new("Pizzeria Napoli", "https://p.test/napoli", DriverKind::Generic);
        menu.items = vec![
            item("Pizza Margherita", Some(9.5), "", ""),
            item("Cola", Some(2.5), "", "Drinks"),
        ];
        let record = c.enrich(menu);
        assert!(record.types.contains("pizza"));
        assert_eq!(record.price_tier, PriceTier::Budget);
        assert_eq!(record.items[0].category, "Pizza");
        assert_eq!(record.items[1].category, "Drinks");
        assert_eq!(record.price_stats.unwrap().mean, 6.0);
        assert_eq!(record.source_url, "https://p.test/napoli");
    }

    proptest! {
        #[test]
        fn prop_types_never_empty(
            name in ".{0,30}",
            names in prop::collection::vec("[a-z ]{0,20}", 0..6),
        ) {
            let c = Classifier::default();
            let items: Vec<MenuItem> = names.iter().map(|n| item(n, None, "", "")).collect();
            prop_assert!(!c.classify_restaurant_types(&name, &items).is_empty());
        }

        #[test]
        fn prop_known_tier_iff_some_price(prices in prop::collection::vec(prop::option::of(0.5f64..200.0), 0..8)) {
            let c = Classifier::default();
            let items: Vec<MenuItem> = prices.iter().map(|p| item("Dish", *p, "", "")).collect();
            let tier = c.classify_price_tier(&items);
            prop_assert_eq!(tier == PriceTier::Unknown, prices.iter().all(Option::is_none));
        }
    }
}
