//! Line-oriented parsing of rendered menu text.
//!
//! Used by the template-site driver as its only strategy and by the generic
//! driver as a supplement. A running category is updated by header lines;
//! every other line either becomes an item or is rejected with a reason.

use crate::config::TextMenuConfig;
use crate::error::ItemRejection;
use crate::normalize;
use crate::types::{MenuItem, DEFAULT_CATEGORY};

/// What a single line turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuLine {
    Header(String),
    Item(MenuItem),
    Rejected(ItemRejection),
}

/// Items parsed from a block of text, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextMenu {
    pub items: Vec<MenuItem>,
    pub headers: Vec<String>,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TextMenuParser {
    config: TextMenuConfig,
}

impl TextMenuParser {
    pub fn new(config: TextMenuConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TextMenuConfig {
        &self.config
    }

    /// Short and fully upper-case, or short and containing header vocabulary.
    pub fn is_category_header(&self, line: &str) -> bool {
        let words = normalize::word_count(line);
        if normalize::is_upper_case_line(line) && words <= self.config.upper_header_max_words {
            return true;
        }
        let lower = line.to_lowercase();
        words <= self.config.keyword_header_max_words
            && self
                .config
                .header_keywords
                .iter()
                .any(|k| lower.contains(k.as_str()))
    }

    fn is_noise(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        self.config
            .skip_keywords
            .iter()
            .any(|k| lower.contains(k.as_str()))
    }

    /// Classify one trimmed, non-blank line under the running `category`.
    ///
    /// A line that ends in a price is always an item candidate, never a header,
    /// even when it is short and upper-case ("ESPRESSO 2,50" is an item). The
    /// price test deliberately runs before the header rules.
    pub fn classify_line(&self, line: &str, category: &str) -> MenuLine {
        let chars = line.chars().count();
        if chars < self.config.min_line_chars || chars > self.config.max_line_chars {
            return MenuLine::Rejected(ItemRejection::Shape);
        }
        if self.is_noise(line) {
            return MenuLine::Rejected(ItemRejection::Noise);
        }

        let trailing = normalize::find_trailing_price(line);
        if trailing.is_none() && self.is_category_header(line) {
            return MenuLine::Header(normalize::clean_text(line));
        }

        match trailing {
            Some(price) => {
                let name = line[..price.start]
                    .trim()
                    .trim_end_matches(['-', '–', ':'])
                    .trim();
                if name.is_empty() {
                    return MenuLine::Rejected(ItemRejection::MissingName);
                }
                MenuLine::Item(MenuItem::with_price(
                    normalize::clean_text(name),
                    category,
                    price.value,
                    price.raw,
                ))
            }
            None => {
                if normalize::word_count(line) <= self.config.priceless_max_words
                    && !line.ends_with('.')
                {
                    MenuLine::Item(MenuItem::with_price(
                        normalize::clean_text(line),
                        category,
                        None,
                        "",
                    ))
                } else {
                    MenuLine::Rejected(ItemRejection::Shape)
                }
            }
        }
    }

    /// Parse a whole block of rendered text.
    pub fn parse(&self, text: &str) -> TextMenu {
        let mut menu = TextMenu::default();
        let mut category = DEFAULT_CATEGORY.to_string();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match self.classify_line(line, &category) {
                MenuLine::Header(header) => {
                    category = header.clone();
                    menu.headers.push(header);
                }
                MenuLine::Item(item) => menu.items.push(item),
                MenuLine::Rejected(reason) => {
                    tracing::trace!("Skipped line {line:?}: {reason}");
                    menu.rejected += 1;
                }
            }
        }

        menu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TextMenuParser {
        TextMenuParser::default()
    }

    #[test]
    fn test_header_then_priced_and_priceless_items() {
        let menu = parser().parse("DRINKS\nEspresso 2,50\nHouse Blend");
        assert_eq!(menu.headers, vec!["DRINKS"]);
        assert_eq!(menu.items.len(), 2);

        assert_eq!(menu.items[0].name, "Espresso");
        assert_eq!(menu.items[0].category, "DRINKS");
        assert_eq!(menu.items[0].price, Some(2.5));
        assert_eq!(menu.items[0].price_raw, "2,50");

        assert_eq!(menu.items[1].name, "House Blend");
        assert_eq!(menu.items[1].category, "DRINKS");
        assert_eq!(menu.items[1].price, None);
    }

    #[test]
    fn test_items_before_any_header_use_default_bucket() {
        let menu = parser().parse("Cheese toastie 6,50");
        assert_eq!(menu.items[0].category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_header_rules() {
        let p = parser();
        assert!(p.is_category_header("HOT DRINKS"));
        assert!(p.is_category_header("All Day Breakfast"));
        assert!(!p.is_category_header("THIS IS A VERY LONG SHOUT"));
        assert!(!p.is_category_header("Our famous breakfast is served all day long"));
        assert!(!p.is_category_header("Avocado toast"));
    }

    #[test]
    fn test_priced_line_is_never_a_header() {
        let p = parser();
        match p.classify_line("PIZZA MARGHERITA 9,50", "Menu") {
            MenuLine::Item(item) => assert_eq!(item.price, Some(9.5)),
            other => panic!("expected item, got {other:?}"),
        }
        match p.classify_line("ESPRESSO 2,50", "DRINKS") {
            MenuLine::Item(item) => {
                assert_eq!(item.name, "ESPRESSO");
                assert_eq!(item.category, "DRINKS");
            }
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn test_dash_separated_price() {
        match parser().classify_line("Tomato soup - €4.00", "Soups") {
            MenuLine::Item(item) => {
                assert_eq!(item.name, "Tomato soup");
                assert_eq!(item.price_raw, "€4.00");
                assert_eq!(item.price, Some(4.0));
            }
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn test_rejections() {
        let p = parser();
        assert_eq!(
            p.classify_line("Opening hours: 9-17", "Menu"),
            MenuLine::Rejected(ItemRejection::Noise)
        );
        assert_eq!(
            p.classify_line("Call our phone line 12,50", "Menu"),
            MenuLine::Rejected(ItemRejection::Noise)
        );
        assert_eq!(p.classify_line("ab", "Menu"), MenuLine::Rejected(ItemRejection::Shape));
        assert_eq!(
            p.classify_line("We source our beans from a small roastery in town.", "Menu"),
            MenuLine::Rejected(ItemRejection::Shape)
        );
        assert_eq!(p.classify_line("€ 4,50", "Menu"), MenuLine::Rejected(ItemRejection::MissingName));
        let long = "x".repeat(101);
        assert_eq!(p.classify_line(&long, "Menu"), MenuLine::Rejected(ItemRejection::Shape));
    }

    #[test]
    fn test_zero_price_keeps_item_with_null_price() {
        match parser().classify_line("Tap water 0,00", "DRINKS") {
            MenuLine::Item(item) => {
                assert_eq!(item.price, None);
                assert_eq!(item.price_raw, "0,00");
            }
            other => panic!("expected item, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_counts_rejections() {
        let menu = parser().parse("BREAKFAST\n\nPancakes 8,50\nOrder online for delivery\n  \nWaffles 7,00");
        assert_eq!(menu.items.len(), 2);
        assert_eq!(menu.rejected, 1);
        assert!(menu.items.iter().all(|i| i.category == "BREAKFAST"));
    }
}
