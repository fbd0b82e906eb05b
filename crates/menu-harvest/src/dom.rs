//! Helpers over parsed HTML snapshots.
//!
//! `scraper::Html` is `!Send`, so everything here is synchronous and callers
//! parse, extract and drop the document between two `.await` points.

use scraper::{ElementRef, Html, Selector};

use crate::error::{HarvestError, HarvestResult};

/// Compile a configured selector, naming where it came from on failure.
pub fn compile(selector: &str, context: &str) -> HarvestResult<Selector> {
    Selector::parse(selector).map_err(|_| HarvestError::InvalidSelector {
        selector: selector.to_string(),
        context: context.to_string(),
    })
}

pub fn compile_all(selectors: &[String], context: &str) -> HarvestResult<Vec<Selector>> {
    selectors.iter().map(|s| compile(s, context)).collect()
}

/// All text below an element, whitespace-collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first element matching the first selector that yields
/// non-empty text.
pub fn first_text(root: &ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    first_text_where(root, selectors, |_| true)
}

/// Like [`first_text`], but only texts accepted by `accept` count.
///
/// Every match of every selector is tried in order, so a `span` holding a
/// badge does not hide a later `span` holding the price.
pub fn first_text_where(
    root: &ElementRef<'_>,
    selectors: &[Selector],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    selectors
        .iter()
        .flat_map(|sel| root.select(sel))
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty() && accept(text))
}

/// Text of the first document-level match among `selectors`.
pub fn document_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    first_text(&document.root_element(), selectors)
}

/// Contents of `<title>`.
pub fn document_title(document: &Html) -> Option<String> {
    let sel = Selector::parse("title").ok()?;
    document
        .select(&sel)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

/// `content` of `<meta property=...>` or `<meta name=...>`.
pub fn meta_content(document: &Html, key: &str) -> Option<String> {
    let sel = Selector::parse(&format!("meta[property='{key}'], meta[name='{key}']")).ok()?;
    document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

/// Nearest ancestor of `el`, strictly inside `within`, whose value for any of
/// `attributes` contains `marker`.
pub fn nearest_marked_ancestor<'a>(
    el: &ElementRef<'a>,
    within: &ElementRef<'a>,
    attributes: &[String],
    marker: &str,
) -> Option<ElementRef<'a>> {
    el.ancestors()
        .take_while(|node| node.id() != within.id())
        .filter_map(ElementRef::wrap)
        .find(|ancestor| {
            attributes.iter().any(|attr| {
                ancestor
                    .value()
                    .attr(attr)
                    .map(|v| v.to_lowercase().contains(marker))
                    .unwrap_or(false)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_compile_reports_context() {
        let err = compile("li[[", "platform.item_list_selector").unwrap_err();
        match err {
            HarvestError::InvalidSelector { selector, context } => {
                assert_eq!(selector, "li[[");
                assert_eq!(context, "platform.item_list_selector");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_element_text_collapses_whitespace() {
        let doc = Html::parse_fragment("<div> Pad\n  <b>Thai</b>  </div>");
        let div = doc.select(&sel("div")).next().unwrap();
        assert_eq!(element_text(&div), "Pad Thai");
    }

    #[test]
    fn test_first_text_where_skips_rejected_matches() {
        let doc = Html::parse_fragment(
            "<li><span>Popular</span><span>€ 9,50</span><h3>Margherita</h3></li>",
        );
        let li = doc.select(&sel("li")).next().unwrap();
        let price = first_text_where(&li, &[sel("span")], |t| t.contains('€'));
        assert_eq!(price.as_deref(), Some("€ 9,50"));
        assert_eq!(first_text(&li, &[sel("h3"), sel("span")]).as_deref(), Some("Margherita"));
        assert_eq!(first_text(&li, &[sel("p")]), None);
    }

    #[test]
    fn test_title_and_meta() {
        let doc = Html::parse_document(
            r#"<html><head><title> Cafe Zuid | Menu </title>
            <meta property="og:site_name" content="Cafe Zuid"></head><body></body></html>"#,
        );
        assert_eq!(document_title(&doc).as_deref(), Some("Cafe Zuid | Menu"));
        assert_eq!(meta_content(&doc, "og:site_name").as_deref(), Some("Cafe Zuid"));
        assert_eq!(meta_content(&doc, "description"), None);
    }

    #[test]
    fn test_nearest_marked_ancestor() {
        let doc = Html::parse_fragment(
            r#"<section data-qa="item-category"><div class="menu-items"><div data-qa="item-element"><div class="inner"><h3>Bami</h3></div></div></div><div><h3>Loose</h3></div></section>"#,
        );
        let section = doc.select(&sel("section")).next().unwrap();
        let attrs = vec!["class".to_string(), "data-qa".to_string()];
        let h3 = sel("h3");
        let mut headings = doc.select(&h3);

        let bami = headings.next().unwrap();
        let ancestor = nearest_marked_ancestor(&bami, &section, &attrs, "item").unwrap();
        assert_eq!(ancestor.value().attr("data-qa"), Some("item-element"));

        let loose = headings.next().unwrap();
        assert!(nearest_marked_ancestor(&loose, &section, &attrs, "item").is_none());
    }
}
