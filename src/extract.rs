//! Domain extraction from reverse-IP result pages

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::backend::PatternKind;

static UL_LIST_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("ul#list").unwrap()
});

static DIV_DOMAIN_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div#J_domain").unwrap()
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a").unwrap()
});

/// Extract the listed domains from a backend result page.
///
/// Missing containers and malformed markup yield an empty list, never an error.
pub fn extract_domains(html: &str, pattern: PatternKind) -> Vec<String> {
    let document = Html::parse_document(html);

    let domains = match pattern {
        PatternKind::UlList => extract_ul_list(&document),
        PatternKind::DivDomain => extract_div_domain(&document),
        PatternKind::Unsupported => {
            warn!("Unsupported extraction pattern, no domains extracted");
            return Vec::new();
        }
    };

    debug!("Extracted {} domains using {} pattern", domains.len(), pattern);
    domains
}

fn extract_ul_list(document: &Html) -> Vec<String> {
    let Some(list) = document.select(&UL_LIST_SELECTOR).next() else {
        debug!("No ul#list container in page");
        return Vec::new();
    };

    list.select(&ANCHOR_SELECTOR)
        .filter_map(|a| trimmed_text(&a))
        .collect()
}

fn extract_div_domain(document: &Html) -> Vec<String> {
    let Some(container) = document.select(&DIV_DOMAIN_SELECTOR).next() else {
        debug!("No div#J_domain container in page");
        return Vec::new();
    };

    container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "p")
        .filter_map(|p| p.select(&ANCHOR_SELECTOR).next())
        .filter_map(|a| trimmed_text(&a))
        .collect()
}

/// Anchor text trimmed at both ends; empty text or text with inner whitespace
/// is not a domain
fn trimmed_text(element: &ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.contains(char::is_whitespace) {
        debug!("Skipping anchor text with inner whitespace: {:?}", text);
        return None;
    }
    Some(text.to_string())
}
