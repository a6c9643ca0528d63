//! Fetch an article URL and extract its body text via a config-driven
//! table of per-source selector chains, plus a generic readability-style
//! fallback for sources without a tuned selector.

use std::time::Duration;

use scraper::{Html, Selector};

use crate::error::CoreError;
use crate::utils::decode_html_entities;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const MIN_SELECTOR_CHARS: usize = 200;
const MIN_GENERIC_CHARS: usize = 300;
const STRIP_TAGS: &[&str] = &["script", "style", "nav", "aside", "footer"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMethod {
    Selector,
    Generic,
    Browser,
}

pub struct Extracted {
    pub text: String,
    pub method: ExtractMethod,
}

/// Ordered per-host CSS selector lists; first selector producing enough
/// text wins.
fn selectors_for(source: &str) -> &'static [&'static str] {
    match source {
        "nos.nl" => &["article .article_textWrap", "article", "main"],
        "nu.nl" => &["div.block.text", "article"],
        "volkskrant.nl" => &["div.artstyle__intro", "article"],
        _ => &[],
    }
}

pub struct HtmlExtractor {
    http: reqwest::Client,
}

impl HtmlExtractor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn extract(&self, url: &str, source: &str) -> Result<Extracted, CoreError> {
        let body = self
            .http
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        extract_from_html(&body, source)
    }
}

pub fn extract_from_html(body: &str, source: &str) -> Result<Extracted, CoreError> {
    let document = Html::parse_document(body);

    for raw_selector in selectors_for(source) {
        let Ok(selector) = Selector::parse(raw_selector) else { continue };
        let text = collect_text(&document, &selector);
        if text.chars().count() >= MIN_SELECTOR_CHARS {
            return Ok(Extracted { text: decode_html_entities(&text), method: ExtractMethod::Selector });
        }
    }

    let generic = generic_fallback(&document);
    if generic.chars().count() >= MIN_GENERIC_CHARS {
        return Ok(Extracted { text: decode_html_entities(&generic), method: ExtractMethod::Generic });
    }

    Err(CoreError::NoContent)
}

fn collect_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Removes script/style/nav/aside/footer, then collects block-level text
/// nodes.
fn generic_fallback(document: &Html) -> String {
    let strip_selectors: Vec<Selector> = STRIP_TAGS.iter().filter_map(|t| Selector::parse(t).ok()).collect();
    let stripped: std::collections::HashSet<_> = strip_selectors
        .iter()
        .flat_map(|s| document.select(s))
        .map(|el| el.id())
        .collect();

    let block_selector = Selector::parse("p, h1, h2, h3, li, blockquote").unwrap();
    document
        .select(&block_selector)
        .filter(|el| !has_stripped_ancestor(el, &stripped))
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn has_stripped_ancestor(el: &scraper::ElementRef, stripped: &std::collections::HashSet<ego_tree::NodeId>) -> bool {
    el.ancestors().any(|a| stripped.contains(&a.id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_fallback_skips_nav_and_footer() {
        let html = format!(
            "<html><body><nav>Menu item</nav><article><p>{}</p></article><footer>copyright</footer></body></html>",
            "a".repeat(350)
        );
        let result = extract_from_html(&html, "unknown-source.nl").unwrap();
        assert_eq!(result.method, ExtractMethod::Generic);
        assert!(!result.text.contains("Menu item"));
        assert!(!result.text.contains("copyright"));
    }

    #[test]
    fn short_page_yields_no_content_not_truncated_text() {
        let html = "<html><body><p>too short</p></body></html>";
        let result = extract_from_html(html, "unknown-source.nl");
        assert!(matches!(result, Err(CoreError::NoContent)));
    }

    #[test]
    fn tuned_selector_wins_when_present() {
        let html = format!(
            "<html><body><article class=\"article_textWrap\"><p>{}</p></article></body></html>",
            "tekst ".repeat(50)
        );
        let result = extract_from_html(&html, "nos.nl").unwrap();
        assert_eq!(result.method, ExtractMethod::Selector);
    }
}
