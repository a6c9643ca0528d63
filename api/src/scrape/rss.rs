//! Fetch+parse a source's feed, producing normalized Article drafts. Dedup/persistence is left to ScrapeOrchestrator.

use std::time::Duration;

use chrono::Utc;
use feed_rs::model::Feed;

use crate::config::TargetSite;
use crate::error::CoreError;
use crate::models::article::NewArticle;
use crate::utils::{content_hash, decode_html_entities};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RssFetcher {
    http: reqwest::Client,
}

impl RssFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn fetch(&self, site: &TargetSite) -> Result<Vec<NewArticle>, CoreError> {
        let feed_url = site.feed_url.as_deref().ok_or_else(|| {
            CoreError::Permanent(format!("source {} has no feed_url configured", site.name))
        })?;

        let bytes = self
            .http
            .get(feed_url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let feed: Feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| CoreError::ParseError(e.to_string()))?;

        let domain = site.domain.to_lowercase();
        let drafts = feed
            .entries
            .into_iter()
            .filter_map(|entry| draft_from_entry(entry, &domain))
            .collect();
        Ok(drafts)
    }
}

fn draft_from_entry(entry: feed_rs::model::Entry, domain: &str) -> Option<NewArticle> {
    let url = entry.links.first().map(|l| l.href.clone())?;
    let title = entry.title.map(|t| decode_html_entities(t.content.trim()))?;
    if title.is_empty() {
        return None;
    }

    let summary = entry
        .summary
        .map(|s| decode_html_entities(s.content.trim()))
        .unwrap_or_default();

    let published = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let author = entry.authors.first().map(|a| a.name.clone());

    let keywords: Vec<String> = entry
        .categories
        .iter()
        .map(|c| c.term.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let image_url = entry.media.iter().find_map(|m| m.thumbnails.first().map(|t| t.image.uri.clone()));

    let hash = content_hash(&title, &url, &published);

    Some(NewArticle {
        title,
        summary,
        content: None,
        url,
        content_hash: Some(hash),
        published,
        source: domain.to_string(),
        author,
        category: None,
        keywords,
        image_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_title_and_link() {
        let entry = feed_rs::model::Entry { title: None, ..Default::default() };
        assert!(draft_from_entry(entry, "nos.nl").is_none());
    }

    #[test]
    fn draft_normalizes_source_to_lowercase_domain() {
        let mut entry = feed_rs::model::Entry::default();
        entry.title = Some(feed_rs::model::Text {
            content_type: mime::TEXT_PLAIN,
            src: None,
            content: "  Hello & World  ".into(),
        });
        entry.links.push(feed_rs::model::Link {
            href: "https://nos.nl/a".into(),
            rel: None,
            media_type: None,
            href_lang: None,
            title: None,
            length: None,
        });
        let draft = draft_from_entry(entry, "NOS.nl".to_lowercase().as_str()).unwrap();
        assert_eq!(draft.title, "Hello & World");
        assert_eq!(draft.source, "nos.nl");
    }
}
