//! Periodic mailbox poll → Article draft conversion.

pub mod client;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::EmailConfig;
use crate::error::CoreError;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::models::article::NewArticle;
use crate::models::email_message::NewEmailMessage;
use crate::store::Store;

pub use client::{ImapInboxClient, InboxClient, RawMessage};

pub struct InboxIngestor {
    store: Store,
    client: Arc<dyn InboxClient>,
    config: EmailConfig,
    health: Arc<HealthRegistry>,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub processed: usize,
    pub ignored: usize,
    pub failed: usize,
    pub skipped_seen: usize,
}

impl InboxIngestor {
    pub fn new(store: Store, client: Arc<dyn InboxClient>, config: EmailConfig, health: Arc<HealthRegistry>) -> Self {
        Self { store, client, config, health }
    }

    pub async fn run_loop(&self, cancel: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("inbox ingestor disabled");
            return;
        }

        let mut last_poll = Utc::now() - chrono::Duration::hours(24);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("inbox ingestor stopping");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.poll_interval_min * 60)) => {}
            }

            let poll_started = Utc::now();
            match self.run_once(last_poll).await {
                Ok(summary) => {
                    tracing::info!(
                        processed = summary.processed,
                        ignored = summary.ignored,
                        failed = summary.failed,
                        skipped = summary.skipped_seen,
                        "inbox poll completed"
                    );
                    last_poll = poll_started;
                    self.health.set("inbox_ingestor", ComponentStatus::Healthy);
                }
                Err(e) => {
                    tracing::warn!(?e, "inbox poll failed");
                    self.health.set("inbox_ingestor", ComponentStatus::Unhealthy);
                }
            }
        }
    }

    pub async fn run_once(&self, since: DateTime<Utc>) -> Result<IngestSummary, CoreError> {
        let messages = self.client.poll_unread(since).await?;
        let mut summary = IngestSummary::default();

        for raw in messages {
            if self.store.seen_message(&raw.message_id).await? {
                summary.skipped_seen += 1;
                continue;
            }

            if !self.config.allowed_senders.iter().any(|s| s.eq_ignore_ascii_case(&raw.sender)) {
                let new_email = new_email_message(&raw, self.config.max_retries as i32);
                self.store.insert_ignored_email(new_email, "sender not in allowlist").await?;
                summary.ignored += 1;
                continue;
            }

            let Some(content) = resolve_content(&raw) else {
                let new_email = new_email_message(&raw, self.config.max_retries as i32);
                self.store.insert_ignored_email(new_email, "no body available").await?;
                summary.ignored += 1;
                continue;
            };

            let url = format!("email://{}", raw.message_id);
            let article = NewArticle {
                title: raw.subject.clone(),
                summary: snippet(&content, 280),
                content: Some(content.clone()),
                content_hash: Some(crate::utils::content_hash(&raw.subject, &url, &raw.received_date)),
                url,
                published: raw.received_date,
                source: format!("email:{}", raw.sender),
                author: Some(raw.sender.clone()),
                category: None,
                keywords: Vec::new(),
                image_url: None,
            };

            let new_email = new_email_message(&raw, self.config.max_retries as i32);
            match self.store.insert_processed_email(new_email, article).await {
                Ok(_) => summary.processed += 1,
                Err(e) if e.is_retryable() => {
                    let placeholder = new_email_message(&raw, self.config.max_retries as i32);
                    if let Ok(id) = self.store.insert_ignored_email(placeholder, "pending retry").await {
                        self.store.mark_email_retry(id, &e.to_string(), self.config.max_retries as i32).await?;
                    }
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}

fn new_email_message(raw: &RawMessage, max_retries: i32) -> NewEmailMessage {
    NewEmailMessage {
        message_id: raw.message_id.clone(),
        sender: raw.sender.clone(),
        subject: raw.subject.clone(),
        body_text: raw.body_text.clone(),
        body_html: raw.body_html.clone(),
        received_date: raw.received_date,
        status: "pending".to_string(),
        max_retries,
        headers: Some(raw.headers.clone()),
        labels: raw.labels.clone(),
    }
}

fn resolve_content(raw: &RawMessage) -> Option<String> {
    if let Some(text) = &raw.body_text {
        if !text.trim().is_empty() {
            return Some(text.clone());
        }
    }
    raw.body_html.as_ref().map(|html| crate::utils::decode_html_entities(&strip_html_tags(html)))
}

fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn snippet(text: &str, max_chars: usize) -> String {
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let truncated: String = collapsed.chars().take(max_chars).collect();
    format!("{}…", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_text_with_ellipsis() {
        let text = "word ".repeat(100);
        let s = snippet(&text, 20);
        assert!(s.chars().count() <= 21);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn snippet_leaves_short_text_untouched() {
        assert_eq!(snippet("hello world", 280), "hello world");
    }

    #[test]
    fn strip_html_tags_removes_markup() {
        assert_eq!(strip_html_tags("<p>hi <b>there</b></p>"), "hi there");
    }
}
