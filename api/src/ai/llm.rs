//! Wraps an `LLMClient` with the prompt contract, tolerant JSON parsing,
//! an in-process response cache, and bounded retries.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::cache::{keys, Cache};
use crate::error::CoreError;
use crate::retry::RetryPolicy;

use super::llm_client::{ArticleText, LLMClient};
use super::types::Enrichment;

const PROMPT_VERSION: &str = "v1";
const MAX_REPAIR_SUBSTITUTIONS: usize = 25;

const PROMPT_TEMPLATE: &str = r#"You are a news analysis engine. Given an article, respond with a single strict JSON object and nothing else — no prose, no Markdown fences. The object must have exactly this shape:

{"sentiment":{"score":<float -1..1>,"label":"positive"|"neutral"|"negative","confidence":<float 0..1, optional>},"categories":{<category name>:<confidence 0..1>, ...},"entities":{"persons":[...],"organizations":[...],"locations":[...]},"keywords":[{"word":"...","score":<float 0..1>}, ...],"summary":"<=2 sentence summary, optional","stock_tickers":[{"symbol":"...","name":"...","exchange":"...","mentions":<int>}, ...]}

Any response that is not exactly this JSON shape will be rejected.

Title: {title}
Article:
{text}
"#;

fn build_prompt(title: &str, text: &str) -> String {
    PROMPT_TEMPLATE.replacen("{title}", title, 1).replacen("{text}", text, 1)
}

fn build_batch_prompt(items: &[ArticleText]) -> String {
    let mut articles = String::new();
    for (i, item) in items.iter().enumerate() {
        articles.push_str(&format!("[{i}] Title: {}\n[{i}] Article:\n{}\n\n", item.title, item.text));
    }
    format!(
        "You are a news analysis engine. Given {n} articles below, respond with a single strict JSON array of exactly {n} objects, in the same order as the articles, where each object has this shape:\n\n\
{{\"sentiment\":{{\"score\":<float -1..1>,\"label\":\"positive\"|\"neutral\"|\"negative\",\"confidence\":<float 0..1, optional>}},\"categories\":{{<category name>:<confidence 0..1>, ...}},\"entities\":{{\"persons\":[...],\"organizations\":[...],\"locations\":[...]}},\"keywords\":[{{\"word\":\"...\",\"score\":<float 0..1>}}, ...],\"summary\":\"<=2 sentence summary, optional\",\"stock_tickers\":[{{\"symbol\":\"...\",\"name\":\"...\",\"exchange\":\"...\",\"mentions\":<int>}}, ...]}}\n\n\
Respond with the array only — no prose, no Markdown fences.\n\n{articles}",
        n = items.len()
    )
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.trim_start_matches('\n').trim_end().trim_end_matches("```").trim()
    } else {
        trimmed
    }
}

/// Repairs the most common LLM JSON malformation — a missing comma between
/// array/object siblings — via a bounded number of targeted substitutions.
fn repair_json(raw: &str) -> String {
    let sibling_gap = Regex::new(r#"([\"\}\]])(\s*)([\"\{\[])"#).unwrap();
    let mut repaired = String::with_capacity(raw.len());
    let mut last_end = 0;
    let mut substitutions = 0;

    for caps in sibling_gap.captures_iter(raw) {
        if substitutions >= MAX_REPAIR_SUBSTITUTIONS {
            break;
        }
        let whole = caps.get(0).unwrap();
        repaired.push_str(&raw[last_end..whole.start()]);
        repaired.push_str(&caps[1]);
        repaired.push(',');
        repaired.push_str(&caps[2]);
        repaired.push_str(&caps[3]);
        last_end = whole.end();
        substitutions += 1;
    }
    repaired.push_str(&raw[last_end..]);
    repaired
}

fn parse_enrichment(raw: &str) -> Result<Enrichment, CoreError> {
    let stripped = strip_code_fences(raw);
    if let Ok(e) = serde_json::from_str::<Enrichment>(stripped) {
        return Ok(e.normalize());
    }
    let repaired = repair_json(stripped);
    serde_json::from_str::<Enrichment>(&repaired)
        .map(Enrichment::normalize)
        .map_err(|e| CoreError::ParseError(e.to_string()))
}

fn parse_enrichment_array(raw: &str, expected_len: usize) -> Result<Vec<Enrichment>, CoreError> {
    let stripped = strip_code_fences(raw);
    let parsed: Vec<Enrichment> = serde_json::from_str(stripped)
        .or_else(|_| serde_json::from_str(&repair_json(stripped)))
        .map_err(|e| CoreError::ParseError(e.to_string()))?;

    if parsed.len() != expected_len {
        return Err(CoreError::ParseError(format!(
            "batch response length {} does not match request length {expected_len}",
            parsed.len()
        )));
    }
    Ok(parsed.into_iter().map(Enrichment::normalize).collect())
}

fn cache_key(model: &str, title: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\0");
    hasher.update(PROMPT_VERSION.as_bytes());
    hasher.update(b"\0");
    hasher.update(title.as_bytes());
    hasher.update(b"\0");
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    keys::llm_response(&digest[..16])
}

pub struct LlmWrapper {
    client: Arc<dyn LLMClient>,
    cache: Arc<Cache>,
    retry: RetryPolicy,
}

impl LlmWrapper {
    pub fn new(client: Arc<dyn LLMClient>, cache: Arc<Cache>, retry: RetryPolicy) -> Self {
        Self { client, cache, retry }
    }

    pub async fn process_one(&self, title: &str, text: &str) -> Result<Enrichment, CoreError> {
        let key = cache_key(self.client.model_id(), title, text);
        let prompt = build_prompt(title, text);
        let client = &self.client;
        let retry = &self.retry;

        self.cache
            .get_or_fetch(&key, keys::LLM_RESPONSE_TTL, || async move {
                let raw = retry.run(|| client.complete(&prompt), CoreError::is_retryable).await?;
                parse_enrichment(&raw)
            })
            .await
    }

    /// Sends up to `items.len()` articles in one request; on a malformed or
    /// mis-shaped response, falls back to per-article calls.
    pub async fn process_batch(&self, items: &[ArticleText]) -> Result<Vec<Enrichment>, CoreError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_batch_prompt(items);
        let batch_result: Result<Vec<Enrichment>, CoreError> = async {
            let raw = self
                .retry
                .run(|| self.client.complete(&prompt), CoreError::is_retryable)
                .await?;
            parse_enrichment_array(&raw, items.len())
        }
        .await;

        match batch_result {
            Ok(enrichments) => Ok(enrichments),
            Err(e) => {
                tracing::warn!(error = %e, count = items.len(), "batch LLM response invalid, falling back to per-article calls");
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    results.push(self.process_one(&item.title, &item.text).await?);
                }
                Ok(results)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\":1}");
    }

    #[test]
    fn repairs_missing_comma_between_object_siblings() {
        let raw = "{\"a\":1}\n{\"b\":2}";
        assert_eq!(repair_json(raw), "{\"a\":1},\n{\"b\":2}");
    }

    #[test]
    fn repairs_missing_comma_across_a_single_space() {
        let raw = "{\"a\":1} {\"b\":2}";
        assert_eq!(repair_json(raw), "{\"a\":1}, {\"b\":2}");
    }

    #[test]
    fn repairs_missing_comma_with_no_whitespace() {
        let raw = "{\"a\":1}{\"b\":2}";
        assert_eq!(repair_json(raw), "{\"a\":1},{\"b\":2}");
    }

    #[test]
    fn leaves_already_valid_json_untouched() {
        let raw = "{\"a\":1},{\"b\":2}";
        assert_eq!(repair_json(raw), raw);
    }

    #[test]
    fn parses_well_formed_enrichment() {
        let raw = r#"{"sentiment":{"score":0.5,"label":"positive"},"categories":{},"entities":{"persons":[],"organizations":[],"locations":[]},"keywords":[],"stock_tickers":[]}"#;
        let enrichment = parse_enrichment(raw).unwrap();
        assert_eq!(enrichment.sentiment.label, super::super::types::SentimentLabel::Positive);
    }

    #[test]
    fn rejects_unrecoverable_garbage() {
        let raw = "not json at all {{{";
        assert!(matches!(parse_enrichment(raw), Err(CoreError::ParseError(_))));
    }

    #[test]
    fn batch_array_length_mismatch_is_a_parse_error() {
        let raw = r#"[{"sentiment":{"score":0.1,"label":"neutral"},"categories":{},"entities":{"persons":[],"organizations":[],"locations":[]},"keywords":[],"stock_tickers":[]}]"#;
        let result = parse_enrichment_array(raw, 2);
        assert!(matches!(result, Err(CoreError::ParseError(_))));
    }
}
