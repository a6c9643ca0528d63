//! Closed structured type for AI-derived signals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Derives the label from a score: positive >= 0.2, negative <= -0.2,
    /// else neutral.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.2 {
            SentimentLabel::Positive
        } else if score <= -0.2 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub persons: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub score: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockTicker {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<u32>,
}

/// The structured result of `LLMClient.ProcessOne`/`ProcessBatch`, after
/// tolerant parsing has already run. Unknown fields from the LLM response
/// are preserved in `extras` but are not part of the contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Enrichment {
    pub sentiment: Sentiment,
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub stock_tickers: Vec<StockTicker>,
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl Enrichment {
    /// Enforces the sentiment-label consistency invariant regardless of what
    /// the LLM (or a hand-authored test fixture) claims the label is.
    pub fn normalize(mut self) -> Self {
        self.sentiment.label = SentimentLabel::from_score(self.sentiment.score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_is_lossless() {
        let e = Enrichment {
            sentiment: Sentiment { score: 0.4, label: SentimentLabel::Positive, confidence: Some(0.9) },
            categories: BTreeMap::from([("Politics".to_string(), 0.9)]),
            entities: Entities { persons: vec!["A".into()], organizations: vec![], locations: vec![] },
            keywords: vec![Keyword { word: "x".into(), score: 0.8 }],
            summary: Some("summary".into()),
            stock_tickers: vec![],
            extras: Default::default(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let parsed: Enrichment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sentiment.score, e.sentiment.score);
        assert_eq!(parsed.categories, e.categories);
        assert_eq!(parsed.keywords.len(), 1);
    }

    #[test]
    fn unknown_fields_are_preserved_via_flatten() {
        let json = serde_json::json!({
            "sentiment": {"score": 0.1, "label": "neutral", "confidence": null},
            "categories": {},
            "entities": {"persons": [], "organizations": [], "locations": []},
            "keywords": [],
            "summary": null,
            "stock_tickers": [],
            "future_field": "unexpected",
        });
        let e: Enrichment = serde_json::from_value(json).unwrap();
        assert_eq!(e.extras.get("future_field").and_then(|v| v.as_str()), Some("unexpected"));
    }

    #[test]
    fn sentiment_label_boundaries() {
        assert_eq!(SentimentLabel::from_score(0.2), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_score(-0.2), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_score(0.0), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(0.19), SentimentLabel::Neutral);
    }
}
