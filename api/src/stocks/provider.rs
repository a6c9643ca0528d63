//! The external quote provider interface and a bundled default
//! adapter speaking the Alpha Vantage `GLOBAL_QUOTE`/`OVERVIEW` endpoints —
//! the provider itself is swappable; this is one concrete implementation
//! of the trait it names.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::CoreError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: Option<u64>,
    pub as_of: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, CoreError>;
    async fn profile(&self, symbol: &str) -> Result<Profile, CoreError>;
}

pub struct AlphaVantageProvider {
    http: reqwest::Client,
    api_key: String,
    timeout: Duration,
}

impl AlphaVantageProvider {
    pub fn new(http: reqwest::Client, api_key: String, timeout: Duration) -> Self {
        Self { http, api_key, timeout }
    }
}

#[derive(Deserialize)]
struct GlobalQuoteEnvelope {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: String,
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "09. change")]
    change: String,
    #[serde(rename = "10. change percent")]
    change_percent: String,
    #[serde(rename = "06. volume")]
    volume: String,
}

#[derive(Deserialize)]
struct OverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Exchange")]
    exchange: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>, CoreError> {
        let mut out = HashMap::with_capacity(symbols.len());
        // the free-tier API has no batch quote endpoint; one request per
        // symbol, issued sequentially to respect its per-minute rate limit.
        for symbol in symbols {
            let response = self
                .http
                .get("https://www.alphavantage.co/query")
                .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol), ("apikey", &self.api_key)])
                .timeout(self.timeout)
                .send()
                .await?
                .error_for_status()?;

            let envelope: GlobalQuoteEnvelope = response.json().await.map_err(CoreError::from)?;
            let Some(gq) = envelope.global_quote else { continue };
            let price: f64 = gq.price.parse().unwrap_or(0.0);
            let change: f64 = gq.change.parse().unwrap_or(0.0);
            let change_percent: f64 = gq.change_percent.trim_end_matches('%').parse().unwrap_or(0.0);
            let volume: Option<u64> = gq.volume.parse().ok();

            out.insert(
                symbol.to_uppercase(),
                Quote { symbol: gq.symbol, price, change, change_percent, volume, as_of: Utc::now() },
            );
        }
        Ok(out)
    }

    async fn profile(&self, symbol: &str) -> Result<Profile, CoreError> {
        let response = self
            .http
            .get("https://www.alphavantage.co/query")
            .query(&[("function", "OVERVIEW"), ("symbol", symbol), ("apikey", &self.api_key)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let overview: OverviewResponse = response.json().await.map_err(CoreError::from)?;
        Ok(Profile {
            symbol: overview.symbol.unwrap_or_else(|| symbol.to_string()),
            name: overview.name,
            exchange: overview.exchange,
            sector: overview.sector,
        })
    }
}
