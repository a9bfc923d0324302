use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::CoreError;
use super::traits::{PricingSource, Quote};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage GLOBAL_QUOTE provider for stock/equity prices.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key.
/// - **Latest price only** — no historical capability, so trackers configured
///   with it fall back to the coarse backtest path and skip daily P&L.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, api_key }
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

#[async_trait]
impl PricingSource for AlphaVantageProvider {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn latest_price(&self, symbol: &str) -> Result<Quote, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        let resp: GlobalQuoteResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", &symbol),
                ("apikey", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("failed to parse quote for {symbol}: {e}"),
            })?;

        let quote = resp.global_quote.ok_or_else(|| CoreError::Api {
            provider: "Alpha Vantage".into(),
            message: format!("no quote data for {symbol}; API limit may be exceeded"),
        })?;

        let price: f64 = quote
            .price
            .as_deref()
            .and_then(|p| p.parse().ok())
            .filter(|p| *p > 0.0)
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.clone(),
                reason: "alpha vantage: missing or non-positive price".into(),
            })?;

        // The feed reports a trading day, not a timestamp; use midnight UTC.
        let as_of = quote
            .latest_trading_day
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc())
            .unwrap_or_else(Utc::now);

        Ok(Quote { price, as_of })
    }
}
