use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::CoreError;
use super::traits::RateSource;

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "portfolio-tracker/1.0";

/// Currency exchanger backed by Yahoo FX pair symbols (e.g. `USDTWD=X`).
pub struct YahooFxSource {
    client: Client,
}

impl YahooFxSource {
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(8))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for YahooFxSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct FxResponse {
    chart: FxChart,
}

#[derive(Deserialize)]
struct FxChart {
    #[serde(default)]
    result: Vec<FxResult>,
}

#[derive(Deserialize)]
struct FxResult {
    #[serde(default)]
    meta: FxMeta,
}

#[derive(Deserialize, Default)]
struct FxMeta {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: f64,
    #[serde(rename = "regularMarketTime", default)]
    regular_market_time: i64,
}

#[async_trait]
impl RateSource for YahooFxSource {
    fn name(&self) -> &str {
        "Yahoo FX"
    }

    /// How many `to` per 1 `from`.
    async fn rate(&self, from: &str, to: &str) -> Result<(f64, DateTime<Utc>), CoreError> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from.is_empty() || to.is_empty() {
            return Err(CoreError::ValidationError("invalid currency".into()));
        }
        if from == to {
            return Ok((1.0, Utc::now()));
        }

        let pair = format!("{from}{to}=X");
        let url = format!("{BASE_URL}/{pair}?interval=1h&range=1d");
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(CoreError::Api {
                provider: "Yahoo FX".into(),
                message: format!("http {} for {pair}", resp.status().as_u16()),
            });
        }
        let raw: FxResponse = resp.json().await.map_err(|e| CoreError::Api {
            provider: "Yahoo FX".into(),
            message: format!("failed to parse rate for {pair}: {e}"),
        })?;

        let meta = raw
            .chart
            .result
            .into_iter()
            .next()
            .map(|r| r.meta)
            .ok_or_else(|| CoreError::Api {
                provider: "Yahoo FX".into(),
                message: format!("rate not found for {from} → {to}"),
            })?;

        if meta.regular_market_price <= 0.0 {
            return Err(CoreError::Api {
                provider: "Yahoo FX".into(),
                message: format!("non-positive rate for {from} → {to}"),
            });
        }
        let as_of = DateTime::from_timestamp(meta.regular_market_time, 0)
            .filter(|_| meta.regular_market_time > 0)
            .unwrap_or_else(Utc::now);
        Ok((meta.regular_market_price, as_of))
    }
}
