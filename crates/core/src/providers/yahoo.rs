use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::CoreError;
use super::traits::{HistoricalPricingSource, PriceBasis, PricingSource, Quote};

const BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "portfolio-tracker/1.0";

/// How far back a historical lookup scans for the nearest prior trading day.
/// Three weeks covers any run of weekends plus market holidays.
const HISTORY_LOOKBACK_DAYS: u64 = 21;

/// Yahoo Finance v8 chart provider.
///
/// - **Free**: no API key.
/// - **Coverage**: global equities, ETFs, and option symbols.
/// - **Latest quotes** come from the 1-minute chart meta and are cached for
///   a short TTL so repeated valuation passes don't hammer the API.
/// - **Historical** open/close bars come from the daily chart, making this
///   the primary source for daily P&L and backtest curves.
pub struct YahooProvider {
    client: Client,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedQuote>>,
}

struct CachedQuote {
    quote: Quote,
    fetched: Instant,
}

impl YahooProvider {
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(8))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            ttl: Duration::from_secs(60),
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_chart(&self, symbol: &str, query: &str) -> Result<ChartResult, CoreError> {
        let url = format!("{BASE_URL}/{symbol}?{query}");
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(CoreError::Api {
                provider: "Yahoo".into(),
                message: format!("http {} for {symbol}", resp.status().as_u16()),
            });
        }
        let raw: ChartResponse = resp.json().await.map_err(|e| CoreError::Api {
            provider: "Yahoo".into(),
            message: format!("failed to parse chart for {symbol}: {e}"),
        })?;
        raw.chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                reason: "yahoo: no result".into(),
            })
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Yahoo chart API response types ──────────────────────────────────

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Deserialize, Default)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: f64,
    #[serde(rename = "regularMarketTime", default)]
    regular_market_time: i64,
}

#[derive(Deserialize, Default)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBars>,
}

// Yahoo emits nulls inside the bar arrays for halted/empty intervals.
#[derive(Deserialize, Default)]
struct QuoteBars {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[async_trait]
impl PricingSource for YahooProvider {
    fn name(&self) -> &str {
        "Yahoo"
    }

    async fn latest_price(&self, symbol: &str) -> Result<Quote, CoreError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(CoreError::PriceNotAvailable {
                symbol,
                reason: "empty symbol".into(),
            });
        }

        if let Ok(cache) = self.cache.read() {
            if let Some(c) = cache.get(&symbol) {
                if c.fetched.elapsed() < self.ttl {
                    return Ok(c.quote);
                }
            }
        }

        let result = self.fetch_chart(&symbol, "interval=1m&range=1d").await?;

        let mut price = result.meta.regular_market_price;
        let mut as_of = DateTime::from_timestamp(result.meta.regular_market_time, 0)
            .filter(|_| result.meta.regular_market_time > 0);

        // Fallback: last non-null close bar when the meta is missing.
        if price <= 0.0 || as_of.is_none() {
            if let Some(bars) = result.indicators.quote.first() {
                for (i, ts) in result.timestamp.iter().enumerate().rev() {
                    if let Some(Some(c)) = bars.close.get(i) {
                        if *c > 0.0 {
                            price = *c;
                            as_of = DateTime::from_timestamp(*ts, 0);
                            break;
                        }
                    }
                }
            }
        }

        if price <= 0.0 {
            return Err(CoreError::PriceNotAvailable {
                symbol,
                reason: "yahoo: no positive price in chart".into(),
            });
        }

        let quote = Quote {
            price,
            as_of: as_of.unwrap_or_else(Utc::now),
        };
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                symbol,
                CachedQuote {
                    quote,
                    fetched: Instant::now(),
                },
            );
        }
        Ok(quote)
    }

    fn historical(&self) -> Option<&dyn HistoricalPricingSource> {
        Some(self)
    }
}

#[async_trait]
impl HistoricalPricingSource for YahooProvider {
    async fn price_on_or_before(
        &self,
        symbol: &str,
        date: NaiveDate,
        basis: PriceBasis,
    ) -> Result<(f64, NaiveDate), CoreError> {
        let symbol = symbol.trim().to_uppercase();
        let from = date
            .checked_sub_days(Days::new(HISTORY_LOOKBACK_DAYS))
            .unwrap_or(date);
        let until = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let period1 = from.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let period2 = until.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);

        let query = format!("interval=1d&period1={period1}&period2={period2}");
        let result = self.fetch_chart(&symbol, &query).await?;

        let bars = result.indicators.quote.first();
        for (i, ts) in result.timestamp.iter().enumerate().rev() {
            let bar_date = match DateTime::from_timestamp(*ts, 0) {
                Some(t) => t.date_naive(),
                None => continue,
            };
            if bar_date > date {
                continue;
            }
            let value = bars.and_then(|b| match basis {
                PriceBasis::Open => b.open.get(i).copied().flatten(),
                PriceBasis::Close => b.close.get(i).copied().flatten(),
            });
            if let Some(p) = value {
                if p > 0.0 {
                    return Ok((p, bar_date));
                }
            }
        }

        Err(CoreError::PriceNotAvailable {
            symbol,
            reason: format!("yahoo: no daily bar on or before {date}"),
        })
    }
}
