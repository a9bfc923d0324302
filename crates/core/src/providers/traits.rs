use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Which bar value a historical lookup should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceBasis {
    Open,
    Close,
}

impl Default for PriceBasis {
    fn default() -> Self {
        PriceBasis::Close
    }
}

/// A priced point in time, in the instrument's own quote currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub as_of: DateTime<Utc>,
}

/// Latest-price lookup. Implementations live behind `Arc<dyn PricingSource>`
/// so the analytics engine stays independent of any concrete API.
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Human-readable name of this source (for logs/errors).
    fn name(&self) -> &str;

    async fn latest_price(&self, symbol: &str) -> Result<Quote, CoreError>;

    /// Explicit capability probe: `Some` when this source can also answer
    /// historical queries. Callers must not assume it; daily P&L and
    /// day-by-day backtests degrade gracefully when this is `None`.
    fn historical(&self) -> Option<&dyn HistoricalPricingSource> {
        None
    }
}

/// Historical price lookup.
#[async_trait]
pub trait HistoricalPricingSource: Send + Sync {
    /// The latest available price at or before `date` — never after.
    /// Returns the price and the date it actually comes from.
    async fn price_on_or_before(
        &self,
        symbol: &str,
        date: NaiveDate,
        basis: PriceBasis,
    ) -> Result<(f64, NaiveDate), CoreError>;
}

/// Currency exchange-rate lookup: how many `to` per 1 `from`.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;

    async fn rate(&self, from: &str, to: &str) -> Result<(f64, DateTime<Utc>), CoreError>;
}
