use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// Date layout accepted in transaction payloads, e.g. "2025/08/06".
pub const PAYLOAD_DATE_LAYOUT: &str = "%Y/%m/%d";

/// Kind of transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    /// Acquiring shares — cash out regardless of the stored sign of `total`.
    Buy,
    /// Disposing shares — cash in regardless of the stored sign of `total`.
    Sell,
    /// Cash-only income attached to a symbol; no effect on the position.
    Dividend,
    /// Pure cash movement. `total`'s sign decides deposit (+) vs withdrawal (−).
    Cash,
}

impl TradeType {
    /// Case-insensitive parse. "purchase" is accepted as an alias of "buy".
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "purchase" => Ok(TradeType::Buy),
            "sell" => Ok(TradeType::Sell),
            "dividend" => Ok(TradeType::Dividend),
            "cash" => Ok(TradeType::Cash),
            other => Err(CoreError::ValidationError(format!(
                "unsupported trade_type: {other:?} (use buy|sell|dividend|cash)"
            ))),
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeType::Buy => write!(f, "buy"),
            TradeType::Sell => write!(f, "sell"),
            TradeType::Dividend => write!(f, "dividend"),
            TradeType::Cash => write!(f, "cash"),
        }
    }
}

/// A single immutable transaction.
///
/// Sign convention for `total`: negative for buys (cash out), positive for
/// sells/dividends/deposits, negative for withdrawals. The analytics engine
/// takes `|total|` for buy/sell/dividend and the signed value for `cash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier — also the final tie-break of the chronological order
    pub id: Uuid,

    pub portfolio_id: Uuid,

    /// Instrument identifier (e.g. AMZN, BHP.AX); empty only for `cash`
    pub symbol: String,

    pub trade_type: TradeType,

    /// ISO-like 3-letter code of the transaction's own currency
    pub currency: String,

    /// Share quantity (always non-negative; meaningless for `cash`)
    pub shares: f64,

    /// Per-share price in `currency` (meaningless for `cash`)
    pub unit_price: f64,

    pub fee: f64,

    /// Calendar day — daily granularity, no time-of-day
    pub date: NaiveDate,

    /// Signed cash effect in `currency` (see the sign convention above)
    pub total: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or replacing a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub symbol: String,
    pub trade_type: String,
    pub currency: String,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub fee: f64,
    /// "YYYY/MM/DD"
    pub date: String,
    pub total: f64,
}

impl NewTransaction {
    /// Validate and convert into a domain `Transaction`.
    /// Pass `id: None` for creation (a fresh v4 id is generated) or
    /// `Some(existing)` when replacing an existing record.
    pub fn into_domain(
        self,
        portfolio_id: Uuid,
        id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, CoreError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), PAYLOAD_DATE_LAYOUT)
            .map_err(|e| {
                CoreError::ValidationError(format!(
                    "invalid date {:?} (use YYYY/MM/DD): {e}",
                    self.date
                ))
            })?;

        let trade_type = TradeType::parse(&self.trade_type)?;

        let symbol = self.symbol.trim().to_uppercase();
        let currency = self.currency.trim().to_uppercase();
        if trade_type != TradeType::Cash && symbol.is_empty() {
            return Err(CoreError::ValidationError(
                "symbol is required for buy/sell/dividend transactions".into(),
            ));
        }
        if currency.is_empty() {
            return Err(CoreError::ValidationError("currency is required".into()));
        }
        if self.shares < 0.0 || self.unit_price < 0.0 || self.fee < 0.0 {
            return Err(CoreError::ValidationError(
                "shares, unit_price, and fee must be >= 0".into(),
            ));
        }

        Ok(Transaction {
            id: id.unwrap_or_else(Uuid::new_v4),
            portfolio_id,
            symbol,
            trade_type,
            currency,
            shares: self.shares,
            unit_price: self.unit_price,
            fee: self.fee,
            date,
            total: self.total,
            created_at: now,
            updated_at: now,
        })
    }
}
