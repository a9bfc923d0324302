use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::providers::traits::PriceBasis;

/// Denominator basis for allocation weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationBasis {
    Invested,
    MarketValue,
}

impl AllocationBasis {
    /// Parse the wire value; empty string means the default (`invested`).
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_lowercase().as_str() {
            "" | "invested" => Ok(AllocationBasis::Invested),
            "market_value" => Ok(AllocationBasis::MarketValue),
            other => Err(CoreError::ValidationError(format!(
                "unsupported basis {other:?} (use \"invested\" or \"market_value\")"
            ))),
        }
    }
}

impl Default for AllocationBasis {
    fn default() -> Self {
        AllocationBasis::Invested
    }
}

/// One symbol's slice of an allocation breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationItem {
    pub symbol: String,
    pub shares: f64,
    /// Cost basis of currently held shares, in the reference currency
    pub invested: f64,
    #[serde(default)]
    pub market_value: f64,
    pub weight_percent: f64,
    /// Present when a historical pricing source is available (market basis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_pl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_pl_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationBreakdown {
    pub basis: AllocationBasis,
    pub ref_currency: String,
    #[serde(default)]
    pub total_invested: f64,
    #[serde(default)]
    pub total_market_value: f64,
    /// Most recent quote timestamp seen (market basis only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    pub items: Vec<AllocationItem>,
}

/// A single held position inside a summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub shares: f64,
    pub invested: f64,
    pub market_value: f64,
    /// market_value − invested
    pub unrealized_pl: f64,
    pub unrealized_pl_percent: f64,
    pub weight_percent_by_market_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_pl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_pl_percent: Option<f64>,
}

/// Portfolio-level summary with cash-adjusted profit/loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub as_of: DateTime<Utc>,
    pub ref_currency: String,
    pub total_invested: f64,
    pub total_market_value: f64,

    // Cash reconstruction (reference currency)
    pub ending_cash: f64,
    /// deposits − withdrawals + inferred deposits
    pub effective_cash_in: f64,
    pub inferred_deposits: f64,
    /// Historical maximum of net cash contributed
    pub peak_contribution: f64,

    /// total_market_value + ending_cash
    pub equity: f64,
    /// equity − effective_cash_in
    pub unrealized_pl: f64,
    /// unrealized_pl / peak_contribution × 100 (0 when the peak is 0)
    pub unrealized_pl_percent: f64,
    /// unrealized_pl / effective_cash_in × 100 (0 when cash-in is 0)
    pub unrealized_pl_percent_on_cash_in: f64,

    /// Aggregated from per-position daily figures (historical prices)
    pub daily_pl: f64,
    /// daily_pl normalized by yesterday's market value of held positions
    pub daily_pl_percent: f64,

    pub positions: Vec<PositionSummary>,
}

/// One reconstructed cash movement, in the reference currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowEvent {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Output of the cash reconciler: the smallest deposit schedule consistent
/// with a balance that never goes negative.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashReconciliation {
    pub deposits: f64,
    pub withdrawals: f64,
    /// Deposits not present in the log but required to avoid a negative balance
    pub inferred: f64,
    pub ending_balance: f64,
    /// deposits − withdrawals + inferred
    pub effective_cash_in: f64,
    pub peak_contribution: f64,
    /// Lowest running balance reached (diagnostic; ≥ 0 after inference)
    pub min_balance: f64,
    pub deposit_events: Vec<CashFlowEvent>,
    pub withdrawal_events: Vec<CashFlowEvent>,
    pub inferred_events: Vec<CashFlowEvent>,
}

/// Parameters for the alternate-instrument backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    /// The alternate instrument, e.g. "VOO"
    pub symbol: String,
    /// Quote currency of the alternate instrument
    pub currency: String,
    #[serde(default)]
    pub basis: PriceBasis,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacktestEventKind {
    Deposit,
    Withdrawal,
}

/// A scheduled cash movement replayed against the alternate instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestEvent {
    pub date: NaiveDate,
    pub kind: BacktestEventKind,
    /// Magnitude in the reference currency
    pub amount: f64,
}

/// Per-event trace emitted when `BacktestRequest::debug` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTraceEntry {
    pub date: NaiveDate,
    pub kind: BacktestEventKind,
    pub amount: f64,
    /// Price the event executed at
    pub price: f64,
    /// Date the price actually comes from (≤ execution date)
    pub price_date: NaiveDate,
    pub shares_delta: f64,
    pub shares_after: f64,
    pub equity_after: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub ref_currency: String,
    pub basis: PriceBasis,
    pub effective_cash_in: f64,
    pub peak_contribution: f64,
    pub final_shares: f64,
    /// Final value of the simulated position, in the reference currency
    pub alt_equity: f64,
    /// alt_equity − effective_cash_in
    pub alt_pl: f64,
    /// alt_pl / peak_contribution × 100 (0 when the peak is 0)
    pub alt_pl_percent: f64,
    /// Most negative peak-to-trough move of the simulated curve (≤ 0)
    pub alt_max_drawdown_percent: f64,
    /// Same measure over the actual portfolio's reconstructed equity curve
    pub portfolio_max_drawdown_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<BacktestTraceEntry>>,
}
