use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::transaction::{TradeType, Transaction};

/// Pre-resolved FX multipliers into the reference currency, keyed by
/// uppercase currency code. Missing entries mean 1.0 (identity fallback),
/// so the folds below stay pure and infallible.
pub type RateTable = HashMap<String, f64>;

/// Multiplier for one currency: `amount_ref = amount * rate`.
#[must_use]
pub fn rate_of(rates: &RateTable, currency: &str) -> f64 {
    rates
        .get(currency.trim().to_uppercase().as_str())
        .copied()
        .unwrap_or(1.0)
}

/// Signed cash effect of a transaction in the reference currency, computed
/// as if it were the only event that day.
///
/// buy → −|total|·rate; sell/dividend → +|total|·rate; cash → total·rate
/// (the stored sign of `total` only matters for `cash`).
#[must_use]
pub fn cash_delta(tx: &Transaction, rates: &RateTable) -> f64 {
    let rate = rate_of(rates, &tx.currency);
    match tx.trade_type {
        TradeType::Buy => -tx.total.abs() * rate,
        TradeType::Sell | TradeType::Dividend => tx.total.abs() * rate,
        TradeType::Cash => tx.total * rate,
    }
}

/// Deterministic total order over transactions: date ascending, then cash
/// inflows before outflows on the same day, then id.
///
/// Every fold in this crate (position ledger, cash reconciler, backtest)
/// relies on this exact order; same-day inflows must be seen before outflows
/// or the reconciler manufactures spurious inferred deposits.
pub fn sort_chronologically(txs: &mut [Transaction], rates: &RateTable) {
    txs.sort_by(|a, b| compare(a, b, rates));
}

fn compare(a: &Transaction, b: &Transaction, rates: &RateTable) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| flow_rank(a, rates).cmp(&flow_rank(b, rates)))
        .then_with(|| a.id.cmp(&b.id))
}

/// 0 for inflows (delta ≥ 0), 1 for outflows.
fn flow_rank(tx: &Transaction, rates: &RateTable) -> u8 {
    if cash_delta(tx, rates) < 0.0 {
        1
    } else {
        0
    }
}
