use std::collections::HashMap;

use crate::models::transaction::{TradeType, Transaction};
use super::ordering::{rate_of, RateTable};

/// Per-symbol running state of the average-cost ledger.
/// Scoped to one computation call; never persisted.
#[derive(Debug, Clone, Default)]
pub struct PositionBucket {
    /// Running signed share count. Over-selling may drive this negative;
    /// display layers filter or clamp non-positive positions.
    pub shares: f64,
    /// Cost basis of currently held shares, in the reference currency.
    /// Never negative: a sell that would overshoot clamps it to zero.
    pub invested_ref: f64,
    /// Most recently observed transaction currency for the symbol,
    /// used to pick the FX rate at valuation time.
    pub last_currency: String,
}

impl PositionBucket {
    /// Cost per share of the current position (0 when nothing is held).
    #[must_use]
    pub fn average_cost(&self) -> f64 {
        if self.shares > 0.0 {
            self.invested_ref / self.shares
        } else {
            0.0
        }
    }
}

/// Apply one transaction to the book. The caller must feed transactions in
/// chronological order (see `ordering::sort_chronologically`).
pub fn apply_transaction(
    book: &mut HashMap<String, PositionBucket>,
    tx: &Transaction,
    rates: &RateTable,
) {
    if tx.trade_type == TradeType::Cash {
        return;
    }
    let bucket = book.entry(tx.symbol.clone()).or_default();
    if !tx.currency.trim().is_empty() {
        bucket.last_currency = tx.currency.trim().to_uppercase();
    }
    match tx.trade_type {
        TradeType::Buy => {
            bucket.shares += tx.shares;
            bucket.invested_ref += tx.total.abs() * rate_of(rates, &tx.currency);
        }
        TradeType::Sell => {
            let avg_cost = bucket.average_cost();
            let sold = tx.shares.min(bucket.shares.max(0.0));
            bucket.invested_ref = (bucket.invested_ref - avg_cost * sold).max(0.0);
            bucket.shares -= tx.shares;
        }
        // Cash-only event; the reconciler handles it.
        TradeType::Dividend => {}
        TradeType::Cash => unreachable!("cash filtered above"),
    }
}

/// Fold a chronologically ordered transaction stream into per-symbol
/// positions under the average-cost model.
///
/// A sell reduces invested capital proportionally to the fraction of the
/// position liquidated — no FIFO/LIFO lot matching, no realized-gain
/// tracking. Dividends and cash movements never touch the ledger.
#[must_use]
pub fn build_positions(
    ordered: &[Transaction],
    rates: &RateTable,
) -> HashMap<String, PositionBucket> {
    let mut book: HashMap<String, PositionBucket> = HashMap::new();
    for tx in ordered {
        apply_transaction(&mut book, tx, rates);
    }
    book
}
