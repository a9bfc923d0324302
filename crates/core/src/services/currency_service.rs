use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::transaction::Transaction;
use crate::providers::traits::RateSource;
use super::ordering::RateTable;

/// Normalizes amounts into one reference currency.
///
/// Lookup failures never reach the caller: a blank currency, a matching
/// currency, a failed lookup, or a non-positive rate all resolve to 1.0.
/// One instance is built per computation call, carrying that call's
/// reference currency.
pub struct CurrencyService {
    rates: Option<Arc<dyn RateSource>>,
    ref_currency: String,
}

impl CurrencyService {
    pub fn new(rates: Option<Arc<dyn RateSource>>, ref_currency: &str) -> Self {
        Self {
            rates,
            ref_currency: ref_currency.trim().to_uppercase(),
        }
    }

    #[must_use]
    pub fn ref_currency(&self) -> &str {
        &self.ref_currency
    }

    /// Multiplier converting `from` into the reference currency.
    pub async fn rate(&self, from: &str) -> f64 {
        let from = from.trim().to_uppercase();
        if from.is_empty() || from == self.ref_currency {
            return 1.0;
        }
        let Some(source) = &self.rates else {
            return 1.0;
        };
        match source.rate(&from, &self.ref_currency).await {
            Ok((rate, _)) if rate > 0.0 => rate,
            Ok((rate, _)) => {
                warn!(from, to = %self.ref_currency, rate, "non-positive FX rate, falling back to 1.0");
                1.0
            }
            Err(e) => {
                warn!(from, to = %self.ref_currency, error = %e, "FX lookup failed, falling back to 1.0");
                1.0
            }
        }
    }

    /// Resolve one multiplier per distinct transaction currency up front so
    /// the ledger/reconciler folds run synchronously over plain data.
    pub async fn rate_table(&self, txs: &[Transaction]) -> RateTable {
        let mut table = RateTable::new();
        let currencies: HashSet<String> = txs
            .iter()
            .map(|tx| tx.currency.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        for currency in currencies {
            let rate = self.rate(&currency).await;
            debug!(currency, rate, "resolved FX multiplier");
            table.insert(currency, rate);
        }
        table
    }
}
