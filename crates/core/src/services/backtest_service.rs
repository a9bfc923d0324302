use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::errors::CoreError;
use crate::models::analytics::{
    BacktestEvent, BacktestEventKind, BacktestRequest, BacktestResult, BacktestTraceEntry,
    CashReconciliation,
};
use crate::models::transaction::Transaction;
use crate::providers::traits::{HistoricalPricingSource, PriceBasis, PricingSource};
use super::analytics_service::contract_multiplier;
use super::cash_service::reconcile_cash;
use super::currency_service::CurrencyService;
use super::ordering::{cash_delta, rate_of, sort_chronologically, RateTable};
use super::position_service::{apply_transaction, PositionBucket};

/// Running peak/drawdown bookkeeping over an equity curve.
///
/// The tracked maximum drawdown is always ≤ 0 and a new peak never shrinks
/// its magnitude.
#[derive(Debug, Default)]
pub struct DrawdownTracker {
    peak: f64,
    max_drawdown_percent: f64,
}

impl DrawdownTracker {
    pub fn observe(&mut self, equity: f64) {
        if equity > self.peak {
            self.peak = equity;
            return;
        }
        if self.peak > 0.0 {
            let drawdown = (equity / self.peak - 1.0) * 100.0;
            if drawdown < self.max_drawdown_percent {
                self.max_drawdown_percent = drawdown;
            }
        }
    }

    #[must_use]
    pub fn max_drawdown_percent(&self) -> f64 {
        self.max_drawdown_percent
    }
}

/// Merge the reconciler's event lists into one replay schedule: chronological,
/// with deposits (inferred ones included) ahead of withdrawals on tied dates.
#[must_use]
pub fn build_schedule(cash: &CashReconciliation) -> Vec<BacktestEvent> {
    let mut schedule: Vec<BacktestEvent> = Vec::with_capacity(
        cash.deposit_events.len() + cash.inferred_events.len() + cash.withdrawal_events.len(),
    );
    for ev in cash.deposit_events.iter().chain(&cash.inferred_events) {
        schedule.push(BacktestEvent {
            date: ev.date,
            kind: BacktestEventKind::Deposit,
            amount: ev.amount,
        });
    }
    for ev in &cash.withdrawal_events {
        schedule.push(BacktestEvent {
            date: ev.date,
            kind: BacktestEventKind::Withdrawal,
            amount: ev.amount,
        });
    }
    schedule.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
    });
    schedule
}

fn kind_rank(kind: BacktestEventKind) -> u8 {
    match kind {
        BacktestEventKind::Deposit => 0,
        BacktestEventKind::Withdrawal => 1,
    }
}

/// Replays a portfolio's cash-flow schedule as purchases/sales of a single
/// alternate instrument and compares drawdowns against the real holdings.
pub struct BacktestService {
    pricing: Option<Arc<dyn PricingSource>>,
}

struct Simulation {
    shares: f64,
    drawdown: DrawdownTracker,
    trace: Vec<BacktestTraceEntry>,
}

impl BacktestService {
    pub fn new(pricing: Option<Arc<dyn PricingSource>>) -> Self {
        Self { pricing }
    }

    pub async fn run(
        &self,
        mut txs: Vec<Transaction>,
        req: &BacktestRequest,
        currency: &CurrencyService,
    ) -> Result<BacktestResult, CoreError> {
        let pricing = self
            .pricing
            .as_ref()
            .ok_or_else(|| CoreError::NoProvider("backtest requires a pricing source".into()))?;
        let historical = pricing.historical();

        let rates = currency.rate_table(&txs).await;
        sort_chronologically(&mut txs, &rates);
        let cash = reconcile_cash(&txs, &rates);
        let schedule = build_schedule(&cash);

        let alt_symbol = req.symbol.trim().to_uppercase();
        let multiplier = contract_multiplier(&alt_symbol);
        // Quote-currency multiplier for the alternate instrument; deposits
        // arrive in the reference currency and buy in the quote currency.
        let alt_rate = currency.rate(&req.currency).await;
        let today = Utc::now().date_naive();

        let mut sim = match historical {
            Some(hist) => {
                self.replay_daily(hist, &schedule, &alt_symbol, req.basis, multiplier, alt_rate, today)
                    .await
            }
            None => {
                debug!("no historical pricing capability, falling back to current-price replay");
                self.replay_coarse(pricing.as_ref(), &schedule, &alt_symbol, multiplier, alt_rate)
                    .await?
            }
        };

        // The final mark requires a resolvable current price.
        let latest = pricing.latest_price(&alt_symbol).await?;
        let alt_equity = sim.shares * latest.price * multiplier * alt_rate;
        sim.drawdown.observe(alt_equity);

        let alt_pl = alt_equity - cash.effective_cash_in;
        let alt_pl_percent = if cash.peak_contribution > 0.0 {
            alt_pl / cash.peak_contribution * 100.0
        } else {
            0.0
        };

        let portfolio_max_drawdown_percent = match historical {
            Some(hist) => {
                portfolio_drawdown(hist, &txs, &rates, req.basis, today).await
            }
            None => 0.0,
        };

        Ok(BacktestResult {
            symbol: alt_symbol,
            ref_currency: currency.ref_currency().to_string(),
            basis: req.basis,
            effective_cash_in: cash.effective_cash_in,
            peak_contribution: cash.peak_contribution,
            final_shares: sim.shares,
            alt_equity,
            alt_pl,
            alt_pl_percent,
            alt_max_drawdown_percent: sim.drawdown.max_drawdown_percent(),
            portfolio_max_drawdown_percent,
            trace: if req.debug { Some(sim.trace) } else { None },
        })
    }

    /// Day-by-day replay from the earliest event through today. Days without
    /// a bar are skipped; their pending events execute on the next priced
    /// day (a weekend deposit buys at Monday's bar).
    async fn replay_daily(
        &self,
        hist: &dyn HistoricalPricingSource,
        schedule: &[BacktestEvent],
        symbol: &str,
        basis: PriceBasis,
        multiplier: f64,
        alt_rate: f64,
        today: NaiveDate,
    ) -> Simulation {
        let mut sim = Simulation {
            shares: 0.0,
            drawdown: DrawdownTracker::default(),
            trace: Vec::new(),
        };
        let Some(first) = schedule.first() else {
            return sim;
        };

        let mut next_event = 0;
        let mut day = first.date;
        while day <= today {
            let price = match hist.price_on_or_before(symbol, day, basis).await {
                Ok((p, bar_date)) if bar_date == day => p,
                Ok(_) => {
                    day = match day.checked_add_days(Days::new(1)) {
                        Some(d) => d,
                        None => break,
                    };
                    continue; // no bar for this exact day
                }
                Err(e) => {
                    debug!(symbol, %day, error = %e, "no price, skipping day");
                    day = match day.checked_add_days(Days::new(1)) {
                        Some(d) => d,
                        None => break,
                    };
                    continue;
                }
            };

            while next_event < schedule.len() && schedule[next_event].date <= day {
                let ev = &schedule[next_event];
                apply_event(&mut sim, ev, price, day, multiplier, alt_rate);
                next_event += 1;
            }

            let equity = sim.shares * price * multiplier * alt_rate;
            sim.drawdown.observe(equity);

            day = match day.checked_add_days(Days::new(1)) {
                Some(d) => d,
                None => break,
            };
        }
        sim
    }

    /// Degraded path without a historical source: every event executes at
    /// the single current price. Coarse, but explicit rather than a silent
    /// skip.
    async fn replay_coarse(
        &self,
        pricing: &dyn PricingSource,
        schedule: &[BacktestEvent],
        symbol: &str,
        multiplier: f64,
        alt_rate: f64,
    ) -> Result<Simulation, CoreError> {
        let mut sim = Simulation {
            shares: 0.0,
            drawdown: DrawdownTracker::default(),
            trace: Vec::new(),
        };
        if schedule.is_empty() {
            return Ok(sim);
        }
        let quote = pricing.latest_price(symbol).await?;
        let price_date = quote.as_of.date_naive();
        for ev in schedule {
            apply_event(&mut sim, ev, quote.price, price_date, multiplier, alt_rate);
        }
        Ok(sim)
    }
}

fn apply_event(
    sim: &mut Simulation,
    ev: &BacktestEvent,
    price: f64,
    price_date: NaiveDate,
    multiplier: f64,
    alt_rate: f64,
) {
    if price <= 0.0 {
        return;
    }
    // Convert the reference-currency amount into the instrument's quote
    // currency before sizing the order.
    let amount_quote = if alt_rate > 0.0 { ev.amount / alt_rate } else { ev.amount };
    let qty = amount_quote / (price * multiplier);
    let shares_delta = match ev.kind {
        BacktestEventKind::Deposit => qty,
        BacktestEventKind::Withdrawal => -qty.min(sim.shares),
    };
    sim.shares = (sim.shares + shares_delta).max(0.0);
    let equity_after = sim.shares * price * multiplier * alt_rate;
    sim.trace.push(BacktestTraceEntry {
        date: ev.date,
        kind: ev.kind,
        amount: ev.amount,
        price,
        price_date,
        shares_delta,
        shares_after: sim.shares,
        equity_after,
    });
}

/// Recompute the actual portfolio's equity curve day by day — holdings at
/// historical prices plus the reconstructed cash balance, inferred deposits
/// injected with the same pre-check rule — and return its maximum drawdown.
async fn portfolio_drawdown(
    hist: &dyn HistoricalPricingSource,
    ordered: &[Transaction],
    rates: &RateTable,
    basis: PriceBasis,
    today: NaiveDate,
) -> f64 {
    let Some(first) = ordered.first() else {
        return 0.0;
    };

    let mut drawdown = DrawdownTracker::default();
    let mut book: HashMap<String, PositionBucket> = HashMap::new();
    let mut balance = 0.0_f64;
    let mut next_tx = 0;
    let mut day = first.date;

    while day <= today {
        while next_tx < ordered.len() && ordered[next_tx].date <= day {
            let tx = &ordered[next_tx];
            let delta = cash_delta(tx, rates);
            if balance + delta < 0.0 {
                balance += -(balance + delta); // inferred top-up
            }
            balance += delta;
            apply_transaction(&mut book, tx, rates);
            next_tx += 1;
        }

        let mut equity = balance;
        let mut priced_any = false;
        for (symbol, bucket) in &book {
            if bucket.shares <= 0.0 {
                continue;
            }
            match hist.price_on_or_before(symbol, day, basis).await {
                Ok((price, _)) => {
                    equity +=
                        bucket.shares * price * contract_multiplier(symbol)
                            * rate_of(rates, &bucket.last_currency);
                    priced_any = true;
                }
                Err(e) => {
                    warn!(symbol, %day, error = %e, "no historical price for holding, skipping symbol");
                }
            }
        }
        if priced_any || book.values().all(|b| b.shares <= 0.0) {
            drawdown.observe(equity);
        }

        day = match day.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => break,
        };
    }

    drawdown.max_drawdown_percent()
}
