use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{DateTime, Days, NaiveDate, Utc};
use regex::Regex;
use tracing::warn;

use crate::errors::CoreError;
use crate::models::analytics::{
    AllocationBasis, AllocationBreakdown, AllocationItem, PortfolioSummary, PositionSummary,
};
use crate::models::transaction::Transaction;
use crate::providers::traits::{HistoricalPricingSource, PriceBasis, PricingSource};
use super::cash_service::reconcile_cash;
use super::currency_service::CurrencyService;
use super::ordering::{rate_of, sort_chronologically};
use super::position_service::build_positions;

static OPTION_SYMBOL: OnceLock<Regex> = OnceLock::new();

/// Contract multiplier for a symbol: 100 for standard equity option
/// symbology ({1-6 letters}{6 digits}{C|P}{8 digits}), else 1.
#[must_use]
pub fn contract_multiplier(symbol: &str) -> f64 {
    let pattern = OPTION_SYMBOL.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{1,6}[0-9]{6}[CP][0-9]{8}$").expect("option symbol pattern")
    });
    if pattern.is_match(symbol.trim()) {
        100.0
    } else {
        1.0
    }
}

/// Per-symbol daily figures derived from the prior trading day's close.
struct DailyFigures {
    pl: f64,
    pl_percent: f64,
    /// Yesterday's market value — denominator for the aggregate percentage
    prior_market_value: f64,
}

/// Combines the position ledger with live/historical prices to produce
/// allocation breakdowns and portfolio summaries.
///
/// Per-symbol pricing failures are skipped (one bad quote must not abort a
/// whole breakdown); missing collaborators abort with a typed error.
pub struct AnalyticsService {
    pricing: Option<Arc<dyn PricingSource>>,
}

impl AnalyticsService {
    pub fn new(pricing: Option<Arc<dyn PricingSource>>) -> Self {
        Self { pricing }
    }

    /// Allocation breakdown over a transaction scope.
    pub async fn allocations(
        &self,
        mut txs: Vec<Transaction>,
        basis: AllocationBasis,
        currency: &CurrencyService,
    ) -> Result<AllocationBreakdown, CoreError> {
        let rates = currency.rate_table(&txs).await;
        sort_chronologically(&mut txs, &rates);
        let book = build_positions(&txs, &rates);

        let mut out = AllocationBreakdown {
            basis,
            ref_currency: currency.ref_currency().to_string(),
            total_invested: 0.0,
            total_market_value: 0.0,
            as_of: None,
            items: Vec::with_capacity(book.len()),
        };

        match basis {
            AllocationBasis::Invested => {
                for (symbol, bucket) in &book {
                    if bucket.shares <= 0.0 && bucket.invested_ref == 0.0 {
                        continue;
                    }
                    out.items.push(AllocationItem {
                        symbol: symbol.clone(),
                        shares: bucket.shares,
                        invested: bucket.invested_ref,
                        market_value: 0.0,
                        weight_percent: 0.0,
                        daily_pl: None,
                        daily_pl_percent: None,
                    });
                    out.total_invested += bucket.invested_ref;
                }
                if out.total_invested > 0.0 {
                    for item in &mut out.items {
                        item.weight_percent = item.invested / out.total_invested * 100.0;
                    }
                }
            }

            AllocationBasis::MarketValue => {
                let pricing = self.pricing.as_ref().ok_or_else(|| {
                    CoreError::NoProvider("market_value basis requires a pricing source".into())
                })?;
                let historical = pricing.historical();
                let today = Utc::now().date_naive();

                for (symbol, bucket) in &book {
                    if bucket.shares <= 0.0 {
                        continue;
                    }
                    let quote = match pricing.latest_price(symbol).await {
                        Ok(q) => q,
                        Err(e) => {
                            warn!(symbol, error = %e, "skipping unpriceable symbol");
                            continue;
                        }
                    };
                    let multiplier = contract_multiplier(symbol);
                    let rate = rate_of(&rates, &bucket.last_currency);
                    let market_value = bucket.shares * quote.price * multiplier * rate;

                    let daily = match historical {
                        Some(hist) => {
                            daily_figures(
                                hist,
                                symbol,
                                bucket.shares,
                                quote.price,
                                multiplier,
                                rate,
                                today,
                            )
                            .await
                        }
                        None => None,
                    };

                    out.items.push(AllocationItem {
                        symbol: symbol.clone(),
                        shares: bucket.shares,
                        invested: bucket.invested_ref,
                        market_value,
                        weight_percent: 0.0,
                        daily_pl: daily.as_ref().map(|d| d.pl),
                        daily_pl_percent: daily.as_ref().map(|d| d.pl_percent),
                    });
                    out.total_invested += bucket.invested_ref;
                    out.total_market_value += market_value;
                    out.as_of = Some(out.as_of.map_or(quote.as_of, |t: DateTime<Utc>| t.max(quote.as_of)));
                }
                if out.total_market_value > 0.0 {
                    for item in &mut out.items {
                        item.weight_percent = item.market_value / out.total_market_value * 100.0;
                    }
                }
            }
        }

        out.items.sort_by(|a, b| {
            b.weight_percent
                .partial_cmp(&a.weight_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        Ok(out)
    }

    /// Full summary over a transaction scope: per-position unrealized P&L
    /// plus cash-adjusted portfolio P&L from the reconstructed cash balance.
    pub async fn summary(
        &self,
        mut txs: Vec<Transaction>,
        currency: &CurrencyService,
    ) -> Result<PortfolioSummary, CoreError> {
        let pricing = self
            .pricing
            .as_ref()
            .ok_or_else(|| CoreError::NoProvider("summary requires a pricing source".into()))?;
        let historical = pricing.historical();
        let today = Utc::now().date_naive();

        let rates = currency.rate_table(&txs).await;
        sort_chronologically(&mut txs, &rates);
        let book = build_positions(&txs, &rates);
        let cash = reconcile_cash(&txs, &rates);

        let mut positions = Vec::with_capacity(book.len());
        let mut total_invested = 0.0;
        let mut total_market_value = 0.0;
        let mut daily_pl_total = 0.0;
        let mut prior_market_value_total = 0.0;
        let mut as_of: Option<DateTime<Utc>> = None;

        for (symbol, bucket) in &book {
            if bucket.shares <= 0.0 {
                continue;
            }
            let quote = match pricing.latest_price(symbol).await {
                Ok(q) => q,
                Err(e) => {
                    warn!(symbol, error = %e, "skipping unpriceable symbol");
                    continue;
                }
            };
            let multiplier = contract_multiplier(symbol);
            let rate = rate_of(&rates, &bucket.last_currency);
            let market_value = bucket.shares * quote.price * multiplier * rate;
            let unrealized_pl = market_value - bucket.invested_ref;
            let unrealized_pl_percent = if bucket.invested_ref > 0.0 {
                unrealized_pl / bucket.invested_ref * 100.0
            } else {
                0.0
            };

            let daily = match historical {
                Some(hist) => {
                    daily_figures(hist, symbol, bucket.shares, quote.price, multiplier, rate, today)
                        .await
                }
                None => None,
            };
            if let Some(d) = &daily {
                daily_pl_total += d.pl;
                prior_market_value_total += d.prior_market_value;
            }

            positions.push(PositionSummary {
                symbol: symbol.clone(),
                shares: bucket.shares,
                invested: bucket.invested_ref,
                market_value,
                unrealized_pl,
                unrealized_pl_percent,
                weight_percent_by_market_value: 0.0,
                daily_pl: daily.as_ref().map(|d| d.pl),
                daily_pl_percent: daily.as_ref().map(|d| d.pl_percent),
            });
            total_invested += bucket.invested_ref;
            total_market_value += market_value;
            as_of = Some(as_of.map_or(quote.as_of, |t| t.max(quote.as_of)));
        }

        if total_market_value > 0.0 {
            for p in &mut positions {
                p.weight_percent_by_market_value = p.market_value / total_market_value * 100.0;
            }
        }
        positions.sort_by(|a, b| {
            b.weight_percent_by_market_value
                .partial_cmp(&a.weight_percent_by_market_value)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        let equity = total_market_value + cash.ending_balance;
        let unrealized_pl = equity - cash.effective_cash_in;
        let unrealized_pl_percent = if cash.peak_contribution > 0.0 {
            unrealized_pl / cash.peak_contribution * 100.0
        } else {
            0.0
        };
        let unrealized_pl_percent_on_cash_in = if cash.effective_cash_in > 0.0 {
            unrealized_pl / cash.effective_cash_in * 100.0
        } else {
            0.0
        };
        let daily_pl_percent = if prior_market_value_total > 0.0 {
            daily_pl_total / prior_market_value_total * 100.0
        } else {
            0.0
        };

        Ok(PortfolioSummary {
            as_of: as_of.unwrap_or_else(Utc::now),
            ref_currency: currency.ref_currency().to_string(),
            total_invested,
            total_market_value,
            ending_cash: cash.ending_balance,
            effective_cash_in: cash.effective_cash_in,
            inferred_deposits: cash.inferred,
            peak_contribution: cash.peak_contribution,
            equity,
            unrealized_pl,
            unrealized_pl_percent,
            unrealized_pl_percent_on_cash_in,
            daily_pl: daily_pl_total,
            daily_pl_percent,
            positions,
        })
    }
}

/// Prior-day lookup goes to calendar day − 1; whatever back-fill the
/// historical source applies on weekends/holidays decides the actual bar.
async fn daily_figures(
    historical: &dyn HistoricalPricingSource,
    symbol: &str,
    shares: f64,
    latest_price: f64,
    multiplier: f64,
    rate: f64,
    today: NaiveDate,
) -> Option<DailyFigures> {
    let yesterday = today.checked_sub_days(Days::new(1))?;
    let (prior_price, _) = match historical
        .price_on_or_before(symbol, yesterday, PriceBasis::Close)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            warn!(symbol, error = %e, "no prior-day price, skipping daily P&L");
            return None;
        }
    };
    if prior_price <= 0.0 {
        return None;
    }
    let pl = shares * (latest_price - prior_price) * multiplier * rate;
    let prior_market_value = shares * prior_price * multiplier * rate;
    let pl_percent = if prior_market_value > 0.0 {
        pl / prior_market_value * 100.0
    } else {
        0.0
    };
    Some(DailyFigures {
        pl,
        pl_percent,
        prior_market_value,
    })
}
