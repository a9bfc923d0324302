// ═══════════════════════════════════════════════════════════════════
// Analytics Tests — allocation breakdowns, portfolio summaries, and
// currency normalization against mock providers
// ═══════════════════════════════════════════════════════════════════

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::analytics::AllocationBasis;
use portfolio_tracker_core::models::transaction::{TradeType, Transaction};
use portfolio_tracker_core::providers::traits::{
    HistoricalPricingSource, PriceBasis, PricingSource, Quote, RateSource,
};
use portfolio_tracker_core::services::analytics_service::{contract_multiplier, AnalyticsService};
use portfolio_tracker_core::services::currency_service::CurrencyService;

// ═══════════════════════════════════════════════════════════════════
// Mocks
// ═══════════════════════════════════════════════════════════════════

/// Latest prices only; no historical capability.
struct MockPricing {
    prices: HashMap<String, f64>,
}

impl MockPricing {
    fn with(pairs: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            prices: pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
        })
    }
}

#[async_trait]
impl PricingSource for MockPricing {
    fn name(&self) -> &str {
        "mock"
    }

    async fn latest_price(&self, symbol: &str) -> Result<Quote, CoreError> {
        self.prices
            .get(symbol)
            .map(|p| Quote {
                price: *p,
                as_of: Utc::now(),
            })
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                reason: "not in mock".into(),
            })
    }
}

/// Latest prices plus a flat prior-day close per symbol.
struct MockMarket {
    latest: HashMap<String, f64>,
    prior_close: HashMap<String, f64>,
}

impl MockMarket {
    fn with(latest: &[(&str, f64)], prior: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            latest: latest.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            prior_close: prior.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
        })
    }
}

#[async_trait]
impl PricingSource for MockMarket {
    fn name(&self) -> &str {
        "mock-market"
    }

    async fn latest_price(&self, symbol: &str) -> Result<Quote, CoreError> {
        self.latest
            .get(symbol)
            .map(|p| Quote {
                price: *p,
                as_of: Utc::now(),
            })
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                reason: "not in mock".into(),
            })
    }

    fn historical(&self) -> Option<&dyn HistoricalPricingSource> {
        Some(self)
    }
}

#[async_trait]
impl HistoricalPricingSource for MockMarket {
    async fn price_on_or_before(
        &self,
        symbol: &str,
        date: NaiveDate,
        _basis: PriceBasis,
    ) -> Result<(f64, NaiveDate), CoreError> {
        self.prior_close
            .get(symbol)
            .map(|p| (*p, date))
            .ok_or_else(|| CoreError::PriceNotAvailable {
                symbol: symbol.to_string(),
                reason: "no history in mock".into(),
            })
    }
}

struct MockRates {
    // keyed by "FROM->TO"
    rates: HashMap<String, f64>,
}

impl MockRates {
    fn with(pairs: &[(&str, &str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            rates: pairs
                .iter()
                .map(|(f, t, r)| (format!("{f}->{t}"), *r))
                .collect(),
        })
    }
}

#[async_trait]
impl RateSource for MockRates {
    fn name(&self) -> &str {
        "mock-fx"
    }

    async fn rate(&self, from: &str, to: &str) -> Result<(f64, DateTime<Utc>), CoreError> {
        self.rates
            .get(&format!("{from}->{to}"))
            .map(|r| (*r, Utc::now()))
            .ok_or_else(|| CoreError::Api {
                provider: "mock-fx".into(),
                message: format!("no rate {from}->{to}"),
            })
    }
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn tx(
    symbol: &str,
    trade_type: TradeType,
    currency: &str,
    shares: f64,
    total: f64,
    date: &str,
) -> Transaction {
    let now = Utc::now();
    Transaction {
        id: Uuid::new_v4(),
        portfolio_id: Uuid::nil(),
        symbol: symbol.to_string(),
        trade_type,
        currency: currency.to_string(),
        shares,
        unit_price: 0.0,
        fee: 0.0,
        date: day(date),
        total,
        created_at: now,
        updated_at: now,
    }
}

fn usd() -> CurrencyService {
    CurrencyService::new(None, "USD")
}

// ═══════════════════════════════════════════════════════════════════
// Allocations
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn invested_basis_weights_sum_to_one_hundred() {
    let svc = AnalyticsService::new(None);
    let txs = vec![
        tx("AAPL", TradeType::Buy, "USD", 3.0, -300.0, "2025-01-06"),
        tx("MSFT", TradeType::Buy, "USD", 2.0, -700.0, "2025-01-06"),
    ];
    let out = svc
        .allocations(txs, AllocationBasis::Invested, &usd())
        .await
        .unwrap();

    assert_eq!(out.total_invested, 1000.0);
    assert_eq!(out.items.len(), 2);
    // Sorted by weight descending.
    assert_eq!(out.items[0].symbol, "MSFT");
    assert!((out.items[0].weight_percent - 70.0).abs() < 1e-9);
    assert_eq!(out.items[1].symbol, "AAPL");
    assert!((out.items[1].weight_percent - 30.0).abs() < 1e-9);
    let sum: f64 = out.items.iter().map(|i| i.weight_percent).sum();
    assert!((sum - 100.0).abs() < 1e-9);
    assert!(out.as_of.is_none());
}

#[tokio::test]
async fn invested_basis_works_without_any_pricing_source() {
    let svc = AnalyticsService::new(None);
    let txs = vec![tx("AAPL", TradeType::Buy, "USD", 1.0, -100.0, "2025-01-06")];
    let out = svc
        .allocations(txs, AllocationBasis::Invested, &usd())
        .await
        .unwrap();
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].invested, 100.0);
    assert_eq!(out.items[0].market_value, 0.0);
}

#[tokio::test]
async fn invested_basis_drops_fully_liquidated_positions() {
    let svc = AnalyticsService::new(None);
    let txs = vec![
        tx("AAPL", TradeType::Buy, "USD", 10.0, -1000.0, "2025-01-06"),
        tx("AAPL", TradeType::Sell, "USD", 10.0, 1200.0, "2025-01-07"),
        tx("MSFT", TradeType::Buy, "USD", 1.0, -400.0, "2025-01-07"),
    ];
    let out = svc
        .allocations(txs, AllocationBasis::Invested, &usd())
        .await
        .unwrap();
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].symbol, "MSFT");
    assert!((out.items[0].weight_percent - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn market_basis_requires_a_pricing_source() {
    let svc = AnalyticsService::new(None);
    let txs = vec![tx("AAPL", TradeType::Buy, "USD", 1.0, -100.0, "2025-01-06")];
    let err = svc
        .allocations(txs, AllocationBasis::MarketValue, &usd())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoProvider(_)));
}

#[tokio::test]
async fn market_basis_weights_use_current_prices() {
    let pricing = MockPricing::with(&[("AAPL", 200.0), ("MSFT", 100.0)]);
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![
        tx("AAPL", TradeType::Buy, "USD", 3.0, -300.0, "2025-01-06"),
        tx("MSFT", TradeType::Buy, "USD", 2.0, -700.0, "2025-01-06"),
    ];
    let out = svc
        .allocations(txs, AllocationBasis::MarketValue, &usd())
        .await
        .unwrap();

    // 3×200 = 600 vs 2×100 = 200.
    assert_eq!(out.total_market_value, 800.0);
    assert_eq!(out.items[0].symbol, "AAPL");
    assert!((out.items[0].weight_percent - 75.0).abs() < 1e-9);
    assert!((out.items[1].weight_percent - 25.0).abs() < 1e-9);
    assert!(out.as_of.is_some());
    // No historical source, so no daily figures.
    assert!(out.items[0].daily_pl.is_none());
}

#[tokio::test]
async fn market_basis_skips_unpriceable_symbols() {
    let pricing = MockPricing::with(&[("AAPL", 200.0)]);
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![
        tx("AAPL", TradeType::Buy, "USD", 3.0, -300.0, "2025-01-06"),
        tx("OBSCURE", TradeType::Buy, "USD", 2.0, -700.0, "2025-01-06"),
    ];
    let out = svc
        .allocations(txs, AllocationBasis::MarketValue, &usd())
        .await
        .unwrap();
    assert_eq!(out.items.len(), 1);
    assert_eq!(out.items[0].symbol, "AAPL");
    assert!((out.items[0].weight_percent - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn market_basis_carries_daily_figures_when_history_exists() {
    let pricing = MockMarket::with(&[("AAPL", 150.0)], &[("AAPL", 140.0)]);
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![tx("AAPL", TradeType::Buy, "USD", 10.0, -1000.0, "2025-01-06")];
    let out = svc
        .allocations(txs, AllocationBasis::MarketValue, &usd())
        .await
        .unwrap();

    let item = &out.items[0];
    let daily = item.daily_pl.unwrap();
    assert!((daily - 100.0).abs() < 1e-9); // 10 × (150 − 140)
    let pct = item.daily_pl_percent.unwrap();
    assert!((pct - 100.0 / 1400.0 * 100.0).abs() < 1e-9);
}

// ═══════════════════════════════════════════════════════════════════
// Summary
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn summary_requires_a_pricing_source() {
    let svc = AnalyticsService::new(None);
    let err = svc.summary(Vec::new(), &usd()).await.unwrap_err();
    assert!(matches!(err, CoreError::NoProvider(_)));
}

#[tokio::test]
async fn summary_reports_cash_adjusted_pl() {
    let pricing = MockPricing::with(&[("AAPL", 150.0)]);
    let svc = AnalyticsService::new(Some(pricing));
    // Single unfunded buy: the reconciler infers the full 1000.
    let txs = vec![tx("AAPL", TradeType::Buy, "USD", 10.0, -1000.0, "2025-01-06")];
    let out = svc.summary(txs, &usd()).await.unwrap();

    assert_eq!(out.total_invested, 1000.0);
    assert_eq!(out.total_market_value, 1500.0);
    assert_eq!(out.ending_cash, 0.0);
    assert_eq!(out.inferred_deposits, 1000.0);
    assert_eq!(out.effective_cash_in, 1000.0);
    assert_eq!(out.peak_contribution, 1000.0);
    assert_eq!(out.equity, 1500.0);
    assert!((out.unrealized_pl - 500.0).abs() < 1e-9);
    assert!((out.unrealized_pl_percent - 50.0).abs() < 1e-9);
    assert!((out.unrealized_pl_percent_on_cash_in - 50.0).abs() < 1e-9);

    let pos = &out.positions[0];
    assert_eq!(pos.symbol, "AAPL");
    assert!((pos.unrealized_pl - 500.0).abs() < 1e-9);
    assert!((pos.unrealized_pl_percent - 50.0).abs() < 1e-9);
    assert!((pos.weight_percent_by_market_value - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn summary_ending_cash_raises_equity() {
    let pricing = MockPricing::with(&[("AAPL", 100.0)]);
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![
        tx("", TradeType::Cash, "USD", 0.0, 2000.0, "2025-01-06"),
        tx("AAPL", TradeType::Buy, "USD", 10.0, -1000.0, "2025-01-07"),
    ];
    let out = svc.summary(txs, &usd()).await.unwrap();

    assert_eq!(out.ending_cash, 1000.0);
    assert_eq!(out.inferred_deposits, 0.0);
    assert_eq!(out.effective_cash_in, 2000.0);
    assert_eq!(out.equity, 2000.0); // 1000 market + 1000 cash
    assert!(out.unrealized_pl.abs() < 1e-9);
}

#[tokio::test]
async fn summary_aggregates_daily_pl_over_prior_values() {
    let pricing = MockMarket::with(
        &[("AAPL", 150.0), ("MSFT", 99.0)],
        &[("AAPL", 140.0), ("MSFT", 100.0)],
    );
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![
        tx("AAPL", TradeType::Buy, "USD", 10.0, -1000.0, "2025-01-06"),
        tx("MSFT", TradeType::Buy, "USD", 5.0, -450.0, "2025-01-06"),
    ];
    let out = svc.summary(txs, &usd()).await.unwrap();

    // 10×(150−140) + 5×(99−100) = 100 − 5 = 95 over 1400 + 500 prior.
    assert!((out.daily_pl - 95.0).abs() < 1e-9);
    assert!((out.daily_pl_percent - 95.0 / 1900.0 * 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn summary_on_empty_scope_is_all_zeroes() {
    let pricing = MockPricing::with(&[]);
    let svc = AnalyticsService::new(Some(pricing));
    let out = svc.summary(Vec::new(), &usd()).await.unwrap();
    assert_eq!(out.equity, 0.0);
    assert_eq!(out.unrealized_pl, 0.0);
    assert_eq!(out.unrealized_pl_percent, 0.0);
    assert!(out.positions.is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Currency normalization
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn rate_is_identity_for_reference_and_blank_currencies() {
    let currency = CurrencyService::new(None, "TWD");
    assert_eq!(currency.rate("TWD").await, 1.0);
    assert_eq!(currency.rate("twd").await, 1.0);
    assert_eq!(currency.rate("").await, 1.0);
    assert_eq!(currency.rate("USD").await, 1.0); // no source configured
}

#[tokio::test]
async fn rate_falls_back_to_identity_on_lookup_failure() {
    let source = MockRates::with(&[]);
    let currency = CurrencyService::new(Some(source), "TWD");
    assert_eq!(currency.rate("USD").await, 1.0);
}

#[tokio::test]
async fn rate_rejects_non_positive_values() {
    let source = MockRates::with(&[("USD", "TWD", -3.0)]);
    let currency = CurrencyService::new(Some(source), "TWD");
    assert_eq!(currency.rate("USD").await, 1.0);
}

#[tokio::test]
async fn rate_table_resolves_each_distinct_currency_once() {
    let source = MockRates::with(&[("USD", "TWD", 30.0), ("JPY", "TWD", 0.2)]);
    let currency = CurrencyService::new(Some(source), "TWD");
    let txs = vec![
        tx("AAPL", TradeType::Buy, "USD", 1.0, -100.0, "2025-01-06"),
        tx("AAPL", TradeType::Buy, "usd", 1.0, -100.0, "2025-01-07"),
        tx("7203", TradeType::Buy, "JPY", 1.0, -100.0, "2025-01-08"),
    ];
    let table = currency.rate_table(&txs).await;
    assert_eq!(table.len(), 2);
    assert_eq!(table["USD"], 30.0);
    assert_eq!(table["JPY"], 0.2);
}

#[tokio::test]
async fn foreign_invested_is_normalized_into_the_reference_currency() {
    let pricing = MockPricing::with(&[("AAPL", 150.0)]);
    let source = MockRates::with(&[("USD", "TWD", 30.0)]);
    let currency = CurrencyService::new(Some(source), "TWD");
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![tx("AAPL", TradeType::Buy, "USD", 10.0, -1000.0, "2025-01-06")];
    let out = svc.summary(txs, &currency).await.unwrap();

    assert_eq!(out.ref_currency, "TWD");
    assert_eq!(out.total_invested, 30_000.0);
    assert_eq!(out.total_market_value, 45_000.0); // 10 × 150 × 30
    assert!((out.unrealized_pl - 15_000.0).abs() < 1e-9);
}

// ═══════════════════════════════════════════════════════════════════
// Option symbology
// ═══════════════════════════════════════════════════════════════════

#[test]
fn option_symbols_carry_the_contract_multiplier() {
    assert_eq!(contract_multiplier("AAPL240119C00190000"), 100.0);
    assert_eq!(contract_multiplier("SPXW240119P00475000"), 100.0);
    assert_eq!(contract_multiplier("AAPL"), 1.0);
    assert_eq!(contract_multiplier("BHP.AX"), 1.0);
    assert_eq!(contract_multiplier(""), 1.0);
}

#[tokio::test]
async fn option_positions_are_valued_at_one_hundred_times_price() {
    let pricing = MockPricing::with(&[("AAPL240119C00190000", 5.0)]);
    let svc = AnalyticsService::new(Some(pricing));
    let txs = vec![tx(
        "AAPL240119C00190000",
        TradeType::Buy,
        "USD",
        2.0,
        -800.0,
        "2025-01-06",
    )];
    let out = svc
        .allocations(txs, AllocationBasis::MarketValue, &usd())
        .await
        .unwrap();
    // 2 contracts × $5 × 100.
    assert_eq!(out.items[0].market_value, 1000.0);
}
