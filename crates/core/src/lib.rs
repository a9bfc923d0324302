pub mod errors;
pub mod models;
pub mod providers;
pub mod repository;
pub mod services;

use std::sync::Arc;

use uuid::Uuid;

use errors::CoreError;
use models::{
    analytics::{AllocationBasis, AllocationBreakdown, BacktestRequest, BacktestResult, PortfolioSummary},
    portfolio::{NewPortfolio, Portfolio},
    transaction::{NewTransaction, Transaction},
};
use providers::traits::{PricingSource, RateSource};
use repository::{ListFilter, PortfolioRepository, TransactionRepository};
use services::{
    analytics_service::AnalyticsService, backtest_service::BacktestService,
    currency_service::CurrencyService, portfolio_service::PortfolioService,
    transaction_service::TransactionService,
};

pub use services::transaction_service::Scope;

/// Deployment-level configuration. The reference currency is the single
/// currency all aggregated figures are normalized into; individual analytics
/// calls may override it.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub reference_currency: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reference_currency: "TWD".into(),
        }
    }
}

impl TrackerConfig {
    pub fn new(reference_currency: &str) -> Self {
        let trimmed = reference_currency.trim().to_uppercase();
        Self {
            reference_currency: if trimmed.is_empty() {
                TrackerConfig::default().reference_currency
            } else {
                trimmed
            },
        }
    }
}

/// Main entry point for the portfolio-tracker core library.
///
/// Owns the repositories and collaborator handles; every analytics call
/// builds its own derived state (positions, cash), so concurrent calls on a
/// shared tracker are safe.
pub struct PortfolioTracker {
    portfolios: PortfolioService,
    transactions: TransactionService,
    analytics: AnalyticsService,
    backtests: BacktestService,
    rates: Option<Arc<dyn RateSource>>,
    config: TrackerConfig,
}

impl PortfolioTracker {
    pub fn new(
        portfolio_repo: Arc<dyn PortfolioRepository>,
        transaction_repo: Arc<dyn TransactionRepository>,
        pricing: Option<Arc<dyn PricingSource>>,
        rates: Option<Arc<dyn RateSource>>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            portfolios: PortfolioService::new(portfolio_repo.clone()),
            transactions: TransactionService::new(transaction_repo, portfolio_repo),
            analytics: AnalyticsService::new(pricing.clone()),
            backtests: BacktestService::new(pricing),
            rates,
            config,
        }
    }

    #[must_use]
    pub fn reference_currency(&self) -> &str {
        &self.config.reference_currency
    }

    // ── Portfolio management ────────────────────────────────────────

    pub fn create_portfolio(&self, payload: NewPortfolio) -> Result<Portfolio, CoreError> {
        self.portfolios.create(payload)
    }

    pub fn get_portfolio(&self, id: Uuid) -> Result<Portfolio, CoreError> {
        self.portfolios.get(id)
    }

    pub fn list_portfolios(&self) -> Result<Vec<Portfolio>, CoreError> {
        self.portfolios.list()
    }

    pub fn update_portfolio(&self, id: Uuid, payload: NewPortfolio) -> Result<Portfolio, CoreError> {
        self.portfolios.update(id, payload)
    }

    pub fn delete_portfolio(&self, id: Uuid) -> Result<(), CoreError> {
        self.portfolios.delete(id)
    }

    // ── Transaction management ──────────────────────────────────────

    pub fn add_transaction(
        &self,
        portfolio_id: Uuid,
        payload: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        self.transactions.create_one(portfolio_id, payload)
    }

    /// Add a batch atomically: if any payload fails validation, none are stored.
    pub fn add_transactions(
        &self,
        portfolio_id: Uuid,
        payloads: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, CoreError> {
        self.transactions.create_batch(portfolio_id, payloads)
    }

    pub fn get_transaction(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<Transaction, CoreError> {
        self.transactions.get(portfolio_id, tx_id)
    }

    pub fn list_transactions(
        &self,
        portfolio_id: Uuid,
        filter: &ListFilter,
    ) -> Result<Vec<Transaction>, CoreError> {
        self.transactions.list(portfolio_id, filter)
    }

    pub fn update_transaction(
        &self,
        portfolio_id: Uuid,
        tx_id: Uuid,
        payload: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        self.transactions.update(portfolio_id, tx_id, payload)
    }

    pub fn delete_transaction(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<(), CoreError> {
        self.transactions.delete(portfolio_id, tx_id)
    }

    // ── Analytics ───────────────────────────────────────────────────

    /// Allocation breakdown in the configured reference currency.
    pub async fn allocations(
        &self,
        scope: Scope,
        basis: AllocationBasis,
    ) -> Result<AllocationBreakdown, CoreError> {
        self.allocations_in(scope, basis, &self.config.reference_currency)
            .await
    }

    /// Allocation breakdown with a per-call reference-currency override.
    pub async fn allocations_in(
        &self,
        scope: Scope,
        basis: AllocationBasis,
        reference_currency: &str,
    ) -> Result<AllocationBreakdown, CoreError> {
        let txs = self.transactions.collect_scope(scope)?;
        let currency = self.currency(reference_currency);
        self.analytics.allocations(txs, basis, &currency).await
    }

    /// Summary with unrealized, cash-adjusted, and daily P&L.
    pub async fn summary(&self, scope: Scope) -> Result<PortfolioSummary, CoreError> {
        self.summary_in(scope, &self.config.reference_currency).await
    }

    pub async fn summary_in(
        &self,
        scope: Scope,
        reference_currency: &str,
    ) -> Result<PortfolioSummary, CoreError> {
        let txs = self.transactions.collect_scope(scope)?;
        let currency = self.currency(reference_currency);
        self.analytics.summary(txs, &currency).await
    }

    /// What if the same cash contributions had bought a single alternate
    /// instrument instead?
    pub async fn backtest(
        &self,
        scope: Scope,
        request: BacktestRequest,
    ) -> Result<BacktestResult, CoreError> {
        self.backtest_in(scope, request, &self.config.reference_currency)
            .await
    }

    pub async fn backtest_in(
        &self,
        scope: Scope,
        request: BacktestRequest,
        reference_currency: &str,
    ) -> Result<BacktestResult, CoreError> {
        let txs = self.transactions.collect_scope(scope)?;
        let currency = self.currency(reference_currency);
        self.backtests.run(txs, &request, &currency).await
    }

    // ── Internal ────────────────────────────────────────────────────

    fn currency(&self, reference_currency: &str) -> CurrencyService {
        CurrencyService::new(self.rates.clone(), reference_currency)
    }
}
