pub mod memory;

use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::transaction::Transaction;

/// Sort order for transaction listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxSortOrder {
    #[default]
    Unsorted,
    DateAsc,
    DateDesc,
}

impl TxSortOrder {
    /// Parse the wire value; empty string means unsorted.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_lowercase().as_str() {
            "" => Ok(TxSortOrder::Unsorted),
            "date_asc" => Ok(TxSortOrder::DateAsc),
            "date_desc" => Ok(TxSortOrder::DateDesc),
            other => Err(CoreError::ValidationError(format!(
                "invalid sort {other:?} (use date_asc|date_desc)"
            ))),
        }
    }
}

/// Filtering and paging options for transaction listings.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Case-insensitive symbol filter
    pub symbol: Option<String>,
    /// 0 means unbounded
    pub limit: usize,
    pub offset: usize,
    pub sort: TxSortOrder,
}

impl ListFilter {
    /// Everything, unpaged. Used by the analytics engine to gather a scope.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }
}

/// Durable storage port for portfolios. Any implementation satisfying these
/// contracts works; the crate ships `memory::MemoryStore` for tests and
/// embedders without their own store.
pub trait PortfolioRepository: Send + Sync {
    fn create(&self, portfolio: Portfolio) -> Result<Portfolio, CoreError>;
    fn get(&self, id: Uuid) -> Result<Portfolio, CoreError>;
    fn list(&self) -> Result<Vec<Portfolio>, CoreError>;
    fn update(&self, portfolio: Portfolio) -> Result<Portfolio, CoreError>;
    fn delete(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Durable storage port for transactions, scoped by portfolio.
pub trait TransactionRepository: Send + Sync {
    fn create(&self, portfolio_id: Uuid, tx: Transaction) -> Result<Transaction, CoreError>;
    fn create_batch(
        &self,
        portfolio_id: Uuid,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, CoreError>;
    fn get(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<Transaction, CoreError>;
    fn list(&self, portfolio_id: Uuid, filter: &ListFilter) -> Result<Vec<Transaction>, CoreError>;
    fn update(&self, portfolio_id: Uuid, tx: Transaction) -> Result<Transaction, CoreError>;
    fn delete(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<(), CoreError>;
}
