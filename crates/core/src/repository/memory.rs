use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::portfolio::Portfolio;
use crate::models::transaction::Transaction;

use super::{ListFilter, PortfolioRepository, TransactionRepository, TxSortOrder};

#[derive(Default)]
struct Inner {
    portfolios: HashMap<Uuid, Portfolio>,
    /// portfolio id → transaction id → transaction
    transactions: HashMap<Uuid, HashMap<Uuid, Transaction>>,
}

/// In-memory store implementing both repository ports behind one `RwLock`.
/// Share a single instance (`Arc<MemoryStore>`) as both repositories.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> CoreError {
        CoreError::Serialization("memory store lock poisoned".into())
    }
}

impl PortfolioRepository for MemoryStore {
    fn create(&self, portfolio: Portfolio) -> Result<Portfolio, CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        inner.transactions.entry(portfolio.id).or_default();
        inner.portfolios.insert(portfolio.id, portfolio.clone());
        Ok(portfolio)
    }

    fn get(&self, id: Uuid) -> Result<Portfolio, CoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        inner
            .portfolios
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::PortfolioNotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<Portfolio>, CoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        let mut out: Vec<Portfolio> = inner.portfolios.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    fn update(&self, mut portfolio: Portfolio) -> Result<Portfolio, CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        if !inner.portfolios.contains_key(&portfolio.id) {
            return Err(CoreError::PortfolioNotFound(portfolio.id.to_string()));
        }
        portfolio.updated_at = Utc::now();
        inner.portfolios.insert(portfolio.id, portfolio.clone());
        Ok(portfolio)
    }

    fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        if inner.portfolios.remove(&id).is_none() {
            return Err(CoreError::PortfolioNotFound(id.to_string()));
        }
        inner.transactions.remove(&id);
        Ok(())
    }
}

impl TransactionRepository for MemoryStore {
    fn create(&self, portfolio_id: Uuid, tx: Transaction) -> Result<Transaction, CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        if !inner.portfolios.contains_key(&portfolio_id) {
            return Err(CoreError::PortfolioNotFound(portfolio_id.to_string()));
        }
        inner
            .transactions
            .entry(portfolio_id)
            .or_default()
            .insert(tx.id, tx.clone());
        Ok(tx)
    }

    fn create_batch(
        &self,
        portfolio_id: Uuid,
        txs: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        if !inner.portfolios.contains_key(&portfolio_id) {
            return Err(CoreError::PortfolioNotFound(portfolio_id.to_string()));
        }
        let pool = inner.transactions.entry(portfolio_id).or_default();
        for tx in &txs {
            pool.insert(tx.id, tx.clone());
        }
        Ok(txs)
    }

    fn get(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<Transaction, CoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        let pool = inner
            .transactions
            .get(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        pool.get(&tx_id)
            .cloned()
            .ok_or_else(|| CoreError::TransactionNotFound(tx_id.to_string()))
    }

    fn list(&self, portfolio_id: Uuid, filter: &ListFilter) -> Result<Vec<Transaction>, CoreError> {
        let inner = self.inner.read().map_err(|_| Self::lock_poisoned())?;
        let pool = inner
            .transactions
            .get(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;

        let mut out: Vec<Transaction> = pool
            .values()
            .filter(|tx| match &filter.symbol {
                Some(sym) => tx.symbol.eq_ignore_ascii_case(sym),
                None => true,
            })
            .cloned()
            .collect();

        match filter.sort {
            TxSortOrder::DateAsc => out.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id))),
            TxSortOrder::DateDesc => out.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id))),
            TxSortOrder::Unsorted => out.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        let start = filter.offset.min(out.len());
        let end = if filter.limit > 0 {
            (start + filter.limit).min(out.len())
        } else {
            out.len()
        };
        Ok(out[start..end].to_vec())
    }

    fn update(&self, portfolio_id: Uuid, mut tx: Transaction) -> Result<Transaction, CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        let pool = inner
            .transactions
            .get_mut(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        if !pool.contains_key(&tx.id) {
            return Err(CoreError::TransactionNotFound(tx.id.to_string()));
        }
        tx.updated_at = Utc::now();
        pool.insert(tx.id, tx.clone());
        Ok(tx)
    }

    fn delete(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<(), CoreError> {
        let mut inner = self.inner.write().map_err(|_| Self::lock_poisoned())?;
        let pool = inner
            .transactions
            .get_mut(&portfolio_id)
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.to_string()))?;
        if pool.remove(&tx_id).is_none() {
            return Err(CoreError::TransactionNotFound(tx_id.to_string()));
        }
        Ok(())
    }
}
