use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::transaction::{NewTransaction, Transaction};
use crate::repository::{ListFilter, PortfolioRepository, TransactionRepository};

/// The transaction set analytics operate on: one portfolio, or the union
/// across all portfolios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Portfolio(Uuid),
    All,
}

/// Repository-backed transaction CRUD plus scope assembly for the engine.
pub struct TransactionService {
    repo_tx: Arc<dyn TransactionRepository>,
    repo_pf: Arc<dyn PortfolioRepository>,
}

impl TransactionService {
    pub fn new(
        repo_tx: Arc<dyn TransactionRepository>,
        repo_pf: Arc<dyn PortfolioRepository>,
    ) -> Self {
        Self { repo_tx, repo_pf }
    }

    pub fn create_one(
        &self,
        portfolio_id: Uuid,
        payload: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        self.repo_pf.get(portfolio_id)?;
        let tx = payload.into_domain(portfolio_id, None, Utc::now())?;
        self.repo_tx.create(portfolio_id, tx)
    }

    /// All-or-nothing: every payload is validated before anything is stored.
    pub fn create_batch(
        &self,
        portfolio_id: Uuid,
        payloads: Vec<NewTransaction>,
    ) -> Result<Vec<Transaction>, CoreError> {
        self.repo_pf.get(portfolio_id)?;
        let now = Utc::now();
        let txs = payloads
            .into_iter()
            .map(|p| p.into_domain(portfolio_id, None, now))
            .collect::<Result<Vec<_>, _>>()?;
        self.repo_tx.create_batch(portfolio_id, txs)
    }

    pub fn get(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<Transaction, CoreError> {
        self.repo_tx.get(portfolio_id, tx_id)
    }

    pub fn list(
        &self,
        portfolio_id: Uuid,
        filter: &ListFilter,
    ) -> Result<Vec<Transaction>, CoreError> {
        self.repo_tx.list(portfolio_id, filter)
    }

    /// Replace an existing transaction; `created_at` is preserved.
    pub fn update(
        &self,
        portfolio_id: Uuid,
        tx_id: Uuid,
        payload: NewTransaction,
    ) -> Result<Transaction, CoreError> {
        let existing = self.repo_tx.get(portfolio_id, tx_id)?;
        let mut tx = payload.into_domain(portfolio_id, Some(tx_id), Utc::now())?;
        tx.created_at = existing.created_at;
        self.repo_tx.update(portfolio_id, tx)
    }

    pub fn delete(&self, portfolio_id: Uuid, tx_id: Uuid) -> Result<(), CoreError> {
        self.repo_tx.delete(portfolio_id, tx_id)
    }

    /// Gather every transaction in a scope, unpaged and unordered — the
    /// engine derives its own chronological order.
    pub fn collect_scope(&self, scope: Scope) -> Result<Vec<Transaction>, CoreError> {
        match scope {
            Scope::Portfolio(id) => {
                self.repo_pf.get(id)?;
                self.repo_tx.list(id, &ListFilter::all())
            }
            Scope::All => {
                let mut all = Vec::new();
                for portfolio in self.repo_pf.list()? {
                    all.extend(self.repo_tx.list(portfolio.id, &ListFilter::all())?);
                }
                Ok(all)
            }
        }
    }
}
