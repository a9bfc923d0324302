use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::portfolio::{NewPortfolio, Portfolio};
use crate::repository::PortfolioRepository;

/// Repository-backed portfolio CRUD.
pub struct PortfolioService {
    repo: Arc<dyn PortfolioRepository>,
}

impl PortfolioService {
    pub fn new(repo: Arc<dyn PortfolioRepository>) -> Self {
        Self { repo }
    }

    pub fn create(&self, payload: NewPortfolio) -> Result<Portfolio, CoreError> {
        let portfolio = payload.into_domain(None, Utc::now())?;
        self.repo.create(portfolio)
    }

    pub fn get(&self, id: Uuid) -> Result<Portfolio, CoreError> {
        self.repo.get(id)
    }

    pub fn list(&self) -> Result<Vec<Portfolio>, CoreError> {
        self.repo.list()
    }

    /// Replace name/base currency; `created_at` is preserved.
    pub fn update(&self, id: Uuid, payload: NewPortfolio) -> Result<Portfolio, CoreError> {
        let existing = self.repo.get(id)?;
        let mut portfolio = payload.into_domain(Some(id), Utc::now())?;
        portfolio.created_at = existing.created_at;
        self.repo.update(portfolio)
    }

    pub fn delete(&self, id: Uuid) -> Result<(), CoreError> {
        self.repo.delete(id)
    }
}
