use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// A named group of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    /// Preferred display currency of this portfolio (informational;
    /// analytics normalize into the tracker's reference currency)
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or renaming a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPortfolio {
    pub name: String,
    #[serde(default)]
    pub base_currency: String,
}

impl NewPortfolio {
    pub fn into_domain(
        self,
        id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Portfolio, CoreError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CoreError::ValidationError("name is required".into()));
        }
        Ok(Portfolio {
            id: id.unwrap_or_else(Uuid::new_v4),
            name,
            base_currency: self.base_currency.trim().to_uppercase(),
            created_at: now,
            updated_at: now,
        })
    }
}
