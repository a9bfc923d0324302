use thiserror::Error;

/// Unified error type for the entire portfolio-tracker-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Not found (404-class) ───────────────────────────────────────
    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Price not available for {symbol}: {reason}")]
    PriceNotAvailable { symbol: String, reason: String },

    // ── Invalid input (400-class) ───────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ── Collaborator / configuration ────────────────────────────────
    #[error("No pricing source configured ({0})")]
    NoProvider(String),

    #[error("API error ({provider}): {message}")]
    Api { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Sanitize error message: strip query parameters from URLs to prevent
        // API key leakage. reqwest errors often contain full URLs with secrets.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl CoreError {
    /// `true` for errors that map to a missing resource rather than a
    /// bad request or a failed collaborator.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::PortfolioNotFound(_)
                | CoreError::TransactionNotFound(_)
                | CoreError::PriceNotAvailable { .. }
        )
    }
}
