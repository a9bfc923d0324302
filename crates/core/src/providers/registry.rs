use async_trait::async_trait;
use tracing::warn;

use crate::errors::CoreError;
use super::alphavantage::AlphaVantageProvider;
use super::traits::{HistoricalPricingSource, PricingSource, Quote};
use super::yahoo::YahooProvider;

/// Ordered collection of pricing sources with fallback.
///
/// `latest_price` tries each registered source in order and returns the first
/// success; the historical capability is taken from the first source that has
/// one. New sources can be added without touching existing code.
pub struct PricingRegistry {
    sources: Vec<Box<dyn PricingSource>>,
}

impl PricingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Registry with the default stack: Yahoo (primary, historical-capable),
    /// Alpha Vantage as fallback when an API key is supplied.
    #[must_use]
    pub fn new_with_defaults(alphavantage_key: Option<&str>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(YahooProvider::new()));
        if let Some(key) = alphavantage_key {
            registry.register(Box::new(AlphaVantageProvider::new(key.to_string())));
        }
        registry
    }

    pub fn register(&mut self, source: Box<dyn PricingSource>) {
        self.sources.push(source);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for PricingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PricingSource for PricingRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    async fn latest_price(&self, symbol: &str) -> Result<Quote, CoreError> {
        let mut last_err = CoreError::NoProvider("empty pricing registry".into());
        for source in &self.sources {
            match source.latest_price(symbol).await {
                Ok(quote) => return Ok(quote),
                Err(e) => {
                    warn!(source = source.name(), symbol, error = %e, "pricing source failed, trying next");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn historical(&self) -> Option<&dyn HistoricalPricingSource> {
        self.sources.iter().find_map(|s| s.historical())
    }
}
