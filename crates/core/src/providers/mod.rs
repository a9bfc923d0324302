pub mod registry;
pub mod traits;

// API provider implementations
pub mod alphavantage;
pub mod yahoo;
pub mod yahoo_fx;
