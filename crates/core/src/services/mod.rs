pub mod analytics_service;
pub mod backtest_service;
pub mod cash_service;
pub mod currency_service;
pub mod ordering;
pub mod portfolio_service;
pub mod position_service;
pub mod transaction_service;
