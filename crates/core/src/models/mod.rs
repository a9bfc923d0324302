pub mod analytics;
pub mod portfolio;
pub mod transaction;
