pub mod health;
pub mod models;
pub mod rate_limit;
