// Middleware modules
pub mod permissions_policy;
pub mod rate_limit;
