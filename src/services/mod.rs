pub mod email;
pub mod hashing;
pub mod identity_provider;
pub mod jwt;
pub mod metrics;
pub mod rate_limit;
pub mod security;
pub mod sweeper;
