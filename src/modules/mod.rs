pub mod auth;
pub mod messaging;
pub mod metrics;
pub mod oauth;
pub mod realtime;
pub mod users;
