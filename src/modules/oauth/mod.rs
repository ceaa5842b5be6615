pub mod controller;
pub mod crud;
pub mod interface;
pub mod model;
pub mod schema;
pub mod service;

pub use service::OAuthService;
