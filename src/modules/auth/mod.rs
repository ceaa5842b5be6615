pub mod controller;
pub mod crud;
pub mod interface;
pub mod model;
pub mod routes;
pub mod schema;
pub mod service;
pub mod tokens;

pub use routes::auth_routes;
pub use service::AuthService;
pub use tokens::TokenMinter;
