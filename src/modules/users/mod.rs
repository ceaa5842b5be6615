pub mod controller;
pub mod crud;
pub mod interface;
pub mod routes;
pub mod schema;
pub mod service;

pub use routes::user_routes;
pub use service::UserService;
