pub mod controller;
pub mod events;
pub mod hub;
pub mod routes;
pub mod service;

pub use hub::{ConnectionHandle, Hub, HubError};
pub use routes::realtime_routes;
pub use service::RealtimeService;
