pub mod admin;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pagination;
pub mod service;
pub mod stats;
pub mod store;

pub use api::{map_routes, AppState, SharedState};
pub use store::Store;
