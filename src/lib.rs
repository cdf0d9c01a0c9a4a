//! Train Station API Library
//!
//! REST service for train stations, accounts and passenger complaints.
//! The binary in `main.rs` only loads configuration and serves `app::build_router`.

pub mod app;
pub mod auth;
pub mod complaints;
pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod stations;
pub mod users;
pub mod validation;

pub use app::{build_router, AppState};
pub use config::AppConfig;
pub use errors::ApiError;
