//! Stations Module
//! Mission: Station catalogue, visibility rules and proximity search

pub mod api;
pub mod geo;
pub mod models;
pub mod store;

pub use geo::{find_nearest, format_distance};
pub use models::{GeoPoint, Station, Visibility};
pub use store::StationStore;
