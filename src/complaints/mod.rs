//! Complaints Module
//! Mission: Passenger complaints, filed by users and reviewed by admins

pub mod api;
pub mod models;
pub mod store;

pub use models::Complaint;
pub use store::ComplaintStore;
