//! Axum route handlers for the admin API.

pub mod accounts;
pub mod api_keys;
pub mod auth;
pub mod conversations;
pub mod graph;
pub mod insights;
pub mod leads;
pub mod scripts;
pub mod transactions;
pub mod users;
