//! Database-boundary request/response models.
//!
//! These are the structs repositories accept and return. They deliberately
//! mirror table rows rather than API payloads; the API layer owns the
//! conversion in `crate::api::models`.

pub mod accounts;
pub mod api_keys;
pub mod conversations;
pub mod scripts;
pub mod users;
pub mod wallets;
