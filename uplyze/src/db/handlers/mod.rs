//! Repository implementations for database access.
//!
//! Each repository:
//! - Wraps a SQLx connection
//! - Provides strongly-typed CRUD operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Users`]: User account management and authentication
//! - [`ApiKeys`]: API key storage, lookup by hash and quota accounting
//! - [`Accounts`]: Managed creator accounts
//! - [`Wallets`]: Credit balances and the transaction ledger
//! - [`Conversations`]: Instagram DM mirror (threads + messages)
//! - [`Scripts`]: DM automation scripts and steps

pub mod accounts;
pub mod api_keys;
pub mod conversations;
pub mod repository;
pub mod scripts;
pub mod users;
pub mod wallets;

pub use accounts::Accounts;
pub use api_keys::ApiKeys;
pub use conversations::Conversations;
pub use repository::Repository;
pub use scripts::Scripts;
pub use users::Users;
pub use wallets::Wallets;
