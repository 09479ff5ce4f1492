//! Authentication and authorization system.
//!
//! # Authentication Methods
//!
//! The gateway accepts two credentials, tried in order:
//!
//! ## 1. API Key Authentication
//!
//! Programmatic access via the `X-API-Key` header. The presented key is
//! hashed (SHA-256) and looked up; revoked and expired keys are rejected
//! before any role or quota logic runs. Non-admin keys consume one unit of a
//! fixed daily quota per request and are automatically deactivated when the
//! quota is exhausted - see [`gateway`].
//!
//! ## 2. Session Authentication
//!
//! Browser and service clients authenticate with a JWT, either as an
//! `Authorization: Bearer` header or a session cookie. Tokens are minted at
//! login and verified locally; the bearer path additionally requires an
//! `admin` grant in the role table before the request proceeds.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor resolving the authenticated identity in handlers
//! - [`gateway`]: API key validation and the daily quota state machine
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Role checks used by handlers
//! - [`session`]: JWT session token creation and verification

pub mod current_user;
pub mod gateway;
pub mod password;
pub mod permissions;
pub mod session;
