//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything lives under `/v1` behind the gateway:
//!
//! - **Authentication** (`/v1/auth/*`): Login and logout
//! - **Users** (`/v1/users/*`): User management and API keys
//! - **Accounts** (`/v1/accounts/*`): Managed creator accounts, conversations, scripts
//! - **Transactions** (`/v1/transactions/*`, `/v1/wallets/*`): Credit ledger
//! - **Customers** (`/v1/customers/*`): Insight reports and admin actions
//! - **Graph proxy** (`/v1/graph`): Action dispatch to the Meta Graph API
//! - **Leads** (`/v1/leads`): Public marketing-form intake
//!
//! Success responses wrap their payload as `{"data": ...}`; every error is
//! `{"error": "..."}` (see [`crate::errors`]).
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/docs` when the server is running.

pub mod handlers;
pub mod models;
