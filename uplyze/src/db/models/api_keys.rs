//! Database models for API keys.
//!
//! Only the SHA-256 hash of a key is ever stored; `key_prefix` keeps the
//! leading characters of the plaintext for display in the dashboard.

use crate::types::{ApiKeyId, UserId};
use chrono::{DateTime, NaiveDate, Utc};

/// Database request for creating a new API key
#[derive(Debug, Clone)]
pub struct ApiKeyCreateDBRequest {
    pub user_id: UserId,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub is_admin: bool,
    pub scopes: Vec<String>,
    /// Stored for the dashboard; the gateway enforces the configured global
    /// cap instead (see `GatewayConfig::daily_request_limit`).
    pub rate_limit_daily: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Database request for updating an API key
#[derive(Debug, Clone, Default)]
pub struct ApiKeyUpdateDBRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub rate_limit_daily: Option<i32>,
}

/// Database response for an API key
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyDBResponse {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key_prefix: String,
    pub is_admin: bool,
    pub scopes: Vec<String>,
    pub rate_limit_daily: i32,
    pub requests_today: i32,
    pub quota_date: NaiveDate,
    pub requests_total: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
