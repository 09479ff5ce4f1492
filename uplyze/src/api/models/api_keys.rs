//! API request/response models for API keys.

use super::pagination::Pagination;
use crate::db::models::api_keys::ApiKeyDBResponse;
use crate::types::{ApiKeyId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default stored daily limit when a grant does not specify one.
///
/// Stored for the dashboard only - the gateway applies the configured global
/// cap to every non-admin key regardless of this field.
pub const DEFAULT_RATE_LIMIT_DAILY: i32 = 10_000;

// API Key request models.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreate {
    pub name: String,
    /// Mint an administrative key (admin prefix, exempt from the daily quota)
    #[serde(default)]
    pub admin: bool,
    /// Scope labels attached to the key
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Stored daily limit (defaults to 10000; not enforced by the gateway)
    pub rate_limit_daily: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

// API Key update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
    /// Reactivate (or revoke) the key
    pub is_active: Option<bool>,
    pub rate_limit_daily: Option<i32>,
}

/// API key as listed - the secret is never shown again after creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApiKeyId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub name: String,
    pub key_prefix: String,
    pub is_admin: bool,
    pub scopes: Vec<String>,
    pub rate_limit_daily: i32,
    pub requests_today: i32,
    pub requests_total: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Creation response: the one time the plaintext key is visible.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreatedResponse {
    pub key: String,
    #[serde(flatten)]
    pub info: ApiKeyResponse,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListApiKeysQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

impl From<ApiKeyDBResponse> for ApiKeyResponse {
    fn from(db: ApiKeyDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            name: db.name,
            key_prefix: db.key_prefix,
            is_admin: db.is_admin,
            scopes: db.scopes,
            rate_limit_daily: db.rate_limit_daily,
            requests_today: db.requests_today,
            requests_total: db.requests_total,
            last_used_at: db.last_used_at,
            is_active: db.is_active,
            expires_at: db.expires_at,
            created_at: db.created_at,
        }
    }
}
