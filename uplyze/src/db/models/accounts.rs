//! Database models for managed accounts.

use crate::types::{AccountId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of a managed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Paused,
    Inactive,
    Onboarding,
}

/// Service tier of a managed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[sqlx(type_name = "account_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    Standard,
    Premium,
    Elite,
}

/// Database request for creating a managed account
#[derive(Debug, Clone)]
pub struct AccountCreateDBRequest {
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub status: AccountStatus,
    pub tier: AccountTier,
    pub monthly_revenue: Decimal,
    pub subscriber_count: i32,
    /// Already encrypted; repositories never see plaintext credentials.
    pub session_credentials: Option<String>,
    pub manager_id: Option<UserId>,
}

/// Database request for updating a managed account
#[derive(Debug, Clone, Default)]
pub struct AccountUpdateDBRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub status: Option<AccountStatus>,
    pub tier: Option<AccountTier>,
    pub monthly_revenue: Option<Decimal>,
    pub subscriber_count: Option<i32>,
    pub session_credentials: Option<String>,
    pub manager_id: Option<UserId>,
}

/// Database response for a managed account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountDBResponse {
    pub id: AccountId,
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub status: AccountStatus,
    pub tier: AccountTier,
    pub monthly_revenue: Decimal,
    pub subscriber_count: i32,
    pub session_credentials: Option<String>,
    pub manager_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for listing managed accounts
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub status: Option<AccountStatus>,
    pub tier: Option<AccountTier>,
    /// Case-insensitive substring match against handle and display name
    pub search: Option<String>,
    pub skip: i64,
    pub limit: i64,
}
