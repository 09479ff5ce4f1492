//! API request/response models for managed accounts.

use super::pagination::Pagination;
use crate::analytics::TrafficSource;
use crate::db::models::accounts::{AccountDBResponse, AccountStatus, AccountTier};
use crate::types::{AccountId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Account request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountCreate {
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub status: Option<AccountStatus>,
    pub tier: Option<AccountTier>,
    pub monthly_revenue: Option<Decimal>,
    pub subscriber_count: Option<i32>,
    /// Plaintext platform session credentials; encrypted before storage
    pub session_credentials: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AccountUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub status: Option<AccountStatus>,
    pub tier: Option<AccountTier>,
    pub monthly_revenue: Option<Decimal>,
    pub subscriber_count: Option<i32>,
    pub session_credentials: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<UserId>,
}

// Account response models. Session credentials never leave the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AccountId,
    pub handle: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub status: AccountStatus,
    pub tier: AccountTier,
    pub monthly_revenue: Decimal,
    pub subscriber_count: i32,
    pub has_session_credentials: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub manager_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AccountDBResponse> for AccountResponse {
    fn from(db: AccountDBResponse) -> Self {
        Self {
            id: db.id,
            handle: db.handle,
            display_name: db.display_name,
            bio: db.bio,
            status: db.status,
            tier: db.tier,
            monthly_revenue: db.monthly_revenue,
            subscriber_count: db.subscriber_count,
            has_session_credentials: db.session_credentials.is_some(),
            manager_id: db.manager_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing accounts
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListAccountsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
    pub status: Option<AccountStatus>,
    pub tier: Option<AccountTier>,
    /// Substring match against handle and display name
    pub search: Option<String>,
}

/// A traffic source visit count supplied by the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrafficSourceInput {
    pub source: String,
    pub visits: i64,
}

/// Recent platform metrics the dashboard supplies for a performance report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PerformanceRequest {
    #[serde(default)]
    pub profile_views: i64,
    #[serde(default)]
    pub interactions: i64,
    #[serde(default)]
    pub posts: i64,
    /// Monthly subscription price used for the earnings estimate
    pub subscription_price: Option<Decimal>,
    /// Visit counts per traffic source
    #[serde(default)]
    pub traffic_sources: Vec<TrafficSourceInput>,
}

/// Computed performance report for a managed account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PerformanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    /// Weighted engagement score, 0-100
    pub engagement_score: f64,
    pub estimated_earnings: Decimal,
    pub traffic: Vec<TrafficSource>,
}
