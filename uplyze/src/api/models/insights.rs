//! API response models for customer insight reports.

use crate::analytics::{ChurnRisk, SpenderTier};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A computed customer insight report.
///
/// Scores are deterministic functions of the inputs echoed alongside them;
/// `narrative` is the only non-deterministic field and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerInsightsResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    // Inputs the scores were computed from
    pub balance: Decimal,
    pub total_spent: Decimal,
    pub purchase_count: i64,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    // Computed scores, each 0-100
    pub spender_score: f64,
    pub spender_tier: SpenderTier,
    pub churn_score: f64,
    pub churn_risk: ChurnRisk,
    /// Optional model-written summary; omitted when disabled or unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// Admin credit grant against a customer's wallet.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GrantCreditsRequest {
    pub amount: Decimal,
    pub description: Option<String>,
}
