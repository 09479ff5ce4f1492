//! API request/response models for marketing lead intake.

use crate::types::LeadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadCreate {
    pub name: String,
    pub email: String,
    pub platform: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LeadResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: LeadId,
    pub name: String,
    pub email: String,
    pub platform: Option<String>,
    pub created_at: DateTime<Utc>,
}
