//! API request/response models for DM automation scripts.

use crate::db::models::scripts::{ScriptDBResponse, ScriptStepDBResponse, ScriptStepInput};
use crate::types::{AccountId, ScriptId, ScriptStepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScriptStepCreate {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScriptCreate {
    pub name: String,
    pub trigger_keyword: Option<String>,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub steps: Vec<ScriptStepCreate>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ScriptUpdate {
    pub name: Option<String>,
    pub trigger_keyword: Option<String>,
    pub is_enabled: Option<bool>,
    /// When present, replaces the whole step list
    pub steps: Option<Vec<ScriptStepCreate>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScriptStepResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ScriptStepId,
    pub position: i32,
    pub action: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScriptResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ScriptId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    pub name: String,
    pub trigger_keyword: Option<String>,
    pub is_enabled: bool,
    pub steps: Vec<ScriptStepResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ScriptStepCreate> for ScriptStepInput {
    fn from(step: ScriptStepCreate) -> Self {
        Self {
            action: step.action,
            payload: step.payload,
        }
    }
}

impl From<ScriptStepDBResponse> for ScriptStepResponse {
    fn from(db: ScriptStepDBResponse) -> Self {
        Self {
            id: db.id,
            position: db.position,
            action: db.action,
            payload: db.payload,
        }
    }
}

impl From<ScriptDBResponse> for ScriptResponse {
    fn from(db: ScriptDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            name: db.name,
            trigger_keyword: db.trigger_keyword,
            is_enabled: db.is_enabled,
            steps: db.steps.into_iter().map(ScriptStepResponse::from).collect(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}
