//! Database models for DM automation scripts.

use crate::types::{AccountId, ScriptId, ScriptStepId};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A step inside a create/replace request. Position is assigned from the
/// step's index in the submitted list.
#[derive(Debug, Clone)]
pub struct ScriptStepInput {
    pub action: String,
    pub payload: Value,
}

/// Database request for creating a script with its steps
#[derive(Debug, Clone)]
pub struct ScriptCreateDBRequest {
    pub account_id: AccountId,
    pub name: String,
    pub trigger_keyword: Option<String>,
    pub is_enabled: bool,
    pub steps: Vec<ScriptStepInput>,
}

/// Database request for updating a script. When `steps` is present the whole
/// step list is replaced.
#[derive(Debug, Clone, Default)]
pub struct ScriptUpdateDBRequest {
    pub name: Option<String>,
    pub trigger_keyword: Option<String>,
    pub is_enabled: Option<bool>,
    pub steps: Option<Vec<ScriptStepInput>>,
}

/// Database response for a script (steps fetched alongside)
#[derive(Debug, Clone)]
pub struct ScriptDBResponse {
    pub id: ScriptId,
    pub account_id: AccountId,
    pub name: String,
    pub trigger_keyword: Option<String>,
    pub is_enabled: bool,
    pub steps: Vec<ScriptStepDBResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database response for a script step
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScriptStepDBResponse {
    pub id: ScriptStepId,
    pub script_id: ScriptId,
    pub position: i32,
    pub action: String,
    pub payload: Value,
}
