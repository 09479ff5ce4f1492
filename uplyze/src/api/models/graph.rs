//! API request/response models for the Graph proxy.

use crate::graph::GraphAction;
use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A proxied Graph API call: `{action, account_id, params}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GraphProxyRequest {
    pub action: GraphAction,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    #[serde(default)]
    pub params: Value,
}

/// Graph proxy envelope: `{success, data | error}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GraphProxyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphProxyResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}
