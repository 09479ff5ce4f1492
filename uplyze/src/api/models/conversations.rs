//! API request/response models for the DM mirror.

use super::pagination::Pagination;
use crate::db::models::conversations::{ConversationDBResponse, MessageDBResponse};
use crate::types::{AccountId, ConversationId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ConversationId,
    #[schema(value_type = String, format = "uuid")]
    pub account_id: AccountId,
    pub thread_id: String,
    pub participant: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MessageId,
    #[schema(value_type = String, format = "uuid")]
    pub conversation_id: ConversationId,
    pub sender: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListConversationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

impl From<ConversationDBResponse> for ConversationResponse {
    fn from(db: ConversationDBResponse) -> Self {
        Self {
            id: db.id,
            account_id: db.account_id,
            thread_id: db.thread_id,
            participant: db.participant,
            last_message_at: db.last_message_at,
            created_at: db.created_at,
        }
    }
}

impl From<MessageDBResponse> for MessageResponse {
    fn from(db: MessageDBResponse) -> Self {
        Self {
            id: db.id,
            conversation_id: db.conversation_id,
            sender: db.sender,
            body: db.body,
            sent_at: db.sent_at,
        }
    }
}
