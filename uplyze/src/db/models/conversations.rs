//! Database models for the Instagram DM mirror.

use crate::types::{AccountId, ConversationId, MessageId};
use chrono::{DateTime, Utc};

/// Upsert request for a mirrored conversation thread.
///
/// The Graph proxy re-syncs threads; (account_id, thread_id) is the identity.
#[derive(Debug, Clone)]
pub struct ConversationUpsertDBRequest {
    pub account_id: AccountId,
    pub thread_id: String,
    pub participant: String,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Database response for a conversation
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationDBResponse {
    pub id: ConversationId,
    pub account_id: AccountId,
    pub thread_id: String,
    pub participant: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Database request for appending a mirrored message
#[derive(Debug, Clone)]
pub struct MessageCreateDBRequest {
    pub conversation_id: ConversationId,
    pub sender: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Database response for a message
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageDBResponse {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
