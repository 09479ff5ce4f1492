//! DM mirror handlers: conversations and messages under a managed account.

use crate::{
    AppState,
    api::models::{
        Data,
        conversations::{ConversationResponse, ListConversationsQuery, MessageResponse},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    db::handlers::Conversations,
    errors::{Error, Result},
    types::{AccountId, ConversationId, Operation, Resource},
};
use axum::extract::{Json, Path, Query, State};
use tracing::instrument;

/// List an account's mirrored conversations
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/conversations",
    tag = "conversations",
    summary = "List mirrored conversations",
    params(("account_id" = String, Path, description = "Account ID (UUID)"), ListConversationsQuery),
    responses(
        (status = 200, description = "Threads, most recently active first", body = Data<Vec<ConversationResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_conversations(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListConversationsQuery>,
    _current_user: CurrentUser,
) -> Result<Json<Data<Vec<ConversationResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Conversations::new(&mut conn);

    let conversations = repo.list_for_account(account_id, skip, limit).await?;
    Ok(Json(Data::new(conversations.into_iter().map(ConversationResponse::from).collect())))
}

/// List the messages in a conversation
#[utoipa::path(
    get,
    path = "/conversations/{id}/messages",
    tag = "conversations",
    summary = "List a conversation's messages",
    params(("id" = String, Path, description = "Conversation ID (UUID)"), ListConversationsQuery),
    responses(
        (status = 200, description = "Messages, oldest first", body = Data<Vec<MessageResponse>>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Query(query): Query<ListConversationsQuery>,
    _current_user: CurrentUser,
) -> Result<Json<Data<Vec<MessageResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Conversations::new(&mut conn);

    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Conversation".to_string(),
            id: id.to_string(),
        });
    }

    let messages = repo.list_messages(id, skip, limit).await?;
    Ok(Json(Data::new(messages.into_iter().map(MessageResponse::from).collect())))
}

/// Delete a conversation and its messages
#[utoipa::path(
    delete,
    path = "/conversations/{id}",
    tag = "conversations",
    summary = "Delete a conversation",
    params(("id" = String, Path, description = "Conversation ID (UUID)")),
    responses(
        (status = 200, description = "Conversation and its messages deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    current_user: CurrentUser,
) -> Result<Json<Data<serde_json::Value>>> {
    require_admin(&current_user, Resource::Conversations, Operation::DeleteAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Conversations::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::NotFound {
            resource: "Conversation".to_string(),
            id: id.to_string(),
        });
    }

    Ok(Json(Data::new(serde_json::json!({"deleted": true}))))
}
