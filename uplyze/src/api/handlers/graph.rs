//! Graph proxy handler: `{action, account_id, params}` in, `{success, data | error}` out.
//!
//! Messaging reads additionally refresh the local DM mirror: listed threads
//! are upserted into `conversations` and fetched messages appended, so the
//! dashboard can browse DMs without hitting the Graph API again.

use crate::{
    AppState,
    api::models::{
        graph::{GraphProxyRequest, GraphProxyResponse},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    crypto,
    db::{
        handlers::{Accounts, Conversations, Repository},
        models::conversations::{ConversationUpsertDBRequest, MessageCreateDBRequest},
    },
    errors::{Error, Result},
    graph::GraphAction,
    types::AccountId,
};
use axum::extract::{Json, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

/// Decrypted platform session credentials for a managed account.
#[derive(Debug, Deserialize)]
struct PlatformCredentials {
    ig_user_id: String,
    access_token: String,
}

async fn load_credentials(state: &AppState, account_id: AccountId) -> Result<PlatformCredentials> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut accounts = Accounts::new(&mut conn);

    let account = accounts.get_by_id(account_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Managed account".to_string(),
        id: account_id.to_string(),
    })?;

    let encrypted = account.session_credentials.ok_or_else(|| Error::BadRequest {
        message: "Managed account has no platform session credentials".to_string(),
    })?;
    let key = state.config.credentials_key.as_ref().ok_or_else(|| Error::Internal {
        operation: "decrypt session credentials: credentials_key is not configured".to_string(),
    })?;

    let plaintext = crypto::decrypt_credentials(&encrypted, key)?;
    serde_json::from_slice(&plaintext).map_err(|e| Error::Internal {
        operation: format!("parse session credentials: {e}"),
    })
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Mirror listed conversation threads into the local tables.
async fn sync_conversations(state: &AppState, account_id: AccountId, account_handle: &str, data: &Value) -> Result<()> {
    let Some(items) = data.get("data").and_then(Value::as_array) else {
        return Ok(());
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Conversations::new(&mut conn);

    for item in items {
        let Some(thread_id) = item.get("id").and_then(Value::as_str) else {
            continue;
        };

        // The other side of the thread: first participant that isn't us
        let participant = item
            .get("participants")
            .and_then(|p| p.get("data"))
            .and_then(Value::as_array)
            .and_then(|participants| {
                participants
                    .iter()
                    .filter_map(|p| p.get("username").and_then(Value::as_str))
                    .find(|username| *username != account_handle)
            })
            .unwrap_or("unknown");

        repo.upsert(&ConversationUpsertDBRequest {
            account_id,
            thread_id: thread_id.to_string(),
            participant: participant.to_string(),
            last_message_at: parse_timestamp(item.get("updated_time")),
        })
        .await?;
    }

    Ok(())
}

/// Append fetched thread messages to the mirrored conversation.
async fn sync_messages(state: &AppState, account_id: AccountId, thread_id: &str, data: &Value) -> Result<()> {
    let Some(items) = data.get("data").and_then(Value::as_array) else {
        return Ok(());
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Conversations::new(&mut conn);

    // The thread must have been listed (and mirrored) before its messages
    let conversations = repo.list_for_account(account_id, 0, i64::MAX).await?;
    let Some(conversation) = conversations.into_iter().find(|c| c.thread_id == thread_id) else {
        warn!("Skipping message sync for unmirrored thread {thread_id}");
        return Ok(());
    };

    for item in items {
        let (Some(body), Some(sent_at)) = (
            item.get("message").and_then(Value::as_str),
            parse_timestamp(item.get("created_time")),
        ) else {
            continue;
        };
        let sender = item
            .get("from")
            .and_then(|from| from.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        repo.add_message(&MessageCreateDBRequest {
            conversation_id: conversation.id,
            sender: sender.to_string(),
            body: body.to_string(),
            sent_at,
        })
        .await?;
    }

    Ok(())
}

/// Proxy an action to the Meta Graph API
#[utoipa::path(
    post,
    path = "/graph",
    tag = "graph",
    summary = "Proxy an action to the Graph API",
    request_body = GraphProxyRequest,
    responses(
        (status = 200, description = "Action result: {success, data | error}", body = GraphProxyResponse),
        (status = 400, description = "Unknown action or missing parameters"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(action = ?request.action))]
pub async fn proxy(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<GraphProxyRequest>,
) -> Result<Json<GraphProxyResponse>> {
    require_admin(&current_user, crate::types::Resource::Graph, crate::types::Operation::CreateAll)?;

    let credentials = load_credentials(&state, request.account_id).await?;

    let result = state
        .graph
        .execute(request.action, &credentials.ig_user_id, &credentials.access_token, &request.params)
        .await;

    match result {
        Ok(data) => {
            // Keep the DM mirror fresh on messaging reads; a failed sync is
            // logged but never fails the proxied call
            let sync_result = match request.action {
                GraphAction::ListConversations => {
                    let handle = account_handle(&state, request.account_id).await?;
                    sync_conversations(&state, request.account_id, &handle, &data).await
                }
                GraphAction::GetConversationMessages => {
                    let thread_id = request.params.get("thread_id").and_then(Value::as_str).unwrap_or_default();
                    sync_messages(&state, request.account_id, thread_id, &data).await
                }
                _ => Ok(()),
            };
            if let Err(e) = sync_result {
                warn!("DM mirror sync failed: {e}");
            }

            Ok(Json(GraphProxyResponse::ok(data)))
        }
        // Upstream failures stay inside the proxy envelope
        Err(Error::Upstream { message, .. }) => Ok(Json(GraphProxyResponse::err(message))),
        Err(other) => Err(other),
    }
}

async fn account_handle(state: &AppState, account_id: AccountId) -> Result<String> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut accounts = Accounts::new(&mut conn);
    let account = accounts.get_by_id(account_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Managed account".to_string(),
        id: account_id.to_string(),
    })?;
    Ok(account.handle)
}
