//! API key management handlers, mounted as user sub-resources.
//!
//! The plaintext key is returned exactly once, from the create endpoint.
//! Listings only ever expose the display prefix.

use crate::{
    AppState,
    api::models::{
        Data,
        api_keys::{ApiKeyCreate, ApiKeyCreatedResponse, ApiKeyResponse, ApiKeyUpdate, DEFAULT_RATE_LIMIT_DAILY, ListApiKeysQuery},
        users::CurrentUser,
    },
    auth::permissions::{require_admin, require_self_or_admin},
    crypto,
    db::{
        handlers::{ApiKeys, Repository, api_keys::ApiKeyFilter},
        models::api_keys::{ApiKeyCreateDBRequest, ApiKeyUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{ApiKeyId, Operation, Resource, UserId},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

/// List a user's API keys
#[utoipa::path(
    get,
    path = "/users/{user_id}/api-keys",
    tag = "api-keys",
    summary = "List a user's API keys",
    params(("user_id" = String, Path, description = "User ID (UUID)"), ListApiKeysQuery),
    responses(
        (status = 200, description = "List of API keys (prefixes only)", body = Data<Vec<ApiKeyResponse>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_user_api_keys(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<ListApiKeysQuery>,
    current_user: CurrentUser,
) -> Result<Json<Data<Vec<ApiKeyResponse>>>> {
    require_self_or_admin(&current_user, user_id, Resource::ApiKeys, Operation::ReadAll)?;

    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);

    let keys = repo
        .list(&ApiKeyFilter {
            user_id: Some(user_id),
            skip,
            limit,
        })
        .await?;

    Ok(Json(Data::new(keys.into_iter().map(ApiKeyResponse::from).collect())))
}

/// Grant a new API key to a user
#[utoipa::path(
    post,
    path = "/users/{user_id}/api-keys",
    tag = "api-keys",
    summary = "Grant a new API key",
    params(("user_id" = String, Path, description = "User ID (UUID)")),
    request_body = ApiKeyCreate,
    responses(
        (status = 201, description = "Key created; plaintext shown this once", body = Data<ApiKeyCreatedResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(name = %request.name, admin = request.admin))]
pub async fn create_user_api_key(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    Json(request): Json<ApiKeyCreate>,
) -> Result<(StatusCode, Json<Data<ApiKeyCreatedResponse>>)> {
    // Key grants are an admin action, and only admins may mint admin keys
    require_admin(&current_user, Resource::ApiKeys, Operation::CreateAll)?;

    let plaintext = crypto::generate_api_key(request.admin);
    let db_request = ApiKeyCreateDBRequest {
        user_id,
        name: request.name,
        key_hash: crypto::hash_api_key(&plaintext),
        key_prefix: crypto::display_prefix(&plaintext),
        is_admin: request.admin,
        scopes: request.scopes,
        rate_limit_daily: request.rate_limit_daily.unwrap_or(DEFAULT_RATE_LIMIT_DAILY),
        expires_at: request.expires_at,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);
    let key = repo.create(&db_request).await?;

    Ok((
        StatusCode::CREATED,
        Json(Data::new(ApiKeyCreatedResponse {
            key: plaintext,
            info: ApiKeyResponse::from(key),
        })),
    ))
}

/// Get one API key
#[utoipa::path(
    get,
    path = "/users/{user_id}/api-keys/{id}",
    tag = "api-keys",
    summary = "Get an API key",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("id" = String, Path, description = "API key ID (UUID)"),
    ),
    responses(
        (status = 200, description = "The API key", body = Data<ApiKeyResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Key not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn get_user_api_key(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(UserId, ApiKeyId)>,
    current_user: CurrentUser,
) -> Result<Json<Data<ApiKeyResponse>>> {
    require_self_or_admin(&current_user, user_id, Resource::ApiKeys, Operation::ReadAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);

    let key = repo.get_by_id(id).await?.filter(|key| key.user_id == user_id).ok_or_else(|| Error::NotFound {
        resource: "API key".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(Data::new(ApiKeyResponse::from(key))))
}

/// Update an API key (rename, revoke, reactivate)
#[utoipa::path(
    patch,
    path = "/users/{user_id}/api-keys/{id}",
    tag = "api-keys",
    summary = "Update an API key",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("id" = String, Path, description = "API key ID (UUID)"),
    ),
    request_body = ApiKeyUpdate,
    responses(
        (status = 200, description = "Updated key", body = Data<ApiKeyResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Key not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn update_user_api_key(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(UserId, ApiKeyId)>,
    current_user: CurrentUser,
    Json(request): Json<ApiKeyUpdate>,
) -> Result<Json<Data<ApiKeyResponse>>> {
    // Reactivating a quota-deactivated key is deliberately a manual admin step
    require_admin(&current_user, Resource::ApiKeys, Operation::UpdateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);

    let existing = repo.get_by_id(id).await?.filter(|key| key.user_id == user_id).ok_or_else(|| Error::NotFound {
        resource: "API key".to_string(),
        id: id.to_string(),
    })?;

    let key = repo
        .update(
            existing.id,
            &ApiKeyUpdateDBRequest {
                name: request.name,
                is_active: request.is_active,
                rate_limit_daily: request.rate_limit_daily,
            },
        )
        .await?;

    Ok(Json(Data::new(ApiKeyResponse::from(key))))
}

/// Revoke and delete an API key
#[utoipa::path(
    delete,
    path = "/users/{user_id}/api-keys/{id}",
    tag = "api-keys",
    summary = "Delete an API key",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
        ("id" = String, Path, description = "API key ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Key deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Key not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn delete_user_api_key(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(UserId, ApiKeyId)>,
    current_user: CurrentUser,
) -> Result<Json<Data<serde_json::Value>>> {
    require_self_or_admin(&current_user, user_id, Resource::ApiKeys, Operation::DeleteAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ApiKeys::new(&mut conn);

    let existing = repo.get_by_id(id).await?.filter(|key| key.user_id == user_id).ok_or_else(|| Error::NotFound {
        resource: "API key".to_string(),
        id: id.to_string(),
    })?;

    repo.delete(existing.id).await?;
    Ok(Json(Data::new(serde_json::json!({"deleted": true}))))
}
