//! DM automation script handlers under a managed account.

use crate::{
    AppState,
    api::models::{
        Data,
        conversations::ListConversationsQuery,
        scripts::{ScriptCreate, ScriptResponse, ScriptUpdate},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    db::{
        handlers::Scripts,
        models::scripts::{ScriptCreateDBRequest, ScriptUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{AccountId, Operation, Resource, ScriptId},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

/// List an account's scripts
#[utoipa::path(
    get,
    path = "/accounts/{account_id}/scripts",
    tag = "scripts",
    summary = "List automation scripts",
    params(("account_id" = String, Path, description = "Account ID (UUID)"), ListConversationsQuery),
    responses(
        (status = 200, description = "Scripts with their steps", body = Data<Vec<ScriptResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_scripts(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<ListConversationsQuery>,
    _current_user: CurrentUser,
) -> Result<Json<Data<Vec<ScriptResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Scripts::new(&mut conn);

    let scripts = repo.list_for_account(account_id, skip, limit).await?;
    Ok(Json(Data::new(scripts.into_iter().map(ScriptResponse::from).collect())))
}

/// Create a script with its steps
#[utoipa::path(
    post,
    path = "/accounts/{account_id}/scripts",
    tag = "scripts",
    summary = "Create an automation script",
    params(("account_id" = String, Path, description = "Account ID (UUID)")),
    request_body = ScriptCreate,
    responses(
        (status = 201, description = "Script created", body = Data<ScriptResponse>),
        (status = 400, description = "Unknown account"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(name = %request.name))]
pub async fn create_script(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    current_user: CurrentUser,
    Json(request): Json<ScriptCreate>,
) -> Result<(StatusCode, Json<Data<ScriptResponse>>)> {
    require_admin(&current_user, Resource::Scripts, Operation::CreateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Scripts::new(&mut conn);

    let script = repo
        .create(&ScriptCreateDBRequest {
            account_id,
            name: request.name,
            trigger_keyword: request.trigger_keyword,
            is_enabled: request.is_enabled,
            steps: request.steps.into_iter().map(Into::into).collect(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(Data::new(ScriptResponse::from(script)))))
}

/// Get a script
#[utoipa::path(
    get,
    path = "/scripts/{id}",
    tag = "scripts",
    summary = "Get an automation script",
    params(("id" = String, Path, description = "Script ID (UUID)")),
    responses(
        (status = 200, description = "The script", body = Data<ScriptResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Script not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn get_script(
    State(state): State<AppState>,
    Path(id): Path<ScriptId>,
    _current_user: CurrentUser,
) -> Result<Json<Data<ScriptResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Scripts::new(&mut conn);

    let script = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Script".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(Data::new(ScriptResponse::from(script))))
}

/// Update a script (a present step list replaces all steps)
#[utoipa::path(
    patch,
    path = "/scripts/{id}",
    tag = "scripts",
    summary = "Update an automation script",
    params(("id" = String, Path, description = "Script ID (UUID)")),
    request_body = ScriptUpdate,
    responses(
        (status = 200, description = "Updated script", body = Data<ScriptResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Script not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn update_script(
    State(state): State<AppState>,
    Path(id): Path<ScriptId>,
    current_user: CurrentUser,
    Json(request): Json<ScriptUpdate>,
) -> Result<Json<Data<ScriptResponse>>> {
    require_admin(&current_user, Resource::Scripts, Operation::UpdateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Scripts::new(&mut conn);

    let script = repo
        .update(
            id,
            &ScriptUpdateDBRequest {
                name: request.name,
                trigger_keyword: request.trigger_keyword,
                is_enabled: request.is_enabled,
                steps: request.steps.map(|steps| steps.into_iter().map(Into::into).collect()),
            },
        )
        .await?;

    Ok(Json(Data::new(ScriptResponse::from(script))))
}

/// Delete a script and its steps
#[utoipa::path(
    delete,
    path = "/scripts/{id}",
    tag = "scripts",
    summary = "Delete an automation script",
    params(("id" = String, Path, description = "Script ID (UUID)")),
    responses(
        (status = 200, description = "Script and its steps deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Script not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn delete_script(
    State(state): State<AppState>,
    Path(id): Path<ScriptId>,
    current_user: CurrentUser,
) -> Result<Json<Data<serde_json::Value>>> {
    require_admin(&current_user, Resource::Scripts, Operation::DeleteAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Scripts::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::NotFound {
            resource: "Script".to_string(),
            id: id.to_string(),
        });
    }

    Ok(Json(Data::new(serde_json::json!({"deleted": true}))))
}
