//! User management handlers. Collection operations are admin only.

use crate::{
    AppState,
    api::models::{
        Data,
        users::{CurrentUser, ListUsersQuery, Role, UserCreate, UserResponse, UserUpdate},
    },
    auth::{password, permissions::require_admin},
    db::{
        handlers::{Repository, Users, users::UserFilter},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, Resource, UserId},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "List of users", body = Data<Vec<UserResponse>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    current_user: CurrentUser,
) -> Result<Json<Data<Vec<UserResponse>>>> {
    require_admin(&current_user, Resource::Users, Operation::ReadAll)?;

    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let users = repo.list(&UserFilter::new(skip, limit)).await?;
    Ok(Json(Data::new(users.into_iter().map(UserResponse::from).collect())))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create a user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = Data<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 409, description = "Username or email already taken"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(username = %request.username))]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<Data<UserResponse>>)> {
    require_admin(&current_user, Resource::Users, Operation::CreateAll)?;

    let password_hash = match &request.password {
        Some(plaintext) => {
            let rules = &state.config.auth.native.password;
            if plaintext.len() < rules.min_length || plaintext.len() > rules.max_length {
                return Err(Error::BadRequest {
                    message: format!("Password must be between {} and {} characters", rules.min_length, rules.max_length),
                });
            }
            Some(password::hash_string(plaintext)?)
        }
        None => None,
    };

    // The Customer role is guaranteed; Admin in the role list also sets the flag
    let mut roles = if request.roles.is_empty() {
        state.config.auth.default_user_roles.clone()
    } else {
        request.roles.clone()
    };
    if !roles.contains(&Role::Customer) {
        roles.push(Role::Customer);
    }
    let is_admin = roles.contains(&Role::Admin);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let user = repo
        .create(&UserCreateDBRequest {
            username: request.username,
            email: request.email,
            display_name: request.display_name,
            avatar_url: request.avatar_url,
            is_admin,
            roles,
            auth_source: "native".to_string(),
            password_hash,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(Data::new(UserResponse::from(user)))))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get a user",
    params(("id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "The user", body = Data<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Data<UserResponse>>> {
    crate::auth::permissions::require_self_or_admin(&current_user, id, Resource::Users, Operation::ReadAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let user = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(Data::new(UserResponse::from(user))))
}

/// Update a user
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    summary = "Update a user",
    params(("id" = String, Path, description = "User ID (UUID)")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "Updated user", body = Data<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "User not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    Json(request): Json<UserUpdate>,
) -> Result<Json<Data<UserResponse>>> {
    // Role changes are admin territory; profile edits are allowed on self
    if request.roles.is_some() {
        require_admin(&current_user, Resource::Users, Operation::UpdateAll)?;
    } else {
        crate::auth::permissions::require_self_or_admin(&current_user, id, Resource::Users, Operation::UpdateAll)?;
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    let user = repo
        .update(
            id,
            &UserUpdateDBRequest {
                display_name: request.display_name,
                avatar_url: request.avatar_url,
                roles: request.roles,
                password_hash: None,
            },
        )
        .await?;

    Ok(Json(Data::new(UserResponse::from(user))))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete a user",
    params(("id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "User not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Data<serde_json::Value>>> {
    require_admin(&current_user, Resource::Users, Operation::DeleteAll)?;

    if current_user.id == id {
        return Err(Error::BadRequest {
            message: "Cannot delete your own user".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: id.to_string(),
        });
    }

    Ok(Json(Data::new(serde_json::json!({"deleted": true}))))
}
