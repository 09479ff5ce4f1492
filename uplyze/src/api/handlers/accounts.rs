//! Managed account CRM handlers: CRUD, search, status transitions and the
//! computed performance report.

use crate::{
    AppState,
    analytics,
    api::models::{
        Data,
        accounts::{AccountCreate, AccountResponse, AccountUpdate, ListAccountsQuery, PerformanceRequest, PerformanceResponse},
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    crypto,
    db::{
        handlers::{Accounts, Repository},
        models::accounts::{AccountCreateDBRequest, AccountFilter, AccountStatus, AccountTier, AccountUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{AccountId, Operation, Resource},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use tracing::instrument;

/// Encrypt plaintext session credentials under the configured key.
fn encrypt_credentials(state: &AppState, plaintext: Option<String>) -> Result<Option<String>> {
    match plaintext {
        Some(plaintext) => {
            let key = state.config.credentials_key.as_ref().ok_or_else(|| Error::BadRequest {
                message: "Cannot store session credentials: credentials_key is not configured".to_string(),
            })?;
            let encrypted = crypto::encrypt_credentials(plaintext.as_bytes(), key)?;
            Ok(Some(encrypted))
        }
        None => Ok(None),
    }
}

/// List managed accounts with filters and search
#[utoipa::path(
    get,
    path = "/accounts",
    tag = "accounts",
    summary = "List managed accounts",
    params(ListAccountsQuery),
    responses(
        (status = 200, description = "Matching accounts", body = Data<Vec<AccountResponse>>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
    _current_user: CurrentUser,
) -> Result<Json<Data<Vec<AccountResponse>>>> {
    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);

    let accounts = repo
        .list(&AccountFilter {
            status: query.status,
            tier: query.tier,
            search: query.search,
            skip,
            limit,
        })
        .await?;

    Ok(Json(Data::new(accounts.into_iter().map(AccountResponse::from).collect())))
}

/// Create a managed account
#[utoipa::path(
    post,
    path = "/accounts",
    tag = "accounts",
    summary = "Create a managed account",
    request_body = AccountCreate,
    responses(
        (status = 201, description = "Account created", body = Data<AccountResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 409, description = "Handle already managed"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(handle = %request.handle))]
pub async fn create_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<AccountCreate>,
) -> Result<(StatusCode, Json<Data<AccountResponse>>)> {
    require_admin(&current_user, Resource::Accounts, Operation::CreateAll)?;

    let session_credentials = encrypt_credentials(&state, request.session_credentials)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);

    let account = repo
        .create(&AccountCreateDBRequest {
            handle: request.handle,
            display_name: request.display_name,
            bio: request.bio,
            status: request.status.unwrap_or(AccountStatus::Onboarding),
            tier: request.tier.unwrap_or(AccountTier::Standard),
            monthly_revenue: request.monthly_revenue.unwrap_or(Decimal::ZERO),
            subscriber_count: request.subscriber_count.unwrap_or(0),
            session_credentials,
            manager_id: request.manager_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(Data::new(AccountResponse::from(account)))))
}

/// Get a managed account
#[utoipa::path(
    get,
    path = "/accounts/{id}",
    tag = "accounts",
    summary = "Get a managed account",
    params(("id" = String, Path, description = "Account ID (UUID)")),
    responses(
        (status = 200, description = "The account", body = Data<AccountResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    _current_user: CurrentUser,
) -> Result<Json<Data<AccountResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);

    let account = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Managed account".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(Data::new(AccountResponse::from(account))))
}

/// Update a managed account
#[utoipa::path(
    patch,
    path = "/accounts/{id}",
    tag = "accounts",
    summary = "Update a managed account",
    params(("id" = String, Path, description = "Account ID (UUID)")),
    request_body = AccountUpdate,
    responses(
        (status = 200, description = "Updated account", body = Data<AccountResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    current_user: CurrentUser,
    Json(request): Json<AccountUpdate>,
) -> Result<Json<Data<AccountResponse>>> {
    require_admin(&current_user, Resource::Accounts, Operation::UpdateAll)?;

    let session_credentials = encrypt_credentials(&state, request.session_credentials)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);

    let account = repo
        .update(
            id,
            &AccountUpdateDBRequest {
                display_name: request.display_name,
                bio: request.bio,
                status: request.status,
                tier: request.tier,
                monthly_revenue: request.monthly_revenue,
                subscriber_count: request.subscriber_count,
                session_credentials,
                manager_id: request.manager_id,
            },
        )
        .await?;

    Ok(Json(Data::new(AccountResponse::from(account))))
}

/// Delete a managed account
#[utoipa::path(
    delete,
    path = "/accounts/{id}",
    tag = "accounts",
    summary = "Delete a managed account",
    params(("id" = String, Path, description = "Account ID (UUID)")),
    responses(
        (status = 200, description = "Account deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<Data<serde_json::Value>>> {
    require_admin(&current_user, Resource::Accounts, Operation::DeleteAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::NotFound {
            resource: "Managed account".to_string(),
            id: id.to_string(),
        });
    }

    Ok(Json(Data::new(serde_json::json!({"deleted": true}))))
}

/// Pause a managed account
#[utoipa::path(
    post,
    path = "/accounts/{id}/pause",
    tag = "accounts",
    summary = "Pause a managed account",
    params(("id" = String, Path, description = "Account ID (UUID)")),
    responses(
        (status = 200, description = "Account paused", body = Data<AccountResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn pause_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<Data<AccountResponse>>> {
    require_admin(&current_user, Resource::Accounts, Operation::UpdateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);
    let account = repo.set_status(id, AccountStatus::Paused).await?;
    Ok(Json(Data::new(AccountResponse::from(account))))
}

/// Reactivate a managed account
#[utoipa::path(
    post,
    path = "/accounts/{id}/activate",
    tag = "accounts",
    summary = "Reactivate a managed account",
    params(("id" = String, Path, description = "Account ID (UUID)")),
    responses(
        (status = 200, description = "Account activated", body = Data<AccountResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn activate_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    current_user: CurrentUser,
) -> Result<Json<Data<AccountResponse>>> {
    require_admin(&current_user, Resource::Accounts, Operation::UpdateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);
    let account = repo.set_status(id, AccountStatus::Active).await?;
    Ok(Json(Data::new(AccountResponse::from(account))))
}

/// Compute a performance report from supplied platform metrics
#[utoipa::path(
    post,
    path = "/accounts/{id}/performance",
    tag = "accounts",
    summary = "Compute an account performance report",
    params(("id" = String, Path, description = "Account ID (UUID)")),
    request_body = PerformanceRequest,
    responses(
        (status = 200, description = "Computed report", body = Data<PerformanceResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Account not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn account_performance(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    _current_user: CurrentUser,
    Json(request): Json<PerformanceRequest>,
) -> Result<Json<Data<PerformanceResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Accounts::new(&mut conn);

    let account = repo.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Managed account".to_string(),
        id: id.to_string(),
    })?;

    let engagement_score = analytics::engagement_score(&analytics::EngagementInputs {
        profile_views: request.profile_views,
        interactions: request.interactions,
        followers: account.subscriber_count as i64,
        posts: request.posts,
    });

    // Default subscription price per tier when the caller doesn't supply one
    let price = request.subscription_price.unwrap_or_else(|| match account.tier {
        AccountTier::Standard => Decimal::new(999, 2),
        AccountTier::Premium => Decimal::new(1999, 2),
        AccountTier::Elite => Decimal::new(4999, 2),
    });
    let estimated_earnings = analytics::estimated_earnings(account.subscriber_count as i64, price, engagement_score);
    let sources: Vec<(String, i64)> = request.traffic_sources.into_iter().map(|s| (s.source, s.visits)).collect();
    let traffic = analytics::traffic_insights(&sources);

    Ok(Json(Data::new(PerformanceResponse {
        account_id: account.id,
        engagement_score,
        estimated_earnings,
        traffic,
    })))
}
