//! Wallet and transaction ledger handlers.

use crate::{
    AppState,
    api::models::{
        Data,
        transactions::{ListTransactionsQuery, TransactionCreate, TransactionResponse, WalletResponse},
        users::CurrentUser,
    },
    auth::permissions::{require_admin, require_self_or_admin},
    db::{handlers::Wallets, models::wallets::TransactionCreateDBRequest},
    errors::{Error, Result},
    types::{Operation, Resource, TransactionId, UserId},
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

/// Get a user's wallet
#[utoipa::path(
    get,
    path = "/wallets/{user_id}",
    tag = "wallets",
    summary = "Get a user's wallet",
    params(("user_id" = String, Path, description = "User ID (UUID)")),
    responses(
        (status = 200, description = "The wallet", body = Data<WalletResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Data<WalletResponse>>> {
    require_self_or_admin(&current_user, user_id, Resource::Wallets, Operation::ReadAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Wallets::new(&mut conn);

    let wallet = repo.get_or_create(user_id).await?;
    Ok(Json(Data::new(WalletResponse::from(wallet))))
}

/// Append a ledger event
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "wallets",
    summary = "Create a transaction",
    request_body = TransactionCreate,
    responses(
        (status = 201, description = "Transaction recorded", body = Data<TransactionResponse>),
        (status = 400, description = "Non-positive amount or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all, fields(kind = ?request.kind))]
pub async fn create_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TransactionCreate>,
) -> Result<(StatusCode, Json<Data<TransactionResponse>>)> {
    require_admin(&current_user, Resource::Transactions, Operation::CreateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Wallets::new(&mut conn);

    let transaction = repo
        .create_transaction(&TransactionCreateDBRequest {
            user_id: request.user_id,
            kind: request.kind,
            amount: request.amount,
            description: request.description,
        })
        .await?;

    // The insight report for this customer is now stale
    state.cache.invalidate("insights", &request.user_id.to_string()).await;

    Ok((StatusCode::CREATED, Json(Data::new(TransactionResponse::from(transaction)))))
}

/// Get one transaction
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "wallets",
    summary = "Get a transaction",
    params(("id" = i64, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "The transaction", body = Data<TransactionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Transaction not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<TransactionId>,
    current_user: CurrentUser,
) -> Result<Json<Data<TransactionResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Wallets::new(&mut conn);

    let transaction = repo.get_transaction(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Transaction".to_string(),
        id: id.to_string(),
    })?;

    require_self_or_admin(&current_user, transaction.user_id, Resource::Transactions, Operation::ReadAll)?;
    Ok(Json(Data::new(TransactionResponse::from(transaction))))
}

/// List ledger events
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "wallets",
    summary = "List transactions",
    params(ListTransactionsQuery),
    responses(
        (status = 200, description = "Ledger events, newest first", body = Data<Vec<TransactionResponse>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Data<Vec<TransactionResponse>>>> {
    match query.user_id {
        Some(user_id) => require_self_or_admin(&current_user, user_id, Resource::Transactions, Operation::ReadAll)?,
        None => require_admin(&current_user, Resource::Transactions, Operation::ReadAll)?,
    }

    let (skip, limit) = query.pagination.params();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Wallets::new(&mut conn);

    let transactions = repo.list_transactions(query.user_id, skip, limit).await?;
    Ok(Json(Data::new(transactions.into_iter().map(TransactionResponse::from).collect())))
}
