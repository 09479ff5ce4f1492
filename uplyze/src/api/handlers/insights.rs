//! Customer insight reports and admin actions.
//!
//! The scores are pure functions over the customer's ledger and login data
//! (see [`crate::analytics`]); reports are memoized in the TTL cache and
//! invalidated whenever an admin mutation changes the inputs.

use crate::{
    AppState,
    analytics::{self, ChurnInputs, SpendingInputs, narrative},
    api::models::{
        Data,
        insights::{CustomerInsightsResponse, GrantCreditsRequest},
        transactions::TransactionResponse,
        users::CurrentUser,
    },
    auth::permissions::require_admin,
    db::{
        handlers::{Repository, Users, Wallets},
        models::wallets::{TransactionCreateDBRequest, TransactionKind},
    },
    errors::{Error, Result},
    types::{Operation, Resource, UserId},
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::{debug, instrument};

/// Compute a customer's insight report
#[utoipa::path(
    get,
    path = "/customers/{id}/insights",
    tag = "insights",
    summary = "Compute a customer insight report",
    params(("id" = String, Path, description = "Customer user ID (UUID)")),
    responses(
        (status = 200, description = "The report", body = Data<CustomerInsightsResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
        (status = 404, description = "Customer not found"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn customer_insights(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<Data<CustomerInsightsResponse>>> {
    require_admin(&current_user, Resource::Insights, Operation::ReadAll)?;

    // Reports are deterministic within their inputs, so a TTL cache hit is as
    // good as a recompute
    if let Some(cached) = state.cache.get("insights", &id.to_string()).await
        && let Ok(report) = serde_json::from_value::<CustomerInsightsResponse>(cached)
    {
        debug!("Serving cached insight report for {id}");
        return Ok(Json(Data::new(report)));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut users = Users::new(&mut conn);
    let user = users.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Customer".to_string(),
        id: id.to_string(),
    })?;

    let mut wallets = Wallets::new(&mut conn);
    let activity = wallets.customer_activity(id).await?;

    let now = Utc::now();
    let days_since = |at: Option<chrono::DateTime<Utc>>| at.map(|at| (now - at).num_days());

    let spending = SpendingInputs {
        total_spent: activity.total_spent,
        purchase_count: activity.purchase_count,
        days_since_last_purchase: days_since(activity.last_purchase_at),
    };
    let spender_score = analytics::spender_score(&spending);
    let spender_tier = analytics::spender_tier(spender_score);

    let churn = ChurnInputs {
        days_since_login: days_since(activity.last_login),
        days_since_purchase: days_since(activity.last_purchase_at),
        balance: activity.balance,
    };
    let churn_score = analytics::churn_score(&churn);
    let churn_risk = analytics::churn_risk(&churn, churn_score);

    let narrative = narrative::generate(
        &state.config.insights.narrative,
        &narrative::NarrativeInputs {
            display_name: user.display_name.unwrap_or(user.username),
            spender_score,
            spender_tier,
            churn_score,
            churn_risk,
        },
    )
    .await;

    let report = CustomerInsightsResponse {
        user_id: id,
        balance: activity.balance,
        total_spent: activity.total_spent,
        purchase_count: activity.purchase_count,
        last_purchase_at: activity.last_purchase_at,
        last_login: activity.last_login,
        spender_score,
        spender_tier,
        churn_score,
        churn_risk,
        narrative,
    };

    if let Ok(value) = serde_json::to_value(&report) {
        state.cache.insert("insights", &id.to_string(), value).await;
    }

    Ok(Json(Data::new(report)))
}

/// Grant credits to a customer's wallet
#[utoipa::path(
    post,
    path = "/customers/{id}/credits",
    tag = "insights",
    summary = "Grant credits to a customer",
    params(("id" = String, Path, description = "Customer user ID (UUID)")),
    request_body = GrantCreditsRequest,
    responses(
        (status = 201, description = "Grant recorded", body = Data<TransactionResponse>),
        (status = 400, description = "Non-positive amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires admin"),
    ),
    security(("api_key" = []))
)]
#[instrument(skip_all)]
pub async fn grant_credits(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    Json(request): Json<GrantCreditsRequest>,
) -> Result<(StatusCode, Json<Data<TransactionResponse>>)> {
    require_admin(&current_user, Resource::Wallets, Operation::UpdateAll)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Wallets::new(&mut conn);

    let transaction = repo
        .create_transaction(&TransactionCreateDBRequest {
            user_id: id,
            kind: TransactionKind::Grant,
            amount: request.amount,
            description: request.description.or_else(|| Some("admin grant".to_string())),
        })
        .await?;

    // The grant changes the report inputs
    state.cache.invalidate("insights", &id.to_string()).await;

    Ok((StatusCode::CREATED, Json(Data::new(TransactionResponse::from(transaction)))))
}
