//! Marketing lead intake: record the submission, then relay it by email.

use crate::{
    AppState,
    api::models::{
        Data,
        leads::{LeadCreate, LeadResponse},
    },
    errors::{Error, Result},
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use sqlx::Row;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Submit a lead from the marketing site (unauthenticated)
#[utoipa::path(
    post,
    path = "/leads",
    tag = "leads",
    summary = "Submit a marketing lead",
    request_body = LeadCreate,
    responses(
        (status = 201, description = "Lead recorded", body = Data<LeadResponse>),
        (status = 400, description = "Invalid submission"),
    )
)]
#[instrument(skip_all, fields(email = %request.email))]
pub async fn create_lead(State(state): State<AppState>, Json(request): Json<LeadCreate>) -> Result<(StatusCode, Json<Data<LeadResponse>>)> {
    if request.name.trim().is_empty() || !request.email.contains('@') {
        return Err(Error::BadRequest {
            message: "A name and a valid email address are required".to_string(),
        });
    }

    let row = sqlx::query(
        r#"
        INSERT INTO leads (id, name, email, platform, message)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(request.name.trim())
    .bind(&request.email)
    .bind(&request.platform)
    .bind(&request.message)
    .fetch_one(&state.db)
    .await
    .map_err(|e| Error::Database(e.into()))?;

    let response = LeadResponse {
        id: row.try_get("id").map_err(|e| Error::Database(e.into()))?,
        name: request.name.trim().to_string(),
        email: request.email.clone(),
        platform: request.platform.clone(),
        created_at: row.try_get("created_at").map_err(|e| Error::Database(e.into()))?,
    };

    // The lead is durable at this point; a failed notification is logged only
    if let Err(e) = state
        .email
        .send_lead_notification(&response.name, &response.email, request.platform.as_deref(), request.message.as_deref())
        .await
    {
        warn!("Lead notification email failed: {e}");
    }

    Ok((StatusCode::CREATED, Json(Data::new(response))))
}
