//! Authentication handlers: login and logout for the admin dashboard.

use crate::{
    AppState,
    api::models::{
        Data,
        users::{CurrentUser, LoginRequest, LoginResponse},
    },
    auth::{password, session},
    db::handlers::Users,
    errors::{Error, Result},
};
use axum::{
    extract::{Json, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tracing::instrument;

fn session_cookie(state: &AppState, value: &str, max_age_secs: u64) -> Result<HeaderValue> {
    let cookie_name = &state.config.auth.native.session.cookie_name;
    let secure = if state.config.auth.native.session.cookie_secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{cookie_name}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{secure}"
    ))
    .map_err(|e| Error::Internal {
        operation: format!("build session cookie: {e}"),
    })
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    summary = "Log in with email and password",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued", body = Data<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error"),
    )
)]
#[instrument(skip_all, fields(email = %request.email))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Response> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let invalid = || Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    };

    let user = users.get_user_by_email(&request.email).await?.ok_or_else(invalid)?;
    let password_hash = user.password_hash.clone().ok_or_else(invalid)?;
    if !password::verify_string(&request.password, &password_hash)? {
        return Err(invalid());
    }

    users.record_login(user.id).await?;

    let current_user = CurrentUser::from(user);
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session_cookie(&state, &token, state.config.auth.security.jwt_expiry.as_secs())?;

    let mut response = Json(Data::new(LoginResponse {
        token,
        user: current_user,
    }))
    .into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// Log out by clearing the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    summary = "Log out",
    responses(
        (status = 200, description = "Session cookie cleared"),
    )
)]
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> Result<Response> {
    let cookie = session_cookie(&state, "", 0)?;
    let mut response = Json(Data::new(serde_json::json!({"logged_out": true}))).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}
