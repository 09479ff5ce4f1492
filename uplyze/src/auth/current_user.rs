//! Extractor resolving the authenticated identity for admin API handlers.
//!
//! Two credentials are accepted, tried in order:
//!
//! 1. `X-API-Key` - hashed lookup plus daily quota accounting ([`crate::auth::gateway`])
//! 2. `Authorization: Bearer <jwt>` / session cookie - JWT verification; the
//!    bearer path additionally requires an `admin` grant in the role table
//!    before the request proceeds.

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    auth::{gateway, session},
    db::errors::DbError,
    db::handlers::Users,
    errors::{Error, Result},
    types::{Operation, Permission},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract user from API key header if present and valid
/// Returns:
/// - None: No API key header present
/// - Some(Ok(user)): Valid key found, quota charged, owner resolved
/// - Some(Err(error)): Key present but invalid, revoked, expired or over quota
#[instrument(skip(parts, state))]
async fn try_api_key_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentUser>> {
    let header_name = &state.config.gateway.api_key_header;
    let presented_key = match parts.headers.get(header_name).map(|h| h.to_str()) {
        Some(Ok(key)) => key,
        Some(Err(e)) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid {header_name} header: {e}"),
            }));
        }
        None => return None,
    };

    Some(gateway::authenticate_api_key(&state.db, &state.config, presented_key).await)
}

/// Extract user from a bearer JWT if present and valid.
///
/// The token only identifies the user; the admin grant is checked against the
/// role table on every request so a revoked grant takes effect immediately.
#[instrument(skip(parts, state))]
async fn try_bearer_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = auth_str.strip_prefix("Bearer ")?;

    let user = match session::verify_session_token(token, &state.config) {
        Ok(user) => user,
        Err(e) => return Some(Err(e)),
    };

    let mut conn = match state.db.acquire().await {
        Ok(conn) => conn,
        Err(e) => return Some(Err(DbError::from(e).into())),
    };
    let mut users = Users::new(&mut conn);
    match users.has_role(user.id, Role::Admin).await {
        Ok(true) => Some(Ok(user)),
        Ok(false) => Some(Err(Error::InsufficientPermissions {
            required: Permission::Granted,
            action: Operation::ReadAll,
            resource: "admin API".to_string(),
        })),
        Err(e) => Some(Err(Error::Database(e))),
    }
}

/// Extract user from JWT session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Valid JWT found and verified
fn try_session_cookie_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=')
            && name == cookie_name
        {
            // Invalid/expired cookies are expected; keep scanning
            match session::verify_session_token(value, config) {
                Ok(user) => return Some(Ok(user)),
                Err(_) => continue,
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Try all authentication methods in order of specificity. Each method
        // returns Option<Result<CurrentUser>>:
        // - None means the auth method is not applicable (no credentials present)
        // - Some(Ok(user)) means successful authentication
        // - Some(Err(error)) means auth credentials were present but invalid
        //
        // A method that was attempted and failed ends the chain: presenting a
        // bad API key should surface that error, not fall through to cookies.

        match try_api_key_auth(parts, state).await {
            Some(Ok(user)) => {
                debug!("Found API key authenticated user: {}", user.id);
                return Ok(user);
            }
            Some(Err(e)) => {
                trace!("API key authentication failed: {:?}", e);
                return Err(e);
            }
            None => {
                trace!("No API key authentication attempted");
            }
        }

        match try_bearer_auth(parts, state).await {
            Some(Ok(user)) => {
                debug!("Found bearer authenticated user: {}", user.id);
                return Ok(user);
            }
            Some(Err(e)) => {
                trace!("Bearer authentication failed: {:?}", e);
                return Err(e);
            }
            None => {
                trace!("No bearer authentication attempted");
            }
        }

        if state.config.auth.native.enabled {
            match try_session_cookie_auth(parts, &state.config) {
                Some(Ok(user)) => {
                    debug!("Found session authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("Session authentication failed: {:?}", e);
                    return Err(e);
                }
                None => {
                    trace!("No session authentication attempted");
                }
            }
        }

        trace!("No authentication credentials found in request");
        Err(Error::Unauthenticated { message: None })
    }
}
