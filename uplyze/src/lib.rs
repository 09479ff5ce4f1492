//! # uplyze: Control Layer for the OZ Agency Creator Platform
//!
//! `uplyze` is the server side of a creator-management agency platform. It
//! fronts a PostgreSQL database with an administrative REST API for the
//! entities the agency runs on - managed creator accounts, customers and
//! their credit wallets, mirrored Instagram conversations, DM automation
//! scripts - and bundles the two integration surfaces the dashboard needs:
//! a Meta Graph API proxy and a customer-analytics module.
//!
//! ## Request Flow
//!
//! Every admin request enters through the gateway: the [`auth`] layer
//! resolves an identity from either an `X-API-Key` header (hashed lookup,
//! daily quota accounting, automatic deactivation on quota breach) or a JWT
//! session (bearer header or cookie, with the admin grant checked against the
//! role table). Handlers in [`api`] then perform per-resource authorization
//! and talk to PostgreSQL through the repositories in [`db`].
//!
//! Success responses wrap their payload as `{"data": ...}`; failures are
//! `{"error": "..."}` with conventional status codes.
//!
//! ## Core Components
//!
//! The **API layer** ([`api`]) exposes the `/v1` admin surface: RESTful CRUD
//! over users, API keys, managed accounts, wallets/transactions,
//! conversations and scripts, plus the computed endpoints (account
//! performance, customer insights) and the Graph proxy.
//!
//! The **gateway** ([`auth`]) owns credential resolution and the daily quota
//! state machine: non-admin API keys are capped at a configured number of
//! requests per day and flip inactive at the boundary; reactivation is a
//! manual admin action.
//!
//! The **Graph proxy** ([`graph`]) dispatches `{action, account_id, params}`
//! requests to the Meta Graph API using the managed account's encrypted
//! session credentials, following pagination for list reads and mirroring DM
//! threads into the local tables.
//!
//! The **analytics module** ([`analytics`]) holds the deterministic scoring
//! formulas (engagement, estimated earnings, traffic shares, spender tier,
//! churn risk) used by the computed endpoints; reports are memoized in a TTL
//! cache ([`cache`]) and can carry an optional LLM-written narrative.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use uplyze::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = uplyze::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     uplyze::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
mod crypto;
pub mod db;
pub mod email;
pub mod errors;
pub mod graph;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::password,
    cache::TtlCache,
    db::handlers::{Repository, Users},
    db::models::users::UserCreateDBRequest,
    email::EmailService,
    graph::GraphClient,
    openapi::ApiDoc,
};
use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{delete, get, patch, post},
};
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AccountId, ApiKeyId, ConversationId, ScriptId, UserId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from file/environment
/// - `cache`: TTL memoization for computed reports
/// - `graph`: Shared Meta Graph API client
/// - `email`: Mailer for lead notifications
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub cache: TtlCache,
    pub graph: GraphClient,
    pub email: Arc<EmailService>,
}

/// Get the uplyze database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// This function is idempotent - it will create a new admin user if one doesn't exist,
/// or update the password if the user already exists. Called during application startup
/// to ensure there's always an admin user available.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(pwd) => Some(password::hash_string(pwd).map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?),
        None => None,
    };

    let mut conn = db.acquire().await?;
    let mut user_repo = Users::new(&mut conn);

    if let Some(existing_user) = user_repo
        .get_user_by_email(email)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to check existing user: {e}"))?
    {
        if let Some(password_hash) = password_hash {
            sqlx::query("UPDATE users SET password_hash = $1 WHERE email = $2")
                .bind(password_hash)
                .bind(email)
                .execute(db)
                .await?;
        }
        return Ok(existing_user.id);
    }

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            username: email.to_string(),
            email: email.to_string(),
            display_name: None,
            avatar_url: None,
            is_admin: true,
            roles: vec![Role::Admin, Role::Customer],
            auth_source: "system".to_string(),
            password_hash,
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create admin user: {e}"))?;

    Ok(created_user.id)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE, "x-api-key".parse()?])
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
        ]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// The string-keyed resource dispatch of the admin API is this router: each
/// `/v1/<resource>` segment maps to its typed handlers, and unknown resources
/// fall out as 404s before any handler runs.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Authentication routes
    let auth_routes = Router::new()
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/logout", post(api::handlers::auth::logout));

    // Public marketing intake
    let lead_routes = Router::new().route("/leads", post(api::handlers::leads::create_lead));

    // Admin resources
    let api_routes = Router::new()
        // User management (admin only for collection operations)
        .route("/users", get(api::handlers::users::list_users))
        .route("/users", post(api::handlers::users::create_user))
        .route("/users/{id}", get(api::handlers::users::get_user))
        .route("/users/{id}", patch(api::handlers::users::update_user))
        .route("/users/{id}", delete(api::handlers::users::delete_user))
        // API Keys as user sub-resources
        .route("/users/{user_id}/api-keys", get(api::handlers::api_keys::list_user_api_keys))
        .route("/users/{user_id}/api-keys", post(api::handlers::api_keys::create_user_api_key))
        .route("/users/{user_id}/api-keys/{id}", get(api::handlers::api_keys::get_user_api_key))
        .route("/users/{user_id}/api-keys/{id}", patch(api::handlers::api_keys::update_user_api_key))
        .route(
            "/users/{user_id}/api-keys/{id}",
            delete(api::handlers::api_keys::delete_user_api_key),
        )
        // Managed accounts
        .route("/accounts", get(api::handlers::accounts::list_accounts))
        .route("/accounts", post(api::handlers::accounts::create_account))
        .route("/accounts/{id}", get(api::handlers::accounts::get_account))
        .route("/accounts/{id}", patch(api::handlers::accounts::update_account))
        .route("/accounts/{id}", delete(api::handlers::accounts::delete_account))
        .route("/accounts/{id}/pause", post(api::handlers::accounts::pause_account))
        .route("/accounts/{id}/activate", post(api::handlers::accounts::activate_account))
        .route("/accounts/{id}/performance", post(api::handlers::accounts::account_performance))
        // DM mirror
        .route(
            "/accounts/{account_id}/conversations",
            get(api::handlers::conversations::list_conversations),
        )
        .route("/conversations/{id}", delete(api::handlers::conversations::delete_conversation))
        .route("/conversations/{id}/messages", get(api::handlers::conversations::list_messages))
        // Automation scripts
        .route("/accounts/{account_id}/scripts", get(api::handlers::scripts::list_scripts))
        .route("/accounts/{account_id}/scripts", post(api::handlers::scripts::create_script))
        .route("/scripts/{id}", get(api::handlers::scripts::get_script))
        .route("/scripts/{id}", patch(api::handlers::scripts::update_script))
        .route("/scripts/{id}", delete(api::handlers::scripts::delete_script))
        // Wallets and the transaction ledger
        .route("/wallets/{user_id}", get(api::handlers::transactions::get_wallet))
        .route("/transactions", post(api::handlers::transactions::create_transaction))
        .route("/transactions", get(api::handlers::transactions::list_transactions))
        .route("/transactions/{id}", get(api::handlers::transactions::get_transaction))
        // Customer insights and admin actions
        .route("/customers/{id}/insights", get(api::handlers::insights::customer_insights))
        .route("/customers/{id}/credits", post(api::handlers::insights::grant_credits))
        // Graph proxy
        .route("/graph", post(api::handlers::graph::proxy));

    let v1 = auth_routes.merge(lead_routes).merge(api_routes).with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/v1", v1)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Create CORS layer from config
    let cors_layer = create_cors_layer(&state.config)?;
    let router = router.layer(cors_layer);

    // Add tracing layer
    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to PostgreSQL, runs
///    migrations, ensures the initial admin user and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool_settings = &config.database.pool;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(pool_settings.max_connections)
            .min_connections(pool_settings.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(pool_settings.acquire_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(pool_settings.idle_timeout_secs))
            .connect(&config.database.url)
            .await?;

        migrator().run(&pool).await?;

        create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool).await?;

        let state = AppState::builder()
            .db(pool.clone())
            .cache(TtlCache::new(config.insights.cache_ttl, 10_000))
            .graph(GraphClient::new(&config.graph, config.graph_root()).map_err(|e| anyhow::anyhow!("{e}"))?)
            .email(Arc::new(EmailService::new(&config).map_err(|e| anyhow::anyhow!("{e}"))?))
            .config(config.clone())
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Control layer listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::api::models::users::Role;
    use crate::db::handlers::{ApiKeys, Repository};
    use crate::test_utils::*;
    use sqlx::PgPool;
    use uuid::Uuid;

    /// Integration test: a non-admin key burns through its daily quota, is
    /// deactivated at the boundary, and stays rejected afterwards.
    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_api_key_quota_deactivation_flow(pool: PgPool) {
        let mut config = create_test_config();
        config.gateway.daily_request_limit = 3;
        let server = create_test_server(pool.clone(), config);

        let user = create_test_user(&pool, Role::Customer).await;
        // Stored limit far above the enforced cap - the gateway ignores it
        let (plaintext, key_id) = create_test_api_key(&pool, user.id, false, 10_000).await;

        for attempt in 1..=3 {
            let response = server.get("/v1/accounts").add_header("x-api-key", &plaintext).await;
            assert_eq!(response.status_code().as_u16(), 200, "request {attempt} should pass");
        }

        // Fourth request crosses the boundary: explicit quota error
        let response = server.get("/v1/accounts").add_header("x-api-key", &plaintext).await;
        assert_eq!(response.status_code().as_u16(), 429);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("Daily request limit"));

        // The key flipped inactive
        let mut conn = pool.acquire().await.unwrap();
        let mut keys = ApiKeys::new(&mut conn);
        let key = keys.get_by_id(key_id).await.unwrap().unwrap();
        assert!(!key.is_active, "quota breach must deactivate the key");

        // And subsequent requests are rejected as revoked, regardless of validity
        let response = server.get("/v1/accounts").add_header("x-api-key", &plaintext).await;
        assert_eq!(response.status_code().as_u16(), 401);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("revoked"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_admin_key_is_never_quota_limited(pool: PgPool) {
        let mut config = create_test_config();
        config.gateway.daily_request_limit = 1;
        let server = create_test_server(pool.clone(), config);

        let admin = create_test_admin_user(&pool).await;
        let (plaintext, _key_id) = create_test_api_key(&pool, admin.id, true, 10_000).await;

        // Far more requests than the limit allows for non-admin keys
        for _ in 0..5 {
            let response = server.get("/v1/accounts").add_header("x-api-key", &plaintext).await;
            assert_eq!(response.status_code().as_u16(), 200);
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_invalid_and_revoked_keys_rejected(pool: PgPool) {
        let server = create_test_server(pool.clone(), create_test_config());

        // Unknown key
        let response = server.get("/v1/accounts").add_header("x-api-key", "ozk_nonsense").await;
        assert_eq!(response.status_code().as_u16(), 401);

        // Revoked key
        let user = create_test_user(&pool, Role::Customer).await;
        let (plaintext, key_id) = create_test_api_key(&pool, user.id, false, 10_000).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut keys = ApiKeys::new(&mut conn);
        keys.deactivate(key_id).await.unwrap();

        let response = server.get("/v1/accounts").add_header("x-api-key", &plaintext).await;
        assert_eq!(response.status_code().as_u16(), 401);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_bearer_auth_requires_admin_grant(pool: PgPool) {
        let config = create_test_config();
        let server = create_test_server(pool.clone(), config.clone());

        // A customer session token is rejected by the bearer path
        let customer = create_test_user(&pool, Role::Customer).await;
        let token = session_token_for(&customer, &config);
        let response = server
            .get("/v1/accounts")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        assert_eq!(response.status_code().as_u16(), 403);

        // An admin session token passes
        let admin = create_test_admin_user(&pool).await;
        let token = session_token_for(&admin, &config);
        let response = server
            .get("/v1/accounts")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_missing_credentials_is_401_with_error_envelope(pool: PgPool) {
        let server = create_test_server(pool.clone(), create_test_config());

        let response = server.get("/v1/accounts").await;
        assert_eq!(response.status_code().as_u16(), 401);
        let body: serde_json::Value = response.json();
        assert!(body["error"].is_string());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_unknown_resource_is_404(pool: PgPool) {
        let server = create_test_server(pool.clone(), create_test_config());

        let admin = create_test_admin_user(&pool).await;
        let (plaintext, _key) = create_test_api_key(&pool, admin.id, true, 10_000).await;

        let response = server.get("/v1/definitely-not-a-resource").add_header("x-api-key", &plaintext).await;
        assert_eq!(response.status_code().as_u16(), 404);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_lead_intake_is_public(pool: PgPool) {
        let server = create_test_server(pool.clone(), create_test_config());

        let response = server
            .post("/v1/leads")
            .json(&serde_json::json!({
                "name": "Jordan",
                "email": "jordan@example.com",
                "platform": "instagram",
                "message": "Looking for management"
            }))
            .await;
        assert_eq!(response.status_code().as_u16(), 201);

        let invalid = server
            .post("/v1/leads")
            .json(&serde_json::json!({"name": "", "email": "not-an-email"}))
            .await;
        assert_eq!(invalid.status_code().as_u16(), 400);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_script_delete_cascades_over_http(pool: PgPool) {
        let server = create_test_server(pool.clone(), create_test_config());

        let admin = create_test_admin_user(&pool).await;
        let (key, _) = create_test_api_key(&pool, admin.id, true, 10_000).await;

        let account = server
            .post("/v1/accounts")
            .add_header("x-api-key", &key)
            .json(&serde_json::json!({"handle": "cascade.test", "display_name": "Cascade Test"}))
            .await;
        assert_eq!(account.status_code().as_u16(), 201);
        let account_id = account.json::<serde_json::Value>()["data"]["id"].as_str().unwrap().to_string();

        let script = server
            .post(&format!("/v1/accounts/{account_id}/scripts"))
            .add_header("x-api-key", &key)
            .json(&serde_json::json!({
                "name": "welcome",
                "steps": [
                    {"action": "send_message", "payload": {"text": "hello"}},
                    {"action": "wait", "payload": {"seconds": 30}}
                ]
            }))
            .await;
        assert_eq!(script.status_code().as_u16(), 201);
        let script_id = script.json::<serde_json::Value>()["data"]["id"].as_str().unwrap().to_string();

        let deleted = server.delete(&format!("/v1/scripts/{script_id}")).add_header("x-api-key", &key).await;
        assert_eq!(deleted.status_code().as_u16(), 200);

        let orphans = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM script_steps WHERE script_id = $1")
            .bind(Uuid::parse_str(&script_id).unwrap())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[test_log::test]
    async fn test_customer_insights_endpoint(pool: PgPool) {
        let server = create_test_server(pool.clone(), create_test_config());

        let admin = create_test_admin_user(&pool).await;
        let (key, _) = create_test_api_key(&pool, admin.id, true, 10_000).await;
        let customer = create_test_user(&pool, Role::Customer).await;

        // Grant some credits so the report has inputs
        let grant = server
            .post(&format!("/v1/customers/{}/credits", customer.id))
            .add_header("x-api-key", &key)
            .json(&serde_json::json!({"amount": "250.00"}))
            .await;
        assert_eq!(grant.status_code().as_u16(), 201);

        let response = server
            .get(&format!("/v1/customers/{}/insights", customer.id))
            .add_header("x-api-key", &key)
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let body: serde_json::Value = response.json();
        let report = &body["data"];
        assert!(report["spender_score"].as_f64().unwrap() >= 0.0);
        assert!(report["churn_score"].as_f64().unwrap() <= 100.0);
        // Never logged in: always critical
        assert_eq!(report["churn_risk"], "critical");
    }
}
