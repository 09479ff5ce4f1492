//! Shared helpers for integration tests.

use crate::{
    AppState, Config, build_router,
    api::models::users::{CurrentUser, Role, UserResponse},
    auth::session,
    cache::TtlCache,
    crypto,
    db::handlers::{ApiKeys, Repository, Users},
    db::models::{api_keys::ApiKeyCreateDBRequest, users::UserCreateDBRequest},
    email::EmailService,
    graph::GraphClient,
    types::{ApiKeyId, UserId},
};
use sqlx::PgPool;
use std::sync::Arc;

/// Config suitable for tests: native auth on, file email transport, wildcard CORS.
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.secret_key = Some("test-secret-key".to_string());
    config.credentials_key = Some(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [7u8; 32]));
    config.email.transport = crate::config::EmailTransportConfig::File {
        path: std::env::temp_dir().join("uplyze-test-emails").to_string_lossy().to_string(),
    };
    config
}

/// Build app state over the test pool.
pub fn create_test_app_state(pool: PgPool, config: Config) -> AppState {
    AppState::builder()
        .db(pool)
        .cache(TtlCache::new(config.insights.cache_ttl, 1_000))
        .graph(GraphClient::new(&config.graph, config.graph_root()).expect("graph client"))
        .email(Arc::new(EmailService::new(&config).expect("email service")))
        .config(config)
        .build()
}

/// Full test server over the router.
pub fn create_test_server(pool: PgPool, config: Config) -> axum_test::TestServer {
    let state = create_test_app_state(pool, config);
    let router = build_router(&state).expect("router should build");
    axum_test::TestServer::new(router).expect("Failed to create test server")
}

static TEST_USER_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

fn unique_suffix() -> u64 {
    TEST_USER_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    let n = unique_suffix();
    let mut conn = pool.acquire().await.unwrap();
    let mut users = Users::new(&mut conn);
    let user = users
        .create(&UserCreateDBRequest {
            username: format!("user{n}"),
            email: format!("user{n}@example.com"),
            display_name: None,
            avatar_url: None,
            is_admin: false,
            roles: vec![role],
            auth_source: "native".to_string(),
            password_hash: None,
        })
        .await
        .expect("Failed to create test user");
    UserResponse::from(user)
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserResponse {
    let n = unique_suffix();
    let mut conn = pool.acquire().await.unwrap();
    let mut users = Users::new(&mut conn);
    let user = users
        .create(&UserCreateDBRequest {
            username: format!("admin{n}"),
            email: format!("admin{n}@example.com"),
            display_name: None,
            avatar_url: None,
            is_admin: true,
            roles: vec![Role::Admin, Role::Customer],
            auth_source: "native".to_string(),
            password_hash: None,
        })
        .await
        .expect("Failed to create test admin user");
    UserResponse::from(user)
}

/// Mint an API key for a user, returning the plaintext and the row id.
pub async fn create_test_api_key(pool: &PgPool, user_id: UserId, admin: bool, rate_limit_daily: i32) -> (String, ApiKeyId) {
    let plaintext = crypto::generate_api_key(admin);
    let mut conn = pool.acquire().await.unwrap();
    let mut keys = ApiKeys::new(&mut conn);
    let key = keys
        .create(&ApiKeyCreateDBRequest {
            user_id,
            name: "test key".to_string(),
            key_hash: crypto::hash_api_key(&plaintext),
            key_prefix: crypto::display_prefix(&plaintext),
            is_admin: admin,
            scopes: vec![],
            rate_limit_daily,
            expires_at: None,
        })
        .await
        .expect("Failed to create test API key");
    (plaintext, key.id)
}

/// Session token for a user (as issued at login).
pub fn session_token_for(user: &UserResponse, config: &Config) -> String {
    let current = CurrentUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        is_admin: user.is_admin,
        roles: user.roles.clone(),
        display_name: user.display_name.clone(),
        avatar_url: user.avatar_url.clone(),
    };
    session::create_session_token(&current, config).expect("Failed to create session token")
}
