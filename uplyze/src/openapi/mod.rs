//! OpenAPI documentation assembly.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::analytics::{ChurnRisk, SpenderTier, TrafficSource};
use crate::api::models::{
    accounts::{AccountCreate, AccountResponse, AccountUpdate, PerformanceRequest, PerformanceResponse, TrafficSourceInput},
    api_keys::{ApiKeyCreate, ApiKeyCreatedResponse, ApiKeyResponse, ApiKeyUpdate},
    conversations::{ConversationResponse, MessageResponse},
    graph::{GraphProxyRequest, GraphProxyResponse},
    insights::{CustomerInsightsResponse, GrantCreditsRequest},
    leads::{LeadCreate, LeadResponse},
    scripts::{ScriptCreate, ScriptResponse, ScriptStepCreate, ScriptStepResponse, ScriptUpdate},
    transactions::{TransactionCreate, TransactionResponse, WalletResponse},
    users::{CurrentUser, LoginRequest, LoginResponse, Role, UserCreate, UserResponse, UserUpdate},
};
use crate::db::models::accounts::{AccountStatus, AccountTier};
use crate::db::models::wallets::TransactionKind;
use crate::graph::GraphAction;

/// Registers the two credential schemes the gateway accepts.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme("api_key", SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))));
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Uplyze Control Layer API",
        description = "Admin API, Graph proxy and customer analytics for the OZ Agency creator platform",
    ),
    paths(
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::logout,
        crate::api::handlers::users::list_users,
        crate::api::handlers::users::create_user,
        crate::api::handlers::users::get_user,
        crate::api::handlers::users::update_user,
        crate::api::handlers::users::delete_user,
        crate::api::handlers::api_keys::list_user_api_keys,
        crate::api::handlers::api_keys::create_user_api_key,
        crate::api::handlers::api_keys::get_user_api_key,
        crate::api::handlers::api_keys::update_user_api_key,
        crate::api::handlers::api_keys::delete_user_api_key,
        crate::api::handlers::accounts::list_accounts,
        crate::api::handlers::accounts::create_account,
        crate::api::handlers::accounts::get_account,
        crate::api::handlers::accounts::update_account,
        crate::api::handlers::accounts::delete_account,
        crate::api::handlers::accounts::pause_account,
        crate::api::handlers::accounts::activate_account,
        crate::api::handlers::accounts::account_performance,
        crate::api::handlers::transactions::get_wallet,
        crate::api::handlers::transactions::create_transaction,
        crate::api::handlers::transactions::get_transaction,
        crate::api::handlers::transactions::list_transactions,
        crate::api::handlers::conversations::list_conversations,
        crate::api::handlers::conversations::list_messages,
        crate::api::handlers::conversations::delete_conversation,
        crate::api::handlers::scripts::list_scripts,
        crate::api::handlers::scripts::create_script,
        crate::api::handlers::scripts::get_script,
        crate::api::handlers::scripts::update_script,
        crate::api::handlers::scripts::delete_script,
        crate::api::handlers::insights::customer_insights,
        crate::api::handlers::insights::grant_credits,
        crate::api::handlers::graph::proxy,
        crate::api::handlers::leads::create_lead,
    ),
    components(schemas(
        Role,
        CurrentUser,
        LoginRequest,
        LoginResponse,
        UserCreate,
        UserUpdate,
        UserResponse,
        ApiKeyCreate,
        ApiKeyUpdate,
        ApiKeyResponse,
        ApiKeyCreatedResponse,
        AccountStatus,
        AccountTier,
        AccountCreate,
        AccountUpdate,
        AccountResponse,
        PerformanceRequest,
        PerformanceResponse,
        TrafficSource,
        TrafficSourceInput,
        TransactionKind,
        TransactionCreate,
        TransactionResponse,
        WalletResponse,
        ConversationResponse,
        MessageResponse,
        ScriptStepCreate,
        ScriptCreate,
        ScriptUpdate,
        ScriptStepResponse,
        ScriptResponse,
        SpenderTier,
        ChurnRisk,
        CustomerInsightsResponse,
        GrantCreditsRequest,
        GraphAction,
        GraphProxyRequest,
        GraphProxyResponse,
        LeadCreate,
        LeadResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Session authentication"),
        (name = "users", description = "User management"),
        (name = "api-keys", description = "API key grants and revocation"),
        (name = "accounts", description = "Managed creator accounts"),
        (name = "wallets", description = "Credit wallets and the transaction ledger"),
        (name = "conversations", description = "Instagram DM mirror"),
        (name = "scripts", description = "DM automation scripts"),
        (name = "insights", description = "Customer insight reports and admin actions"),
        (name = "graph", description = "Meta Graph API proxy"),
        (name = "leads", description = "Marketing lead intake"),
    )
)]
pub struct ApiDoc;
