//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `UPLYZE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `UPLYZE_` override YAML values
//! 3. **DATABASE_URL** - Special case: overrides `database.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `UPLYZE_GATEWAY__DAILY_REQUEST_LIMIT=250` sets the `gateway.daily_request_limit` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Database**: `database.url`, `database.pool` - PostgreSQL connection settings
//! - **Admin User**: `admin_email`, `admin_password` - Initial admin user created on first startup
//! - **Authentication**: `auth.native`, `auth.security` - Session auth and JWT settings
//! - **Gateway**: `gateway.daily_request_limit` - the per-key daily quota for non-admin keys
//! - **Graph**: `graph.base_url`, `graph.api_version` - Meta Graph API settings
//! - **Insights**: `insights.cache_ttl`, `insights.narrative` - analytics cache and LLM narrative
//! - **Email**: `email.*` - SMTP or file transport for lead notifications and password resets

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::api::models::users::Role;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "UPLYZE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL where the admin dashboard is accessible (used in notification emails)
    pub dashboard_url: String,
    /// Deprecated: Use `database.url` instead. Kept for `DATABASE_URL` overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// PostgreSQL database configuration
    pub database: DatabaseConfig,
    /// Email address for the initial admin user (created on first startup)
    pub admin_email: String,
    /// Password for the initial admin user (optional, can be set via environment)
    pub admin_password: Option<String>,
    /// Secret key for JWT signing (required when native auth is enabled)
    pub secret_key: Option<String>,
    /// Base64-encoded 32-byte key for encrypting stored platform session credentials
    pub credentials_key: Option<String>,
    /// Authentication configuration
    pub auth: AuthConfig,
    /// API-key gateway configuration
    pub gateway: GatewayConfig,
    /// Meta Graph API proxy configuration
    pub graph: GraphConfig,
    /// Customer insights configuration
    pub insights: InsightsConfig,
    /// Email configuration for lead notifications and password resets
    pub email: EmailConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Individual pool configuration with all SQLx parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
}

impl Default for PoolSettings {
    /// Production defaults: balanced for reliability and resource usage
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600, // 10 minutes
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string for the main database
    pub url: String,
    /// Connection pool settings
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/uplyze".to_string(),
            pool: PoolSettings::default(),
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Native username/password authentication
    pub native: NativeAuthConfig,
    /// Security settings (JWT, CORS)
    pub security: SecurityConfig,
    /// Default roles assigned to newly created non-admin users.
    /// Customer role is always guaranteed to be present even if not specified.
    pub default_user_roles: Vec<Role>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            native: NativeAuthConfig::default(),
            security: SecurityConfig::default(),
            default_user_roles: vec![Role::Customer],
        }
    }
}

/// Native username/password authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NativeAuthConfig {
    /// Enable native authentication (login)
    pub enabled: bool,
    /// Password validation rules
    pub password: PasswordConfig,
    /// Session cookie configuration
    pub session: SessionConfig,
}

impl Default for NativeAuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            password: PasswordConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie name for session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "uplyze_session".to_string(),
            cookie_secure: true,
        }
    }
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 128,
        }
    }
}

/// Security configuration for JWT and CORS.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecurityConfig {
    /// JWT token expiry duration
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_expiry: Duration::from_secs(8 * 60 * 60), // 8 hours
            cors: CorsConfig::default(),
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600),
        }
    }
}

/// A CORS origin: either the `*` wildcard or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    Url(Url),
    Wildcard,
}

/// API-key gateway configuration.
///
/// The daily request limit used to be a compiled-in constant; it is explicit
/// configuration here so operators can tune it without a rebuild. Note that
/// the gateway enforces this global cap for every non-admin key - the per-key
/// `rate_limit_daily` column is stored for the dashboard but not consulted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Daily request quota applied to non-admin API keys.
    /// A key at or over this limit is deactivated and must be manually re-enabled.
    pub daily_request_limit: i32,
    /// Header name carrying the API key
    pub api_key_header: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            daily_request_limit: 100,
            api_key_header: "x-api-key".to_string(),
        }
    }
}

/// Meta Graph API proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Graph API base URL (override for testing against a mock server)
    pub base_url: Url,
    /// Graph API version segment, e.g. "v23.0"
    pub api_version: String,
    /// Maximum number of pages to follow for paginated list reads
    pub max_pages: usize,
    /// Per-request timeout for upstream Graph calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://graph.facebook.com").expect("static URL is valid"),
            api_version: "v23.0".to_string(),
            max_pages: 10,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Customer insights configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightsConfig {
    /// How long computed insight reports stay cached per customer
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
    /// Optional LLM narrative summary settings
    pub narrative: NarrativeConfig,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            narrative: NarrativeConfig::default(),
        }
    }
}

/// LLM narrative summary configuration.
///
/// When enabled, insight reports include a short model-written summary of the
/// computed scores. Failures here never fail the insights request - the report
/// degrades to scores only.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrativeConfig {
    /// Enable narrative generation
    pub enabled: bool,
    /// Model to use for the summary
    pub model: Option<String>,
    /// API key for the LLM provider (falls back to OPENAI_API_KEY)
    pub api_key: Option<String>,
}

/// Email configuration for lead notifications and password resets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Inbox that receives lead-intake notifications
    pub lead_inbox: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::File {
                path: "/tmp/uplyze-emails".to_string(),
            },
            from_email: "noreply@uplyze.app".to_string(),
            from_name: "Uplyze".to_string(),
            lead_inbox: None,
        }
    }
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        /// SMTP server hostname
        host: String,
        /// SMTP server port
        port: u16,
        /// SMTP authentication username
        username: String,
        /// SMTP authentication password
        password: String,
        /// Use TLS encryption
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4460,
            dashboard_url: "http://localhost:4460".to_string(),
            database_url: None,
            database: DatabaseConfig::default(),
            admin_email: "admin@uplyze.app".to_string(),
            admin_password: None,
            secret_key: None,
            credentials_key: None,
            auth: AuthConfig::default(),
            gateway: GatewayConfig::default(),
            graph: GraphConfig::default(),
            insights: InsightsConfig::default(),
            email: EmailConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("UPLYZE_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // if database_url is set, use it (preserving existing pool settings)
        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.auth.native.enabled && self.secret_key.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: Native authentication is enabled but secret_key is not configured. \
                 Please set UPLYZE_SECRET_KEY environment variable or add secret_key to config file."
                    .to_string(),
            });
        }

        if self.auth.native.password.min_length > self.auth.native.password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    self.auth.native.password.min_length, self.auth.native.password.max_length
                ),
            });
        }

        // Validate JWT expiry duration is reasonable
        if self.auth.security.jwt_expiry.as_secs() < 300 {
            return Err(Error::Internal {
                operation: "Config validation: JWT expiry duration is too short (minimum 5 minutes)".to_string(),
            });
        }

        if self.gateway.daily_request_limit < 1 {
            return Err(Error::Internal {
                operation: "Config validation: gateway.daily_request_limit must be at least 1".to_string(),
            });
        }

        if self.auth.security.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self
            .auth
            .security
            .cors
            .allowed_origins
            .iter()
            .any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.auth.security.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        if self.insights.narrative.enabled && self.insights.narrative.model.is_none() {
            return Err(Error::Internal {
                operation: "Config validation: insights.narrative.enabled requires insights.narrative.model".to_string(),
            });
        }

        Ok(())
    }

    /// The address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The versioned Graph API root, e.g. `https://graph.facebook.com/v23.0`
    pub fn graph_root(&self) -> String {
        format!("{}/{}", self.graph.base_url.as_str().trim_end_matches('/'), self.graph.api_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            secret_key: Some("test-secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_gateway_limit() {
        let config = Config::default();
        assert_eq!(config.gateway.daily_request_limit, 100);
        assert_eq!(config.gateway.api_key_header, "x-api-key");
    }

    #[test]
    fn test_validate_requires_secret_key_for_native_auth() {
        let config = Config::default();
        assert!(config.auth.native.enabled);
        assert!(config.validate().is_err());

        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        let mut config = valid_config();
        config.gateway.daily_request_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_wildcard_cors_with_credentials() {
        let mut config = valid_config();
        config.auth.security.cors.allow_credentials = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_narrative_requires_model() {
        let mut config = valid_config();
        config.insights.narrative.enabled = true;
        assert!(config.validate().is_err());

        config.insights.narrative.model = Some("gpt-4o-mini".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_graph_root() {
        let config = Config::default();
        assert_eq!(config.graph_root(), "https://graph.facebook.com/v23.0");
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "port: 4000\n")?;
            jail.set_env("UPLYZE_GATEWAY__DAILY_REQUEST_LIMIT", "250");
            jail.set_env("DATABASE_URL", "postgres://db.internal:5432/uplyze");

            let args = Args {
                config: "config.yaml".to_string(),
                validate: false,
            };
            let mut config: Config = Config::figment(&args).extract()?;
            if let Some(url) = config.database_url.take() {
                config.database.url = url;
            }

            assert_eq!(config.port, 4000);
            assert_eq!(config.gateway.daily_request_limit, 250);
            assert_eq!(config.database.url, "postgres://db.internal:5432/uplyze");
            Ok(())
        });
    }
}
