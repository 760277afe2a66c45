use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TAX_RATE: f64 = 0.08;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_CART_TTL_HOURS: i64 = 72;
const DEFAULT_SQUARE_API_BASE_URL: &str = "https://connect.squareup.com";
const DEFAULT_GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_CALENDAR_API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

fn validate_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || rate < 0.0 || rate >= 1.0 {
        let mut err = ValidationError::new("default_tax_rate");
        err.message = Some("default_tax_rate must be a finite value in [0.0, 1.0)".into());
        return Err(err);
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("currency must be a 3-letter ISO code".into());
        Err(err)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Fixed checkout tax rate (as decimal, e.g. 0.08 for 8%).
    /// There is no per-jurisdiction tax engine in this service.
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub default_tax_rate: f64,

    /// Default currency for new businesses
    #[serde(default = "default_currency")]
    #[validate(custom = "validate_currency")]
    pub currency: String,

    /// How long a cart stays open before it expires
    #[serde(default = "default_cart_ttl_hours")]
    pub cart_ttl_hours: i64,

    /// Square payments API base URL (overridden in tests)
    #[serde(default = "default_square_api_base_url")]
    pub square_api_base_url: String,

    /// Square access token; empty means payments are not configured
    #[serde(default)]
    pub square_access_token: String,

    /// Bound on a single payment gateway call
    #[serde(default = "default_square_timeout_secs")]
    pub square_timeout_secs: u64,

    /// Google OAuth client credentials for calendar sync
    #[serde(default)]
    pub google_client_id: Option<String>,
    #[serde(default)]
    pub google_client_secret: Option<String>,

    /// OAuth token endpoint (overridden in tests)
    #[serde(default = "default_google_token_url")]
    pub google_token_url: String,

    /// Calendar API base URL (overridden in tests)
    #[serde(default = "default_calendar_api_base_url")]
    pub calendar_api_base_url: String,

    /// Bound on a single calendar API call
    #[serde(default = "default_calendar_timeout_secs")]
    pub calendar_timeout_secs: u64,

    /// Email dispatch API base URL; empty disables outbound email
    #[serde(default)]
    pub email_api_base_url: String,

    /// Email dispatch API key
    #[serde(default)]
    pub email_api_key: Option<String>,

    /// Sender address for confirmation emails
    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// Bound on a single email API call
    #[serde(default = "default_email_timeout_secs")]
    pub email_timeout_secs: u64,

    /// Side-effect queue: bounded channel capacity
    #[serde(default = "default_side_effect_queue_capacity")]
    pub side_effect_queue_capacity: usize,

    /// Side-effect queue: attempts per job before dead-lettering
    #[serde(default = "default_side_effect_max_attempts")]
    pub side_effect_max_attempts: u32,

    /// Side-effect queue: per-attempt timeout (seconds)
    #[serde(default = "default_side_effect_timeout_secs")]
    pub side_effect_timeout_secs: u64,

    /// Side-effect queue: base retry backoff (milliseconds, doubled per attempt)
    #[serde(default = "default_side_effect_backoff_ms")]
    pub side_effect_backoff_ms: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_cart_ttl_hours() -> i64 {
    DEFAULT_CART_TTL_HOURS
}
fn default_square_api_base_url() -> String {
    DEFAULT_SQUARE_API_BASE_URL.to_string()
}
fn default_square_timeout_secs() -> u64 {
    10
}
fn default_google_token_url() -> String {
    DEFAULT_GOOGLE_TOKEN_URL.to_string()
}
fn default_calendar_api_base_url() -> String {
    DEFAULT_CALENDAR_API_BASE_URL.to_string()
}
fn default_calendar_timeout_secs() -> u64 {
    10
}
fn default_email_from() -> String {
    "no-reply@storefront.local".to_string()
}
fn default_email_timeout_secs() -> u64 {
    10
}
fn default_side_effect_queue_capacity() -> usize {
    256
}
fn default_side_effect_max_attempts() -> u32 {
    3
}
fn default_side_effect_timeout_secs() -> u64 {
    15
}
fn default_side_effect_backoff_ms() -> u64 {
    500
}
fn default_event_channel_capacity() -> usize {
    1024
}

impl AppConfig {
    /// Build a config with defaults for everything beyond the essentials.
    /// Used by the test harness; production goes through [`load_config`].
    pub fn new(
        database_url: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            host: host.into(),
            port,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            default_tax_rate: default_tax_rate(),
            currency: default_currency(),
            cart_ttl_hours: default_cart_ttl_hours(),
            square_api_base_url: default_square_api_base_url(),
            square_access_token: String::new(),
            square_timeout_secs: default_square_timeout_secs(),
            google_client_id: None,
            google_client_secret: None,
            google_token_url: default_google_token_url(),
            calendar_api_base_url: default_calendar_api_base_url(),
            calendar_timeout_secs: default_calendar_timeout_secs(),
            email_api_base_url: String::new(),
            email_api_key: None,
            email_from: default_email_from(),
            email_timeout_secs: default_email_timeout_secs(),
            side_effect_queue_capacity: default_side_effect_queue_capacity(),
            side_effect_max_attempts: default_side_effect_max_attempts(),
            side_effect_timeout_secs: default_side_effect_timeout_secs(),
            side_effect_backoff_ms: default_side_effect_backoff_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Load configuration from files and environment.
///
/// Layering (later wins): `config/default.toml`, `config/{environment}.toml`,
/// then `APP__*` environment variables (e.g. `APP__DATABASE_URL`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP__ENVIRONMENT")
        .or_else(|_| env::var("ENVIRONMENT"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("environment", environment)?
        .build()?;

    let app_config: AppConfig = cfg.try_deserialize()?;
    app_config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(app_config)
}

/// Install the global tracing subscriber.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter_directive))
            .with(fmt::layer().json())
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter_directive))
            .with(fmt::layer())
            .try_init();
    }
}
