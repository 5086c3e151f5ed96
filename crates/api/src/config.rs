use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// Per-operation attempt limits for the public form endpoints
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    /// Submission pipeline tuning
    #[serde(default)]
    pub forms: FormsConfig,
    /// JWT verification for operator endpoints
    pub jwt: JwtAuthConfig,
    /// Verification code delivery
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Pool settings in the shape the persistence crate expects.
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Request budget for authenticated operator endpoints
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

/// Attempt budgets for anonymous form traffic, counted per client identifier
/// within a fixed window.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    #[serde(default = "default_form_fetch_attempts")]
    pub form_fetch: u32,

    #[serde(default = "default_submit_attempts")]
    pub submit: u32,

    #[serde(default = "default_validate_email_attempts")]
    pub validate_email: u32,

    #[serde(default = "default_resend_code_attempts")]
    pub resend_code: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// How often expired limiter entries are purged
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            form_fetch: default_form_fetch_attempts(),
            submit: default_submit_attempts(),
            validate_email: default_validate_email_attempts(),
            resend_code: default_resend_code_attempts(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormsConfig {
    /// Lifetime of an emailed validation code
    #[serde(default = "default_code_ttl_minutes")]
    pub validation_code_ttl_minutes: i64,

    /// Statement timeout for `test-sql` trial executions
    #[serde(default = "default_trial_query_timeout_ms")]
    pub trial_query_timeout_ms: u64,

    /// Statement timeout applied inside the propagation transaction
    #[serde(default = "default_propagation_timeout_ms")]
    pub propagation_timeout_ms: u64,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            validation_code_ttl_minutes: default_code_ttl_minutes(),
            trial_query_timeout_ms: default_trial_query_timeout_ms(),
            propagation_timeout_ms: default_propagation_timeout_ms(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_body_size() -> usize {
    1_048_576
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_rate_limit() -> u32 {
    100
}
fn default_form_fetch_attempts() -> u32 {
    10
}
fn default_submit_attempts() -> u32 {
    10
}
fn default_validate_email_attempts() -> u32 {
    10
}
fn default_resend_code_attempts() -> u32 {
    3
}
fn default_window_secs() -> u64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_code_ttl_minutes() -> i64 {
    domain::services::DEFAULT_CODE_TTL_MINUTES
}
fn default_trial_query_timeout_ms() -> u64 {
    2000
}
fn default_propagation_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA private key in PEM format, used only by tooling that mints operator tokens
    pub private_key: String,

    /// RSA public key in PEM format for verifying operator tokens
    pub public_key: String,

    /// Access token expiration in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: i64,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

fn default_access_token_expiry() -> i64 {
    3600
}

fn default_jwt_leeway() -> u64 {
    30
}

/// Outbound email configuration for validation codes.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Email provider: console (development) or sendgrid
    #[serde(default = "default_email_provider")]
    pub provider: String,

    /// SendGrid API key (for sendgrid provider)
    #[serde(default)]
    pub sendgrid_api_key: String,

    /// Sender email address (From header)
    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    /// Sender name (From header)
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Email template style: html or plain
    #[serde(default = "default_template_style")]
    pub template_style: String,

    /// When true the console provider prints the code itself; never enable in production
    #[serde(default)]
    pub log_codes: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_email_provider(),
            sendgrid_api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            template_style: default_template_style(),
            log_codes: false,
        }
    }
}

fn default_email_provider() -> String {
    "console".to_string()
}

fn default_sender_email() -> String {
    "no-reply@parish.example".to_string()
}

fn default_sender_name() -> String {
    "Parish Office".to_string()
}

fn default_template_style() -> String {
    "html".to_string()
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with PM__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PM").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Built from embedded defaults so tests don't depend on the working directory.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30
            max_body_size = 1048576

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            rate_limit_per_minute = 100

            [rate_limits]
            form_fetch = 10
            submit = 10
            validate_email = 10
            resend_code = 3
            window_secs = 60
            sweep_interval_secs = 60

            [forms]
            validation_code_ttl_minutes = 15
            trial_query_timeout_ms = 2000
            propagation_timeout_ms = 5000

            [jwt]
            private_key = "test-private-key"
            public_key = "test-public-key"
            access_token_expiry_secs = 3600
            leeway_secs = 30

            [email]
            provider = "console"
            sender_email = "test@example.com"
            sender_name = "Test"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "PM__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.rate_limits.window_secs == 0 || self.rate_limits.sweep_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "rate_limits.window_secs and rate_limits.sweep_interval_secs must be positive"
                    .to_string(),
            ));
        }

        if self.forms.validation_code_ttl_minutes <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "forms.validation_code_ttl_minutes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
