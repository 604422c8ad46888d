use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_sns::Client as SnsClient;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {message}")]
    LoadError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub alerts: AlertsConfig,
    pub identity: IdentityConfig,
    pub aws: AwsConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_expenses_table")]
    pub expenses_table_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
}

/// Spend alert configuration: topic, threshold, and publish retry budget
#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub topic_arn: String,
    #[serde(default = "default_spend_limit")]
    pub spend_limit: Decimal,
    #[serde(default = "default_alert_retry_attempts")]
    pub alert_retry_attempts: u32,
    #[serde(default = "default_alerts_enabled")]
    pub alerts_enabled: bool,
}

/// Identity policy: the fallback owner used when a request carries no userId.
/// Only meaningful for single-tenant/demo deployments.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_user_id")]
    pub default_user_id: String,
}

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub dynamodb_client: DynamoDbClient,
    pub sns_client: SnsClient,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_service_version")]
    pub service_version: String,
    #[serde(default)]
    pub otlp_endpoint: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub enable_json_logging: bool,
}

impl Config {
    pub async fn from_environment() -> Result<Self, ConfigError> {
        info!("Loading configuration from environment");

        let server = ServerConfig::from_env()?;
        let database = DatabaseConfig::from_env()?;
        let alerts = AlertsConfig::from_env()?;
        let identity = IdentityConfig::from_env()?;
        let observability = ObservabilityConfig::from_env()?;

        // Shared AWS clients, created once per process. Bounded store retry
        // is delegated to the SDK's standard retry mode.
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(database.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(database.retry_max_attempts))
            .load()
            .await;

        let dynamodb_client = DynamoDbClient::new(&aws_config);
        let sns_client = SnsClient::new(&aws_config);

        let aws = AwsConfig {
            region: database.region.clone(),
            dynamodb_client,
            sns_client,
        };

        let config = Config {
            server,
            database,
            alerts,
            identity,
            aws,
            observability,
        };

        config.validate()?;

        info!("Configuration loaded successfully");
        debug!("Configuration: {:?}", config);

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "Server port cannot be 0".to_string(),
            });
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError {
                message: "Request timeout cannot be 0".to_string(),
            });
        }

        if self.database.expenses_table_name.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Expenses table name cannot be empty".to_string(),
            });
        }

        if self.identity.default_user_id.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Default user id cannot be empty".to_string(),
            });
        }

        if self.alerts.alerts_enabled && self.alerts.spend_limit <= Decimal::ZERO {
            return Err(ConfigError::ValidationError {
                message: "Spend limit must be positive".to_string(),
            });
        }

        Ok(())
    }
}

fn section_from_env<T: serde::de::DeserializeOwned>(section: &str) -> Result<T, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::Environment::with_prefix("EXPENSE"))
        .build()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to load {} config: {}", section, e),
        })?;

    settings
        .try_deserialize()
        .map_err(|e| ConfigError::LoadError {
            message: format!("Failed to deserialize {} config: {}", section, e),
        })
}

impl ServerConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        section_from_env("server")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl DatabaseConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        section_from_env("database")
    }
}

impl AlertsConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        section_from_env("alerts")
    }
}

impl IdentityConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        section_from_env("identity")
    }
}

impl ObservabilityConfig {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        section_from_env("observability")
    }
}

// Default value functions
pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8080
}

pub(crate) fn default_timeout() -> u64 {
    30
}

pub(crate) fn default_expenses_table() -> String {
    "Expense".to_string()
}

pub(crate) fn default_region() -> String {
    "us-east-1".to_string()
}

pub(crate) fn default_retry_max_attempts() -> u32 {
    3
}

pub(crate) fn default_spend_limit() -> Decimal {
    Decimal::new(10_000, 0)
}

pub(crate) fn default_alert_retry_attempts() -> u32 {
    3
}

pub(crate) fn default_alerts_enabled() -> bool {
    true
}

pub(crate) fn default_user_id() -> String {
    "default_user".to_string()
}

pub(crate) fn default_service_name() -> String {
    "expense-tracker-rs".to_string()
}

pub(crate) fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub(crate) fn default_log_level() -> String {
    "info".to_string()
}
