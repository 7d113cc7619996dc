use serde::Deserialize;

use crate::domain::api_key::KeyLimits;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub key_manager: KeyManagerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings consumed by the key lifecycle engine
#[derive(Debug, Clone, Deserialize)]
pub struct KeyManagerConfig {
    /// Secret the encryption key is derived from
    pub encryption_secret: String,
    /// Secret for signing lookup-index entries
    pub hmac_secret: String,
    /// Prefix every issued credential starts with
    #[serde(default = "default_credential_prefix")]
    pub credential_prefix: String,
    #[serde(default = "default_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_name_length")]
    pub max_owner_length: usize,
    #[serde(default = "default_scope_length")]
    pub max_scope_length: usize,
    #[serde(default = "default_scope_count")]
    pub max_scopes: usize,
    /// Default key lifetime in days when creation passes no expiry (None = never)
    #[serde(default)]
    pub default_expiration_days: Option<i64>,
    /// Substitute deterministic crypto for reproducible fixtures
    #[serde(default)]
    pub deterministic_crypto: bool,
    /// Deployment is production; deterministic crypto is rejected here
    #[serde(default)]
    pub production: bool,
}

fn default_credential_prefix() -> String {
    "km_".to_string()
}

fn default_name_length() -> usize {
    255
}

fn default_scope_length() -> usize {
    100
}

fn default_scope_count() -> usize {
    50
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            encryption_secret: String::new(),
            hmac_secret: String::new(),
            credential_prefix: default_credential_prefix(),
            max_name_length: default_name_length(),
            max_owner_length: default_name_length(),
            max_scope_length: default_scope_length(),
            max_scopes: default_scope_count(),
            default_expiration_days: None,
            deterministic_crypto: false,
            production: false,
        }
    }
}

impl KeyManagerConfig {
    /// Input caps in the form the validation layer consumes
    pub fn limits(&self) -> KeyLimits {
        KeyLimits {
            max_name_length: self.max_name_length,
            max_owner_length: self.max_owner_length,
            max_scope_length: self.max_scope_length,
            max_scopes: self.max_scopes,
        }
    }

    /// Reject contradictory or unsafe combinations
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.deterministic_crypto && self.production {
            return Err(config::ConfigError::Message(
                "deterministic crypto must not be enabled in a production deployment".to_string(),
            ));
        }

        if self.encryption_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "key_manager.encryption_secret is required".to_string(),
            ));
        }

        if self.hmac_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "key_manager.hmac_secret is required".to_string(),
            ));
        }

        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("KEYMASTER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.key_manager.validate()?;

        Ok(config)
    }
}
