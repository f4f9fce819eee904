use crate::auth::DEFAULT_IDENTITY_TIMEOUT;
use crate::domains::sync::DEFAULT_SYNC_INTERVAL;
use crate::errors::ServiceError;
use log::warn;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://gatehouse.db?mode=rwc";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration of the core.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    pub database_url: String,
    pub device_name: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    /// Session token of the signed-in company account.
    pub access_token: Option<String>,
    /// Local storage cap in bytes. `None` leaves storage unbounded.
    pub storage_capacity: Option<u64>,
    pub sync_interval: Duration,
    pub identity_timeout: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            device_name: None,
            api_url: None,
            api_key: None,
            access_token: None,
            storage_capacity: None,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            identity_timeout: DEFAULT_IDENTITY_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// JSON accepted by the host initializer. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub database_url: Option<String>,
    pub device_name: Option<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub storage_capacity: Option<u64>,
    pub sync_interval_secs: Option<u64>,
    pub identity_timeout_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

impl CoreConfig {
    /// Read `GATEHOUSE_*` variables, loading a `.env` file first when present.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Environment configuration with the fields of `json` taking precedence.
    pub fn from_json(json: &str) -> Result<Self, ServiceError> {
        let overlay: ConfigOverlay = if json.trim().is_empty() {
            ConfigOverlay::default()
        } else {
            serde_json::from_str(json)
                .map_err(|e| ServiceError::Configuration(format!("Invalid configuration JSON: {}", e)))?
        };
        let mut config = Self::from_env();
        config.apply(overlay);
        Ok(config)
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("GATEHOUSE_DB_URL") {
            config.database_url = url;
        }
        config.device_name = non_empty("GATEHOUSE_DEVICE_NAME");
        config.api_url = non_empty("GATEHOUSE_API_URL");
        config.api_key = non_empty("GATEHOUSE_API_KEY");
        config.storage_capacity = parse_number("GATEHOUSE_STORAGE_CAPACITY", non_empty("GATEHOUSE_STORAGE_CAPACITY"));
        if let Some(secs) = parse_number("GATEHOUSE_SYNC_INTERVAL_SECS", non_empty("GATEHOUSE_SYNC_INTERVAL_SECS")) {
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_number("GATEHOUSE_IDENTITY_TIMEOUT_MS", non_empty("GATEHOUSE_IDENTITY_TIMEOUT_MS")) {
            config.identity_timeout = Duration::from_millis(ms);
        }
        config
    }

    pub fn apply(&mut self, overlay: ConfigOverlay) {
        if let Some(url) = overlay.database_url {
            self.database_url = url;
        }
        if overlay.device_name.is_some() {
            self.device_name = overlay.device_name;
        }
        if overlay.api_url.is_some() {
            self.api_url = overlay.api_url;
        }
        if overlay.api_key.is_some() {
            self.api_key = overlay.api_key;
        }
        if overlay.access_token.is_some() {
            self.access_token = overlay.access_token;
        }
        if overlay.storage_capacity.is_some() {
            self.storage_capacity = overlay.storage_capacity;
        }
        if let Some(secs) = overlay.sync_interval_secs {
            self.sync_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = overlay.identity_timeout_ms {
            self.identity_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = overlay.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overlay.connect_timeout_secs {
            self.connect_timeout = Duration::from_secs(secs);
        }
    }

    /// Whether the remote backend can be reached at all.
    pub fn remote_configured(&self) -> bool {
        self.api_url.is_some() && self.api_key.is_some()
    }
}

fn parse_number(name: &str, value: Option<String>) -> Option<u64> {
    let value = value?;
    match value.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a number", name, value);
            None
        }
    }
}
