use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::workflows::backoff::{
    BackoffPolicy, DEFAULT_COOLDOWN_FLOOR, DEFAULT_INITIAL_WAIT, DEFAULT_MAX_WAIT, DEFAULT_MULTIPLIER,
};

/// Placeholder in operation payloads replaced by the configured password
pub const PASSWORD_PLACEHOLDER: &str = "{{password}}";

const DEFAULT_CONFIG_NAME: &str = "device-restarter";
const ENV_PREFIX: &str = "DEVICE_RESTARTER";

/// Main configuration structure for the device restarter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestarterConfig {
    /// Target device and the requests sent to it
    pub device: DeviceConfig,
    /// Retry timing
    pub backoff: BackoffConfig,
    /// Driver loop settings
    pub driver: DriverConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Base URL of the device's web interface
    pub base_url: String,
    /// Request header that carries the session token on every POST
    pub session_header: String,
    /// Substituted for `{{password}}` in payloads (can be set via env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Per-request timeout
    pub request_timeout_ms: u64,
    /// Path fetched to obtain the session cookie
    pub root_path: String,
    pub initialize: OperationConfig,
    pub authenticate: OperationConfig,
    pub apply: OperationConfig,
}

/// One POST endpoint of the device
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationConfig {
    /// Path relative to `base_url`
    pub path: String,
    /// JSON body template
    pub payload: String,
    /// Text the response body must contain for the call to count as a success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_marker: Option<String>,
}

impl OperationConfig {
    /// Payload with the password placeholder filled in
    pub fn render_payload(&self, password: &str) -> String {
        self.payload.replace(PASSWORD_PLACEHOLDER, password)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    /// First retry delay after a failure
    pub initial_wait_ms: u64,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
    /// Ceiling at which the wait wraps back to `initial_wait_ms`
    pub max_wait_ms: u64,
    /// Minimum settle time after a successful apply
    pub cooldown_floor_ms: u64,
}

impl BackoffConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_wait: Duration::from_millis(self.initial_wait_ms),
            multiplier: self.multiplier,
            max_wait: Duration::from_millis(self.max_wait_ms),
            cooldown_floor: Duration::from_millis(self.cooldown_floor_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    /// Delay between ticks of the workflow
    pub tick_interval_ms: u64,
    /// Stop the driver once a cycle completes instead of idling
    pub exit_on_success: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("device.base_url {url:?} is not a valid URL: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("backoff.multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("backoff.max_wait_ms ({max_wait_ms}) must exceed backoff.initial_wait_ms ({initial_wait_ms})")]
    MaxWaitTooSmall { initial_wait_ms: u64, max_wait_ms: u64 },

    #[error("device.{operation}.payload is not valid JSON: {source}")]
    InvalidPayload {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Default for RestarterConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                base_url: "http://192.168.0.1".to_string(),
                session_header: "frkrouter".to_string(),
                password: None, // Read from DEVICE_RESTARTER__DEVICE__PASSWORD or a config file
                request_timeout_ms: 10_000,
                root_path: "/".to_string(),
                initialize: OperationConfig {
                    path: "/cgi-bin/init_page.cgi".to_string(),
                    payload: r#"{"command": "load"}"#.to_string(),
                    success_marker: None,
                },
                authenticate: OperationConfig {
                    path: "/cgi-bin/login.cgi".to_string(),
                    payload: r#"{"command": "log_in", "params": {"password": "{{password}}"}}"#
                        .to_string(),
                    success_marker: Some("Success".to_string()),
                },
                apply: OperationConfig {
                    path: "/cgi-bin/settings.advanced_router-lan_settings.cgi".to_string(),
                    payload: DEFAULT_APPLY_PAYLOAD.to_string(),
                    success_marker: Some("OK".to_string()),
                },
            },
            backoff: BackoffConfig {
                initial_wait_ms: DEFAULT_INITIAL_WAIT.as_millis() as u64,
                multiplier: DEFAULT_MULTIPLIER,
                max_wait_ms: DEFAULT_MAX_WAIT.as_millis() as u64,
                cooldown_floor_ms: DEFAULT_COOLDOWN_FLOOR.as_millis() as u64,
            },
            driver: DriverConfig {
                tick_interval_ms: 1_000,
                exit_on_success: false,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

// Re-saving the LAN settings makes the router restart.
const DEFAULT_APPLY_PAYLOAD: &str = r#"{"command":"save","params":null,"data":{"ip_addr1":"0","ip_addr2":"1","subnet_mask":"255.255.255.0","vpn_passthrough":"on","dhcp_server":"on","dhcp_ip_st1":"0","dhcp_ip_st2":"100","dhcp_ip_ed1":"0","dhcp_ip_ed2":"254","dhcp_lease_time":"7200","dns_manual_mode":"off","dns_addr1":"","dns_addr2":"","upnp":"off","out_of_service_notification":"off","nat_timeout":"200"}}"#;

impl RestarterConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. `path` if given, otherwise device-restarter.toml when present
    /// 3. Environment variables (DEVICE_RESTARTER__SECTION__FIELD)
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: RestarterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the workflow cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.device.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.device.base_url.clone(),
            reason: e.to_string(),
        })?;

        if self.device.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("device.request_timeout_ms"));
        }
        if self.driver.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("driver.tick_interval_ms"));
        }

        let backoff = &self.backoff;
        if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(backoff.multiplier));
        }
        if backoff.initial_wait_ms == 0 {
            return Err(ConfigError::ZeroDuration("backoff.initial_wait_ms"));
        }
        if backoff.max_wait_ms <= backoff.initial_wait_ms {
            return Err(ConfigError::MaxWaitTooSmall {
                initial_wait_ms: backoff.initial_wait_ms,
                max_wait_ms: backoff.max_wait_ms,
            });
        }

        let password = self.device.password.as_deref().unwrap_or_default();
        for (operation, op) in [
            ("initialize", &self.device.initialize),
            ("authenticate", &self.device.authenticate),
            ("apply", &self.device.apply),
        ] {
            serde_json::from_str::<serde_json::Value>(&op.render_payload(password))
                .map_err(|source| ConfigError::InvalidPayload { operation, source })?;
        }

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
