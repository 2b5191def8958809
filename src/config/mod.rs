use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::telemetry::TelemetryConfig;
use crate::transport::live::ReconnectPolicy;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub session_cookie: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_dropdown_size")]
    pub dropdown_size: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default)]
    pub metrics_listen_addr: Option<String>,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_page_size() -> u32 {
    crate::usecase::notifications::DEFAULT_PAGE_SIZE
}

fn default_dropdown_size() -> usize {
    crate::delivery::view::DEFAULT_DROPDOWN_SIZE
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_reconnect_base_ms() -> u64 {
    500
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_telemetry_service_name() -> String {
    "engage-notify".to_string()
}

fn default_telemetry_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

impl AppConfig {
    /// Reads `ENGAGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::with_prefix("ENGAGE"))
    }

    pub fn from_source(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(environment)
            .build()?
            .try_deserialize()
    }

    pub fn display_name(&self) -> String {
        self.user_name.clone().unwrap_or_else(|| self.user_id.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_base_ms),
            Duration::from_millis(self.reconnect_max_ms),
        )
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.telemetry_service_name.clone(),
            service_version: self.telemetry_service_version.clone(),
            environment: self.telemetry_environment.clone(),
            otlp_endpoint: self.telemetry_otlp_endpoint.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let source = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_source(Environment::with_prefix("ENGAGE").source(Some(source)))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("ENGAGE_API_BASE_URL", "https://engage.example.com"),
            ("ENGAGE_USER_ID", "u-42"),
        ])
        .unwrap();

        assert_eq!(config.api_base_url, "https://engage.example.com");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.dropdown_size, 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(
            config.reconnect_policy(),
            ReconnectPolicy::new(Duration::from_millis(500), Duration::from_secs(30))
        );
        assert!(config.ws_url.is_none());
        assert!(!config.telemetry_enabled);
        assert_eq!(config.display_name(), "u-42");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ENGAGE_API_BASE_URL", "https://engage.example.com"),
            ("ENGAGE_USER_ID", "u-42"),
            ("ENGAGE_USER_NAME", "Dana Scully"),
            ("ENGAGE_WS_URL", "wss://engage.example.com/ws/notifications"),
            ("ENGAGE_PAGE_SIZE", "50"),
            ("ENGAGE_POLL_INTERVAL_SECS", "5"),
            ("ENGAGE_TELEMETRY_ENABLED", "true"),
        ])
        .unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(
            config.ws_url.as_deref(),
            Some("wss://engage.example.com/ws/notifications")
        );
        assert!(config.telemetry_enabled);
        assert_eq!(config.display_name(), "Dana Scully");
        assert_eq!(config.telemetry_config().service_name, "engage-notify");
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        assert!(load(&[("ENGAGE_USER_ID", "u-42")]).is_err());
    }
}
