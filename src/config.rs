//! Configuration loading and environment variable handling
//!
//! The harness reads a YAML file, applies `REPSTRESS_*` environment overrides
//! and validates the result before anything is dispatched. Only `api_url`,
//! `auth_token` and `request_timeout_secs` feed the lookup client; the
//! `influxdb` section is passed through untouched to the metrics sink.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Placeholder in `api_url` replaced by the lookup key.
pub const KEY_SLOT: &str = "{}";

/// Top level configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StressConfig {
    /// Endpoint template with exactly one `{}` slot for the key
    pub api_url: String,
    /// Sent as `Authorization: Token <auth_token>`
    pub auth_token: String,
    /// Per request timeout. Requests exceeding it count as transport errors.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Metrics database; results are only exported when present
    #[serde(default)]
    pub influxdb: Option<InfluxConfig>,
}

/// InfluxDB 2.x connection parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

impl StressConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Check every field the run depends on.
    pub fn validate(&self) -> ConfigResult<()> {
        let slots = self.api_url.matches(KEY_SLOT).count();
        if slots != 1 {
            return Err(ConfigError::ValidationError(format!(
                "api_url must contain exactly one '{KEY_SLOT}' slot for the lookup key, found {slots}"
            )));
        }
        reqwest::Url::parse(&self.api_url.replace(KEY_SLOT, "example.com")).map_err(|e| {
            ConfigError::ValidationError(format!("api_url is not a valid URL: {e}"))
        })?;

        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth_token cannot be empty".to_string(),
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if let Some(influx) = &self.influxdb {
            influx.validate()?;
        }

        Ok(())
    }
}

impl InfluxConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        reqwest::Url::parse(&self.url).map_err(|e| {
            ConfigError::ValidationError(format!("influxdb.url is not a valid URL: {e}"))
        })?;
        for (field, value) in [("org", &self.org), ("bucket", &self.bucket)] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "influxdb.{field} cannot be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new config loader with the default `REPSTRESS` prefix
    pub fn new() -> Self {
        Self::with_prefix("REPSTRESS")
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<StressConfig> {
        let content = std::fs::read_to_string(path)?;
        self.from_yaml(&content)
    }

    /// Parse YAML content, apply overrides and validate
    pub fn from_yaml(&self, content: &str) -> ConfigResult<StressConfig> {
        let mut config: StressConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&self, config: &mut StressConfig) -> ConfigResult<()> {
        if let Some(url) = self.get_env_var("API_URL") {
            config.api_url = url;
        }

        if let Some(token) = self.get_env_var("AUTH_TOKEN") {
            config.auth_token = token;
        }

        if let Some(timeout) = self.get_env_var("REQUEST_TIMEOUT_SECS") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid {}_REQUEST_TIMEOUT_SECS: {e}", self.prefix))
            })?;
            config.request_timeout_secs = Some(seconds);
        }

        if let Some(ref mut influx) = config.influxdb {
            if let Some(token) = self.get_env_var("INFLUXDB_TOKEN") {
                influx.token = token;
            }
        }

        Ok(())
    }

    fn get_env_var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
api_url: "https://reputation.local/domain/ranking/{}"
auth_token: "I_am_under_stress_when_I_test"
influxdb:
  url: "http://localhost:8086"
  token: "secret"
  org: "acme"
  bucket: "stress_test_bucket"
"#;

    // Each test uses its own prefix so env overrides never leak between tests.
    fn loader(prefix: &str) -> ConfigLoader {
        ConfigLoader::with_prefix(prefix)
    }

    #[test]
    fn loads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();

        let config = loader("REPSTRESS_TEST_FILE").from_file(file.path()).unwrap();
        assert_eq!(config.auth_token, "I_am_under_stress_when_I_test");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.influxdb.unwrap().bucket, "stress_test_bucket");
    }

    #[test]
    fn influx_section_is_optional() {
        let config = loader("REPSTRESS_TEST_NO_INFLUX")
            .from_yaml("api_url: \"http://h/{}\"\nauth_token: t\nrequest_timeout_secs: 5\n")
            .unwrap();
        assert!(config.influxdb.is_none());
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn missing_auth_token_is_a_parse_error() {
        let err = loader("REPSTRESS_TEST_MISSING")
            .from_yaml("api_url: \"http://h/{}\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn rejects_template_without_slot() {
        let err = loader("REPSTRESS_TEST_SLOT")
            .from_yaml("api_url: \"http://h/domain\"\nauth_token: t\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_template_with_two_slots() {
        let err = loader("REPSTRESS_TEST_TWO_SLOTS")
            .from_yaml("api_url: \"http://h/{}/{}\"\nauth_token: t\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_blank_token() {
        let err = loader("REPSTRESS_TEST_BLANK")
            .from_yaml("api_url: \"http://h/{}\"\nauth_token: \"  \"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_incomplete_influx_section() {
        let err = loader("REPSTRESS_TEST_INFLUX")
            .from_yaml(
                "api_url: \"http://h/{}\"\nauth_token: t\ninfluxdb:\n  url: \"http://localhost:8086\"\n  token: x\n  org: \"\"\n  bucket: b\n",
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        std::env::set_var("REPSTRESS_TEST_ENV_AUTH_TOKEN", "from-env");
        std::env::set_var("REPSTRESS_TEST_ENV_REQUEST_TIMEOUT_SECS", "3");

        let config = loader("REPSTRESS_TEST_ENV").from_yaml(VALID).unwrap();
        assert_eq!(config.auth_token, "from-env");
        assert_eq!(config.request_timeout_secs, Some(3));
    }

    #[test]
    fn invalid_env_override_is_reported() {
        std::env::set_var("REPSTRESS_TEST_BAD_ENV_REQUEST_TIMEOUT_SECS", "soon");

        let err = loader("REPSTRESS_TEST_BAD_ENV").from_yaml(VALID).unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    }
}
