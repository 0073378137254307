//! Configuration types for the r53ddns agent
//!
//! Configuration comes from environment variables only. [`AgentConfig::from_env`]
//! reads the process environment; [`AgentConfig::from_lookup`] takes any key
//! lookup so tests never have to mutate the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hostname::validate_normalize_hostnames;

/// Environment variable names
pub mod keys {
    pub const HOSTNAMES: &str = "R53DDNS_HOSTNAMES";
    pub const AWS_ACCESS_KEY_ID: &str = "R53DDNS_AWS_ACCESS_KEY_ID";
    pub const AWS_SECRET_ACCESS_KEY: &str = "R53DDNS_AWS_SECRET_ACCESS_KEY";
    pub const AWS_REGION: &str = "R53DDNS_AWS_REGION";
    pub const POLL_INTERVAL_SECS: &str = "R53DDNS_POLL_INTERVAL_SECS";
    pub const LOOKUP_TIMEOUT_SECS: &str = "R53DDNS_LOOKUP_TIMEOUT_SECS";
    pub const IPV6_ENABLED: &str = "R53DDNS_IPV6_ENABLED";
    pub const CACHE_RECORDS: &str = "R53DDNS_CACHE_RECORDS";
    pub const CHANGE_POLL_INTERVAL_SECS: &str = "R53DDNS_CHANGE_POLL_INTERVAL_SECS";
    pub const CHANGE_INSYNC_LIMIT_SECS: &str = "R53DDNS_CHANGE_INSYNC_LIMIT_SECS";
    pub const HEALTH_HOST: &str = "R53DDNS_HEALTH_HOST";
    pub const HEALTH_PORT: &str = "R53DDNS_HEALTH_PORT";
    pub const LOG_LEVEL: &str = "R53DDNS_LOG_LEVEL";
    pub const LOG_FORMAT: &str = "R53DDNS_LOG_FORMAT";
    pub const MODE: &str = "R53DDNS_MODE";
}

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Normalized hostnames to manage
    pub hostnames: Vec<String>,

    /// Provider credentials
    pub credentials: AwsCredentials,

    /// Public IP polling
    #[serde(default)]
    pub poller: PollerConfig,

    /// Serve cached record sets instead of re-fetching every cycle
    #[serde(default = "default_cache_records")]
    pub cache_records: bool,

    /// Convergence wait budget for submitted changes
    #[serde(default)]
    pub change_wait: ChangeWaitConfig,

    /// Health endpoint
    #[serde(default)]
    pub health: HealthConfig,

    /// Log output
    #[serde(default)]
    pub logging: LogConfig,

    /// What the daemon should do
    #[serde(default)]
    pub mode: RunMode,
}

impl AgentConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let hostnames = env
            .get_string(keys::HOSTNAMES)?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let config = Self {
            hostnames: validate_normalize_hostnames(&hostnames)?,
            credentials: AwsCredentials {
                access_key_id: env.get_string(keys::AWS_ACCESS_KEY_ID)?,
                secret_access_key: env.get_string(keys::AWS_SECRET_ACCESS_KEY)?,
                region: env
                    .get_string_or_none(keys::AWS_REGION)
                    .unwrap_or_else(default_region),
            },
            poller: PollerConfig {
                interval_secs: env
                    .get_number_or_none(keys::POLL_INTERVAL_SECS)?
                    .unwrap_or_else(default_poll_interval_secs),
                lookup_timeout_secs: env
                    .get_number_or_none(keys::LOOKUP_TIMEOUT_SECS)?
                    .unwrap_or_else(default_lookup_timeout_secs),
                ipv6_enabled: env
                    .get_bool_or_none(keys::IPV6_ENABLED)?
                    .unwrap_or(false),
            },
            cache_records: env
                .get_bool_or_none(keys::CACHE_RECORDS)?
                .unwrap_or_else(default_cache_records),
            change_wait: ChangeWaitConfig {
                poll_interval_secs: env
                    .get_number_or_none(keys::CHANGE_POLL_INTERVAL_SECS)?
                    .unwrap_or_else(default_change_poll_interval_secs),
                insync_limit_secs: env
                    .get_number_or_none(keys::CHANGE_INSYNC_LIMIT_SECS)?
                    .unwrap_or_else(default_change_insync_limit_secs),
            },
            health: HealthConfig {
                host: env
                    .get_string_or_none(keys::HEALTH_HOST)
                    .unwrap_or_else(default_health_host),
                port: env.get_number_or_none(keys::HEALTH_PORT)?,
            },
            logging: LogConfig {
                level: env
                    .get_string_or_none(keys::LOG_LEVEL)
                    .unwrap_or_else(default_log_level),
                format: env
                    .get_parsed_or_none(keys::LOG_FORMAT)?
                    .unwrap_or_default(),
            },
            mode: env.get_parsed_or_none(keys::MODE)?.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.hostnames.is_empty() {
            return Err(Error::config(format!(
                "{} must contain at least one hostname",
                keys::HOSTNAMES
            )));
        }

        self.credentials.validate()?;
        self.poller.validate()?;
        self.change_wait.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

/// Route 53 credentials
///
/// The Debug implementation never exposes the secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_key_id.is_empty() {
            return Err(Error::config(format!(
                "{} cannot be empty",
                keys::AWS_ACCESS_KEY_ID
            )));
        }
        if self.secret_access_key.is_empty() {
            return Err(Error::config(format!(
                "{} cannot be empty",
                keys::AWS_SECRET_ACCESS_KEY
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<REDACTED>")
            .field("region", &self.region)
            .finish()
    }
}

/// Public IP poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Time between polls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound for a single lookup (in seconds)
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,

    /// Whether to look up an IPv6 address at all
    #[serde(default)]
    pub ipv6_enabled: bool,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config(format!(
                "{} must be > 0",
                keys::POLL_INTERVAL_SECS
            )));
        }
        if self.lookup_timeout_secs == 0 {
            return Err(Error::config(format!(
                "{} must be > 0",
                keys::LOOKUP_TIMEOUT_SECS
            )));
        }
        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
            ipv6_enabled: false,
        }
    }
}

/// Convergence wait budget: poll every `poll_interval_secs` until
/// `insync_limit_secs` have elapsed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeWaitConfig {
    #[serde(default = "default_change_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_change_insync_limit_secs")]
    pub insync_limit_secs: u64,
}

impl ChangeWaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn insync_limit(&self) -> Duration {
        Duration::from_secs(self.insync_limit_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config(format!(
                "{} must be > 0",
                keys::CHANGE_POLL_INTERVAL_SECS
            )));
        }
        if self.insync_limit_secs < self.poll_interval_secs {
            return Err(Error::config(format!(
                "{} must be >= {}",
                keys::CHANGE_INSYNC_LIMIT_SECS,
                keys::CHANGE_POLL_INTERVAL_SECS
            )));
        }
        Ok(())
    }
}

impl Default for ChangeWaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_change_poll_interval_secs(),
            insync_limit_secs: default_change_insync_limit_secs(),
        }
    }
}

/// Health endpoint configuration; disabled when `port` is unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: default_health_host(),
            port: None,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl LogConfig {
    pub fn validate(&self) -> Result<()> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(Error::config(format!(
                "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                keys::LOG_LEVEL,
                self.level
            ))),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::config(format!(
                "{} '{}' is not valid. Valid formats: text, json",
                keys::LOG_FORMAT,
                other
            ))),
        }
    }
}

/// Daemon operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Poll and reconcile
    #[default]
    Run,
    /// Read from the provider but only log intended changes
    DryRun,
    /// Print an IAM policy document for the configured hostnames and exit
    Policy,
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "run" => Ok(RunMode::Run),
            "dry-run" => Ok(RunMode::DryRun),
            "policy" => Ok(RunMode::Policy),
            other => Err(Error::config(format!(
                "{} '{}' is not supported. Supported modes: run, dry-run, policy",
                keys::MODE,
                other
            ))),
        }
    }
}

/// Typed access to a key lookup
struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get_string_or_none(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_string(&self, key: &str) -> Result<String> {
        self.get_string_or_none(key)
            .ok_or_else(|| Error::config(format!("{} is required", key)))
    }

    fn get_number_or_none<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        self.get_string_or_none(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| {
                    Error::config(format!("{} must be a number. Got: '{}'", key, raw))
                })
            })
            .transpose()
    }

    fn get_bool_or_none(&self, key: &str) -> Result<Option<bool>> {
        self.get_string_or_none(key)
            .map(|raw| match raw.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::config(format!(
                    "{} must be 'true' or 'false'. Got: '{}'",
                    key, raw
                ))),
            })
            .transpose()
    }

    fn get_parsed_or_none<T: FromStr<Err = Error>>(&self, key: &str) -> Result<Option<T>> {
        self.get_string_or_none(key)
            .map(|raw| raw.parse::<T>())
            .transpose()
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_lookup_timeout_secs() -> u64 {
    10
}

fn default_cache_records() -> bool {
    true
}

fn default_change_poll_interval_secs() -> u64 {
    5
}

fn default_change_insync_limit_secs() -> u64 {
    300
}

fn default_health_host() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (keys::HOSTNAMES, "Home.Example.com, *.lab.example.com"),
            (keys::AWS_ACCESS_KEY_ID, "AKIDEXAMPLE"),
            (keys::AWS_SECRET_ACCESS_KEY, "wJalrXUtnFEMI"),
        ]
    }

    #[test]
    fn test_defaults_when_only_required_set() {
        let config = AgentConfig::from_lookup(lookup_from(&required())).unwrap();

        assert_eq!(
            config.hostnames,
            vec![
                "home.example.com.".to_string(),
                "\\052.lab.example.com.".to_string()
            ]
        );
        assert_eq!(config.credentials.region, "us-east-1");
        assert_eq!(config.poller.interval_secs, 300);
        assert_eq!(config.poller.lookup_timeout_secs, 10);
        assert!(!config.poller.ipv6_enabled);
        assert!(config.cache_records);
        assert_eq!(config.health.port, None);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.mode, RunMode::Run);
    }

    #[test]
    fn test_parses_typed_values() {
        let mut pairs = required();
        pairs.extend([
            (keys::POLL_INTERVAL_SECS, "60"),
            (keys::IPV6_ENABLED, "TRUE"),
            (keys::CACHE_RECORDS, "false"),
            (keys::HEALTH_PORT, "9080"),
            (keys::LOG_FORMAT, "json"),
            (keys::MODE, "dry-run"),
        ]);

        let config = AgentConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.poller.interval(), Duration::from_secs(60));
        assert!(config.poller.ipv6_enabled);
        assert!(!config.cache_records);
        assert_eq!(config.health.port, Some(9080));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.mode, RunMode::DryRun);
    }

    #[test]
    fn test_missing_required_is_config_error() {
        let pairs = vec![(keys::HOSTNAMES, "home.example.com")];
        let err = AgentConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(keys::AWS_ACCESS_KEY_ID));
    }

    #[test]
    fn test_non_numeric_is_config_error() {
        let mut pairs = required();
        pairs.push((keys::POLL_INTERVAL_SECS, "NotNumber"));
        let err = AgentConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_non_boolean_is_config_error() {
        let mut pairs = required();
        pairs.push((keys::IPV6_ENABLED, "NotBoolean"));
        let err = AgentConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_hostname_is_config_error() {
        let mut pairs = required();
        pairs[0] = (keys::HOSTNAMES, "NotA,Valid Record");
        assert!(AgentConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut pairs = required();
        pairs.push((keys::LOG_LEVEL, "fake-level"));
        assert!(AgentConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_insync_limit_below_poll_interval_rejected() {
        let mut pairs = required();
        pairs.push((keys::CHANGE_POLL_INTERVAL_SECS, "10"));
        pairs.push((keys::CHANGE_INSYNC_LIMIT_SECS, "5"));
        assert!(AgentConfig::from_lookup(lookup_from(&pairs)).is_err());
    }

    #[test]
    fn test_secret_not_exposed_in_debug() {
        let config = AgentConfig::from_lookup(lookup_from(&required())).unwrap();
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("wJalrXUtnFEMI"));
        assert!(debug_str.contains("AKIDEXAMPLE"));
    }
}
