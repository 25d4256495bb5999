//! Environment-driven configuration, resolved once at start-up.

use std::env;
use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use chrono_tz::Tz;
use tally_agent_bedrock_model::{DEFAULT_MODEL_ID, DEFAULT_REGION};
use thiserror::Error;

/// The service name reported to the trace collector by default.
pub const DEFAULT_SERVICE_NAME: &str = "tally-agent";

/// The OTLP collector endpoint used by default.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Variables whose presence marks a managed deployment.
pub const MANAGED_DEPLOYMENT_VARS: [&str; 3] = [
    "AWS_EXECUTION_ENV",
    "AWS_LAMBDA_FUNCTION_NAME",
    "BEDROCK_AGENTCORE_RUNTIME_ID",
];

/// An environment variable holds a value that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `LOG_LEVEL` is not a known level name.
    #[error("unknown log level `{0}`")]
    InvalidLogLevel(String),
    /// `DEFAULT_TIMEZONE` is not an IANA timezone name.
    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),
}

/// Verbosity of the log output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the directive understood by `EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" | "NOTSET" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "CRITICAL" | "FATAL" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_owned())),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Settings resolved once at start-up and shared read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// `LOG_LEVEL`, `INFO` when unset.
    pub log_level: LogLevel,
    /// `BEDROCK_MODEL_ID`, the model or inference profile to talk to.
    pub model_id: String,
    /// `AWS_REGION`, then `AWS_DEFAULT_REGION`.
    pub region: String,
    /// `AWS_BEARER_TOKEN_BEDROCK`, the Bedrock API key.
    pub api_key: Option<String>,
    /// Whether the process runs inside a managed deployment, which turns
    /// telemetry on.
    pub managed_deployment: bool,
    /// `OTEL_SERVICE_NAME`.
    pub service_name: String,
    /// `DEFAULT_TIMEZONE`, used by `current_time` when the model does not
    /// ask for a zone.
    pub default_timezone: Tz,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`.
    pub otlp_endpoint: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves the configuration through an arbitrary variable lookup.
    ///
    /// Unset variables fall back to their defaults. `BEDROCK_MODEL_ID` is
    /// taken verbatim when set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let log_level = match non_empty("LOG_LEVEL") {
            Some(level) => level.parse()?,
            None => LogLevel::default(),
        };
        let default_timezone = match non_empty("DEFAULT_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name))?,
            None => Tz::UTC,
        };

        Ok(Self {
            log_level,
            model_id: lookup("BEDROCK_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_owned()),
            region: non_empty("AWS_REGION")
                .or_else(|| non_empty("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            api_key: non_empty("AWS_BEARER_TOKEN_BEDROCK"),
            managed_deployment: MANAGED_DEPLOYMENT_VARS
                .into_iter()
                .any(|key| non_empty(key).is_some()),
            service_name: non_empty("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned()),
            default_timezone,
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_owned()),
        })
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("model_id", &self.model_id)
            .field("region", &self.region)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("managed_deployment", &self.managed_deployment)
            .field("service_name", &self.service_name)
            .field("default_timezone", &self.default_timezone)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .finish()
    }
}
