use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

use crate::labels::DEFAULT_ROUTER_PREFIX;

/// Filter used when `LOG_LEVEL` is not a level we know.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Numeric environment variables, parsed by figment.
const NUMERIC_ENV_KEYS: &[&str] = &["DISCOVERY_INTERVAL", "ALIVE_INTERVAL"];

/// String environment variables and their fields, taken verbatim so values
/// like `0042` keep their exact text.
const STRING_ENV_KEYS: &[(&str, &str)] = &[
    ("LOG_LEVEL", "log_level"),
    ("SERVER_NAME", "server_name"),
    ("ENDPOINT", "endpoint"),
    ("ENDPOINT_KEY", "endpoint_key"),
    ("ROUTER_PREFIX", "router_prefix"),
];

#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(deserialize_with = "plain_string")]
    pub log_level: String,
    #[serde(deserialize_with = "plain_string")]
    pub server_name: String,
    #[serde(deserialize_with = "plain_string")]
    pub endpoint: String,
    #[serde(
        default,
        deserialize_with = "plain_string_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub endpoint_key: Option<String>,
    /// Seconds between incremental discoveries. `<= 0` disables them.
    pub discovery_interval: i64,
    /// Seconds between full alive snapshots. `<= 0` disables them.
    pub alive_interval: i64,
    #[serde(deserialize_with = "plain_string")]
    pub router_prefix: String,
}

/// A scalar setting as figment parsed it. File values such as `42` or
/// `true` arrive typed but are strings to us.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::UInt(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn plain_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn plain_string_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            server_name: String::new(),
            endpoint: String::new(),
            endpoint_key: None,
            discovery_interval: 60,
            alive_interval: 120,
            router_prefix: DEFAULT_ROUTER_PREFIX.into(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("servdiscovery.toml"))
            .merge(Json::file("servdiscovery.json"))
            .merge(Env::raw().only(NUMERIC_ENV_KEYS));
        for &(var, field) in STRING_ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                figment = figment.merge(Serialized::default(field, value));
            }
        }

        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Support Docker-style secrets
        if let Ok(key_file) = std::env::var("ENDPOINT_KEY_FILE") {
            config.endpoint_key = Some(std::fs::read_to_string(key_file)?.trim().to_string());
        }
        config.endpoint_key = config.endpoint_key.filter(|k| !k.is_empty());

        if config.endpoint.trim().is_empty() {
            anyhow::bail!("`ENDPOINT` must be set to the registry URL");
        }

        Ok(config)
    }

    /// `env_logger` filter for `LOG_LEVEL`. `dev` enables everything.
    ///
    /// Returns `None` for a level we do not recognize; callers fall back to
    /// [`DEFAULT_LOG_FILTER`].
    pub fn log_filter(&self) -> Option<&'static str> {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "" | "info" => Some("info"),
            "dev" | "trace" => Some("trace"),
            "debug" => Some("debug"),
            "warn" | "warning" => Some("warn"),
            "error" | "fatal" | "critical" => Some("error"),
            "off" => Some("off"),
            _ => None,
        }
    }

    pub fn discovery_period(&self) -> Option<Duration> {
        period(self.discovery_interval)
    }

    pub fn alive_period(&self) -> Option<Duration> {
        period(self.alive_interval)
    }
}

fn period(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds)
        .ok()
        .filter(|&s| s > 0)
        .map(Duration::from_secs)
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("server_name", &self.server_name)
            .field("endpoint", &self.endpoint)
            .field("endpoint_key", &self.endpoint_key.as_ref().map(|_| "<redacted>"))
            .field("discovery_interval", &self.discovery_interval)
            .field("alive_interval", &self.alive_interval)
            .field("router_prefix", &self.router_prefix)
            .finish()
    }
}
