use std::{collections::HashMap, path::Path, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File, Source};
use serde::{Deserialize, Deserializer, de};

use crate::crl::{CrlSource, DEFAULT_FETCH_TIMEOUT};
use crate::device::BigIpConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub devices: Vec<BigIpConfig>,
    #[serde(default)]
    pub crl: Vec<CrlSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Upper bound for a single CRL download.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// One CRL distribution point as written in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct CrlSourceConfig {
    pub url: String,
    pub name: String,
    pub profile_name: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub refresh_delay: Duration,
    #[serde(default)]
    pub validate: bool,
}

impl From<CrlSourceConfig> for CrlSource {
    fn from(config: CrlSourceConfig) -> Self {
        Self {
            url: config.url,
            name: config.name,
            profile_name: config.profile_name,
            refresh_interval: config.refresh_delay,
            validate: config.validate,
        }
    }
}

/// Accepts humantime strings such as `"90s"` or `"6h 30m"`.
fn deserialize_duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(de::Error::custom)
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        Self::load_from_source(File::with_name("config/settings").required(false), env_vars)
    }

    /// Load an explicit configuration file; it must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_from_source(File::from(path), None)
    }

    pub fn load_from_source<S>(
        source: S,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let mut builder = ConfigLib::builder()
            .set_default("fetch.timeout", "30s")?
            .add_source(source);

        // Explicit overrides keep tests independent from the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // e.g. APP_FETCH__TIMEOUT=10s
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crl.is_empty() {
            return Err(ConfigError::Message(
                "no crl distribution point provided".to_string(),
            ));
        }
        if self.devices.is_empty() {
            return Err(ConfigError::Message("no device provided".to_string()));
        }

        for (index, crl) in self.crl.iter().enumerate() {
            if crl.name.trim().is_empty() {
                return Err(ConfigError::Message(format!("crl #{index}: empty name")));
            }
            if crl.profile_name.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "crl {}: empty profile name",
                    crl.name
                )));
            }
            if crl.refresh_delay.is_zero() {
                return Err(ConfigError::Message(format!(
                    "crl {}: refresh delay must be greater than zero",
                    crl.name
                )));
            }
        }

        if self.fetch.timeout.is_zero() {
            return Err(ConfigError::Message(
                "fetch timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn sources(&self) -> impl Iterator<Item = CrlSource> + '_ {
        self.crl.iter().cloned().map(CrlSource::from)
    }
}
