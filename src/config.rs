//! Configuration for lexvfs.
//!
//! A [`Config`] decides how paths are classified (the virtual root marker),
//! how persistent handles are spelled, and how the virtual store is sharded.
//! Build one with [`ConfigBuilder`] and hand it to a
//! [`Session`](crate::Session), or install a process-wide default once at
//! startup with [`ConfigBuilder::init`].

use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{Error, Result};

/// Global configuration, initialized via [`ConfigBuilder::init`].
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default marker that starts every virtual path.
pub const DEFAULT_VIRTUAL_PREFIX: &str = "$:";

/// Default marker that starts every persistent handle.
pub const DEFAULT_PERSISTENT_PREFIX: &str = "$persist:";

/// Default number of lock shards in the virtual store.
pub const DEFAULT_SHARDS: usize = 16;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix that marks a path as living in the virtual store.
    pub virtual_prefix: String,
    /// Prefix of handles returned by the persistent cache.
    pub persistent_prefix: String,
    /// Number of lock shards in the virtual store (at least 1).
    pub shards: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            virtual_prefix: DEFAULT_VIRTUAL_PREFIX.to_string(),
            persistent_prefix: DEFAULT_PERSISTENT_PREFIX.to_string(),
            shards: DEFAULT_SHARDS,
        }
    }
}

impl Config {
    /// Parse a configuration from a JSON document.
    ///
    /// Every key is optional; missing keys keep their default.
    ///
    /// ```
    /// use lexvfs::config::Config;
    ///
    /// let config = Config::from_json(r#"{ "virtual_prefix": "mem:", "shards": 4 }"#).unwrap();
    /// assert_eq!(config.virtual_prefix, "mem:");
    /// assert_eq!(config.shards, 4);
    /// ```
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        ConfigBuilder::from_json_value(&value)?.build()
    }
}

/// Configuration builder for fluent API.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    virtual_prefix: Option<String>,
    persistent_prefix: Option<String>,
    shards: Option<usize>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from a parsed JSON object.
    pub fn from_json_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Config("expected a JSON object".into()))?;

        let mut builder = Self::new();
        for (key, val) in obj {
            builder = match key.as_str() {
                "virtual_prefix" => builder.virtual_prefix(json_str(key, val)?),
                "persistent_prefix" => builder.persistent_prefix(json_str(key, val)?),
                "shards" => {
                    let n = val
                        .as_u64()
                        .ok_or_else(|| Error::Config(format!("'{key}' must be an integer")))?;
                    builder.shards(n as usize)
                }
                other => return Err(Error::Config(format!("unknown key '{other}'"))),
            };
        }
        Ok(builder)
    }

    /// Set the virtual root marker.
    ///
    /// Default: `"$:"`
    pub fn virtual_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.virtual_prefix = Some(prefix.into());
        self
    }

    /// Set the persistent handle marker.
    ///
    /// Default: `"$persist:"`
    pub fn persistent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.persistent_prefix = Some(prefix.into());
        self
    }

    /// Set the number of virtual store lock shards.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<Config> {
        let defaults = Config::default();
        let config = Config {
            virtual_prefix: self.virtual_prefix.unwrap_or(defaults.virtual_prefix),
            persistent_prefix: self.persistent_prefix.unwrap_or(defaults.persistent_prefix),
            shards: self.shards.unwrap_or(defaults.shards),
        };

        if config.virtual_prefix.is_empty() || config.persistent_prefix.is_empty() {
            return Err(Error::Config("prefixes must not be empty".into()));
        }
        // A handle must never be mistaken for a virtual path and vice versa.
        if config.persistent_prefix.starts_with(&config.virtual_prefix)
            || config.virtual_prefix.starts_with(&config.persistent_prefix)
        {
            return Err(Error::Config(
                "virtual and persistent prefixes must not overlap".into(),
            ));
        }
        if config.shards == 0 {
            return Err(Error::Config("shards must be at least 1".into()));
        }
        Ok(config)
    }

    /// Build and install the process-wide default configuration.
    ///
    /// This can only succeed once. Returns `Ok(true)` if the configuration
    /// was installed, `Ok(false)` if a default was already in place.
    pub fn init(self) -> Result<bool> {
        let config = self.build()?;
        Ok(CONFIG.set(config).is_ok())
    }
}

/// Get the process-wide default configuration.
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

fn json_str<'a>(key: &str, val: &'a Value) -> Result<&'a str> {
    val.as_str()
        .ok_or_else(|| Error::Config(format!("'{key}' must be a string")))
}
