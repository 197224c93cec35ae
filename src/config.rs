//! Configuration for dynamic synonym filters and the reload service.
//!
//! Filter options arrive as host settings, a flat string-typed key/value map
//! (values may also be given as native JSON scalars). They are validated once
//! into an immutable [`SynonymFilterConfig`].
//!
//! # Examples
//!
//! ```
//! use dynamic_synonym::config::{Settings, SynonymFilterConfig};
//!
//! let settings = Settings::new()
//!     .put("synonyms_path", "analysis/synonym.txt")
//!     .put("interval", "30");
//! let config = SynonymFilterConfig::from_settings(&settings).unwrap();
//!
//! assert_eq!(config.interval_secs, 30);
//! assert!(config.expand);
//! assert!(!config.lenient);
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SynonymError};
use crate::synonym::parser::SynonymFormat;

/// Default polling interval, in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default timeout for remote synonym requests, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Flat, string-typed host settings of one filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    /// Create empty settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, builder style.
    pub fn put<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.values.insert(key.into(), value.to_string());
        self
    }

    /// Convert a JSON object of scalars into settings.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Object(object) = value else {
            return Err(SynonymError::config("filter settings must be a JSON object"));
        };

        let mut values = BTreeMap::new();
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Null => continue,
                _ => {
                    return Err(SynonymError::config(format!(
                        "setting `{key}` must be a scalar value"
                    )));
                }
            };
            values.insert(key.clone(), text);
        }
        Ok(Settings { values })
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Get a value or a default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Get a boolean value or a default.
    pub fn get_as_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(SynonymError::config(format!(
                    "setting `{key}` expects true or false, got `{raw}`"
                ))),
            },
        }
    }

    /// Get an unsigned integer value or a default.
    pub fn get_as_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| {
                SynonymError::config(format!(
                    "setting `{key}` expects a non-negative integer, got `{raw}`"
                ))
            }),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Settings {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Where in the analysis process a filter is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStage {
    /// Analysis of documents being indexed.
    Index,
    /// Analysis of query text.
    Search,
}

/// Which analysis stages a filter may be used in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Index and search time.
    All,
    /// Search time only; required for filters whose rules change at runtime
    /// without reindexing.
    SearchTime,
}

impl AnalysisMode {
    /// Whether a filter with this mode may be used at `stage`.
    pub fn permits(&self, stage: AnalysisStage) -> bool {
        match self {
            AnalysisMode::All => true,
            AnalysisMode::SearchTime => stage == AnalysisStage::Search,
        }
    }
}

/// Validated options of one dynamic synonym filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymFilterConfig {
    /// Local path or `http(s)://` URL of the rules.
    pub synonyms_path: String,
    /// Seconds between change checks.
    pub interval_secs: u64,
    /// Treat groups as mutually equivalent.
    pub expand: bool,
    /// Skip malformed rule lines instead of failing.
    pub lenient: bool,
    /// Rule grammar.
    pub format: SynonymFormat,
    /// Restrict the filter to search-time analysis.
    pub updateable: bool,
}

impl SynonymFilterConfig {
    /// Validate host settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let synonyms_path = settings
            .get("synonyms_path")
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| {
                SynonymError::config("dynamic synonym requires `synonyms_path` to be configured")
            })?
            .to_string();

        let interval_secs = settings.get_as_u64("interval", DEFAULT_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(SynonymError::config("`interval` must be at least 1 second"));
        }

        Ok(SynonymFilterConfig {
            synonyms_path,
            interval_secs,
            expand: settings.get_as_bool("expand", true)?,
            lenient: settings.get_as_bool("lenient", false)?,
            format: SynonymFormat::from_name(settings.get_or("format", ""))?,
            updateable: settings.get_as_bool("updateable", false)?,
        })
    }

    /// Create a configuration with defaults for everything but the location.
    pub fn for_location<S: Into<String>>(synonyms_path: S) -> Self {
        SynonymFilterConfig {
            synonyms_path: synonyms_path.into(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            expand: true,
            lenient: false,
            format: SynonymFormat::Solr,
            updateable: false,
        }
    }

    /// Polling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Whether the rules are fetched over HTTP.
    pub fn is_remote(&self) -> bool {
        is_remote_location(&self.synonyms_path)
    }

    /// Analysis stages this filter may be used in.
    pub fn analysis_mode(&self) -> AnalysisMode {
        if self.updateable {
            AnalysisMode::SearchTime
        } else {
            AnalysisMode::All
        }
    }
}

/// Whether a synonym location is an HTTP(S) URL.
pub fn is_remote_location(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Configuration of the process-wide reload service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory relative synonym paths are resolved against.
    pub config_dir: Option<PathBuf>,
    /// Timeout applied to every remote request.
    pub fetch_timeout_secs: u64,
    /// Name prefix of the background worker thread.
    pub worker_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            config_dir: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            worker_name: "monitor-synonym".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Timeout applied to every remote request.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
