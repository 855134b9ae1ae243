//! Configuration management for `fairmeet`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::MeetingError;
use crate::fairness::RankingStrategy;
use crate::places::RadiusPolicy;

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV: &str = "GOOG_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FairmeetConfig {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Google Maps Platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// API key shared by every Maps endpoint
    pub api_key: Option<String>,
    #[serde(default = "default_google_base_url")]
    pub base_url: String,
    /// Base of the embeddable map URL given to the presentation layer
    #[serde(default = "default_embed_base_url")]
    pub embed_base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_google_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for failed requests
    #[serde(default = "default_google_max_retries")]
    pub max_retries: u32,
    /// Country code autocomplete results are restricted to
    #[serde(default = "default_region")]
    pub region: String,
}

/// Tuning of the meeting-place search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of search points, centroid included
    #[serde(default = "default_search_points")]
    pub search_points: usize,
    /// Search-point scatter radius as a fraction of the participant spread
    #[serde(default = "default_radius_ratio")]
    pub radius_ratio: f64,
    #[serde(default = "default_initial_radius")]
    pub initial_radius_m: f64,
    #[serde(default = "default_radius_growth")]
    pub radius_growth: f64,
    #[serde(default = "default_max_radius")]
    pub max_radius_m: f64,
    /// Venues requested around each search point
    #[serde(default = "default_per_point_results")]
    pub per_point_results: usize,
    /// Fairest venues kept before the final ranking
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Timeout applied to every single provider call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u32,
    /// Candidate midpoints checked for a balanced two-person search point
    #[serde(default = "default_balanced_midpoints")]
    pub balanced_midpoints: usize,
    /// Destinations per travel-time matrix request
    #[serde(default = "default_matrix_max_destinations")]
    pub matrix_max_destinations: usize,
    #[serde(default)]
    pub default_strategy: RankingStrategy,
    /// Fixed random seed for reproducible search points
    pub seed: Option<u64>,
}

/// Geocode cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in hours
    #[serde(default = "default_cache_ttl")]
    pub ttl_hours: u32,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Directory of the on-disk cache tier, in-memory only when unset
    pub persistent_path: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_google_base_url() -> String {
    "https://maps.googleapis.com/maps/api".to_string()
}

fn default_embed_base_url() -> String {
    "https://www.google.com/maps/embed/v1".to_string()
}

fn default_google_timeout() -> u32 {
    30
}

fn default_google_max_retries() -> u32 {
    3
}

fn default_region() -> String {
    "au".to_string()
}

fn default_search_points() -> usize {
    5
}

fn default_radius_ratio() -> f64 {
    0.15
}

fn default_initial_radius() -> f64 {
    1500.0
}

fn default_radius_growth() -> f64 {
    1.5
}

fn default_max_radius() -> f64 {
    3000.0
}

fn default_per_point_results() -> usize {
    3
}

fn default_candidate_pool() -> usize {
    15
}

fn default_max_results() -> usize {
    6
}

fn default_call_timeout() -> u32 {
    20
}

fn default_balanced_midpoints() -> usize {
    5
}

fn default_matrix_max_destinations() -> usize {
    25
}

fn default_cache_ttl() -> u32 {
    168
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_google_base_url(),
            embed_base_url: default_embed_base_url(),
            timeout_seconds: default_google_timeout(),
            max_retries: default_google_max_retries(),
            region: default_region(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_points: default_search_points(),
            radius_ratio: default_radius_ratio(),
            initial_radius_m: default_initial_radius(),
            radius_growth: default_radius_growth(),
            max_radius_m: default_max_radius(),
            per_point_results: default_per_point_results(),
            candidate_pool: default_candidate_pool(),
            max_results: default_max_results(),
            call_timeout_seconds: default_call_timeout(),
            balanced_midpoints: default_balanced_midpoints(),
            matrix_max_destinations: default_matrix_max_destinations(),
            default_strategy: RankingStrategy::default(),
            seed: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
            persistent_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.call_timeout_seconds))
    }

    #[must_use]
    pub fn radius_policy(&self) -> RadiusPolicy {
        RadiusPolicy {
            growth: self.radius_growth,
            max_radius_m: self.max_radius_m,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.ttl_hours) * 60 * 60)
    }
}

impl FairmeetConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // FAIRMEET_SEARCH__MAX_RESULTS=10 overrides search.max_results
        builder = builder.add_source(
            Environment::with_prefix("FAIRMEET")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: FairmeetConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        if config.google.api_key.is_none() {
            config.google.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fairmeet").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.google.base_url.is_empty() {
            self.google.base_url = default_google_base_url();
        }
        if self.google.embed_base_url.is_empty() {
            self.google.embed_base_url = default_embed_base_url();
        }
        if self.google.timeout_seconds == 0 {
            self.google.timeout_seconds = default_google_timeout();
        }
        if self.google.region.is_empty() {
            self.google.region = default_region();
        }
        if self.search.search_points == 0 {
            self.search.search_points = default_search_points();
        }
        if self.search.per_point_results == 0 {
            self.search.per_point_results = default_per_point_results();
        }
        if self.search.candidate_pool == 0 {
            self.search.candidate_pool = default_candidate_pool();
        }
        if self.search.max_results == 0 {
            self.search.max_results = default_max_results();
        }
        if self.search.call_timeout_seconds == 0 {
            self.search.call_timeout_seconds = default_call_timeout();
        }
        if self.search.matrix_max_destinations == 0 {
            self.search.matrix_max_destinations = default_matrix_max_destinations();
        }
        if self.cache.ttl_hours == 0 {
            self.cache.ttl_hours = default_cache_ttl();
        }
        if self.cache.max_entries == 0 {
            self.cache.max_entries = default_cache_max_entries();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_key()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// The API key may be absent, but never blank or obviously truncated
    pub fn validate_api_key(&self) -> Result<()> {
        if let Some(api_key) = &self.google.api_key {
            if api_key.trim().is_empty() {
                return Err(MeetingError::config(
                    "Google API key cannot be empty if provided. Either remove it or provide a valid key.",
                )
                .into());
            }

            if api_key.len() < 8 {
                return Err(MeetingError::config(
                    "Google API key appears to be invalid (too short). Please check your API key.",
                )
                .into());
            }
        }

        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.google.timeout_seconds > 300 {
            return Err(MeetingError::config("Google API timeout cannot exceed 300 seconds").into());
        }

        if self.google.max_retries > 10 {
            return Err(MeetingError::config("Google API max retries cannot exceed 10").into());
        }

        let search = &self.search;
        if search.search_points > 25 {
            return Err(MeetingError::config("Number of search points cannot exceed 25").into());
        }

        if !(search.radius_ratio > 0.0 && search.radius_ratio <= 1.0) {
            return Err(MeetingError::config("Search radius ratio must be in (0, 1]").into());
        }

        if !(search.initial_radius_m > 0.0 && search.initial_radius_m <= search.max_radius_m) {
            return Err(MeetingError::config(
                "Initial search radius must be positive and no larger than the maximum radius",
            )
            .into());
        }

        if search.max_radius_m > 50_000.0 {
            return Err(MeetingError::config("Maximum search radius cannot exceed 50000 m").into());
        }

        if search.radius_growth <= 1.0 {
            return Err(MeetingError::config("Radius growth factor must be greater than 1").into());
        }

        if search.candidate_pool < search.max_results {
            return Err(MeetingError::config(
                "Candidate pool cannot be smaller than the maximum number of results",
            )
            .into());
        }

        if search.matrix_max_destinations > 25 {
            return Err(MeetingError::config(
                "Travel-time matrix requests cannot exceed 25 destinations",
            )
            .into());
        }

        if search.call_timeout_seconds > 300 {
            return Err(MeetingError::config("Provider call timeout cannot exceed 300 seconds").into());
        }

        if self.cache.ttl_hours > 24 * 30 {
            return Err(MeetingError::config("Cache TTL cannot exceed 720 hours (30 days)").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(MeetingError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(MeetingError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for url in [&self.google.base_url, &self.google.embed_base_url] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(MeetingError::config(format!(
                    "Google URL '{url}' must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = FairmeetConfig::default();
        assert_eq!(config.google.base_url, "https://maps.googleapis.com/maps/api");
        assert_eq!(config.google.region, "au");
        assert_eq!(config.search.search_points, 5);
        assert_eq!(config.search.initial_radius_m, 1500.0);
        assert_eq!(config.search.max_radius_m, 3000.0);
        assert_eq!(config.search.candidate_pool, 15);
        assert_eq!(config.search.max_results, 6);
        assert_eq!(config.search.default_strategy, RankingStrategy::Fairness);
        assert_eq!(config.cache.ttl(), Duration::from_secs(7 * 24 * 60 * 60));
        assert!(config.google.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_api_key_rejected() {
        let mut config = FairmeetConfig::default();
        config.google.api_key = Some("abc".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = FairmeetConfig::default();
        config.logging.level = "loud".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_radius_bounds_validated() {
        let mut config = FairmeetConfig::default();
        config.search.initial_radius_m = 5000.0;
        assert!(config.validate().is_err());

        let mut config = FairmeetConfig::default();
        config.search.radius_growth = 1.0;
        assert!(config.validate().unwrap_err().to_string().contains("growth"));
    }

    #[test]
    fn test_pool_must_hold_results() {
        let mut config = FairmeetConfig::default();
        config.search.max_results = 20;
        assert!(config.validate().unwrap_err().to_string().contains("Candidate pool"));
    }

    #[test]
    fn test_apply_defaults_fills_zeroes() {
        let mut config = FairmeetConfig::default();
        config.search.max_results = 0;
        config.cache.max_entries = 0;
        config.logging.format = String::new();
        config.apply_defaults();
        assert_eq!(config.search.max_results, 6);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[google]
api_key = "test_key_12345"

[search]
max_results = 3
default_strategy = "minimize_max"
seed = 42
"#
        )
        .unwrap();

        let config = FairmeetConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.google.api_key.as_deref(), Some("test_key_12345"));
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.search.default_strategy, RankingStrategy::MinimizeMax);
        assert_eq!(config.search.seed, Some(42));
        assert_eq!(config.search.search_points, 5);
    }

    #[test]
    fn test_config_path_generation() {
        let path = FairmeetConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("fairmeet"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
