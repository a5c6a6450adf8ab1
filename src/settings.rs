use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::fetcher::{FetcherConfig, SourceDescriptor};
use crate::scraper::{builtin_providers, BrowserEngine, ProviderProfile, RetryPolicy};

/// Prefix of environment overrides, e.g. `DISPOSABLE__SOURCE_CONCURRENCY=8`.
pub const ENV_PREFIX: &str = "DISPOSABLE";

/// Default number of static sources fetched at once
pub const SOURCE_CONCURRENCY: usize = 4;

/// Where a browser engine's WebDriver server listens.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineEndpoint {
    pub engine: BrowserEngine,
    pub webdriver_url: String,
}

/// Browser scraping configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingSettings {
    /// Whether scraping sessions run at all
    pub enabled: bool,

    /// Whether to run the browsers in headless mode
    pub headless: bool,

    /// Optional HTTP(S) proxy handed to every browser
    pub proxy: Option<String>,

    /// One entry per browser engine to drive
    pub engines: Vec<EngineEndpoint>,

    /// Providers to scrape; the built-in set when empty
    pub providers: Vec<ProviderProfile>,

    /// Maximum simultaneous browser sessions; one per engine when unset
    pub concurrency: Option<usize>,

    pub retry: RetryPolicy,
}

impl Default for ScrapingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            proxy: None,
            engines: vec![
                EngineEndpoint {
                    engine: BrowserEngine::Chrome,
                    webdriver_url: "http://localhost:9515".to_string(),
                },
                EngineEndpoint {
                    engine: BrowserEngine::Firefox,
                    webdriver_url: "http://localhost:4444".to_string(),
                },
            ],
            providers: Vec::new(),
            concurrency: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScrapingSettings {
    pub fn providers(&self) -> Vec<ProviderProfile> {
        if self.providers.is_empty() {
            builtin_providers()
        } else {
            self.providers.clone()
        }
    }

    pub fn endpoints(&self) -> HashMap<BrowserEngine, String> {
        self.engines
            .iter()
            .map(|e| (e.engine, e.webdriver_url.clone()))
            .collect()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(self.engines.len()).max(1)
    }
}

/// Configuration for one aggregation run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory the published lists are written to
    pub output_dir: PathBuf,

    pub allow_filename: String,

    pub disposable_filename: String,

    /// Directory for log files
    pub log_dir: String,

    /// Generated TLD registry; the built-in list when unset
    pub tld_file: Option<PathBuf>,

    /// Curated local allowlist, one domain per line
    pub allowlist_file: Option<String>,

    pub allow_sources: Vec<SourceDescriptor>,

    pub deny_sources: Vec<SourceDescriptor>,

    /// Maximum static sources fetched at once
    pub source_concurrency: usize,

    pub fetcher: FetcherConfig,

    pub scraping: ScrapingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("lists"),
            allow_filename: "allowlist.txt".to_string(),
            disposable_filename: "disposable_domains.txt".to_string(),
            log_dir: "logs".to_string(),
            tld_file: None,
            allowlist_file: Some("data/allowlist.txt".to_string()),
            allow_sources: Vec::new(),
            deny_sources: Vec::new(),
            source_concurrency: SOURCE_CONCURRENCY,
            fetcher: FetcherConfig::default(),
            scraping: ScrapingSettings::default(),
        }
    }
}

impl Settings {
    /// Layers defaults, an optional TOML file, and `DISPOSABLE__*` environment variables.
    ///
    /// A file given explicitly must exist; without one, `disposable.toml` in the
    /// working directory is used if present.
    ///
    /// # Arguments
    /// * `path` - Optional path to a TOML configuration file
    ///
    /// # Returns
    /// * `Result<Settings>` - The merged settings or a parse error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("disposable").required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        debug!(
            "Loaded settings: {} allow sources, {} deny sources, scraping enabled: {}",
            settings.allow_sources.len(),
            settings.deny_sources.len(),
            settings.scraping.enabled
        );
        Ok(settings)
    }
}

/// Serde helper for durations given in whole seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Serde helper for durations given in milliseconds.
pub mod duration_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
