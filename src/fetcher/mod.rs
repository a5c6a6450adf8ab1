pub mod parse;

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use url::Url;

// Constants for fetcher configuration
const REQUEST_TIMEOUT: u64 = 30; // seconds
const CONNECT_TIMEOUT: u64 = 10; // seconds
const DEFAULT_DELIMITER: char = ',';

/// Encoding of a static source's response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// One entry per line, `#` comments.
    Plain,
    /// JSON document; a dot-path selects the list.
    Structured,
    /// CSV-like lines; one column holds the entry.
    Delimited,
}

/// Describes where a source lives and how to turn its body into candidates.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDescriptor {
    pub url: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub name: Option<String>,
    /// Dot-path into a structured body; `.` or absent means the root.
    #[serde(default, alias = "extractionKey")]
    pub extraction_key: Option<String>,
    #[serde(default, alias = "columnIndex")]
    pub column_index: Option<usize>,
    #[serde(default)]
    pub delimiter: Option<String>,
}

impl SourceDescriptor {
    pub fn plain(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: SourceKind::Plain,
            name: None,
            extraction_key: None,
            column_index: None,
            delimiter: None,
        }
    }

    pub fn structured(url: impl Into<String>, extraction_key: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Structured,
            extraction_key: Some(extraction_key.into()),
            ..Self::plain(url)
        }
    }

    pub fn delimited(url: impl Into<String>, column_index: usize) -> Self {
        Self {
            kind: SourceKind::Delimited,
            column_index: Some(column_index),
            ..Self::plain(url)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter.to_string());
        self
    }

    /// Name used in logs; falls back to the URL.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }

    fn delimiter_char(&self) -> char {
        self.delimiter
            .as_deref()
            .and_then(|d| d.chars().next())
            .unwrap_or(DEFAULT_DELIMITER)
    }

    /// Turns a raw response body into normalized candidate strings.
    pub fn parse_body(&self, body: &str) -> Result<Vec<String>> {
        match self.kind {
            SourceKind::Plain => Ok(parse::parse_plain(body)),
            SourceKind::Structured => {
                parse::parse_structured(body, self.extraction_key.as_deref().unwrap_or("."))
            }
            SourceKind::Delimited => Ok(parse::parse_delimited(
                body,
                self.column_index.unwrap_or(0),
                self.delimiter_char(),
            )),
        }
    }
}

/// HTTP client settings for source retrieval.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub user_agent: String,
    #[serde(with = "crate::settings::duration_secs")]
    pub request_timeout: Duration,
    #[serde(with = "crate::settings::duration_secs")]
    pub connect_timeout: Duration,
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("disposable-domains/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT),
        }
    }
}

/// Retrieves static sources. A failing source yields an empty list.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        debug!("Initializing HTTP client with user agent: {}", config.user_agent);
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .context("Failed to create User-Agent header")?;
        headers.insert(USER_AGENT, user_agent);

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Fetches and parses one source, logging and swallowing any failure.
    pub async fn fetch(&self, descriptor: &SourceDescriptor) -> Vec<String> {
        match self.try_fetch(descriptor).await {
            Ok(candidates) => {
                info!("Fetched {} candidates from {}", candidates.len(), descriptor.label());
                candidates
            }
            Err(e) => {
                warn!("Source {} failed, skipping: {:#}", descriptor.label(), e);
                Vec::new()
            }
        }
    }

    /// Fetches and parses one source, surfacing the failure.
    pub async fn try_fetch(&self, descriptor: &SourceDescriptor) -> Result<Vec<String>> {
        let body = self.retrieve(&descriptor.url).await?;
        trace!("Retrieved {} bytes from {}", body.len(), descriptor.label());
        descriptor
            .parse_body(&body)
            .with_context(|| format!("Failed to parse {:?} body of {}", descriptor.kind, descriptor.label()))
    }

    async fn retrieve(&self, location: &str) -> Result<String> {
        if let Some(path) = local_path(location)? {
            debug!("Reading local source {}", path.display());
            return tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()));
        }

        debug!("Sending request to {}", location);
        let response = self
            .client
            .get(location)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", location))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} responded with status {}", location, status);
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", location))
    }
}

/// `file://` URLs and bare paths are read from disk; anything with another scheme is remote.
fn local_path(location: &str) -> Result<Option<PathBuf>> {
    if location.starts_with("file://") {
        let url = Url::parse(location).context("Failed to parse file URL")?;
        let path = url
            .to_file_path()
            .map_err(|_| anyhow::anyhow!("Invalid file URL: {}", location))?;
        return Ok(Some(path));
    }
    if location.contains("://") {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(location)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_detection() {
        assert_eq!(local_path("allowlist.conf").unwrap(), Some(PathBuf::from("allowlist.conf")));
        assert_eq!(local_path("https://example.com/list.txt").unwrap(), None);
        assert_eq!(
            local_path("file:///tmp/list.txt").unwrap(),
            Some(PathBuf::from("/tmp/list.txt"))
        );
    }

    #[test]
    fn test_descriptor_defaults() {
        let d = SourceDescriptor::delimited("https://example.com/a.csv", 2);
        assert_eq!(d.delimiter_char(), ',');
        assert_eq!(d.with_delimiter(';').delimiter_char(), ';');
        assert_eq!(SourceDescriptor::plain("u").with_name("n").label(), "n");
    }

    #[test]
    fn test_descriptor_deserializes_camel_case_keys() {
        let d: SourceDescriptor = serde_json::from_str(
            r#"{"url": "https://example.com/a.json", "kind": "structured", "extractionKey": "data.domains"}"#,
        )
        .unwrap();
        assert_eq!(d.kind, SourceKind::Structured);
        assert_eq!(d.extraction_key.as_deref(), Some("data.domains"));
    }

    #[tokio::test]
    async fn test_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allow.txt");
        std::fs::write(&path, "# curated\nGmail.com\n\nproton.me\n").unwrap();

        let fetcher = SourceFetcher::new(&FetcherConfig::default()).unwrap();
        let candidates = fetcher
            .fetch(&SourceDescriptor::plain(path.to_string_lossy()))
            .await;
        assert_eq!(candidates, vec!["gmail.com", "proton.me"]);
    }

    #[tokio::test]
    async fn test_missing_local_file_yields_empty() {
        let fetcher = SourceFetcher::new(&FetcherConfig::default()).unwrap();
        let candidates = fetcher
            .fetch(&SourceDescriptor::plain("/definitely/not/here.txt"))
            .await;
        assert!(candidates.is_empty());
    }
}
