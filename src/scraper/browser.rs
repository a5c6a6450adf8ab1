use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use super::error::ScrapeError;

/// Browser engines a session can be driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    Chrome,
    Firefox,
    Edge,
}

impl fmt::Display for BrowserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserEngine::Chrome => write!(f, "chrome"),
            BrowserEngine::Firefox => write!(f, "firefox"),
            BrowserEngine::Edge => write!(f, "edge"),
        }
    }
}

/// Starts browser sessions. One session per scrape attempt.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(
        &self,
        engine: BrowserEngine,
        proxy: Option<&str>,
    ) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}

/// The page-level operations a scraper needs. Elements are addressed by CSS selector.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Reads the element's visible text, or the named DOM property when `property` is set.
    async fn read_text(&mut self, selector: &str, property: Option<&str>) -> Result<String, ScrapeError>;

    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), ScrapeError>;

    async fn reload(&mut self) -> Result<(), ScrapeError>;

    async fn clear_cookies(&mut self) -> Result<(), ScrapeError>;

    /// Releases the browser. Consumes the session so it cannot be reused.
    async fn close(self: Box<Self>) -> Result<(), ScrapeError>;
}
