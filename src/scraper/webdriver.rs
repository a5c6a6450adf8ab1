use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, trace};

use super::browser::{BrowserEngine, BrowserLauncher, BrowserSession};
use super::error::ScrapeError;

// Chromium-family browser arguments
pub fn chromium_arguments(headless: bool) -> Vec<String> {
    vec![
        "--no-sandbox",
        "--disable-gpu",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-notifications",
        "--disable-infobars",
        "--disable-background-networking",
        "--disable-breakpad",
        "--disable-features=TranslateUI",
        "--mute-audio",
        "--incognito",
        "--window-size=1280,800",
        if headless { "--headless=new" } else { "" }
    ].into_iter()
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

// Chromium content settings: JavaScript on, everything noisy off
pub fn chromium_preferences() -> Map<String, Value> {
    let mut prefs = Map::new();
    prefs.insert("profile.default_content_setting_values.images".to_string(), 2.into()); // 2 = block
    prefs.insert("profile.managed_default_content_settings.javascript".to_string(), 1.into()); // 1 = allow
    prefs.insert("profile.managed_default_content_settings.popups".to_string(), 2.into());
    prefs.insert("profile.managed_default_content_settings.geolocation".to_string(), 2.into());
    prefs.insert("profile.managed_default_content_settings.media_stream".to_string(), 2.into());
    prefs
}

pub fn firefox_arguments(headless: bool) -> Vec<String> {
    if headless {
        vec!["-headless".to_string(), "-private".to_string()]
    } else {
        vec!["-private".to_string()]
    }
}

/// W3C capabilities for `engine`, with an optional HTTP(S) proxy.
pub fn capabilities(engine: BrowserEngine, headless: bool, proxy: Option<&str>) -> Map<String, Value> {
    let mut caps = Map::new();
    let to_array = |args: Vec<String>| Value::Array(args.into_iter().map(Value::String).collect());

    match engine {
        BrowserEngine::Chrome | BrowserEngine::Edge => {
            let mut opts = Map::new();
            opts.insert("args".to_string(), to_array(chromium_arguments(headless)));
            opts.insert("prefs".to_string(), Value::Object(chromium_preferences()));
            let (browser_name, options_key) = match engine {
                BrowserEngine::Edge => ("MicrosoftEdge", "ms:edgeOptions"),
                _ => ("chrome", "goog:chromeOptions"),
            };
            caps.insert("browserName".to_string(), browser_name.into());
            caps.insert(options_key.to_string(), Value::Object(opts));
        }
        BrowserEngine::Firefox => {
            let mut opts = Map::new();
            opts.insert("args".to_string(), to_array(firefox_arguments(headless)));
            caps.insert("browserName".to_string(), "firefox".into());
            caps.insert("moz:firefoxOptions".to_string(), Value::Object(opts));
        }
    }

    if let Some(proxy) = proxy {
        let mut proxy_caps = Map::new();
        proxy_caps.insert("proxyType".to_string(), "manual".into());
        proxy_caps.insert("httpProxy".to_string(), proxy.into());
        proxy_caps.insert("sslProxy".to_string(), proxy.into());
        caps.insert("proxy".to_string(), Value::Object(proxy_caps));
    }

    caps
}

/// Creates a new WebDriver client for `engine`.
///
/// Capabilities are built for the engine's browser, with the proxy applied to
/// both HTTP and TLS traffic when one is given.
///
/// # Arguments
/// * `webdriver_url` - WebDriver server URL for this engine
/// * `engine` - Browser engine the server drives
/// * `headless` - Whether to run the browser without a window
/// * `proxy` - Optional `host:port` proxy for all browser traffic
///
/// # Returns
/// * `Result<Client>` - A connected WebDriver client or an error
pub async fn create_client(
    webdriver_url: &str,
    engine: BrowserEngine,
    headless: bool,
    proxy: Option<&str>,
) -> Result<Client> {
    trace!("Creating new {} WebDriver client connecting to {}", engine, webdriver_url);
    let caps = capabilities(engine, headless, proxy);
    trace!("Capabilities: {:?}", caps);

    debug!("Connecting to WebDriver at {}", webdriver_url);
    let client = match ClientBuilder::native()
        .capabilities(caps)
        .connect(webdriver_url)
        .await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
                return Err(e).context(format!("Failed to connect to WebDriver at {}", webdriver_url));
            }
        };

    trace!("Successfully created {} WebDriver client", engine);
    Ok(client)
}

/// Launches sessions against one WebDriver endpoint per engine.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    endpoints: HashMap<BrowserEngine, String>,
    headless: bool,
}

impl WebDriverLauncher {
    pub fn new(endpoints: HashMap<BrowserEngine, String>, headless: bool) -> Self {
        Self { endpoints, headless }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(
        &self,
        engine: BrowserEngine,
        proxy: Option<&str>,
    ) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        let url = self.endpoints.get(&engine).ok_or_else(|| ScrapeError::Launch {
            engine,
            message: "no WebDriver endpoint configured".to_string(),
        })?;

        let client = create_client(url, engine, self.headless, proxy)
            .await
            .map_err(|e| ScrapeError::Launch {
                engine,
                message: format!("{:#}", e),
            })?;

        Ok(Box::new(WebDriverSession { client }))
    }
}

/// A live WebDriver browser.
pub struct WebDriverSession {
    client: Client,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str, limit: Duration) -> Result<(), ScrapeError> {
        let navigation_error = |message: String| ScrapeError::Navigation {
            url: url.to_string(),
            message,
        };
        match timeout(limit, self.client.goto(url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(navigation_error(e.to_string())),
            Err(_) => Err(navigation_error(format!("timed out after {:?}", limit))),
        }
    }

    async fn wait_for_element(&mut self, selector: &str, limit: Duration) -> Result<(), ScrapeError> {
        self.client
            .wait()
            .at_most(limit)
            .for_element(Locator::Css(selector))
            .await
            .map(|_| ())
            .map_err(|e| {
                debug!("Waiting for '{}' failed: {}", selector, e);
                ScrapeError::SelectorTimeout {
                    selector: selector.to_string(),
                    timeout: limit,
                }
            })
    }

    async fn read_text(&mut self, selector: &str, property: Option<&str>) -> Result<String, ScrapeError> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))?;

        let text = match property {
            Some(property) => element.prop(property).await.map(Option::unwrap_or_default),
            None => element.text().await,
        };
        text.map_err(|e| ScrapeError::Browser(e.to_string()))
    }

    async fn click(&mut self, selector: &str, limit: Duration) -> Result<(), ScrapeError> {
        let action_error = |message: String| ScrapeError::Action {
            selector: selector.to_string(),
            message,
        };
        let click = async {
            let element = self.client.find(Locator::Css(selector)).await?;
            element.click().await.map(|_| ())
        };
        match timeout(limit, click).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(action_error(e.to_string())),
            Err(_) => Err(action_error(format!("timed out after {:?}", limit))),
        }
    }

    async fn reload(&mut self) -> Result<(), ScrapeError> {
        self.client
            .refresh()
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))
    }

    async fn clear_cookies(&mut self) -> Result<(), ScrapeError> {
        self.client
            .delete_all_cookies()
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
        self.client
            .close()
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))
    }
}
