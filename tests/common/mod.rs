#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use disposable_domains::scraper::{
    BrowserEngine, BrowserLauncher, BrowserSession, ProviderProfile, ScrapeError, TimingProfile,
};
use disposable_domains::validator::{DomainValidator, ExtractionStrategy, TldRegistry};

pub const ADDRESS_SELECTOR: &str = "#mail";
pub const NEW_ADDRESS_SELECTOR: &str = "#refresh";

pub fn validator() -> DomainValidator {
    DomainValidator::new(TldRegistry::from_iter(["com", "tk", "test"]))
}

pub fn profile(max_changes: usize) -> ProviderProfile {
    ProviderProfile {
        name: "fake-mail".to_string(),
        url: "https://fake-mail.test/".to_string(),
        address_selector: ADDRESS_SELECTOR.to_string(),
        new_address_selector: NEW_ADDRESS_SELECTOR.to_string(),
        text_property: None,
        extraction: ExtractionStrategy::AfterAt,
        placeholders: vec!["loading".to_string()],
        timing: TimingProfile {
            load_timeout: Duration::from_secs(1),
            ..TimingProfile::uniform(Duration::from_millis(1))
        },
        max_changes,
        max_iterations: None,
        reset_on_load: false,
    }
}

pub fn addresses(domains: &[&str]) -> Vec<String> {
    domains
        .iter()
        .enumerate()
        .map(|(i, domain)| format!("user{}@{}", i, domain))
        .collect()
}

/// Call counters shared by a launcher and every session it hands out.
#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub navigations: AtomicUsize,
    pub clicks: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Counters {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// In-memory browser whose address display follows a script.
///
/// Every session starts at the top of its engine's script; each click moves
/// to the next address, and the last one repeats once the script runs out.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    addresses: Vec<String>,
    engine_addresses: HashMap<BrowserEngine, Vec<String>>,
    placeholder_reads: usize,
    failing_engines: Vec<BrowserEngine>,
    failing_launches: usize,
    failing_click: Option<usize>,
    failing_navigation: bool,
    hanging_reload: bool,
    counters: Arc<Counters>,
}

impl FakeLauncher {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            ..Self::default()
        }
    }

    pub fn with_engine_addresses(mut self, engine: BrowserEngine, addresses: Vec<String>) -> Self {
        self.engine_addresses.insert(engine, addresses);
        self
    }

    /// Reads that show a loading text after page load and after every click.
    pub fn with_placeholder_reads(mut self, reads: usize) -> Self {
        self.placeholder_reads = reads;
        self
    }

    pub fn failing_on(mut self, engine: BrowserEngine) -> Self {
        self.failing_engines.push(engine);
        self
    }

    /// The first `count` launches fail, whatever the engine.
    pub fn failing_first_launches(mut self, count: usize) -> Self {
        self.failing_launches = count;
        self
    }

    /// The `nth` click (1-based) within each session fails.
    pub fn failing_click(mut self, nth: usize) -> Self {
        self.failing_click = Some(nth);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.failing_navigation = true;
        self
    }

    /// `reload` never completes.
    pub fn hanging_reload(mut self) -> Self {
        self.hanging_reload = true;
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        engine: BrowserEngine,
        _proxy: Option<&str>,
    ) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        let launch = self.counters.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if launch <= self.failing_launches || self.failing_engines.contains(&engine) {
            return Err(ScrapeError::Launch {
                engine,
                message: "driver unavailable".to_string(),
            });
        }

        let addresses = self
            .engine_addresses
            .get(&engine)
            .unwrap_or(&self.addresses)
            .clone();

        Ok(Box::new(FakeSession {
            addresses,
            position: 0,
            pending_placeholders: self.placeholder_reads,
            placeholder_reads: self.placeholder_reads,
            clicks: 0,
            failing_click: self.failing_click,
            failing_navigation: self.failing_navigation,
            hanging_reload: self.hanging_reload,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeSession {
    addresses: Vec<String>,
    position: usize,
    pending_placeholders: usize,
    placeholder_reads: usize,
    clicks: usize,
    failing_click: Option<usize>,
    failing_navigation: bool,
    hanging_reload: bool,
    counters: Arc<Counters>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.counters.navigations.fetch_add(1, Ordering::SeqCst);
        if self.failing_navigation {
            return Err(ScrapeError::Navigation {
                url: url.to_string(),
                message: "connection reset".to_string(),
            });
        }
        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<(), ScrapeError> {
        if selector != ADDRESS_SELECTOR || self.addresses.is_empty() {
            return Err(ScrapeError::SelectorTimeout {
                selector: selector.to_string(),
                timeout,
            });
        }
        Ok(())
    }

    async fn read_text(&mut self, _selector: &str, _property: Option<&str>) -> Result<String, ScrapeError> {
        if self.pending_placeholders > 0 {
            self.pending_placeholders -= 1;
            return Ok("Loading...".to_string());
        }
        let index = self.position.min(self.addresses.len().saturating_sub(1));
        Ok(self.addresses.get(index).cloned().unwrap_or_default())
    }

    async fn click(&mut self, selector: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.counters.clicks.fetch_add(1, Ordering::SeqCst);
        self.clicks += 1;
        if self.failing_click == Some(self.clicks) {
            return Err(ScrapeError::Action {
                selector: selector.to_string(),
                message: "element detached".to_string(),
            });
        }
        self.position += 1;
        self.pending_placeholders = self.placeholder_reads;
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), ScrapeError> {
        if self.hanging_reload {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn clear_cookies(&mut self) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
