use std::collections::BTreeSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use super::browser::{BrowserEngine, BrowserLauncher, BrowserSession};
use super::error::ScrapeError;
use super::profile::ProviderProfile;
use crate::validator::{extract_domain, DomainValidator};

/// Lifecycle of one scraping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Launching,
    Navigating,
    ExtractLoop,
    Closed,
    Failed,
}

/// Result of one successful pass through the extraction loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    Discovered(String),
    Duplicate(String),
}

/// What a finished session hands back to its caller.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub provider: String,
    pub engine: BrowserEngine,
    pub discovered: BTreeSet<String>,
    pub iterations: usize,
    /// Iteration failure that ended the loop early, if any.
    pub stopped_by: Option<ScrapeError>,
}

/// Drives one provider page on one engine through the harvest loop.
pub struct ScrapeSession<'a> {
    profile: &'a ProviderProfile,
    engine: BrowserEngine,
    proxy: Option<&'a str>,
    validator: &'a DomainValidator,
    attempt: u32,
    phase: SessionPhase,
    discovered: BTreeSet<String>,
    iterations: usize,
    last_error: Option<ScrapeError>,
}

impl<'a> ScrapeSession<'a> {
    pub fn new(
        profile: &'a ProviderProfile,
        engine: BrowserEngine,
        validator: &'a DomainValidator,
    ) -> Self {
        Self {
            profile,
            engine,
            proxy: None,
            validator,
            attempt: 1,
            phase: SessionPhase::Idle,
            discovered: BTreeSet::new(),
            iterations: 0,
            last_error: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<&'a str>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn discovered(&self) -> &BTreeSet<String> {
        &self.discovered
    }

    pub fn last_error(&self) -> Option<&ScrapeError> {
        self.last_error.as_ref()
    }

    /// Launches a browser, harvests domains, and always closes the browser again.
    ///
    /// Fails when launch or navigation fails, or when the loop ends on an
    /// error before a single domain was recorded.
    pub async fn run(&mut self, launcher: &dyn BrowserLauncher) -> Result<SessionReport, ScrapeError> {
        info!(
            "Starting session {} on {} (attempt {})",
            self.profile.name, self.engine, self.attempt
        );

        self.phase = SessionPhase::Launching;
        let mut browser = match launcher.launch(self.engine, self.proxy).await {
            Ok(browser) => browser,
            Err(e) => {
                self.phase = SessionPhase::Failed;
                self.last_error = Some(e.clone());
                return Err(e);
            }
        };

        let outcome = self.drive(browser.as_mut()).await;

        debug!("Closing {} browser for {}", self.engine, self.profile.name);
        if let Err(e) = browser.close().await {
            warn!("Failed to close {} browser for {}: {}", self.engine, self.profile.name, e);
        }

        match outcome {
            Ok(()) => {
                self.phase = SessionPhase::Closed;
                info!(
                    "Session {} on {} finished with {} domains after {} iterations",
                    self.profile.name,
                    self.engine,
                    self.discovered.len(),
                    self.iterations
                );
                Ok(SessionReport {
                    provider: self.profile.name.clone(),
                    engine: self.engine,
                    discovered: self.discovered.clone(),
                    iterations: self.iterations,
                    stopped_by: self.last_error.clone(),
                })
            }
            Err(e) => {
                self.phase = SessionPhase::Failed;
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn drive(&mut self, browser: &mut dyn BrowserSession) -> Result<(), ScrapeError> {
        let timing = &self.profile.timing;

        self.phase = SessionPhase::Navigating;
        debug!("Navigating to {}", self.profile.url);
        browser.navigate(&self.profile.url, timing.navigation_timeout).await?;
        if self.profile.reset_on_load {
            trace!("Resetting cookies for {}", self.profile.name);
            let reset = async {
                browser.clear_cookies().await?;
                browser.reload().await
            };
            match timeout(timing.navigation_timeout, reset).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ScrapeError::Navigation {
                        url: self.profile.url.clone(),
                        message: format!("reset timed out after {:?}", timing.navigation_timeout),
                    })
                }
            }
        }

        self.phase = SessionPhase::ExtractLoop;
        let ceiling = self.profile.iteration_ceiling();
        while self.discovered.len() < self.profile.max_changes && self.iterations < ceiling {
            self.iterations += 1;
            match self.iterate(browser).await {
                Ok(IterationOutcome::Discovered(domain)) => {
                    info!(
                        "{} on {} issued new domain {} ({}/{})",
                        self.profile.name,
                        self.engine,
                        domain,
                        self.discovered.len(),
                        self.profile.max_changes
                    );
                }
                Ok(IterationOutcome::Duplicate(domain)) => {
                    debug!("{} on {} repeated domain {}", self.profile.name, self.engine, domain);
                }
                Err(e) => {
                    warn!(
                        "{} on {}: iteration {} aborted: {}",
                        self.profile.name, self.engine, self.iterations, e
                    );
                    self.last_error = Some(e);
                    break;
                }
            }
        }

        if self.discovered.is_empty() {
            if let Some(e) = self.last_error.take() {
                return Err(e);
            }
        }
        Ok(())
    }

    async fn iterate(&mut self, browser: &mut dyn BrowserSession) -> Result<IterationOutcome, ScrapeError> {
        let profile = self.profile;
        let timing = &profile.timing;

        browser
            .wait_for_element(&profile.address_selector, timing.element_timeout)
            .await?;
        let candidate = self.read_domain(browser).await?;
        let domain = self.validator.validate(&candidate)?;

        let outcome = if self.discovered.insert(domain.clone()) {
            IterationOutcome::Discovered(domain)
        } else {
            IterationOutcome::Duplicate(domain)
        };

        let more_needed = self.discovered.len() < profile.max_changes
            && self.iterations < profile.iteration_ceiling();
        if more_needed {
            browser
                .click(&profile.new_address_selector, timing.action_timeout)
                .await?;
            sleep(timing.settle_delay).await;
        }

        Ok(outcome)
    }

    /// Polls the address display until it shows something other than a placeholder.
    async fn read_domain(&self, browser: &mut dyn BrowserSession) -> Result<String, ScrapeError> {
        let profile = self.profile;
        let timing = &profile.timing;
        let property = profile.text_property.as_deref();

        let poll = async {
            loop {
                let text = browser.read_text(&profile.address_selector, property).await?;
                if !profile.is_placeholder(&text) {
                    if let Some(domain) = extract_domain(&text, profile.extraction) {
                        return Ok::<String, ScrapeError>(domain);
                    }
                }
                trace!("Address display not ready yet: {:?}", text);
                sleep(timing.poll_interval).await;
            }
        };

        match timeout(timing.load_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::PlaceholderTimeout(timing.load_timeout)),
        }
    }
}
