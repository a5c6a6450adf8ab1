pub mod browser;
pub mod error;
pub mod profile;
pub mod retry;
pub mod session;
pub mod webdriver;

pub use browser::{BrowserEngine, BrowserLauncher, BrowserSession};
pub use error::ScrapeError;
pub use profile::{builtin_providers, ProviderProfile, TimingProfile};
pub use retry::{run_with_retry, RetryPolicy};
pub use session::{IterationOutcome, ScrapeSession, SessionPhase, SessionReport};
pub use webdriver::WebDriverLauncher;

use crate::validator::DomainValidator;

/// Runs one (provider, engine) session under the retry policy.
///
/// Each attempt gets a fresh session and a fresh browser.
pub async fn scrape_with_retry(
    launcher: &dyn BrowserLauncher,
    profile: &ProviderProfile,
    engine: BrowserEngine,
    proxy: Option<&str>,
    validator: &DomainValidator,
    policy: &RetryPolicy,
) -> Result<SessionReport, ScrapeError> {
    let label = format!("{}@{}", profile.name, engine);
    run_with_retry(policy, &label, |attempt| async move {
        let mut session = ScrapeSession::new(profile, engine, validator)
            .with_proxy(proxy)
            .with_attempt(attempt);
        session.run(launcher).await
    })
    .await
}
