use serde::Deserialize;
use std::time::Duration;

use crate::settings::duration_millis;
use crate::validator::ExtractionStrategy;

// Timing defaults for provider pages
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);  // Page load
pub const ELEMENT_TIMEOUT: Duration = Duration::from_secs(15);     // Address display to appear
pub const ACTION_TIMEOUT: Duration = Duration::from_secs(10);      // "New address" click
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(20);        // Placeholder text to go away
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);    // Between placeholder reads
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);         // After issuing a new address
pub const MAX_CHANGES: usize = 5;                                  // Distinct domains per session

/// Per-step timeouts and delays for one provider's UI.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingProfile {
    #[serde(with = "duration_millis")]
    pub navigation_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub element_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub action_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub load_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self {
            navigation_timeout: NAVIGATION_TIMEOUT,
            element_timeout: ELEMENT_TIMEOUT,
            action_timeout: ACTION_TIMEOUT,
            load_timeout: LOAD_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            settle_delay: SETTLE_DELAY,
        }
    }
}

impl TimingProfile {
    /// Every step shares one duration. Handy for fast fakes.
    pub fn uniform(step: Duration) -> Self {
        Self {
            navigation_timeout: step,
            element_timeout: step,
            action_timeout: step,
            load_timeout: step,
            poll_interval: step,
            settle_delay: step,
        }
    }
}

/// Declarative description of one temporary-email provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub url: String,
    /// Element showing the current address.
    pub address_selector: String,
    /// Element that issues a new address when clicked.
    pub new_address_selector: String,
    /// DOM property to read instead of inner text, e.g. `value` for inputs.
    #[serde(default)]
    pub text_property: Option<String>,
    #[serde(default)]
    pub extraction: ExtractionStrategy,
    /// Texts shown while the address has not loaded yet (case-insensitive substrings).
    #[serde(default = "default_placeholders")]
    pub placeholders: Vec<String>,
    #[serde(default)]
    pub timing: TimingProfile,
    #[serde(default = "default_max_changes")]
    pub max_changes: usize,
    /// Hard cap on loop iterations, duplicates included. Defaults to twice `max_changes`.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Clear cookies and reload once after the first navigation.
    #[serde(default)]
    pub reset_on_load: bool,
}

fn default_placeholders() -> Vec<String> {
    vec!["loading".to_string()]
}

fn default_max_changes() -> usize {
    MAX_CHANGES
}

impl ProviderProfile {
    pub fn iteration_ceiling(&self) -> usize {
        self.max_iterations.unwrap_or(self.max_changes * 2)
    }

    /// True while the display still shows a loading text rather than an address.
    ///
    /// Text holding an `@` is always an address. Whole-text providers show a
    /// bare domain, so there the placeholder must match the whole text.
    pub fn is_placeholder(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return true;
        }
        if text.contains('@') {
            return false;
        }
        let bare = text.trim_end_matches(|c: char| c == '.' || c == '\u{2026}').trim_end();
        self.placeholders
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .any(|p| match self.extraction {
                ExtractionStrategy::AfterAt => text.contains(&p),
                ExtractionStrategy::WholeText => bare == p,
            })
    }
}

/// Providers scraped when the configuration names none.
pub fn builtin_providers() -> Vec<ProviderProfile> {
    vec![
        ProviderProfile {
            name: "temp-mail".to_string(),
            url: "https://temp-mail.org/en/".to_string(),
            address_selector: "#mail".to_string(),
            new_address_selector: "#click-to-delete".to_string(),
            text_property: Some("value".to_string()),
            extraction: ExtractionStrategy::AfterAt,
            placeholders: vec!["loading".to_string()],
            timing: TimingProfile::default(),
            max_changes: MAX_CHANGES,
            max_iterations: None,
            reset_on_load: true,
        },
        ProviderProfile {
            name: "10minutemail".to_string(),
            url: "https://10minutemail.com/".to_string(),
            address_selector: "#mail_address".to_string(),
            new_address_selector: "#new_mail".to_string(),
            text_property: Some("value".to_string()),
            extraction: ExtractionStrategy::AfterAt,
            placeholders: vec!["loading".to_string(), "please wait".to_string()],
            timing: TimingProfile {
                settle_delay: Duration::from_secs(5),
                ..TimingProfile::default()
            },
            max_changes: 3,
            max_iterations: None,
            reset_on_load: false,
        },
        ProviderProfile {
            name: "guerrillamail".to_string(),
            url: "https://www.guerrillamail.com/".to_string(),
            address_selector: "#email-widget".to_string(),
            new_address_selector: "#forget_button".to_string(),
            text_property: None,
            extraction: ExtractionStrategy::AfterAt,
            placeholders: vec!["loading".to_string(), "fetching".to_string()],
            timing: TimingProfile {
                load_timeout: Duration::from_secs(30),
                ..TimingProfile::default()
            },
            max_changes: MAX_CHANGES,
            max_iterations: None,
            reset_on_load: false,
        },
    ]
}
