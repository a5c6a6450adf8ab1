use std::time::Duration;
use thiserror::Error;

use super::browser::BrowserEngine;
use crate::validator::Rejection;

/// Failures inside a scraping session. Every variant is retryable at session level.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("failed to launch {engine}: {message}")]
    Launch { engine: BrowserEngine, message: String },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out after {timeout:?} waiting for '{selector}'")]
    SelectorTimeout { selector: String, timeout: Duration },

    #[error("action on '{selector}' failed: {message}")]
    Action { selector: String, message: String },

    #[error("address display still loading after {0:?}")]
    PlaceholderTimeout(Duration),

    #[error("harvested domain rejected: {0}")]
    Validation(#[from] Rejection),

    #[error("browser error: {0}")]
    Browser(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScrapeError::Launch {
            engine: BrowserEngine::Firefox,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "failed to launch firefox: connection refused");
    }

    #[test]
    fn test_rejection_converts() {
        let err: ScrapeError = Rejection::Empty.into();
        assert!(matches!(err, ScrapeError::Validation(Rejection::Empty)));
        assert!(err.to_string().contains("candidate is empty"));
    }
}
