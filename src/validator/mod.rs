pub mod patterns;
pub mod tld_registry;

use std::sync::Arc;
use thiserror::Error;

use patterns::{EMAIL_REGEX, LABEL_REGEX, TLD_CHARS_REGEX};
pub use tld_registry::TldRegistry;

// Constants for validation
const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_TLD_LENGTH: usize = 63;

/// Why a candidate string was not accepted as a domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("candidate is empty")]
    Empty,

    #[error("candidate '{0}' lacks domain structure")]
    Structure(String),

    #[error("label '{label}' in '{domain}' is not a valid DNS label")]
    InvalidLabel { domain: String, label: String },

    #[error("TLD of '{0}' exceeds 63 characters")]
    TldTooLong(String),

    #[error("TLD of '{0}' contains invalid characters")]
    TldInvalidCharacters(String),

    #[error("TLD of '{0}' starts or ends with a hyphen")]
    TldHyphen(String),

    #[error("TLD '{tld}' of '{domain}' is not in the registry")]
    UnknownTld { domain: String, tld: String },
}

/// How a provider's displayed text is turned into a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Text holds an email address; take what follows the last `@`.
    #[default]
    AfterAt,
    /// Text already is the domain.
    WholeText,
}

/// Trims surrounding whitespace and lowercases. Idempotent.
pub fn normalize(candidate: &str) -> String {
    candidate.trim().to_lowercase()
}

/// Pulls the domain part out of displayed address text.
pub fn extract_domain(text: &str, strategy: ExtractionStrategy) -> Option<String> {
    let text = text.trim();
    let domain = match strategy {
        ExtractionStrategy::WholeText => text,
        ExtractionStrategy::AfterAt => {
            let address = EMAIL_REGEX.find(text).map(|m| m.as_str()).unwrap_or(text);
            let (_, domain) = address.rsplit_once('@')?;
            domain
        }
    };
    let domain = normalize(domain);
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

/// Syntactic and TLD-membership check over candidate domains.
#[derive(Debug, Clone)]
pub struct DomainValidator {
    registry: Arc<TldRegistry>,
}

impl DomainValidator {
    pub fn new(registry: TldRegistry) -> Self {
        Self { registry: Arc::new(registry) }
    }

    pub fn registry(&self) -> &TldRegistry {
        &self.registry
    }

    /// Normalizes `candidate` and returns it if it is a valid domain.
    pub fn validate(&self, candidate: &str) -> Result<String, Rejection> {
        let domain = normalize(candidate);
        if domain.is_empty() {
            return Err(Rejection::Empty);
        }
        if domain.len() > MAX_DOMAIN_LENGTH {
            return Err(Rejection::Structure(domain));
        }

        let labels: Vec<&str> = domain.split('.').collect();
        let (tld, rest) = match labels.split_last() {
            Some((tld, rest)) if !rest.is_empty() && !tld.is_empty() => (*tld, rest),
            _ => return Err(Rejection::Structure(domain)),
        };

        if tld.len() > MAX_TLD_LENGTH {
            return Err(Rejection::TldTooLong(domain));
        }
        if !TLD_CHARS_REGEX.is_match(tld) {
            return Err(Rejection::TldInvalidCharacters(domain));
        }
        if tld.starts_with('-') || tld.ends_with('-') {
            return Err(Rejection::TldHyphen(domain));
        }

        if let Some(label) = rest.iter().find(|label| !LABEL_REGEX.is_match(label)) {
            return Err(Rejection::InvalidLabel {
                label: label.to_string(),
                domain: domain.clone(),
            });
        }

        if !self.registry.contains(tld) {
            return Err(Rejection::UnknownTld {
                tld: tld.to_string(),
                domain: domain.clone(),
            });
        }

        Ok(domain)
    }

    pub fn is_valid(&self, candidate: &str) -> bool {
        self.validate(candidate).is_ok()
    }
}
