use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

use crate::validator::DomainValidator;

/// Which set a batch of candidates is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Allow,
    Deny,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Allow => write!(f, "allow"),
            ListKind::Deny => write!(f, "deny"),
        }
    }
}

/// Outcome counts of one merge call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub vetoed: usize,
}

/// The two sets a run publishes, after the allowlist veto has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedSets {
    pub allow: BTreeSet<String>,
    pub disposable: BTreeSet<String>,
}

/// Per-run aggregation context. `merge` is the only way in.
///
/// Both sets only grow while ingestion runs. A deny candidate already on the
/// allowlist is vetoed at insertion, and `finalize` subtracts the allow set
/// once more so arrival order cannot leak an allowlisted domain.
#[derive(Debug, Clone)]
pub struct DomainSets {
    validator: DomainValidator,
    allow: BTreeSet<String>,
    disposable: BTreeSet<String>,
}

impl DomainSets {
    pub fn new(validator: DomainValidator) -> Self {
        Self {
            validator,
            allow: BTreeSet::new(),
            disposable: BTreeSet::new(),
        }
    }

    pub fn merge<I, S>(&mut self, candidates: I, kind: ListKind) -> MergeStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = MergeStats::default();
        for candidate in candidates {
            let domain = match self.validator.validate(candidate.as_ref()) {
                Ok(domain) => domain,
                Err(rejection) => {
                    debug!("Dropping candidate: {}", rejection);
                    stats.rejected += 1;
                    continue;
                }
            };

            let inserted = match kind {
                ListKind::Allow => self.allow.insert(domain),
                ListKind::Deny if self.allow.contains(&domain) => {
                    stats.vetoed += 1;
                    continue;
                }
                ListKind::Deny => self.disposable.insert(domain),
            };

            if inserted {
                stats.accepted += 1;
            } else {
                stats.duplicates += 1;
            }
        }
        stats
    }

    pub fn allow(&self) -> &BTreeSet<String> {
        &self.allow
    }

    pub fn disposable(&self) -> &BTreeSet<String> {
        &self.disposable
    }

    /// Applies `disposable - allow` and hands back both sets.
    pub fn finalize(self) -> PublishedSets {
        let Self { allow, mut disposable, .. } = self;
        let before = disposable.len();
        disposable.retain(|domain| !allow.contains(domain));
        let removed = before - disposable.len();
        if removed > 0 {
            info!("Final pass removed {} allowlisted domains from the disposable set", removed);
        }
        PublishedSets { allow, disposable }
    }
}
