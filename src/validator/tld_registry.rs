use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::normalize;

const BUILTIN_TLDS: &str = include_str!("../../data/tlds.txt");

/// Known top-level domains, kept both as an ordered list and as a lookup set.
///
/// The list is produced by an external generator from the IANA root zone
/// listing; this type only reads it.
#[derive(Debug, Clone, Default)]
pub struct TldRegistry {
    tlds: Vec<String>,
    lookup: HashSet<String>,
}

impl TldRegistry {
    /// Parses the IANA text format: one TLD per line, `#` comments, any case.
    pub fn from_iana_text(text: &str) -> Self {
        let mut registry = Self::default();
        for line in text.lines() {
            let tld = normalize(line);
            if tld.is_empty() || tld.starts_with('#') {
                continue;
            }
            let tld = tld.trim_start_matches('.').to_string();
            if registry.lookup.insert(tld.clone()) {
                registry.tlds.push(tld);
            }
        }
        registry
    }

    /// Loads the registry from a generated TLD file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading TLD registry from {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read TLD registry: {}", path.display()))?;
        let registry = Self::from_iana_text(&text);
        if registry.is_empty() {
            anyhow::bail!("TLD registry {} contains no entries", path.display());
        }
        info!("Loaded {} TLDs from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// The list compiled into the binary, used when no registry file is configured.
    pub fn builtin() -> Self {
        Self::from_iana_text(BUILTIN_TLDS)
    }

    pub fn contains(&self, tld: &str) -> bool {
        self.lookup.contains(tld)
    }

    pub fn tlds(&self) -> &[String] {
        &self.tlds
    }

    pub fn len(&self) -> usize {
        self.tlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tlds.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for TldRegistry {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let text = iter.into_iter().collect::<Vec<_>>().join("\n");
        Self::from_iana_text(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::DomainValidator;

    #[test]
    fn test_parses_iana_format() {
        let text = "# Version 2024101800, Last Updated Fri Oct 18 07:07:01 2024 UTC\nCOM\nNET\n\nXN--P1AI\ncom\n";
        let registry = TldRegistry::from_iana_text(text);
        assert_eq!(registry.tlds(), &["com", "net", "xn--p1ai"]);
        assert!(registry.contains("xn--p1ai"));
        assert!(!registry.contains("COM"));
    }

    #[test]
    fn test_builtin_registry_has_common_tlds() {
        let registry = TldRegistry::builtin();
        for tld in ["com", "org", "net", "tk", "io"] {
            assert!(registry.contains(tld), "missing {}", tld);
        }
    }

    #[test]
    fn test_builtin_registry_covers_new_gtlds() {
        let registry = TldRegistry::builtin();
        assert!(registry.len() > 1000);
        for tld in ["host", "app", "one", "world", "life", "today", "xn--p1ai"] {
            assert!(registry.contains(tld), "missing {}", tld);
        }
        assert!(DomainValidator::new(registry).validate("mailbox.host").is_ok());
    }

    #[test]
    fn test_from_file_rejects_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tlds.txt");
        fs::write(&path, "# only a header\n").unwrap();
        assert!(TldRegistry::from_file(&path).is_err());
    }
}
