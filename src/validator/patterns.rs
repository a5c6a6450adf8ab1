use once_cell::sync::Lazy;
use regex::Regex;

/// A single non-TLD DNS label: 1-63 chars, alphanumeric ends, hyphens inside.
pub static LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$")
        .unwrap()
});

pub static TLD_CHARS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9-]+$").unwrap()
});

/// Loose email shape used when pulling an address out of arbitrary page text.
pub static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)+")
        .unwrap()
});
