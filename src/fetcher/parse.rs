use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::validator::normalize;

fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// One candidate per line; blank and `#` lines are dropped.
pub fn parse_plain(body: &str) -> Vec<String> {
    body.lines()
        .map(normalize)
        .filter(|line| !line.is_empty() && !is_comment(line))
        .collect()
}

/// Resolves `key` in a JSON body and returns the string elements of the list found there.
pub fn parse_structured(body: &str, key: &str) -> Result<Vec<String>> {
    let root: Value = serde_json::from_str(body)?;
    let value = resolve_path(&root, key).ok_or_else(|| anyhow!("Key '{}' not found", key))?;
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("Value at '{}' is not a list", key))?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(normalize)
        .filter(|item| !item.is_empty())
        .collect())
}

/// Walks a dot-path; `.` or an empty path is the root, numeric segments index arrays.
fn resolve_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let path = key.trim().trim_matches('.');
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Takes column `column` of each delimited line, stripping quotes.
pub fn parse_delimited(body: &str, column: usize, delimiter: char) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_comment(line))
        .filter_map(|line| line.split(delimiter).nth(column))
        .map(|field| normalize(field.trim().trim_matches(|c: char| c == '"' || c == '\'')))
        .filter(|field| !field.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain() {
        let body = "# header\r\nMailinator.COM\r\n\r\n  10minutemail.com  \n#yopmail.com\n";
        assert_eq!(parse_plain(body), vec!["mailinator.com", "10minutemail.com"]);
    }

    #[test]
    fn test_structured_root() {
        let body = r#"["A.com", "b.com", 3, null, "  "]"#;
        assert_eq!(parse_structured(body, ".").unwrap(), vec!["a.com", "b.com"]);
    }

    #[test]
    fn test_structured_nested_key() {
        let body = r#"{"data": {"domains": ["x.tk", "Y.tk"]}, "meta": {"count": 2}}"#;
        assert_eq!(parse_structured(body, "data.domains").unwrap(), vec!["x.tk", "y.tk"]);
        assert_eq!(parse_structured(r#"{"lists": [["z.tk"]]}"#, "lists.0").unwrap(), vec!["z.tk"]);
    }

    #[test]
    fn test_structured_requires_list() {
        let body = r#"{"meta": {"count": 2}, "domains": "a.com"}"#;
        assert!(parse_structured(body, "meta.count").is_err());
        assert!(parse_structured(body, "domains").is_err());
        assert!(parse_structured(body, "missing").is_err());
        assert!(parse_structured("not json", ".").is_err());
    }

    #[test]
    fn test_delimited() {
        let body = "# domain,added\n\"Spam.tk\",2024-01-01\n'junk.ml' ,2024-02-01\nlonely\n,2024\n";
        assert_eq!(parse_delimited(body, 0, ','), vec!["spam.tk", "junk.ml", "lonely"]);
        assert_eq!(parse_delimited(body, 1, ','), vec!["2024-01-01", "2024-02-01", "2024"]);
        assert_eq!(parse_delimited("a;b.tk\nc", 1, ';'), vec!["b.tk"]);
    }
}
