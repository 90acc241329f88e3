//! @dose
//! purpose: API version selectors (`/rest/v3`) and URL prefix replacements. Function paths may
//!     carry version ranges like `/rest/v{1-3}` or open ranges `/rest/v{2-}`; a selector picks
//!     one concrete version and rewrites or rejects paths against it.
//!
//! when-editing:
//!     - !Selectors must end with `/v<digits>`; the text before the digits is the prefix
//!     - apply_exact_version works on whole serialized documents, not single paths
//!
//! invariants:
//!     - A range with first > last is always an error
//!     - An open range has no upper bound
//!
//! gotchas:
//!     - Path rewriting clamps to the nearest bound, document rewriting errors instead

use crate::error::{Error, Result};
use crate::source::{anchored, match_regex};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static SELECTOR: Lazy<Regex> = Lazy::new(|| anchored(r"((?:/[\w\d-]+)*/v)(\d+)"));

#[derive(Debug, Clone)]
pub struct ApiVersion {
    value: String,
    prefix: String,
    version: u32,
    path_version: Regex,
    path_version_range: Regex,
    text_version: Regex,
    text_version_range: Regex,
}

fn parse_version(digits: &str, context: &str) -> Result<u32> {
    digits
        .parse()
        .map_err(|_| Error::Version(format!("{} is invalid: bad version number.", context)))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Version(e.to_string()))
}

impl ApiVersion {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || Error::Version(format!("apiVersions parameter `{}` is invalid.", value));
        let values = match_regex(&SELECTOR, value).ok_or_else(invalid)?;
        let prefix = values[0].clone();
        let version = values[1].parse().map_err(|_| invalid())?;
        let escaped = regex::escape(&prefix);

        Ok(Self {
            value: value.to_string(),
            version,
            path_version: compile(&format!(r"^{}(\d+)(.*)$", escaped))?,
            path_version_range: compile(&format!(r"^({}\{{(\d+)-(\d+)?\}})(.*)$", escaped))?,
            text_version: compile(&format!(r"{}(\d+)", escaped))?,
            text_version_range: compile(&format!(r"{}\{{(\d+)-(\d+)?\}}", escaped))?,
            prefix,
        })
    }

    /// Comma or whitespace separated list of selectors.
    pub fn parse_list(values: &[String]) -> Result<Vec<Self>> {
        values
            .iter()
            .flat_map(|v| v.split(|c: char| c == ',' || c.is_whitespace()))
            .filter(|v| !v.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Replace a leading version range of `path` with the selected version, or with the nearest
/// bound of the range when the selected version is outside it.
pub fn apply_exact_or_nearest_version_to_range(
    path: &str,
    versions: &[ApiVersion],
) -> Result<String> {
    for api in versions {
        let Some(values) = match_regex(&api.path_version_range, path) else {
            continue;
        };
        let range = &values[0];
        let first = parse_version(&values[1], range)?;
        let last = if values[2].is_empty() {
            u32::MAX
        } else {
            parse_version(&values[2], range)?
        };
        if first > last {
            return Err(Error::Version(format!(
                "{} is invalid: first version {} is greater than last version {}.",
                range, first, last
            )));
        }
        let tail = &path[range.len()..];
        if first > api.version {
            return Ok(format!("{}{}{}", api.prefix, first, tail));
        }
        if last < api.version {
            return Ok(format!("{}{}{}", api.prefix, last, tail));
        }
        return Ok(format!("{}{}", api.value, tail));
    }
    Ok(path.to_string())
}

/// Check that every versioned path in `text` is the selected version and replace every
/// range containing it with that version.
pub fn apply_exact_version(text: &str, versions: &[ApiVersion]) -> Result<String> {
    for api in versions {
        for caps in api.text_version.captures_iter(text) {
            let found = &caps[0];
            if parse_version(&caps[1], found)? != api.version {
                return Err(Error::Version(format!(
                    "{} is invalid: only {} is allowed.",
                    found, api.value
                )));
            }
        }
    }

    let mut text = text.to_string();
    for api in versions {
        for caps in api.text_version_range.captures_iter(&text) {
            let found = &caps[0];
            let first = parse_version(&caps[1], found)?;
            let last = match caps.get(2) {
                Some(m) => parse_version(m.as_str(), found)?,
                None => u32::MAX,
            };
            if first > last {
                return Err(Error::Version(format!(
                    "{} is invalid: first version {} is greater than last version {}.",
                    found, first, last
                )));
            }
            if last < api.version {
                return Err(Error::Version(format!(
                    "{} is invalid: last version {} is less than {}.",
                    found, last, api.value
                )));
            }
            if first > api.version {
                return Err(Error::Version(format!(
                    "{} is invalid: first version {} is greater than {}.",
                    found, first, api.value
                )));
            }
        }
        let replacement = format!("{}{}", api.prefix, api.version);
        text = api
            .text_version_range
            .replace_all(&text, regex::NoExpand(&replacement))
            .into_owned();
    }
    Ok(text)
}

/// True when `path` is versioned under one of the selectors but with another version.
pub fn should_path_be_ignored(path: &str, versions: &[ApiVersion]) -> bool {
    for api in versions {
        if let Some(values) = match_regex(&api.path_version, path) {
            return values[0].parse::<u32>().ok() != Some(api.version);
        }
    }
    false
}

/// `target replacement` pair applied to URL prefixes of `%apidoc` headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlReplacement {
    pub target: String,
    pub replacement: String,
}

impl UrlReplacement {
    /// Parse `"target replacement,target replacement"`.
    pub fn parse_list(value: &str) -> Result<Vec<Self>> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Vec::new());
        }
        let invalid = || {
            Error::Version(
                "Invalid urlPrefixReplacement parameter, see help for valid format.".to_string(),
            )
        };
        value
            .split(',')
            .map(|item| {
                let pair: Vec<&str> = item.trim().split(' ').collect();
                match pair.as_slice() {
                    [target, replacement] if !target.is_empty() && !replacement.is_empty() => {
                        Ok(Self {
                            target: target.to_string(),
                            replacement: replacement.to_string(),
                        })
                    }
                    _ => Err(invalid()),
                }
            })
            .collect()
    }

    /// Replace the first `/target/` occurrence with `/replacement/`.
    pub fn apply(&self, path: &str) -> String {
        path.replacen(
            &format!("/{}/", self.target),
            &format!("/{}/", self.replacement),
            1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v(value: &str) -> Vec<ApiVersion> {
        vec![ApiVersion::parse(value).unwrap()]
    }

    // ===== Selector Tests =====

    #[test]
    fn test_parse_selector() {
        let api = ApiVersion::parse("/rest/v3").unwrap();
        assert_eq!(api.prefix(), "/rest/v");
        assert_eq!(api.version(), 3);
        assert!(ApiVersion::parse("rest/v3").is_err());
        assert!(ApiVersion::parse("/rest/v").is_err());
    }

    #[test]
    fn test_parse_list() {
        let list = ApiVersion::parse_list(&["/rest/v2, /jsonrpc/v1".to_string()]).unwrap();
        assert_eq!(list.len(), 2);
    }

    // ===== Path Range Tests =====

    #[test]
    fn test_range_containing_version() {
        assert_eq!(
            apply_exact_or_nearest_version_to_range("/rest/v{2-4}/servers", &v("/rest/v3")).unwrap(),
            "/rest/v3/servers"
        );
    }

    #[test]
    fn test_range_clamps_to_nearest_bound() {
        assert_eq!(
            apply_exact_or_nearest_version_to_range("/rest/v{5-}/x", &v("/rest/v3")).unwrap(),
            "/rest/v5/x"
        );
        assert_eq!(
            apply_exact_or_nearest_version_to_range("/rest/v{1-2}/x", &v("/rest/v3")).unwrap(),
            "/rest/v2/x"
        );
    }

    #[test]
    fn test_inverted_range_is_error() {
        let err = apply_exact_or_nearest_version_to_range("/rest/v{4-2}/x", &v("/rest/v3"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "/rest/v{4-2} is invalid: first version 4 is greater than last version 2."
        );
    }

    #[test]
    fn test_unversioned_path_is_unchanged() {
        assert_eq!(
            apply_exact_or_nearest_version_to_range("/api/x", &v("/rest/v3")).unwrap(),
            "/api/x"
        );
    }

    // ===== Document Tests =====

    #[test]
    fn test_apply_exact_version_rewrites_ranges() {
        let text = r#"{"/rest/v{1-}/a": 1, "/rest/v3/b": 2}"#;
        assert_eq!(
            apply_exact_version(text, &v("/rest/v3")).unwrap(),
            r#"{"/rest/v3/a": 1, "/rest/v3/b": 2}"#
        );
    }

    #[test]
    fn test_apply_exact_version_rejects_other_versions() {
        let err = apply_exact_version("/rest/v2/a", &v("/rest/v3")).unwrap_err();
        assert_eq!(err.to_string(), "/rest/v2 is invalid: only /rest/v3 is allowed.");
        assert!(apply_exact_version("/rest/v{4-}/a", &v("/rest/v3")).is_err());
    }

    #[test]
    fn test_should_path_be_ignored() {
        let versions = v("/rest/v2");
        assert!(should_path_be_ignored("/rest/v1/servers", &versions));
        assert!(!should_path_be_ignored("/rest/v2/servers", &versions));
        assert!(!should_path_be_ignored("/api/servers", &versions));
    }

    // ===== Replacement Tests =====

    #[test]
    fn test_url_replacement() {
        let list = UrlReplacement::parse_list("ec2 api, old new").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].apply("/ec2/getUsers"), "/api/getUsers");
        assert!(UrlReplacement::parse_list("only-one").is_err());
        assert!(UrlReplacement::parse_list("").unwrap().is_empty());
    }
}
