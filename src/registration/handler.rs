//! Handler registrations: `reg("api/name", ...)`.

use super::{RegistrationMatch, RegistrationMatcher};
use crate::error::Result;
use crate::source::{anchored, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

static NAMED: Lazy<Regex> = Lazy::new(|| anchored(r#"\s*reg\("\w+/([\w-]*/?)".*"#));

/// A name built at run time or a literal with `*`, `:` or `?`; it is not meant to match the
/// function name of the comment.
static SPECIAL_NAME: Lazy<Regex> = Lazy::new(|| anchored(r#"\s*reg\((?:[^"]|"[\w?:*/]+").*"#));

static ANY: Lazy<Regex> = Lazy::new(|| anchored(r"\s*reg\(.*"));

pub struct HandlerMatcher;

impl RegistrationMatcher for HandlerMatcher {
    fn name(&self) -> &'static str {
        "handler"
    }

    fn try_match(&self, source: &SourceCode, line: usize) -> Result<Option<RegistrationMatch>> {
        if let Some(groups) = source.match_line(line, &NAMED) {
            return Ok(Some(RegistrationMatch::new(Some(&groups[0]), None, None, None)));
        }
        if source.line_matches(line, &SPECIAL_NAME) || source.line_matches(line, &ANY) {
            return Ok(Some(RegistrationMatch::default()));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn match_line(text: &str) -> Option<RegistrationMatch> {
        let code = SourceCode::from_text("handlers.cpp", text);
        HandlerMatcher.try_match(&code, 1).unwrap()
    }

    // ===== Handler Tests =====

    #[test]
    fn test_literal_name() {
        let found = match_line(r#"    reg("api/getStatistics", new StatisticsHandler());"#).unwrap();
        assert_eq!(found.function_name.as_deref(), Some("getStatistics"));
        assert_eq!(found.method, None);
        assert_eq!(found.input_type, None);
    }

    #[test]
    fn test_trailing_slash_is_kept() {
        let found = match_line(r#"reg("api/storages/", handler);"#).unwrap();
        assert_eq!(found.function_name.as_deref(), Some("storages/"));
    }

    #[test]
    fn test_special_names_match_without_name() {
        assert_eq!(
            match_line(r#"reg("ec2/*/events", handler);"#),
            Some(RegistrationMatch::default())
        );
        assert_eq!(match_line("reg(kPathConstant, handler);"), Some(RegistrationMatch::default()));
    }

    #[test]
    fn test_not_a_registration() {
        assert_eq!(match_line("registry(\"api/x\");"), None);
        assert_eq!(match_line("// reg(\"api/x\")"), None);
    }
}
