//! Standalone multi-line apidoc comments (`/**%apidoc GET ...` up to a lone `*/`) documenting
//! a function without a registration call. The match is reported on the line after `*/`.

use super::{RegistrationMatch, RegistrationMatcher};
use crate::error::Result;
use crate::source::{anchored, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_LINE: Lazy<Regex> =
    Lazy::new(|| anchored(r"\s*/\*\*%apidoc (GET|POST|PUT|PATCH|DELETE).*"));
static LAST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r"\s*\*/\s*"));

pub struct FunctionCommentMatcher;

impl RegistrationMatcher for FunctionCommentMatcher {
    fn name(&self) -> &'static str {
        "function-comment"
    }

    fn try_match(&self, source: &SourceCode, line: usize) -> Result<Option<RegistrationMatch>> {
        // The closing line must come after the opening one; a one-line comment is no match.
        if line < 3 || !source.line_matches(line - 1, &LAST_LINE) {
            return Ok(None);
        }
        let mut start = line - 2;
        while start > 0 {
            if source.line_matches(start, &FIRST_LINE) {
                return Ok(Some(RegistrationMatch::default()));
            }
            if source.line_matches(start, &LAST_LINE) {
                break;
            }
            start -= 1;
        }
        Ok(None)
    }
}
