//! @dose
//! purpose: Registration matchers. Each matcher recognizes one C++ idiom that wires an API
//!     function to its handler and reports the function name, method and input/output data
//!     types it could read from the call site. The source scan asks the configured matcher
//!     about every line and parses the doc comment right above each match.
//!
//! when-editing:
//!     - !When adding a matcher, register it in MatcherFactory::new() under a kebab-case name;
//!       the CLI and the config refer to matchers by that name
//!     - !try_match must be a pure function of (source, line); no cursor state between calls
//!     - Missing information is None, never an empty string
//!
//! invariants:
//!     - A match is reported on the line whose preceding comment documents the function
//!     - `std::nullptr_t` as input type means "no input"
//!
//! gotchas:
//!     - The function-comment matcher reports the line right after a `*/`, so the comment it
//!       found is the preceding comment of the reported line
//!     - The handler matcher returns a match with no name at all for registrations whose name
//!       is not a plain literal; such functions are still documented but never name-checked
//!
//! flows:
//!     - Get matcher: MatcherFactory::get("template") and call try_match per line

mod function_comment;
mod handler;
mod template;
mod transaction_bus;

use crate::error::Result;
use crate::source::SourceCode;
use std::collections::HashMap;
use std::sync::Arc;

pub use function_comment::FunctionCommentMatcher;
pub use handler::HandlerMatcher;
pub use template::TemplateMatcher;
pub use transaction_bus::TransactionBusMatcher;

/// What a registration call site tells about the function it registers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationMatch {
    pub function_name: Option<String>,
    pub input_type: Option<String>,
    pub output_type: Option<String>,
    pub method: Option<String>,
}

impl RegistrationMatch {
    pub fn new(
        function_name: Option<&str>,
        input_type: Option<&str>,
        output_type: Option<&str>,
        method: Option<&str>,
    ) -> Self {
        let owned = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(str::to_string);
        Self {
            function_name: owned(function_name),
            input_type: owned(input_type).filter(|t| t != "std::nullptr_t"),
            output_type: owned(output_type),
            method: owned(method),
        }
    }

    /// `GET name` or just `name`, for log lines.
    pub fn display_name(&self) -> String {
        match (&self.method, &self.function_name) {
            (Some(method), Some(name)) => format!("{} {}", method, name),
            (None, Some(name)) => name.clone(),
            _ => String::new(),
        }
    }
}

/// Recognizer for one registration idiom.
pub trait RegistrationMatcher: Send + Sync {
    /// Name used on the command line and in the config file.
    fn name(&self) -> &'static str;

    /// Match at the 1-based `line`; `Ok(None)` when the line registers nothing.
    fn try_match(&self, source: &SourceCode, line: usize) -> Result<Option<RegistrationMatch>>;
}

/// All matchers by name.
pub struct MatcherFactory {
    matchers: HashMap<String, Arc<dyn RegistrationMatcher>>,
}

impl MatcherFactory {
    pub fn new() -> Self {
        let mut matchers: HashMap<String, Arc<dyn RegistrationMatcher>> = HashMap::new();

        let all: [Arc<dyn RegistrationMatcher>; 4] = [
            Arc::new(TemplateMatcher),
            Arc::new(HandlerMatcher),
            Arc::new(FunctionCommentMatcher),
            Arc::new(TransactionBusMatcher),
        ];
        for matcher in all {
            matchers.insert(matcher.name().to_string(), matcher);
        }

        Self { matchers }
    }

    pub fn get(&self, name: &str) -> Option<&dyn RegistrationMatcher> {
        self.matchers.get(name).map(|m| m.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.matchers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for MatcherFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Lines of `source` where `matcher` reports a registration.
pub fn find_matches(
    source: &SourceCode,
    matcher: &dyn RegistrationMatcher,
) -> Result<Vec<(usize, RegistrationMatch)>> {
    let mut matches = Vec::new();
    for line in 1..=source.line_count() {
        if let Some(found) = matcher.try_match(source, line)? {
            matches.push((line, found));
        }
    }
    Ok(matches)
}
