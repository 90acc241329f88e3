//! Template registrations: `regGet<Input, Output>(..., ApiCommand::name, ...)`,
//! `regUpdate<Input>(..., ApiCommand::name, ...)` and `regFunctor<Input, Output>(...)`,
//! possibly spanning several lines up to the one with `;` or `[`.

use super::{RegistrationMatch, RegistrationMatcher};
use crate::error::Result;
use crate::source::{anchored, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

static LAST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r".*[;\[].*"));

static GET_FIRST: Lazy<Regex> = Lazy::new(|| anchored(r"\s*reg\w*Get\w*\s*<.*"));
static GET_GROUPS: Lazy<Regex> = Lazy::new(|| {
    anchored(r"\s*reg\w*Get\w*\s*<\s*([a-zA-Z_0-9:]+)\s*,\s*(\w+)\s*>.+ApiCommand\s*::\s*(\w+).*")
});

static UPDATE_FIRST: Lazy<Regex> = Lazy::new(|| anchored(r"\s*reg\w*Update\w*\s*<.*"));
static UPDATE_GROUPS: Lazy<Regex> = Lazy::new(|| {
    anchored(r"\s*reg\w*Update\w*\s*<\s*([a-zA-Z_0-9:]+)[, a-zA-Z_0-9:]*\s*>.+ApiCommand\s*::\s*(\w+).*")
});

static FUNCTOR_FIRST: Lazy<Regex> = Lazy::new(|| anchored(r"\s*reg\w*Functor\w*\s*<.*"));
static FUNCTOR_GROUPS: Lazy<Regex> = Lazy::new(|| {
    anchored(
        r"\s*reg\w*Functor\w*\s*<\s*([a-zA-Z_0-9:]+)\s*,\s*(\w+)\s*>.+ApiCommand\s*::\s*(\w+).*",
    )
});

pub struct TemplateMatcher;

impl RegistrationMatcher for TemplateMatcher {
    fn name(&self) -> &'static str {
        "template"
    }

    fn try_match(&self, source: &SourceCode, line: usize) -> Result<Option<RegistrationMatch>> {
        if let Some(g) = source.match_anchored_block(line, &GET_FIRST, &GET_GROUPS, &LAST_LINE)? {
            return Ok(Some(RegistrationMatch::new(
                Some(&g[2]),
                Some(&g[0]),
                Some(&g[1]),
                Some("GET"),
            )));
        }

        if let Some(g) =
            source.match_anchored_block(line, &UPDATE_FIRST, &UPDATE_GROUPS, &LAST_LINE)?
        {
            return Ok(Some(RegistrationMatch::new(
                Some(&g[1]),
                Some(&g[0]),
                None,
                Some("POST"),
            )));
        }

        if let Some(g) =
            source.match_anchored_block(line, &FUNCTOR_FIRST, &FUNCTOR_GROUPS, &LAST_LINE)?
        {
            return Ok(Some(RegistrationMatch::new(
                Some(&g[2]),
                Some(&g[0]),
                Some(&g[1]),
                Some("GET"),
            )));
        }

        Ok(None)
    }
}
