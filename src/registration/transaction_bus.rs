//! Transaction bus entries: `APPLY(code, name, DataType, ...)`. Transactions have no HTTP
//! method; `TRACE` stands in for it.

use super::{RegistrationMatch, RegistrationMatcher};
use crate::error::Result;
use crate::source::{anchored, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

pub const TRANSACTION_METHOD: &str = "TRACE";

static APPLY: Lazy<Regex> =
    Lazy::new(|| anchored(r"\s*APPLY\(\s*([0-9]+)\s*,\s*(\w+)\s*,\s*([a-zA-Z_0-9:]+).*"));

pub struct TransactionBusMatcher;

impl RegistrationMatcher for TransactionBusMatcher {
    fn name(&self) -> &'static str {
        "transaction-bus"
    }

    fn try_match(&self, source: &SourceCode, line: usize) -> Result<Option<RegistrationMatch>> {
        let Some(groups) = source.match_line(line, &APPLY) else {
            return Ok(None);
        };
        let name = format!("{} #{}", groups[1], groups[0]);
        Ok(Some(RegistrationMatch::new(
            Some(&name),
            Some(&groups[2]),
            None,
            Some(TRANSACTION_METHOD),
        )))
    }
}
