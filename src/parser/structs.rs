//! @dose
//! purpose: Struct scanner. Finds `struct Name: Bases {` declarations starting at column 0
//!     and collects their fields (`    Type name;` lines, possibly spread over several lines),
//!     nested enums and nested flags.
//!
//! when-editing:
//!     - !Fields are recognized only at exactly four spaces of indent
//!     - !A `std::map<K, V>` base makes the struct a map of `V`, not a struct deriving from it
//!     - Nested enums and flags keep their own names here; freeze renames them
//!
//! invariants:
//!     - Field order is declaration order
//!     - A chrono field without its unit suffix is an error unless deprecated or the check
//!       is disabled
//!
//! gotchas:
//!     - A line that starts like a field but has no `;` is joined with the following lines
//!       up to the first `;`; trailing `//` comments are dropped while joining
//!     - `using` aliases look like fields and are skipped

use super::enums::EnumScanner;
use super::flags::FlagScanner;
use super::{StructField, StructInfo};
use crate::apidoc::tag::items_for_type;
use crate::apidoc::{TAG_APIDOC, TAG_DEPRECATED};
use crate::error::{Error, Result};
use crate::source::{anchored, match_regex, SourceCode};
use crate::types::type_info::{chrono_suffix, remove_cpp_namespaces};
use crate::types::TypeInfo;
use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r"struct [^;]*"));
static HEADER: Lazy<Regex> = Lazy::new(|| anchored(r"struct ([^;]*)\{"));
static HEADER_LAST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r"[^;]*\{"));
static LAST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r"};"));

static FIELD_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {4}((?:::)*\w+(?:(?:::|<|, )\w+)*)").unwrap());
static FIELD: Lazy<Regex> = Lazy::new(|| {
    anchored(r" {4}((?:::)*\w+(?:(?:::|<|, )\w+>*)*)\s+(\w+)(?:\s=\s.*)?(?:\s*\{.*\}\s*)?;.*")
});

static BASES_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r":\s").unwrap());
static ACCESS_SPECIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:public|private|protected|virtual)\b").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub struct StructScanner<'a> {
    source: &'a SourceCode,
    line: usize,
    invalid_chrono_field_suffix_is_error: bool,
}

impl<'a> StructScanner<'a> {
    pub fn new(source: &'a SourceCode, invalid_chrono_field_suffix_is_error: bool) -> Self {
        Self {
            source,
            line: 1,
            invalid_chrono_field_suffix_is_error,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::declaration(self.source.location(self.line), message)
    }

    pub fn parse_structs(&mut self) -> Result<Vec<StructInfo>> {
        let mut structs = Vec::new();
        self.line = 1;
        while self.line <= self.source.line_count() {
            if let Some(info) = self.parse_struct()? {
                structs.push(info);
            }
            self.line += 1;
        }
        Ok(structs)
    }

    fn parse_struct(&mut self) -> Result<Option<StructInfo>> {
        let Some(values) =
            self.source
                .match_anchored_block(self.line, &FIRST_LINE, &HEADER, &HEADER_LAST_LINE)?
        else {
            return Ok(None);
        };

        let mut info = self.parse_header(&values[0])?;
        self.line += 1;
        while self.line <= self.source.line_count() {
            if self.source.line_matches(self.line, &LAST_LINE) {
                break;
            }
            self.parse_body_line(&mut info)?;
            self.line += 1;
        }
        Ok(Some(info))
    }

    fn parse_body_line(&mut self, info: &mut StructInfo) -> Result<()> {
        let mut enums = EnumScanner::new(self.source, self.line);
        let nested = match enums.parse_regular_enum()? {
            Some(nested) => Some(nested),
            None => enums.parse_nx_reflect_enum()?,
        };
        if let Some(nested) = nested {
            info.nested_enums.push(nested);
            self.line = enums.line();
            return Ok(());
        }

        if let Some(flag) = FlagScanner::new(self.source, self.line).parse_flag()? {
            info.nested_flags.push(flag);
            return Ok(());
        }

        let first_line = self.line;
        let mut matched = self.source.match_line(self.line, &FIELD);
        if matched.is_none() && FIELD_PREFIX.is_match(self.source.line(self.line)) {
            let (text, last_line) = self.collect_until_semicolon(self.line)?;
            let merged = format!("    {}", WHITESPACE.replace_all(&text, " "));
            if let Some(values) = match_regex(&FIELD, &merged) {
                matched = Some(values);
                self.line = last_line;
            }
        }

        if let Some(values) = matched {
            if values[0] != "using" {
                let field = self.parse_field(&values[0], &values[1], first_line)?;
                info.fields.push(field);
            }
        }
        Ok(())
    }

    /// Join lines from `start` up to the first one ending with `;`.
    fn collect_until_semicolon(&self, start: usize) -> Result<(String, usize)> {
        let mut text = String::new();
        let mut current = start;
        loop {
            if current > self.source.line_count() {
                return Err(self.error(
                    "Was unable to parse a multiline type before hitting the end of the file.",
                ));
            }
            let raw = self.source.line(current);
            let code = raw.find("//").map(|i| &raw[..i]).unwrap_or(raw).trim();
            text.push_str(code);
            if code.ends_with(';') {
                break;
            }
            current += 1;
        }
        Ok((text.trim().replace(',', ", "), current))
    }

    fn parse_header(&self, header: &str) -> Result<StructInfo> {
        let parts: Vec<&str> = BASES_SEPARATOR.split(header).collect();
        if parts.len() > 2 {
            return Err(self.error("Too many inheritance symbols ':'"));
        }

        let mut base_names = Vec::new();
        let mut is_map = false;
        if let Some(parents) = parts.get(1) {
            let parents = ACCESS_SPECIFIER.replace_all(parents, "");
            let parents = parents.trim();
            match TypeInfo::map_value_of(parents).map_err(|e| self.error(e))? {
                Some(value) => {
                    base_names.extend(value.name);
                    is_map = true;
                }
                None => base_names.extend(
                    parents
                        .split(',')
                        .map(|base| remove_cpp_namespaces(base.trim()).to_string())
                        .filter(|base| !base.is_empty()),
                ),
            }
        }

        let Some(name) = parts[0]
            .split_whitespace()
            .filter(|token| *token != "final")
            .last()
        else {
            return Err(self.error("Missing struct name."));
        };

        Ok(StructInfo {
            name: name.to_string(),
            base_names,
            fields: Vec::new(),
            items: items_for_type(self.source, self.line)?.unwrap_or_default(),
            is_map,
            nested_enums: Vec::new(),
            nested_flags: Vec::new(),
            location: self.source.location(self.line),
        })
    }

    fn parse_field(&self, spelling: &str, name: &str, line: usize) -> Result<StructField> {
        let items = items_for_type(self.source, line)?.unwrap_or_default();
        let field_error = |message: String| Error::declaration(self.source.location(line), message);

        let mut type_info = TypeInfo::default();
        let mut overridden = false;
        if let Some(first) = items.first().filter(|item| item.tag() == TAG_APIDOC) {
            let label = first.label();
            if !label.is_empty() {
                type_info.fill_from_label(label).map_err(|e| {
                    field_error(format!(
                        "Invalid overridden type \"{}\" for field \"{} {}\" found: {}.",
                        label, spelling, name, e
                    ))
                })?;
                overridden = type_info.is_parsed();
            }
        }

        if overridden {
            type_info.is_std_optional |= TypeInfo::is_optional_spelling(spelling);
        } else {
            type_info.fill_from_name(spelling).map_err(field_error)?;
        }

        if let Some(suffix) = type_info.name.as_deref().and_then(chrono_suffix) {
            let deprecated = items.iter().any(|item| item.tag() == TAG_DEPRECATED);
            if self.invalid_chrono_field_suffix_is_error && !name.ends_with(suffix) && !deprecated
            {
                return Err(field_error(format!(
                    "`{} {}` must end with '{}' suffix.",
                    spelling, name, suffix
                )));
            }
        }

        Ok(StructField {
            name: name.to_string(),
            type_info,
            items,
        })
    }
}
