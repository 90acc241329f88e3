//! @dose
//! purpose: Line store for C++ sources. A file is loaded once into an ordered list of lines
//!     (1-based) and every scanner reads it through the matching helpers here, including the
//!     anchored multi-line block match that the enum, struct and registration scanners share.
//!
//! when-editing:
//!     - !All regexes passed in are expected to be built with anchored() so a match means a
//!       full-line match
//!     - !Line numbers are 1-based everywhere; index = line - 1
//!     - Captured groups that did not participate come back as empty strings
//!
//! invariants:
//!     - The detected line break is reused verbatim when an edited file is saved
//!     - match_anchored_block joins lines with single spaces before matching the group regex
//!
//! gotchas:
//!     - Lines can end with \n, \r\n or a lone \r; all three split lines on load
//!     - A file without any line break is saved with \n

pub mod editor;

pub use editor::SourceEditor;

use crate::error::{Error, Location, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Compile `pattern` so that it only matches a whole string.
///
/// Only used for patterns written in this crate, hence the unwrap.
pub fn anchored(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{})$", pattern)).unwrap()
}

/// Full-match `text` and return the capture groups (without group 0).
pub fn match_regex(regex: &Regex, text: &str) -> Option<Vec<String>> {
    let caps = regex.captures(text)?;
    let whole = caps.get(0)?;
    if whole.start() != 0 || whole.end() != text.len() {
        return None;
    }
    Some(
        (1..caps.len())
            .map(|i| caps.get(i).map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect(),
    )
}

/// A source file as a list of lines.
#[derive(Debug, Clone)]
pub struct SourceCode {
    path: PathBuf,
    lines: Vec<String>,
    line_break: String,
}

impl SourceCode {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::from_text(path, &text))
    }

    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(text),
            line_break: detect_line_break(text).to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> String {
        self.path.display().to_string()
    }

    pub fn location(&self, line: usize) -> Location {
        Location::new(self.filename(), line)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_break(&self) -> &str {
        &self.line_break
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Text of the 1-based `line`; an out-of-range line reads as empty.
    pub fn line(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn match_line(&self, line: usize, regex: &Regex) -> Option<Vec<String>> {
        if line == 0 || line > self.lines.len() {
            return None;
        }
        match_regex(regex, self.line(line))
    }

    pub fn line_matches(&self, line: usize, regex: &Regex) -> bool {
        line > 0 && line <= self.lines.len() && regex.is_match(self.line(line))
    }

    /// Number of leading spaces of the line.
    pub fn line_indent(&self, line: usize) -> usize {
        self.line(line).chars().take_while(|c| *c == ' ').count()
    }

    /// Anchored multi-line match.
    ///
    /// Returns `Ok(None)` when `first_line` does not match `first_re`. Otherwise lines are
    /// collected up to and including the first one matching `last_re` (the first line itself
    /// may be the last one), joined with spaces and matched against `group_re`; a mismatch
    /// there is an error because the header was recognized but is malformed.
    pub fn match_anchored_block(
        &self,
        first_line: usize,
        first_re: &Regex,
        group_re: &Regex,
        last_re: &Regex,
    ) -> Result<Option<Vec<String>>> {
        if !self.line_matches(first_line, first_re) {
            return Ok(None);
        }

        let mut text = self.line(first_line).to_string();
        if !last_re.is_match(&text) {
            let mut line = first_line + 1;
            while line <= self.lines.len() {
                text.push(' ');
                text.push_str(self.line(line));
                if last_re.is_match(self.line(line)) {
                    break;
                }
                line += 1;
            }
        }

        match match_regex(group_re, &text) {
            Some(groups) => Ok(Some(groups)),
            None => Err(Error::source_at(
                self.location(first_line),
                format!(
                    "No match for regex: {}\nText:\n{}",
                    group_re.as_str(),
                    text
                ),
            )),
        }
    }

    /// Lines from the nearest line above `start_line` matching `start_re` down to
    /// `start_line`, which itself has to match `end_re`.
    pub fn previous_lines(
        &self,
        start_line: usize,
        start_re: &Regex,
        end_re: &Regex,
    ) -> Option<Vec<String>> {
        if start_line == 0 || !self.line_matches(start_line, end_re) {
            return None;
        }

        let mut line = start_line;
        while line > 0 && !self.line_matches(line, start_re) {
            line -= 1;
        }
        if line == 0 {
            return None;
        }

        Some(self.lines[line - 1..start_line].to_vec())
    }
}

fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => lines.push(std::mem::take(&mut current)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Line break of the last line break in the text.
fn detect_line_break(text: &str) -> &'static str {
    let bytes = text.as_bytes();
    for pos in (0..bytes.len()).rev() {
        match bytes[pos] {
            b'\n' => {
                return if pos > 0 && bytes[pos - 1] == b'\r' {
                    "\r\n"
                } else {
                    "\n"
                };
            }
            b'\r' => return "\r",
            _ => {}
        }
    }
    "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source(text: &str) -> SourceCode {
        SourceCode::from_text("test.h", text)
    }

    // ===== Loading Tests =====

    #[test]
    fn test_split_handles_all_line_breaks() {
        let code = source("a\nb\r\nc\rd");
        assert_eq!(code.lines(), &["a", "b", "c", "d"]);
        assert_eq!(code.line_count(), 4);
    }

    #[test]
    fn test_detects_crlf() {
        assert_eq!(source("a\r\nb\r\n").line_break(), "\r\n");
        assert_eq!(source("a\nb\n").line_break(), "\n");
        assert_eq!(source("abc").line_break(), "\n");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = SourceCode::load(Path::new("/nonexistent/file.h")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    // ===== Matching Tests =====

    #[test]
    fn test_match_regex_requires_full_match() {
        let re = anchored(r"\s*int (\w+);(\s*//.*)?");
        assert_eq!(
            match_regex(&re, "    int count;"),
            Some(vec!["count".to_string(), String::new()])
        );
        assert_eq!(match_regex(&Regex::new(r"int").unwrap(), "int x"), None);
    }

    #[test]
    fn test_line_indent() {
        let code = source("        reg(\"x\");\nfoo");
        assert_eq!(code.line_indent(1), 8);
        assert_eq!(code.line_indent(2), 0);
    }

    #[test]
    fn test_anchored_block_spans_lines() {
        let code = source("enum Color\n{\n    red,\n};");
        let first = anchored(r"\s*enum\s+\w+.*");
        let group = anchored(r"\s*enum\s+(\w+)\s*\{.*");
        let last = anchored(r"[^;]*\{.*");
        let groups = code
            .match_anchored_block(1, &first, &group, &last)
            .unwrap()
            .unwrap();
        assert_eq!(groups, vec!["Color".to_string()]);
    }

    #[test]
    fn test_anchored_block_first_line_mismatch_is_none() {
        let code = source("int x;");
        let re = anchored(r"\s*enum.*");
        assert!(code.match_anchored_block(1, &re, &re, &re).unwrap().is_none());
    }

    #[test]
    fn test_anchored_block_group_mismatch_is_error() {
        let code = source("enum ;");
        let first = anchored(r"\s*enum.*");
        let group = anchored(r"\s*enum\s+(\w+)\s*\{");
        let last = anchored(r".*;.*");
        let err = code
            .match_anchored_block(1, &first, &group, &last)
            .unwrap_err();
        assert!(err.to_string().starts_with("test.h:1: No match for regex"));
    }

    #[test]
    fn test_previous_lines_collects_comment_block() {
        let code = source("int a;\n/**\n * text\n */\nreg();");
        let start = anchored(r"\s*/\*.*");
        let end = anchored(r".*\*/\s*");
        assert_eq!(
            code.previous_lines(4, &start, &end),
            Some(vec!["/**".to_string(), " * text".to_string(), " */".to_string()])
        );
        assert_eq!(code.previous_lines(5, &start, &end), None);
    }
}
