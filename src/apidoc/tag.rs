//! @dose
//! purpose: Tag lexer for apidoc comments. Splits the lines of one `/** ... */` block into
//!     items of the form `* %tag[attr]:label token text`, where the text may continue on the
//!     following ` * ` lines, and locates apidoc comments around declarations.
//!
//! when-editing:
//!     - !A continuation line must start with `* ` and must not contain `%`
//!     - !Lines that are only `/**`, `*` or `*/` are skipped between items
//!     - Line numbers of items are absolute file lines so errors point at the source
//!
//! invariants:
//!     - Every non-empty comment line either starts an item or continues one, anything else
//!       is an "Invalid tag line" error
//!     - text_after_token removes 4 spaces per indent level from continuation lines
//!
//! gotchas:
//!     - The token is stored untrimmed; full_text concatenates it with the text verbatim
//!     - A trailing `*/` on the item line itself is cut before matching

use crate::error::{Error, Location, Result};
use crate::source::{anchored, match_regex, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

static EMPTY_COMMENT_LINE: Lazy<Regex> = Lazy::new(|| anchored(r"\s*(?:/\*)?\*?/?\s*"));

static ITEM_START: Lazy<Regex> = Lazy::new(|| {
    anchored(concat!(
        r"\s*(?:/\*)?\*?\*?(<)?\s*(%[^\s\[:]+)\s*(\[\w+\])?\s*",
        r"(:\s*((?:[_A-Za-z0-9{}<>:]|, )+))?\s*([^\[\s][^\s]*\s*)?(.*)"
    ))
});

static ITEM_CONTINUATION: Lazy<Regex> = Lazy::new(|| anchored(r"\s*\* ([^%]*)"));

static TRAILING_COMMENT: Lazy<Regex> = Lazy::new(|| anchored(r".+(/\*\*(<)?\s*%apidoc.*\*/)"));

pub static COMMENT_END: Lazy<Regex> = Lazy::new(|| anchored(r"\s*(/\*\*.*)?\*/\s*"));

pub static COMMENT_START: Lazy<Regex> = Lazy::new(|| anchored(r"\s*/\*.*"));

static APIDOC_COMMENT_START: Lazy<Regex> = Lazy::new(|| anchored(r"\s*/\*\*(<)?\s*%apidoc.*"));

/// One `%tag` statement of an apidoc comment.
#[derive(Debug, Clone, PartialEq)]
pub struct TagItem {
    tag: String,
    attribute: String,
    label: String,
    token_untrimmed: String,
    text_lines: Vec<String>,
    location: Location,
}

impl TagItem {
    /// Tag including `%`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute with brackets, or empty.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// First whitespace-delimited word after the tag, or empty.
    pub fn token(&self) -> &str {
        self.token_untrimmed.trim()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn error(&self, message: impl Into<String>) -> Error {
        Error::comment(self.location.clone(), message)
    }

    /// Text following the token; continuation lines lose `indent_level * 4` leading spaces.
    pub fn text_after_token(&self, indent_level: usize) -> String {
        let Some((first, rest)) = self.text_lines.split_first() else {
            return String::new();
        };
        let indent = " ".repeat(indent_level * 4);

        let mut text = trim_right(first).to_string();
        for (offset, line) in rest.iter().enumerate() {
            if !text.is_empty() {
                text.push('\n');
            }
            let stripped = match line.strip_prefix(indent.as_str()) {
                Some(stripped) => stripped,
                None => {
                    tracing::debug!(
                        "{}:{}: Too small indent.",
                        self.location.file,
                        self.location.line + offset + 1
                    );
                    line.as_str()
                }
            };
            text.push_str(trim_right(stripped));
        }
        text
    }

    /// Token followed by the text.
    pub fn full_text(&self, indent_level: usize) -> String {
        let new_line_required = !self.token().is_empty()
            && self.text_lines.len() > 1
            && self.text_lines[0].trim().is_empty();
        if new_line_required {
            format!(
                "{}\n{}",
                self.token_untrimmed,
                self.text_after_token(indent_level)
            )
        } else {
            format!(
                "{}{}",
                self.token_untrimmed,
                self.text_after_token(indent_level)
            )
        }
    }
}

fn trim_right(s: &str) -> &str {
    s.trim_end_matches(' ')
}

/// Split comment lines into items. `first_line` is the file line of `lines[0]`.
pub fn parse_items(lines: &[String], filename: &str, first_line: usize) -> Result<Vec<TagItem>> {
    let mut items = Vec::new();
    let mut index = 0;
    loop {
        while index < lines.len() && match_regex(&EMPTY_COMMENT_LINE, &lines[index]).is_some() {
            index += 1;
        }
        if index >= lines.len() {
            return Ok(items);
        }

        let location = Location::new(filename, first_line + index);
        let line = lines[index].as_str();
        let line = line.strip_suffix("*/").unwrap_or(line);
        let Some(values) = match_regex(&ITEM_START, line) else {
            return Err(Error::tag(location, "Invalid tag line in Apidoc comment"));
        };

        index += 1;
        let mut text_lines = vec![values[6].clone()];
        while index < lines.len() {
            let Some(continuation) = match_regex(&ITEM_CONTINUATION, &lines[index]) else {
                break;
            };
            text_lines.push(continuation[0].clone());
            index += 1;
        }

        items.push(TagItem {
            tag: values[1].clone(),
            attribute: values[2].clone(),
            label: values[4].clone(),
            token_untrimmed: values[5].clone(),
            text_lines,
            location,
        });
    }
}

/// Items of the apidoc comment attached to a declaration at `line`, either trailing on the
/// same line (`/**<%apidoc ... */`) or preceding it.
pub fn items_for_type(source: &SourceCode, line: usize) -> Result<Option<Vec<TagItem>>> {
    let trailing = trailing_comment(source, line)?;
    let preceding = preceding_comment(source, line.saturating_sub(1))?;

    let (first_line, lines) = match (trailing, preceding) {
        (None, None) => return Ok(None),
        (Some(_), Some(_)) => {
            return Err(Error::tag(
                source.location(line),
                "Both trailing and preceding apidoc comments found.",
            ))
        }
        (Some(comment), None) => (line, vec![comment]),
        (None, Some(lines)) => (line - lines.len(), lines),
    };
    if lines.is_empty() {
        return Ok(None);
    }
    let items = parse_items(&lines, &source.filename(), first_line)?;
    if items.is_empty() {
        return Ok(None);
    }
    Ok(Some(items))
}

fn trailing_comment(source: &SourceCode, line: usize) -> Result<Option<String>> {
    let Some(values) = source.match_line(line, &TRAILING_COMMENT) else {
        return Ok(None);
    };
    if values[1] != "<" {
        return Err(Error::tag(
            source.location(line),
            "Trailing comment should start with \"/**<\".",
        ));
    }
    Ok(Some(values[0].clone()))
}

/// The apidoc comment ending at `end_line`, if any.
pub fn preceding_comment(source: &SourceCode, end_line: usize) -> Result<Option<Vec<String>>> {
    let Some(lines) = source.previous_lines(end_line, &COMMENT_START, &COMMENT_END) else {
        return Ok(None);
    };
    let Some(values) = match_regex(&APIDOC_COMMENT_START, &lines[0]) else {
        return Ok(None);
    };
    if values[0] == "<" {
        return Err(Error::tag(
            source.location(end_line),
            "Preceding comment should not start with \"/**<\"",
        ));
    }
    Ok(Some(lines))
}
