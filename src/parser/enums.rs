//! @dose
//! purpose: Enum scanner. Recognizes `enum [class] Name {` blocks and the nx_reflect
//!     `NX_REFLECTION_ENUM*(Name, ...)` macros, collecting value names with their apidoc
//!     comments.
//!
//! when-editing:
//!     - !The cursor ends on the closing line so a struct scan can resume after the enum
//!     - Value lines are indented 4 to 8 spaces; anything else in the body is skipped
//!
//! gotchas:
//!     - `%caption` on a value replaces the displayed name, not the C++ identifier it documents
//!     - Macro enums end when parentheses balance, which may be mid-line

use super::{EnumInfo, EnumValue};
use crate::apidoc::tag::{items_for_type, TagItem};
use crate::apidoc::{
    ATTR_PROPRIETARY, ATTR_UNUSED, TAG_CAPTION, TAG_COMMENTED_OUT, TAG_DEPRECATED,
};
use crate::error::{Error, Result};
use crate::source::{anchored, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r" {0,4}enum [^;]*"));
static HEADER: Lazy<Regex> =
    Lazy::new(|| anchored(r" {0,4}enum\s+(class\s+)?([_A-Za-z0-9]+)\s*\{"));
static HEADER_LAST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r"[^;]*\{"));
static LAST_LINE: Lazy<Regex> = Lazy::new(|| anchored(r" {0,4}};"));
static NX_REFLECT_HEADER: Lazy<Regex> = Lazy::new(|| {
    anchored(r" {0,4}NX_REFLECTION_ENUM(?:_CLASS)?(?:_IN_CLASS)?\s*\(\s*([_A-Za-z0-9]+)\s*,.*")
});
static VALUE: Lazy<Regex> = Lazy::new(|| anchored(r" {4,8}([_A-Za-z0-9]+)\s*(=.*)?[,\s]*.*"));

pub struct EnumScanner<'a> {
    source: &'a SourceCode,
    line: usize,
}

impl<'a> EnumScanner<'a> {
    pub fn new(source: &'a SourceCode, line: usize) -> Self {
        Self { source, line }
    }

    /// Line the scanner stopped at.
    pub fn line(&self) -> usize {
        self.line
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::declaration(self.source.location(self.line), message)
    }

    /// Every enum of the file; a macro enum replaces a plain one of the same name.
    pub fn parse_enums(&mut self) -> Result<Vec<EnumInfo>> {
        let mut enums = Vec::new();
        self.line = 1;
        while self.line <= self.source.line_count() {
            if let Some(info) = self.parse_regular_enum()? {
                enums.push(info);
            }
            self.line += 1;
        }

        self.line = 1;
        while self.line <= self.source.line_count() {
            if let Some(info) = self.parse_nx_reflect_enum()? {
                enums.retain(|e: &EnumInfo| e.name != info.name);
                enums.push(info);
            }
            self.line += 1;
        }
        Ok(enums)
    }

    /// Enum starting at the current line, if any.
    pub fn parse_regular_enum(&mut self) -> Result<Option<EnumInfo>> {
        let Some(values) =
            self.source
                .match_anchored_block(self.line, &FIRST_LINE, &HEADER, &HEADER_LAST_LINE)?
        else {
            return Ok(None);
        };

        let location = self.source.location(self.line);
        let name = values[1].trim().to_string();
        let description = self.parse_description()?;
        let values = self.parse_values()?;
        Ok(Some(EnumInfo {
            name,
            description,
            values,
            location,
        }))
    }

    pub fn parse_nx_reflect_enum(&mut self) -> Result<Option<EnumInfo>> {
        let Some(values) = self.source.match_line(self.line, &NX_REFLECT_HEADER) else {
            return Ok(None);
        };

        let location = self.source.location(self.line);
        let name = values[0].trim().to_string();
        let description = self.parse_description()?;
        let values = self.parse_nx_reflect_values()?;
        Ok(Some(EnumInfo {
            name,
            description,
            values,
            location,
        }))
    }

    fn parse_values(&mut self) -> Result<Vec<EnumValue>> {
        let mut values = Vec::new();
        self.line += 1;
        while self.line <= self.source.line_count() {
            if self.source.line_matches(self.line, &LAST_LINE) {
                return Ok(values);
            }
            if let Some(value) = self.parse_value_line()? {
                values.push(value);
            }
            self.line += 1;
        }
        Ok(values)
    }

    /// Values of `NX_REFLECTION_ENUM(Name, a, b = 2, c)`; the header holds the first `(`.
    fn parse_nx_reflect_values(&mut self) -> Result<Vec<EnumValue>> {
        let mut values = Vec::new();
        let mut depth = 1i32;
        self.line += 1;
        while self.line <= self.source.line_count() {
            for c in self.source.line(self.line).chars() {
                match c {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            if let Some(value) = self.parse_value_line()? {
                values.push(value);
            }
            if depth == 0 {
                break;
            }
            self.line += 1;
        }
        Ok(values)
    }

    fn parse_value_line(&self) -> Result<Option<EnumValue>> {
        let Some(matched) = self.source.match_line(self.line, &VALUE) else {
            return Ok(None);
        };
        let mut value = EnumValue {
            name: matched[0].clone(),
            ..EnumValue::default()
        };
        self.parse_value_description(&mut value)?;
        Ok(Some(value))
    }

    fn parse_description(&self) -> Result<String> {
        let Some(items) = items_for_type(self.source, self.line)? else {
            return Ok(String::new());
        };
        if let Some(unexpected) = items
            .iter()
            .skip(1)
            .find(|item| !item.tag().starts_with(TAG_COMMENTED_OUT))
        {
            return Err(self.error(format!("Unexpected tag {} found.", unexpected.tag())));
        }
        Ok(items[0].full_text(0))
    }

    fn parse_value_description(&self, value: &mut EnumValue) -> Result<()> {
        let Some(items) = items_for_type(self.source, self.line)? else {
            return Ok(());
        };
        let Some((first, rest)) = items.split_first() else {
            return Ok(());
        };

        value.description = first.full_text(0);
        match first.attribute() {
            "" => {}
            ATTR_PROPRIETARY => value.proprietary = true,
            ATTR_UNUSED => value.unused = true,
            other => {
                return Err(self.error(format!(
                    "Unexpected attribute {} in {}.",
                    other,
                    first.tag()
                )))
            }
        }

        for item in rest {
            self.apply_value_item(item, value)?;
        }
        Ok(())
    }

    fn apply_value_item(&self, item: &TagItem, value: &mut EnumValue) -> Result<()> {
        match item.tag() {
            TAG_CAPTION => {
                if !item.attribute().is_empty() {
                    return Err(self.error(format!(
                        "Unexpected attribute {} in {}.",
                        item.attribute(),
                        item.tag()
                    )));
                }
                if item.token().is_empty() {
                    return Err(self.error(format!("Missing caption in {}.", item.tag())));
                }
                if !item.text_after_token(0).is_empty() {
                    return Err(
                        self.error(format!("Unexpected text after caption in {}.", item.tag()))
                    );
                }
                value.name = item.token().to_string();
            }
            TAG_DEPRECATED => {
                value.deprecated = true;
                value.deprecated_description = item.full_text(0);
            }
            tag if tag.starts_with(TAG_COMMENTED_OUT) => {}
            tag => return Err(self.error(format!("Unexpected tag {} found.", tag))),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source(text: &str) -> SourceCode {
        SourceCode::from_text("enums.h", text)
    }

    fn names(info: &EnumInfo) -> Vec<&str> {
        info.values.iter().map(|v| v.name.as_str()).collect()
    }

    // ===== Regular Enum Tests =====

    #[test]
    fn test_enum_with_descriptions() {
        let code = source(concat!(
            "/**%apidoc Device status. */\n",
            "enum class Status\n",
            "{\n",
            "    /**%apidoc Device is offline. */\n",
            "    offline,\n",
            "    online = 2, /**<%apidoc Device is online. */\n",
            "    /**%apidoc[unused] */\n",
            "    legacy,\n",
            "};\n",
        ));
        let enums = EnumScanner::new(&code, 1).parse_enums().unwrap();
        assert_eq!(enums.len(), 1);
        let status = &enums[0];
        assert_eq!(status.name, "Status");
        assert_eq!(status.description, "Device status.");
        assert_eq!(status.location.line, 2);
        assert_eq!(names(status), vec!["offline", "online", "legacy"]);
        assert_eq!(status.values[0].description, "Device is offline.");
        assert_eq!(status.values[1].description, "Device is online.");
        assert!(status.values[2].unused);
    }

    #[test]
    fn test_value_caption_and_deprecation() {
        let code = source(concat!(
            "enum Mode {\n",
            "    /**%apidoc[proprietary] Fast.\n",
            "     * %caption fast_mode\n",
            "     * %deprecated Slow now.\n",
            "     */\n",
            "    fast,\n",
            "};\n",
        ));
        let enums = EnumScanner::new(&code, 1).parse_enums().unwrap();
        let fast = &enums[0].values[0];
        assert_eq!(fast.name, "fast_mode");
        assert!(fast.proprietary);
        assert!(fast.deprecated);
        assert_eq!(fast.deprecated_description, "Slow now.");
    }

    #[test]
    fn test_value_caption_with_text_is_error() {
        let code = source(concat!(
            "enum Mode {\n",
            "    /**%apidoc Fast.\n",
            "     * %caption fast extra\n",
            "     */\n",
            "    fast,\n",
            "};\n",
        ));
        let err = EnumScanner::new(&code, 1).parse_enums().unwrap_err();
        assert_eq!(
            err.to_string(),
            "enums.h:5: Unexpected text after caption in %caption."
        );
    }

    #[test]
    fn test_enum_description_rejects_other_tags() {
        let code = source(concat!(
            "/**%apidoc Mode.\n",
            " * %param x\n",
            " */\n",
            "enum Mode { a };\n",
            "enum Other {\n",
            "};\n",
        ));
        // `enum Mode { a };` is a one-liner and is not recognized.
        let enums = EnumScanner::new(&code, 1).parse_enums().unwrap();
        assert_eq!(enums.len(), 1);
        assert_eq!(enums[0].name, "Other");

        let code = source("/**%apidoc Mode.\n * %param x\n */\nenum Mode {\n};\n");
        let err = EnumScanner::new(&code, 1).parse_enums().unwrap_err();
        assert!(err.to_string().contains("Unexpected tag %param found."));
    }

    // ===== nx_reflect Tests =====

    #[test]
    fn test_nx_reflect_enum() {
        let code = source(concat!(
            "NX_REFLECTION_ENUM_CLASS(Codec,\n",
            "    h264, /**<%apidoc H.264. */\n",
            "    h265 = (1 << 2),\n",
            "    mjpeg\n",
            ")\n",
            "int after;\n",
        ));
        let enums = EnumScanner::new(&code, 1).parse_enums().unwrap();
        assert_eq!(enums.len(), 1);
        assert_eq!(enums[0].name, "Codec");
        assert_eq!(names(&enums[0]), vec!["h264", "h265", "mjpeg"]);
        assert_eq!(enums[0].values[0].description, "H.264.");
    }

    #[test]
    fn test_cursor_stops_on_closing_line() {
        let code = source("    enum Inner\n    {\n        a,\n    };\n    int x;\n");
        let mut scanner = EnumScanner::new(&code, 1);
        let inner = scanner.parse_regular_enum().unwrap().expect("enum");
        assert_eq!(inner.name, "Inner");
        assert_eq!(scanner.line(), 4);
    }
}
