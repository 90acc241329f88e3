//! Flags scanner: `Q_DECLARE_FLAGS(Flags, Enum)` lines with an optional `%apidoc` comment.

use super::FlagInfo;
use crate::apidoc::tag::items_for_type;
use crate::apidoc::TAG_APIDOC;
use crate::error::{Error, Result};
use crate::source::{anchored, SourceCode};
use once_cell::sync::Lazy;
use regex::Regex;

static FLAGS: Lazy<Regex> =
    Lazy::new(|| anchored(r"\s*Q_DECLARE_FLAGS\(([_A-Za-z0-9]+),\s*([_A-Za-z0-9]+)\).*"));

pub struct FlagScanner<'a> {
    source: &'a SourceCode,
    line: usize,
}

impl<'a> FlagScanner<'a> {
    pub fn new(source: &'a SourceCode, line: usize) -> Self {
        Self { source, line }
    }

    pub fn parse_flags(&mut self) -> Result<Vec<FlagInfo>> {
        let mut flags = Vec::new();
        while self.line <= self.source.line_count() {
            if let Some(flag) = self.parse_flag()? {
                flags.push(flag);
            }
            self.line += 1;
        }
        Ok(flags)
    }

    pub fn parse_flag(&self) -> Result<Option<FlagInfo>> {
        let Some(values) = self.source.match_line(self.line, &FLAGS) else {
            return Ok(None);
        };
        Ok(Some(FlagInfo {
            name: values[0].trim().to_string(),
            enum_name: values[1].trim().to_string(),
            description: self.parse_description()?,
            location: self.source.location(self.line),
        }))
    }

    fn parse_description(&self) -> Result<String> {
        let Some(items) = items_for_type(self.source, self.line)? else {
            return Ok(String::new());
        };
        if let Some(unexpected) = items
            .iter()
            .enumerate()
            .find(|(i, item)| *i > 0 || item.tag() != TAG_APIDOC)
            .map(|(_, item)| item)
        {
            return Err(Error::declaration(
                self.source.location(self.line),
                format!("Unexpected tag {} found.", unexpected.tag()),
            ));
        }
        Ok(items[0].full_text(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_flags_with_description() {
        let code = SourceCode::from_text(
            "flags.h",
            concat!(
                "enum Permission { read = 1, write = 2 };\n",
                "/**%apidoc Access rights. */\n",
                "Q_DECLARE_FLAGS(Permissions, Permission)\n",
                "    Q_DECLARE_FLAGS(Options,Option)\n",
            ),
        );
        let flags = FlagScanner::new(&code, 1).parse_flags().unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].name, "Permissions");
        assert_eq!(flags[0].enum_name, "Permission");
        assert_eq!(flags[0].description, "Access rights.");
        assert_eq!(flags[1].name, "Options");
        assert_eq!(flags[1].description, "");
    }

    #[test]
    fn test_flags_comment_allows_only_apidoc() {
        let code = SourceCode::from_text(
            "flags.h",
            "/**%apidoc Rights.\n * %value read\n */\nQ_DECLARE_FLAGS(Rights, Right)\n",
        );
        let err = FlagScanner::new(&code, 1).parse_flags().unwrap_err();
        assert_eq!(err.to_string(), "flags.h:4: Unexpected tag %value found.");
    }
}
