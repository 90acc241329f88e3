//! Editable line store used when comments are written back into a source file.

use super::SourceCode;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::ops::Deref;
use std::path::Path;

static INNER_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n").unwrap());

#[derive(Debug, Clone)]
pub struct SourceEditor {
    code: SourceCode,
}

impl SourceEditor {
    pub fn new(code: SourceCode) -> Self {
        Self { code }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(SourceCode::load(path)?))
    }

    /// Insert lines before `before_line` (may be one past the last line), splitting each
    /// entry at inner line breaks. Returns the number of lines actually inserted.
    pub fn insert_lines(&mut self, before_line: usize, lines: &[String]) -> usize {
        let mut index = before_line.saturating_sub(1).min(self.code.lines.len());
        let mut count = 0;
        for text in lines {
            for part in INNER_LINE_BREAK.split(text) {
                self.code.lines.insert(index, part.to_string());
                index += 1;
                count += 1;
            }
        }
        count
    }

    pub fn insert_line(&mut self, before_line: usize, text: &str) -> usize {
        self.insert_lines(before_line, &[text.to_string()])
    }

    pub fn delete_line(&mut self, line: usize) {
        if line > 0 && line <= self.code.lines.len() {
            self.code.lines.remove(line - 1);
        }
    }

    /// Replace a line. The text must not contain line breaks.
    pub fn set_line(&mut self, line: usize, text: &str) -> Result<()> {
        if text.contains('\r') || text.contains('\n') {
            return Err(Error::source_at(
                self.code.location(line),
                "Line breaks are not allowed in a replaced line.",
            ));
        }
        if let Some(slot) = line.checked_sub(1).and_then(|i| self.code.lines.get_mut(i)) {
            *slot = text.to_string();
        }
        Ok(())
    }

    /// Write every line followed by the original line break.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }
        let mut text = String::new();
        for line in &self.code.lines {
            text.push_str(line);
            text.push_str(&self.code.line_break);
        }
        fs::write(path, text).map_err(|e| Error::io(path, e))
    }

    pub fn into_source(self) -> SourceCode {
        self.code
    }
}

impl Deref for SourceEditor {
    type Target = SourceCode;

    fn deref(&self) -> &SourceCode {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn editor(text: &str) -> SourceEditor {
        SourceEditor::new(SourceCode::from_text("edit.cpp", text))
    }

    // ===== Editing Tests =====

    #[test]
    fn test_insert_splits_inner_line_breaks() {
        let mut ed = editor("a\nd\n");
        let count = ed.insert_lines(2, &["b\nc".to_string()]);
        assert_eq!(count, 2);
        assert_eq!(ed.lines(), &["a", "b", "c", "d"]);
    }

    #[test]
    fn test_insert_after_last_line() {
        let mut ed = editor("a\n");
        ed.insert_line(2, "b");
        assert_eq!(ed.lines(), &["a", "b"]);
    }

    #[test]
    fn test_delete_and_set() {
        let mut ed = editor("a\nb\nc\n");
        ed.delete_line(2);
        ed.set_line(1, "x").unwrap();
        assert_eq!(ed.lines(), &["x", "c"]);
        assert!(ed.set_line(1, "y\nz").is_err());
    }

    #[test]
    fn test_save_keeps_line_break() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("out/api.cpp");
        let mut ed = editor("a\r\nb\r\n");
        ed.insert_line(2, "// c");
        ed.save(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a\r\n// c\r\nb\r\n");
    }
}
