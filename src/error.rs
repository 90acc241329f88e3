//! @dose
//! purpose: Typed errors of the apidoc core. Scanners, the comment parser and the merge engine
//!     all report through this one enum so the command layer can wrap them with anyhow context.
//!
//! when-editing:
//!     - !Errors raised while looking at a concrete source line carry a Location
//!     - Location renders as "file:line" and is always the message prefix
//!
//! invariants:
//!     - Display output of located variants is "file:line: message"
//!     - Line numbers are 1-based, matching SourceCode
//!
//! do-not:
//!     - Never panic on malformed input; build an Error instead

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Position of a problem inside a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// A line did not have the shape a scanner expected.
    #[error("{location}: {message}")]
    Source { location: Location, message: String },

    /// Malformed tag line inside an apidoc comment.
    #[error("{location}: {message}")]
    Tag { location: Location, message: String },

    /// Grammar error of the tag micro-language.
    #[error("{location}: {message}")]
    Comment { location: Location, message: String },

    /// Struct, enum or flag declaration problem.
    #[error("{location}: {message}")]
    Declaration { location: Location, message: String },

    /// Registration call site problem.
    #[error("{location}: {message}")]
    Registration { location: Location, message: String },

    #[error("{0}")]
    Type(String),

    #[error("{0}")]
    Merge(String),

    #[error("{0}")]
    Version(String),

    #[error("{0}")]
    Xml(String),

    /// OpenAPI generation problem, such as a tag missing from the template.
    #[error("{0}")]
    OpenApi(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn source_at(location: Location, message: impl Into<String>) -> Self {
        Error::Source {
            location,
            message: message.into(),
        }
    }

    pub fn tag(location: Location, message: impl Into<String>) -> Self {
        Error::Tag {
            location,
            message: message.into(),
        }
    }

    pub fn comment(location: Location, message: impl Into<String>) -> Self {
        Error::Comment {
            location,
            message: message.into(),
        }
    }

    pub fn declaration(location: Location, message: impl Into<String>) -> Self {
        Error::Declaration {
            location,
            message: message.into(),
        }
    }

    pub fn registration(location: Location, message: impl Into<String>) -> Self {
        Error::Registration {
            location,
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Display Tests =====

    #[test]
    fn test_located_error_is_prefixed_with_file_and_line() {
        let err = Error::comment(Location::new("api.cpp", 42), "Unknown tag %foo found.");
        assert_eq!(err.to_string(), "api.cpp:42: Unknown tag %foo found.");
    }

    #[test]
    fn test_plain_error_has_no_prefix() {
        let err = Error::Merge("Enum not found: \"Color\"".to_string());
        assert_eq!(err.to_string(), "Enum not found: \"Color\"");
    }

    #[test]
    fn test_io_error_names_the_path() {
        let err = Error::io(
            "missing.h",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().starts_with("Failed to access missing.h"));
    }
}
