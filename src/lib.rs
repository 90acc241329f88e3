//! @dose
//! purpose: This is the library crate root for apidoctool, exposing the apidoc pipeline for use
//!     as both a CLI tool and a library: declaration scanning of C++ headers, apidoc comment
//!     parsing, struct merging, registration matching, and the XML and OpenAPI serializers.
//!
//! when-editing:
//!     - !All public modules must be declared here with pub mod
//!     - Keep the re-export list organized by module
//!
//! invariants:
//!     - Core modules report through error::Error; only cli, commands and exclusion use anyhow
//!     - All registration matchers are reachable through MatcherFactory
//!
//! gotchas:
//!     - The lib.rs is separate from main.rs - library consumers get lib, CLI gets main

pub mod apidoc;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exclusion;
pub mod extract;
pub mod formatter;
pub mod inject;
pub mod merge;
pub mod parser;
pub mod registration;
pub mod source;
pub mod types;

// Re-export main types for convenience
pub use cli::{Cli, CodeToJsonArgs, CodeToXmlArgs, Commands, SortXmlArgs, XmlToCodeArgs};
pub use config::Config;
pub use error::{Error, Location, Result};
pub use extract::{ExtractOptions, SourceScanner};
pub use formatter::{read_xml, to_openapi, write_xml, OpenApiOptions};
pub use inject::insert_comments;
pub use merge::TypeMerger;
pub use parser::{ConflictPolicy, SymbolTable, SymbolTableBuilder};
pub use registration::{MatcherFactory, RegistrationMatch, RegistrationMatcher};
pub use source::{SourceCode, SourceEditor};
pub use types::{Apidoc, Function, Group, Param, TypeInfo, Value, WireType};
