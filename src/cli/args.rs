//! @dose
//! purpose: This module defines the command-line interface for apidoctool using the clap derive
//!     macros. It specifies the four actions (code-to-xml, xml-to-code, sort-xml, code-to-json)
//!     and their arguments.
//!
//! when-editing:
//!     - !Each command struct must derive Args and be added to the Commands enum
//!     - !Global flags (root, config, verbose, quiet) are defined on Cli and propagate to all
//!       subcommands
//!     - Matcher names are checked by MatcherFactory at run time, not by clap
//!
//! invariants:
//!     - PathBuf is used for all file/directory path arguments
//!     - Relative paths are resolved against --root by the commands, not here
//!
//! gotchas:
//!     - The --root flag is global but optional; defaults to current directory in main.rs
//!     - --verbose and --quiet conflict; the log level is chosen in main.rs

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apidoctool")]
#[command(author, version, about = "Extract API documentation from C++ sources")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to project root (defaults to current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Configuration file (defaults to apidoctool.toml in the root)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Report errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read apidoc comments from a C++ source into an XML document
    CodeToXml(CodeToXmlArgs),

    /// Write the functions of an XML document into a C++ source as apidoc comments
    XmlToCode(XmlToCodeArgs),

    /// Sort the functions of one group of an XML document by name
    SortXml(SortXmlArgs),

    /// Scan the configured sources and produce OpenAPI JSON
    CodeToJson(CodeToJsonArgs),
}

#[derive(Args)]
pub struct CodeToXmlArgs {
    /// C++ source with documented registrations
    #[arg(long)]
    pub source: PathBuf,

    /// XML document whose groups receive the functions
    #[arg(long)]
    pub xml: PathBuf,

    /// Where to write the resulting XML
    #[arg(short, long)]
    pub output: PathBuf,

    /// Registration matcher: template, handler, function-comment or transaction-bus
    #[arg(short, long, default_value = "template")]
    pub matcher: String,
}

#[derive(Args)]
pub struct XmlToCodeArgs {
    /// XML document with the functions to write
    #[arg(long)]
    pub xml: PathBuf,

    /// C++ source with the registrations
    #[arg(long)]
    pub source: PathBuf,

    /// Where to write the commented source
    #[arg(long)]
    pub output_source: PathBuf,

    /// Where to write the functions not found in the source
    #[arg(long)]
    pub output_xml: PathBuf,

    /// Registration matcher: template, handler, function-comment or transaction-bus
    #[arg(short, long, default_value = "template")]
    pub matcher: String,

    /// Wrap comment text at this column (0 disables wrapping); overrides the config
    #[arg(long)]
    pub wrap_width: Option<usize>,
}

#[derive(Args)]
pub struct SortXmlArgs {
    /// XML document to sort
    #[arg(long)]
    pub xml: PathBuf,

    /// URL prefix (or name) of the group to sort
    #[arg(short, long)]
    pub group: String,

    /// Where to write the sorted XML
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct CodeToJsonArgs {
    /// Where to write the OpenAPI JSON
    #[arg(short, long)]
    pub output: PathBuf,

    /// Produce paths of this API version only, e.g. /rest/v3; overrides the config
    #[arg(long)]
    pub api_version: Option<String>,

    /// OpenAPI template; overrides the config
    #[arg(short, long)]
    pub template: Option<PathBuf>,
}
