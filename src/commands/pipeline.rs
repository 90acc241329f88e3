//! @dose
//! purpose: Steps shared by the actions: path resolution against the root, matcher lookup,
//!     the declaration scan of the type headers and the per-file source scan.
//!
//! when-editing:
//!     - !Every step wraps core errors with the file it was working on
//!     - Header order is fixed by collect_headers; the symbol table depends on it
//!
//! flows:
//!     - build_symbol_table: collect_headers -> scan_file per header -> freeze
//!     - scan_source: load -> SourceScanner::scan with the given matcher

use crate::apidoc::comment::FunctionKind;
use crate::apidoc::version::{ApiVersion, UrlReplacement};
use crate::config::Config;
use crate::exclusion::{collect_headers, ExclusionConfig};
use crate::extract::{ExtractOptions, SourceScanner};
use crate::merge::TypeMerger;
use crate::parser::{scan_file, SymbolTable, SymbolTableBuilder};
use crate::registration::{MatcherFactory, RegistrationMatcher};
use crate::source::SourceCode;
use crate::types::Apidoc;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `path` as given when absolute, otherwise relative to `root`
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn find_matcher<'f>(factory: &'f MatcherFactory, name: &str) -> Result<&'f dyn RegistrationMatcher> {
    factory.get(name).ok_or_else(|| {
        anyhow!(
            "Unknown matcher \"{}\", expected one of: {}",
            name,
            factory.names().join(", ")
        )
    })
}

/// Scan settings taken from the config
pub fn extract_options<'a>(
    config: &Config,
    replacements: &'a [UrlReplacement],
    api_versions: &'a [ApiVersion],
    kind: FunctionKind,
) -> ExtractOptions<'a> {
    ExtractOptions {
        replacements,
        api_versions,
        caption_len_limit: config.required_function_caption_len_limit,
        group_name_len_limit: config.required_group_name_len_limit,
        unknown_param_type_is_error: config.unknown_param_type_is_error,
        response_chrono_as_string: config.response_chrono_as_string,
        kind,
    }
}

/// Scan the configured type headers into a frozen symbol table
pub fn build_symbol_table(root: &Path, config: &Config) -> Result<SymbolTable> {
    let headers = collect_headers(
        root,
        &config.type_header_paths,
        &ExclusionConfig::new(&config.exclude),
    )?;
    debug!("Scanning {} type headers", headers.len());

    let options = config.scan_options();
    let mut builder = SymbolTableBuilder::new(config.on_declaration_conflict);
    for header in &headers {
        let source = SourceCode::load(header)?;
        let declarations = scan_file(&source, &options)
            .with_context(|| format!("Failed to scan {}", header.display()))?;
        builder.add_file(declarations);
    }
    builder.freeze().context("Failed to resolve type declarations")
}

/// Add the functions documented in one source file to `apidoc`
pub fn scan_source(
    path: &Path,
    apidoc: &mut Apidoc,
    matcher: &dyn RegistrationMatcher,
    merger: Option<&TypeMerger<'_>>,
    options: ExtractOptions<'_>,
) -> Result<usize> {
    debug!("Parsing {} functions from {}", matcher.name(), path.display());
    let source = SourceCode::load(path)?;
    SourceScanner::new(&source, merger, options)
        .scan(apidoc, matcher)
        .with_context(|| format!("Failed to parse apidoc comments in {}", path.display()))
}
