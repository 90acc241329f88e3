//! @dose
//! purpose: Configuration file parsing for apidoctool.toml. Holds the inputs of the OpenAPI
//!     scan (type headers, registration sources), URL rewriting, strictness switches and the
//!     predefined OpenAPI groups.
//!
//! when-editing:
//!     - !Config is loaded once at startup and passed through the call chain
//!     - !Every field has a default; a partial file is always valid
//!     - Paths are relative to the project root unless absolute
//!
//! invariants:
//!     - Config::load returns the default config if apidoctool.toml doesn't exist
//!     - A malformed file is reported with a warning and replaced by the defaults
//!
//! gotchas:
//!     - Negative length limits mean "not required"; 0 for the group name limit still
//!       requires every group to be predefined in the OpenAPI template

use crate::apidoc::version::{ApiVersion, UrlReplacement};
use crate::formatter::OpenApiOptions;
use crate::parser::symbols::ConflictPolicy;
use crate::parser::ScanOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILE: &str = "apidoctool.toml";

/// Main configuration structure matching apidoctool.toml
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Header files or directories scanned for structs, enums and flags
    pub type_header_paths: Vec<String>,

    /// Source with template registrations, also scanned with the handler matcher
    pub template_registration_cpp: Option<String>,

    pub handler_registration_cpp: Vec<String>,
    pub function_comment_sources: Vec<String>,
    pub transaction_bus_sources: Vec<String>,

    /// OpenAPI JSON the generated paths are merged into
    pub openapi_template: Option<String>,

    /// Exclusion patterns for header discovery
    pub exclude: Vec<String>,

    /// `"target replacement,target replacement"`
    pub url_prefix_replacement: String,

    /// Version selectors such as `/rest/v3`
    pub api_versions: Vec<String>,

    pub invalid_chrono_field_suffix_is_error: bool,
    pub unknown_param_type_is_error: bool,
    pub response_chrono_as_string: bool,
    pub strict_missing_struct: bool,
    pub on_declaration_conflict: ConflictPolicy,
    pub keep_proprietary_values: bool,

    pub required_function_caption_len_limit: i32,
    pub required_group_name_len_limit: i32,

    pub generate_order_by_parameters: bool,
    pub jsonrpc: bool,

    /// Column at which generated comment text is wrapped; 0 disables wrapping
    pub comment_wrap_width: usize,

    /// Predefined OpenAPI groups
    pub groups: Vec<GroupConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            type_header_paths: Vec::new(),
            template_registration_cpp: None,
            handler_registration_cpp: Vec::new(),
            function_comment_sources: Vec::new(),
            transaction_bus_sources: Vec::new(),
            openapi_template: None,
            exclude: Vec::new(),
            url_prefix_replacement: String::new(),
            api_versions: Vec::new(),
            invalid_chrono_field_suffix_is_error: true,
            unknown_param_type_is_error: false,
            response_chrono_as_string: true,
            strict_missing_struct: false,
            on_declaration_conflict: ConflictPolicy::Warn,
            keep_proprietary_values: false,
            required_function_caption_len_limit: -1,
            required_group_name_len_limit: -1,
            generate_order_by_parameters: false,
            jsonrpc: false,
            comment_wrap_width: 100,
            groups: Vec::new(),
        }
    }
}

/// A group created before scanning, so functions can be placed by URL prefix
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub url_prefix: String,
    #[serde(default)]
    pub description: String,
}

impl Config {
    /// Load configuration from apidoctool.toml in the given root directory
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        Self::load_file(&config_path)
    }

    /// Load an explicitly named configuration file
    pub fn load_file(config_path: &Path) -> Self {
        match fs::read_to_string(config_path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Failed to parse {}: {}", config_path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}", config_path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve a configured path against the project root
    pub fn resolve(root: &Path, path: &str) -> PathBuf {
        let path = Path::new(path.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            invalid_chrono_field_suffix_is_error: self.invalid_chrono_field_suffix_is_error,
        }
    }

    pub fn url_replacements(&self) -> crate::error::Result<Vec<UrlReplacement>> {
        UrlReplacement::parse_list(&self.url_prefix_replacement)
    }

    pub fn parsed_api_versions(&self) -> crate::error::Result<Vec<ApiVersion>> {
        ApiVersion::parse_list(&self.api_versions)
    }

    pub fn openapi_options(&self) -> OpenApiOptions {
        OpenApiOptions {
            required_group_name_len_limit: self.required_group_name_len_limit,
            generate_order_by_parameters: self.generate_order_by_parameters,
            jsonrpc: self.jsonrpc,
            keep_proprietary_values: self.keep_proprietary_values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    // ===== Loading Tests =====

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.type_header_paths.is_empty());
        assert!(config.invalid_chrono_field_suffix_is_error);
        assert!(config.response_chrono_as_string);
        assert!(!config.strict_missing_struct);
        assert_eq!(config.on_declaration_conflict, ConflictPolicy::Warn);
        assert_eq!(config.comment_wrap_width, 100);
        assert_eq!(config.required_group_name_len_limit, -1);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path());
        assert_eq!(config.comment_wrap_width, 100);
        assert!(config.groups.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_content = r#"
type_header_paths = ["api/types"]
template_registration_cpp = "server/registrations.cpp"
handler_registration_cpp = ["server/handlers.cpp"]
transaction_bus_sources = ["transactions.h"]
exclude = ["**/private_*.h"]
url_prefix_replacement = "api rest/v1"
api_versions = ["/rest/v2"]
unknown_param_type_is_error = true
strict_missing_struct = true
on_declaration_conflict = "error"
required_group_name_len_limit = 40
comment_wrap_width = 0

[[groups]]
name = "Users"
url_prefix = "/rest/v2/users"
description = "User management."
"#;
        fs::write(temp_dir.path().join(CONFIG_FILE), config_content).unwrap();

        let config = Config::load(temp_dir.path());
        assert_eq!(config.type_header_paths, vec!["api/types"]);
        assert_eq!(
            config.template_registration_cpp.as_deref(),
            Some("server/registrations.cpp")
        );
        assert!(config.unknown_param_type_is_error);
        assert!(config.strict_missing_struct);
        assert_eq!(config.on_declaration_conflict, ConflictPolicy::Error);
        assert_eq!(config.required_group_name_len_limit, 40);
        assert_eq!(config.comment_wrap_width, 0);
        assert_eq!(
            config.groups,
            vec![GroupConfig {
                name: "Users".to_string(),
                url_prefix: "/rest/v2/users".to_string(),
                description: "User management.".to_string(),
            }]
        );
        assert_eq!(config.url_replacements().unwrap()[0].replacement, "rest/v1");
        assert_eq!(config.parsed_api_versions().unwrap()[0].version(), 2);
        assert_eq!(config.openapi_options().required_group_name_len_limit, 40);
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            "on_declaration_conflict = \"ignore\"\n",
        )
        .unwrap();
        let config = Config::load(temp_dir.path());
        assert_eq!(config.on_declaration_conflict, ConflictPolicy::Warn);
    }

    #[test]
    fn test_resolve_paths() {
        let root = Path::new("/project");
        assert_eq!(
            Config::resolve(root, " api/types "),
            PathBuf::from("/project/api/types")
        );
        assert_eq!(Config::resolve(root, "/abs/file.h"), PathBuf::from("/abs/file.h"));
    }
}
