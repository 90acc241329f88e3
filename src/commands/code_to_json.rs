//! @dose
//! purpose: The code-to-json action. Scans the type headers and every configured registration
//!     source into one apidoc document and serializes it as OpenAPI JSON over a template.
//!
//! when-editing:
//!     - !Group order is fixed: the four legacy groups first, then the config groups; the
//!       OpenAPI tags follow it
//!     - !The template registration source is scanned twice, with the template matcher and
//!       then with the handler matcher
//!     - --api-version replaces api_versions of the config; --template replaces
//!       openapi_template
//!
//! invariants:
//!     - Without type_header_paths no struct is merged and registration types are ignored
//!     - The exact-version pass runs over the final JSON text, after serialization
//!
//! gotchas:
//!     - Zero processed functions is only a warning; the output is still written
//!
//! flows:
//!     - build_symbol_table -> scan_source per configured file -> sort -> to_openapi ->
//!       apply_exact_version -> write

use super::pipeline::{build_symbol_table, extract_options, resolve_path, scan_source};
use crate::apidoc::comment::FunctionKind;
use crate::apidoc::version::{apply_exact_version, ApiVersion};
use crate::cli::CodeToJsonArgs;
use crate::config::Config;
use crate::formatter::to_openapi;
use crate::merge::TypeMerger;
use crate::registration::{
    FunctionCommentMatcher, HandlerMatcher, RegistrationMatcher, TemplateMatcher,
    TransactionBusMatcher,
};
use crate::types::Apidoc;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SYSTEM_API: &str = "System API";
const PROPRIETARY_SYSTEM_API: &str = "Proprietary System API";
const SERVER_API: &str = "Server API";
const PROPRIETARY_SERVER_API: &str = "Proprietary Server API";

/// Legacy groups every scan starts with
fn predefined_groups(config: &Config) -> Apidoc {
    let mut apidoc = Apidoc::default();
    for (name, url_prefix) in [
        (SYSTEM_API, "/ec2"),
        (PROPRIETARY_SYSTEM_API, "/ec2"),
        (SERVER_API, "/api"),
        (PROPRIETARY_SERVER_API, "/api"),
    ] {
        apidoc.group_by_name(name).url_prefix = url_prefix.to_string();
    }
    for group in &config.groups {
        let target = apidoc.group_by_name(&group.name);
        target.url_prefix = group.url_prefix.clone();
        target.group_description = group.description.clone();
    }
    apidoc
}

fn load_template(path: Option<&Path>) -> Result<serde_json::Value> {
    let Some(path) = path else {
        warn!("Open API schema template is not provided.");
        return Ok(serde_json::json!({}));
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Error loading Open API template JSON file '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Error loading Open API template JSON file '{}'", path.display()))
}

pub fn run_code_to_json(args: &CodeToJsonArgs, root: &Path, config: &Config) -> Result<()> {
    let output_path = resolve_path(root, &args.output);
    let template_path: Option<PathBuf> = match &args.template {
        Some(path) => Some(resolve_path(root, path)),
        None => config
            .openapi_template
            .as_deref()
            .map(|path| Config::resolve(root, path)),
    };

    let replacements = config.url_replacements()?;
    let api_versions = match &args.api_version {
        Some(version) => ApiVersion::parse_list(std::slice::from_ref(version))?,
        None => config.parsed_api_versions()?,
    };

    let table = if config.type_header_paths.is_empty() {
        None
    } else {
        Some(build_symbol_table(root, config)?)
    };
    let merger = table
        .as_ref()
        .map(|table| TypeMerger::new(table, config.strict_missing_struct));

    let mut apidoc = predefined_groups(config);
    let api = extract_options(config, &replacements, &api_versions, FunctionKind::Api);
    let transactions =
        extract_options(config, &replacements, &api_versions, FunctionKind::Transaction);

    let mut sources: Vec<(PathBuf, &dyn RegistrationMatcher, FunctionKind)> = Vec::new();
    if let Some(cpp) = &config.template_registration_cpp {
        let path = Config::resolve(root, cpp);
        sources.push((path.clone(), &TemplateMatcher, FunctionKind::Api));
        sources.push((path, &HandlerMatcher, FunctionKind::Api));
    }
    for cpp in &config.handler_registration_cpp {
        sources.push((Config::resolve(root, cpp), &HandlerMatcher, FunctionKind::Api));
    }
    for cpp in &config.function_comment_sources {
        sources.push((Config::resolve(root, cpp), &FunctionCommentMatcher, FunctionKind::Api));
    }
    for cpp in &config.transaction_bus_sources {
        sources.push((
            Config::resolve(root, cpp),
            &TransactionBusMatcher,
            FunctionKind::Transaction,
        ));
    }

    let mut count = 0;
    for (path, matcher, kind) in sources {
        let options = match kind {
            FunctionKind::Api => api.clone(),
            FunctionKind::Transaction => transactions.clone(),
        };
        count += scan_source(&path, &mut apidoc, matcher, merger.as_ref(), options)?;
    }
    if count == 0 {
        warn!("No functions were processed.");
    } else {
        info!("API functions processed: {}", count);
    }

    apidoc.sort_groups(&[
        SYSTEM_API.to_string(),
        SERVER_API.to_string(),
        PROPRIETARY_SYSTEM_API.to_string(),
        PROPRIETARY_SERVER_API.to_string(),
    ]);

    let template = load_template(template_path.as_deref())?;
    let json = to_openapi(&apidoc, template, &config.openapi_options())
        .context("Error serializing Open API JSON")?;
    let json = apply_exact_version(&json, &api_versions)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&output_path, json)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("API functions processed: {}", count);
    println!("Output: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;
    use pretty_assertions::assert_eq;
    use serde_json::Value as Json;
    use tempfile::TempDir;

    const HEADER: &str = concat!(
        "/**%apidoc User data. */\n",
        "struct UserData\n",
        "{\n",
        "    /**%apidoc User id. */\n",
        "    nx::Uuid id;\n",
        "    /**%apidoc User name. */\n",
        "    QString name;\n",
        "};\n",
    );

    const HANDLERS: &str = concat!(
        "void registerHandlers()\n",
        "{\n",
        "    /**%apidoc GET /rest/v{1-}/users\n",
        "     * Read all users.\n",
        "     * %caption Users\n",
        "     * %ingroup Users\n",
        "     * %struct UserData\n",
        "     * %return:array User list.\n",
        "     */\n",
        "    reg(\"rest/v{1-}/users\", GlobalPermission::admin,\n",
        "        std::make_unique<UserHandler>());\n",
        "}\n",
    );

    fn project(config: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("types")).unwrap();
        fs::write(temp_dir.path().join("types/user_data.h"), HEADER).unwrap();
        fs::write(temp_dir.path().join("handlers.cpp"), HANDLERS).unwrap();
        fs::write(temp_dir.path().join("apidoctool.toml"), config).unwrap();
        temp_dir
    }

    fn args(api_version: Option<&str>) -> CodeToJsonArgs {
        CodeToJsonArgs {
            output: PathBuf::from("out/openapi.json"),
            api_version: api_version.map(str::to_string),
            template: None,
        }
    }

    // ===== Group Tests =====

    #[test]
    fn test_predefined_groups_come_first() {
        let config = Config {
            groups: vec![GroupConfig {
                name: "Users".to_string(),
                url_prefix: "/rest".to_string(),
                description: "User management.".to_string(),
            }],
            ..Config::default()
        };
        let apidoc = predefined_groups(&config);
        let names: Vec<_> = apidoc.groups.iter().map(|g| g.group_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "System API",
                "Proprietary System API",
                "Server API",
                "Proprietary Server API",
                "Users"
            ]
        );
        assert_eq!(apidoc.groups[4].group_description, "User management.");
    }

    // ===== Scan Tests =====

    #[test]
    fn test_scan_produces_versioned_openapi() {
        let temp_dir = project(concat!(
            "type_header_paths = [\"types\"]\n",
            "handler_registration_cpp = [\"handlers.cpp\"]\n",
            "\n",
            "[[groups]]\n",
            "name = \"Users\"\n",
        ));
        let config = Config::load(temp_dir.path());

        run_code_to_json(&args(Some("/rest/v2")), temp_dir.path(), &config).unwrap();

        let text = fs::read_to_string(temp_dir.path().join("out/openapi.json")).unwrap();
        let json: Json = serde_json::from_str(&text).unwrap();
        let get = &json["paths"]["/rest/v2/users"]["get"];
        assert_eq!(get["summary"], "Users");
        assert_eq!(get["tags"][0], "Users");
        let parameters: Vec<&str> = get["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(parameters, vec!["id", "name"]);
        assert_eq!(get["responses"]["default"]["description"], "User list.");
        assert!(!text.contains("v{1-}"));
    }

    #[test]
    fn test_nothing_configured_still_writes_output() {
        let temp_dir = TempDir::new().unwrap();
        run_code_to_json(&args(None), temp_dir.path(), &Config::default()).unwrap();
        let text = fs::read_to_string(temp_dir.path().join("out/openapi.json")).unwrap();
        let json: Json = serde_json::from_str(&text).unwrap();
        assert_eq!(json["paths"], serde_json::json!({}));
    }

    #[test]
    fn test_missing_source_is_error() {
        let temp_dir = project("handler_registration_cpp = [\"missing.cpp\"]\n");
        let config = Config::load(temp_dir.path());
        assert!(run_code_to_json(&args(None), temp_dir.path(), &config).is_err());
    }
}
