//! @dose
//! purpose: The code-to-xml action. Reads the apidoc comments of one C++ source into the
//!     groups of an existing XML document and writes the updated document.
//!
//! when-editing:
//!     - !The scan runs on an empty copy of the document's groups so that functions are placed
//!       by URL prefix; only then are they merged into the loaded document
//!     - Functions are replaced by name and method; functions the source doesn't mention stay
//!
//! invariants:
//!     - Only groups that received functions are re-sorted
//!
//! flows:
//!     - load_xml -> scan_source(matcher, no merger) -> replace_functions -> sort -> save_xml

use super::pipeline::{extract_options, find_matcher, resolve_path, scan_source};
use crate::apidoc::comment::FunctionKind;
use crate::cli::CodeToXmlArgs;
use crate::config::Config;
use crate::formatter::{load_xml, save_xml};
use crate::registration::MatcherFactory;
use anyhow::{Context, Result};
use std::path::Path;

pub fn run_code_to_xml(args: &CodeToXmlArgs, root: &Path, config: &Config) -> Result<()> {
    let source_path = resolve_path(root, &args.source);
    let xml_path = resolve_path(root, &args.xml);
    let output_path = resolve_path(root, &args.output);

    let factory = MatcherFactory::new();
    let matcher = find_matcher(&factory, &args.matcher)?;
    let kind = if args.matcher == "transaction-bus" {
        FunctionKind::Transaction
    } else {
        FunctionKind::Api
    };

    let mut apidoc = load_xml(&xml_path).context("Failed to load XML document")?;
    let replacements = config.url_replacements()?;
    let api_versions = config.parsed_api_versions()?;

    let mut scanned = apidoc.without_functions();
    let count = scan_source(
        &source_path,
        &mut scanned,
        matcher,
        None,
        extract_options(config, &replacements, &api_versions, kind),
    )?;

    let touched = apidoc.replace_functions(scanned);
    apidoc.sort_groups(&touched);
    save_xml(&output_path, &apidoc)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!("API functions processed: {}", count);
    println!("Output: {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::read_xml;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<apidoc>
    <groups>
        <group>
            <groupName>System API</groupName>
            <urlPrefix>/ec2</urlPrefix>
            <functions>
                <function>
                    <name>saveUser</name>
                    <method>POST</method>
                    <description>Outdated.</description>
                </function>
                <function>
                    <name>zeroUser</name>
                    <method>POST</method>
                    <description>Not in the source.</description>
                </function>
            </functions>
        </group>
        <group>
            <groupName>Server API</groupName>
            <urlPrefix>/api</urlPrefix>
        </group>
    </groups>
</apidoc>
"#;

    const SOURCE: &str = concat!(
        "void registerFunctions()\n",
        "{\n",
        "    /**%apidoc POST /ec2/saveUser\n",
        "     * Save a user.\n",
        "     */\n",
        "    regUpdate<UserData>(p, ApiCommand::saveUser);\n",
        "\n",
        "    /**%apidoc GET /ec2/getUsers\n",
        "     * Read users.\n",
        "     */\n",
        "    regGet<QnUuid, UserDataList>(p, ApiCommand::getUsers);\n",
        "}\n",
    );

    fn args(matcher: &str) -> CodeToXmlArgs {
        CodeToXmlArgs {
            source: PathBuf::from("api.cpp"),
            xml: PathBuf::from("api.xml"),
            output: PathBuf::from("out/api.xml"),
            matcher: matcher.to_string(),
        }
    }

    // ===== Code To XML Tests =====

    #[test]
    fn test_functions_replaced_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("api.xml"), TEMPLATE).unwrap();
        fs::write(temp_dir.path().join("api.cpp"), SOURCE).unwrap();

        run_code_to_xml(&args("template"), temp_dir.path(), &Config::default()).unwrap();

        let text = fs::read_to_string(temp_dir.path().join("out/api.xml")).unwrap();
        let apidoc = read_xml(&text).unwrap();
        let system = &apidoc.groups[0];
        let names: Vec<_> = system.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["getUsers", "saveUser", "zeroUser"]);
        assert_eq!(system.functions[1].description, "Save a user.");
        assert_eq!(system.functions[2].description, "Not in the source.");
        assert!(apidoc.groups[1].functions.is_empty());
    }

    #[test]
    fn test_unknown_matcher_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("api.xml"), TEMPLATE).unwrap();
        fs::write(temp_dir.path().join("api.cpp"), SOURCE).unwrap();
        let err = run_code_to_xml(&args("method"), temp_dir.path(), &Config::default()).unwrap_err();
        assert!(err.to_string().starts_with("Unknown matcher \"method\""));
    }

    #[test]
    fn test_missing_source_is_error() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("api.xml"), TEMPLATE).unwrap();
        assert!(run_code_to_xml(&args("template"), temp_dir.path(), &Config::default()).is_err());
        assert!(!temp_dir.path().join("out/api.xml").exists());
    }
}
