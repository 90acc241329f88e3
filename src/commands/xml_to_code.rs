//! @dose
//! purpose: The xml-to-code action. Writes the functions of an XML document as apidoc comments
//!     above their registrations in a C++ source.
//!
//! when-editing:
//!     - !The output XML holds only what could not be injected; an empty group list means
//!       everything was placed
//!     - --wrap-width overrides comment_wrap_width of the config
//!
//! flows:
//!     - load_xml -> SourceEditor::load -> insert_comments -> save source -> save leftover XML

use super::pipeline::{find_matcher, resolve_path};
use crate::cli::XmlToCodeArgs;
use crate::config::Config;
use crate::formatter::{load_xml, save_xml};
use crate::inject::insert_comments;
use crate::registration::MatcherFactory;
use crate::source::SourceEditor;
use anyhow::{Context, Result};
use std::path::Path;

pub fn run_xml_to_code(args: &XmlToCodeArgs, root: &Path, config: &Config) -> Result<()> {
    let xml_path = resolve_path(root, &args.xml);
    let source_path = resolve_path(root, &args.source);
    let output_source = resolve_path(root, &args.output_source);
    let output_xml = resolve_path(root, &args.output_xml);

    let factory = MatcherFactory::new();
    let matcher = find_matcher(&factory, &args.matcher)?;
    let wrap_width = args.wrap_width.unwrap_or(config.comment_wrap_width);

    let mut apidoc = load_xml(&xml_path).context("Failed to load XML document")?;
    let mut editor = SourceEditor::load(&source_path)?;

    let count = insert_comments(&mut editor, &mut apidoc, matcher, wrap_width)
        .with_context(|| format!("Failed to insert comments into {}", source_path.display()))?;

    editor.save(&output_source)?;
    save_xml(&output_xml, &apidoc)
        .with_context(|| format!("Failed to write {}", output_xml.display()))?;

    println!("API functions processed: {}", count);
    println!("Output: {}", output_source.display());
    println!("Output: {}", output_xml.display());
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

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<apidoc>
    <groups>
        <group>
            <groupName>System API</groupName>
            <urlPrefix>/ec2</urlPrefix>
            <functions>
                <function>
                    <name>saveUser</name>
                    <method>POST</method>
                    <description>Save a user.</description>
                </function>
                <function>
                    <name>lostUser</name>
                    <method>POST</method>
                </function>
            </functions>
        </group>
    </groups>
</apidoc>
"#;

    const SOURCE: &str = concat!(
        "void registerFunctions()\n",
        "{\n",
        "    regUpdate<UserData>(p, ApiCommand::saveUser);\n",
        "}\n",
    );

    // ===== XML To Code Tests =====

    #[test]
    fn test_comments_written_and_leftovers_saved() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("api.xml"), DOCUMENT).unwrap();
        fs::write(temp_dir.path().join("api.cpp"), SOURCE).unwrap();
        let args = XmlToCodeArgs {
            xml: PathBuf::from("api.xml"),
            source: PathBuf::from("api.cpp"),
            output_source: PathBuf::from("api.out.cpp"),
            output_xml: PathBuf::from("left.xml"),
            matcher: "template".to_string(),
            wrap_width: None,
        };

        run_xml_to_code(&args, temp_dir.path(), &Config::default()).unwrap();

        let code = fs::read_to_string(temp_dir.path().join("api.out.cpp")).unwrap();
        assert_eq!(
            code,
            concat!(
                "void registerFunctions()\n",
                "{\n",
                "\n",
                "    /**%apidoc POST /ec2/saveUser\n",
                "     * Save a user.\n",
                "     */\n",
                "    regUpdate<UserData>(p, ApiCommand::saveUser);\n",
                "}\n",
            )
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("api.cpp")).unwrap(),
            SOURCE
        );

        let left = read_xml(&fs::read_to_string(temp_dir.path().join("left.xml")).unwrap()).unwrap();
        let names: Vec<_> = left.groups[0].functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["lostUser"]);
    }
}
