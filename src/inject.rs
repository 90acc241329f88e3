//! @dose
//! purpose: Comment injection, the XML-to-code direction. Finds the registration of every
//!     documented function in a C++ file and writes its apidoc comment right above it.
//!
//! when-editing:
//!     - !Injected functions are removed from the document; what is left was not found in
//!       the source and is reported with a warning
//!     - Line numbers shift while comments are inserted; the scan continues after the
//!       registration line it just handled
//!
//! invariants:
//!     - Plain `//` lines directly above a registration move into the new comment as `%//`
//!       lines, right before its closing line
//!     - A blank line separates the comment from the code above it
//!
//! gotchas:
//!     - Registrations without a literal name are skipped; they cannot be matched to a
//!       function of the document

use crate::apidoc::generator::{commented_out_line, CommentGenerator};
use crate::error::{Error, Result};
use crate::registration::RegistrationMatcher;
use crate::source::{anchored, SourceEditor};
use crate::types::{Apidoc, Function};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static EXISTING_COMMENT: Lazy<Regex> = Lazy::new(|| anchored(r"\s*//(.*)"));

/// Insert comments for the functions of `apidoc` registered in the edited source; returns how
/// many were inserted.
pub fn insert_comments(
    editor: &mut SourceEditor,
    apidoc: &mut Apidoc,
    matcher: &dyn RegistrationMatcher,
    wrap_width: usize,
) -> Result<usize> {
    let mut processed: Vec<String> = Vec::new();
    let mut line = 1;
    while line <= editor.line_count() {
        let found = matcher.try_match(editor, line)?;
        let Some(name) = found.as_ref().and_then(|f| f.function_name.clone()) else {
            line += 1;
            continue;
        };
        let method = found.and_then(|f| f.method);

        if processed.contains(&name) {
            return Err(Error::registration(
                editor.location(line),
                format!(
                    "Function {} is registered in the source code again in line {}.",
                    name, line
                ),
            ));
        }

        if let Some((url_prefix, function)) = take_function(apidoc, &name, method.as_deref()) {
            let indent = editor.line_indent(line);
            let comment = CommentGenerator::new(indent, wrap_width).function_comment(&function, &url_prefix);
            line = insert_comment(editor, line, indent, comment);
            processed.push(name);
        }
        line += 1;
    }

    let unprocessed: Vec<&str> = apidoc
        .groups
        .iter()
        .flat_map(|g| g.functions.iter().map(|f| f.name.as_str()))
        .collect();
    if !unprocessed.is_empty() {
        warn!(
            "The following functions are present in API XML but not registered in the source code: {}",
            unprocessed.join(", ")
        );
    }
    Ok(processed.len())
}

/// Remove the function registered as `name` from its group.
fn take_function(apidoc: &mut Apidoc, name: &str, method: Option<&str>) -> Option<(String, Function)> {
    apidoc.groups.iter_mut().find_map(|group| {
        let index = group
            .functions
            .iter()
            .position(|f| f.name == name && method.map_or(true, |m| f.method == m))?;
        Some((group.url_prefix.clone(), group.functions.remove(index)))
    })
}

/// Insert `comment` above `main_line`; returns the new number of the main line.
fn insert_comment(
    editor: &mut SourceEditor,
    main_line: usize,
    indent: usize,
    mut comment: Vec<String>,
) -> usize {
    let insert_at = comment.len().saturating_sub(1);
    let mut line = main_line - 1;
    while line > 0 {
        let Some(values) = editor.match_line(line, &EXISTING_COMMENT) else {
            break;
        };
        editor.delete_line(line);
        line -= 1;
        comment.insert(
            insert_at,
            format!("{}{}", " ".repeat(indent), commented_out_line(&values[0])),
        );
    }

    line += 1;
    if line > 1 && !editor.line(line - 1).trim().is_empty() {
        line += editor.insert_line(line, "");
    }
    line + editor.insert_lines(line, &comment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractOptions, SourceScanner};
    use crate::registration::TemplateMatcher;
    use crate::source::SourceCode;
    use crate::types::Group;
    use pretty_assertions::assert_eq;

    const BARE: &str = concat!(
        "void registerFunctions()\n",
        "{\n",
        "    // Legacy handler.\n",
        "    // Kept for old clients.\n",
        "    regGet<QnUuid, UserDataList>(p, ApiCommand::getUsers);\n",
        "    regUpdate<UserData>(p, ApiCommand::saveUser);\n",
        "    regUpdate<UserData>(p, ApiCommand::removeUser);\n",
        "}\n",
    );

    const DOCUMENTED: &str = concat!(
        "/**%apidoc GET /ec2/getUsers\n",
        " * Read users.\n",
        " * %caption Users\n",
        " * %param[opt]:uuid id User id.\n",
        " * %param:enum kind Kind of the user.\n",
        " *     %value local Local user.\n",
        " *     %value cloud Cloud user.\n",
        " * %return:array List of users.\n",
        " */\n",
        "regGet<QnUuid, UserDataList>(p, ApiCommand::getUsers);\n",
        "/**%apidoc[proprietary] POST /ec2/saveUser\n",
        " * Save a user. The description is long enough to be wrapped by the generator at a\n",
        " * narrow column.\n",
        " */\n",
        "regUpdate<UserData>(p, ApiCommand::saveUser);\n",
    );

    fn empty_groups() -> Apidoc {
        Apidoc {
            groups: vec![Group {
                group_name: "System API".to_string(),
                url_prefix: "/ec2".to_string(),
                ..Group::default()
            }],
        }
    }

    fn scan(code: &SourceCode) -> Apidoc {
        let mut apidoc = empty_groups();
        SourceScanner::new(code, None, ExtractOptions::default())
            .scan(&mut apidoc, &TemplateMatcher)
            .unwrap();
        apidoc
    }

    // ===== Injection Tests =====

    #[test]
    fn test_comments_are_inserted_above_registrations() {
        let mut apidoc = scan(&SourceCode::from_text("documented.cpp", DOCUMENTED));
        let mut editor = SourceEditor::new(SourceCode::from_text("bare.cpp", BARE));

        let count = insert_comments(&mut editor, &mut apidoc, &TemplateMatcher, 0).unwrap();

        assert_eq!(count, 2);
        assert!(apidoc.groups[0].functions.is_empty());
        let lines = editor.lines();
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "    /**%apidoc GET /ec2/getUsers");
        assert!(lines.contains(&"     * %// Legacy handler.".to_string()));
        let kept = lines.iter().position(|l| l == "     * %// Kept for old clients.").unwrap();
        assert_eq!(lines[kept + 1], "     */");
        assert_eq!(lines[kept + 2], "    regGet<QnUuid, UserDataList>(p, ApiCommand::getUsers);");
        assert_eq!(lines[kept + 3], "");
        assert_eq!(lines[kept + 4], "    /**%apidoc[proprietary] POST /ec2/saveUser");
        assert!(!lines.iter().any(|l| l == "    // Legacy handler."));
    }

    /// Descriptions with every whitespace run collapsed, as wrapping may move line breaks.
    fn unwrapped(mut apidoc: Apidoc) -> Apidoc {
        let join = |text: &mut String| {
            *text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        };
        for function in apidoc.groups.iter_mut().flat_map(|g| g.functions.iter_mut()) {
            join(&mut function.description);
            for param in &mut function.input.params {
                join(&mut param.description);
            }
        }
        apidoc
    }

    #[test]
    fn test_closed_loop_reproduces_document() {
        let original = scan(&SourceCode::from_text("documented.cpp", DOCUMENTED));
        let mut apidoc = original.clone();
        let mut editor = SourceEditor::new(SourceCode::from_text("bare.cpp", BARE));
        insert_comments(&mut editor, &mut apidoc, &TemplateMatcher, 0).unwrap();
        assert_eq!(scan(&editor.into_source()), original);
    }

    #[test]
    fn test_closed_loop_with_wrapping_keeps_words() {
        let original = scan(&SourceCode::from_text("documented.cpp", DOCUMENTED));
        for width in [40, 60, 100] {
            let mut apidoc = original.clone();
            let mut editor = SourceEditor::new(SourceCode::from_text("bare.cpp", BARE));
            insert_comments(&mut editor, &mut apidoc, &TemplateMatcher, width).unwrap();
            let rescanned = scan(&editor.into_source());
            assert_eq!(unwrapped(rescanned), unwrapped(original.clone()), "wrap width {}", width);
        }
    }

    #[test]
    fn test_registered_twice_is_error() {
        let mut apidoc = scan(&SourceCode::from_text("documented.cpp", DOCUMENTED));
        let text = concat!(
            "regUpdate<UserData>(p, ApiCommand::saveUser);\n",
            "regUpdate<UserData>(p, ApiCommand::saveUser);\n",
        );
        let mut editor = SourceEditor::new(SourceCode::from_text("twice.cpp", text));
        let err = insert_comments(&mut editor, &mut apidoc, &TemplateMatcher, 0).unwrap_err();
        assert!(err
            .to_string()
            .ends_with("Function saveUser is registered in the source code again in line 6."));
    }

    #[test]
    fn test_unknown_functions_stay_in_document() {
        let mut apidoc = scan(&SourceCode::from_text("documented.cpp", DOCUMENTED));
        let mut editor = SourceEditor::new(SourceCode::from_text(
            "other.cpp",
            "regUpdate<UserData>(p, ApiCommand::saveUser);\n",
        ));
        let count = insert_comments(&mut editor, &mut apidoc, &TemplateMatcher, 0).unwrap();
        assert_eq!(count, 1);
        let left: Vec<&str> = apidoc.groups[0].functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(left, vec!["getUsers"]);
    }
}
