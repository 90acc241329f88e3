//! @dose
//! purpose: Apidoc comment generator, the inverse of the doc-comment parser. Renders a Function
//!     of the document model as `/**%apidoc ... */` lines ready to be inserted above its
//!     registration in C++ source.
//!
//! when-editing:
//!     - !Continuation lines are indented exactly as deep as the parser strips for that item,
//!       so parsing the generated comment gives back the same texts
//!     - !A param's own `%deprecated` goes before its `%value` items; after a value it would
//!       belong to the value
//!
//! invariants:
//!     - Output lines carry no trailing newline and share the registration's indent
//!     - Text lines are word-wrapped at the configured column; a single word longer than the
//!       column stays on its own line
//!
//! gotchas:
//!     - Blank text lines are emitted as ` * ` so they stay inside the item
//!     - Path segments are percent-encoded where the header grammar would not accept them
//!     - An item carries at most one attribute. Params pick `[proprietary]`, then
//!       `[readonly]`, `[immutable]`, `[opt]`; the header picks `[proprietary]` over `[opt]`.
//!       Input params survive this since `[proprietary]` implies optional on parse, but a
//!       proprietary optional output param (or function input) reads back as required
//!     - Function and result `%example` go before the first `%param`, which would otherwise
//!       claim them

use super::*;
use crate::types::{Function, FunctionResult, JsonRpcExt, Param, Value, WireType};

const COMMENT_PREFIX: &str = " * ";
const COMMENT_END: &str = " */";
const INDENT_STEP: usize = 4;

/// ` * %// text`: a private line kept in the comment but never exported.
pub fn commented_out_line(text: &str) -> String {
    format!("{}{} {}", COMMENT_PREFIX, TAG_COMMENTED_OUT, text.trim())
}

pub struct CommentGenerator {
    indent: usize,
    wrap_width: usize,
}

impl CommentGenerator {
    /// `indent` is the column of the registration line; `wrap_width` 0 disables wrapping.
    pub fn new(indent: usize, wrap_width: usize) -> Self {
        Self { indent, wrap_width }
    }

    /// Comment lines for `function`, its header path prefixed with `url_prefix`.
    pub fn function_comment(&self, function: &Function, url_prefix: &str) -> Vec<String> {
        let mut lines = vec![self.header(function, url_prefix)];

        if !function.description.is_empty() {
            self.add_text(&mut lines, 0, 0, &function.description);
        }
        if !function.caption.is_empty() {
            self.add_item(&mut lines, 0, 0, TAG_CAPTION, "", &function.caption);
        }
        for group in &function.groups {
            self.add_item(&mut lines, 0, 0, TAG_INGROUP, "", group);
        }
        if !function.permissions.is_empty() {
            self.add_item(&mut lines, 0, INDENT_STEP, TAG_PERMISSIONS, "", &function.permissions);
        }
        if function.deprecated {
            self.add_item(&mut lines, 0, 0, TAG_DEPRECATED, "", &function.deprecated_description);
        }
        self.add_jsonrpc(&mut lines, &function.jsonrpc);
        if !function.input.example.is_empty() {
            self.add_item(&mut lines, 0, 0, TAG_EXAMPLE, "", &function.input.example);
        }

        for param in &function.input.params {
            self.add_param(&mut lines, 0, param, param_attribute(param));
        }
        for param in &function.input.unused_params {
            self.add_param(&mut lines, 0, param, ATTR_UNUSED);
        }
        if let Some(result) = &function.result {
            self.add_result(&mut lines, result);
        }

        lines.push(COMMENT_END.to_string());
        let indent = " ".repeat(self.indent);
        lines.into_iter().map(|line| format!("{}{}", indent, line)).collect()
    }

    fn header(&self, function: &Function, url_prefix: &str) -> String {
        let mut header = format!("/**{}", TAG_APIDOC);
        if function.proprietary {
            header.push_str(ATTR_PROPRIETARY);
        } else if function.input.optional {
            header.push_str(ATTR_OPT);
        }
        if function.array_params {
            header.push(':');
            header.push_str(LABEL_ARRAY_PARAMS);
        }
        if !function.method.is_empty() {
            header.push(' ');
            header.push_str(&function.method);
        }
        header.push(' ');
        if !url_prefix.is_empty() {
            header.push_str(url_prefix);
        }
        header.push('/');
        header.push_str(&encode_path(&function.name));
        header
    }

    fn add_result(&self, lines: &mut Vec<String>, result: &FunctionResult) {
        let label = type_label(result.type_info.fixed);
        self.add_item(lines, 0, INDENT_STEP, TAG_RETURN, &label, &result.caption);
        if !result.example.is_empty() {
            self.add_item(lines, INDENT_STEP, INDENT_STEP, TAG_EXAMPLE, "", &result.example);
        }
        for param in &result.params {
            self.add_param(lines, 1, param, param_attribute(param));
        }
        for param in &result.unused_params {
            self.add_param(lines, 1, param, ATTR_UNUSED);
        }
    }

    /// `level` is the nesting of the owner: 0 for function input, 1 for the result.
    fn add_param(&self, lines: &mut Vec<String>, level: usize, param: &Param, attribute: &str) {
        let inner = level * INDENT_STEP;
        if param.name == PARAM_FORMAT && param.has_default_description {
            lines.push(format!(
                "{}{}{}{} {}",
                COMMENT_PREFIX,
                " ".repeat(inner),
                TAG_PARAM,
                ATTR_DEFAULT,
                PARAM_FORMAT
            ));
            return;
        }

        let param_level = level + 1 + param.name.matches('.').count();
        let tag = format!("{}{}{}", TAG_PARAM, attribute, type_label(param.fixed()));
        let text = format!("{} {}", param.name, param.description);
        self.add_text(lines, inner, param_level * INDENT_STEP, &tag_text(&tag, &text));

        let nested_inner = inner + INDENT_STEP;
        let nested_new_line = (param_level + 1) * INDENT_STEP;
        if param.deprecated {
            self.add_item(
                lines,
                nested_inner,
                nested_new_line,
                TAG_DEPRECATED,
                "",
                &param.deprecated_description,
            );
        }
        if !param.example.is_empty() {
            self.add_item(lines, nested_inner, nested_new_line, TAG_EXAMPLE, "", &param.example);
        }
        for value in &param.values {
            self.add_value(lines, nested_inner, nested_new_line, value);
        }
    }

    fn add_jsonrpc(&self, lines: &mut Vec<String>, jsonrpc: &JsonRpcExt) {
        if jsonrpc.unused {
            self.add_item(lines, 0, INDENT_STEP, TAG_JSONRPC, ATTR_UNUSED, "");
            return;
        }
        if !jsonrpc.result_method.is_empty() {
            let text = format!("{} {}", jsonrpc.result_method, jsonrpc.result_description);
            self.add_item(lines, 0, INDENT_STEP, TAG_JSONRPC, ATTR_RESULT, &text);
        }
        if let Some(description) = &jsonrpc.subscribe_description {
            let text = format!("{} {}", PARAM_SUBSCRIBE, description);
            self.add_item(lines, 0, INDENT_STEP, TAG_JSONRPC, "", &text);
        }
    }

    fn add_value(&self, lines: &mut Vec<String>, inner: usize, new_line: usize, value: &Value) {
        let attribute = if value.proprietary {
            ATTR_PROPRIETARY
        } else if value.unused {
            ATTR_UNUSED
        } else {
            ""
        };
        let name = if value.quotes_removed {
            format!("\"{}\"", value.name)
        } else {
            value.name.clone()
        };
        let tag = format!("{}{}", TAG_VALUE, attribute);
        let text = format!("{} {}", name, value.description);
        self.add_text(lines, inner, new_line, &tag_text(&tag, &text));
        if value.deprecated {
            self.add_item(
                lines,
                inner + INDENT_STEP,
                new_line,
                TAG_DEPRECATED,
                "",
                &value.deprecated_description,
            );
        }
    }

    fn add_item(
        &self,
        lines: &mut Vec<String>,
        inner: usize,
        new_line: usize,
        tag: &str,
        label: &str,
        text: &str,
    ) {
        let tag = format!("{}{}", tag, label);
        self.add_text(lines, inner, new_line, &tag_text(&tag, text));
    }

    /// Possibly multi-line text; the first line sits `inner` columns after ` * `, the
    /// following ones `new_line` columns.
    fn add_text(&self, lines: &mut Vec<String>, inner: usize, new_line: usize, text: &str) {
        let mut indent = inner;
        for source_line in text.split('\n') {
            let source_line = source_line.trim();
            if self.fits(indent, source_line) {
                push_line(lines, indent, source_line);
                indent = new_line;
                continue;
            }
            let mut current = String::new();
            for word in source_line.split_whitespace() {
                if !current.is_empty() && !self.fits(indent, &format!("{} {}", current, word)) {
                    push_line(lines, indent, &current);
                    current.clear();
                    indent = new_line;
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            push_line(lines, indent, &current);
            indent = new_line;
        }
    }

    fn fits(&self, inner: usize, text: &str) -> bool {
        self.wrap_width == 0
            || self.indent + COMMENT_PREFIX.len() + inner + text.chars().count() <= self.wrap_width
    }
}

fn push_line(lines: &mut Vec<String>, indent: usize, text: &str) {
    if text.is_empty() {
        lines.push(COMMENT_PREFIX.to_string());
    } else {
        lines.push(format!("{}{}{}", COMMENT_PREFIX, " ".repeat(indent), text));
    }
}

fn tag_text(tag: &str, text: &str) -> String {
    let text = text.trim_end();
    if text.is_empty() {
        tag.to_string()
    } else {
        format!("{} {}", tag, text)
    }
}

fn type_label(fixed: WireType) -> String {
    if fixed == WireType::Unknown {
        String::new()
    } else {
        format!(":{}", fixed)
    }
}

fn param_attribute(param: &Param) -> &'static str {
    if param.proprietary {
        ATTR_PROPRIETARY
    } else if param.readonly {
        ATTR_READONLY
    } else if param.immutable {
        ATTR_IMMUTABLE
    } else if param.optional {
        ATTR_OPT
    } else {
        ""
    }
}

fn encode_path(name: &str) -> String {
    let allowed = |c: char| c.is_alphanumeric() || "_{}./-?".contains(c);
    name.split('/')
        .map(|segment| {
            if segment.chars().all(allowed) {
                segment.to_string()
            } else {
                urlencoding::encode(segment).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
