//! @dose
//! purpose: Doc-comment parser. Turns the tag items of one apidoc comment into function
//!     descriptions (a comment may document several functions, each starting with `%apidoc`),
//!     and parses standalone `%param` items attached to struct fields.
//!
//! when-editing:
//!     - !Once-only tags go through check_tag_once so the error text stays uniform
//!     - !indent_level must be restored on every exit path of a nested parse
//!     - Nested items (`%value`, `%deprecated`, `%struct` under `%param`) are consumed until
//!       the first tag they do not own, which is pushed back for the caller
//!
//! invariants:
//!     - Param names inside one function or result are unique; a param generated from a
//!       struct is replaced by an explicitly documented one of the same name
//!     - Struct params are appended right after the param that names the struct
//!
//! gotchas:
//!     - A `%param` token with dots (`a.b.c`) indents its continuation text one level per dot
//!     - Output params accept `[opt]` and `[readonly]` because struct field comments share
//!       the grammar
//!     - `%example` right after a `%param` belongs to that param; a function or result
//!       example must precede the params

use super::tag::TagItem;
use super::version::{
    apply_exact_or_nearest_version_to_range, should_path_be_ignored, ApiVersion, UrlReplacement,
};
use super::*;
use crate::error::Result;
use crate::merge::TypeMerger;
use crate::source::{match_regex, anchored};
use crate::types::{Function, FunctionResult, JsonRpcExt, Param, Value, WireType};
use once_cell::sync::Lazy;
use regex::Regex;

static FUNCTION_HEADER: Lazy<Regex> =
    Lazy::new(|| anchored(r"(?s)\s*([A-Z]+)\s+(/[\w{}./%?-]*)(?:\s+(.*))?"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    /// `%param name description`
    WithToken,
    /// Struct field comment: the name comes from the field.
    WithoutToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Api,
    Transaction,
}

/// A parsed function together with the URL prefix its header was found under.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionDescription {
    pub url_prefix: String,
    pub function: Function,
}

/// Settings shared by every comment of one scan.
#[derive(Debug, Clone)]
pub struct CommentOptions<'a> {
    /// URL prefixes of the groups already present in the document.
    pub url_prefixes: &'a [String],
    pub replacements: &'a [UrlReplacement],
    pub api_versions: &'a [ApiVersion],
    /// Negative: `%caption` is not required. Zero: no length limit.
    pub caption_len_limit: i32,
    /// Negative: `%ingroup` is not required. Zero: no length limit.
    pub group_name_len_limit: i32,
    pub kind: FunctionKind,
}

impl Default for CommentOptions<'_> {
    fn default() -> Self {
        Self {
            url_prefixes: &[],
            replacements: &[],
            api_versions: &[],
            caption_len_limit: -1,
            group_name_len_limit: -1,
            kind: FunctionKind::Api,
        }
    }
}

struct Cursor<'i> {
    items: &'i [TagItem],
    pos: usize,
}

impl<'i> Cursor<'i> {
    fn new(items: &'i [TagItem]) -> Self {
        Self { items, pos: 0 }
    }

    fn next(&mut self) -> Option<&'i TagItem> {
        let item = self.items.get(self.pos)?;
        self.pos += 1;
        Some(item)
    }

    fn push_back(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    fn has_next(&self) -> bool {
        self.pos < self.items.len()
    }
}

#[derive(Default)]
struct ParamItems {
    values: Vec<Value>,
    struct_name: String,
    deprecated: bool,
    deprecated_description: String,
    example: String,
}

/// Stateful parser of one comment; `indent_level` tracks how deep the current item is.
pub struct CommentParser<'m> {
    merger: Option<&'m TypeMerger<'m>>,
    indent_level: usize,
}

impl<'m> CommentParser<'m> {
    /// Without a merger `%struct` references are recorded but not expanded.
    pub fn new(merger: Option<&'m TypeMerger<'m>>) -> Self {
        Self {
            merger,
            indent_level: 0,
        }
    }

    /// Functions documented by `items`; functions of another API version are skipped.
    pub fn functions_from_items(
        &mut self,
        items: &[TagItem],
        options: &CommentOptions<'_>,
    ) -> Result<Vec<FunctionDescription>> {
        let mut cursor = Cursor::new(items);
        let mut descriptions = Vec::new();
        while cursor.has_next() {
            if let Some(description) = self.function_from_items(&mut cursor, options)? {
                descriptions.push(description);
            }
        }
        Ok(descriptions)
    }

    fn function_from_items(
        &mut self,
        cursor: &mut Cursor<'_>,
        options: &CommentOptions<'_>,
    ) -> Result<Option<FunctionDescription>> {
        let Some(first) = cursor.next() else {
            return Ok(None);
        };
        if first.tag() != TAG_APIDOC {
            return Err(first.error(format!("Comment should start with {} tag.", TAG_APIDOC)));
        }

        let mut description = match options.kind {
            FunctionKind::Api => self.function_from_header(first, options)?,
            FunctionKind::Transaction => {
                let mut description = FunctionDescription::default();
                description.function.description = first.full_text(self.indent_level);
                description
            }
        };

        let mut struct_parsed = false;
        let mut caption_parsed = false;
        let mut permissions_parsed = false;
        let mut return_parsed = false;
        let mut example_parsed = false;

        while let Some(item) = cursor.next() {
            let function = &mut description.function;
            match item.tag() {
                TAG_APIDOC => {
                    cursor.push_back();
                    break;
                }
                TAG_DEPRECATED => {
                    function.deprecated =
                        check_tag_once(item, function.deprecated, TAG_DEPRECATED)?;
                    check_no_attribute(item)?;
                    function.deprecated_description = item.full_text(self.indent_level);
                }
                TAG_STRUCT => {
                    if function.input.type_info.is_parsed() {
                        return Err(item.error(format!(
                            "{} type and {} can not be both specified.",
                            TAG_APIDOC, TAG_STRUCT
                        )));
                    }
                    struct_parsed = check_tag_once(item, struct_parsed, TAG_STRUCT)?;
                    if item.attribute() == ATTR_OPT {
                        function.input.optional = true;
                    } else {
                        check_no_attribute(item)?;
                    }
                    function
                        .input
                        .type_info
                        .fill_from_name(&item.full_text(self.indent_level))
                        .map_err(|e| item.error(e))?;
                }
                TAG_CAPTION => {
                    caption_parsed = check_tag_once(item, caption_parsed, TAG_CAPTION)?;
                    check_no_attribute(item)?;
                    let value = item.full_text(self.indent_level).trim().to_string();
                    if value.is_empty() {
                        return Err(item.error(format!("Empty {}", TAG_CAPTION)));
                    }
                    if exceeds(options.caption_len_limit, &value) {
                        return Err(item.error(format!("{} is too long.", TAG_CAPTION)));
                    }
                    function.caption = value;
                }
                TAG_INGROUP => {
                    check_no_attribute(item)?;
                    let value = item.full_text(self.indent_level).trim().to_string();
                    if value.is_empty() {
                        return Err(item.error(format!("Empty {}", TAG_INGROUP)));
                    }
                    if exceeds(options.group_name_len_limit, &value) {
                        return Err(item.error(format!("{} is too long.", TAG_INGROUP)));
                    }
                    if function.groups.contains(&value) {
                        return Err(item.error(format!(
                            "The {} {} is specified more than once.",
                            TAG_INGROUP, value
                        )));
                    }
                    function.groups.push(value);
                }
                TAG_PERMISSIONS => {
                    permissions_parsed =
                        check_tag_once(item, permissions_parsed, TAG_PERMISSIONS)?;
                    function.permissions = item.full_text(self.indent_level + 1);
                }
                TAG_PARAM => {
                    let mut param =
                        self.parse_param(item, cursor, ParamDirection::Input, ParamMode::WithToken)?;
                    let owner = function.name.clone();
                    check_duplicate_param(item, &mut function.input.params, &param.name, &owner)?;
                    let struct_params = self.struct_params(&mut param, ParamDirection::Input)?;
                    let input = &mut function.input;
                    push_param(&mut input.params, &mut input.unused_params, param);
                    for struct_param in struct_params {
                        push_param(&mut input.params, &mut input.unused_params, struct_param);
                    }
                }
                TAG_RETURN => {
                    return_parsed = check_tag_once(item, return_parsed, TAG_RETURN)?;
                    let owner = function.name.clone();
                    let result = self.parse_function_result(item, cursor, &owner)?;
                    description.function.result = Some(result);
                }
                TAG_EXAMPLE => {
                    example_parsed = check_tag_once(item, example_parsed, TAG_EXAMPLE)?;
                    check_no_attribute(item)?;
                    function.input.example = item.full_text(self.indent_level).trim().to_string();
                }
                TAG_JSONRPC => parse_jsonrpc(item, self.indent_level + 1, &mut function.jsonrpc)?,
                tag if tag.starts_with(TAG_COMMENTED_OUT) => {}
                tag => return Err(item.error(format!("Unknown tag {} found.", tag))),
            }
        }

        let function = &description.function;
        if options.kind == FunctionKind::Api
            && function.jsonrpc.subscribe_description.is_some()
            && function.method != "GET"
        {
            return Err(first.error(format!(
                "{} {} is allowed only for GET functions.",
                TAG_JSONRPC, PARAM_SUBSCRIBE
            )));
        }

        let path = format!("{}/{}", description.url_prefix, description.function.name);
        if should_path_be_ignored(&path, options.api_versions) {
            return Ok(None);
        }
        if options.caption_len_limit >= 0 && description.function.caption.is_empty() {
            return Err(first.error(format!("{} unspecified.", TAG_CAPTION)));
        }
        if options.group_name_len_limit >= 0 && description.function.groups.is_empty() {
            return Err(first.error(format!("{} unspecified.", TAG_INGROUP)));
        }
        Ok(Some(description))
    }

    fn function_from_header(
        &self,
        item: &TagItem,
        options: &CommentOptions<'_>,
    ) -> Result<FunctionDescription> {
        let Some(values) = match_regex(&FUNCTION_HEADER, &item.full_text(self.indent_level))
        else {
            return Err(item.error(format!("Wrong {} function header.", TAG_APIDOC)));
        };

        let mut path = values[1].clone();
        for replacement in options.replacements {
            path = replacement.apply(&path);
        }
        path = apply_exact_or_nearest_version_to_range(&path, options.api_versions)
            .map_err(|e| item.error(e.to_string()))?;

        let mut result = FunctionDescription::default();
        if let Some(prefix) = options
            .url_prefixes
            .iter()
            .find(|p| !p.is_empty() && path.starts_with(&format!("{}/", p)))
        {
            result.url_prefix = prefix.clone();
            path = path[prefix.len()..].to_string();
        }
        let path = path.strip_prefix('/').unwrap_or(&path);

        let function = &mut result.function;
        function.method = values[0].trim().to_string();
        function.name = urlencoding::decode(path)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| path.to_string());
        function.description = values[2].trim().to_string();

        let label = item.label();
        if label == LABEL_ARRAY_PARAMS {
            function.array_params = true;
        } else if !label.is_empty() {
            function
                .input
                .type_info
                .fill_from_label(label)
                .map_err(|_| item.error(format!("Invalid function type \"{}\" found.", label)))?;
        }

        match item.attribute() {
            "" => {}
            ATTR_PROPRIETARY => function.proprietary = true,
            ATTR_OPT => function.input.optional = true,
            _ => return Err(invalid_attribute(item)),
        }
        Ok(result)
    }

    fn struct_params(&self, param: &mut Param, direction: ParamDirection) -> Result<Vec<Param>> {
        let Some(merger) = self.merger else {
            return Ok(Vec::new());
        };
        let mut params = merger.struct_params(&mut param.type_info, &param.name, direction)?;
        for struct_param in &mut params {
            struct_param.generated_from_struct = true;
        }
        if param.description.is_empty() {
            param.description = merger.struct_description(&param.type_info);
        }
        Ok(params)
    }

    fn parse_param(
        &mut self,
        item: &TagItem,
        cursor: &mut Cursor<'_>,
        direction: ParamDirection,
        mode: ParamMode,
    ) -> Result<Param> {
        let param_indent = match mode {
            ParamMode::WithToken => item.token().matches('.').count() + 1,
            ParamMode::WithoutToken => 0,
        };
        self.indent_level += param_indent;
        let param = self.parse_param_body(item, cursor, direction, mode);
        self.indent_level -= param_indent;
        param
    }

    fn parse_param_body(
        &mut self,
        item: &TagItem,
        cursor: &mut Cursor<'_>,
        direction: ParamDirection,
        mode: ParamMode,
    ) -> Result<Param> {
        let mut param = Param::default();
        param.description = match mode {
            ParamMode::WithToken => item.text_after_token(self.indent_level),
            ParamMode::WithoutToken => item.full_text(self.indent_level),
        };
        param.name = initial_token(item, mode)?;
        param
            .type_info
            .fill_from_label(item.label())
            .map_err(|_| item.error(format!("Invalid param type \"{}\" found.", item.label())))?;

        let nested = self.parse_param_items(cursor)?;
        param.values = nested.values;
        if !nested.struct_name.is_empty() {
            let typed = !matches!(
                param.fixed(),
                WireType::Object | WireType::Array | WireType::Unknown
            );
            if typed || param.type_info.name.is_some() {
                return Err(item.error(format!(
                    "Param `{}` can not have {} tag as it has a type specified.",
                    param.name, TAG_STRUCT
                )));
            }
            param.type_info.name = Some(nested.struct_name);
        }
        param.deprecated = nested.deprecated;
        param.deprecated_description = nested.deprecated_description;
        param.example = nested.example;

        match direction {
            ParamDirection::Input => input_param_attribute(item, &mut param)?,
            ParamDirection::Output => output_param_attribute(item, &mut param)?,
        }
        Ok(param)
    }

    fn parse_param_items(&mut self, cursor: &mut Cursor<'_>) -> Result<ParamItems> {
        self.indent_level += 1;
        let items = self.parse_param_items_body(cursor);
        self.indent_level -= 1;
        items
    }

    fn parse_param_items_body(&mut self, cursor: &mut Cursor<'_>) -> Result<ParamItems> {
        let mut nested = ParamItems::default();
        while let Some(item) = cursor.next() {
            match item.tag() {
                TAG_DEPRECATED => {
                    nested.deprecated = true;
                    nested.deprecated_description = item.full_text(self.indent_level);
                }
                TAG_VALUE => {
                    let value = self.parse_value(item, cursor)?;
                    nested.values.push(value);
                }
                TAG_STRUCT => nested.struct_name = item.full_text(self.indent_level),
                TAG_EXAMPLE => nested.example = item.full_text(self.indent_level).trim().to_string(),
                tag if tag.starts_with(TAG_COMMENTED_OUT) => {}
                _ => {
                    cursor.push_back();
                    break;
                }
            }
        }
        Ok(nested)
    }

    fn parse_value(&mut self, item: &TagItem, cursor: &mut Cursor<'_>) -> Result<Value> {
        let mut value = Value::default();
        value.set_name(&initial_token(item, ParamMode::WithToken)?);
        value.description = item.text_after_token(self.indent_level);

        match item.attribute() {
            "" => {}
            ATTR_PROPRIETARY => value.proprietary = true,
            ATTR_UNUSED => value.unused = true,
            other => {
                return Err(item.error(format!("unexpected attribute \"{}\".", other)));
            }
        }

        while let Some(next) = cursor.next() {
            match next.tag() {
                TAG_DEPRECATED => {
                    value.deprecated = true;
                    value.deprecated_description = next.full_text(self.indent_level);
                }
                tag if tag.starts_with(TAG_COMMENTED_OUT) => {}
                _ => {
                    cursor.push_back();
                    break;
                }
            }
        }
        Ok(value)
    }

    fn parse_function_result(
        &mut self,
        item: &TagItem,
        cursor: &mut Cursor<'_>,
        owner: &str,
    ) -> Result<FunctionResult> {
        self.indent_level += 1;
        let result = self.parse_function_result_body(item, cursor, owner);
        self.indent_level -= 1;
        result
    }

    fn parse_function_result_body(
        &mut self,
        item: &TagItem,
        cursor: &mut Cursor<'_>,
        owner: &str,
    ) -> Result<FunctionResult> {
        check_no_attribute(item)?;
        let mut result = FunctionResult {
            caption: item.full_text(self.indent_level),
            ..FunctionResult::default()
        };
        result.type_info.fill_from_label(item.label()).map_err(|e| {
            item.error(format!("Invalid result type `{}`: {}", item.label(), e))
        })?;

        let mut deprecated_attribute_found = false;
        let mut struct_parsed = false;
        let mut example_parsed = false;
        while let Some(next) = cursor.next() {
            match next.tag() {
                TAG_STRUCT => {
                    let typed = !matches!(
                        result.type_info.fixed,
                        WireType::Object | WireType::Array | WireType::Unknown
                    );
                    if typed || result.type_info.name.is_some() {
                        return Err(next.error(format!(
                            "{} type and {} can not be both specified.",
                            TAG_RETURN, TAG_STRUCT
                        )));
                    }
                    struct_parsed = check_tag_once(next, struct_parsed, TAG_STRUCT)?;
                    result
                        .type_info
                        .fill_from_name(&next.full_text(self.indent_level))
                        .map_err(|e| next.error(e))?;
                }
                TAG_PARAM => {
                    let mut param = self.parse_param(
                        next,
                        cursor,
                        ParamDirection::Output,
                        ParamMode::WithToken,
                    )?;
                    check_duplicate_param(next, &mut result.params, &param.name, owner)?;
                    let struct_params = self.struct_params(&mut param, ParamDirection::Output)?;
                    push_param(&mut result.params, &mut result.unused_params, param);
                    for struct_param in struct_params {
                        push_param(&mut result.params, &mut result.unused_params, struct_param);
                    }
                }
                TAG_EXAMPLE => {
                    example_parsed = check_tag_once(next, example_parsed, TAG_EXAMPLE)?;
                    check_no_attribute(next)?;
                    result.example = next.full_text(self.indent_level).trim().to_string();
                }
                TAG_ATTRIBUTE => {
                    deprecated_attribute_found = true;
                    self.parse_result_attribute(next, &mut result)?;
                }
                tag if tag.starts_with(TAG_COMMENTED_OUT) => {}
                _ => {
                    cursor.push_back();
                    break;
                }
            }
        }

        if deprecated_attribute_found {
            tracing::warn!(
                "{}: Deprecated Apidoc tag \"{}\" found instead of \"{}\".",
                item.location(),
                TAG_ATTRIBUTE,
                TAG_PARAM
            );
        }
        Ok(result)
    }

    /// Legacy `%attribute name description` under `%return`.
    fn parse_result_attribute(&self, item: &TagItem, result: &mut FunctionResult) -> Result<()> {
        let name = initial_token(item, ParamMode::WithToken)?;
        if result.params.iter().any(|p| p.name == name) {
            return Err(item.error(format!("Duplicate result attribute \"{}\" found.", name)));
        }
        check_no_attribute(item)?;
        let mut param = Param::named(name);
        param.description = item.text_after_token(self.indent_level);
        result.params.push(param);
        Ok(())
    }
}

/// The single param documented by a struct field comment, `None` when there are no items.
pub fn param_from_items(
    items: &[TagItem],
    direction: ParamDirection,
    mode: ParamMode,
) -> Result<Option<Param>> {
    let mut cursor = Cursor::new(items);
    let Some(item) = cursor.next() else {
        return Ok(None);
    };
    let mut parser = CommentParser::new(None);
    let param = parser.parse_param(item, &mut cursor, direction, mode)?;
    if let Some(unexpected) = cursor.next() {
        return Err(unexpected.error(format!("Unexpected tag {} found.", unexpected.tag())));
    }
    Ok(Some(param))
}

/// Every `%param` of a struct comment, names prefixed with `prefix`.
pub fn params_from_items(
    items: &[TagItem],
    prefix: &str,
    direction: ParamDirection,
    mode: ParamMode,
) -> Result<Vec<Param>> {
    let mut params: Vec<Param> = Vec::new();
    let mut cursor = Cursor::new(items);
    let mut parser = CommentParser::new(None);
    while let Some(item) = cursor.next() {
        if item.tag() != TAG_PARAM {
            continue;
        }
        let mut param = parser.parse_param(item, &mut cursor, direction, mode)?;
        let prefixed = format!("{}{}", prefix, param.name);
        check_duplicate_param(item, &mut params, &prefixed, "")?;
        param.name = prefixed;
        params.push(param);
    }
    Ok(params)
}

fn push_param(params: &mut Vec<Param>, unused: &mut Vec<Param>, param: Param) {
    if param.unused {
        unused.push(param);
    } else {
        params.push(param);
    }
}

fn exceeds(limit: i32, value: &str) -> bool {
    limit > 0 && value.chars().count() > limit as usize
}

fn input_param_attribute(item: &TagItem, param: &mut Param) -> Result<()> {
    match item.attribute() {
        "" => {}
        ATTR_PROPRIETARY => {
            param.proprietary = true;
            param.optional = true;
        }
        ATTR_READONLY => {
            param.readonly = true;
            param.optional = true;
        }
        ATTR_OPT => param.optional = true,
        ATTR_DEFAULT => {
            fill_default_format_param(item, param)?;
            param.has_default_description = true;
        }
        ATTR_REF => param.is_ref = true,
        ATTR_UNUSED => param.unused = true,
        ATTR_IMMUTABLE => param.immutable = true,
        _ => return Err(invalid_attribute(item)),
    }
    Ok(())
}

fn output_param_attribute(item: &TagItem, param: &mut Param) -> Result<()> {
    match item.attribute() {
        "" => {}
        ATTR_PROPRIETARY => param.proprietary = true,
        ATTR_UNUSED => param.unused = true,
        ATTR_READONLY => param.readonly = true,
        ATTR_OPT => param.optional = true,
        ATTR_IMMUTABLE => param.immutable = true,
        _ => return Err(invalid_attribute(item)),
    }
    Ok(())
}

/// One `%jsonrpc` item: `[unused]`, `[result] one|all text` or `subscribe text`.
fn parse_jsonrpc(item: &TagItem, indent_level: usize, jsonrpc: &mut JsonRpcExt) -> Result<()> {
    let name = item.token();
    if item.attribute() == ATTR_UNUSED {
        if jsonrpc.unused {
            return Err(item.error(format!(
                "{}{} is specified more than once.",
                TAG_JSONRPC, ATTR_UNUSED
            )));
        }
        if !name.is_empty() {
            return Err(item.error(format!(
                "{}{} must not specify anything.",
                TAG_JSONRPC, ATTR_UNUSED
            )));
        }
        if !jsonrpc.result_method.is_empty() || jsonrpc.subscribe_description.is_some() {
            return Err(item.error(format!(
                "{}{} can not be specified in conjunction with any other {}.",
                TAG_JSONRPC, ATTR_UNUSED, TAG_JSONRPC
            )));
        }
        jsonrpc.unused = true;
        return Ok(());
    }

    if jsonrpc.unused {
        return Err(item.error(format!(
            "Any other {} usages can not be specified in conjunction with {}{}.",
            TAG_JSONRPC, TAG_JSONRPC, ATTR_UNUSED
        )));
    }

    match item.attribute() {
        ATTR_RESULT => {
            if !jsonrpc.result_method.is_empty() {
                return Err(item.error(format!(
                    "{}{} is specified more than once.",
                    TAG_JSONRPC, ATTR_RESULT
                )));
            }
            if name != PARAM_ONE && name != PARAM_ALL {
                return Err(item.error(format!(
                    "Unknown {}{} type `{}`.",
                    TAG_JSONRPC, ATTR_RESULT, name
                )));
            }
            jsonrpc.result_method = name.to_string();
            jsonrpc.result_description = item.text_after_token(indent_level).trim().to_string();
            Ok(())
        }
        "" if name == PARAM_SUBSCRIBE => {
            if jsonrpc.subscribe_description.is_some() {
                return Err(item.error(format!(
                    "{} {} must be specified only once.",
                    TAG_JSONRPC, PARAM_SUBSCRIBE
                )));
            }
            jsonrpc.subscribe_description =
                Some(item.text_after_token(indent_level).trim().to_string());
            Ok(())
        }
        "" => Err(item.error(format!(
            "Unknown {} extension name `{}`.",
            TAG_JSONRPC, name
        ))),
        other => Err(item.error(format!(
            "Unsupported attribute `{}` for {}.",
            other, TAG_JSONRPC
        ))),
    }
}

fn fill_default_format_param(item: &TagItem, param: &mut Param) -> Result<()> {
    if param.name != PARAM_FORMAT {
        return Err(item.error(format!(
            "{} found for param \"{}\", but supported only for param \"{}\".",
            ATTR_DEFAULT, param.name, PARAM_FORMAT
        )));
    }

    param.type_info.fixed = WireType::Enum;
    param.optional = true;
    param.description = DEFAULT_FORMAT_DESCRIPTION.to_string();
    let formats = [
        ("ubjson", "Universal Binary JSON data format."),
        ("json", "JSON data format."),
        ("xml", "XML data format."),
        (
            "csv",
            "CSV data format. In case of a hierarchical structure,\nonly the top level data is provided.",
        ),
    ];
    param.values.extend(formats.iter().map(|(name, description)| Value {
        name: name.to_string(),
        description: description.to_string(),
        ..Value::default()
    }));
    Ok(())
}

fn initial_token(item: &TagItem, mode: ParamMode) -> Result<String> {
    if mode == ParamMode::WithoutToken {
        return Ok(String::new());
    }
    let token = item.token();
    if token.is_empty() {
        return Err(item.error(format!("A token should follow the tag {}.", item.tag())));
    }
    Ok(token.to_string())
}

fn check_tag_once(item: &TagItem, parsed: bool, tag: &str) -> Result<bool> {
    if parsed {
        return Err(item.error(format!("More than one {} found.", tag)));
    }
    Ok(true)
}

fn check_no_attribute(item: &TagItem) -> Result<()> {
    if item.attribute().is_empty() {
        Ok(())
    } else {
        Err(invalid_attribute(item))
    }
}

fn invalid_attribute(item: &TagItem) -> crate::error::Error {
    item.error(format!(
        "The attribute {} is not allowed after the tag {}.",
        item.attribute(),
        item.tag()
    ))
}

/// Drop struct-generated params named `name`; an explicit duplicate is an error.
fn check_duplicate_param(
    item: &TagItem,
    params: &mut Vec<Param>,
    name: &str,
    owner: &str,
) -> Result<()> {
    params.retain(|p| !(p.generated_from_struct && p.name == name));
    if params.iter().any(|p| p.name == name) {
        let message = if owner.is_empty() {
            format!("Duplicate param \"{}\" found.", name)
        } else {
            format!("Duplicate param \"{}\" found in function \"{}\".", name, owner)
        };
        return Err(item.error(message));
    }
    Ok(())
}
