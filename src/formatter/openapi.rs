//! @dose
//! purpose: OpenAPI 3 JSON generation from the apidoc document. Every function becomes an
//!     operation under `paths["{urlPrefix}/{name}"]`, tagged with its group; params become
//!     query/path parameters or request body properties, the result becomes the `default`
//!     response schema.
//!
//! when-editing:
//!     - !Param names are paths into the schema: `a.b`, `list[].item`, `map.*.value` and
//!       variant alternatives `#0`, `#1`
//!     - !Recursive params are emitted as `$ref` to `components/schemas/{Type}`, filled after
//!       all plain params so the referenced schema is complete
//!     - The template's key order is kept (serde_json preserve_order)
//!
//! invariants:
//!     - Unused params and values never reach the output
//!     - Proprietary enum values are dropped unless keep_proprietary_values is set
//!     - With required_group_name_len_limit >= 0 every group must match a template tag and
//!       every template tag must be used
//!
//! gotchas:
//!     - Object-typed query params get a `content` schema; their fields are also spelled out
//!       as HTML in the parameter description
//!     - An explicit `_orderBy` input param disables the generated one
//!     - `[immutable]` params are optional; they are also read-only in results and in GET
//!       and PATCH inputs
//!     - An `%example` that doesn't parse as its wire type is an error, while an enum value
//!       used as example falls back to a string

use crate::apidoc::{PARAM_ALL, PARAM_ORDER_BY, PARAM_SUBSCRIBE};
use crate::error::{Error, Result};
use crate::types::type_info::MAP_KEY_PLACEHOLDER;
use crate::types::{Apidoc, Function, Group, Param, TypeInfo, WireType};
use serde_json::{json, Map, Value as Json};
use std::collections::HashSet;

const CDATA_BEGIN: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";
const FIELD_INDENT: &str = "&nbsp;&nbsp;&nbsp;&nbsp;";
const LINE_BREAK: &str = "</br>\n";
const UUID_EXAMPLE: &str = "89abcdef-0123-4567-89ab-cdef01234567";

#[derive(Debug, Clone)]
pub struct OpenApiOptions {
    /// Negative: tags are created from groups; otherwise the template must predefine them.
    pub required_group_name_len_limit: i32,
    pub generate_order_by_parameters: bool,
    pub jsonrpc: bool,
    pub keep_proprietary_values: bool,
}

impl Default for OpenApiOptions {
    fn default() -> Self {
        Self {
            required_group_name_len_limit: -1,
            generate_order_by_parameters: false,
            jsonrpc: false,
            keep_proprietary_values: false,
        }
    }
}

// ===== JSON helpers =====

fn as_map(json: &mut Json) -> &mut Map<String, Json> {
    if !json.is_object() {
        *json = Json::Object(Map::new());
    }
    match json {
        Json::Object(map) => map,
        _ => unreachable!("replaced by an object above"),
    }
}

/// Child object under `key`, created when missing.
fn object<'a>(json: &'a mut Json, key: &str) -> &'a mut Json {
    let child = as_map(json)
        .entry(key)
        .or_insert_with(|| Json::Object(Map::new()));
    if !child.is_object() {
        *child = Json::Object(Map::new());
    }
    child
}

fn array<'a>(json: &'a mut Json, key: &str) -> &'a mut Vec<Json> {
    let child = as_map(json).entry(key).or_insert_with(|| Json::Array(Vec::new()));
    if !child.is_array() {
        *child = Json::Array(Vec::new());
    }
    match child {
        Json::Array(items) => items,
        _ => unreachable!("replaced by an array above"),
    }
}

fn put(json: &mut Json, key: &str, value: impl Into<Json>) {
    as_map(json).insert(key.to_string(), value.into());
}

fn str_of<'a>(json: &'a Json, key: &str) -> &'a str {
    json.get(key).and_then(Json::as_str).unwrap_or("")
}

/// Move the value under `key` out of `json`, leaving its slot in place.
fn take(json: &mut Json, key: &str) -> Json {
    as_map(json)
        .get_mut(key)
        .map(std::mem::take)
        .unwrap_or(Json::Null)
}

fn json_schema<'a>(json: &'a mut Json, content_type: &str) -> &'a mut Json {
    object(object(object(json, "content"), content_type), "schema")
}

// ===== Param paths =====

fn split_path(path: &str) -> (&str, &str) {
    match path.find('.') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => (path, ""),
    }
}

fn strip_array(item: &str) -> (&str, bool) {
    match item.strip_suffix("[]") {
        Some(name) => (name, true),
        None => (item, false),
    }
}

fn one_of_schema<'a>(schema: &'a mut Json, item: &str) -> Result<&'a mut Json> {
    let (item, is_array) = strip_array(item);
    let index: usize = item[1..]
        .parse()
        .map_err(|_| Error::OpenApi(format!("Invalid variant alternative \"{}\".", item)))?;
    let one_of = array(schema, "oneOf");
    while one_of.len() <= index {
        one_of.push(Json::Object(Map::new()));
    }
    let alternative = &mut one_of[index];
    Ok(if is_array {
        object(alternative, "items")
    } else {
        alternative
    })
}

fn additional_properties_schema<'a>(schema: &'a mut Json, item: &str) -> &'a mut Json {
    let schema = object(schema, "additionalProperties");
    if item.ends_with("[]") {
        object(schema, "items")
    } else {
        schema
    }
}

/// Schema node of the param at `path`, created along the way.
fn param_by_path<'a>(schema: &'a mut Json, path: &str) -> Result<&'a mut Json> {
    let (item, rest) = split_path(path);
    if item.starts_with('#') {
        let alternative = one_of_schema(schema, item)?;
        return if rest.is_empty() {
            Ok(alternative)
        } else {
            param_by_path(alternative, rest)
        };
    }
    if schema.get("type").is_none() {
        put(schema, "type", "object");
    }
    if item.starts_with(MAP_KEY_PLACEHOLDER) {
        let values = additional_properties_schema(schema, item);
        return if rest.is_empty() {
            Ok(values)
        } else {
            param_by_path(values, rest)
        };
    }
    let (name, is_array) = strip_array(item);
    let field = object(object(schema, "properties"), name);
    if rest.is_empty() {
        return Ok(field);
    }
    let next = if is_array { object(field, "items") } else { field };
    param_by_path(next, rest)
}

fn set_required(schema: &mut Json, path: &str) -> Result<()> {
    let (item, rest) = split_path(path);
    if item.starts_with('#') {
        let alternative = one_of_schema(schema, item)?;
        return if rest.is_empty() {
            Ok(())
        } else {
            set_required(alternative, rest)
        };
    }
    if item.starts_with(MAP_KEY_PLACEHOLDER) {
        if rest.is_empty() {
            return Ok(());
        }
        return set_required(additional_properties_schema(schema, item), rest);
    }
    let (name, is_array) = strip_array(item);
    if rest.is_empty() {
        let required = array(schema, "required");
        if !required.iter().any(|r| r.as_str() == Some(name)) {
            required.push(Json::from(name));
        }
        return Ok(());
    }
    let field = object(object(schema, "properties"), name);
    let next = if is_array { object(field, "items") } else { field };
    set_required(next, rest)
}

// ===== Schema types =====

fn fill_wire_type(schema: &mut Json, fixed: WireType, fill_default_example: bool) {
    match fixed {
        WireType::Unknown | WireType::Any => {}
        WireType::ObjectJson
        | WireType::ArrayJson
        | WireType::Text
        | WireType::String
        | WireType::Enum
        | WireType::Flags => {
            put(schema, "type", "string");
            if fill_default_example && fixed == WireType::String {
                put(schema, "example", "");
            }
        }
        WireType::Option => {
            array(schema, "enum").push(Json::from("true"));
            put(schema, "type", "boolean");
        }
        WireType::Boolean => put(schema, "type", "boolean"),
        WireType::Integer => put(schema, "type", "integer"),
        WireType::Float => put(schema, "type", "number"),
        WireType::Uuid => {
            put(schema, "type", "string");
            put(schema, "format", "uuid");
            put(schema, "example", UUID_EXAMPLE);
        }
        WireType::Object => put(schema, "type", "object"),
        WireType::Array => {
            put(schema, "type", "array");
            object(schema, "items");
        }
        WireType::StringArray => {
            put(schema, "type", "array");
            let items = object(schema, "items");
            put(items, "type", "string");
            if fill_default_example {
                put(items, "example", "");
            }
        }
        WireType::UuidArray => {
            put(schema, "type", "array");
            let items = object(schema, "items");
            put(items, "type", "string");
            put(items, "format", "uuid");
        }
        WireType::Base64 => {
            put(schema, "type", "string");
            put(schema, "format", "byte");
        }
        WireType::Binary => {
            put(schema, "type", "string");
            put(schema, "format", "binary");
        }
    }
}

fn fill_type_info(schema: &mut Json, type_info: &TypeInfo, fill_default_example: bool) {
    if let Some(variants) = &type_info.variant_value_types {
        let schema = if type_info.fixed == WireType::Array {
            put(schema, "type", "array");
            object(schema, "items")
        } else {
            schema
        };
        if type_info.can_be_null {
            put(schema, "nullable", true);
        }
        let one_of = array(schema, "oneOf");
        for (index, variant) in variants.iter().enumerate() {
            let mut alternative = Json::Object(Map::new());
            fill_type_info(&mut alternative, variant, fill_default_example);
            if index < one_of.len() {
                one_of[index] = alternative;
            } else {
                one_of.push(alternative);
            }
        }
        return;
    }
    if let Some(value) = &type_info.map_value_type {
        let schema = if type_info.fixed == WireType::Array {
            put(schema, "type", "array");
            object(schema, "items")
        } else {
            schema
        };
        fill_type_info(
            object(schema, "additionalProperties"),
            value,
            fill_default_example,
        );
        fill_map_key(schema, type_info);
        return;
    }
    if type_info.is_chrono() && type_info.fixed == WireType::Array {
        put(schema, "type", "array");
        put(object(schema, "items"), "type", "integer");
        return;
    }
    fill_wire_type(schema, type_info.fixed, fill_default_example);
    if type_info.fixed == WireType::Object {
        fill_map_key(schema, type_info);
    }
}

/// JSON keys are strings; uuid and integer keys are described by `propertyNames`.
fn fill_map_key(schema: &mut Json, type_info: &TypeInfo) {
    let Some(key) = &type_info.map_key_type else {
        return;
    };
    match key.fixed {
        WireType::Uuid => put(object(schema, "propertyNames"), "format", "uuid"),
        WireType::Integer => put(object(schema, "propertyNames"), "pattern", "^-?[0-9]+$"),
        _ => {}
    }
}

fn needs_example(param: &Param) -> bool {
    if param.unused
        || param.is_ref
        || param.proprietary
        || param.deprecated
        || param.readonly
        || param.optional
    {
        return false;
    }
    if param.type_info.map_value_type.is_some() || param.type_info.variant_value_types.is_some() {
        return false;
    }
    !matches!(
        param.fixed(),
        WireType::Unknown | WireType::Boolean | WireType::Array | WireType::Object
    )
}

fn parse_example(type_info: &TypeInfo, text: &str, owner: &str) -> Result<Json> {
    type_info
        .parse_example(text)
        .map_err(|e| Error::OpenApi(format!("{} of {}", e, owner)))
}

fn immutable_input(param: &Param, method: &str) -> Param {
    let mut param = param.clone();
    if param.immutable {
        param.optional = true;
        param.readonly |= matches!(method, "GET" | "PATCH");
    }
    param
}

fn immutable_output(param: &Param) -> Param {
    let mut param = param.clone();
    if param.immutable {
        param.optional = true;
        param.readonly = true;
    }
    param
}

/// Remove CDATA wrappers, which are allowed only inside `<pre>` blocks.
pub fn clean_up_description(description: &str) -> Result<String> {
    let mut result = description.trim().to_string();
    while let Some(begin) = result.find(CDATA_BEGIN) {
        let body_start = begin + CDATA_BEGIN.len();
        let Some(end) = result[body_start..].find(CDATA_END).map(|pos| body_start + pos) else {
            return Err(Error::OpenApi(format!(
                "Unterminated CDATA section in description:\n```\n{}\n```\n",
                description
            )));
        };
        let after = end + CDATA_END.len();
        let pre_begin = result.find("<pre>");
        let pre_closed = result[after..].contains("</pre>");
        if pre_begin.map_or(true, |pre| pre > begin) || !pre_closed {
            return Err(Error::OpenApi(format!(
                "Found CDATA not inside <pre></pre> element in description:\n```\n{}\n```\n",
                description
            )));
        }
        result = format!(
            "{}{}{}",
            &result[..begin],
            &result[body_start..end],
            &result[after..]
        );
    }
    Ok(result)
}

fn describe(
    proprietary: bool,
    description: &str,
    deprecated: bool,
    deprecated_description: &str,
) -> Result<String> {
    let mut result = String::new();
    if proprietary {
        result.push_str("<p><b>Proprietary.</b></p>");
    }
    if deprecated {
        let cleaned = clean_up_description(deprecated_description)?;
        if cleaned.is_empty() {
            result.push_str("<p><b>Deprecated.</b></p>");
        } else {
            result.push_str(&format!("<p><b>Deprecated.</b> {}</p>", cleaned));
        }
    }
    result.push_str(&clean_up_description(description)?);
    Ok(result)
}

// ===== Field descriptions of object query params =====

fn is_simple_type(name: &str) -> bool {
    name.is_empty()
        || name.starts_with("boolean")
        || name.starts_with("integer")
        || name.starts_with("number")
        || name == "string"
        || name.starts_with("string ")
        || name.starts_with("string($uuid)")
        || name.starts_with("one of ")
}

fn type_name(schema: &Json) -> String {
    if let Some(values) = schema.get("additionalProperties") {
        let name = type_name(values);
        return if is_simple_type(&name) && !name.is_empty() {
            format!("{} map", name)
        } else {
            "map".to_string()
        };
    }
    if let Some(Json::Array(one_of)) = schema.get("oneOf") {
        let names: Vec<String> = one_of.iter().map(type_name).collect();
        if names.is_empty() || names.iter().any(|n| !is_simple_type(n)) {
            return "one of".to_string();
        }
        return format!("one of [{}]", names.join(", "));
    }
    let kind = str_of(schema, "type");
    if kind == "array" {
        let name = schema.get("items").map(type_name).unwrap_or_default();
        return if is_simple_type(&name) && !name.is_empty() {
            format!("{} array", name)
        } else {
            "array".to_string()
        };
    }
    if kind == "string" {
        if schema.get("enum").is_some() {
            return "string($enum)".to_string();
        }
        if str_of(schema, "format") == "uuid" {
            return "string($uuid)".to_string();
        }
    }
    kind.to_string()
}

fn fields_description(schema: &Json, indent: &str, name: &str) -> String {
    let mut result = indent.to_string();
    if !name.is_empty() {
        result.push_str(&format!("<b>{}</b>", name));
    }
    let kind = type_name(schema);
    if !kind.is_empty() {
        let separator = if name.is_empty() { "" } else { " " };
        result.push_str(&format!("{}`{}`", separator, kind));
    }
    result.push_str(LINE_BREAK);

    let original = str_of(schema, "description");
    if !original.is_empty() {
        let nested = format!("{}{}{}", LINE_BREAK, indent, FIELD_INDENT);
        let description = original.strip_prefix("<p>").unwrap_or(original);
        let description = description
            .replace('\n', &nested)
            .replace("<p>", &nested)
            .replace("</p>", &nested)
            .replace(&format!("{}{}", nested, LINE_BREAK), LINE_BREAK);
        result.push_str(&format!("{}{}{}{}", indent, FIELD_INDENT, description, LINE_BREAK));
    }
    if is_simple_type(&kind) {
        return result;
    }

    let indent = format!("{}{}", indent, FIELD_INDENT);
    if let Some(values) = schema.get("additionalProperties") {
        result.push_str(&fields_description(values, &indent, ""));
        return result;
    }
    if kind == "object" {
        if let Some(Json::Object(properties)) = schema.get("properties") {
            for (key, property) in properties {
                result.push_str(&fields_description(property, &indent, key));
            }
        }
        return result;
    }
    if kind == "array" {
        if let Some(items) = schema.get("items") {
            result.push_str(&fields_description(items, &indent, ""));
        }
        return result;
    }
    if let Some(Json::Array(one_of)) = schema.get("oneOf") {
        for alternative in one_of {
            result.push_str(&fields_description(alternative, &indent, ""));
        }
        return result;
    }
    if kind == "string($enum)" && !original.contains("Possible values are") {
        if let Some(Json::Array(values)) = schema.get("enum") {
            if !values.is_empty() {
                result.push_str(&format!("{}Possible values are:{}", indent, LINE_BREAK));
                let indent = format!("{}{}", indent, FIELD_INDENT);
                for value in values {
                    let value = value.as_str().unwrap_or_default();
                    result.push_str(&format!("{}`{}`{}", indent, value, LINE_BREAK));
                }
            }
        }
    }
    result
}

// ===== JSON-RPC =====

const SAME_RESULT: &str = "Same result.";
const SUBSCRIBE_DESCRIPTION: &str = "Same result and `update` & `delete` notifications over time.";
const UNSUBSCRIBE_DESCRIPTION: &str = "Stop over time notifications.";

/// `/rest/v2/devices/{id}` -> `rest.v2.devices`.
fn jsonrpc_path(function: &Function, path: &str) -> String {
    let mut path = path.trim_start_matches('/').to_string();
    for param in &function.input.params {
        path = path.replace(&format!("/{{{}}}", param.name), "");
    }
    path.replace("/*", "").replace('/', ".")
}

fn jsonrpc_suffix(function: &Function) -> String {
    if !function.jsonrpc.result_method.is_empty() {
        return format!(".{}", function.jsonrpc.result_method);
    }
    let suffix = match function.method.as_str() {
        "GET" => {
            let is_list = function
                .result
                .as_ref()
                .is_some_and(|r| r.type_info.fixed.is_array_like());
            if is_list {
                ".all"
            } else {
                ".one"
            }
        }
        "POST" => ".create",
        "PUT" => ".set",
        "PATCH" => ".update",
        "DELETE" => ".delete",
        _ => "",
    };
    suffix.to_string()
}

fn method_entry(name: String, description: &str) -> Json {
    let mut entry = Map::new();
    entry.insert(name, Json::from(description));
    Json::Object(entry)
}

/// `x-jsonrpc-methods`: the analog of the REST call, followed by subscribe and
/// unsubscribe methods when the function offers them.
fn jsonrpc_methods(function: &Function, path: &str) -> Option<Json> {
    let jsonrpc = &function.jsonrpc;
    if jsonrpc.unused {
        return None;
    }
    let base = jsonrpc_path(function, path);
    let suffix = jsonrpc_suffix(function);
    let description = if jsonrpc.result_description.is_empty() {
        SAME_RESULT
    } else {
        jsonrpc.result_description.as_str()
    };
    let analog = method_entry(format!("{}{}", base, suffix), description);
    let Some(subscribe) = &jsonrpc.subscribe_description else {
        return Some(analog);
    };

    let subscribe_method = if suffix == format!(".{}", PARAM_ALL) {
        PARAM_SUBSCRIBE.to_string()
    } else {
        format!("{}One", PARAM_SUBSCRIBE)
    };
    let subscribe_description = match subscribe.trim() {
        "" => SUBSCRIBE_DESCRIPTION,
        text => text,
    };
    Some(Json::Array(vec![
        analog,
        method_entry(format!("{}.{}", base, subscribe_method), subscribe_description),
        method_entry(format!("{}.unsubscribe", base), UNSUBSCRIBE_DESCRIPTION),
    ]))
}

// ===== Document =====

fn order_by_template() -> Json {
    json!({
        "name": PARAM_ORDER_BY,
        "schema": {"type": "array", "items": {"type": "string"}},
        "in": "query",
    })
}

fn fill_order_by(order_by: Option<Json>, param: &Param) -> Option<Json> {
    if matches!(
        param.fixed(),
        WireType::Array | WireType::StringArray | WireType::UuidArray | WireType::Object
    ) {
        return order_by;
    }
    if order_by.is_none() && !param.name.contains("[]") {
        return None;
    }
    let mut order_by = order_by.unwrap_or_else(order_by_template);
    array(object(object(&mut order_by, "schema"), "items"), "enum").push(json!(param.name));
    Some(order_by)
}

struct OpenApiWriter<'o> {
    options: &'o OpenApiOptions,
    components: Json,
}

/// Recursive params whose `$ref` targets are resolved once every plain param is in place.
struct PendingRef {
    type_name: String,
    recursive_path: String,
}

impl OpenApiWriter<'_> {
    fn used_values<'p>(&self, param: &'p Param) -> impl Iterator<Item = &'p crate::types::Value> {
        let keep = self.options.keep_proprietary_values;
        param
            .values
            .iter()
            .filter(move |v| !v.unused && (keep || !v.proprietary))
    }

    fn param_description(&self, param: &Param) -> Result<String> {
        let mut result = describe(
            param.proprietary,
            &param.description,
            param.deprecated,
            &param.deprecated_description,
        )?;
        if self.used_values(param).next().is_none() {
            return Ok(result);
        }
        if matches!(
            param.fixed(),
            WireType::Boolean | WireType::Enum | WireType::Flags
        ) {
            let mut has_description = false;
            for value in self.used_values(param) {
                if value.deprecated
                    || value.proprietary
                    || !describe(false, &value.description, false, "")?.is_empty()
                {
                    has_description = true;
                    break;
                }
            }
            if !has_description {
                return Ok(result);
            }
        }
        if !result.is_empty() {
            result.push_str("\n\n");
        }
        if param.fixed() == WireType::Flags {
            result.push_str("Possible values are one of or the combination by `|` of the following:");
        } else {
            result.push_str("Possible values are:");
        }
        for value in self.used_values(param) {
            result.push_str(&format!("\n- `{}`", value.name_for_description(param.fixed())));
            let description = describe(
                value.proprietary,
                &value.description,
                value.deprecated,
                &value.deprecated_description,
            )?;
            if !description.is_empty() {
                if !value.deprecated && !value.proprietary {
                    result.push(' ');
                }
                result.push_str(&description);
            }
        }
        Ok(result)
    }

    fn fill_param_schema(
        &self,
        schema: &mut Json,
        param: &Param,
        fill_default_example: bool,
    ) -> Result<()> {
        fill_type_info(schema, &param.type_info, fill_default_example);
        if !param.example.is_empty() {
            let owner = format!("param \"{}\"", param.name);
            put(schema, "example", parse_example(&param.type_info, &param.example, &owner)?);
        } else if needs_example(param) {
            if let Some(value) = param.values.iter().find(|v| !v.deprecated && !v.proprietary && !v.unused) {
                let example = param
                    .type_info
                    .parse_example(&value.name)
                    .unwrap_or_else(|_| json!(value.name));
                put(schema, "example", example);
            }
        }
        if matches!(param.fixed(), WireType::Enum | WireType::Flags) {
            let names: Vec<Json> = self.used_values(param).map(|v| json!(v.name)).collect();
            if !names.is_empty() {
                array(schema, "enum").extend(names);
            }
        }
        Ok(())
    }

    fn add_struct_param(
        &self,
        schema: &mut Json,
        param: &Param,
        name: &str,
        readonly: bool,
        fill_default_example: bool,
    ) -> Result<()> {
        let description = self.param_description(param)?;
        let parameter = param_by_path(schema, name)?;
        if !description.is_empty() {
            put(parameter, "description", description);
        }
        if param.deprecated {
            put(parameter, "deprecated", true);
        }
        if readonly {
            put(parameter, "readOnly", true);
        } else if !param.optional {
            set_required(schema, name)?;
        }
        self.fill_param_schema(param_by_path(schema, name)?, param, fill_default_example)
    }

    fn add_reference_param(&self, schema: &mut Json, param: &Param) -> Result<PendingRef> {
        let type_name = param.type_info.name_or_empty().to_string();
        let parameter = param_by_path(schema, &param.name)?;
        if param.readonly {
            put(parameter, "readOnly", true);
        }
        let reference = format!("#/components/schemas/{}", type_name);
        if param.fixed() == WireType::Array {
            put(parameter, "type", "array");
            put(object(parameter, "items"), "$ref", reference);
        } else {
            put(parameter, "$ref", reference);
        }
        if !param.optional {
            set_required(schema, &param.name)?;
        }
        let recursive = param.recursive_name.as_deref().unwrap_or("");
        let recursive = recursive.strip_suffix('.').unwrap_or(recursive);
        let recursive = recursive.strip_suffix("[]").unwrap_or(recursive);
        Ok(PendingRef {
            type_name,
            recursive_path: recursive.to_string(),
        })
    }

    fn resolve_references(&mut self, schema: &mut Json, pending: Vec<PendingRef>) -> Result<()> {
        for reference in pending {
            let target = if reference.recursive_path.is_empty() {
                &*schema
            } else {
                &*param_by_path(schema, &reference.recursive_path)?
            };
            let target = target.get("items").unwrap_or(target).clone();
            put(object(&mut self.components, "schemas"), &reference.type_name, target);
        }
        Ok(())
    }

    fn body_schema<'a>(method: &'a mut Json, function: &Function, required: bool) -> &'a mut Json {
        let request_body = object(method, "requestBody");
        if required {
            put(request_body, "required", true);
        }
        let schema = json_schema(request_body, "application/json");
        if function.input.type_info.fixed == WireType::Array {
            object(schema, "items")
        } else if function.array_params {
            put(schema, "type", "array");
            object(schema, "items")
        } else {
            schema
        }
    }

    fn fill_query_or_path_parameter(&self, method: &mut Json, param: &Param, in_path: bool) -> Result<()> {
        if param.name.contains('.') {
            let (head, rest) = split_path(&param.name);
            let (field, is_array) = strip_array(head);
            let parameters = array(method, "parameters");
            let Some(parameter) = parameters.iter_mut().find(|p| str_of(p, "name") == field) else {
                return Ok(());
            };
            as_map(parameter).remove("schema");
            let schema = json_schema(parameter, "application/json");
            let schema = if is_array || param.fixed() == WireType::Array {
                put(schema, "type", "array");
                object(schema, "items")
            } else {
                schema
            };
            return self.add_struct_param(schema, param, rest, false, true);
        }

        let mut parameter = json!({"name": param.name});
        let description = self.param_description(param)?;
        if !description.is_empty() {
            put(&mut parameter, "description", description);
        }
        if param.deprecated {
            put(&mut parameter, "deprecated", true);
        }
        if in_path {
            put(&mut parameter, "in", "path");
            put(&mut parameter, "required", true);
        } else {
            if !param.readonly && !param.optional {
                put(&mut parameter, "required", true);
            }
            put(&mut parameter, "in", "query");
        }
        let container = if param.fixed() == WireType::Object && !param.type_info.is_chrono() {
            object(object(&mut parameter, "content"), "application/json")
        } else {
            &mut parameter
        };
        self.fill_param_schema(object(container, "schema"), param, true)?;
        array(method, "parameters").push(parameter);
        Ok(())
    }

    fn fill_input_params(&mut self, method: &mut Json, function: &Function) -> Result<()> {
        let params: Vec<Param> = function
            .input
            .params
            .iter()
            .filter(|p| !p.unused)
            .map(|p| immutable_input(p, &function.method))
            .collect();
        let in_path = |param: &Param| function.name.contains(&format!("{{{}}}", param.name));

        for param in &params {
            if in_path(param) {
                self.fill_query_or_path_parameter(method, param, true)?;
                continue;
            }
            if param.is_ref {
                for reference in param.name.split(',') {
                    let known = self
                        .components
                        .get("parameters")
                        .and_then(|p| p.get(reference))
                        .is_some();
                    if !known {
                        return Err(Error::OpenApi(format!(
                            "Ref parameter '{}' is missing",
                            reference
                        )));
                    }
                    array(method, "parameters").push(
                        json!({"$ref": format!("#/components/parameters/{}", reference)}),
                    );
                }
                continue;
            }
            if function.has_body_params() {
                let schema = Self::body_schema(method, function, !param.optional);
                if param.recursive_name.is_none() {
                    self.add_struct_param(schema, param, &param.name, param.readonly, true)?;
                }
                continue;
            }
            self.fill_query_or_path_parameter(method, param, false)?;
        }

        if function.has_body_params() {
            let mut pending = Vec::new();
            for param in &params {
                if in_path(param) || param.is_ref || param.recursive_name.is_none() {
                    continue;
                }
                let schema = Self::body_schema(method, function, !param.optional);
                pending.push(self.add_reference_param(schema, param)?);
            }
            if !pending.is_empty() {
                let schema = Self::body_schema(method, function, false);
                self.resolve_references(schema, pending)?;
            }
        }

        if let Some(Json::Array(parameters)) = as_map(method).get_mut("parameters") {
            for parameter in parameters {
                let Some(schema) = parameter
                    .get("content")
                    .and_then(|c| c.get("application/json"))
                    .and_then(|c| c.get("schema"))
                else {
                    continue;
                };
                let fields = fields_description(schema, "", "");
                let mut description = str_of(parameter, "description").to_string();
                if !description.is_empty() {
                    description.push_str(LINE_BREAK);
                }
                description.push_str(&fields);
                put(parameter, "description", description);
            }
        }
        Ok(())
    }

    fn fill_result(&mut self, method: &mut Json, function: &Function, generate_order_by: bool) -> Result<()> {
        let caption = function.result.as_ref().map_or("", |r| r.caption.as_str());
        let mut order_by = None;
        {
            let default = object(object(method, "responses"), "default");
            put(default, "description", clean_up_description(caption)?);
            let Some(result) = &function.result else {
                return Ok(());
            };
            if result.type_info.fixed == WireType::Unknown {
                return Ok(());
            }
            let schema = json_schema(default, "application/json");
            fill_type_info(schema, &result.type_info, false);
            if !result.example.is_empty() {
                let owner = format!("the result of \"{}\"", function.name);
                put(schema, "example", parse_example(&result.type_info, &result.example, &owner)?);
            }
            if !matches!(result.type_info.fixed, WireType::Array | WireType::Object) {
                return Ok(());
            }
            let schema = if result.type_info.fixed == WireType::Array {
                if generate_order_by {
                    order_by = Some(order_by_template());
                }
                object(schema, "items")
            } else {
                schema
            };
            let params: Vec<Param> = result
                .params
                .iter()
                .filter(|p| !p.unused)
                .map(immutable_output)
                .collect();
            for param in &params {
                if param.recursive_name.is_none() {
                    self.add_struct_param(schema, param, &param.name, param.readonly, false)?;
                }
                if generate_order_by {
                    order_by = fill_order_by(order_by, param);
                }
            }
            let mut pending = Vec::new();
            for param in params.iter().filter(|p| p.recursive_name.is_some()) {
                pending.push(self.add_reference_param(schema, param)?);
            }
            self.resolve_references(schema, pending)?;
        }
        if let Some(order_by) = order_by {
            array(method, "parameters").push(order_by);
        }
        Ok(())
    }

    fn fill_function(&mut self, method: &mut Json, function: &Function) -> Result<()> {
        if !function.caption.is_empty() {
            put(method, "summary", function.caption.as_str());
        }
        let mut description = String::new();
        if function.deprecated {
            put(method, "deprecated", true);
            let cleaned = clean_up_description(&function.deprecated_description)?;
            if !cleaned.is_empty() {
                description.push_str(&format!("<p><b>{}</b></p>", cleaned));
            }
        }
        if function.proprietary {
            description.push_str("<p><b>Proprietary.</b></p>");
        }
        description.push_str(&clean_up_description(&function.description)?);
        if !description.is_empty() {
            put(method, "description", description);
        }
        if !function.permissions.is_empty() {
            put(method, "x-permissions", function.permissions.as_str());
        }

        let input_type = &function.input.type_info;
        if input_type.fixed != WireType::Unknown && function.has_body_params() {
            let request_body = object(method, "requestBody");
            if !function.input.optional {
                put(request_body, "required", true);
            }
            let content_type = if input_type.fixed == WireType::Binary {
                "application/octet-stream"
            } else {
                "application/json"
            };
            let schema = json_schema(request_body, content_type);
            fill_type_info(schema, input_type, true);
            if !function.input.example.is_empty() {
                let owner = format!("the input of \"{}\"", function.name);
                put(schema, "example", parse_example(input_type, &function.input.example, &owner)?);
            }
        }
        self.fill_input_params(method, function)?;

        let generate_order_by = self.options.generate_order_by_parameters
            && !function.input.params.iter().any(|p| p.name == PARAM_ORDER_BY);
        self.fill_result(method, function, generate_order_by)
    }

    /// Returns whether the group contributed any operation.
    fn fill_paths(&mut self, paths: &mut Json, group: &Group) -> Result<bool> {
        for function in &group.functions {
            let path_string = format!("{}/{}", group.url_prefix, function.name);
            let method = object(object(paths, &path_string), &function.known_method());
            self.fill_function(method, function)?;
            if self.options.jsonrpc {
                if let Some(methods) = jsonrpc_methods(function, &path_string) {
                    put(method, "x-jsonrpc-methods", methods);
                }
            }
            if !group.group_name.is_empty() {
                array(method, "tags").push(json!(group.group_name));
            }
        }
        Ok(!group.functions.is_empty())
    }
}

/// Render `apidoc` into the OpenAPI `template`; an empty document renders as an empty string.
pub fn to_openapi(apidoc: &Apidoc, template: Json, options: &OpenApiOptions) -> Result<String> {
    if apidoc.groups.is_empty() {
        return Ok(String::new());
    }
    let mut root = template;
    array(&mut root, "tags");
    let components = object(&mut root, "components");
    object(components, "parameters");
    object(components, "schemas");
    object(&mut root, "paths");

    let mut writer = OpenApiWriter {
        options,
        components: take(&mut root, "components"),
    };
    let mut paths = take(&mut root, "paths");
    let limit = options.required_group_name_len_limit;
    let mut used_tags: HashSet<String> = HashSet::new();
    for group in &apidoc.groups {
        if !writer.fill_paths(&mut paths, group)? || group.group_name.is_empty() {
            continue;
        }
        if limit > 0 && group.group_name.chars().count() > limit as usize {
            return Err(Error::OpenApi(format!(
                "Tag \"{}\" is too long.",
                group.group_name
            )));
        }
        let tags = array(&mut root, "tags");
        if tags.iter().any(|t| str_of(t, "name") == group.group_name) {
            used_tags.insert(group.group_name.clone());
            continue;
        }
        if limit >= 0 {
            return Err(Error::OpenApi(format!(
                "No predefined tag \"{}\" in Open API template.",
                group.group_name
            )));
        }
        tags.push(json!({
            "name": group.group_name,
            "description": clean_up_description(&group.group_description)?,
        }));
    }
    if limit >= 0 {
        for tag in array(&mut root, "tags").iter() {
            let name = str_of(tag, "name");
            if !name.is_empty() && !used_tags.contains(name) {
                return Err(Error::OpenApi(format!(
                    "Unused tag \"{}\" in Open API template.",
                    name
                )));
            }
        }
    }

    put(&mut root, "components", writer.components);
    put(&mut root, "paths", paths);
    let mut text = serde_json::to_string_pretty(&root).map_err(|e| Error::OpenApi(e.to_string()))?;
    if text.contains('\n') && !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}
