//! @dose
//! purpose: In-memory apidoc document: groups of functions, each with input params and an
//!     optional result. Both the XML and the OpenAPI serializers read this model, the source
//!     scan fills it and the comment injector consumes it.
//!
//! when-editing:
//!     - !Empty strings mean "missing"; no Option<String> for text fields
//!     - Internal flags (unused, generated_from_struct, has_default_description, is_ref,
//!       recursive_name) never reach XML
//!
//! invariants:
//!     - A group never holds two functions with the same name and method
//!     - Param names are path-qualified: `parent.child`, `list[].item`, `map.*.value`
//!
//! gotchas:
//!     - Value::set_name strips surrounding quotes and remembers it, so descriptions can
//!       quote the value again

use super::type_info::TypeInfo;
use super::wire::WireType;

pub const PROPRIETARY_GROUP_PREFIX: &str = "Proprietary ";

/// One admissible literal of an enum, flags or option param.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Value {
    pub name: String,
    pub description: String,
    pub proprietary: bool,
    pub deprecated: bool,
    pub deprecated_description: String,
    pub unused: bool,
    pub quotes_removed: bool,
}

impl Value {
    pub fn named(name: &str) -> Self {
        let mut value = Self::default();
        value.set_name(name);
        value
    }

    pub fn set_name(&mut self, name: &str) {
        let name = name.trim();
        if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
            self.name = name[1..name.len() - 1].to_string();
            self.quotes_removed = true;
        } else {
            self.name = name.to_string();
        }
    }

    /// Name as shown in generated descriptions, quoted where the wire value is a string.
    pub fn name_for_description(&self, fixed: WireType) -> String {
        if fixed.must_be_unquoted_in_output() {
            return self.name.clone();
        }
        if self.quotes_removed || fixed.must_be_quoted_in_output() {
            return format!("\"{}\"", self.name);
        }
        self.name.clone()
    }

    pub fn deprecated_string(&self) -> String {
        deprecated_string(self.deprecated, &self.deprecated_description)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_info: TypeInfo,
    pub description: String,
    pub optional: bool,
    pub proprietary: bool,
    pub deprecated: bool,
    pub deprecated_description: String,
    pub readonly: bool,
    /// Optional when writing; also read-only in GET and PATCH inputs and in results.
    pub immutable: bool,
    pub values: Vec<Value>,
    pub example: String,

    pub unused: bool,
    pub generated_from_struct: bool,
    pub has_default_description: bool,
    pub is_ref: bool,
    pub recursive_name: Option<String>,
}

impl Param {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn fixed(&self) -> WireType {
        self.type_info.fixed
    }

    /// Copy every field that is still unset from `origin`.
    pub fn fill_missing_fields_from(&mut self, origin: &Param) {
        self.generated_from_struct |= origin.generated_from_struct;
        self.type_info.fill_missing_type(&origin.type_info);
        self.unused |= origin.unused;
        self.has_default_description |= origin.has_default_description;
        self.proprietary |= origin.proprietary;
        if !self.deprecated {
            self.deprecated = origin.deprecated;
            if self.deprecated_description.is_empty() {
                self.deprecated_description = origin.deprecated_description.clone();
            }
        }
        self.readonly |= origin.readonly;
        self.immutable |= origin.immutable;
        if self.name.is_empty() {
            self.name = origin.name.clone();
        }
        if self.description.is_empty() {
            self.description = origin.description.clone();
        }
        self.optional |= origin.optional;
        if self.recursive_name.is_none() {
            self.recursive_name = origin.recursive_name.clone();
        }
        if self.example.is_empty() {
            self.example = origin.example.clone();
        }
        if self.values.is_empty() && !origin.values.is_empty() {
            self.values = origin.values.clone();
        }
    }

    /// Lift proprietary/deprecated to the param when every used value carries it.
    pub fn normalize_properties(&mut self) {
        if self.values.is_empty() {
            return;
        }
        let all_proprietary = self.values.iter().filter(|v| !v.unused).all(|v| v.proprietary);
        let all_deprecated = self.values.iter().filter(|v| !v.unused).all(|v| v.deprecated);
        self.proprietary |= all_proprietary;
        self.deprecated |= all_deprecated;
        if self.proprietary {
            self.values.iter_mut().for_each(|v| v.proprietary = false);
        }
        if self.deprecated {
            self.values.iter_mut().for_each(|v| v.deprecated = false);
        }
    }

    pub fn deprecated_string(&self) -> String {
        deprecated_string(self.deprecated, &self.deprecated_description)
    }
}

/// Function input: the declared type plus its params.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionInput {
    pub type_info: TypeInfo,
    pub params: Vec<Param>,
    pub unused_params: Vec<Param>,
    pub optional: bool,
    pub example: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionResult {
    pub caption: String,
    pub type_info: TypeInfo,
    pub params: Vec<Param>,
    pub unused_params: Vec<Param>,
    pub example: String,
}

/// `%jsonrpc` items of a function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonRpcExt {
    /// No JSON-RPC method for this function.
    pub unused: bool,
    /// `one` or `all`; empty derives the suffix from the HTTP method.
    pub result_method: String,
    pub result_description: String,
    /// Present when the function offers subscribe/unsubscribe methods.
    pub subscribe_description: Option<String>,
}

impl JsonRpcExt {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    pub name: String,
    pub method: String,
    pub caption: String,
    pub description: String,
    pub permissions: String,
    pub proprietary: bool,
    pub deprecated: bool,
    pub deprecated_description: String,
    pub array_params: bool,
    pub groups: Vec<String>,
    pub input: FunctionInput,
    pub result: Option<FunctionResult>,
    pub jsonrpc: JsonRpcExt,
}

impl Function {
    /// Methods whose input travels in the request body. TRACE is used as a stub method.
    pub fn has_body_params(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PUT" | "PATCH" | "TRACE")
    }

    /// Lower-cased HTTP method as an OpenAPI operation key.
    pub fn known_method(&self) -> String {
        if self.method.is_empty() {
            return "options".to_string();
        }
        let method = self.method.to_lowercase();
        match method.as_str() {
            "get" | "post" | "put" | "patch" | "delete" | "head" | "options" | "trace" => method,
            _ => "trace".to_string(),
        }
    }

    pub fn deprecated_string(&self) -> String {
        deprecated_string(self.deprecated, &self.deprecated_description)
    }

    pub fn result_mut(&mut self) -> &mut FunctionResult {
        self.result.get_or_insert_with(FunctionResult::default)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub group_name: String,
    pub url_prefix: String,
    pub group_description: String,
    pub functions: Vec<Function>,
}

impl Group {
    pub fn sort(&mut self) {
        self.functions.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn contains(&self, function: &Function) -> bool {
        self.functions
            .iter()
            .any(|f| f.name == function.name && f.method == function.method)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Apidoc {
    pub groups: Vec<Group>,
}

impl Apidoc {
    /// Group serving `url_prefix`; proprietary functions prefer a `Proprietary ` group and
    /// fall back to any group with that prefix.
    pub fn group_index_by_url_prefix(&self, url_prefix: &str, proprietary: bool) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| {
                g.url_prefix == url_prefix
                    && proprietary == g.group_name.starts_with(PROPRIETARY_GROUP_PREFIX)
            })
            .or_else(|| {
                if proprietary {
                    self.groups.iter().position(|g| g.url_prefix == url_prefix)
                } else {
                    None
                }
            })
    }

    /// Group with this name, appended (with an empty URL prefix) when missing.
    pub fn group_by_name(&mut self, name: &str) -> &mut Group {
        let index = match self.groups.iter().position(|g| g.group_name == name) {
            Some(index) => index,
            None => {
                self.groups.push(Group {
                    group_name: name.to_string(),
                    ..Group::default()
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    pub fn sort_groups(&mut self, names: &[String]) {
        for group in &mut self.groups {
            if names.contains(&group.group_name) {
                group.sort();
            }
        }
    }

    pub fn sort_all(&mut self) {
        self.groups.iter_mut().for_each(Group::sort);
    }

    /// Same groups with no functions.
    pub fn without_functions(&self) -> Apidoc {
        Apidoc {
            groups: self
                .groups
                .iter()
                .map(|g| Group {
                    functions: Vec::new(),
                    ..g.clone()
                })
                .collect(),
        }
    }

    /// Put the functions of `other` into the groups with the same name, replacing functions
    /// with the same name and method; returns the names of the groups that received any.
    pub fn replace_functions(&mut self, other: Apidoc) -> Vec<String> {
        let mut touched = Vec::new();
        for source in other.groups {
            if source.functions.is_empty() {
                continue;
            }
            let target = self.group_by_name(&source.group_name);
            if target.url_prefix.is_empty() {
                target.url_prefix = source.url_prefix.clone();
            }
            for function in source.functions {
                match target
                    .functions
                    .iter()
                    .position(|f| f.name == function.name && f.method == function.method)
                {
                    Some(index) => target.functions[index] = function,
                    None => target.functions.push(function),
                }
            }
            touched.push(source.group_name);
        }
        touched
    }
}

pub fn deprecated_string(deprecated: bool, description: &str) -> String {
    if !deprecated {
        return String::new();
    }
    if description.is_empty() {
        "<p><b>Deprecated.</b></p>".to_string()
    } else {
        format!("<p><b>Deprecated.</b> {}</p>", description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ===== Value Tests =====

    #[test]
    fn test_value_quotes_are_stripped_and_restored() {
        let value = Value::named(" \"auto\" ");
        assert_eq!(value.name, "auto");
        assert!(value.quotes_removed);
        assert_eq!(value.name_for_description(WireType::Unknown), "\"auto\"");
        assert_eq!(value.name_for_description(WireType::Integer), "auto");
        assert_eq!(Value::named("x").name_for_description(WireType::Enum), "\"x\"");
    }

    // ===== Param Tests =====

    #[test]
    fn test_fill_missing_keeps_own_fields() {
        let mut param = Param::named("id");
        param.description = "Own.".to_string();
        let mut origin = Param::named("other");
        origin.description = "Origin.".to_string();
        origin.optional = true;
        origin.type_info = TypeInfo::fixed(WireType::Uuid);
        origin.values.push(Value::named("a"));

        param.fill_missing_fields_from(&origin);
        assert_eq!(param.name, "id");
        assert_eq!(param.description, "Own.");
        assert!(param.optional);
        assert_eq!(param.fixed(), WireType::Uuid);
        assert_eq!(param.values.len(), 1);
    }

    #[test]
    fn test_fill_missing_carries_example_and_immutable() {
        let mut param = Param::named("id");
        let mut origin = Param::named("id");
        origin.immutable = true;
        origin.example = "7".to_string();
        param.fill_missing_fields_from(&origin);
        assert!(param.immutable);
        assert_eq!(param.example, "7");

        let mut own = Param::named("id");
        own.example = "8".to_string();
        own.fill_missing_fields_from(&origin);
        assert_eq!(own.example, "8");
    }

    #[test]
    fn test_normalize_lifts_all_proprietary_values() {
        let mut param = Param::named("mode");
        let mut a = Value::named("a");
        a.proprietary = true;
        let mut b = Value::named("b");
        b.proprietary = true;
        let mut c = Value::named("c");
        c.unused = true;
        param.values = vec![a, b, c];

        param.normalize_properties();
        assert!(param.proprietary);
        assert!(!param.deprecated);
        assert!(param.values.iter().all(|v| !v.proprietary));
    }

    #[test]
    fn test_normalize_keeps_mixed_values() {
        let mut param = Param::named("mode");
        let mut a = Value::named("a");
        a.deprecated = true;
        param.values = vec![a, Value::named("b")];
        param.normalize_properties();
        assert!(!param.deprecated);
        assert!(param.values[0].deprecated);
    }

    // ===== Function Tests =====

    #[test]
    fn test_known_method() {
        let mut function = Function::default();
        assert_eq!(function.known_method(), "options");
        function.method = "PATCH".to_string();
        assert_eq!(function.known_method(), "patch");
        assert!(function.has_body_params());
        function.method = "SUBSCRIBE".to_string();
        assert_eq!(function.known_method(), "trace");
    }

    #[test]
    fn test_deprecated_string() {
        assert_eq!(deprecated_string(false, "x"), "");
        assert_eq!(deprecated_string(true, ""), "<p><b>Deprecated.</b></p>");
        assert_eq!(
            deprecated_string(true, "Use v2."),
            "<p><b>Deprecated.</b> Use v2.</p>"
        );
    }

    // ===== Group Tests =====

    fn group(name: &str, prefix: &str) -> Group {
        Group {
            group_name: name.to_string(),
            url_prefix: prefix.to_string(),
            ..Group::default()
        }
    }

    #[test]
    fn test_group_by_url_prefix_prefers_proprietary() {
        let apidoc = Apidoc {
            groups: vec![
                group("System API", "/api"),
                group("Proprietary System API", "/api"),
                group("Server API", "/ec2"),
            ],
        };
        assert_eq!(apidoc.group_index_by_url_prefix("/api", false), Some(0));
        assert_eq!(apidoc.group_index_by_url_prefix("/api", true), Some(1));
        assert_eq!(apidoc.group_index_by_url_prefix("/ec2", true), Some(2));
        assert_eq!(apidoc.group_index_by_url_prefix("/rest", false), None);
    }

    #[test]
    fn test_group_by_name_creates_missing() {
        let mut apidoc = Apidoc::default();
        apidoc.group_by_name("Devices").url_prefix = "/rest/v1".to_string();
        apidoc.group_by_name("Devices");
        assert_eq!(apidoc.groups.len(), 1);
        assert_eq!(apidoc.groups[0].url_prefix, "/rest/v1");
    }

    #[test]
    fn test_sort_group_by_name() {
        let mut g = group("G", "/api");
        for name in ["b", "a", "c"] {
            g.functions.push(Function {
                name: name.to_string(),
                ..Function::default()
            });
        }
        g.sort();
        let names: Vec<_> = g.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_replace_functions_by_name_and_method() {
        let function = |name: &str, method: &str, caption: &str| Function {
            name: name.to_string(),
            method: method.to_string(),
            caption: caption.to_string(),
            ..Function::default()
        };
        let mut target = Apidoc {
            groups: vec![group("System API", "/ec2"), group("Server API", "/api")],
        };
        target.groups[0].functions = vec![
            function("saveUser", "POST", "Old"),
            function("saveUser", "GET", "Kept"),
        ];

        let mut scanned = target.without_functions();
        assert!(scanned.groups.iter().all(|g| g.functions.is_empty()));
        scanned.groups[0].functions = vec![
            function("saveUser", "POST", "New"),
            function("getUsers", "GET", "Added"),
        ];

        let touched = target.replace_functions(scanned);
        assert_eq!(touched, vec!["System API".to_string()]);
        let captions: Vec<_> = target.groups[0]
            .functions
            .iter()
            .map(|f| f.caption.as_str())
            .collect();
        assert_eq!(captions, vec!["New", "Kept", "Added"]);
        assert!(target.groups[1].functions.is_empty());
    }
}
