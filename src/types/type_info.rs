//! @dose
//! purpose: Type inference from C++ type spellings. A spelling such as
//!     `std::optional<std::vector<nx::Uuid>>` is consumed left to right by small extractors
//!     (map, array, variant, optional, chrono, scalar aliases) until one named type remains.
//!
//! when-editing:
//!     - !Extractors return the unconsumed tail of the spelling; callers check the next char
//!     - !Nested arrays are rejected, maps of arrays are not
//!     - Alias tables below are the single source of truth for scalar mapping
//!
//! invariants:
//!     - Inference is pure: same spelling, same TypeInfo
//!     - Stored names never contain `::`
//!     - Chrono durations keep their unit name and an integer-or-string variant until
//!       set_fixed_chrono picks one representation
//!
//! gotchas:
//!     - `FooList` means an array of `Foo`, except `QStringList`
//!     - A map whose value type is `QJsonValue` collapses to a plain object, but keeps its
//!       key type
//!     - parse_example tries variant alternatives in order; only the last one's error is
//!       reported

use super::wire::WireType;
use serde_json::Value as Json;

pub const MAP_KEY_PLACEHOLDER: &str = "*";
pub const NULL_TYPE: &str = "nullptr_t";

const ARRAY_ALIASES: [&str; 3] = ["std::vector<", "QVector<", "QList<"];
const MAP_ALIASES: [&str; 2] = ["std::map<", "QMap<"];
const VARIANT_PREFIX: &str = "std::variant<";
const OPTIONAL_PREFIX: &str = "std::optional<";

const BASIC_ALIASES: [(WireType, &[&str]); 5] = [
    (WireType::Boolean, &["bool"]),
    (WireType::Integer, &["int", "qint32", "qint16", "qint8"]),
    (WireType::Float, &["float", "qreal"]),
    (WireType::Uuid, &["QnUuid", "Uuid", "nx::Uuid"]),
    (
        WireType::String,
        &[
            "QString",
            "QnLatin1Array",
            "QByteArray",
            "qint64",
            "size_t",
            "int64_t",
            "std::string",
            "nx::utils::Url",
        ],
    ),
];

const CHRONO_SUFFIXES: [(&str, &str); 7] = [
    ("seconds", "S"),
    ("milliseconds", "Ms"),
    ("microseconds", "Us"),
    ("nanoseconds", "Ns"),
    ("minutes", "M"),
    ("hours", "H"),
    ("time_point", "Ms"),
];

/// Required field-name suffix for a chrono unit name.
pub fn chrono_suffix(unit: &str) -> Option<&'static str> {
    CHRONO_SUFFIXES
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, suffix)| *suffix)
}

/// `nx::vms::api::Foo` -> `Foo`.
pub fn remove_cpp_namespaces(name: &str) -> &str {
    name.split("::")
        .filter(|part| !part.is_empty())
        .last()
        .unwrap_or(name)
}

fn first_type(spelling: &str) -> &str {
    spelling
        .split(|c| c == '>' || c == ',' || c == ' ')
        .next()
        .unwrap_or("")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeInfo {
    pub fixed: WireType,
    pub name: Option<String>,
    pub is_std_optional: bool,
    pub can_be_null: bool,
    pub map_key_type: Option<Box<TypeInfo>>,
    pub map_value_type: Option<Box<TypeInfo>>,
    pub variant_value_types: Option<Vec<TypeInfo>>,
}

impl TypeInfo {
    pub fn fixed(fixed: WireType) -> Self {
        Self {
            fixed,
            ..Self::default()
        }
    }

    /// Infer from a C++ spelling.
    pub fn from_name(spelling: &str) -> Result<Self, String> {
        let mut info = Self::default();
        info.fill_from_name(spelling)?;
        Ok(info)
    }

    /// A label is either a wire type name or `{CppType}`.
    pub fn fill_from_label(&mut self, label: &str) -> Result<(), String> {
        if label.len() >= 2 && label.starts_with('{') && label.ends_with('}') {
            self.extract_type(&label[1..label.len() - 1])?;
            return Ok(());
        }
        self.fixed = label.parse()?;
        Ok(())
    }

    pub fn fill_from_name(&mut self, spelling: &str) -> Result<(), String> {
        self.extract_type(spelling)?;
        Ok(())
    }

    pub fn fill_missing_type(&mut self, origin: &TypeInfo) {
        if self.fixed == WireType::Unknown {
            self.fixed = origin.fixed;
        }
        if self.name.is_none() {
            self.name = origin.name.clone();
        }
        self.is_std_optional |= origin.is_std_optional;
        self.can_be_null |= origin.can_be_null;
        if self.map_key_type.is_none() {
            self.map_key_type = origin.map_key_type.clone();
        }
        if self.map_value_type.is_none() {
            self.map_value_type = origin.map_value_type.clone();
        }
        if self.variant_value_types.is_none() {
            self.variant_value_types = origin.variant_value_types.clone();
        }
    }

    pub fn is_chrono(&self) -> bool {
        self.name
            .as_deref()
            .map(|name| chrono_suffix(name).is_some())
            .unwrap_or(false)
    }

    /// Collapse a chrono duration to its wire representation.
    pub fn set_fixed_chrono(&mut self, as_string: bool) {
        if !self.is_chrono() {
            return;
        }
        self.variant_value_types = None;
        if self.fixed == WireType::Array {
            if as_string {
                self.fixed = WireType::StringArray;
            }
        } else {
            self.fixed = if as_string {
                WireType::String
            } else {
                WireType::Integer
            };
        }
    }

    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_parsed(&self) -> bool {
        self.fixed != WireType::Unknown
    }

    /// Value type of a map spelling such as `std::map<QString, Foo>`; `None` when the
    /// spelling is not a map or its values are untyped JSON.
    pub fn map_value_of(spelling: &str) -> Result<Option<TypeInfo>, String> {
        let mut info = Self::default();
        if info.extract_map_type(spelling.trim())?.is_none() {
            return Ok(None);
        }
        Ok(info.map_value_type.map(|value| *value))
    }

    /// JSON value of an `%example` text, typed by the wire type.
    pub fn parse_example(&self, text: &str) -> Result<Json, String> {
        if let Some((last, first)) = self
            .variant_value_types
            .as_deref()
            .and_then(|variants| variants.split_last())
        {
            if let Some(value) = first.iter().find_map(|v| v.parse_example(text).ok()) {
                return Ok(value);
            }
            return last.parse_example(text);
        }

        let text = text.trim();
        let invalid = |reason: String| format!("Invalid {} example `{}`: {}", self.fixed, text, reason);
        match self.fixed {
            WireType::Integer => text
                .parse::<i64>()
                .map(Json::from)
                .map_err(|e| invalid(e.to_string())),
            WireType::Float => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .ok_or_else(|| invalid("not a number".to_string())),
            WireType::Boolean => Ok(Json::Bool(text.eq_ignore_ascii_case("true"))),
            WireType::Uuid => {
                if is_uuid(text) {
                    Ok(Json::from(text.to_lowercase()))
                } else {
                    Err(invalid("not a UUID".to_string()))
                }
            }
            WireType::Array | WireType::Object | WireType::Any => {
                let value: Json = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
                match (self.fixed, &value) {
                    (WireType::Array, Json::Array(_))
                    | (WireType::Object, Json::Object(_))
                    | (WireType::Any, _) => Ok(value),
                    _ => Err(invalid(format!("expected {}", self.fixed))),
                }
            }
            _ => Ok(Json::from(text)),
        }
    }

    /// Whether the spelling is wrapped in `std::optional<...>`.
    pub fn is_optional_spelling(spelling: &str) -> bool {
        spelling.trim().starts_with(OPTIONAL_PREFIX)
    }

    fn extract_type(&mut self, spelling: &str) -> Result<String, String> {
        if let Some(rest) = self.extract_map_type(spelling)? {
            return Ok(rest);
        }
        if let Some(rest) = self.extract_array_type(spelling)? {
            return Ok(rest);
        }
        if let Some(rest) = self.extract_variant_type(spelling)? {
            return Ok(rest);
        }
        if let Some(rest) = self.extract_optional_type(spelling)? {
            return Ok(rest);
        }
        if let Some(rest) = self.extract_chrono_type(spelling) {
            return Ok(rest);
        }
        for (basic, aliases) in BASIC_ALIASES.iter() {
            if let Some(rest) = self.extract_basic_type(spelling, *basic, aliases) {
                return Ok(rest);
            }
        }

        let first = first_type(spelling);
        let check = first.trim();
        match check {
            "QJsonValue" => {
                self.fixed = if self.fixed == WireType::Unknown {
                    WireType::Any
                } else {
                    WireType::Array
                };
            }
            "QJsonObject" => {
                self.fixed = if self.fixed == WireType::Unknown {
                    WireType::Object
                } else {
                    WireType::Array
                };
            }
            "QJsonArray" => self.fixed = WireType::Array,
            "QStringList" => {
                if self.fixed == WireType::Unknown {
                    self.fixed = WireType::StringArray;
                }
            }
            _ if check.ends_with("List") => {
                self.fixed = WireType::Array;
                let item = &check[..check.len() - "List".len()];
                self.name = Some(remove_cpp_namespaces(item).to_string());
            }
            _ => self.name = Some(remove_cpp_namespaces(check).to_string()),
        }
        Ok(spelling[first.len()..].trim().to_string())
    }

    fn extract_map_type(&mut self, spelling: &str) -> Result<Option<String>, String> {
        let Some(alias) = MAP_ALIASES.iter().find(|a| spelling.starts_with(*a)) else {
            return Ok(None);
        };
        let invalid = || format!("Invalid map `{}`.", spelling);

        let mut key = TypeInfo::default();
        let next = key.extract_type(spelling[alias.len()..].trim())?;
        let next = next.trim();
        let Some(value_spelling) = next.strip_prefix(',') else {
            return Err(invalid());
        };
        self.map_key_type = Some(Box::new(key));

        let mut value = TypeInfo::default();
        let rest = value.extract_type(value_spelling.trim())?;
        let Some(rest) = rest.trim().strip_prefix('>') else {
            return Err(invalid());
        };

        if value.fixed == WireType::Any {
            self.fixed = WireType::Object;
            self.map_value_type = None;
        } else {
            self.map_value_type = Some(Box::new(value));
        }
        Ok(Some(rest.to_string()))
    }

    fn extract_array_type(&mut self, spelling: &str) -> Result<Option<String>, String> {
        let Some(alias) = ARRAY_ALIASES.iter().find(|a| spelling.starts_with(*a)) else {
            return Ok(None);
        };
        if self.fixed == WireType::Array {
            return Err(format!("Arrays of `{}` are unsupported.", spelling));
        }
        self.fixed = WireType::Array;
        let rest = self.extract_type(spelling[alias.len()..].trim())?;
        match rest.trim().strip_prefix('>') {
            Some(rest) => Ok(Some(rest.to_string())),
            None => Err(format!("Invalid array `{}`.", spelling)),
        }
    }

    fn extract_variant_type(&mut self, spelling: &str) -> Result<Option<String>, String> {
        let Some(mut next) = spelling.strip_prefix(VARIANT_PREFIX).map(|s| s.trim().to_string())
        else {
            return Ok(None);
        };

        let mut variants = Vec::new();
        loop {
            let mut variant = TypeInfo::default();
            let rest = variant.extract_type(&next)?;
            let rest = rest.trim();
            if variant.name.as_deref() == Some(NULL_TYPE) {
                self.can_be_null = true;
            } else {
                variants.push(variant);
            }
            if let Some(tail) = rest.strip_prefix(',') {
                next = tail.trim().to_string();
            } else if let Some(tail) = rest.strip_prefix('>') {
                self.variant_value_types = Some(variants);
                return Ok(Some(tail.to_string()));
            } else {
                return Err(format!("Invalid variant `{}`.", spelling));
            }
        }
    }

    fn extract_optional_type(&mut self, spelling: &str) -> Result<Option<String>, String> {
        let Some(inner) = spelling.strip_prefix(OPTIONAL_PREFIX) else {
            return Ok(None);
        };
        self.is_std_optional = true;
        let rest = self.extract_type(inner)?;
        match rest.trim().strip_prefix('>') {
            Some(rest) => Ok(Some(rest.trim().to_string())),
            None => Err(format!("Invalid optional `{}`.", spelling)),
        }
    }

    fn extract_chrono_type(&mut self, spelling: &str) -> Option<String> {
        let first = first_type(spelling);
        let check = remove_cpp_namespaces(first.trim());
        chrono_suffix(check)?;

        self.name = Some(check.to_string());
        self.variant_value_types = Some(vec![
            TypeInfo::fixed(WireType::Integer),
            TypeInfo::fixed(WireType::String),
        ]);
        self.fixed = if self.fixed == WireType::Unknown {
            WireType::Object
        } else {
            WireType::Array
        };
        Some(spelling[first.len()..].trim().to_string())
    }

    fn extract_basic_type(
        &mut self,
        spelling: &str,
        basic: WireType,
        aliases: &[&str],
    ) -> Option<String> {
        let first = first_type(spelling);
        let check = first.trim();
        if !aliases.contains(&check) {
            return None;
        }
        if self.fixed == WireType::Unknown {
            self.fixed = basic;
        } else if basic == WireType::String {
            self.fixed = WireType::StringArray;
        } else if basic == WireType::Uuid {
            self.fixed = WireType::UuidArray;
        }
        Some(spelling[first.len()..].trim().to_string())
    }
}

/// `8-4-4-4-12` hex digits.
fn is_uuid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn infer(spelling: &str) -> TypeInfo {
        TypeInfo::from_name(spelling).unwrap()
    }

    // ===== Inference Table Tests =====

    #[test]
    fn test_scalar_aliases() {
        let table = [
            ("bool", WireType::Boolean),
            ("int", WireType::Integer),
            ("qint8", WireType::Integer),
            ("qreal", WireType::Float),
            ("QnUuid", WireType::Uuid),
            ("nx::Uuid", WireType::Uuid),
            ("QString", WireType::String),
            ("qint64", WireType::String),
            ("std::string", WireType::String),
            ("QJsonObject", WireType::Object),
            ("QJsonValue", WireType::Any),
            ("QJsonArray", WireType::Array),
            ("QStringList", WireType::StringArray),
        ];
        for (spelling, expected) in table {
            let info = infer(spelling);
            assert_eq!(info.fixed, expected, "spelling: {}", spelling);
            assert_eq!(info.name, None, "spelling: {}", spelling);
        }
    }

    #[test]
    fn test_arrays() {
        let ints = infer("std::vector<int>");
        assert_eq!(ints.fixed, WireType::Array);
        assert_eq!(ints.name, None);

        assert_eq!(infer("std::vector<QString>").fixed, WireType::StringArray);
        assert_eq!(infer("QList<nx::Uuid>").fixed, WireType::UuidArray);

        let structs = infer("std::vector<nx::vms::api::ServerData>");
        assert_eq!(structs.fixed, WireType::Array);
        assert_eq!(structs.name.as_deref(), Some("ServerData"));
    }

    #[test]
    fn test_list_suffix_is_array_of_item() {
        let info = infer("nx::vms::api::CameraDataList");
        assert_eq!(info.fixed, WireType::Array);
        assert_eq!(info.name.as_deref(), Some("CameraData"));
    }

    #[test]
    fn test_nested_arrays_are_rejected() {
        let err = TypeInfo::from_name("std::vector<std::vector<int>>").unwrap_err();
        assert!(err.starts_with("Arrays of `std::vector<int>>`"), "{}", err);
    }

    #[test]
    fn test_optional_sets_flag() {
        let info = infer("std::optional<QnUuid>");
        assert_eq!(info.fixed, WireType::Uuid);
        assert!(info.is_std_optional);
    }

    #[test]
    fn test_map_value_type() {
        let info = infer("std::map<QString, int>");
        assert_eq!(
            info.map_value_type.as_deref(),
            Some(&TypeInfo::fixed(WireType::Integer))
        );

        let nested = infer("std::map<QString, std::vector<nx::vms::api::Rule>>");
        let value = nested.map_value_type.expect("map value");
        assert_eq!(value.fixed, WireType::Array);
        assert_eq!(value.name.as_deref(), Some("Rule"));
    }

    #[test]
    fn test_map_of_any_is_plain_object() {
        let info = infer("QMap<QString, QJsonValue>");
        assert_eq!(info.fixed, WireType::Object);
        assert!(info.map_value_type.is_none());
        assert_eq!(
            info.map_key_type.as_deref(),
            Some(&TypeInfo::fixed(WireType::String))
        );
    }

    #[test]
    fn test_map_key_type() {
        let info = infer("std::map<nx::Uuid, nx::vms::api::Rule>");
        assert_eq!(info.map_key_type.as_deref(), Some(&TypeInfo::fixed(WireType::Uuid)));

        let named = infer("std::map<nx::vms::api::StreamIndex, int>");
        let key = named.map_key_type.expect("map key");
        assert_eq!(key.name.as_deref(), Some("StreamIndex"));

        let mut merged = TypeInfo::default();
        merged.fill_missing_type(&infer("std::map<int, QString>"));
        assert_eq!(
            merged.map_key_type.as_deref(),
            Some(&TypeInfo::fixed(WireType::Integer))
        );
        assert!(infer("std::vector<int>").map_key_type.is_none());
    }

    #[test]
    fn test_invalid_map() {
        assert!(TypeInfo::from_name("std::map<QString>").is_err());
    }

    #[test]
    fn test_variant_with_null() {
        let info = infer("std::variant<int, QString, std::nullptr_t>");
        assert!(info.can_be_null);
        let variants = info.variant_value_types.expect("variants");
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].fixed, WireType::Integer);
        assert_eq!(variants[1].fixed, WireType::String);
    }

    #[test]
    fn test_named_type_strips_namespaces() {
        let info = infer("nx::vms::api::ServerFlags");
        assert_eq!(info.fixed, WireType::Unknown);
        assert_eq!(info.name.as_deref(), Some("ServerFlags"));
    }

    // ===== Chrono Tests =====

    #[test]
    fn test_chrono_duration() {
        let mut info = infer("std::chrono::milliseconds");
        assert!(info.is_chrono());
        assert_eq!(chrono_suffix(info.name_or_empty()), Some("Ms"));
        info.set_fixed_chrono(true);
        assert_eq!(info.fixed, WireType::String);
        assert!(info.variant_value_types.is_none());
    }

    #[test]
    fn test_chrono_array_as_integers_stays_array() {
        let mut info = infer("std::vector<std::chrono::seconds>");
        assert_eq!(info.fixed, WireType::Array);
        info.set_fixed_chrono(false);
        assert_eq!(info.fixed, WireType::Array);

        let mut as_strings = infer("std::vector<std::chrono::seconds>");
        as_strings.set_fixed_chrono(true);
        assert_eq!(as_strings.fixed, WireType::StringArray);
    }

    #[test]
    fn test_optional_chrono() {
        let info = infer("std::optional<std::chrono::hours>");
        assert!(info.is_std_optional);
        assert_eq!(info.name.as_deref(), Some("hours"));
    }

    // ===== Label Tests =====

    #[test]
    fn test_fill_from_label() {
        let mut info = TypeInfo::default();
        info.fill_from_label("stringArray").unwrap();
        assert_eq!(info.fixed, WireType::StringArray);

        let mut braced = TypeInfo::default();
        braced.fill_from_label("{std::vector<QnUuid>}").unwrap();
        assert_eq!(braced.fixed, WireType::UuidArray);

        assert!(TypeInfo::default().fill_from_label("Integer").is_err());
    }

    // ===== Example Tests =====

    #[test]
    fn test_parse_example_by_wire_type() {
        let table = [
            (WireType::Integer, " 42 ", json!(42)),
            (WireType::Float, "1.5", json!(1.5)),
            (WireType::Boolean, "TRUE", json!(true)),
            (WireType::Boolean, "no", json!(false)),
            (WireType::String, "camera 1", json!("camera 1")),
            (WireType::Enum, "auto", json!("auto")),
            (
                WireType::Uuid,
                "89ABCDEF-0123-4567-89ab-cdef01234567",
                json!("89abcdef-0123-4567-89ab-cdef01234567"),
            ),
            (WireType::Array, "[1, 2]", json!([1, 2])),
            (WireType::Object, "{\"id\": 1}", json!({"id": 1})),
            (WireType::Any, "null", json!(null)),
        ];
        for (fixed, text, expected) in table {
            let value = TypeInfo::fixed(fixed).parse_example(text).unwrap();
            assert_eq!(value, expected, "{} example: {}", fixed, text);
        }
    }

    #[test]
    fn test_parse_example_rejects_mismatch() {
        let err = TypeInfo::fixed(WireType::Integer).parse_example("ten").unwrap_err();
        assert!(err.starts_with("Invalid integer example `ten`"), "{}", err);
        assert!(TypeInfo::fixed(WireType::Uuid).parse_example("1234").is_err());
        assert!(TypeInfo::fixed(WireType::Object).parse_example("[1]").is_err());
        assert!(TypeInfo::fixed(WireType::Array).parse_example("[1").is_err());
    }

    #[test]
    fn test_parse_example_tries_variants_in_order() {
        let info = infer("std::variant<int, QString>");
        assert_eq!(info.parse_example("7").unwrap(), json!(7));
        assert_eq!(info.parse_example("seven").unwrap(), json!("seven"));

        let chrono = infer("std::chrono::seconds");
        assert_eq!(chrono.parse_example("30").unwrap(), json!(30));
    }
}
