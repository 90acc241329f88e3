//! @dose
//! purpose: The closed set of wire types every C++ type spelling is reduced to. The camelCase
//!     spelling is what appears in XML `type` elements and in `%param:label` overrides.
//!
//! invariants:
//!     - Unknown is the default and is never written to XML
//!     - as_str and FromStr are exact inverses
//!
//! gotchas:
//!     - An empty label parses as Unknown, any other unrecognized label is an error

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireType {
    #[default]
    Unknown,
    String,
    Boolean,
    Integer,
    Enum,
    Float,
    Uuid,
    /// Inner object.
    Object,
    /// List of objects.
    Array,
    /// Parameter without value.
    Option,
    /// Combination of flags separated with `|`.
    Flags,
    StringArray,
    UuidArray,
    /// String with a JSON object inside.
    ObjectJson,
    /// String with a JSON array inside.
    ArrayJson,
    Base64,
    /// Raw text in a result.
    Text,
    /// Raw binary data in a result.
    Binary,
    Any,
}

impl WireType {
    pub const ALL: [WireType; 19] = [
        WireType::Unknown,
        WireType::String,
        WireType::Boolean,
        WireType::Integer,
        WireType::Enum,
        WireType::Float,
        WireType::Uuid,
        WireType::Object,
        WireType::Array,
        WireType::Option,
        WireType::Flags,
        WireType::StringArray,
        WireType::UuidArray,
        WireType::ObjectJson,
        WireType::ArrayJson,
        WireType::Base64,
        WireType::Text,
        WireType::Binary,
        WireType::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WireType::Unknown => "unknown",
            WireType::String => "string",
            WireType::Boolean => "boolean",
            WireType::Integer => "integer",
            WireType::Enum => "enum",
            WireType::Float => "float",
            WireType::Uuid => "uuid",
            WireType::Object => "object",
            WireType::Array => "array",
            WireType::Option => "option",
            WireType::Flags => "flags",
            WireType::StringArray => "stringArray",
            WireType::UuidArray => "uuidArray",
            WireType::ObjectJson => "objectJson",
            WireType::ArrayJson => "arrayJson",
            WireType::Base64 => "base64",
            WireType::Text => "text",
            WireType::Binary => "binary",
            WireType::Any => "any",
        }
    }

    pub fn must_be_quoted_in_output(self) -> bool {
        matches!(
            self,
            WireType::Enum | WireType::Flags | WireType::String | WireType::Uuid
        )
    }

    pub fn must_be_unquoted_in_output(self) -> bool {
        matches!(
            self,
            WireType::Boolean | WireType::Integer | WireType::Option
        )
    }

    /// Array-shaped types, used to pick `.all` vs `.one` JSON-RPC suffixes.
    pub fn is_array_like(self) -> bool {
        matches!(
            self,
            WireType::Array | WireType::StringArray | WireType::UuidArray
        )
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(WireType::Unknown);
        }
        WireType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown type \"{}\"", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Parsing Tests =====

    #[test]
    fn test_camel_case_names() {
        assert_eq!(WireType::StringArray.to_string(), "stringArray");
        assert_eq!("objectJson".parse::<WireType>(), Ok(WireType::ObjectJson));
        assert_eq!("uuidArray".parse::<WireType>(), Ok(WireType::UuidArray));
    }

    #[test]
    fn test_every_name_parses_back() {
        for t in WireType::ALL {
            assert_eq!(t.as_str().parse::<WireType>(), Ok(t));
        }
    }

    #[test]
    fn test_empty_is_unknown_and_garbage_is_error() {
        assert_eq!("".parse::<WireType>(), Ok(WireType::Unknown));
        assert!("StringArray".parse::<WireType>().is_err());
    }
}
