//! @dose
//! purpose: Declaration scanner for C++ headers. Three line-oriented scanners (enums, flags,
//!     structs) recover the declarations apidoc types refer to, and the symbol table builder
//!     collects them across files before freezing them into a read-only lookup.
//!
//! when-editing:
//!     - !Scanners only record what they see; renaming of nested enums, flattening of bases
//!       and type correction all happen in SymbolTableBuilder::freeze
//!     - Every scanner error carries the file and line of the declaration
//!
//! invariants:
//!     - A scan of one file never depends on what other files declare
//!     - Declarations keep source order inside a file
//!
//! gotchas:
//!     - Enums nested in a struct are seen twice: by the top-level enum scan under their own
//!       name and by the struct scan; freeze keeps only the `Owner_Name` copy
//!
//! flows:
//!     - Scan: scan_file() per header -> SymbolTableBuilder::add_file()
//!     - Freeze: SymbolTableBuilder::freeze() -> SymbolTable used by the merge engine

pub mod enums;
pub mod flags;
pub mod structs;
pub mod symbols;

use crate::apidoc::tag::TagItem;
use crate::apidoc::TAG_APIDOC;
use crate::error::{Location, Result};
use crate::source::SourceCode;
use crate::types::TypeInfo;

pub use enums::EnumScanner;
pub use flags::FlagScanner;
pub use structs::StructScanner;
pub use symbols::{ConflictPolicy, SymbolTable, SymbolTableBuilder};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub description: String,
    pub unused: bool,
    pub proprietary: bool,
    pub deprecated: bool,
    pub deprecated_description: String,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: String,
    pub description: String,
    pub values: Vec<EnumValue>,
    pub location: Location,
}

impl EnumInfo {
    /// Same name, description and used values; where it was declared does not matter.
    pub fn same_declaration(&self, other: &EnumInfo) -> bool {
        let used = |info: &EnumInfo| -> Vec<(String, String)> {
            info.values
                .iter()
                .filter(|v| !v.unused)
                .map(|v| (v.name.clone(), v.description.clone()))
                .collect()
        };
        self.name == other.name && self.description == other.description && used(self) == used(other)
    }
}

/// `Q_DECLARE_FLAGS(Flags, Enum)`: a flags type whose values come from an enum.
#[derive(Debug, Clone)]
pub struct FlagInfo {
    pub name: String,
    pub enum_name: String,
    pub description: String,
    pub location: Location,
}

impl FlagInfo {
    pub fn same_declaration(&self, other: &FlagInfo) -> bool {
        self.name == other.name
            && self.enum_name == other.enum_name
            && self.description == other.description
    }
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub type_info: TypeInfo,
    /// Apidoc comment of the field, parsed into a param only when the struct is merged.
    pub items: Vec<TagItem>,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub name: String,
    pub base_names: Vec<String>,
    pub fields: Vec<StructField>,
    pub items: Vec<TagItem>,
    /// Derived from `std::map<K, V>`: fields of `V` live under `*.`.
    pub is_map: bool,
    pub nested_enums: Vec<EnumInfo>,
    pub nested_flags: Vec<FlagInfo>,
    pub location: Location,
}

impl StructInfo {
    /// Text of the first non-blank `%apidoc` item.
    pub fn description(&self) -> String {
        self.items
            .iter()
            .filter(|item| item.tag() == TAG_APIDOC)
            .map(|item| item.full_text(0))
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default()
    }

    /// Attribute of the first `%apidoc` item, if any.
    pub fn attribute(&self) -> &str {
        self.items
            .iter()
            .find(|item| item.tag() == TAG_APIDOC)
            .map(TagItem::attribute)
            .unwrap_or("")
    }

    pub fn same_declaration(&self, other: &StructInfo) -> bool {
        let item_texts = |items: &[TagItem]| -> Vec<(String, String, String, String)> {
            items
                .iter()
                .map(|i| {
                    (
                        i.tag().to_string(),
                        i.attribute().to_string(),
                        i.label().to_string(),
                        i.full_text(0),
                    )
                })
                .collect()
        };
        self.name == other.name
            && self.base_names == other.base_names
            && self.is_map == other.is_map
            && item_texts(&self.items) == item_texts(&other.items)
            && self.fields.len() == other.fields.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| {
                a.name == b.name
                    && a.type_info == b.type_info
                    && item_texts(&a.items) == item_texts(&b.items)
            })
    }
}

/// Everything one header declares, in source order.
#[derive(Debug, Clone, Default)]
pub struct FileDeclarations {
    pub enums: Vec<EnumInfo>,
    pub flags: Vec<FlagInfo>,
    pub structs: Vec<StructInfo>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub invalid_chrono_field_suffix_is_error: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            invalid_chrono_field_suffix_is_error: true,
        }
    }
}

/// Run the three scanners over one header.
pub fn scan_file(source: &SourceCode, options: &ScanOptions) -> Result<FileDeclarations> {
    let enums = EnumScanner::new(source, 1).parse_enums()?;
    let flags = FlagScanner::new(source, 1).parse_flags()?;
    let structs = StructScanner::new(source, options.invalid_chrono_field_suffix_is_error)
        .parse_structs()?;
    tracing::debug!(
        "{}: {} enums, {} flags, {} structs",
        source.filename(),
        enums.len(),
        flags.len(),
        structs.len()
    );
    Ok(FileDeclarations {
        enums,
        flags,
        structs,
    })
}
