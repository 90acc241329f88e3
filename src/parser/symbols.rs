//! @dose
//! purpose: Symbol table of enums, flags and structs. The builder collects per-file scan
//!     results; freeze() resolves everything that needs the whole picture and yields an
//!     immutable table the merge engine reads from.
//!
//! when-editing:
//!     - !freeze() order matters: nested rename, then conflict merge, then flattening, then
//!       type correction of fields
//!     - !Lookups never mutate the table; correct_type() mutates only the caller's TypeInfo
//!
//! invariants:
//!     - After freeze every struct has no bases left: fields of ancestors come first, in
//!       base declaration order, followed by the struct's own fields
//!     - A nested enum or flags `Name` declared in struct `Owner` is stored as `Owner_Name`
//!       and fields of `Owner` referring to it are renamed accordingly
//!     - Identical re-declarations are merged silently; differing ones follow ConflictPolicy
//!
//! gotchas:
//!     - A struct whose first `%apidoc` item carries a `{Type}` label takes the fields of that
//!       type instead of its bases

use super::{EnumInfo, FileDeclarations, FlagInfo, StructField, StructInfo};
use crate::apidoc::tag::TagItem;
use crate::apidoc::TAG_APIDOC;
use crate::error::{Error, Location, Result};
use crate::types::{TypeInfo, WireType};
use serde::Deserialize;
use std::collections::BTreeMap;

/// What to do when two files declare the same name differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Log a warning and keep the later declaration.
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    files: Vec<FileDeclarations>,
    policy: ConflictPolicy,
}

impl SymbolTableBuilder {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            files: Vec::new(),
            policy,
        }
    }

    pub fn add_file(&mut self, declarations: FileDeclarations) {
        self.files.push(declarations);
    }

    pub fn freeze(self) -> Result<SymbolTable> {
        let policy = self.policy;
        let mut table = SymbolTable::default();
        for mut file in self.files {
            rename_nested(&mut file);
            for info in file.enums {
                let (name, location) = (info.name.clone(), info.location.clone());
                insert(&mut table.enums, name, info, location, "Enum", policy, EnumInfo::same_declaration)?;
            }
            for info in file.flags {
                let (name, location) = (info.name.clone(), info.location.clone());
                insert(&mut table.flags, name, info, location, "Flags", policy, FlagInfo::same_declaration)?;
            }
            for info in file.structs {
                let (name, location) = (info.name.clone(), info.location.clone());
                insert(&mut table.structs, name, info, location, "Struct", policy, StructInfo::same_declaration)?;
            }
        }

        let mut flattened = BTreeMap::new();
        let names: Vec<String> = table.structs.keys().cloned().collect();
        for name in &names {
            let mut visiting = Vec::new();
            table.flatten(name, &mut visiting, &mut flattened)?;
        }
        for (name, (fields, items)) in flattened {
            if let Some(info) = table.structs.get_mut(&name) {
                info.fields = fields;
                info.items = items;
                info.base_names.clear();
            }
        }

        let mut fields: Vec<(String, usize, TypeInfo)> = Vec::new();
        for info in table.structs.values() {
            for (index, field) in info.fields.iter().enumerate() {
                let mut type_info = field.type_info.clone();
                table.correct_type(&mut type_info);
                fields.push((info.name.clone(), index, type_info));
            }
        }
        for (name, index, type_info) in fields {
            if let Some(field) = table
                .structs
                .get_mut(&name)
                .and_then(|info| info.fields.get_mut(index))
            {
                field.type_info = type_info;
            }
        }

        tracing::debug!(
            "Symbol table: {} enums, {} flags, {} structs",
            table.enums.len(),
            table.flags.len(),
            table.structs.len()
        );
        Ok(table)
    }
}

/// Move nested enums and flags out of their structs under `Owner_Name`.
fn rename_nested(file: &mut FileDeclarations) {
    for info in &mut file.structs {
        let nested_enums = std::mem::take(&mut info.nested_enums);
        let nested_flags = std::mem::take(&mut info.nested_flags);
        let enum_names: Vec<String> = nested_enums.iter().map(|e| e.name.clone()).collect();
        let mut nested_names = enum_names.clone();
        nested_names.extend(nested_flags.iter().map(|f| f.name.clone()));
        let owned = |name: &str| format!("{}_{}", info.name, name);

        for mut nested in nested_enums {
            file.enums
                .retain(|e| !(e.name == nested.name && e.same_declaration(&nested)));
            nested.name = owned(&nested.name);
            file.enums.push(nested);
        }
        for mut nested in nested_flags {
            file.flags
                .retain(|f| !(f.name == nested.name && f.same_declaration(&nested)));
            nested.name = owned(&nested.name);
            if enum_names.contains(&nested.enum_name) {
                nested.enum_name = owned(&nested.enum_name);
            }
            file.flags.push(nested);
        }

        let renames: Vec<(usize, String)> = info
            .fields
            .iter()
            .enumerate()
            .filter_map(|(index, field)| {
                let name = field.type_info.name.as_ref()?;
                nested_names
                    .contains(name)
                    .then(|| (index, owned(name)))
            })
            .collect();
        for (index, name) in renames {
            info.fields[index].type_info.name = Some(name);
        }
    }
}

fn insert<T>(
    map: &mut BTreeMap<String, T>,
    name: String,
    info: T,
    location: Location,
    kind: &str,
    policy: ConflictPolicy,
    same: fn(&T, &T) -> bool,
) -> Result<()> {
    if let Some(existing) = map.get(&name) {
        if same(existing, &info) {
            return Ok(());
        }
        match policy {
            ConflictPolicy::Error => {
                return Err(Error::declaration(
                    location,
                    format!("{} `{}` is already declared differently.", kind, name),
                ));
            }
            ConflictPolicy::Warn => {
                tracing::warn!(
                    "{}: {} `{}` is already declared differently; using this declaration.",
                    location,
                    kind,
                    name
                );
            }
        }
    }
    map.insert(name, info);
    Ok(())
}

/// Read-only lookup of every declaration the scan found.
#[derive(Debug, Default)]
pub struct SymbolTable {
    enums: BTreeMap<String, EnumInfo>,
    flags: BTreeMap<String, FlagInfo>,
    structs: BTreeMap<String, StructInfo>,
}

impl SymbolTable {
    pub fn enum_info(&self, name: &str) -> Option<&EnumInfo> {
        self.enums.get(name)
    }

    pub fn flag_info(&self, name: &str) -> Option<&FlagInfo> {
        self.flags.get(name)
    }

    pub fn struct_info(&self, name: &str) -> Option<&StructInfo> {
        self.structs.get(name)
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumInfo> {
        self.enums.values()
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructInfo> {
        self.structs.values()
    }

    /// Struct named by the type or, for a map, by its value type.
    pub fn struct_or_map_info(&self, type_info: &TypeInfo) -> Option<&StructInfo> {
        match &type_info.map_value_type {
            Some(value) => self.struct_or_map_info(value),
            None => self.struct_info(type_info.name.as_deref()?),
        }
    }

    /// Resolve a named type to enum, flags or object.
    pub fn correct_type(&self, type_info: &mut TypeInfo) {
        if let Some(value) = type_info.map_value_type.as_deref_mut() {
            self.correct_type(value);
            if type_info.fixed == WireType::Unknown {
                type_info.fixed = WireType::Object;
            }
            return;
        }
        if let Some(variants) = type_info.variant_value_types.as_mut() {
            for variant in variants.iter_mut() {
                self.correct_type(variant);
            }
            if type_info.fixed == WireType::Unknown {
                type_info.fixed = WireType::Object;
            }
            return;
        }

        let Some(name) = type_info.name.clone() else {
            return;
        };
        if !matches!(type_info.fixed, WireType::Unknown | WireType::Array) {
            return;
        }
        let is_array = type_info.fixed == WireType::Array;
        if let Some(flag) = self.flags.get(&name) {
            type_info.fixed = if is_array {
                WireType::StringArray
            } else {
                WireType::Flags
            };
            type_info.name = Some(flag.enum_name.clone());
        } else if self.enums.contains_key(&name) {
            type_info.fixed = if is_array {
                WireType::StringArray
            } else {
                WireType::Enum
            };
        } else if self.structs.contains_key(&name) && type_info.fixed == WireType::Unknown {
            type_info.fixed = WireType::Object;
        }
    }

    fn flatten(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
        done: &mut BTreeMap<String, (Vec<StructField>, Vec<TagItem>)>,
    ) -> Result<(Vec<StructField>, Vec<TagItem>)> {
        if let Some(flat) = done.get(name) {
            return Ok(flat.clone());
        }
        let Some(info) = self.structs.get(name) else {
            return Ok((Vec::new(), Vec::new()));
        };
        if visiting.iter().any(|v| v == name) {
            return Err(Error::declaration(
                info.location.clone(),
                format!("Circular inheritance of `{}`.", name),
            ));
        }
        visiting.push(name.to_string());

        let mut fields = Vec::new();
        let mut items = info.items.clone();
        match self.overriding_type(info)? {
            Some(overriding) => {
                if !overriding.is_parsed() {
                    if let Some(target) = self.struct_or_map_info(&overriding) {
                        let target_name = target.name.clone();
                        let (target_fields, target_items) =
                            self.flatten(&target_name, visiting, done)?;
                        fields.extend(target_fields);
                        items.extend(target_items);
                    }
                }
            }
            None => {
                for base in &info.base_names {
                    let base_type = TypeInfo::from_name(base)
                        .map_err(|e| Error::declaration(info.location.clone(), e))?;
                    if base_type.is_chrono() {
                        continue;
                    }
                    let Some(base_info) = self.struct_or_map_info(&base_type) else {
                        return Err(Error::declaration(
                            info.location.clone(),
                            format!(
                                "Base structure `{}` of `{}` not found.",
                                base_type.name_or_empty(),
                                name
                            ),
                        ));
                    };
                    let base_name = base_info.name.clone();
                    let (base_fields, base_items) = self.flatten(&base_name, visiting, done)?;
                    fields.extend(base_fields);
                    items.extend(base_items);
                }
            }
        }
        fields.extend(info.fields.iter().cloned());

        visiting.pop();
        done.insert(name.to_string(), (fields.clone(), items.clone()));
        Ok((fields, items))
    }

    /// Type given by a label on the struct's leading `%apidoc` item.
    fn overriding_type(&self, info: &StructInfo) -> Result<Option<TypeInfo>> {
        let Some(first) = info.items.first().filter(|item| item.tag() == TAG_APIDOC) else {
            return Ok(None);
        };
        let label = first.label();
        if label.is_empty() {
            return Ok(None);
        }
        let mut type_info = TypeInfo::default();
        type_info.fill_from_label(label).map_err(|e| {
            first.error(format!(
                "Invalid overridden type \"{}\" for struct \"{}\" found: {}.",
                label, info.name, e
            ))
        })?;
        Ok(Some(type_info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{scan_file, ScanOptions};
    use crate::source::SourceCode;
    use pretty_assertions::assert_eq;

    fn declarations(name: &str, text: &str) -> FileDeclarations {
        let code = SourceCode::from_text(name, text);
        scan_file(&code, &ScanOptions::default()).unwrap()
    }

    fn table(files: &[(&str, &str)]) -> Result<SymbolTable> {
        let mut builder = SymbolTableBuilder::new(ConflictPolicy::Warn);
        for (name, text) in files {
            builder.add_file(declarations(name, text));
        }
        builder.freeze()
    }

    fn field_names(info: &StructInfo) -> Vec<&str> {
        info.fields.iter().map(|f| f.name.as_str()).collect()
    }

    // ===== Flattening Tests =====

    #[test]
    fn test_flatten_ancestors_first() {
        let table = table(&[
            ("c.h", "struct C: B\n{\n    int c;\n};\n"),
            ("a.h", "struct A\n{\n    int a;\n};\nstruct B: A\n{\n    int b;\n};\n"),
        ])
        .unwrap();
        let c = table.struct_info("C").expect("C");
        assert_eq!(field_names(c), vec!["a", "b", "c"]);
        assert!(c.base_names.is_empty());
        assert_eq!(field_names(table.struct_info("B").expect("B")), vec!["a", "b"]);
    }

    #[test]
    fn test_flatten_multiple_bases_in_order() {
        let table = table(&[(
            "m.h",
            concat!(
                "struct X {\n    int x;\n};\n",
                "struct Y {\n    int y;\n};\n",
                "struct Z: X, Y {\n    int z;\n};\n",
            ),
        )])
        .unwrap();
        assert_eq!(field_names(table.struct_info("Z").expect("Z")), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_missing_base_is_error() {
        let err = table(&[("m.h", "struct Z: Missing {\n    int z;\n};\n")]).unwrap_err();
        assert_eq!(err.to_string(), "m.h:1: Base structure `Missing` of `Z` not found.");
    }

    #[test]
    fn test_label_override_takes_fields_of_type() {
        let table = table(&[(
            "m.h",
            concat!(
                "struct Real {\n    int real;\n};\n",
                "/**%apidoc:{Real} Alias. */\n",
                "struct Alias: Ignored {\n    int own;\n};\n",
            ),
        )])
        .unwrap();
        assert_eq!(field_names(table.struct_info("Alias").expect("Alias")), vec!["real", "own"]);
    }

    // ===== Nested Rename Tests =====

    #[test]
    fn test_nested_enum_renamed_to_owner() {
        let table = table(&[(
            "s.h",
            concat!(
                "struct Server {\n",
                "    enum Kind\n",
                "    {\n",
                "        edge,\n",
                "        cloud,\n",
                "    };\n",
                "    Q_DECLARE_FLAGS(Kinds, Kind)\n",
                "    Kind kind;\n",
                "    Kinds kinds;\n",
                "};\n",
            ),
        )])
        .unwrap();
        assert!(table.enum_info("Kind").is_none());
        assert_eq!(table.enum_info("Server_Kind").expect("enum").values.len(), 2);
        assert_eq!(table.flag_info("Server_Kinds").expect("flags").enum_name, "Server_Kind");

        let server = table.struct_info("Server").expect("Server");
        assert_eq!(server.fields[0].type_info.fixed, WireType::Enum);
        assert_eq!(server.fields[0].type_info.name.as_deref(), Some("Server_Kind"));
        assert_eq!(server.fields[1].type_info.fixed, WireType::Flags);
        assert_eq!(server.fields[1].type_info.name.as_deref(), Some("Server_Kind"));
    }

    // ===== Type Correction Tests =====

    #[test]
    fn test_correct_type() {
        let table = table(&[(
            "t.h",
            concat!(
                "enum Color {\n    red,\n};\n",
                "struct Item {\n    int id;\n};\n",
                "struct Holder {\n",
                "    std::vector<Color> colors;\n",
                "    std::map<QString, Item> items;\n",
                "    Item item;\n",
                "    Unknown other;\n",
                "};\n",
            ),
        )])
        .unwrap();
        let holder = table.struct_info("Holder").expect("Holder");
        let fixed: Vec<WireType> = holder.fields.iter().map(|f| f.type_info.fixed).collect();
        assert_eq!(
            fixed,
            vec![
                WireType::StringArray,
                WireType::Object,
                WireType::Object,
                WireType::Unknown
            ]
        );
        let value = holder.fields[1].type_info.map_value_type.as_deref().expect("map");
        assert_eq!(value.fixed, WireType::Object);
    }

    // ===== Conflict Tests =====

    #[test]
    fn test_identical_redeclaration_is_silent() {
        let text = "enum Color {\n    red,\n};\n";
        let mut builder = SymbolTableBuilder::new(ConflictPolicy::Error);
        builder.add_file(declarations("a.h", text));
        builder.add_file(declarations("b.h", text));
        let table = builder.freeze().unwrap();
        assert_eq!(table.enums().count(), 1);
    }

    #[test]
    fn test_conflicting_redeclaration() {
        let mut builder = SymbolTableBuilder::new(ConflictPolicy::Error);
        builder.add_file(declarations("a.h", "enum Color {\n    red,\n};\n"));
        builder.add_file(declarations("b.h", "enum Color {\n    blue,\n};\n"));
        let err = builder.freeze().unwrap_err();
        assert_eq!(err.to_string(), "b.h:1: Enum `Color` is already declared differently.");

        let mut builder = SymbolTableBuilder::new(ConflictPolicy::Warn);
        builder.add_file(declarations("a.h", "enum Color {\n    red,\n};\n"));
        builder.add_file(declarations("b.h", "enum Color {\n    blue,\n};\n"));
        let table = builder.freeze().unwrap();
        assert_eq!(table.enum_info("Color").expect("Color").values[0].name, "blue");
    }
}
