//! @dose
//! purpose: Type/struct merge engine. Expands a struct into a flat list of path-qualified
//!     params (`a`, `a.b`, `list[].item`, `map.*.value`, `v.#0`) and reconciles that list with
//!     the params a function's apidoc comment declares.
//!
//! when-editing:
//!     - !The symbol table is frozen: lookups only, corrected types are written to the
//!       caller's TypeInfo
//!     - !A function-declared param wins over the struct-derived one; unset fields of the
//!       function param are filled from the struct param
//!     - Recursion stops at a struct already being expanded; such params get recursive_name
//!
//! invariants:
//!     - Struct params keep field declaration order, children right after their parent
//!     - Merging the same function twice gives identical param lists
//!     - An enum or flags param always carries the full value catalog of its enum
//!
//! gotchas:
//!     - `[unused]` params hide the struct param of the same name and every param below it
//!     - `_orderBy` survives `[unused]` so serializers can recognize and omit it
//!     - A missing struct only warns unless strict_missing_struct is set
//!
//! flows:
//!     - Comment: CommentParser -> struct_params() for `%struct` and struct-typed `%param`
//!     - Function: extract -> merge_function() for the input and the result

use crate::apidoc::comment::{param_from_items, params_from_items, ParamDirection, ParamMode};
use crate::apidoc::{
    ATTR_IMMUTABLE, ATTR_OPT, ATTR_PROPRIETARY, ATTR_READONLY, ATTR_UNUSED, PARAM_ORDER_BY,
};
use crate::error::{Error, Result};
use crate::parser::{StructInfo, SymbolTable};
use crate::types::type_info::{MAP_KEY_PLACEHOLDER, NULL_TYPE};
use crate::types::{Function, Param, TypeInfo, Value, WireType};
use std::collections::HashMap;

pub struct TypeMerger<'t> {
    table: &'t SymbolTable,
    strict_missing_struct: bool,
}

impl<'t> TypeMerger<'t> {
    pub fn new(table: &'t SymbolTable, strict_missing_struct: bool) -> Self {
        Self {
            table,
            strict_missing_struct,
        }
    }

    pub fn table(&self) -> &SymbolTable {
        self.table
    }

    /// Params of the struct (or map of structs) `type_info` names, prefixed with `prefix`.
    pub fn struct_params(
        &self,
        type_info: &mut TypeInfo,
        prefix: &str,
        direction: ParamDirection,
    ) -> Result<Vec<Param>> {
        self.table.correct_type(type_info);
        let mut overridden = Vec::new();
        let mut processed = HashMap::new();
        self.struct_to_params(prefix, type_info, direction, &mut overridden, &mut processed)
    }

    /// Description of the struct an object or array type refers to; empty when unknown.
    pub fn struct_description(&self, type_info: &TypeInfo) -> String {
        if !matches!(type_info.fixed, WireType::Object | WireType::Array) {
            return String::new();
        }
        if let Some(value) = &type_info.map_value_type {
            return self.struct_description(value);
        }
        if type_info.is_chrono() {
            return String::new();
        }
        type_info
            .name
            .as_deref()
            .and_then(|name| self.table.struct_info(name))
            .map(StructInfo::description)
            .unwrap_or_default()
    }

    /// Merge the input struct into the input params and the output struct into the result.
    pub fn merge_function(&self, function: &mut Function) -> Result<()> {
        if let Some(result) = function.result.as_mut() {
            let params = std::mem::take(&mut result.params);
            let merged =
                self.merge_struct_params(&mut result.type_info, params, &result.unused_params)?;
            result.params = merged;
            if result.caption.is_empty() {
                result.caption = self.struct_description(&result.type_info);
            }
        }

        let input = &mut function.input;
        let params = std::mem::take(&mut input.params);
        input.params = self.merge_struct_params(&mut input.type_info, params, &input.unused_params)?;
        Ok(())
    }

    fn merge_struct_params(
        &self,
        type_info: &mut TypeInfo,
        function_params: Vec<Param>,
        unused_params: &[Param],
    ) -> Result<Vec<Param>> {
        let struct_params = self.struct_params(type_info, "", ParamDirection::Input)?;
        self.check_struct_found(type_info)?;
        let struct_name = type_info.name_or_empty().to_string();

        let mut function_params = function_params;
        let mut merged: Vec<Param> = Vec::new();
        for struct_param in &struct_params {
            if struct_param.name != PARAM_ORDER_BY
                && (struct_param.unused || find_param(unused_params, &struct_param.name).is_some())
            {
                continue;
            }
            if is_under_unused(&struct_param.name, unused_params) {
                continue;
            }
            if find_param(&merged, &struct_param.name).is_some() {
                continue;
            }

            let Some(index) = function_params
                .iter()
                .position(|p| p.name == struct_param.name)
            else {
                let mut param = struct_param.clone();
                param.normalize_properties();
                merged.push(param);
                continue;
            };

            let function_param = &mut function_params[index];
            if struct_param.fixed() == WireType::Unknown
                && function_param.fixed() == WireType::Unknown
                && !struct_param.has_default_description
            {
                return Err(Error::Merge(format!(
                    "Param type not found: \"{}\" in struct \"{}\"",
                    struct_param.name, struct_name
                )));
            }
            function_param.fill_missing_fields_from(struct_param);
            function_param.normalize_properties();
            let function_param = function_param.clone();
            merged.push(function_param.clone());

            if matches!(function_param.fixed(), WireType::ObjectJson | WireType::ArrayJson) {
                merge_object_json(&function_param, &function_params, &struct_params, &mut merged);
            }
        }

        for param in &function_params {
            if find_param(&merged, &param.name).is_some() {
                continue;
            }
            if param.name == crate::apidoc::PARAM_FORMAT {
                merged.insert(0, param.clone());
                continue;
            }
            if !param.name.starts_with('_') && !struct_params.is_empty() {
                tracing::warn!(
                    "Param in function apidoc comment: \"{}\" not found in structure: {}",
                    param.name,
                    struct_name
                );
            }
            merged.push(param.clone());
        }

        if let Some(order_by) = find_param(unused_params, PARAM_ORDER_BY) {
            merged.push(order_by.clone());
        }
        Ok(merged)
    }

    fn check_struct_found(&self, type_info: &TypeInfo) -> Result<()> {
        if let Some(value) = &type_info.map_value_type {
            return self.check_struct_found(value);
        }
        if !matches!(
            type_info.fixed,
            WireType::Object | WireType::Array | WireType::Unknown
        ) || type_info.is_chrono()
        {
            return Ok(());
        }
        let Some(name) = type_info.name.as_deref().filter(|name| *name != NULL_TYPE) else {
            return Ok(());
        };
        if self.table.struct_info(name).is_some() {
            return Ok(());
        }
        let message = format!("Struct not found: {}", name);
        if self.strict_missing_struct {
            return Err(Error::Merge(message));
        }
        tracing::warn!("{}", message);
        Ok(())
    }

    /// Copy the value catalog of an enum into the param, keeping values it already documents.
    fn enum_to_param(&self, param: &mut Param, enum_name: &str) -> Result<()> {
        let Some(info) = self.table.enum_info(enum_name) else {
            return Err(Error::Merge(format!(
                "Enum not found: {} (param \"{}\")",
                enum_name, param.name
            )));
        };
        if param.description.is_empty() {
            param.description = info.description.clone();
        }
        for enum_value in &info.values {
            if param.values.iter().any(|v| v.name == enum_value.name) {
                continue;
            }
            param.values.push(Value {
                name: enum_value.name.clone(),
                description: enum_value.description.clone(),
                proprietary: enum_value.proprietary,
                deprecated: enum_value.deprecated,
                deprecated_description: enum_value.deprecated_description.clone(),
                unused: enum_value.unused,
                quotes_removed: false,
            });
        }
        Ok(())
    }

    fn struct_to_params(
        &self,
        prefix: &str,
        type_info: &TypeInfo,
        direction: ParamDirection,
        overridden: &mut Vec<Param>,
        processed: &mut HashMap<String, String>,
    ) -> Result<Vec<Param>> {
        let mut prefix = prefix.to_string();
        if type_info.fixed == WireType::Array && !prefix.is_empty() {
            prefix.push_str("[]");
        }
        if !prefix.is_empty() {
            prefix.push('.');
        }

        if let Some(variants) = &type_info.variant_value_types {
            if type_info.is_chrono() {
                return Ok(Vec::new());
            }
            prefix.push('#');
            let mut params = Vec::new();
            for (index, variant) in variants.iter().enumerate() {
                let name = format!("{}{}", prefix, index);
                let is_scalar = variant.variant_value_types.is_none()
                    && variant.map_value_type.is_none()
                    && variant.name.as_deref().map_or(true, |n| n == NULL_TYPE);
                if is_scalar {
                    let mut param = Param::named(name);
                    param.generated_from_struct = true;
                    param.type_info.fill_missing_type(variant);
                    param.optional |= variant.is_std_optional;
                    params.push(param);
                    continue;
                }
                params.extend(self.struct_to_params(
                    &name, variant, direction, overridden, processed,
                )?);
            }
            return Ok(params);
        }

        if let Some(value) = &type_info.map_value_type {
            if !matches!(value.fixed, WireType::Object | WireType::Array) {
                return Ok(Vec::new());
            }
            let name = format!("{}{}", prefix, MAP_KEY_PLACEHOLDER);
            return self.struct_to_params(&name, value, direction, overridden, processed);
        }

        let Some(type_name) = type_info.name.as_deref().filter(|n| *n != NULL_TYPE) else {
            return Ok(Vec::new());
        };
        if type_info.is_chrono() {
            return Ok(Vec::new());
        }
        let Some(info) = self.table.struct_info(type_name) else {
            return Ok(Vec::new());
        };

        let from_items = params_from_items(&info.items, &prefix, direction, ParamMode::WithToken)?;
        overridden.extend(from_items.iter().cloned());
        processed.insert(info.name.clone(), prefix.clone());
        if info.is_map {
            prefix.push_str(MAP_KEY_PLACEHOLDER);
            prefix.push('.');
        }

        let mut params = Vec::new();
        for field in &info.fields {
            let name = format!("{}{}", prefix, field.name);
            let overridden_index = overridden.iter().position(|p| p.name == name);
            if overridden_index.is_some_and(|i| overridden[i].unused) {
                continue;
            }

            let mut param = match param_from_items(&field.items, direction, ParamMode::WithoutToken)?
            {
                Some(param) => param,
                None => find_param(&from_items, &name).cloned().unwrap_or_default(),
            };
            param.generated_from_struct = true;
            param.name = name.clone();
            param.type_info.fill_missing_type(&field.type_info);
            param.optional |= field.type_info.is_std_optional;
            if let Some(param_type) = param.type_info.name.clone() {
                if matches!(param.fixed(), WireType::Enum | WireType::Flags) {
                    self.enum_to_param(&mut param, &param_type)?;
                } else {
                    param.recursive_name = processed.get(&param_type).cloned();
                    if let Some(field_struct) = self.table.struct_info(&param_type) {
                        fill_param_attributes(field_struct, &mut param);
                    }
                    if param.description.is_empty() {
                        param.description = self.struct_description(&param.type_info);
                    }
                }
            }

            let expand = param.recursive_name.is_none()
                && (matches!(param.fixed(), WireType::Object | WireType::Array)
                    || param.type_info.variant_value_types.is_some());
            let param_type = param.type_info.clone();
            match overridden_index {
                Some(index) => {
                    overridden[index].fill_missing_fields_from(&param);
                    params.push(overridden[index].clone());
                }
                None => params.push(param),
            }
            if expand {
                params.extend(self.struct_to_params(
                    &name,
                    &param_type,
                    direction,
                    overridden,
                    processed,
                )?);
            }
        }

        // Params documented on the struct without a matching field.
        for param in from_items {
            if find_param(&params, &param.name).is_none() {
                params.push(param);
            }
        }
        params.extend(
            overridden
                .iter()
                .filter(|p| p.unused && p.name == PARAM_ORDER_BY)
                .cloned(),
        );

        processed.remove(&info.name);
        Ok(params)
    }
}

fn find_param<'p>(params: &'p [Param], name: &str) -> Option<&'p Param> {
    params.iter().find(|p| p.name == name)
}

fn is_under_unused(name: &str, unused_params: &[Param]) -> bool {
    unused_params.iter().any(|unused| {
        name.starts_with(&format!("{}.", unused.name))
            || name.starts_with(&format!("{}[].", unused.name))
    })
}

/// Children of a JSON-encoded object or array param.
fn merge_object_json(
    param: &Param,
    function_params: &[Param],
    struct_params: &[Param],
    merged: &mut Vec<Param>,
) {
    let prefix = if param.fixed() == WireType::ArrayJson {
        format!("{}[].", param.name)
    } else {
        format!("{}.", param.name)
    };
    for struct_param in struct_params {
        if struct_param.name.starts_with(&prefix)
            && find_param(function_params, &struct_param.name).is_none()
            && find_param(merged, &struct_param.name).is_none()
        {
            merged.push(struct_param.clone());
        }
    }
    for function_param in function_params {
        if function_param.name.starts_with(&prefix)
            && find_param(merged, &function_param.name).is_none()
        {
            merged.push(function_param.clone());
        }
    }
}

/// Attribute of the struct's own `%apidoc` applies to every param of that struct type.
fn fill_param_attributes(info: &StructInfo, param: &mut Param) {
    match info.attribute() {
        ATTR_OPT => param.optional = true,
        ATTR_PROPRIETARY => param.proprietary = true,
        ATTR_READONLY => param.readonly = true,
        ATTR_IMMUTABLE => param.immutable = true,
        ATTR_UNUSED => param.unused = true,
        _ => {}
    }
}
