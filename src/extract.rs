//! @dose
//! purpose: Source scan. Walks one C++ file with a registration matcher, parses the apidoc
//!     comment right above every match, completes the functions from what the match knows
//!     (name, method, input/output types), merges struct params in and files the functions
//!     into the groups of the document.
//!
//! when-editing:
//!     - !Errors of one function carry the registration line: "file:line: message"
//!     - !A document with groups before the scan is a legacy document: functions go to the
//!       group serving their URL prefix and are not checked against the match
//!     - Functions with `%ingroup` go to the named groups instead, their name prefixed with the
//!       URL prefix of the comment
//!
//! invariants:
//!     - A group never receives two functions with the same name and method
//!     - Result chrono params are collapsed to string or integer after the merge
//!
//! gotchas:
//!     - An undocumented registration is skipped silently (debug log only)
//!     - The first function of a comment fixes the URL prefix for all its functions in a
//!       legacy document
//!
//! flows:
//!     - code-to-xml: template groups -> scan(matcher) -> functions replaced in the template
//!     - code-to-json: predefined groups -> scan per configured source -> OpenAPI

use crate::apidoc::comment::{CommentOptions, CommentParser, FunctionDescription, FunctionKind};
use crate::apidoc::tag::{parse_items, preceding_comment};
use crate::apidoc::version::{ApiVersion, UrlReplacement};
use crate::error::{Error, Location, Result};
use crate::merge::TypeMerger;
use crate::registration::{find_matches, RegistrationMatch, RegistrationMatcher};
use crate::source::SourceCode;
use crate::types::{Apidoc, Function, Param, TypeInfo, WireType};
use tracing::debug;

/// Settings of one scan.
#[derive(Debug, Clone)]
pub struct ExtractOptions<'a> {
    pub replacements: &'a [UrlReplacement],
    pub api_versions: &'a [ApiVersion],
    pub caption_len_limit: i32,
    pub group_name_len_limit: i32,
    pub unknown_param_type_is_error: bool,
    pub response_chrono_as_string: bool,
    pub kind: FunctionKind,
}

impl Default for ExtractOptions<'_> {
    fn default() -> Self {
        Self {
            replacements: &[],
            api_versions: &[],
            caption_len_limit: -1,
            group_name_len_limit: -1,
            unknown_param_type_is_error: false,
            response_chrono_as_string: true,
            kind: FunctionKind::Api,
        }
    }
}

pub struct SourceScanner<'a> {
    source: &'a SourceCode,
    merger: Option<&'a TypeMerger<'a>>,
    options: ExtractOptions<'a>,
}

impl<'a> SourceScanner<'a> {
    /// Without a merger no struct is expanded and match types are ignored.
    pub fn new(
        source: &'a SourceCode,
        merger: Option<&'a TypeMerger<'a>>,
        options: ExtractOptions<'a>,
    ) -> Self {
        Self {
            source,
            merger,
            options,
        }
    }

    /// Add the functions documented in the source to `apidoc`; returns how many were added.
    pub fn scan(&self, apidoc: &mut Apidoc, matcher: &dyn RegistrationMatcher) -> Result<usize> {
        let has_legacy_groups = !apidoc.groups.is_empty();
        let mut count = 0;
        for (line, found) in find_matches(self.source, matcher)? {
            let descriptions = self.functions_from_comment(apidoc, line)?;
            if descriptions.is_empty() {
                if found.function_name.is_some() && self.options.kind == FunctionKind::Api {
                    debug!(
                        "{}: Skipping undocumented function: {}",
                        self.source.location(line),
                        found.display_name()
                    );
                }
                continue;
            }

            let initial_url_prefix = descriptions[0].url_prefix.clone();
            for description in descriptions {
                let placement = Placement {
                    location: self.source.location(line),
                    has_legacy_groups,
                    initial_url_prefix: &initial_url_prefix,
                };
                self.process_description(apidoc, &found, &placement, description)?;
                count += 1;
            }
        }
        debug!("{}: {} functions", self.source.filename(), count);
        Ok(count)
    }

    fn functions_from_comment(
        &self,
        apidoc: &Apidoc,
        line: usize,
    ) -> Result<Vec<FunctionDescription>> {
        let Some(lines) = preceding_comment(self.source, line - 1)? else {
            return Ok(Vec::new());
        };
        let items = parse_items(&lines, &self.source.filename(), line - lines.len())?;
        let url_prefixes: Vec<String> =
            apidoc.groups.iter().map(|g| g.url_prefix.clone()).collect();
        let options = CommentOptions {
            url_prefixes: &url_prefixes,
            replacements: self.options.replacements,
            api_versions: self.options.api_versions,
            caption_len_limit: self.options.caption_len_limit,
            group_name_len_limit: self.options.group_name_len_limit,
            kind: self.options.kind,
        };
        CommentParser::new(self.merger).functions_from_items(&items, &options)
    }

    fn process_description(
        &self,
        apidoc: &mut Apidoc,
        found: &RegistrationMatch,
        placement: &Placement<'_>,
        description: FunctionDescription,
    ) -> Result<()> {
        let location = &placement.location;
        let url_prefix = description.url_prefix;
        let mut function = description.function;
        if function.method.is_empty() {
            function.method = found.method.clone().unwrap_or_default();
        }
        if function.name.is_empty() {
            function.name = found.function_name.clone().unwrap_or_default();
        }
        debug!("{} {}", function.method, function.name);

        if function.groups.is_empty()
            && placement.has_legacy_groups
            && placement.initial_url_prefix != url_prefix
        {
            return Err(Error::registration(
                location.clone(),
                format!(
                    "URL prefix differs in one apidoc comment: [{}] and [{}]",
                    placement.initial_url_prefix, url_prefix
                ),
            ));
        }
        if !placement.has_legacy_groups {
            check_function_properties(found, &function)
                .map_err(|message| Error::registration(location.clone(), message))?;
        }

        if let Some(merger) = self.merger {
            process_function_types(merger, found, &mut function)
                .map_err(|e| locate(e, location))?;
        }

        if self.options.unknown_param_type_is_error {
            let function_path = format!("{} {}/{}", function.method, url_prefix, function.name);
            let result_params = function.result.iter().flat_map(|r| r.params.iter());
            for (param, is_result) in function
                .input
                .params
                .iter()
                .map(|p| (p, false))
                .chain(result_params.map(|p| (p, true)))
            {
                if let Some(problem) = unknown_type_problem(param) {
                    return Err(Error::registration(
                        location.clone(),
                        format!(
                            "{}: {} of {}parameter \"{}\".",
                            function_path,
                            problem,
                            if is_result { "result " } else { "" },
                            param.name
                        ),
                    ));
                }
            }
        }

        if let Some(result) = function.result.as_mut() {
            for param in &mut result.params {
                param.type_info.set_fixed_chrono(self.options.response_chrono_as_string);
            }
        }

        add_to_groups(apidoc, placement, function)
    }
}

struct Placement<'p> {
    location: Location,
    has_legacy_groups: bool,
    initial_url_prefix: &'p str,
}

fn add_to_groups(apidoc: &mut Apidoc, placement: &Placement<'_>, mut function: Function) -> Result<()> {
    let location = &placement.location;
    let prefix = placement.initial_url_prefix;
    let duplicate = |function: &Function| {
        Error::registration(
            location.clone(),
            format!(
                "Duplicate function found: {}, method: {}",
                function.name, function.method
            ),
        )
    };

    if function.groups.is_empty() {
        let index = if prefix.is_empty() {
            apidoc.group_by_name("");
            apidoc.groups.iter().position(|g| g.group_name.is_empty())
        } else {
            apidoc.group_index_by_url_prefix(prefix, function.proprietary)
        };
        let Some(index) = index else {
            return Err(Error::registration(
                location.clone(),
                format!("Group not found in Apidoc: {}", prefix),
            ));
        };
        let group = &mut apidoc.groups[index];
        if group.contains(&function) {
            return Err(duplicate(&function));
        }
        group.functions.push(function);
        return Ok(());
    }

    if let Some(stripped) = prefix.strip_prefix('/') {
        function.name = format!("{}/{}", stripped, function.name);
    }
    for group_name in function.groups.clone() {
        let group = apidoc.group_by_name(&group_name);
        if group.contains(&function) {
            return Err(duplicate(&function));
        }
        group.functions.push(function.clone());
    }
    Ok(())
}

fn check_function_properties(
    found: &RegistrationMatch,
    function: &Function,
) -> std::result::Result<(), String> {
    if let Some(name) = &found.function_name {
        if !function.name.starts_with(name.as_str()) {
            return Err(format!(
                "Function name in Apidoc Comment \"{}\" does not match C++ code \"{}\"",
                function.name, name
            ));
        }
    }
    if let Some(method) = &found.method {
        if &function.method != method {
            return Err(format!(
                "Function method in Apidoc Comment \"{}\" does not match C++ code \"{}\"",
                function.method, method
            ));
        }
    }
    Ok(())
}

fn process_function_types(
    merger: &TypeMerger<'_>,
    found: &RegistrationMatch,
    function: &mut Function,
) -> Result<()> {
    if let Some(input_type) = &found.input_type {
        let type_info = &mut function.input.type_info;
        if type_info.name.is_none() {
            type_info.fill_from_name(input_type).map_err(Error::Type)?;
            if type_info.fixed == WireType::Uuid {
                set_id_param_uuid(&mut function.input.params);
            }
        }
    }

    if let Some(output_type) = &found.output_type {
        let result = function.result_mut();
        if result.type_info.name.is_none() {
            result
                .type_info
                .fill_from_name(output_type)
                .map_err(Error::Type)?;
        }
    }

    merger.merge_function(function)?;

    if function.input.optional {
        for param in &mut function.input.params {
            if param.generated_from_struct {
                param.optional = true;
            }
        }
    }
    Ok(())
}

/// A function taking a bare id gets a single uuid `id` param.
fn set_id_param_uuid(params: &mut Vec<Param>) {
    match params.iter_mut().find(|p| p.name == "id") {
        Some(param) => param.type_info.fixed = WireType::Uuid,
        None => {
            let mut param = Param::named("id");
            param.type_info = TypeInfo::fixed(WireType::Uuid);
            params.insert(0, param);
        }
    }
}

fn unknown_type_problem(param: &Param) -> Option<String> {
    if param.is_ref {
        return None;
    }
    let type_info = &param.type_info;
    if let Some(value) = &type_info.map_value_type {
        return (value.fixed == WireType::Unknown).then(|| "unknown map value type".to_string());
    }
    if let Some(variants) = &type_info.variant_value_types {
        return variants
            .iter()
            .find(|v| v.fixed == WireType::Unknown)
            .map(|v| format!("unknown variant value type `{}`", v.name_or_empty()));
    }
    (type_info.fixed == WireType::Unknown).then(|| "unknown type".to_string())
}

/// Prefix unlocated merge and type errors with the registration line.
fn locate(error: Error, location: &Location) -> Error {
    match error {
        Error::Merge(message) | Error::Type(message) => Error::registration(location.clone(), message),
        other => other,
    }
}
