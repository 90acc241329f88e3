//! Apidoc comment language: tag lexer, doc-comment parser, comment generator and API
//! version handling.

pub mod comment;
pub mod generator;
pub mod tag;
pub mod version;

pub const TAG_APIDOC: &str = "%apidoc";
pub const TAG_CAPTION: &str = "%caption";
pub const TAG_INGROUP: &str = "%ingroup";
pub const TAG_PERMISSIONS: &str = "%permissions";
pub const TAG_PARAM: &str = "%param";
pub const TAG_VALUE: &str = "%value";
pub const TAG_RETURN: &str = "%return";
pub const TAG_STRUCT: &str = "%struct";
pub const TAG_DEPRECATED: &str = "%deprecated";
pub const TAG_ATTRIBUTE: &str = "%attribute";
pub const TAG_EXAMPLE: &str = "%example";
pub const TAG_JSONRPC: &str = "%jsonrpc";
pub const TAG_COMMENTED_OUT: &str = "%//";

pub const ATTR_PROPRIETARY: &str = "[proprietary]";
pub const ATTR_OPT: &str = "[opt]";
pub const ATTR_DEFAULT: &str = "[default]";
pub const ATTR_UNUSED: &str = "[unused]";
pub const ATTR_READONLY: &str = "[readonly]";
pub const ATTR_REF: &str = "[ref]";
pub const ATTR_IMMUTABLE: &str = "[immutable]";
pub const ATTR_RESULT: &str = "[result]";

pub const LABEL_ARRAY_PARAMS: &str = "arrayParams";

pub const PARAM_FORMAT: &str = "format";
pub const PARAM_ONE: &str = "one";
pub const PARAM_ALL: &str = "all";
pub const PARAM_SUBSCRIBE: &str = "subscribe";
pub const DEFAULT_FORMAT_DESCRIPTION: &str = "Data format. Default value is \"json\".";
/// Generated sort param; kept even when `[unused]` so JSON generation can omit it.
pub const PARAM_ORDER_BY: &str = "_orderBy";
