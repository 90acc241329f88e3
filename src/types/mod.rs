//! Core data types: wire types, inferred C++ type info and the apidoc document model.

pub mod apidoc;
pub mod type_info;
pub mod wire;

pub use apidoc::{
    Apidoc, Function, FunctionInput, FunctionResult, Group, JsonRpcExt, Param, Value,
};
pub use type_info::TypeInfo;
pub use wire::WireType;
