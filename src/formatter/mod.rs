//! Serializers of the apidoc document: the XML form read and written by the conversion
//! actions, and the OpenAPI JSON produced by the source scan.

pub mod openapi;
pub mod xml;

pub use openapi::{clean_up_description, to_openapi, OpenApiOptions};
pub use xml::{load_xml, read_xml, save_xml, write_xml};
