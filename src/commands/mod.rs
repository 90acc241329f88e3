mod code_to_json;
mod code_to_xml;
mod pipeline;
mod sort_xml;
mod xml_to_code;

pub use code_to_json::*;
pub use code_to_xml::*;
pub use pipeline::*;
pub use sort_xml::*;
pub use xml_to_code::*;
