//! @dose
//! purpose: XML form of the apidoc document (root `apidoc`, then `groups/group/functions/
//!     function/params/param/values/value` and `result`). Reading goes through a small element
//!     tree so unknown elements can be reported with their parent.
//!
//! when-editing:
//!     - !read_xml and write_xml must stay in sync: every field written is read back, so
//!       read(write(read(x))) == read(x)
//!     - !Booleans are attributes written only when true; texts are child elements written
//!       only when non-empty (except `name`)
//!     - Descriptions and captions are XML fragments and are copied verbatim when well-formed
//!
//! invariants:
//!     - `type` holds the camelCase wire type name and is omitted for unknown types
//!     - A present but empty result is written as `<result/>` so it survives a round trip
//!     - `jsonrpc` is written only when the function has `%jsonrpc` items; an empty
//!       `<subscribeDescription/>` still means "subscribe offered"
//!
//! gotchas:
//!     - A description that is not a well-formed fragment (`a < b`) is escaped on write and
//!       therefore read back in its escaped form
//!     - Internal param flags (unused, generated from struct, recursion) are never written

use crate::error::{Error, Result};
use crate::types::{
    Apidoc, Function, FunctionInput, FunctionResult, Group, JsonRpcExt, Param, Value, WireType,
};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::fs;
use std::path::Path;

const ROOT: &str = "apidoc";

/// Elements whose content is an XML fragment rather than plain text.
const INNER_XML: &[&str] = &["description", "caption", "deprecatedDescription", "groupDescription"];

const ATTR_TRUE: &str = "true";

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::Xml(e.to_string())
}

// ===== Reading =====

#[derive(Debug, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn text_of(&self, name: &str) -> String {
        self.child(name).map(|c| c.text.clone()).unwrap_or_default()
    }

    fn flag(&self, name: &str) -> Result<bool> {
        match self.attributes.iter().find(|(key, _)| key == name) {
            None => Ok(false),
            Some((_, value)) if value == "true" => Ok(true),
            Some((_, value)) if value == "false" => Ok(false),
            Some((_, value)) => Err(Error::Xml(format!(
                "Invalid boolean value \"{}\" of attribute \"{}\" in <{}>.",
                value, name, self.name
            ))),
        }
    }

    fn required_text(&self, name: &str) -> Result<String> {
        let text = self.text_of(name);
        if text.is_empty() {
            return Err(Error::Xml(format!("Missing <{}> in <{}>.", name, self.name)));
        }
        Ok(text)
    }

    /// Items of the `list` child; every item must be named `item`.
    fn list(&self, list: &str, item: &str) -> Result<Vec<&Node>> {
        let Some(list_node) = self.child(list) else {
            return Ok(Vec::new());
        };
        list_node
            .children
            .iter()
            .map(|child| {
                if child.name == item {
                    Ok(child)
                } else {
                    Err(Error::Xml(format!(
                        "Unexpected <{}> in <{}>, expected <{}>.",
                        child.name, list, item
                    )))
                }
            })
            .collect()
    }

    fn check_supported(&self, attributes: &[&str], children: &[&str]) -> Result<()> {
        if let Some((key, _)) = self
            .attributes
            .iter()
            .find(|(key, _)| !attributes.contains(&key.as_str()))
        {
            return Err(Error::Xml(format!(
                "Unsupported attribute \"{}\" in <{}>.",
                key, self.name
            )));
        }
        if let Some(child) = self
            .children
            .iter()
            .find(|c| !children.contains(&c.name.as_str()))
        {
            return Err(Error::Xml(format!(
                "Unsupported element <{}> in <{}>.",
                child.name, self.name
            )));
        }
        Ok(())
    }

    fn wire_type(&self) -> Result<WireType> {
        self.text_of("type").parse().map_err(|e: String| {
            Error::Xml(format!("{} in <{}>.", e, self.name))
        })
    }
}

fn read_element(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Node> {
    let mut node = Node::from_start(start)?;
    if INNER_XML.contains(&node.name.as_str()) {
        let raw = reader.read_text(start.name()).map_err(xml_error)?;
        node.text = raw.trim().to_string();
        return Ok(node);
    }
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => node.children.push(read_element(reader, &e)?),
            Event::Empty(e) => node.children.push(Node::from_start(&e)?),
            Event::Text(t) => node.text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) => node.text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(_) => break,
            Event::Eof => {
                return Err(Error::Xml(format!(
                    "Unexpected end of document inside <{}>.",
                    node.name
                )))
            }
            _ => {}
        }
    }
    Ok(node)
}

fn read_root(text: &str) -> Result<Node> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => return read_element(&mut reader, &e),
            Event::Empty(e) => return Node::from_start(&e),
            Event::Eof => return Err(Error::Xml("No root element found.".to_string())),
            _ => {}
        }
    }
}

pub fn read_xml(text: &str) -> Result<Apidoc> {
    let root = read_root(text)?;
    if root.name != ROOT {
        return Err(Error::Xml(format!(
            "Root element should be <{}>, found <{}>.",
            ROOT, root.name
        )));
    }
    root.check_supported(&[], &["groups"])?;
    let groups = root
        .list("groups", "group")?
        .into_iter()
        .map(read_group)
        .collect::<Result<Vec<_>>>()?;
    Ok(Apidoc { groups })
}

pub fn load_xml(path: &Path) -> Result<Apidoc> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    read_xml(&text).map_err(|e| Error::Xml(format!("{}: {}", path.display(), e)))
}

fn read_group(node: &Node) -> Result<Group> {
    node.check_supported(&[], &["groupName", "urlPrefix", "groupDescription", "functions"])?;
    let functions = node
        .list("functions", "function")?
        .into_iter()
        .map(read_function)
        .collect::<Result<Vec<_>>>()?;
    Ok(Group {
        group_name: node.required_text("groupName")?,
        url_prefix: node.text_of("urlPrefix"),
        group_description: node.text_of("groupDescription"),
        functions,
    })
}

fn read_function(node: &Node) -> Result<Function> {
    node.check_supported(
        &["proprietary", "deprecated", "arrayParams", "optional"],
        &[
            "name",
            "method",
            "caption",
            "description",
            "deprecatedDescription",
            "permissions",
            "ingroup",
            "example",
            "params",
            "result",
            "jsonrpc",
        ],
    )?;
    let params = node
        .list("params", "param")?
        .into_iter()
        .map(read_param)
        .collect::<Result<Vec<_>>>()?;
    let result = node.child("result").map(read_result).transpose()?;
    Ok(Function {
        name: node.required_text("name")?,
        method: node.text_of("method"),
        caption: node.text_of("caption"),
        description: node.text_of("description"),
        permissions: node.text_of("permissions"),
        proprietary: node.flag("proprietary")?,
        deprecated: node.flag("deprecated")?,
        deprecated_description: node.text_of("deprecatedDescription"),
        array_params: node.flag("arrayParams")?,
        groups: node
            .children
            .iter()
            .filter(|c| c.name == "ingroup")
            .map(|c| c.text.clone())
            .collect(),
        input: FunctionInput {
            params,
            optional: node.flag("optional")?,
            example: node.text_of("example"),
            ..FunctionInput::default()
        },
        result,
        jsonrpc: node.child("jsonrpc").map(read_jsonrpc).transpose()?.unwrap_or_default(),
    })
}

fn read_jsonrpc(node: &Node) -> Result<JsonRpcExt> {
    node.check_supported(
        &["unused"],
        &["resultMethod", "resultDescription", "subscribeDescription"],
    )?;
    Ok(JsonRpcExt {
        unused: node.flag("unused")?,
        result_method: node.text_of("resultMethod"),
        result_description: node.text_of("resultDescription"),
        subscribe_description: node.child("subscribeDescription").map(|c| c.text.clone()),
    })
}

fn read_result(node: &Node) -> Result<FunctionResult> {
    node.check_supported(&[], &["type", "caption", "example", "params"])?;
    let mut result = FunctionResult {
        caption: node.text_of("caption"),
        example: node.text_of("example"),
        ..FunctionResult::default()
    };
    result.type_info.fixed = node.wire_type()?;
    result.params = node
        .list("params", "param")?
        .into_iter()
        .map(read_param)
        .collect::<Result<Vec<_>>>()?;
    Ok(result)
}

fn read_param(node: &Node) -> Result<Param> {
    node.check_supported(
        &["optional", "proprietary", "deprecated", "readonly", "immutable"],
        &["name", "type", "description", "deprecatedDescription", "example", "values"],
    )?;
    let mut param = Param::named(node.required_text("name")?);
    param.type_info.fixed = node.wire_type()?;
    param.description = node.text_of("description");
    param.optional = node.flag("optional")?;
    param.proprietary = node.flag("proprietary")?;
    param.deprecated = node.flag("deprecated")?;
    param.deprecated_description = node.text_of("deprecatedDescription");
    param.readonly = node.flag("readonly")?;
    param.immutable = node.flag("immutable")?;
    param.example = node.text_of("example");
    param.values = node
        .list("values", "value")?
        .into_iter()
        .map(read_value)
        .collect::<Result<Vec<_>>>()?;
    Ok(param)
}

fn read_value(node: &Node) -> Result<Value> {
    node.check_supported(
        &["proprietary", "deprecated", "unused"],
        &["name", "description", "deprecatedDescription"],
    )?;
    let mut value = Value::named(&node.required_text("name")?);
    value.description = node.text_of("description");
    value.proprietary = node.flag("proprietary")?;
    value.deprecated = node.flag("deprecated")?;
    value.deprecated_description = node.text_of("deprecatedDescription");
    value.unused = node.flag("unused")?;
    Ok(value)
}

// ===== Writing =====

struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 4),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event).map_err(xml_error)
    }

    fn start(&mut self, name: &str, flags: &[(&str, bool)]) -> Result<()> {
        let mut start = BytesStart::new(name);
        for (key, _) in flags.iter().filter(|(_, set)| *set) {
            start.push_attribute((*key, ATTR_TRUE));
        }
        self.event(Event::Start(start))
    }

    fn empty(&mut self, name: &str) -> Result<()> {
        self.event(Event::Empty(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, name: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.start(name, &[])?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn inner_xml(&mut self, name: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.start(name, &[])?;
        if is_xml_fragment(text) {
            self.event(Event::Text(BytesText::from_escaped(text)))?;
        } else {
            self.event(Event::Text(BytesText::new(text)))?;
        }
        self.end(name)
    }

    fn wire_type(&mut self, fixed: WireType) -> Result<()> {
        if fixed == WireType::Unknown {
            return Ok(());
        }
        self.text("type", fixed.as_str())
    }

    fn finish(self) -> Result<String> {
        let mut text = String::from_utf8(self.writer.into_inner()).map_err(xml_error)?;
        text.push('\n');
        Ok(text)
    }
}

/// Whether `text` parses as element content.
fn is_xml_fragment(text: &str) -> bool {
    let wrapped = format!("<xml>{}</xml>", text);
    let mut reader = Reader::from_str(&wrapped);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return true,
            Ok(Event::Text(t)) => {
                if t.unescape().is_err() {
                    return false;
                }
            }
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

pub fn write_xml(apidoc: &Apidoc) -> Result<String> {
    let mut w = XmlWriter::new();
    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.start(ROOT, &[])?;
    w.start("groups", &[])?;
    for group in &apidoc.groups {
        write_group(&mut w, group)?;
    }
    w.end("groups")?;
    w.end(ROOT)?;
    w.finish()
}

pub fn save_xml(path: &Path, apidoc: &Apidoc) -> Result<()> {
    let text = write_xml(apidoc)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, text).map_err(|e| Error::io(path, e))
}

fn write_group(w: &mut XmlWriter, group: &Group) -> Result<()> {
    w.start("group", &[])?;
    w.text("groupName", &group.group_name)?;
    w.text("urlPrefix", &group.url_prefix)?;
    w.inner_xml("groupDescription", &group.group_description)?;
    if !group.functions.is_empty() {
        w.start("functions", &[])?;
        for function in &group.functions {
            write_function(w, function)?;
        }
        w.end("functions")?;
    }
    w.end("group")
}

fn write_function(w: &mut XmlWriter, function: &Function) -> Result<()> {
    w.start(
        "function",
        &[
            ("proprietary", function.proprietary),
            ("deprecated", function.deprecated),
            ("arrayParams", function.array_params),
            ("optional", function.input.optional),
        ],
    )?;
    w.start("name", &[])?;
    w.event(Event::Text(BytesText::new(&function.name)))?;
    w.end("name")?;
    w.text("method", &function.method)?;
    w.inner_xml("caption", &function.caption)?;
    w.inner_xml("description", &function.description)?;
    w.inner_xml("deprecatedDescription", &function.deprecated_description)?;
    w.text("permissions", &function.permissions)?;
    for group in &function.groups {
        w.text("ingroup", group)?;
    }
    w.text("example", &function.input.example)?;
    write_params(w, &function.input.params)?;
    if let Some(result) = &function.result {
        write_result(w, result)?;
    }
    if !function.jsonrpc.is_empty() {
        write_jsonrpc(w, &function.jsonrpc)?;
    }
    w.end("function")
}

fn write_jsonrpc(w: &mut XmlWriter, jsonrpc: &JsonRpcExt) -> Result<()> {
    w.start("jsonrpc", &[("unused", jsonrpc.unused)])?;
    w.text("resultMethod", &jsonrpc.result_method)?;
    w.text("resultDescription", &jsonrpc.result_description)?;
    match jsonrpc.subscribe_description.as_deref() {
        Some("") => w.empty("subscribeDescription")?,
        Some(description) => w.text("subscribeDescription", description)?,
        None => {}
    }
    w.end("jsonrpc")
}

fn write_result(w: &mut XmlWriter, result: &FunctionResult) -> Result<()> {
    if result.caption.is_empty()
        && result.type_info.fixed == WireType::Unknown
        && result.params.is_empty()
        && result.example.is_empty()
    {
        return w.empty("result");
    }
    w.start("result", &[])?;
    w.wire_type(result.type_info.fixed)?;
    w.inner_xml("caption", &result.caption)?;
    w.text("example", &result.example)?;
    write_params(w, &result.params)?;
    w.end("result")
}

fn write_params(w: &mut XmlWriter, params: &[Param]) -> Result<()> {
    if params.is_empty() {
        return Ok(());
    }
    w.start("params", &[])?;
    for param in params {
        w.start(
            "param",
            &[
                ("optional", param.optional),
                ("proprietary", param.proprietary),
                ("deprecated", param.deprecated),
                ("readonly", param.readonly),
                ("immutable", param.immutable),
            ],
        )?;
        w.text("name", &param.name)?;
        w.wire_type(param.fixed())?;
        w.inner_xml("description", &param.description)?;
        w.inner_xml("deprecatedDescription", &param.deprecated_description)?;
        w.text("example", &param.example)?;
        if !param.values.is_empty() {
            w.start("values", &[])?;
            for value in &param.values {
                write_value(w, value)?;
            }
            w.end("values")?;
        }
        w.end("param")?;
    }
    w.end("params")
}

fn write_value(w: &mut XmlWriter, value: &Value) -> Result<()> {
    w.start(
        "value",
        &[
            ("proprietary", value.proprietary),
            ("deprecated", value.deprecated),
            ("unused", value.unused),
        ],
    )?;
    w.text("name", &value.name)?;
    w.inner_xml("description", &value.description)?;
    w.inner_xml("deprecatedDescription", &value.deprecated_description)?;
    w.end("value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<apidoc>
    <groups>
        <group>
            <groupName>System API</groupName>
            <urlPrefix>/ec2</urlPrefix>
            <groupDescription>Legacy <b>system</b> functions.</groupDescription>
            <functions>
                <function proprietary="true" optional="true">
                    <name>getUsers</name>
                    <method>GET</method>
                    <caption>Users</caption>
                    <description>Read <code>all</code> users &amp; groups.</description>
                    <ingroup>Users</ingroup>
                    <params>
                        <param optional="true" immutable="true">
                            <name>kind</name>
                            <type>enum</type>
                            <description>Kind.</description>
                            <example>local</example>
                            <values>
                                <value>
                                    <name>local</name>
                                    <description>Local user.</description>
                                </value>
                                <value proprietary="true" deprecated="true">
                                    <name>"cloud"</name>
                                    <deprecatedDescription>Use local.</deprecatedDescription>
                                </value>
                            </values>
                        </param>
                    </params>
                    <result>
                        <type>array</type>
                        <caption>List of users.</caption>
                        <example>[{"id": "89abcdef-0123-4567-89ab-cdef01234567"}]</example>
                        <params>
                            <param readonly="true">
                                <name>id</name>
                                <type>uuid</type>
                            </param>
                        </params>
                    </result>
                    <jsonrpc>
                        <resultMethod>all</resultMethod>
                        <subscribeDescription/>
                    </jsonrpc>
                </function>
                <function>
                    <name>ping</name>
                    <result/>
                    <jsonrpc unused="true"/>
                </function>
            </functions>
        </group>
        <group>
            <groupName>Empty</groupName>
        </group>
    </groups>
</apidoc>
"#;

    // ===== Reading Tests =====

    #[test]
    fn test_read_document() {
        let apidoc = read_xml(DOCUMENT).unwrap();
        assert_eq!(apidoc.groups.len(), 2);
        let group = &apidoc.groups[0];
        assert_eq!(group.url_prefix, "/ec2");
        assert_eq!(group.group_description, "Legacy <b>system</b> functions.");

        let function = &group.functions[0];
        assert!(function.proprietary);
        assert!(function.input.optional);
        assert_eq!(function.description, "Read <code>all</code> users &amp; groups.");
        assert_eq!(function.groups, vec!["Users".to_string()]);

        let kind = &function.input.params[0];
        assert_eq!(kind.fixed(), WireType::Enum);
        assert!(kind.optional);
        assert!(kind.immutable);
        assert_eq!(kind.example, "local");
        assert_eq!(kind.values[1].name, "cloud");
        assert!(kind.values[1].quotes_removed);
        assert!(kind.values[1].proprietary && kind.values[1].deprecated);
        assert_eq!(kind.values[1].deprecated_description, "Use local.");

        let result = function.result.as_ref().unwrap();
        assert_eq!(result.type_info.fixed, WireType::Array);
        assert_eq!(
            result.example,
            "[{\"id\": \"89abcdef-0123-4567-89ab-cdef01234567\"}]"
        );
        assert!(result.params[0].readonly);
        assert_eq!(function.jsonrpc.result_method, "all");
        assert_eq!(function.jsonrpc.subscribe_description.as_deref(), Some(""));

        assert_eq!(group.functions[1].result, Some(FunctionResult::default()));
        assert!(group.functions[1].jsonrpc.unused);
        assert!(apidoc.groups[1].functions.is_empty());
    }

    #[test]
    fn test_unsupported_element_is_error() {
        let text = "<apidoc><groups><group><groupName>A</groupName><color/></group></groups></apidoc>";
        let err = read_xml(text).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported element <color> in <group>.");
    }

    #[test]
    fn test_invalid_type_and_flag_are_errors() {
        let text = "<apidoc><groups><group><groupName>A</groupName><functions><function>\
            <name>f</name><params><param><name>p</name><type>color</type></param></params>\
            </function></functions></group></groups></apidoc>";
        assert!(read_xml(text).unwrap_err().to_string().contains("Unknown type \"color\""));

        let text = "<apidoc><groups><group><groupName>A</groupName><functions>\
            <function proprietary=\"yes\"><name>f</name></function></functions></group></groups></apidoc>";
        assert!(read_xml(text).is_err());
    }

    #[test]
    fn test_wrong_root_and_broken_xml() {
        assert!(read_xml("<api/>").is_err());
        assert!(read_xml("<apidoc><groups>").is_err());
    }

    // ===== Writing Tests =====

    #[test]
    fn test_read_write_read_is_stable() {
        let first = read_xml(DOCUMENT).unwrap();
        let written = write_xml(&first).unwrap();
        let second = read_xml(&written).unwrap();
        assert_eq!(second, first);
        assert_eq!(write_xml(&second).unwrap(), written);
    }

    #[test]
    fn test_written_layout() {
        let written = write_xml(&read_xml(DOCUMENT).unwrap()).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<apidoc>"));
        assert!(written.contains("<function proprietary=\"true\" optional=\"true\">"));
        assert!(written.contains("<description>Read <code>all</code> users &amp; groups.</description>"));
        assert!(written.contains("<result/>"));
        assert!(written.contains("<subscribeDescription/>"));
        assert!(written.contains("<jsonrpc unused=\"true\">"));
        assert!(written.contains("<name>cloud</name>"));
        assert!(!written.contains("<type>unknown</type>"));
    }

    #[test]
    fn test_plain_text_is_escaped() {
        let mut apidoc = Apidoc::default();
        apidoc.groups.push(Group {
            group_name: "G".to_string(),
            functions: vec![Function {
                name: "f".to_string(),
                description: "a < b & c".to_string(),
                ..Function::default()
            }],
            ..Group::default()
        });
        let written = write_xml(&apidoc).unwrap();
        assert!(written.contains("<description>a &lt; b &amp; c</description>"));
        let read = read_xml(&written).unwrap();
        assert_eq!(read.groups[0].functions[0].description, "a &lt; b &amp; c");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("out/api.xml");
        let apidoc = read_xml(DOCUMENT).unwrap();
        save_xml(&path, &apidoc).unwrap();
        assert_eq!(load_xml(&path).unwrap(), apidoc);
    }
}
