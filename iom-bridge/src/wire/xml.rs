//! Conversion between the JSON value model and XML documents.
//!
//! XML maps onto the JSON object model with the usual conventions:
//! `@`-prefixed keys are attributes, `#text` is the text content of an
//! element that also carries attributes, repeated sibling elements collapse
//! into an array, and a childless element decodes to its text (or to an
//! empty object when empty). Scalars render as text and are re-typed on the
//! serde layer, so numeric fields survive the stringly-typed syntax.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use super::WireError;

const ATTRIBUTE_PREFIX: char = '@';
const TEXT_KEY: &str = "#text";
const INDENT: u8 = b' ';
const INDENT_WIDTH: usize = 4;

/// Renders `body` as an XML document rooted at the element `root`.
pub(super) fn value_to_document(root: &str, body: &Value) -> Result<String, WireError> {
    let mut writer = Writer::new_with_indent(Vec::new(), INDENT, INDENT_WIDTH);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;
    write_element(&mut writer, root, body)?;
    String::from_utf8(writer.into_inner()).map_err(|err| WireError::Xml(err.to_string()))
}

/// Parses an XML document into `{ root_name: body }`.
pub(super) fn document_to_value(document: &str) -> Result<Value, WireError> {
    let mut reader = Reader::from_str(document);
    reader.trim_text(true);

    let mut open: Vec<Element> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| WireError::Xml(err.to_string()))?;
        match event {
            Event::Start(start) => open.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let (name, value) = Element::from_start(&start)?.seal();
                attach(&mut open, &mut root, name, value)?;
            }
            Event::Text(text) => {
                if let Some(current) = open.last_mut() {
                    let chunk = text
                        .unescape()
                        .map_err(|err| WireError::Xml(err.to_string()))?;
                    current.text.push_str(&chunk);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = open.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| WireError::Xml("unbalanced end tag".to_string()))?;
                let (name, value) = element.seal();
                attach(&mut open, &mut root, name, value)?;
            }
            Event::Eof => break,
            // Declarations, comments, doctypes and processing
            // instructions carry no payload data.
            _ => {}
        }
    }

    if !open.is_empty() {
        return Err(WireError::Xml("unterminated element".to_string()));
    }
    let (name, value) =
        root.ok_or_else(|| WireError::Xml("document has no root element".to_string()))?;
    let mut envelope = Map::new();
    envelope.insert(name, value);
    Ok(Value::Object(envelope))
}

/// An element whose end tag has not been seen yet.
struct Element {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, WireError> {
        let name = name_to_string(start.name().as_ref())?;
        let mut fields = Map::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| WireError::Xml(err.to_string()))?;
            let key = format!(
                "{ATTRIBUTE_PREFIX}{}",
                name_to_string(attribute.key.as_ref())?
            );
            let value = attribute
                .unescape_value()
                .map_err(|err| WireError::Xml(err.to_string()))?;
            fields.insert(key, Value::String(value.into_owned()));
        }
        Ok(Element {
            name,
            fields,
            text: String::new(),
        })
    }

    /// Collapses the finished element into its value form.
    fn seal(self) -> (String, Value) {
        let Element {
            name,
            mut fields,
            text,
        } = self;
        let value = if fields.is_empty() {
            if text.is_empty() {
                Value::Object(Map::new())
            } else {
                Value::String(text)
            }
        } else {
            if !text.is_empty() {
                fields.insert(TEXT_KEY.to_string(), Value::String(text));
            }
            Value::Object(fields)
        };
        (name, value)
    }
}

fn name_to_string(raw: &[u8]) -> Result<String, WireError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| WireError::Xml(err.to_string()))
}

/// Hangs a finished element off its parent, promoting repeated siblings to
/// an array, or installs it as the document root.
fn attach(
    open: &mut [Element],
    root: &mut Option<(String, Value)>,
    name: String,
    value: Value,
) -> Result<(), WireError> {
    if let Some(parent) = open.last_mut() {
        match parent.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                parent.fields.insert(name, value);
            }
        }
        Ok(())
    } else if root.is_none() {
        *root = Some((name, value));
        Ok(())
    } else {
        Err(WireError::Xml("multiple root elements".to_string()))
    }
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &Value,
) -> Result<(), WireError> {
    match value {
        Value::Object(fields) => write_structured(writer, name, fields),
        Value::Array(_) => Err(WireError::Xml(format!(
            "array value for `{name}` has no enclosing element"
        ))),
        // Absent optional fields are omitted entirely.
        Value::Null => Ok(()),
        scalar => {
            let text = scalar_text(scalar);
            if text.is_empty() {
                emit(writer, Event::Empty(BytesStart::new(name)))
            } else {
                emit(writer, Event::Start(BytesStart::new(name)))?;
                emit(writer, Event::Text(BytesText::new(&text)))?;
                emit(writer, Event::End(BytesEnd::new(name)))
            }
        }
    }
}

fn write_structured(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    fields: &Map<String, Value>,
) -> Result<(), WireError> {
    let mut start = BytesStart::new(name);
    for (key, value) in fields {
        if let Some(attribute) = key.strip_prefix(ATTRIBUTE_PREFIX) {
            start.push_attribute((attribute, scalar_text(value).as_str()));
        }
    }

    let text = fields.get(TEXT_KEY).map(scalar_text).unwrap_or_default();
    let children: Vec<(&String, &Value)> = fields
        .iter()
        .filter(|(key, value)| {
            !key.starts_with(ATTRIBUTE_PREFIX) && key.as_str() != TEXT_KEY && !value.is_null()
        })
        .collect();

    if text.is_empty() && children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    if !text.is_empty() {
        emit(writer, Event::Text(BytesText::new(&text)))?;
    }
    for (child_name, child_value) in children {
        match child_value {
            Value::Array(items) => {
                for item in items {
                    write_element(writer, child_name, item)?;
                }
            }
            other => write_element(writer, child_name, other)?,
        }
    }
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        structured => structured.to_string(),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), WireError> {
    writer
        .write_event(event)
        .map_err(|err| WireError::Xml(err.to_string()))
}
