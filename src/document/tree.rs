use crate::Midi2XmlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

/// Key holding the text of an element that also has attributes or children.
pub const TEXT_KEY: &str = "#text";
/// Prefix marking attribute keys.
pub const ATTRIBUTE_PREFIX: char = '@';

/// An element whose children are still being read.
struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn new(start: &BytesStart<'_>) -> Result<Self, Midi2XmlError> {
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Midi2XmlError::ParsingError(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let value = attr
                .unescape_value()
                .map_err(|e| Midi2XmlError::ParsingError(e.to_string()))?;
            fields.insert(
                format!("{ATTRIBUTE_PREFIX}{key}"),
                Value::String(value.into_owned()),
            );
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            text: String::new(),
        })
    }

    fn into_value(self) -> (String, Value) {
        let Self {
            name,
            mut fields,
            text,
        } = self;
        let value = if fields.is_empty() {
            if text.is_empty() {
                Value::Null
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

/// Repeated sibling names collapse into a list in document order.
fn insert_child(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(siblings)) => siblings.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Parse an XML document into a document tree.
///
/// Elements become objects keyed by child name, attributes become `@name`
/// keys, text-only elements become strings and empty elements become null.
/// Whitespace-only text is dropped. Nesting is handled with an explicit stack.
pub fn parse_document(xml: &str) -> Result<Value, Midi2XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut root = Map::new();
    let mut open: Vec<OpenElement> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            Midi2XmlError::ParsingError(format!(
                "XML error at position {}: {e}",
                reader.buffer_position()
            ))
        })?;
        match event {
            Event::Start(ref e) => open.push(OpenElement::new(e)?),
            Event::Empty(ref e) => {
                let (name, value) = OpenElement::new(e)?.into_value();
                let parent = open.last_mut().map_or(&mut root, |p| &mut p.fields);
                insert_child(parent, name, value);
            }
            Event::Text(e) => {
                if let Some(current) = open.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| Midi2XmlError::ParsingError(err.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = open.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                let Some(element) = open.pop() else {
                    return Err(Midi2XmlError::ParsingError(
                        "closing tag without an opening tag".to_string(),
                    ));
                };
                let (name, value) = element.into_value();
                let parent = open.last_mut().map_or(&mut root, |p| &mut p.fields);
                insert_child(parent, name, value);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(element) = open.last() {
        return Err(Midi2XmlError::ParsingError(format!(
            "unexpected end of document inside <{}>",
            element.name
        )));
    }
    if root.is_empty() {
        return Err(Midi2XmlError::ParsingError(
            "document has no root element".to_string(),
        ));
    }
    Ok(Value::Object(root))
}
