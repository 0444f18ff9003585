//! XML serialization of [`Element`] trees.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{DescriptorError, Element};

/// Serialize `root` as UTF-8 XML with a declaration and 2-space indentation.
///
/// Leaves are written inline (`<data_rate>640</data_rate>`); nodes with
/// neither text nor children are written self-closing.
pub fn to_string(root: &Element) -> Result<String, DescriptorError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| DescriptorError::Serialize(e.to_string()))?;
    write_element(&mut writer, root)?;

    let mut xml = String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| DescriptorError::Serialize(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &Element,
) -> Result<(), DescriptorError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if text.is_none() && element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| DescriptorError::Serialize(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| DescriptorError::Serialize(e.to_string()))?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| DescriptorError::Serialize(e.to_string()))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| DescriptorError::Serialize(e.to_string()))
}

/// Parse an XML document into its root [`Element`].
///
/// Whitespace-only text is dropped. Comments, processing instructions and
/// the declaration are ignored.
pub fn parse(xml: &str) -> Result<Element, DescriptorError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(open(&e)?),
            Ok(Event::Empty(e)) => {
                let element = open(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| DescriptorError::Parse(e.to_string()))?;
                match stack.last_mut() {
                    Some(current) => current.text.get_or_insert_with(String::new).push_str(&text),
                    None => {
                        return Err(DescriptorError::Parse(
                            "text outside the root element".into(),
                        ))
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let element = stack.pop().ok_or_else(|| {
                    DescriptorError::Parse(format!("unexpected closing tag </{name}>"))
                })?;
                if element.name != name {
                    return Err(DescriptorError::Parse(format!(
                        "mismatched closing tag </{name}> for <{}>",
                        element.name
                    )));
                }
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DescriptorError::Parse(format!(
                    "at position {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(DescriptorError::Parse(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| DescriptorError::Parse("document has no root element".into()))
}

fn open(start: &BytesStart<'_>) -> Result<Element, DescriptorError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).to_string());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DescriptorError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| DescriptorError::Parse(e.to_string()))?
            .to_string();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DescriptorError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DescriptorError::Parse("multiple root elements".into())),
    }
}
