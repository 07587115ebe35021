//! Tagged XML form of the stream protocol.
//!
//! Element and attribute names are the snake case names of [`ElementId`] and [`AttributeId`].
//! Integers are written as `0x` prefixed hex and accepted as hex or decimal. Attributes with
//! names outside the protocol are skipped on reading, unknown elements are an error.
//!
//! ```xml
//! <context_points>
//!   <context_pointset space="ram" offset="0x1000">
//!     <set name="mode" val="0x1"/>
//!   </context_pointset>
//! </context_points>
//! ```

use std::str::FromStr;

use quick_xml::{
    events::{BytesEnd, BytesStart, Event},
    Reader, Writer,
};

use crate::{
    encoding::{AttributeId, AttributeValue, Element, ElementId, MAX_DEPTH},
    Result,
};

/// Write `root` as indented XML text.
///
/// # Errors
/// Returns an error if the underlying writer fails.
pub fn to_string(root: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_element(&mut writer, root)?;

    String::from_utf8(writer.into_inner())
        .map_err(|err| malformed_error!("Produced invalid UTF-8 - {}", err))
}

fn write_element(writer: &mut Writer<Vec<u8>>, elem: &Element) -> Result<()> {
    let name: &'static str = elem.id().into();

    let mut start = BytesStart::new(name);
    for (id, value) in elem.attributes() {
        let key: &'static str = (*id).into();
        match value {
            AttributeValue::Unsigned(value) => {
                start.push_attribute((key, format!("{value:#x}").as_str()));
            }
            AttributeValue::String(text) => start.push_attribute((key, text.as_str())),
        }
    }

    if elem.children().is_empty() {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
        for child in elem.children() {
            write_element(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

/// Parse XML text into an element tree.
///
/// # Errors
/// - [`crate::Error::XmlError`] if the text is not well-formed XML
/// - [`crate::Error::Malformed`] for unknown elements, stray text, several root elements,
///   nesting deeper than 64 levels or no element at all
pub fn parse(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut open: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                check_depth(&open)?;
                open.push(open_element(&start)?);
            }
            Event::Empty(start) => {
                check_depth(&open)?;
                let elem = open_element(&start)?;
                attach(&mut open, &mut root, elem)?;
            }
            Event::End(_) => {
                let elem = open
                    .pop()
                    .ok_or_else(|| malformed_error!("Closing tag without opening tag"))?;
                attach(&mut open, &mut root, elem)?;
            }
            Event::Text(_) | Event::CData(_) => {
                return Err(malformed_error!(
                    "Unexpected text content at position {}",
                    reader.buffer_position()
                ));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(malformed_error!("Element <{}> is not closed", unclosed.id()));
    }
    root.ok_or_else(|| malformed_error!("Stream contains no element"))
}

fn check_depth(open: &[Element]) -> Result<()> {
    if open.len() >= MAX_DEPTH {
        return Err(malformed_error!("Elements nested deeper than {}", MAX_DEPTH));
    }
    Ok(())
}

fn open_element(start: &BytesStart<'_>) -> Result<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|err| malformed_error!("Element name is not UTF-8 - {}", err))?
        .to_string();
    let id = ElementId::from_str(&name)
        .map_err(|_| malformed_error!("Unexpected element <{}>", name))?;

    let mut elem = Element::new(id);
    for attr in start.attributes() {
        let attr = attr.map_err(|err| malformed_error!("Bad attribute in <{}> - {}", name, err))?;
        let Ok(key) = std::str::from_utf8(attr.key.as_ref()) else {
            continue;
        };
        let Ok(attr_id) = AttributeId::from_str(key) else {
            continue;
        };

        let value = attr
            .unescape_value()
            .map_err(|err| malformed_error!("Bad value for '{}' in <{}> - {}", key, name, err))?;
        elem.push_attribute(attr_id, AttributeValue::String(value.into_owned()));
    }
    Ok(elem)
}

fn attach(open: &mut [Element], root: &mut Option<Element>, elem: Element) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.push_child(elem),
        None if root.is_some() => {
            return Err(malformed_error!("Stream has more than one root element"));
        }
        None => *root = Some(elem),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn write_layout() {
        let root = Element::new(ElementId::ContextPoints).with_child(
            Element::new(ElementId::Set)
                .with_string(AttributeId::Name, "mode")
                .with_unsigned(AttributeId::Val, 1),
        );

        let text = to_string(&root).unwrap();
        assert!(text.starts_with("<context_points>"));
        assert!(text.contains(r#"<set name="mode" val="0x1"/>"#));
        assert!(text.trim_end().ends_with("</context_points>"));
    }

    #[test]
    fn parse_nested() {
        let text = r#"
            <context_data>
              <!-- mode is set for the whole boot rom -->
              <context_set space="ram" first="0x0" last="4095">
                <set name="mode" val="1"/>
              </context_set>
              <tracked_set space="ram">
                <set space="register" offset="0x20" size="2" val="0x10" unknown="x"/>
              </tracked_set>
            </context_data>"#;

        let root = parse(text).unwrap();
        assert_eq!(root.id(), ElementId::ContextData);
        assert_eq!(root.children().len(), 2);

        let context_set = &root.children()[0];
        assert_eq!(context_set.read_unsigned(AttributeId::Last).unwrap(), 4095);
        assert_eq!(context_set.children()[0].read_string(AttributeId::Name).unwrap(), "mode");

        let tracked = &root.children()[1].children()[0];
        assert_eq!(tracked.attributes().len(), 4);
        assert_eq!(tracked.read_unsigned(AttributeId::Size).unwrap(), 2);
    }

    #[test]
    fn parse_rejects_unknown_element() {
        assert!(matches!(
            parse("<context_points><bogus/></context_points>"),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn parse_rejects_text() {
        assert!(parse("<context_points>hello</context_points>").is_err());
    }

    #[test]
    fn parse_rejects_mismatched_tags() {
        assert!(parse("<context_points></context_data>").is_err());
    }

    #[test]
    fn parse_rejects_empty_and_multiple_roots() {
        assert!(parse("").is_err());
        assert!(parse("<context_points/><context_points/>").is_err());
    }

    #[test]
    fn parse_limits_nesting() {
        let nested = |levels: usize| {
            "<context_points>".repeat(levels) + &"</context_points>".repeat(levels)
        };

        assert!(parse(&nested(MAX_DEPTH)).is_ok());
        assert!(matches!(parse(&nested(100)), Err(Error::Malformed { .. })));

        let empty_inside = "<context_points>".repeat(MAX_DEPTH)
            + "<set/>"
            + &"</context_points>".repeat(MAX_DEPTH);
        assert!(matches!(parse(&empty_inside), Err(Error::Malformed { .. })));
    }

    #[test]
    fn escaping() {
        let root = Element::new(ElementId::Set).with_string(AttributeId::Name, "a&\"b\"");
        let text = to_string(&root).unwrap();
        assert_eq!(parse(&text).unwrap().read_string(AttributeId::Name).unwrap(), "a&\"b\"");
    }
}
