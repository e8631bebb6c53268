//! XML text input through quick-xml.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;

use super::XmlSink;
use crate::error::{QueryError, QueryResult};

/// Drive `sink` with the events of `text`.
///
/// Whitespace-only text is dropped. Namespace declarations are not
/// forwarded as attributes and namespace URIs are not resolved; the prefix
/// is passed through as written.
pub fn read_xml(text: &str, sink: &mut dyn XmlSink) -> QueryResult<()> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(QueryError::xml)? {
            Event::Start(e) => emit_start(&e, sink)?,
            Event::Empty(e) => {
                emit_start(&e, sink)?;
                sink.end_element()?;
            }
            Event::End(_) => sink.end_element()?,
            Event::Text(t) => {
                let text = t.unescape().map_err(QueryError::xml)?;
                if !text.is_empty() {
                    sink.text(&text)?;
                }
            }
            Event::CData(c) => {
                let text = std::str::from_utf8(&c).map_err(QueryError::xml)?;
                sink.text(text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn split_name(name: QName<'_>) -> QueryResult<(&str, &str)> {
    let prefix = match name.prefix() {
        Some(p) => std::str::from_utf8(p.into_inner()).map_err(QueryError::xml)?,
        None => "",
    };
    let local = std::str::from_utf8(name.local_name().into_inner()).map_err(QueryError::xml)?;
    Ok((prefix, local))
}

fn emit_start(e: &BytesStart<'_>, sink: &mut dyn XmlSink) -> QueryResult<()> {
    let (prefix, local) = split_name(e.name())?;
    sink.start_element(prefix, local, "")?;
    for attr in e.attributes() {
        let attr = attr.map_err(QueryError::xml)?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (prefix, local) = split_name(attr.key)?;
        let value = attr.unescape_value().map_err(QueryError::xml)?;
        sink.start_attribute(prefix, local, "")?;
        sink.text(&value)?;
        sink.end_attribute()?;
    }
    Ok(())
}
