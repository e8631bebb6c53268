//! XML text output through quick-xml.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use super::XmlSink;
use crate::error::{QueryError, QueryResult};

struct OpenElement {
    name: String,
    /// Namespace declared on this element, as (prefix, uri).
    declared: Option<(String, String)>,
}

/// Sink producing XML text. Elements without content are written as
/// empty elements.
pub struct XmlTextWriter {
    writer: Writer<Vec<u8>>,
    stack: Vec<OpenElement>,
    pending: Option<BytesStart<'static>>,
    attribute: Option<(String, String)>,
}

impl Default for XmlTextWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlTextWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            stack: Vec::new(),
            pending: None,
            attribute: None,
        }
    }

    /// Finish writing and return the text.
    pub fn into_string(mut self) -> QueryResult<String> {
        if !self.stack.is_empty() {
            return Err(QueryError::xml(format!(
                "unclosed element '{}'",
                self.stack.last().map(|e| e.name.as_str()).unwrap_or_default()
            )));
        }
        self.flush_pending()?;
        String::from_utf8(self.writer.into_inner()).map_err(QueryError::xml)
    }

    fn flush_pending(&mut self) -> QueryResult<()> {
        if let Some(start) = self.pending.take() {
            self.writer
                .write_event(Event::Start(start))
                .map_err(QueryError::xml)?;
        }
        Ok(())
    }

    fn in_scope(&self, prefix: &str, namespace: &str) -> bool {
        self.stack
            .iter()
            .rev()
            .find_map(|e| e.declared.as_ref().filter(|(p, _)| p == prefix))
            .is_some_and(|(_, uri)| uri == namespace)
    }
}

fn qualified(prefix: &str, local_name: &str) -> String {
    if prefix.is_empty() {
        local_name.to_string()
    } else {
        format!("{}:{}", prefix, local_name)
    }
}

impl XmlSink for XmlTextWriter {
    fn start_element(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
    ) -> QueryResult<()> {
        if self.attribute.is_some() {
            return Err(QueryError::xml("element started inside an attribute"));
        }
        self.flush_pending()?;
        let name = qualified(prefix, local_name);
        let mut start = BytesStart::new(name.clone());
        let mut declared = None;
        if !namespace.is_empty() && !self.in_scope(prefix, namespace) {
            let attr = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", prefix)
            };
            start.push_attribute((attr.as_str(), namespace));
            declared = Some((prefix.to_string(), namespace.to_string()));
        }
        self.pending = Some(start);
        self.stack.push(OpenElement { name, declared });
        Ok(())
    }

    fn end_element(&mut self) -> QueryResult<()> {
        let Some(open) = self.stack.pop() else {
            return Err(QueryError::xml("end of element without a start"));
        };
        match self.pending.take() {
            Some(start) => self.writer.write_event(Event::Empty(start)),
            None => self.writer.write_event(Event::End(BytesEnd::new(open.name))),
        }
        .map_err(QueryError::xml)
    }

    fn start_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        _namespace: &str,
    ) -> QueryResult<()> {
        if self.pending.is_none() {
            return Err(QueryError::xml(format!(
                "attribute '{}' outside of a start tag",
                local_name
            )));
        }
        self.attribute = Some((qualified(prefix, local_name), String::new()));
        Ok(())
    }

    fn end_attribute(&mut self) -> QueryResult<()> {
        let (name, value) = self
            .attribute
            .take()
            .ok_or_else(|| QueryError::xml("end of attribute without a start"))?;
        match self.pending.as_mut() {
            Some(start) => {
                start.push_attribute((name.as_str(), value.as_str()));
                Ok(())
            }
            None => Err(QueryError::xml("attribute outside of a start tag")),
        }
    }

    fn text(&mut self, text: &str) -> QueryResult<()> {
        if let Some((_, value)) = self.attribute.as_mut() {
            value.push_str(text);
            return Ok(());
        }
        self.flush_pending()?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(QueryError::xml)
    }
}
