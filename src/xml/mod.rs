//! Push-style XML event interface.
//!
//! AML and stored query definitions are read and written through
//! [`XmlSink`]; no XML tree is required. [`read_xml`] drives a sink from XML
//! text and [`XmlTextWriter`] turns events back into text.

mod element;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub(crate) use element::Element;
pub use reader::read_xml;
pub use writer::XmlTextWriter;

use crate::error::QueryResult;

/// Receiver of XML events.
///
/// Attributes of an element are reported between its `start_element` and
/// the first child or text event, each as `start_attribute`, `text`,
/// `end_attribute`.
pub trait XmlSink {
    fn start_element(&mut self, prefix: &str, local_name: &str, namespace: &str)
    -> QueryResult<()>;

    fn end_element(&mut self) -> QueryResult<()>;

    fn start_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
    ) -> QueryResult<()>;

    fn end_attribute(&mut self) -> QueryResult<()>;

    fn text(&mut self, text: &str) -> QueryResult<()>;

    /// Start an element without prefix or namespace.
    fn start(&mut self, name: &str) -> QueryResult<()> {
        self.start_element("", name, "")
    }

    /// Write a complete attribute.
    fn attribute(&mut self, name: &str, value: &str) -> QueryResult<()> {
        self.start_attribute("", name, "")?;
        self.text(value)?;
        self.end_attribute()
    }

    /// Write `<name>text</name>`.
    fn leaf(&mut self, name: &str, text: &str) -> QueryResult<()> {
        self.start(name)?;
        if !text.is_empty() {
            self.text(text)?;
        }
        self.end_element()
    }
}

/// A recorded XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement {
        prefix: String,
        local_name: String,
        namespace: String,
    },
    EndElement,
    StartAttribute {
        prefix: String,
        local_name: String,
        namespace: String,
    },
    EndAttribute,
    Text(String),
}

/// Sink that records events for later replay.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    pub events: Vec<XmlEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the recorded events to another sink.
    pub fn replay(&self, sink: &mut dyn XmlSink) -> QueryResult<()> {
        for event in &self.events {
            match event {
                XmlEvent::StartElement {
                    prefix,
                    local_name,
                    namespace,
                } => sink.start_element(prefix, local_name, namespace)?,
                XmlEvent::EndElement => sink.end_element()?,
                XmlEvent::StartAttribute {
                    prefix,
                    local_name,
                    namespace,
                } => sink.start_attribute(prefix, local_name, namespace)?,
                XmlEvent::EndAttribute => sink.end_attribute()?,
                XmlEvent::Text(text) => sink.text(text)?,
            }
        }
        Ok(())
    }
}

impl XmlSink for EventRecorder {
    fn start_element(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
    ) -> QueryResult<()> {
        self.events.push(XmlEvent::StartElement {
            prefix: prefix.to_string(),
            local_name: local_name.to_string(),
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    fn end_element(&mut self) -> QueryResult<()> {
        self.events.push(XmlEvent::EndElement);
        Ok(())
    }

    fn start_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
    ) -> QueryResult<()> {
        self.events.push(XmlEvent::StartAttribute {
            prefix: prefix.to_string(),
            local_name: local_name.to_string(),
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    fn end_attribute(&mut self) -> QueryResult<()> {
        self.events.push(XmlEvent::EndAttribute);
        Ok(())
    }

    fn text(&mut self, text: &str) -> QueryResult<()> {
        self.events.push(XmlEvent::Text(text.to_string()));
        Ok(())
    }
}
