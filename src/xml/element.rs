//! Minimal element tree for documents read as a whole.

use super::{XmlSink, read_xml};
use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn parse(text: &str) -> QueryResult<Element> {
        let mut builder = ElementBuilder::default();
        read_xml(text, &mut builder)?;
        builder.finish()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of a child element, or of the attribute of the same name.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.as_str())
            .or_else(|| self.attr(name))
            .filter(|v| !v.is_empty())
    }
}

/// Sink assembling an [`Element`] tree.
#[derive(Debug, Default)]
pub(crate) struct ElementBuilder {
    stack: Vec<Element>,
    attribute: Option<(String, String)>,
    root: Option<Element>,
}

impl ElementBuilder {
    pub fn finish(self) -> QueryResult<Element> {
        if !self.stack.is_empty() {
            return Err(QueryError::xml("unclosed element"));
        }
        self.root.ok_or_else(|| QueryError::xml("empty document"))
    }
}

impl XmlSink for ElementBuilder {
    fn start_element(&mut self, _prefix: &str, local_name: &str, _namespace: &str) -> QueryResult<()> {
        self.stack.push(Element {
            name: local_name.to_string(),
            ..Element::default()
        });
        Ok(())
    }

    fn end_element(&mut self) -> QueryResult<()> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| QueryError::xml("end of element without a start"))?;
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                if self.root.is_some() {
                    return Err(QueryError::xml("more than one root element"));
                }
                self.root = Some(element);
            }
        }
        Ok(())
    }

    fn start_attribute(&mut self, _prefix: &str, local_name: &str, _namespace: &str) -> QueryResult<()> {
        self.attribute = Some((local_name.to_string(), String::new()));
        Ok(())
    }

    fn end_attribute(&mut self) -> QueryResult<()> {
        let attr = self
            .attribute
            .take()
            .ok_or_else(|| QueryError::xml("end of attribute without a start"))?;
        let element = self
            .stack
            .last_mut()
            .ok_or_else(|| QueryError::xml("attribute outside of an element"))?;
        element.attributes.push(attr);
        Ok(())
    }

    fn text(&mut self, text: &str) -> QueryResult<()> {
        if let Some((_, value)) = self.attribute.as_mut() {
            value.push_str(text);
        } else if let Some(element) = self.stack.last_mut() {
            element.text.push_str(text);
        }
        Ok(())
    }
}
