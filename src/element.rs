//! Owned XML element tree used to build output documents.
//!
//! Writers assemble an `Element` tree and serialize it once the whole
//! score has been converted, so a failed conversion never produces a
//! partial document.

use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{ConvertError, Result};

/// An element with attributes, optional text and child elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// An element holding only text, e.g. `<step>C</step>`.
    pub fn with_text(name: &str, text: impl ToString) -> Self {
        let mut el = Element::new(name);
        el.text = Some(text.to_string());
        el
    }

    /// Set an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attr(mut self, name: &str, value: impl ToString) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set the attribute only when a value is present.
    pub fn attr_opt<T: ToString>(mut self, name: &str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.set_attribute(name, value);
        }
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Append `<name>text</name>` when a value is present.
    pub fn text_child_opt<T: ToString>(mut self, name: &str, text: Option<T>) -> Self {
        if let Some(text) = text {
            self.children.push(Element::with_text(name, text));
        }
        self
    }

    /// First child element called `name`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All descendants (not including `self`) called `name`, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            found.extend(child.descendants_named(name));
        }
        found
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && self.text.is_none()
    }

    /// Structural equality used to suppress repeated definitions.
    ///
    /// Names and attribute sets must match (attribute order is ignored);
    /// text and children are then compared the same way, in order.
    pub fn same_definition(&self, other: &Element) -> bool {
        if self.name != other.name || self.attributes.len() != other.attributes.len() {
            return false;
        }
        let attributes_match = self
            .attributes
            .iter()
            .all(|(name, value)| other.attribute(name) == Some(value.as_str()));
        attributes_match
            && self.text == other.text
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.same_definition(b))
    }

    /// Deep copy of a parsed source node.
    pub fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        let mut el = Element::new(node.tag_name().name());
        for attribute in node.attributes() {
            el.set_attribute(attribute.name(), attribute.value());
        }
        let text: String = node
            .children()
            .filter(|n| n.is_text())
            .filter_map(|n| n.text())
            .collect();
        let text = text.trim();
        if !text.is_empty() {
            el.text = Some(text.to_string());
        }
        el.children = node
            .children()
            .filter(|n| n.is_element())
            .map(Element::from_node)
            .collect();
        el
    }
}

// ─── Serialization ───────────────────────────────────────────────────

/// Serialize `root` as a standalone document.
///
/// `doctype` is the body of the `<!DOCTYPE ...>` declaration, if any.
/// An `indent` of 0 writes everything on one line.
pub fn to_xml_string(root: &Element, doctype: Option<&str>, indent: usize) -> Result<String> {
    let mut writer = if indent > 0 {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', indent)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    if let Some(doctype) = doctype {
        writer.write_event(Event::DocType(BytesText::from_escaped(doctype)))?;
    }
    write_element(&mut writer, root)?;

    let mut xml = String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| ConvertError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    xml.push('\n');
    Ok(xml)
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (name, value) in &el.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if el.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = &el.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &el.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_def(attrs: &[(&str, &str)]) -> Element {
        attrs
            .iter()
            .fold(Element::new("scoreDef"), |el, (k, v)| el.attr(k, v))
    }

    #[test]
    fn same_definition_ignores_attribute_order() {
        let a = score_def(&[("meter.count", "3"), ("meter.unit", "4")]);
        let b = score_def(&[("meter.unit", "4"), ("meter.count", "3")]);
        assert!(a.same_definition(&b));
    }

    #[test]
    fn same_definition_detects_changes() {
        let a = score_def(&[("meter.count", "3"), ("meter.unit", "4")]);
        let changed = score_def(&[("meter.count", "4"), ("meter.unit", "4")]);
        let fewer = score_def(&[("meter.count", "3")]);
        let renamed = Element::new("staffDef")
            .attr("meter.count", "3")
            .attr("meter.unit", "4");
        assert!(!a.same_definition(&changed));
        assert!(!a.same_definition(&fewer));
        assert!(!fewer.same_definition(&a));
        assert!(!a.same_definition(&renamed));
    }

    #[test]
    fn same_definition_compares_children() {
        let block = |fifths: i32| {
            Element::new("attributes")
                .child(Element::new("key").child(Element::with_text("fifths", fifths)))
        };
        assert!(block(1).same_definition(&block(1)));
        assert!(!block(1).same_definition(&block(2)));
    }

    #[test]
    fn set_attribute_replaces() {
        let mut el = Element::new("note").attr("pname", "c");
        el.set_attribute("pname", "d");
        assert_eq!(el.attribute("pname"), Some("d"));
        assert_eq!(el.attributes.len(), 1);
    }

    #[test]
    fn optional_helpers_skip_absent_values() {
        let el = Element::new("note")
            .attr_opt("accid", None::<&str>)
            .attr_opt("dur", Some(4))
            .text_child_opt("type", None::<String>);
        assert_eq!(el.attribute("accid"), None);
        assert_eq!(el.attribute("dur"), Some("4"));
        assert!(el.children.is_empty());
    }

    #[test]
    fn serializes_compact_document() {
        let root = Element::new("score-timewise")
            .attr("version", "2.0")
            .child(Element::with_text("movement-title", "Tom & Jerry"))
            .child(Element::new("part-list"));
        let xml = to_xml_string(&root, Some("score-timewise"), 0).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><!DOCTYPE score-timewise>\
             <score-timewise version=\"2.0\"><movement-title>Tom &amp; Jerry</movement-title>\
             <part-list/></score-timewise>\n"
        );
    }

    #[test]
    fn from_node_round_trips_through_text() {
        let src = r#"<measure number="1"><part id="P1"><note><pitch><step>C</step></pitch></note></part></measure>"#;
        let doc = roxmltree::Document::parse(src).unwrap();
        let el = Element::from_node(doc.root_element());
        assert_eq!(el.attribute("number"), Some("1"));
        assert_eq!(el.descendants_named("step")[0].text.as_deref(), Some("C"));

        let xml = to_xml_string(&el, None, 0).unwrap();
        let reparsed = roxmltree::Document::parse(&xml).unwrap();
        assert!(Element::from_node(reparsed.root_element()).same_definition(&el));
    }
}
