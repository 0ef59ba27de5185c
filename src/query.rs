//! Read-side helpers over parsed source documents.

use std::str::FromStr;

use roxmltree::{Document, Node};

use crate::error::{ConvertError, Result};

/// Parse a source document. Score formats carry DOCTYPE declarations, so
/// DTDs are allowed.
pub fn parse_document(xml: &str) -> Result<Document<'_>> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    Ok(Document::parse_with_options(xml, options)?)
}

pub fn is_named(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

/// Element children called `name`, in document order.
pub fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| is_named(*n, name))
}

/// First element child called `name`.
pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_named(*n, name))
}

/// Follow a path of element names from `node`, taking the first match
/// at each level.
pub fn child_path<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter().try_fold(node, |current, name| child(current, name))
}

/// Trimmed, non-empty text of the element at `path`.
pub fn text_at<'a>(node: Node<'a, '_>, path: &[&str]) -> Option<&'a str> {
    child_path(node, path)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Parse the text at `path`. Absent text is `Ok(None)`; unreadable text
/// is a malformed source element.
pub fn parse_at<T: FromStr>(node: Node, path: &[&str]) -> Result<Option<T>> {
    match text_at(node, path) {
        None => Ok(None),
        Some(text) => text.parse().map(Some).map_err(|_| {
            ConvertError::malformed(
                path.last().copied().unwrap_or_else(|| node.tag_name().name()),
                format!("unreadable value '{text}'"),
            )
        }),
    }
}

/// Trimmed, non-empty attribute value.
pub fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).map(str::trim).filter(|v| !v.is_empty())
}

/// Attribute the format requires.
pub fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    attribute(node, name).ok_or_else(|| {
        ConvertError::malformed(node.tag_name().name(), format!("missing @{name}"))
    })
}

/// Parse an attribute. Absent is `Ok(None)`; unreadable is malformed.
pub fn parse_attribute<T: FromStr>(node: Node, name: &str) -> Result<Option<T>> {
    match attribute(node, name) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            ConvertError::malformed(
                node.tag_name().name(),
                format!("unreadable @{name} '{value}'"),
            )
        }),
    }
}
