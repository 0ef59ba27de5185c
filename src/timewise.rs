//! Partwise → timewise normalization of MusicXML documents.
//!
//! Partwise documents nest measures inside parts; timewise documents
//! nest parts inside measures. The MusicXML reader only walks the
//! timewise shape, so partwise input is regrouped here first. Measures
//! are laid out following the first part, and each part's measure is
//! matched by position, falling back to its `number` attribute.

use roxmltree::Node;

use crate::element::Element;
use crate::error::{ConvertError, Result};
use crate::query::{attribute, children_named};

/// Regroup a `<score-partwise>` root into a `<score-timewise>` tree.
pub fn partwise_to_timewise(root: Node) -> Result<Element> {
    let root_name = root.tag_name().name();
    if root_name != "score-partwise" {
        return Err(ConvertError::UnsupportedRootElement {
            found: root_name.to_string(),
            expected: "<score-partwise>".to_string(),
        });
    }

    let mut timewise = Element::new("score-timewise");
    for a in root.attributes() {
        timewise.set_attribute(a.name(), a.value());
    }

    // Header: everything that isn't a part
    for child in root.children().filter(|n| n.is_element()) {
        if child.tag_name().name() != "part" {
            timewise.push(Element::from_node(child));
        }
    }

    let parts: Vec<(Option<&str>, Vec<Node>)> = children_named(root, "part")
        .map(|p| (attribute(p, "id"), children_named(p, "measure").collect()))
        .collect();

    let Some((_, skeleton)) = parts.first() else {
        return Ok(timewise);
    };

    for (index, first) in skeleton.iter().enumerate() {
        let number = attribute(*first, "number");
        let mut measure = Element::new("measure");
        for a in first.attributes() {
            measure.set_attribute(a.name(), a.value());
        }

        for (id, measures) in &parts {
            let Some(source) = matching_measure(measures, index, number) else {
                log::debug!("part {:?} has no measure {:?}", id, number);
                continue;
            };
            let mut part = Element::new("part").attr_opt("id", *id);
            part.children = source
                .children()
                .filter(|n| n.is_element())
                .map(Element::from_node)
                .collect();
            measure.push(part);
        }
        timewise.push(measure);
    }

    Ok(timewise)
}

fn matching_measure<'a, 'input>(
    measures: &[Node<'a, 'input>],
    index: usize,
    number: Option<&str>,
) -> Option<Node<'a, 'input>> {
    let positional = measures.get(index).copied();
    match (positional, number) {
        (Some(m), Some(n)) if attribute(m, "number") == Some(n) => Some(m),
        (positional, Some(n)) => measures
            .iter()
            .copied()
            .find(|m| attribute(*m, "number") == Some(n))
            .or(positional),
        (positional, None) => positional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_document;

    const PARTWISE: &str = r#"<?xml version="1.0"?>
<score-partwise version="3.1">
  <movement-title>Duet</movement-title>
  <part-list>
    <score-part id="P1"><part-name>Flute</part-name></score-part>
    <score-part id="P2"><part-name>Cello</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1"><note><pitch><step>C</step><octave>5</octave></pitch></note></measure>
    <measure number="2"><note><pitch><step>D</step><octave>5</octave></pitch></note></measure>
  </part>
  <part id="P2">
    <measure number="2"><note><pitch><step>G</step><octave>2</octave></pitch></note></measure>
    <measure number="1"><note><pitch><step>C</step><octave>2</octave></pitch></note></measure>
  </part>
</score-partwise>"#;

    #[test]
    fn regroups_parts_under_measures() {
        let doc = parse_document(PARTWISE).unwrap();
        let timewise = partwise_to_timewise(doc.root_element()).unwrap();

        assert_eq!(timewise.name, "score-timewise");
        assert_eq!(timewise.attribute("version"), Some("3.1"));
        assert!(timewise.find("movement-title").is_some());
        assert!(timewise.find("part-list").is_some());
        assert!(timewise.find("part").is_none());

        let measures: Vec<&Element> = timewise.find_all("measure").collect();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].attribute("number"), Some("1"));

        let ids: Vec<_> = measures[0].find_all("part").map(|p| p.attribute("id")).collect();
        assert_eq!(ids, vec![Some("P1"), Some("P2")]);

        // P2 lists its measures out of order; matching goes by number
        let cello = measures[0].find_all("part").nth(1).unwrap();
        assert_eq!(cello.descendants_named("step")[0].text.as_deref(), Some("C"));
    }

    #[test]
    fn rejects_other_roots() {
        let doc = parse_document("<score-timewise/>").unwrap();
        assert!(matches!(
            partwise_to_timewise(doc.root_element()),
            Err(ConvertError::UnsupportedRootElement { .. })
        ));
    }
}
