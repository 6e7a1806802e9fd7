// SPDX-License-Identifier: MIT
//! Builds elements from parsed XML
//!
//! One depth-first pass creates each element, registers its id in the
//! document table and its oid in the parent's table, then validates the
//! child cardinality once all children exist.

use roxmltree::{Node, ParsingOptions};

use super::{Document, Element, NodeId};
use crate::attribute::Attribute;
use crate::error::DecodeError;
use crate::schema::{ElementFormat, Section};

/// Build-time state threaded through the recursion
struct BuildContext<'a> {
    doc: &'a mut Document,
    section: Section,
}

impl Document {
    /// Parse `xml` and add its elements to the arena as a detached subtree.
    /// Ids are registered in this document's table.
    pub fn build_subtree(
        &mut self,
        name: &str,
        xml: &str,
        section: Section,
    ) -> Result<NodeId, DecodeError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let parsed = roxmltree::Document::parse_with_options(xml, options).map_err(|e| {
            DecodeError::Xml {
                name: name.to_string(),
                message: e.to_string(),
            }
        })?;

        let mut ctx = BuildContext { doc: self, section };
        Ok(ctx.build(parsed.root_element(), None))
    }
}

impl BuildContext<'_> {
    fn build(&mut self, xml: Node<'_, '_>, parent: Option<NodeId>) -> NodeId {
        let tag = xml.tag_name().name();
        let format = self.doc.schema.element(self.section, tag);
        let attributes = parse_attributes(format, xml);

        let node = NodeId(self.doc.nodes.len());
        self.doc
            .nodes
            .push(Element::new(tag, format, attributes, parent));
        self.doc.register_id(node);
        if let Some(parent) = parent {
            self.doc.register_oid(parent, node);
        }

        for child in xml.children().filter(Node::is_element) {
            let child = self.build(child, Some(node));
            self.doc.get_mut(node).children.push(child);
        }
        self.doc.validate_content(node);
        node
    }
}

/// Declared attributes in schema order, then undeclared ones as unknown
fn parse_attributes(format: Option<&ElementFormat>, xml: Node<'_, '_>) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = format
        .map(|f| {
            f.attrib
                .iter()
                .map(|a| Attribute::parse(a, xml.attribute(a.key.as_str())))
                .collect()
        })
        .unwrap_or_default();

    for attr in xml.attributes() {
        let declared = format.is_some_and(|f| f.attrib.iter().any(|a| a.key == attr.name()));
        if !declared {
            attributes.push(Attribute::unknown(attr.name(), attr.value()));
        }
    }
    attributes
}
