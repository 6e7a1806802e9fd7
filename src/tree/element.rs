// SPDX-License-Identifier: MIT
//! A single node of the task-data tree

use std::collections::HashMap;

use super::NodeId;
use crate::attribute::Attribute;
use crate::error::Severity;
use crate::linklist::Link;
use crate::schema::{AttrKind, ElementFormat};

const LABEL_SUFFIXES: [&str; 3] = ["designator", "label", "name"];

#[derive(Debug)]
pub struct Element {
    pub(crate) tag: String,
    pub(crate) format: Option<&'static ElementFormat>,
    pub(crate) id: Option<String>,
    pub(crate) oid: Option<i64>,
    pub(crate) label: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) attributes: Vec<Attribute>,
    /// oids of the direct children
    pub(crate) oid_table: HashMap<i64, NodeId>,
    pub(crate) content_errors: Vec<String>,
    pub(crate) identity_errors: Vec<String>,
    pub(crate) links: Vec<Link>,
    pub(crate) uri: String,
}

impl Element {
    pub(crate) fn new(
        tag: &str,
        format: Option<&'static ElementFormat>,
        attributes: Vec<Attribute>,
        parent: Option<NodeId>,
    ) -> Self {
        let id = attributes
            .iter()
            .find(|a| a.kind() == AttrKind::Id && a.has_value())
            .and_then(|a| a.as_str().map(str::to_string));
        let oid = attributes
            .iter()
            .find(|a| a.kind() == AttrKind::Oid && a.error().is_none())
            .and_then(Attribute::as_i64);
        let label = derive_label(tag, format, &attributes, id.as_deref(), oid);

        Self {
            tag: tag.to_string(),
            format,
            id,
            oid,
            label,
            parent,
            children: Vec::new(),
            attributes,
            oid_table: HashMap::new(),
            content_errors: Vec::new(),
            identity_errors: Vec::new(),
            links: Vec::new(),
            uri: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn format(&self) -> Option<&'static ElementFormat> {
        self.format
    }

    /// Schema display name, e.g. `DeviceElement`
    pub fn display_name(&self) -> Option<&str> {
        self.format.map(|f| f.name.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn oid(&self) -> Option<i64> {
        self.oid
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute by logical name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(Attribute::as_str)
    }

    pub fn i64_attr(&self, name: &str) -> Option<i64> {
        self.attribute(name).and_then(Attribute::as_i64)
    }

    pub fn f64_attr(&self, name: &str) -> Option<f64> {
        self.attribute(name).and_then(Attribute::as_f64)
    }

    pub fn content_errors(&self) -> &[String] {
        &self.content_errors
    }

    pub fn identity_errors(&self) -> &[String] {
        &self.identity_errors
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Generated identity, ignoring links
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Link identities if any were integrated, else the generated one
    pub fn identities(&self) -> Vec<&str> {
        if self.links.is_empty() {
            vec![self.uri.as_str()]
        } else {
            self.links.iter().map(Link::identity).collect()
        }
    }

    /// Identity shown in diagnostic paths
    pub(crate) fn path_segment(&self) -> String {
        match (&self.id, self.oid, &self.label) {
            (Some(id), _, _) => format!("{}({})", self.tag, id),
            (None, Some(oid), _) => format!("{}({})", self.tag, oid),
            (None, None, Some(label)) => format!("{}({})", self.tag, label),
            (None, None, None) => self.tag.clone(),
        }
    }

    /// Errors visible without resolving references
    pub fn has_local_errors(&self) -> bool {
        self.format.is_none()
            || !self.content_errors.is_empty()
            || !self.identity_errors.is_empty()
            || self
                .attributes
                .iter()
                .any(|a| a.severity() >= Some(Severity::Error))
    }
}

/// Label priority: a text attribute ending in designator/label/name, then
/// the id, then `TAG#oid`, then the schema display name
pub(crate) fn derive_label(
    tag: &str,
    format: Option<&ElementFormat>,
    attributes: &[Attribute],
    id: Option<&str>,
    oid: Option<i64>,
) -> Option<String> {
    let named = attributes.iter().find(|a| {
        a.kind() == AttrKind::String && a.has_value() && {
            let name = a.name().to_ascii_lowercase();
            LABEL_SUFFIXES.iter().any(|s| name.ends_with(s))
        }
    });
    if let Some(text) = named.and_then(Attribute::as_str) {
        return Some(text.to_string());
    }
    if let Some(id) = id {
        return Some(id.to_string());
    }
    if let Some(oid) = oid {
        return Some(format!("{}#{}", tag, oid));
    }
    format.map(|f| f.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, Section};

    fn build(tag: &str, attrs: &[(&str, &str)]) -> Element {
        let format = Schema::builtin()
            .unwrap()
            .element(Section::TaskData, tag)
            .unwrap();
        let attributes = format
            .attrib
            .iter()
            .map(|f| {
                let raw = attrs.iter().find(|(k, _)| *k == f.key).map(|(_, v)| *v);
                Attribute::parse(f, raw)
            })
            .collect();
        Element::new(tag, Some(format), attributes, None)
    }

    #[test]
    fn test_label_prefers_designator() {
        let det = build("DET", &[("A", "DET-1"), ("B", "5"), ("D", "Boom")]);
        assert_eq!(det.label(), Some("Boom"));
        assert_eq!(det.id(), Some("DET-1"));
        assert_eq!(det.oid(), Some(5));
        assert_eq!(det.path_segment(), "DET(DET-1)");
    }

    #[test]
    fn test_label_falls_back_to_id_then_oid_then_name() {
        assert_eq!(build("DET", &[("A", "DET-1"), ("B", "5")]).label(), Some("DET-1"));
        assert_eq!(build("DPD", &[("A", "7")]).label(), Some("DPD#7"));
        assert_eq!(build("DOR", &[("A", "7")]).label(), Some("DeviceObjectReference"));
    }

    #[test]
    fn test_empty_designator_is_ignored() {
        let det = build("DET", &[("A", "DET-1"), ("B", "5"), ("D", "")]);
        assert_eq!(det.label(), Some("DET-1"));
    }

    #[test]
    fn test_invalid_oid_is_not_registered() {
        let dpd = build("DPD", &[("A", "x")]);
        assert_eq!(dpd.oid(), None);
        assert!(dpd.has_local_errors());
    }

    #[test]
    fn test_identities_default_to_generated_uri() {
        let det = build("DET", &[("A", "DET-1"), ("B", "1")]);
        assert_eq!(det.identities(), vec![det.uri()]);
        assert!(det.uri().starts_with("urn:uuid:"));
    }
}
