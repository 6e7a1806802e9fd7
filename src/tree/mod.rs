// SPDX-License-Identifier: MIT
//! Arena-backed element tree
//!
//! Elements live in a flat vector and refer to each other by [`NodeId`].
//! Detached subtrees stay in the arena but are no longer reachable from the
//! root, so ids handed out earlier stay valid.

mod builder;
mod element;
pub mod reference;

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

pub use element::Element;
pub use reference::RefState;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{DecodeError, Severity};
use crate::schema::{Schema, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Document {
    schema: &'static Schema,
    section: Section,
    nodes: Vec<Element>,
    root: NodeId,
    ids: HashMap<String, NodeId>,
}

impl Document {
    /// Parse `xml` against the built-in schema
    pub fn parse(name: &str, xml: &str, section: Section) -> Result<Self, DecodeError> {
        Self::parse_with_schema(Schema::builtin()?, name, xml, section)
    }

    pub fn parse_with_schema(
        schema: &'static Schema,
        name: &str,
        xml: &str,
        section: Section,
    ) -> Result<Self, DecodeError> {
        let mut doc = Self {
            schema,
            section,
            nodes: Vec::new(),
            root: NodeId(0),
            ids: HashMap::new(),
        };
        doc.root = doc.build_subtree(name, xml, section)?;
        debug!(document = name, elements = doc.nodes.len(), "Built element tree");
        Ok(doc)
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// # Panics
    ///
    /// Panics if `node` was not handed out by this document.
    pub fn get(&self, node: NodeId) -> &Element {
        &self.nodes[node.0]
    }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.nodes[node.0]
    }

    pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.node_by_id(id).map(|n| self.get(n))
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).children()
    }

    pub fn children_with_tag<'a>(
        &'a self,
        node: NodeId,
        tag: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.get(node)
            .children()
            .iter()
            .copied()
            .filter(move |c| self.get(*c).tag() == tag)
    }

    /// All elements reachable from the root, depth first
    pub fn descendants(&self) -> Vec<NodeId> {
        self.descendants_of(self.root)
    }

    pub fn descendants_of(&self, node: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.get(current).children().iter().rev());
        }
        order
    }

    /// Dotted `TAG(identity)` path from the root to `node`
    pub fn path(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            let element = self.get(n);
            segments.push(element.path_segment());
            current = element.parent();
        }
        segments.reverse();
        segments.join(".")
    }

    /// Remove `node` from its parent; returns its former position
    pub fn detach(&mut self, node: NodeId) -> Option<usize> {
        let parent = self.get(node).parent?;
        let oid = self.get(node).oid;

        let parent_element = self.get_mut(parent);
        let position = parent_element.children.iter().position(|c| *c == node)?;
        parent_element.children.remove(position);
        let mut released = None;
        if let Some(oid) = oid {
            if parent_element.oid_table.get(&oid) == Some(&node) {
                parent_element.oid_table.remove(&oid);
                released = Some(oid);
            }
        }

        // A later sibling with the same oid takes over the freed slot
        if let Some(oid) = released {
            let successor = self
                .get(parent)
                .children
                .iter()
                .copied()
                .find(|c| self.get(*c).oid == Some(oid));
            if let Some(successor) = successor {
                let duplicate = format!("Duplicate oid {}", oid);
                if let Some(index) = self
                    .get(successor)
                    .identity_errors
                    .iter()
                    .position(|e| *e == duplicate)
                {
                    self.get_mut(successor).identity_errors.remove(index);
                }
                self.get_mut(parent).oid_table.insert(oid, successor);
            }
        }

        self.get_mut(node).parent = None;
        self.validate_content(parent);
        Some(position)
    }

    /// Insert `children` under `parent` starting at `position`, taking them
    /// away from wherever they were attached before
    pub fn attach_children(&mut self, parent: NodeId, position: usize, children: &[NodeId]) {
        let mut position = position.min(self.get(parent).children.len());
        for child in children {
            if self.get(*child).parent.is_some() {
                self.detach(*child);
            }
            self.get_mut(*child).parent = Some(parent);
            self.get_mut(parent).children.insert(position, *child);
            self.register_oid(parent, *child);
            position += 1;
        }
        self.validate_content(parent);
    }

    pub(crate) fn register_id(&mut self, node: NodeId) {
        let Some(id) = self.get(node).id.clone() else {
            return;
        };
        if self.ids.contains_key(&id) {
            self.get_mut(node)
                .identity_errors
                .push(format!("Duplicate id {}", id));
        } else {
            self.ids.insert(id, node);
        }
    }

    pub(crate) fn register_oid(&mut self, parent: NodeId, node: NodeId) {
        let Some(oid) = self.get(node).oid else {
            return;
        };
        match self.get(parent).oid_table.get(&oid) {
            Some(existing) if *existing != node => {
                self.get_mut(node)
                    .identity_errors
                    .push(format!("Duplicate oid {}", oid));
            }
            Some(_) => {}
            None => {
                self.get_mut(parent).oid_table.insert(oid, node);
            }
        }
    }

    /// Recompute the child cardinality errors of `node`
    pub(crate) fn validate_content(&mut self, node: NodeId) {
        let element = self.get(node);
        let Some(format) = element.format else {
            return;
        };

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        let mut unknown: Vec<&str> = Vec::new();
        for child in element.children() {
            let tag = self.get(*child).tag();
            let allowed = format
                .content
                .as_ref()
                .is_some_and(|c| c.contains_key(tag));
            if allowed {
                *counts.entry(tag).or_default() += 1;
            } else if !unknown.contains(&tag) {
                unknown.push(tag);
            }
        }

        let mut errors = Vec::new();
        for (tag, rule) in format.content.iter().flatten() {
            let count = counts.get(tag.as_str()).copied().unwrap_or(0);
            if count < rule.min {
                errors.push(format!("Contains less than {} elements of {}", rule.min, tag));
            }
            if let Some(max) = rule.max {
                if count > max {
                    errors.push(format!("Must not contain more than {} elements of {}", max, tag));
                }
            }
        }
        errors.extend(unknown.iter().map(|tag| format!("Unknown element: {}", tag)));

        self.get_mut(node).content_errors = errors;
    }

    /// Errors of the reachable tree, each prefixed with its element path.
    /// Resolves every reference that has a value.
    pub fn diagnostics(&self) -> Diagnostics {
        self.collect_diagnostics(true)
    }

    /// Like [`Document::diagnostics`] but without reference resolution, for
    /// documents whose references point into another document
    pub fn structural_diagnostics(&self) -> Diagnostics {
        self.collect_diagnostics(false)
    }

    fn collect_diagnostics(&self, resolve: bool) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for node in self.descendants() {
            self.element_diagnostics(node, resolve, &mut diagnostics);
        }
        diagnostics
    }

    fn element_diagnostics(&self, node: NodeId, resolve: bool, out: &mut Diagnostics) {
        let element = self.get(node);
        let prefix = self.path(node);

        if element.format.is_none() {
            out.error(format!("{}: Unknown element", prefix));
        }
        for error in element.identity_errors.iter().chain(&element.content_errors) {
            out.error(format!("{}: {}", prefix, error));
        }
        for attr in element.attributes() {
            if let Some(message) = attr.describe_error() {
                let severity = attr.severity().unwrap_or(Severity::Error);
                out.push(Diagnostic::new(
                    severity,
                    format!("{}.{}", prefix, message),
                ));
                continue;
            }
            if resolve && attr.kind().is_reference() && attr.has_value() {
                if let Err(e) = self.resolve(node, attr.name()) {
                    out.error(format!("{}.{}({}): {}", prefix, attr.name(), attr.kind(), e));
                }
            }
        }
    }

    /// True if the element or any of its references is broken
    pub fn has_errors(&self, node: NodeId) -> bool {
        let element = self.get(node);
        element.has_local_errors()
            || element.attributes().iter().any(|a| {
                a.kind().is_reference()
                    && a.has_value()
                    && a.error().is_none()
                    && self.resolve(node, a.name()).is_err()
            })
    }
}
