// SPDX-License-Identifier: MIT
//! Cross-reference resolution
//!
//! `idref` attributes name a document-wide id. `oidref` attributes name a
//! numeric object id that is looked up in the oid table of the owning
//! element, then its parent, and so on up to the root; the nearest match
//! wins. Results are memoized per attribute and dropped by
//! [`Document::reset_references`] whenever the tree is reshaped.

use parking_lot::RwLock;

use super::{Document, NodeId};
use crate::attribute::Attribute;
use crate::error::ReferenceError;
use crate::schema::AttrKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefState {
    Unresolved,
    Resolved(NodeId),
    Failed(ReferenceError),
}

/// Memoized target of a reference attribute
///
/// Resolution is a pure function of the tree, so two threads racing to fill
/// the cell store the same result.
#[derive(Debug)]
pub struct ReferenceCell {
    state: RwLock<RefState>,
}

impl Default for ReferenceCell {
    fn default() -> Self {
        Self {
            state: RwLock::new(RefState::Unresolved),
        }
    }
}

impl ReferenceCell {
    pub fn state(&self) -> RefState {
        self.state.read().clone()
    }

    fn store(&self, result: &Result<NodeId, ReferenceError>) {
        *self.state.write() = match result {
            Ok(node) => RefState::Resolved(*node),
            Err(e) => RefState::Failed(e.clone()),
        };
    }

    pub fn reset(&self) {
        *self.state.write() = RefState::Unresolved;
    }
}

impl Document {
    /// Resolve the reference attribute `name` of `owner`
    pub fn resolve(&self, owner: NodeId, name: &str) -> Result<NodeId, ReferenceError> {
        let attr = self
            .get(owner)
            .attribute(name)
            .ok_or_else(|| ReferenceError::NotAReference(name.to_string()))?;
        let cell = attr
            .reference()
            .ok_or_else(|| ReferenceError::NotAReference(name.to_string()))?;

        match cell.state() {
            RefState::Resolved(node) => return Ok(node),
            RefState::Failed(e) => return Err(e),
            RefState::Unresolved => {}
        }

        let result = self.lookup(owner, attr);
        cell.store(&result);
        result
    }

    /// Resolve and require the target to carry `tag`
    pub fn resolve_tagged(
        &self,
        owner: NodeId,
        name: &str,
        tag: &str,
    ) -> Result<NodeId, ReferenceError> {
        let target = self.resolve(owner, name)?;
        let found = self.get(target).tag();
        if found != tag {
            return Err(ReferenceError::WrongTarget {
                attribute: name.to_string(),
                expected: tag.to_string(),
                found: found.to_string(),
            });
        }
        Ok(target)
    }

    fn lookup(&self, owner: NodeId, attr: &Attribute) -> Result<NodeId, ReferenceError> {
        if !attr.has_value() {
            return Err(ReferenceError::Unset(attr.name().to_string()));
        }
        match attr.kind() {
            AttrKind::IdRef => {
                let id = attr
                    .as_str()
                    .ok_or_else(|| ReferenceError::Invalid(attr.name().to_string()))?;
                self.node_by_id(id)
                    .ok_or_else(|| ReferenceError::GlobalNotFound(id.to_string()))
            }
            AttrKind::OidRef => {
                let oid = attr
                    .as_i64()
                    .ok_or_else(|| ReferenceError::Invalid(attr.name().to_string()))?;
                self.lookup_scoped(owner, oid)
                    .ok_or(ReferenceError::ScopedNotFound(oid))
            }
            _ => Err(ReferenceError::NotAReference(attr.name().to_string())),
        }
    }

    /// Walk from `from` towards the root, returning the nearest element
    /// whose oid table holds `oid`
    pub fn lookup_scoped(&self, from: NodeId, oid: i64) -> Option<NodeId> {
        let mut current = Some(from);
        while let Some(node) = current {
            let element = self.get(node);
            if let Some(found) = element.oid_table.get(&oid) {
                return Some(*found);
            }
            current = element.parent();
        }
        None
    }

    /// Forget every memoized reference target
    pub fn reset_references(&self) {
        for element in &self.nodes {
            for attr in element.attributes() {
                if let Some(cell) = attr.reference() {
                    cell.reset();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Section;

    const SCOPED: &str = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
        <DVC A="DVC-1" D="A00084000D2C0A1B" F="01" G="01">
            <DET A="DET-1" B="1" C="1" E="0" F="0">
                <DOR A="10"/>
            </DET>
            <DET A="DET-2" B="2" C="3" E="1" F="1">
                <DOR A="20"/>
            </DET>
            <DPD A="10" B="0084" C="1" D="8" E="Rate"/>
            <DPD A="20" B="0086" C="1" D="8" E="Speed"/>
        </DVC>
        <DVC A="DVC-2" D="A00084000D2C0A1C" F="01" G="01">
            <DET A="DET-3" B="1" C="1" E="0" F="0">
                <DOR A="10"/>
            </DET>
            <DPD A="10" B="0084" C="1" D="8" E="Other rate"/>
        </DVC>
        <TSK A="TSK-1" G="1" C="CTR-1"/>
        <TSK A="TSK-2" G="1" C="CTR-9"/>
        <CTR A="CTR-1" B="Miller"/>
    </ISO11783_TaskData>"#;

    fn doc() -> Document {
        Document::parse("TASKDATA.XML", SCOPED, Section::TaskData).unwrap()
    }

    fn first_dor(doc: &Document, det_id: &str) -> NodeId {
        let det = doc.node_by_id(det_id).unwrap();
        doc.children_with_tag(det, "DOR").next().unwrap()
    }

    #[test]
    fn test_scoped_reference_stays_in_its_device() {
        let doc = doc();
        let dor1 = first_dor(&doc, "DET-1");
        let dor3 = first_dor(&doc, "DET-3");

        let dpd1 = doc.resolve_tagged(dor1, "deviceObjectId", "DPD").unwrap();
        let dpd3 = doc.resolve_tagged(dor3, "deviceObjectId", "DPD").unwrap();

        assert_ne!(dpd1, dpd3);
        assert_eq!(doc.get(dpd1).label(), Some("Rate"));
        assert_eq!(doc.get(dpd3).label(), Some("Other rate"));
    }

    #[test]
    fn test_global_reference_is_position_independent() {
        let doc = doc();
        let tsk = doc.node_by_id("TSK-1").unwrap();
        let ctr = doc.resolve(tsk, "customerIdRef").unwrap();
        assert_eq!(Some(ctr), doc.node_by_id("CTR-1"));
    }

    #[test]
    fn test_failure_is_cached_until_reset() {
        let doc = doc();
        let tsk = doc.node_by_id("TSK-2").unwrap();
        let err = doc.resolve(tsk, "customerIdRef").unwrap_err();
        assert_eq!(err, ReferenceError::GlobalNotFound("CTR-9".to_string()));

        let cell = doc.get(tsk).attribute("customerIdRef").unwrap().reference().unwrap();
        assert_eq!(cell.state(), RefState::Failed(err));
        doc.reset_references();
        assert_eq!(cell.state(), RefState::Unresolved);
    }

    #[test]
    fn test_unset_and_non_reference() {
        let doc = doc();
        let tsk = doc.node_by_id("TSK-1").unwrap();
        assert_eq!(
            doc.resolve(tsk, "farmIdRef"),
            Err(ReferenceError::Unset("farmIdRef".to_string()))
        );
        assert_eq!(
            doc.resolve(tsk, "taskStatus"),
            Err(ReferenceError::NotAReference("taskStatus".to_string()))
        );
    }

    #[test]
    fn test_wrong_target_tag() {
        let doc = doc();
        let dor = first_dor(&doc, "DET-1");
        assert!(matches!(
            doc.resolve_tagged(dor, "deviceObjectId", "DVP"),
            Err(ReferenceError::WrongTarget { .. })
        ));
    }
}
