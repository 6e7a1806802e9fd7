// SPDX-License-Identifier: MIT
//! External file references
//!
//! Large task sets may be split across several XML files. The root document
//! then holds `XFR` placeholders naming `<filename>.xml` entries whose root
//! (`XFC`) children belong where the placeholder stood.

use tracing::{debug, warn};

use crate::archive::Archive;
use crate::diagnostics::Diagnostics;
use crate::error::DecodeError;
use crate::tree::{Document, NodeId};

const PLACEHOLDER_TAG: &str = "XFR";

/// Replace every `XFR` child of the root with the content of its fragment.
/// A fragment that cannot be loaded is dropped and reported.
pub fn resolve_fragments(doc: &mut Document, archive: &Archive) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let root = doc.root();
    let placeholders: Vec<NodeId> = doc.children_with_tag(root, PLACEHOLDER_TAG).collect();

    for placeholder in placeholders {
        let filename = doc
            .get(placeholder)
            .str_attr("filename")
            .filter(|f| !f.is_empty())
            .map(|f| format!("{}.xml", f));
        let Some(position) = doc.detach(placeholder) else {
            continue;
        };

        let Some(filename) = filename else {
            diagnostics.error(format!("{}: Missing filename", doc.path(placeholder)));
            continue;
        };

        match splice(doc, archive, &filename, position) {
            Ok(count) => debug!(fragment = %filename, elements = count, "Spliced fragment"),
            Err(e) => {
                warn!(fragment = %filename, error = %e, "Skipping fragment");
                diagnostics.error(format!("{}: {}", filename, e));
            }
        }
    }

    doc.reset_references();
    diagnostics
}

fn splice(
    doc: &mut Document,
    archive: &Archive,
    filename: &str,
    position: usize,
) -> Result<usize, DecodeError> {
    let xml = archive.get_xml(filename)?;
    let fragment_root = doc.build_subtree(filename, xml, doc.section())?;
    let children = doc.children(fragment_root).to_vec();
    doc.attach_children(doc.root(), position, &children);
    Ok(children.len())
}
