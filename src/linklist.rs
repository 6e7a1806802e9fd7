// SPDX-License-Identifier: MIT
//! LINKLIST.XML integration
//!
//! A link list maps task-data ids to externally meaningful identifiers
//! (UUIDs, manufacturer keys, resolvable URIs). Elements that have links
//! expose those instead of their generated identity.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::archive::Archive;
use crate::diagnostics::Diagnostics;
use crate::error::DecodeError;
use crate::schema::Section;
use crate::tree::Document;

pub const LINK_LIST_FILE: &str = "LINKLIST.XML";
const LINK_LIST_ROOT: &str = "ISO11783LinkList";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub value: String,
    pub designator: Option<String>,
}

impl Link {
    /// The identifier this link stands for; a braced value carries it verbatim
    pub fn identity(&self) -> &str {
        self.value
            .strip_prefix('{')
            .and_then(|v| v.strip_suffix('}'))
            .unwrap_or(&self.value)
    }
}

#[derive(Debug, Default)]
pub struct LinkList {
    links: HashMap<String, Vec<Link>>,
}

impl LinkList {
    /// Collect links from a parsed link-list document. Links carrying errors
    /// or pointing at ids unknown to `task` are dropped.
    pub fn from_document(list: &Document, task: &Document) -> Result<Self, DecodeError> {
        let root = list.get(list.root());
        if root.tag() != LINK_LIST_ROOT {
            return Err(DecodeError::UnexpectedElement {
                expected: LINK_LIST_ROOT.to_string(),
                found: root.tag().to_string(),
            });
        }

        let mut links: HashMap<String, Vec<Link>> = HashMap::new();
        for group in list.children_with_tag(list.root(), "LGP") {
            for lnk in list.children_with_tag(group, "LNK") {
                let element = list.get(lnk);
                let target = element.str_attr("objectIdRef");
                let value = element.str_attr("linkValue");
                let (Some(target), Some(value)) = (target, value) else {
                    continue;
                };
                if element.has_local_errors() || task.node_by_id(target).is_none() {
                    debug!(target, "Dropping link");
                    continue;
                }
                links.entry(target.to_string()).or_default().push(Link {
                    value: value.to_string(),
                    designator: element
                        .str_attr("linkDesignator")
                        .filter(|d| !d.is_empty())
                        .map(str::to_string),
                });
            }
        }
        Ok(Self { links })
    }

    pub fn links(&self, id: &str) -> &[Link] {
        self.links.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Attach the links to their target elements; returns how many elements
    /// received links
    pub fn apply(self, task: &mut Document) -> usize {
        let mut applied = 0;
        for (id, links) in self.links {
            if let Some(node) = task.node_by_id(&id) {
                task.get_mut(node).links = links;
                applied += 1;
            }
        }
        applied
    }
}

/// True if the root document announces a link list as attached file
pub fn announces_link_list(task: &Document) -> bool {
    task.children_with_tag(task.root(), "AFE").any(|afe| {
        task.get(afe)
            .str_attr("filenameWithExtension")
            .is_some_and(|f| f.eq_ignore_ascii_case(LINK_LIST_FILE))
    })
}

/// Load LINKLIST.XML from the archive and apply it to `task`
pub fn integrate_link_list(task: &mut Document, archive: &Archive) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    if !announces_link_list(task) {
        return diagnostics;
    }

    let result = archive
        .get_xml(LINK_LIST_FILE)
        .and_then(|xml| Document::parse(LINK_LIST_FILE, xml, Section::LinkList))
        .and_then(|list| {
            let link_list = LinkList::from_document(&list, task)?;
            Ok((list, link_list))
        });

    match result {
        Ok((list, link_list)) => {
            diagnostics.extend_prefixed(LINK_LIST_FILE, list.structural_diagnostics());
            let applied = link_list.apply(task);
            debug!(elements = applied, "Integrated link list");
        }
        Err(e) => {
            warn!(error = %e, "Could not load link list");
            diagnostics.error(format!("{}: {}", LINK_LIST_FILE, e));
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK: &str = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
        <AFE A="linklist.xml" B="1" C="" D="1"/>
        <CTR A="CTR-1" B="Miller"/>
        <PFD A="PFD-1" C="Field" D="1"/>
    </ISO11783_TaskData>"#;

    const LINKS: &str = r#"<ISO11783LinkList VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
        <LGP A="LGP-1" B="1">
            <LNK A="CTR-1" B="{urn:uuid:6f1c0a1e-0000-4000-8000-000000000001}" C="uuid"/>
            <LNK A="CTR-1" B="https://example.org/customers/1"/>
            <LNK A="PFD-9" B="{urn:uuid:6f1c0a1e-0000-4000-8000-000000000002}"/>
            <LNK A="PFD-1" B="{urn:uuid:6f1c0a1e-0000-4000-8000-000000000003}" C="this designator is far too long for the schema"/>
        </LGP>
    </ISO11783LinkList>"#;

    #[test]
    fn test_link_identity_strips_braces() {
        let link = Link {
            value: "{urn:x}".to_string(),
            designator: None,
        };
        assert_eq!(link.identity(), "urn:x");
        let plain = Link {
            value: "abc".to_string(),
            designator: None,
        };
        assert_eq!(plain.identity(), "abc");
    }

    #[test]
    fn test_links_filtered_and_applied() {
        let mut task = Document::parse("TASKDATA.XML", TASK, Section::TaskData).unwrap();
        assert!(announces_link_list(&task));

        let list = Document::parse(LINK_LIST_FILE, LINKS, Section::LinkList).unwrap();
        let links = LinkList::from_document(&list, &task).unwrap();
        assert_eq!(links.links("CTR-1").len(), 2);
        assert!(links.links("PFD-9").is_empty());
        // too-long designator is only a warning
        assert_eq!(links.links("PFD-1").len(), 1);

        assert_eq!(links.apply(&mut task), 2);
        let ctr = task.element_by_id("CTR-1").unwrap();
        assert_eq!(
            ctr.identities(),
            vec![
                "urn:uuid:6f1c0a1e-0000-4000-8000-000000000001",
                "https://example.org/customers/1"
            ]
        );
        assert_eq!(ctr.links()[0].designator.as_deref(), Some("uuid"));
    }

    #[test]
    fn test_link_with_errors_is_dropped() {
        let task = Document::parse("TASKDATA.XML", TASK, Section::TaskData).unwrap();
        let xml = r#"<ISO11783LinkList VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
            <LGP A="LGP-1" B="1"><LNK A="CTR-1" B="x" Q="unexpected"/><LNK A="CTR-1" B="y" D="z"/></LGP>
        </ISO11783LinkList>"#;
        let list = Document::parse(LINK_LIST_FILE, xml, Section::LinkList).unwrap();
        // unknown attributes are warnings, so both survive
        assert_eq!(LinkList::from_document(&list, &task).unwrap().links("CTR-1").len(), 2);

        let xml = r#"<ISO11783LinkList VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
            <LGP A="LGP-1" B="1"><LNK A="CTR-1" B="x"><LNK A="CTR-1" B="nested"/></LNK></LGP>
        </ISO11783LinkList>"#;
        let list = Document::parse(LINK_LIST_FILE, xml, Section::LinkList).unwrap();
        assert!(LinkList::from_document(&list, &task).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_root() {
        let task = Document::parse("TASKDATA.XML", TASK, Section::TaskData).unwrap();
        let list = Document::parse(LINK_LIST_FILE, "<LinkList/>", Section::LinkList).unwrap();
        assert!(matches!(
            LinkList::from_document(&list, &task),
            Err(DecodeError::UnexpectedElement { .. })
        ));
    }
}
