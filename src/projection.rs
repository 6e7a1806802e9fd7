// SPDX-License-Identifier: MIT
//! Flat triple projection of the element tree
//!
//! Each reachable element becomes a resource typed by its tag, linked to its
//! parent, with one statement per valued attribute. References point at the
//! target's identity; enum values become tag-scoped tokens.

use std::fmt;

use crate::attribute::Value;
use crate::schema::AttrKind;
use crate::tree::{Document, NodeId};

pub const ISOXML: &str = "urn:isoxml:";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
const DDI: &str = "urn:ddi:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Literal { value: String, datatype: String },
}

impl Term {
    fn literal(value: impl Into<String>, xsd: &str) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: format!("{}{}", XSD, xsd),
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal { .. } => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Literal { value, datatype } => write!(f, "{:?}^^<{}>", value, datatype),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// Class of an element tag
pub fn class_iri(tag: &str) -> String {
    format!("{}{}", ISOXML, tag)
}

/// Predicate of an attribute, scoped by the element tag
pub fn predicate_iri(tag: &str, key: &str) -> String {
    format!("{}{}_{}", ISOXML, tag, key)
}

/// Project every element reachable from the root
pub fn project(doc: &Document) -> Vec<Triple> {
    let mut triples = Vec::new();
    for node in doc.descendants() {
        project_element(doc, node, &mut triples);
    }
    triples
}

fn primary_identity(doc: &Document, node: NodeId) -> String {
    doc.get(node)
        .identities()
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| doc.get(node).uri().to_string())
}

fn project_element(doc: &Document, node: NodeId, out: &mut Vec<Triple>) {
    let element = doc.get(node);
    let parent = element.parent().map(|p| primary_identity(doc, p));

    for subject in element.identities() {
        let mut push = |predicate: String, object: Term| {
            out.push(Triple {
                subject: subject.to_string(),
                predicate,
                object,
            })
        };
        push(RDF_TYPE.to_string(), Term::Iri(class_iri(element.tag())));
        if let Some(parent) = &parent {
            push(format!("{}isPartOf", ISOXML), Term::Iri(parent.clone()));
        }

        for attr in element.attributes() {
            let Some(value) = attr.value() else { continue };
            let predicate = predicate_iri(element.tag(), attr.key());
            let object = if attr.kind().is_reference() {
                match doc.resolve(node, attr.name()) {
                    Ok(target) => Term::Iri(primary_identity(doc, target)),
                    Err(_) => continue,
                }
            } else {
                match (attr.kind(), value) {
                    (_, Value::Enum { token, .. }) => {
                        Term::Iri(format!("{}#{}", predicate, token))
                    }
                    (AttrKind::Ddi, Value::Int(ddi)) => Term::Iri(format!("{}{}", DDI, ddi)),
                    (kind, value) => literal(kind, value),
                }
            };
            push(predicate, object);
        }
    }
}

fn literal(kind: AttrKind, value: &Value) -> Term {
    match value {
        Value::Text(s) => Term::literal(s.clone(), "string"),
        Value::Int(v) => {
            let xsd = match kind {
                AttrKind::ULong => "unsignedLong",
                AttrKind::UShort => "unsignedShort",
                AttrKind::Byte => "unsignedByte",
                _ => "int",
            };
            Term::literal(v.to_string(), xsd)
        }
        Value::Float(v) => {
            let xsd = if kind == AttrKind::Decimal { "decimal" } else { "double" };
            Term::literal(v.to_string(), xsd)
        }
        Value::Bytes(b) => Term::literal(hex::encode_upper(b), "hexBinary"),
        Value::DateTime(dt) => Term::literal(dt.to_rfc3339(), "dateTime"),
        Value::Enum { token, .. } => Term::literal(token.clone(), "string"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Section;

    const XML: &str = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
        <CTR A="CTR-1" B="Miller"/>
        <TSK A="TSK-1" B="Spraying" C="CTR-1" G="1">
            <TZN A="1"><PDV A="0001" B="250"/></TZN>
        </TSK>
    </ISO11783_TaskData>"#;

    fn triples_of<'a>(triples: &'a [Triple], subject: &str) -> Vec<&'a Triple> {
        triples.iter().filter(|t| t.subject == subject).collect()
    }

    #[test]
    fn test_projection() {
        let doc = Document::parse("TASKDATA.XML", XML, Section::TaskData).unwrap();
        let triples = project(&doc);

        let ctr = doc.element_by_id("CTR-1").unwrap().uri().to_string();
        let tsk_node = doc.node_by_id("TSK-1").unwrap();
        let tsk = doc.get(tsk_node).uri().to_string();
        let tsk_triples = triples_of(&triples, &tsk);

        assert!(tsk_triples
            .iter()
            .any(|t| t.predicate == RDF_TYPE && t.object == Term::Iri(class_iri("TSK"))));
        assert!(tsk_triples.iter().any(|t| t.predicate == predicate_iri("TSK", "C")
            && t.object == Term::Iri(ctr.clone())));
        assert!(tsk_triples.iter().any(|t| t.predicate == predicate_iri("TSK", "G")
            && t.object.as_iri().is_some_and(|iri| iri.ends_with("#Planned"))));
        assert!(tsk_triples.iter().any(|t| t.object
            == Term::literal("Spraying", "string")));

        let pdv = doc
            .descendants()
            .into_iter()
            .find(|n| doc.get(*n).tag() == "PDV")
            .unwrap();
        let pdv_triples = triples_of(&triples, doc.get(pdv).uri());
        assert!(pdv_triples
            .iter()
            .any(|t| t.object == Term::Iri(format!("{}1", DDI))));
        assert!(pdv_triples
            .iter()
            .any(|t| t.object == Term::literal("250", "int")));
    }

    #[test]
    fn test_display() {
        let triple = Triple {
            subject: "urn:a".into(),
            predicate: "urn:p".into(),
            object: Term::literal("x", "string"),
        };
        assert_eq!(
            triple.to_string(),
            "<urn:a> <urn:p> \"x\"^^<http://www.w3.org/2001/XMLSchema#string> ."
        );
    }
}
