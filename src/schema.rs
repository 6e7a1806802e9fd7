// SPDX-License-Identifier: MIT
//! Element and attribute schema
//!
//! The ISOXML element catalogue is shipped as JSON inside the crate. It is
//! split in three sections: the task-data document (and its fragments), the
//! link list, and the TimeLog header documents.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::DecodeError;

const BUILTIN_SCHEMA: &str = include_str!("../schema/isoxml.json");

static BUILTIN: Lazy<Result<Schema, String>> =
    Lazy::new(|| Schema::from_json(BUILTIN_SCHEMA).map_err(|e| e.to_string()));

/// Attribute kind as named in the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    Unknown,
    String,
    Id,
    IdRef,
    Oid,
    OidRef,
    Hex,
    Ddi,
    Long,
    ULong,
    UShort,
    Byte,
    Double,
    Decimal,
    DateTime,
    Enum,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Unknown => "unknown",
            AttrKind::String => "string",
            AttrKind::Id => "id",
            AttrKind::IdRef => "idref",
            AttrKind::Oid => "oid",
            AttrKind::OidRef => "oidref",
            AttrKind::Hex => "hex",
            AttrKind::Ddi => "ddi",
            AttrKind::Long => "long",
            AttrKind::ULong => "ulong",
            AttrKind::UShort => "ushort",
            AttrKind::Byte => "byte",
            AttrKind::Double => "double",
            AttrKind::Decimal => "decimal",
            AttrKind::DateTime => "datetime",
            AttrKind::Enum => "enum",
        }
    }

    /// Width of the field in a binary TimeLog header record
    pub fn binary_width(&self) -> Option<usize> {
        match self {
            AttrKind::Byte | AttrKind::Enum => Some(1),
            AttrKind::UShort | AttrKind::Ddi | AttrKind::Decimal => Some(2),
            AttrKind::Long | AttrKind::ULong | AttrKind::Double => Some(4),
            AttrKind::DateTime => Some(6),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, AttrKind::IdRef | AttrKind::OidRef)
    }
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttributeFormat {
    /// XML attribute name
    pub key: String,
    /// Logical name the attribute is exposed under
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AttrKind,
    #[serde(default)]
    pub required: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub length: Option<usize>,
    pub maxlength: Option<usize>,
    pub maxbytes: Option<usize>,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ContentRule {
    #[serde(default)]
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElementFormat {
    /// Display name, e.g. `DeviceElement` for `DET`
    pub name: String,
    #[serde(default)]
    pub attrib: Vec<AttributeFormat>,
    /// Allowed children by tag. `None` means no children are expected.
    #[serde(default)]
    pub content: Option<BTreeMap<String, ContentRule>>,
}

impl ElementFormat {
    pub fn attribute(&self, name: &str) -> Option<&AttributeFormat> {
        self.attrib.iter().find(|a| a.name == name)
    }
}

/// Which document family an element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    TaskData,
    LinkList,
    LogData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Schema {
    taskdata: HashMap<String, ElementFormat>,
    linklist: HashMap<String, ElementFormat>,
    logdata: HashMap<String, ElementFormat>,
}

impl Schema {
    /// The schema compiled into the crate
    pub fn builtin() -> Result<&'static Schema, DecodeError> {
        BUILTIN.as_ref().map_err(|e| DecodeError::Schema(e.clone()))
    }

    pub fn from_json(json: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(json).map_err(|e| DecodeError::Schema(e.to_string()))
    }

    pub fn section(&self, section: Section) -> &HashMap<String, ElementFormat> {
        match section {
            Section::TaskData => &self.taskdata,
            Section::LinkList => &self.linklist,
            Section::LogData => &self.logdata,
        }
    }

    pub fn element(&self, section: Section, tag: &str) -> Option<&ElementFormat> {
        self.section(section).get(tag)
    }
}
