// SPDX-License-Identifier: MIT
//! Error types shared across the decoder
//!
//! `DecodeError` covers I/O-level failures (archive, XML, missing entries).
//! Attribute, reference and binary decode problems are recovered locally and
//! carried by the element, row or cell they belong to; their types live here
//! so every module reports them the same way.

use std::fmt;

/// Errors that abort loading a single document or archive entry
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry too large: {name} ({size} bytes, limit {limit})")]
    EntryTooLarge { name: String, size: u64, limit: u64 },

    #[error("Entry could not be read: {name}: {message}")]
    Unreadable { name: String, message: String },

    #[error("Malformed XML in {name}: {message}")]
    Xml { name: String, message: String },

    #[error("Entry is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Expected element {expected}, found {found}")]
    UnexpectedElement { expected: String, found: String },

    #[error("{element} has no value for {attribute}")]
    MissingAttribute { element: String, attribute: String },

    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

/// How strongly a recovered problem affects the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation failure of a single attribute value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("Missing attribute")]
    Missing,

    #[error("Invalid attribute type")]
    Invalid,

    #[error("Attribute value out of range")]
    OutOfRange,

    #[error("Attribute value is too long")]
    TooLong,

    #[error("Attribute value has not the right length")]
    WrongLength,

    #[error("Value format is invalid")]
    BadFormat,

    #[error("Unknown token {0}")]
    UnknownToken(i64),

    #[error("Unknown attribute")]
    Unknown,
}

impl AttributeError {
    /// Values that parsed but violate a constraint are kept and only warned about.
    pub fn severity(&self) -> Severity {
        match self {
            AttributeError::Missing | AttributeError::Invalid | AttributeError::UnknownToken(_) => {
                Severity::Error
            }
            AttributeError::OutOfRange
            | AttributeError::TooLong
            | AttributeError::WrongLength
            | AttributeError::BadFormat
            | AttributeError::Unknown => Severity::Warning,
        }
    }
}

/// Failure to resolve a cross-reference attribute
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("Attribute {0} is not a reference")]
    NotAReference(String),

    #[error("Reference {0} is unset")]
    Unset(String),

    #[error("Reference {0} has an invalid value")]
    Invalid(String),

    #[error("Couldn't find global reference '{0}'")]
    GlobalNotFound(String),

    #[error("Couldn't find object reference '{0}'")]
    ScopedNotFound(i64),

    #[error("Reference {attribute} points to {found}, expected {expected}")]
    WrongTarget {
        attribute: String,
        expected: String,
        found: String,
    },
}

/// Problem decoding one TimeLog row or Grid cell
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BinaryDecodeError {
    #[error("Input data incomplete")]
    Incomplete,

    #[error("Input data invalid")]
    Invalid,

    #[error("Invalid entry found")]
    Resynchronized,

    #[error("Same timestamp as before")]
    SameTimestamp,

    #[error("{0}ms earlier timestamp than before")]
    EarlierTimestamp(i64),
}

/// Geometry that cannot be expressed as valid GeoJSON
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoExportError {
    #[error("Coordinates out of range: [{east}, {north}]")]
    CoordinatesOutOfRange { north: f64, east: f64 },

    #[error("LineString needs at least 2 distinct points, found {0}")]
    TooFewPoints(usize),

    #[error("Polygon ring {ring} needs at least 3 distinct points, found {points}")]
    RingTooShort { ring: usize, points: usize },

    #[error("Polygon has {0} exterior rings")]
    MultipleExteriorRings(usize),

    #[error("Polygon has no rings")]
    NoRings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_error_messages() {
        assert_eq!(AttributeError::Missing.to_string(), "Missing attribute");
        assert_eq!(AttributeError::UnknownToken(9).to_string(), "Unknown token 9");
        assert_eq!(
            AttributeError::WrongLength.to_string(),
            "Attribute value has not the right length"
        );
    }

    #[test]
    fn test_attribute_error_severity() {
        assert_eq!(AttributeError::Invalid.severity(), Severity::Error);
        assert_eq!(AttributeError::OutOfRange.severity(), Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_reference_error_messages() {
        assert_eq!(
            ReferenceError::GlobalNotFound("DET-1".into()).to_string(),
            "Couldn't find global reference 'DET-1'"
        );
        assert_eq!(
            ReferenceError::ScopedNotFound(7).to_string(),
            "Couldn't find object reference '7'"
        );
    }

    #[test]
    fn test_binary_decode_error_messages() {
        assert_eq!(
            BinaryDecodeError::EarlierTimestamp(250).to_string(),
            "250ms earlier timestamp than before"
        );
        assert_eq!(BinaryDecodeError::Incomplete.to_string(), "Input data incomplete");
    }
}
