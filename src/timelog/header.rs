// SPDX-License-Identifier: MIT
//! TimeLog row header layout
//!
//! The header XML (`TIM` with an optional `PTN` child) names the fields
//! present in every binary row. An attribute with an empty value is read
//! from the row; one with a value is constant for the whole log.

use chrono::Utc;

use crate::attribute::{Attribute, Value};
use crate::binary::{ByteReader, Underrun};
use crate::error::DecodeError;
use crate::schema::AttrKind;
use crate::timelog::gps::GpsTime;
use crate::tree::Document;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaderValue {
    Time(GpsTime),
    Int(i64),
    Float(f64),
}

impl HeaderValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            HeaderValue::Time(_) => None,
        }
    }

    pub fn as_time(&self) -> Option<GpsTime> {
        match self {
            HeaderValue::Time(t) => Some(*t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderField {
    pub name: String,
    pub kind: AttrKind,
    /// Read from each row rather than copied from the XML
    pub binary: bool,
    pub constant: Option<HeaderValue>,
}

impl HeaderField {
    fn from_attribute(attr: &Attribute) -> Result<Self, DecodeError> {
        let binary = attr.is_deferred();
        if binary && attr.kind().binary_width().is_none() {
            return Err(DecodeError::Unsupported(format!(
                "{}({}) cannot be stored in a binary row",
                attr.name(),
                attr.kind()
            )));
        }
        let constant = match attr.value() {
            Some(Value::Int(v)) => Some(HeaderValue::Int(*v)),
            Some(Value::Float(v)) => Some(HeaderValue::Float(*v)),
            Some(Value::Enum { number, .. }) => Some(HeaderValue::Int(i64::from(*number))),
            Some(Value::DateTime(dt)) => GpsTime::from_datetime(&dt.with_timezone(&Utc)).map(HeaderValue::Time),
            _ => None,
        };
        Ok(Self {
            name: attr.name().to_string(),
            kind: attr.kind(),
            binary,
            constant,
        })
    }

    /// Decode this field from a binary row
    pub fn read(&self, reader: &mut ByteReader<'_>) -> Result<HeaderValue, Underrun> {
        Ok(match self.kind {
            AttrKind::DateTime => HeaderValue::Time(GpsTime::read(reader)?),
            AttrKind::Byte | AttrKind::Enum => HeaderValue::Int(i64::from(reader.read_u8()?)),
            AttrKind::UShort | AttrKind::Ddi => HeaderValue::Int(i64::from(reader.read_u16()?)),
            AttrKind::ULong => HeaderValue::Int(i64::from(reader.read_u32()?)),
            AttrKind::Double => HeaderValue::Float(f64::from(reader.read_i32()?) * 1e-7),
            AttrKind::Decimal => HeaderValue::Float(f64::from(reader.read_i16()?) / 10.0),
            _ => HeaderValue::Int(i64::from(reader.read_i32()?)),
        })
    }
}

/// Ordered header fields; the first is always the row timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLayout {
    fields: Vec<HeaderField>,
}

impl HeaderLayout {
    pub fn from_document(header: &Document) -> Result<Self, DecodeError> {
        let root = header.get(header.root());
        if root.tag() != "TIM" {
            return Err(DecodeError::UnexpectedElement {
                expected: "TIM".to_string(),
                found: root.tag().to_string(),
            });
        }

        let start = root
            .attribute("start")
            .ok_or_else(|| DecodeError::MissingAttribute {
                element: "TIM".to_string(),
                attribute: "start".to_string(),
            })?;
        let mut fields = vec![HeaderField {
            name: start.name().to_string(),
            kind: AttrKind::DateTime,
            binary: true,
            constant: None,
        }];

        if let Some(ptn) = header.children_with_tag(header.root(), "PTN").next() {
            for attr in header.get(ptn).attributes() {
                if attr.is_set() && attr.kind() != AttrKind::Unknown {
                    fields.push(HeaderField::from_attribute(attr)?);
                }
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of a field by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}
