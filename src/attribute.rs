// SPDX-License-Identifier: MIT
//! Typed attribute values
//!
//! Every XML attribute is parsed against its schema entry into an
//! [`Attribute`]: the raw text, the typed [`Value`] if it could be parsed,
//! and at most one validation error. A raw value that is present but empty
//! is not an error for non-text kinds; it marks a field whose value lives
//! in a companion binary stream.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AttributeError, Severity};
use crate::schema::{AttrKind, AttributeFormat};
use crate::tree::reference::ReferenceCell;

static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}-?\d{1,10}$").unwrap());

const OID_RANGE: (f64, f64) = (1.0, 65534.0);
const DDI_RANGE: (f64, f64) = (0.0, 65534.0);
const ULONG_RANGE: (f64, f64) = (0.0, 4_294_967_294.0);
const USHORT_RANGE: (f64, f64) = (0.0, 65535.0);
const BYTE_RANGE: (f64, f64) = (0.0, 254.0);

/// Parsed attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    DateTime(DateTime<FixedOffset>),
    Enum { number: u8, token: String },
}

#[derive(Debug)]
pub struct Attribute {
    key: String,
    name: String,
    kind: AttrKind,
    raw: Option<String>,
    value: Option<Value>,
    error: Option<AttributeError>,
    reference: Option<ReferenceCell>,
}

impl Attribute {
    /// Parse `raw` according to its schema entry
    pub fn parse(format: &AttributeFormat, raw: Option<&str>) -> Self {
        let (value, error) = match raw {
            None if format.required => (None, Some(AttributeError::Missing)),
            None => (None, None),
            Some(raw) => parse_value(format, raw),
        };

        Self {
            key: format.key.clone(),
            name: format.name.clone(),
            kind: format.kind,
            raw: raw.map(str::to_string),
            value,
            error,
            reference: format.kind.is_reference().then(ReferenceCell::default),
        }
    }

    /// An attribute the schema does not declare for its element
    pub fn unknown(key: &str, raw: &str) -> Self {
        Self {
            key: key.to_string(),
            name: key.to_string(),
            kind: AttrKind::Unknown,
            raw: Some(raw.to_string()),
            value: Some(Value::Text(raw.to_string())),
            error: Some(AttributeError::Unknown),
            reference: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&AttributeError> {
        self.error.as_ref()
    }

    pub(crate) fn reference(&self) -> Option<&ReferenceCell> {
        self.reference.as_ref()
    }

    /// Present in the XML, possibly empty
    pub fn is_set(&self) -> bool {
        self.raw.is_some()
    }

    /// Present with a non-empty raw value
    pub fn has_value(&self) -> bool {
        self.raw.as_deref().is_some_and(|r| !r.is_empty())
    }

    /// Present but empty: the value is stored in a binary stream
    pub fn is_deferred(&self) -> bool {
        self.raw.as_deref() == Some("")
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Some(Value::Text(s)) => Some(s),
            Some(Value::Enum { token, .. }) => Some(token),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            Some(Value::Int(v)) => Some(*v),
            Some(Value::Enum { number, .. }) => Some(i64::from(*number)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            Some(Value::Float(v)) => Some(*v),
            Some(Value::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Some(Value::Bytes(b)) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match &self.value {
            Some(Value::DateTime(dt)) => Some(dt),
            _ => None,
        }
    }

    pub fn enum_number(&self) -> Option<u8> {
        match &self.value {
            Some(Value::Enum { number, .. }) => Some(*number),
            _ => None,
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.error.as_ref().map(AttributeError::severity)
    }

    /// `name(kind): message` if the attribute failed validation
    pub fn describe_error(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|e| format!("{}({}): {}", self.name, self.kind, e))
    }
}

fn parse_value(format: &AttributeFormat, raw: &str) -> (Option<Value>, Option<AttributeError>) {
    match format.kind {
        AttrKind::Unknown | AttrKind::String => {
            let error = check_text(format, raw);
            (Some(Value::Text(raw.to_string())), error)
        }
        _ if raw.is_empty() => (None, None),
        AttrKind::Id | AttrKind::IdRef => {
            let error = (!ID_PATTERN.is_match(raw)).then_some(AttributeError::BadFormat);
            (Some(Value::Text(raw.to_string())), error)
        }
        AttrKind::Oid | AttrKind::OidRef => parse_int(format, raw, OID_RANGE),
        AttrKind::Ddi => match i64::from_str_radix(raw, 16) {
            Ok(v) => (Some(Value::Int(v)), check_range(format, v as f64, DDI_RANGE)),
            Err(_) => (None, Some(AttributeError::Invalid)),
        },
        AttrKind::Long => match raw.parse::<i32>() {
            Ok(v) => {
                let error = check_range(format, f64::from(v), (f64::MIN, f64::MAX));
                (Some(Value::Int(i64::from(v))), error)
            }
            Err(_) => (None, Some(AttributeError::Invalid)),
        },
        AttrKind::ULong => parse_int(format, raw, ULONG_RANGE),
        AttrKind::UShort => parse_int(format, raw, USHORT_RANGE),
        AttrKind::Byte => parse_int(format, raw, BYTE_RANGE),
        AttrKind::Double | AttrKind::Decimal => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => {
                let error = check_range(format, v, (f64::MIN, f64::MAX));
                (Some(Value::Float(v)), error)
            }
            _ => (None, Some(AttributeError::Invalid)),
        },
        AttrKind::Hex => match hex::decode(raw) {
            Ok(bytes) => {
                let error = format
                    .maxbytes
                    .filter(|max| bytes.len() > *max)
                    .map(|_| AttributeError::TooLong);
                (Some(Value::Bytes(bytes)), error)
            }
            Err(_) => (None, Some(AttributeError::Invalid)),
        },
        AttrKind::DateTime => match parse_datetime(raw) {
            Some(dt) => (Some(Value::DateTime(dt)), None),
            None => (None, Some(AttributeError::Invalid)),
        },
        AttrKind::Enum => parse_enum(format, raw),
    }
}

fn parse_int(
    format: &AttributeFormat,
    raw: &str,
    default_range: (f64, f64),
) -> (Option<Value>, Option<AttributeError>) {
    match raw.parse::<i64>() {
        Ok(v) => (Some(Value::Int(v)), check_range(format, v as f64, default_range)),
        Err(_) => (None, Some(AttributeError::Invalid)),
    }
}

fn parse_enum(format: &AttributeFormat, raw: &str) -> (Option<Value>, Option<AttributeError>) {
    let Ok(number) = raw.parse::<i64>() else {
        return (None, Some(AttributeError::Invalid));
    };
    let Ok(byte) = u8::try_from(number) else {
        return (None, Some(AttributeError::UnknownToken(number)));
    };
    match format.values.get(usize::from(byte)) {
        Some(token) if !token.is_empty() => (
            Some(Value::Enum {
                number: byte,
                token: token.clone(),
            }),
            None,
        ),
        _ => (
            Some(Value::Enum {
                number: byte,
                token: String::new(),
            }),
            Some(AttributeError::UnknownToken(number)),
        ),
    }
}

fn check_text(format: &AttributeFormat, raw: &str) -> Option<AttributeError> {
    let len = raw.chars().count();
    if format.length.is_some_and(|expected| len != expected) {
        return Some(AttributeError::WrongLength);
    }
    if format.maxlength.is_some_and(|max| len > max) {
        return Some(AttributeError::TooLong);
    }
    None
}

fn check_range(
    format: &AttributeFormat,
    value: f64,
    (default_min, default_max): (f64, f64),
) -> Option<AttributeError> {
    let min = format.min.unwrap_or(default_min);
    let max = format.max.unwrap_or(default_max);
    (value < min || value > max).then_some(AttributeError::OutOfRange)
}

/// ISO-8601 with offset, or local time taken as UTC
fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(kind: &str, extra: &str) -> AttributeFormat {
        let json = format!(
            r#"{{"key":"A","name":"testValue","type":"{}"{}}}"#,
            kind, extra
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_missing_required() {
        let attr = Attribute::parse(&format("long", r#","required":true"#), None);
        assert_eq!(attr.error(), Some(&AttributeError::Missing));
        assert!(!attr.is_set());
        assert_eq!(
            attr.describe_error().unwrap(),
            "testValue(long): Missing attribute"
        );
    }

    #[test]
    fn test_absent_optional_is_clean() {
        let attr = Attribute::parse(&format("long", ""), None);
        assert!(attr.error().is_none());
        assert!(attr.value().is_none());
    }

    #[test]
    fn test_empty_value_is_deferred() {
        let attr = Attribute::parse(&format("double", r#","required":true"#), Some(""));
        assert!(attr.is_deferred());
        assert!(attr.is_set());
        assert!(!attr.has_value());
        assert!(attr.error().is_none());
        assert!(attr.value().is_none());
    }

    #[test]
    fn test_long_parsing() {
        let f = format("long", r#","min":0,"max":100"#);
        assert_eq!(Attribute::parse(&f, Some("42")).as_i64(), Some(42));
        assert_eq!(
            Attribute::parse(&f, Some("101")).error(),
            Some(&AttributeError::OutOfRange)
        );
        assert_eq!(
            Attribute::parse(&f, Some("4.5")).error(),
            Some(&AttributeError::Invalid)
        );
        assert_eq!(
            Attribute::parse(&format("long", ""), Some("3000000000")).error(),
            Some(&AttributeError::Invalid)
        );
    }

    #[test]
    fn test_default_ranges() {
        assert_eq!(
            Attribute::parse(&format("oid", ""), Some("0")).error(),
            Some(&AttributeError::OutOfRange)
        );
        assert!(Attribute::parse(&format("oid", ""), Some("65534")).error().is_none());
        assert_eq!(
            Attribute::parse(&format("byte", ""), Some("255")).error(),
            Some(&AttributeError::OutOfRange)
        );
        assert_eq!(
            Attribute::parse(&format("ulong", ""), Some("4294967295")).error(),
            Some(&AttributeError::OutOfRange)
        );
        assert!(Attribute::parse(&format("ushort", ""), Some("65535")).error().is_none());
        // schema bounds replace the defaults
        assert!(Attribute::parse(&format("oid", r#","min":0"#), Some("0")).error().is_none());
    }

    #[test]
    fn test_ddi_is_hex() {
        let attr = Attribute::parse(&format("ddi", ""), Some("0084"));
        assert_eq!(attr.as_i64(), Some(0x84));
        assert_eq!(
            Attribute::parse(&format("ddi", ""), Some("FFFF")).error(),
            Some(&AttributeError::OutOfRange)
        );
        assert_eq!(
            Attribute::parse(&format("ddi", ""), Some("XYZ")).error(),
            Some(&AttributeError::Invalid)
        );
    }

    #[test]
    fn test_string_length_rules() {
        let fixed = format("string", r#","length":8"#);
        assert!(Attribute::parse(&fixed, Some("TLG00001")).error().is_none());
        assert_eq!(
            Attribute::parse(&fixed, Some("TLG1")).error(),
            Some(&AttributeError::WrongLength)
        );
        let bounded = format("string", r#","maxlength":4"#);
        assert_eq!(
            Attribute::parse(&bounded, Some("Hallo")).error(),
            Some(&AttributeError::TooLong)
        );
        assert_eq!(Attribute::parse(&bounded, Some("Feld")).as_str(), Some("Feld"));
    }

    #[test]
    fn test_id_format() {
        assert!(Attribute::parse(&format("id", ""), Some("DET-1")).error().is_none());
        assert!(Attribute::parse(&format("id", ""), Some("PFD12")).error().is_none());
        let bad = Attribute::parse(&format("id", ""), Some("det-1"));
        assert_eq!(bad.error(), Some(&AttributeError::BadFormat));
        assert_eq!(bad.as_str(), Some("det-1"));
    }

    #[test]
    fn test_hex() {
        let f = format("hex", r#","maxbytes":2"#);
        assert_eq!(
            Attribute::parse(&f, Some("A0FF")).as_bytes(),
            Some(&[0xA0, 0xFF][..])
        );
        assert_eq!(
            Attribute::parse(&f, Some("A0FF01")).error(),
            Some(&AttributeError::TooLong)
        );
        assert_eq!(
            Attribute::parse(&f, Some("GG")).error(),
            Some(&AttributeError::Invalid)
        );
    }

    #[test]
    fn test_double_rejects_non_finite() {
        assert_eq!(
            Attribute::parse(&format("double", ""), Some("NaN")).error(),
            Some(&AttributeError::Invalid)
        );
        assert_eq!(
            Attribute::parse(&format("decimal", ""), Some("12.5")).as_f64(),
            Some(12.5)
        );
    }

    #[test]
    fn test_datetime_offset_and_local() {
        let f = format("datetime", "");
        let with_offset = Attribute::parse(&f, Some("2021-06-01T10:00:00+02:00"));
        assert_eq!(
            with_offset.as_datetime().unwrap().to_rfc3339(),
            "2021-06-01T10:00:00+02:00"
        );
        let local = Attribute::parse(&f, Some("2021-06-01T10:00:00.250"));
        assert_eq!(
            local.as_datetime().unwrap().to_rfc3339(),
            "2021-06-01T10:00:00.250+00:00"
        );
        assert_eq!(
            Attribute::parse(&f, Some("yesterday")).error(),
            Some(&AttributeError::Invalid)
        );
    }

    #[test]
    fn test_enum_tokens() {
        let f = format("enum", r#","values":["","Planned","Running"]"#);
        let attr = Attribute::parse(&f, Some("2"));
        assert_eq!(attr.enum_number(), Some(2));
        assert_eq!(attr.as_str(), Some("Running"));

        assert_eq!(
            Attribute::parse(&f, Some("0")).error(),
            Some(&AttributeError::UnknownToken(0))
        );
        assert_eq!(
            Attribute::parse(&f, Some("9")).error(),
            Some(&AttributeError::UnknownToken(9))
        );
        assert_eq!(
            Attribute::parse(&f, Some("-1")).error(),
            Some(&AttributeError::UnknownToken(-1))
        );
    }

    #[test]
    fn test_unknown_attribute() {
        let attr = Attribute::unknown("Z", "abc");
        assert_eq!(attr.kind(), AttrKind::Unknown);
        assert_eq!(attr.error(), Some(&AttributeError::Unknown));
        assert_eq!(attr.describe_error().unwrap(), "Z(unknown): Unknown attribute");
    }

    #[test]
    fn test_references_get_a_cache() {
        assert!(Attribute::parse(&format("idref", ""), Some("DET-1"))
            .reference()
            .is_some());
        assert!(Attribute::parse(&format("oidref", ""), Some("3"))
            .reference()
            .is_some());
        assert!(Attribute::parse(&format("oid", ""), Some("3"))
            .reference()
            .is_none());
    }
}
