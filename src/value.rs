// SPDX-License-Identifier: MIT
//! Raw to physical value translation
//!
//! Process data is transmitted as integers. A value presentation (`DVP` for
//! device data, `VPN` for task data) describes how to show them:
//! `physical = (raw + offset) * scale`, rounded to a number of decimals and
//! followed by a unit.

use crate::tree::Element;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueTranslation {
    pub offset: i64,
    pub scale: f64,
    pub decimals: u8,
    pub unit: Option<String>,
}

impl Default for ValueTranslation {
    fn default() -> Self {
        Self {
            offset: 0,
            scale: 1.0,
            decimals: 0,
            unit: None,
        }
    }
}

impl ValueTranslation {
    /// Read offset, scale, decimals and unit from a `DVP` or `VPN` element
    pub fn from_presentation(element: &Element) -> Self {
        Self {
            offset: element.i64_attr("offset").unwrap_or(0),
            scale: element.f64_attr("scale").unwrap_or(1.0),
            decimals: element
                .i64_attr("numberOfDecimals")
                .and_then(|d| u8::try_from(d).ok())
                .unwrap_or(0),
            unit: element
                .str_attr("unitDesignator")
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        }
    }

    pub fn translate(&self, raw: i64) -> f64 {
        (raw + self.offset) as f64 * self.scale
    }

    /// Physical value with the declared number of decimals
    pub fn format(&self, raw: i64) -> String {
        format!("{:.*}", usize::from(self.decimals), self.translate(raw))
    }

    /// Formatted value followed by the unit, if any
    pub fn format_with_unit(&self, raw: i64) -> String {
        match &self.unit {
            Some(unit) => format!("{} {}", self.format(raw), unit),
            None => self.format(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Section;
    use crate::tree::Document;

    #[test]
    fn test_translate_and_format() {
        let t = ValueTranslation {
            offset: 10,
            scale: 0.01,
            decimals: 2,
            unit: Some("l/ha".to_string()),
        };
        assert!((t.translate(90) - 1.0).abs() < 1e-12);
        assert_eq!(t.format(12335), "123.45");
        assert_eq!(t.format_with_unit(-10), "0.00 l/ha");
    }

    #[test]
    fn test_identity_translation() {
        let t = ValueTranslation::default();
        assert_eq!(t.translate(-42), -42.0);
        assert_eq!(t.format(7), "7");
        assert_eq!(t.format_with_unit(7), "7");
    }

    #[test]
    fn test_from_value_presentation() {
        let xml = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
            <VPN A="VPN-1" B="0" C="0.001" D="1" E="kg/ha"/>
        </ISO11783_TaskData>"#;
        let doc = Document::parse("TASKDATA.XML", xml, Section::TaskData).unwrap();
        let t = ValueTranslation::from_presentation(doc.element_by_id("VPN-1").unwrap());
        assert_eq!(t.decimals, 1);
        assert_eq!(t.unit.as_deref(), Some("kg/ha"));
        assert_eq!(t.format_with_unit(15_000), "15.0 kg/ha");
    }
}
