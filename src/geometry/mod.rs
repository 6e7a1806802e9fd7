// SPDX-License-Identifier: MIT
//! Points, line strings and polygons
//!
//! Geometry is built leniently from `PNT`, `LSG` and `PLN` elements: nothing
//! is rejected at construction and [`Geometry::warnings`] lists what looks
//! wrong. Strict checks happen only when exporting to GeoJSON
//! (see [`geojson`]).

pub mod geojson;

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::archive::Archive;
use crate::binary::{ByteReader, Underrun};
use crate::diagnostics::Diagnostics;
use crate::error::DecodeError;
use crate::tree::{Document, Element, NodeId};

pub use geojson::{feature, feature_collection};

macro_rules! geometry_kind {
    ($(#[$meta:meta])* $name:ident, default = $default:ident, [$($variant:ident),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Kind for a schema enum number; unknown numbers map to the default
            pub fn from_number(number: u8) -> Self {
                usize::from(number)
                    .checked_sub(1)
                    .and_then(|i| Self::ALL.get(i).copied())
                    .unwrap_or($name::$default)
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

geometry_kind!(
    PointKind,
    default = Other,
    [
        Flag,
        Other,
        FieldAccess,
        Storage,
        Obstacle,
        GuidanceReferenceA,
        GuidanceReferenceB,
        GuidanceReferenceCenter,
        GuidancePoint,
        PartfieldReferencePoint,
        Homebase,
    ]
);

geometry_kind!(
    LineKind,
    default = PolygonExterior,
    [
        PolygonExterior,
        PolygonInterior,
        TramLine,
        SamplingRoute,
        GuidancePattern,
        Drainage,
        Fence,
        Flag,
        Obstacle,
    ]
);

geometry_kind!(
    PolygonKind,
    default = Other,
    [
        PartfieldBoundary,
        TreatmentZone,
        WaterSurface,
        Building,
        Road,
        Obstacle,
        Flag,
        Other,
        Mainfield,
        Headland,
        BufferZone,
        Windbreak,
    ]
);

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub node: NodeId,
    pub path: String,
    pub kind: PointKind,
    pub designator: Option<String>,
    /// Degrees
    pub north: f64,
    pub east: f64,
    /// Millimetres
    pub up: Option<i64>,
    pub color: u8,
    /// Metres
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
}

impl Point {
    /// Same horizontal position
    pub fn same_position(&self, other: &Point) -> bool {
        self.north == other.north && self.east == other.east
    }

    fn position_key(&self) -> (u64, u64) {
        (self.north.to_bits(), self.east.to_bits())
    }

    fn warnings(&self, diagnostics: &mut Diagnostics) {
        if self.north == 0.0 && self.east == 0.0 {
            diagnostics.warn(format!("{}: Position is [0,0]", self.path));
        } else if !in_range(self.north, self.east) {
            diagnostics.warn(format!(
                "{}: Coordinates out of range [-90,+90][-180,+180]",
                self.path
            ));
        }
    }
}

pub(crate) fn in_range(north: f64, east: f64) -> bool {
    north.abs() <= 90.0 && east.abs() <= 180.0
}

fn distinct_positions(points: &[Point]) -> usize {
    points
        .iter()
        .map(Point::position_key)
        .collect::<HashSet<_>>()
        .len()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineString {
    pub node: NodeId,
    pub path: String,
    pub kind: LineKind,
    pub designator: Option<String>,
    /// Millimetres
    pub width: u64,
    pub length: u64,
    pub color: u8,
    pub points: Vec<Point>,
}

impl LineString {
    /// Points without consecutive duplicates
    pub fn deduplicated(&self) -> Vec<&Point> {
        let mut points: Vec<&Point> = Vec::with_capacity(self.points.len());
        for point in &self.points {
            if points.last().map_or(true, |last| !last.same_position(point)) {
                points.push(point);
            }
        }
        points
    }

    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => first.same_position(last),
            _ => false,
        }
    }

    fn warnings(&self, diagnostics: &mut Diagnostics) {
        for point in &self.points {
            point.warnings(diagnostics);
        }
        if distinct_positions(&self.points) < 2 {
            diagnostics.warn(format!(
                "{}: LineString must have at least 2 distinct points",
                self.path
            ));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub node: NodeId,
    pub path: String,
    pub kind: PolygonKind,
    pub designator: Option<String>,
    /// Square metres
    pub area: u64,
    pub color: u8,
    pub rings: Vec<LineString>,
}

impl Polygon {
    /// Index of the ring emitted first: the exterior ring, else ring 0
    pub fn exterior_index(&self) -> usize {
        self.rings
            .iter()
            .position(|r| r.kind == LineKind::PolygonExterior)
            .unwrap_or(0)
    }

    pub fn exterior_count(&self) -> usize {
        self.rings
            .iter()
            .filter(|r| r.kind == LineKind::PolygonExterior)
            .count()
    }

    fn warnings(&self, diagnostics: &mut Diagnostics) {
        if self.rings.is_empty() {
            diagnostics.warn(format!("{}: Polygon has no rings", self.path));
        }
        for ring in &self.rings {
            ring.warnings(diagnostics);
            if ring.points.len() > 1 {
                if !ring.is_closed() {
                    diagnostics.warn(format!("{}: Polygon ring is not closed", ring.path));
                }
                if distinct_positions(&ring.points) < 3 {
                    diagnostics.warn(format!(
                        "{}: Polygon ring must have at least 3 distinct points",
                        ring.path
                    ));
                }
            }
        }
        if self.exterior_count() > 1 {
            diagnostics.warn(format!(
                "{}: Polygon has more than one PolygonExterior ring",
                self.path
            ));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(LineString),
    Polygon(Polygon),
}

impl Geometry {
    pub fn node(&self) -> NodeId {
        match self {
            Geometry::Point(p) => p.node,
            Geometry::LineString(l) => l.node,
            Geometry::Polygon(p) => p.node,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Geometry::Point(p) => &p.path,
            Geometry::LineString(l) => &l.path,
            Geometry::Polygon(p) => &p.path,
        }
    }

    pub fn designator(&self) -> Option<&str> {
        match self {
            Geometry::Point(p) => p.designator.as_deref(),
            Geometry::LineString(l) => l.designator.as_deref(),
            Geometry::Polygon(p) => p.designator.as_deref(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Point(p) => p.kind.as_str(),
            Geometry::LineString(l) => l.kind.as_str(),
            Geometry::Polygon(p) => p.kind.as_str(),
        }
    }

    /// Problems that would make the GeoJSON export fail or look wrong
    pub fn warnings(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        match self {
            Geometry::Point(p) => p.warnings(&mut diagnostics),
            Geometry::LineString(l) => l.warnings(&mut diagnostics),
            Geometry::Polygon(p) => p.warnings(&mut diagnostics),
        }
        diagnostics
    }
}

enum PointFailure {
    Incomplete,
    NoPosition,
}

impl From<Underrun> for PointFailure {
    fn from(_: Underrun) -> Self {
        PointFailure::Incomplete
    }
}

/// Binary-backed `PNT` fields in record order
const RECORD_FIELDS: [&str; 7] = [
    "pointType",
    "pointNorth",
    "pointEast",
    "pointUp",
    "pointColour",
    "pointHorizontalAccuracy",
    "pointVerticalAccuracy",
];

/// Builds geometry from a document, reading point streams from the archive
pub struct GeometryBuilder<'a> {
    doc: &'a Document,
    archive: Option<&'a Archive>,
    diagnostics: Diagnostics,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(doc: &'a Document, archive: Option<&'a Archive>) -> Self {
        Self {
            doc,
            archive,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Problems recovered while reading point streams
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Every geometry below the root, descending through partfields,
    /// guidance groups and patterns, tasks and treatment zones
    pub fn collect(&mut self) -> Vec<Geometry> {
        let mut geometries = Vec::new();
        self.collect_from(self.doc.root(), &mut geometries);
        debug!(count = geometries.len(), "Collected geometries");
        geometries
    }

    fn collect_from(&mut self, node: NodeId, out: &mut Vec<Geometry>) {
        let doc = self.doc;
        for &child in doc.children(node) {
            match doc.get(child).tag() {
                "PFD" | "GGP" | "GPN" | "TSK" | "TZN" => self.collect_from(child, out),
                "PNT" => match self.points(child) {
                    Ok(points) => out.extend(points.into_iter().map(Geometry::Point)),
                    Err(e) => self.skip(child, &e),
                },
                "LSG" => match self.line_string(child) {
                    Ok(line) => out.push(Geometry::LineString(line)),
                    Err(e) => self.skip(child, &e),
                },
                "PLN" => match self.polygon(child) {
                    Ok(polygon) => out.push(Geometry::Polygon(polygon)),
                    Err(e) => self.skip(child, &e),
                },
                _ => {}
            }
        }
    }

    fn skip(&mut self, node: NodeId, error: &DecodeError) {
        let path = self.doc.path(node);
        warn!(element = %path, error = %error, "Skipping geometry");
        self.diagnostics.error(format!("{}: {}", path, error));
    }

    fn expect_tag(&self, node: NodeId, tag: &str) -> Result<&'a Element, DecodeError> {
        let element = self.doc.get(node);
        if element.tag() != tag {
            return Err(DecodeError::UnexpectedElement {
                expected: tag.to_string(),
                found: element.tag().to_string(),
            });
        }
        Ok(element)
    }

    /// The point of a `PNT`, or every point of its binary stream
    pub fn points(&mut self, pnt: NodeId) -> Result<Vec<Point>, DecodeError> {
        let element = self.expect_tag(pnt, "PNT")?;
        let no_position =
            || DecodeError::InvalidData(format!("{}: point has no position", self.doc.path(pnt)));
        let Some(filename) = element.str_attr("filename").filter(|f| !f.is_empty()) else {
            return match self.point(pnt, None) {
                Ok(point) => Ok(vec![point]),
                Err(_) => Err(no_position()),
            };
        };

        let name = format!("{}.bin", filename);
        let archive = self
            .archive
            .ok_or_else(|| DecodeError::NotFound(name.clone()))?;
        let data = archive.get_bin(&name)?;
        let mut reader = ByteReader::new(data);
        let mut points = Vec::new();
        while reader.has_remaining() {
            let start = reader.position();
            match self.point(pnt, Some(&mut reader)) {
                Ok(point) => points.push(point),
                Err(PointFailure::NoPosition) => return Err(no_position()),
                Err(PointFailure::Incomplete) => {
                    self.diagnostics.warn(format!(
                        "{} [{}]: Input data incomplete",
                        name,
                        points.len()
                    ));
                    break;
                }
            }
            if reader.position() == start {
                break;
            }
        }
        Ok(points)
    }

    fn point(
        &self,
        pnt: NodeId,
        mut record: Option<&mut ByteReader<'_>>,
    ) -> Result<Point, PointFailure> {
        let element = self.doc.get(pnt);
        let deferred = |name: &str| element.attribute(name).is_some_and(|a| a.is_deferred());
        let mut values: [Option<f64>; 7] = [None; 7];
        for (i, name) in RECORD_FIELDS.iter().enumerate() {
            values[i] = match record.as_deref_mut() {
                Some(reader) if deferred(name) => Some(match i {
                    0 | 4 => f64::from(reader.read_u8()?),
                    1 | 2 => f64::from(reader.read_i32()?) * 1e-7,
                    3 => f64::from(reader.read_i32()?),
                    _ => f64::from(reader.read_u16()?) / 1000.0,
                }),
                _ => element
                    .attribute(name)
                    .and_then(|a| a.as_f64().or_else(|| a.as_i64().map(|v| v as f64))),
            };
        }

        Ok(Point {
            node: pnt,
            path: self.doc.path(pnt),
            kind: PointKind::from_number(values[0].unwrap_or_default() as u8),
            designator: designator(element, "pointDesignator"),
            north: values[1].ok_or(PointFailure::NoPosition)?,
            east: values[2].ok_or(PointFailure::NoPosition)?,
            up: values[3].map(|v| v as i64),
            color: values[4].unwrap_or_default() as u8,
            horizontal_accuracy: values[5].unwrap_or_default(),
            vertical_accuracy: values[6].unwrap_or_default(),
        })
    }

    pub fn line_string(&mut self, lsg: NodeId) -> Result<LineString, DecodeError> {
        let element = self.expect_tag(lsg, "LSG")?;
        let mut points = Vec::new();
        let children: Vec<NodeId> = self.doc.children_with_tag(lsg, "PNT").collect();
        for pnt in children {
            match self.points(pnt) {
                Ok(mut read) => points.append(&mut read),
                Err(e) => self.skip(pnt, &e),
            }
        }
        Ok(LineString {
            node: lsg,
            path: self.doc.path(lsg),
            kind: LineKind::from_number(enum_number(element, "lineStringType")),
            designator: designator(element, "lineStringDesignator"),
            width: unsigned(element, "lineStringWidth"),
            length: unsigned(element, "lineStringLength"),
            color: unsigned(element, "lineStringColour") as u8,
            points,
        })
    }

    pub fn polygon(&mut self, pln: NodeId) -> Result<Polygon, DecodeError> {
        let element = self.expect_tag(pln, "PLN")?;
        let children: Vec<NodeId> = self.doc.children_with_tag(pln, "LSG").collect();
        let rings = children
            .into_iter()
            .map(|lsg| self.line_string(lsg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon {
            node: pln,
            path: self.doc.path(pln),
            kind: PolygonKind::from_number(enum_number(element, "polygonType")),
            designator: designator(element, "polygonDesignator"),
            area: unsigned(element, "polygonArea"),
            color: unsigned(element, "polygonColour") as u8,
            rings,
        })
    }
}

fn designator(element: &Element, name: &str) -> Option<String> {
    element
        .str_attr(name)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

fn enum_number(element: &Element, name: &str) -> u8 {
    element
        .attribute(name)
        .and_then(|a| a.enum_number())
        .unwrap_or_default()
}

fn unsigned(element: &Element, name: &str) -> u64 {
    element
        .i64_attr(name)
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Section;

    const FIELD: &str = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
        <PFD A="PFD-1" C="North field" D="10000">
            <PNT A="2" B="Gate" C="52.5" D="7.25" E="1200" F="3"/>
            <PLN A="1" B="Boundary" C="10000">
                <LSG A="1">
                    <PNT A="2" C="52.0" D="7.0"/>
                    <PNT A="2" C="52.0" D="7.1"/>
                    <PNT A="2" C="52.0" D="7.1"/>
                    <PNT A="2" C="52.1" D="7.1"/>
                </LSG>
            </PLN>
            <GGP A="GGP-1">
                <GPN A="GPN-1" C="1">
                    <LSG A="5" B="AB line" C="3000">
                        <PNT A="6" C="52.0" D="7.0"/>
                        <PNT A="7" C="52.0" D="7.0"/>
                    </LSG>
                </GPN>
            </GGP>
        </PFD>
        <CTR A="CTR-1" B="Miller"/>
    </ISO11783_TaskData>"#;

    #[test]
    fn test_kind_numbers() {
        assert_eq!(PointKind::from_number(1), PointKind::Flag);
        assert_eq!(PointKind::from_number(11), PointKind::Homebase);
        assert_eq!(PointKind::from_number(0), PointKind::Other);
        assert_eq!(LineKind::from_number(9), LineKind::Obstacle);
        assert_eq!(LineKind::from_number(42), LineKind::PolygonExterior);
        assert_eq!(PolygonKind::from_number(12).as_str(), "Windbreak");
    }

    #[test]
    fn test_collect_walks_containers() {
        let doc = Document::parse("TASKDATA.XML", FIELD, Section::TaskData).unwrap();
        let mut builder = GeometryBuilder::new(&doc, None);
        let geometries = builder.collect();
        assert!(builder.diagnostics().is_empty());

        let kinds: Vec<&str> = geometries.iter().map(Geometry::kind_name).collect();
        assert_eq!(kinds, vec!["Other", "PartfieldBoundary", "GuidancePattern"]);

        let Geometry::Point(gate) = &geometries[0] else {
            panic!("expected a point");
        };
        assert_eq!(gate.designator.as_deref(), Some("Gate"));
        assert_eq!(gate.up, Some(1200));
        assert_eq!(gate.color, 3);

        let Geometry::Polygon(boundary) = &geometries[1] else {
            panic!("expected a polygon");
        };
        assert_eq!(boundary.area, 10000);
        assert_eq!(boundary.rings[0].deduplicated().len(), 3);
    }

    #[test]
    fn test_lenient_warnings() {
        let doc = Document::parse("TASKDATA.XML", FIELD, Section::TaskData).unwrap();
        let geometries = GeometryBuilder::new(&doc, None).collect();

        assert!(geometries[0].warnings().is_empty());
        let polygon = geometries[1].warnings().to_strings();
        assert_eq!(polygon.len(), 1);
        assert!(polygon[0].ends_with("Polygon ring is not closed"));
        let line = geometries[2].warnings().to_strings();
        assert!(line[0].ends_with("LineString must have at least 2 distinct points"));
    }

    #[test]
    fn test_origin_position_warning() {
        let xml = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
            <PFD A="PFD-1" C="Field" D="1"><PNT A="1" C="0" D="0"/></PFD>
        </ISO11783_TaskData>"#;
        let doc = Document::parse("TASKDATA.XML", xml, Section::TaskData).unwrap();
        let geometries = GeometryBuilder::new(&doc, None).collect();
        assert!(geometries[0].warnings().to_strings()[0].ends_with("Position is [0,0]"));
    }

    #[test]
    fn test_wrong_element() {
        let doc = Document::parse("TASKDATA.XML", FIELD, Section::TaskData).unwrap();
        let mut builder = GeometryBuilder::new(&doc, None);
        assert!(matches!(
            builder.points(doc.root()),
            Err(DecodeError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn test_point_stream_without_archive() {
        let xml = r#"<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
            <PFD A="PFD-1" C="Field" D="1"><PNT A="2" C="" D="" J="PNT00001"/></PFD>
        </ISO11783_TaskData>"#;
        let doc = Document::parse("TASKDATA.XML", xml, Section::TaskData).unwrap();
        let mut builder = GeometryBuilder::new(&doc, None);
        assert!(builder.collect().is_empty());
        assert_eq!(builder.diagnostics().len(), 1);
    }
}
