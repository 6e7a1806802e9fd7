// SPDX-License-Identifier: MIT
//! Grid decoding
//!
//! A `GRD` element geo-references a row-major grid of cells stored in
//! `<filename>.bin`. Type 1 cells are a single byte selecting one of the
//! task's treatment zones. Type 2 cells hold one little-endian `i32` per
//! value placeholder of a single referenced zone.

use std::collections::HashMap;

use tracing::debug;

use crate::archive::Archive;
use crate::binary::ByteReader;
use crate::config::DecoderConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{BinaryDecodeError, DecodeError};
use crate::tree::{Document, NodeId};
use crate::value::ValueTranslation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridType {
    /// Zone index per cell
    ZoneIndexed,
    /// Values of one zone per cell
    FixedZone,
}

impl GridType {
    fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(GridType::ZoneIndexed),
            2 => Some(GridType::FixedZone),
            _ => None,
        }
    }
}

/// A process data value declared by a treatment zone
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneValue {
    pub process_data: NodeId,
    pub ddi: u16,
    pub value: i32,
    pub translation: ValueTranslation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentZone {
    pub node: NodeId,
    pub code: i64,
    pub designator: Option<String>,
    pub values: Vec<ZoneValue>,
}

impl TreatmentZone {
    fn from_element(task: &Document, tzn: NodeId, only_placeholders: bool) -> Self {
        let element = task.get(tzn);
        let values = task
            .children_with_tag(tzn, "PDV")
            .filter_map(|pdv| {
                let e = task.get(pdv);
                let ddi = e.i64_attr("processDataDdi").and_then(|d| u16::try_from(d).ok())?;
                let value = e
                    .i64_attr("processDataValue")
                    .and_then(|v| i32::try_from(v).ok())
                    .unwrap_or(0);
                let translation = task
                    .resolve_tagged(pdv, "valuePresentationIdRef", "VPN")
                    .map(|vpn| ValueTranslation::from_presentation(task.get(vpn)))
                    .unwrap_or_default();
                Some(ZoneValue {
                    process_data: pdv,
                    ddi,
                    value,
                    translation,
                })
            })
            .filter(|v| !only_placeholders || v.value == 0)
            .collect();

        Self {
            node: tzn,
            code: element.i64_attr("treatmentZoneCode").unwrap_or_default(),
            designator: element
                .str_attr("treatmentZoneDesignator")
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridEntry {
    pub row: usize,
    pub col: usize,
    pub north_min: f64,
    pub east_min: f64,
    pub north_size: f64,
    pub east_size: f64,
    zone: Option<usize>,
    values: Vec<i32>,
    error: Option<BinaryDecodeError>,
}

impl GridEntry {
    fn new(grid: &GridGeometry, row: usize, col: usize) -> Self {
        Self {
            row,
            col,
            north_min: grid.min_north + row as f64 * grid.cell_north,
            east_min: grid.min_east + col as f64 * grid.cell_east,
            north_size: grid.cell_north,
            east_size: grid.cell_east,
            zone: None,
            values: Vec::new(),
            error: None,
        }
    }

    pub fn north_max(&self) -> f64 {
        self.north_min + self.north_size
    }

    pub fn east_max(&self) -> f64 {
        self.east_min + self.east_size
    }

    /// Raw values in the order of the zone's value list
    pub fn raw_values(&self) -> &[i32] {
        &self.values
    }

    pub fn error(&self) -> Option<&BinaryDecodeError> {
        self.error.as_ref()
    }

    /// True if any value of the cell is non-zero
    pub fn has_value(&self) -> bool {
        self.values.iter().any(|v| *v != 0)
    }
}

/// A cell value together with the zone value it belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridValue<'a> {
    pub info: &'a ZoneValue,
    pub value: i32,
}

impl GridValue<'_> {
    pub fn ddi(&self) -> u16 {
        self.info.ddi
    }

    pub fn translate(&self) -> f64 {
        self.info.translation.translate(i64::from(self.value))
    }

    pub fn format(&self) -> String {
        self.info.translation.format_with_unit(i64::from(self.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct GridGeometry {
    min_north: f64,
    min_east: f64,
    cell_north: f64,
    cell_east: f64,
}

#[derive(Debug, Clone)]
pub struct Grid {
    name: String,
    grid_type: GridType,
    rows: usize,
    cols: usize,
    geometry: GridGeometry,
    zones: Vec<TreatmentZone>,
    entries: Vec<GridEntry>,
    /// Declared cells past the end of the data
    missing: usize,
}

impl Grid {
    /// Load the grid described by the `GRD` element `grd`
    pub fn load(
        task: &Document,
        archive: &Archive,
        grd: NodeId,
        config: &DecoderConfig,
    ) -> Result<Self, DecodeError> {
        let name = grid_filename(task, grd)?;
        let data = archive.get_bin(&format!("{}.bin", name))?;
        Self::decode(task, grd, data, config)
    }

    /// Decode `data` as the cells of `grd`
    pub fn decode(
        task: &Document,
        grd: NodeId,
        data: &[u8],
        config: &DecoderConfig,
    ) -> Result<Self, DecodeError> {
        let element = task.get(grd);
        if element.tag() != "GRD" {
            return Err(DecodeError::UnexpectedElement {
                expected: "GRD".to_string(),
                found: element.tag().to_string(),
            });
        }
        let name = grid_filename(task, grd)?.to_string();
        let required_f64 = |attribute: &str| {
            element
                .f64_attr(attribute)
                .ok_or_else(|| DecodeError::MissingAttribute {
                    element: task.path(grd),
                    attribute: attribute.to_string(),
                })
        };
        let required_count = |attribute: &str| {
            element
                .i64_attr(attribute)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| DecodeError::MissingAttribute {
                    element: task.path(grd),
                    attribute: attribute.to_string(),
                })
        };

        let geometry = GridGeometry {
            min_north: required_f64("gridMinimumNorthPosition")?,
            min_east: required_f64("gridMinimumEastPosition")?,
            cell_north: required_f64("gridCellNorthSize")?,
            cell_east: required_f64("gridCellEastSize")?,
        };
        let rows = required_count("gridMaximumRow")?;
        let cols = required_count("gridMaximumColumn")?;

        let number = element
            .attribute("gridType")
            .and_then(|a| a.enum_number())
            .ok_or_else(|| DecodeError::MissingAttribute {
                element: task.path(grd),
                attribute: "gridType".to_string(),
            })?;
        let grid_type = GridType::from_number(number)
            .ok_or_else(|| DecodeError::Unsupported(format!("Unknown grid type {}", number)))?;

        let zones = match grid_type {
            GridType::ZoneIndexed => {
                let zones: Vec<TreatmentZone> = element
                    .parent()
                    .map(|tsk| {
                        task.children_with_tag(tsk, "TZN")
                            .map(|tzn| TreatmentZone::from_element(task, tzn, false))
                            .collect()
                    })
                    .unwrap_or_default();
                if zones.is_empty() {
                    return Err(DecodeError::InvalidData(format!(
                        "{}: no treatment zones for grid type 1",
                        name
                    )));
                }
                zones
            }
            GridType::FixedZone => {
                let tzn = task.resolve_tagged(grd, "treatmentZoneCode", "TZN")?;
                vec![TreatmentZone::from_element(task, tzn, true)]
            }
        };

        let stride = match grid_type {
            GridType::ZoneIndexed => 1,
            GridType::FixedZone => 4 * zones[0].values.len(),
        };
        if stride == 0 {
            return Err(DecodeError::InvalidData(format!(
                "{}: treatment zone {} has no value placeholders",
                name, zones[0].code
            )));
        }
        let cells = rows.checked_mul(cols).ok_or_else(|| {
            DecodeError::InvalidData(format!("{}: {}x{} grid is too large", name, rows, cols))
        })?;
        let declared = cells
            .checked_mul(stride)
            .and_then(|bytes| u64::try_from(bytes).ok());
        match declared {
            Some(bytes) if bytes <= config.max_entry_size => {}
            _ => {
                return Err(DecodeError::InvalidData(format!(
                    "{}: {}x{} grid exceeds the size limit",
                    name, rows, cols
                )))
            }
        }

        // Only cells backed by data are materialized
        let present = cells.min(data.len() / stride);
        let mut grid = Self {
            name,
            grid_type,
            rows,
            cols,
            geometry,
            zones,
            entries: Vec::with_capacity(present),
            missing: cells - present,
        };
        grid.read_cells(data, present);
        debug!(
            grid = %grid.name,
            rows,
            cols,
            missing = grid.missing,
            "Decoded grid"
        );
        Ok(grid)
    }

    fn read_cells(&mut self, data: &[u8], present: usize) {
        let mut reader = ByteReader::new(data);
        let by_code: HashMap<i64, usize> = self
            .zones
            .iter()
            .enumerate()
            .rev()
            .map(|(i, z)| (z.code, i))
            .collect();

        for index in 0..present {
            let mut entry = GridEntry::new(&self.geometry, index / self.cols, index % self.cols);
            match self.grid_type {
                GridType::ZoneIndexed => match reader.read_u8() {
                    Ok(code) => match by_code.get(&i64::from(code)) {
                        Some(&zone) => {
                            entry.zone = Some(zone);
                            entry.values = self.zones[zone].values.iter().map(|v| v.value).collect();
                        }
                        None => entry.error = Some(BinaryDecodeError::Invalid),
                    },
                    Err(_) => entry.error = Some(BinaryDecodeError::Incomplete),
                },
                GridType::FixedZone => {
                    entry.zone = Some(0);
                    for _ in 0..self.zones[0].values.len() {
                        match reader.read_i32() {
                            Ok(value) => entry.values.push(value),
                            Err(_) => {
                                entry.error = Some(BinaryDecodeError::Incomplete);
                                break;
                            }
                        }
                    }
                }
            }
            self.entries.push(entry);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.cols
    }

    /// Declared number of cells, including those missing from the data
    pub fn len(&self) -> usize {
        self.entries.len() + self.missing
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trailing cells the data ended before
    pub fn missing_cells(&self) -> usize {
        self.missing
    }

    pub fn zones(&self) -> &[TreatmentZone] {
        &self.zones
    }

    /// Cells read from the data, in row-major order
    pub fn entries(&self) -> &[GridEntry] {
        &self.entries
    }

    pub fn entry(&self, row: usize, col: usize) -> Option<&GridEntry> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.entries.get(row * self.cols + col)
    }

    pub fn zone(&self, entry: &GridEntry) -> Option<&TreatmentZone> {
        entry.zone.map(|z| &self.zones[z])
    }

    pub fn values<'a>(&'a self, entry: &GridEntry) -> Vec<GridValue<'a>> {
        match self.zone(entry) {
            Some(zone) => zone
                .values
                .iter()
                .zip(entry.values.iter())
                .map(|(info, value)| GridValue {
                    info,
                    value: *value,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn value_at(&self, row: usize, col: usize, ddi: u16) -> Option<GridValue<'_>> {
        let entry = self.entry(row, col)?;
        self.values(entry).into_iter().find(|v| v.ddi() == ddi)
    }

    /// Cell problems as `name [row,col]: message`; the cells missing at
    /// the end of the data are reported once.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for entry in &self.entries {
            if let Some(error) = &entry.error {
                diagnostics.error(format!("{} [{},{}]: {}", self.name, entry.row, entry.col, error));
            }
        }
        if self.missing > 0 {
            let first = self.entries.len();
            let mut message = format!(
                "{} [{},{}]: {}",
                self.name,
                first / self.cols,
                first % self.cols,
                BinaryDecodeError::Incomplete
            );
            if self.missing > 1 {
                message.push_str(&format!(" ({} cells)", self.missing));
            }
            diagnostics.error(message);
        }
        diagnostics
    }
}

fn grid_filename(task: &Document, grd: NodeId) -> Result<&str, DecodeError> {
    task.get(grd)
        .str_attr("filename")
        .filter(|f| !f.is_empty())
        .ok_or_else(|| DecodeError::MissingAttribute {
            element: task.path(grd),
            attribute: "filename".to_string(),
        })
}
