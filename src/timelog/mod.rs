// SPDX-License-Identifier: MIT
//! TimeLog decoding
//!
//! A `TLG` element names two archive entries: `<filename>.xml` describing
//! the row layout and `<filename>.bin` holding the rows. Each row is
//!
//! ```text
//! GPS time (6) | binary header fields | count (1) | count x (slot (1), value (4))
//! ```
//!
//! Values are sparse: a row only carries the slots that changed.

pub mod description;
pub mod gps;
pub mod header;

use std::collections::BTreeMap;

use tracing::debug;

pub use description::{describe_slots, ValueDescription};
pub use gps::{find_next_valid_time, GpsTime, ResyncWindow};
pub use header::{HeaderField, HeaderLayout, HeaderValue};

use crate::archive::Archive;
use crate::binary::{ByteReader, Underrun};
use crate::config::DecoderConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{BinaryDecodeError, DecodeError, ReferenceError};
use crate::schema::Section;
use crate::tree::{Document, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeLogRow {
    /// Row number within the log
    pub index: usize,
    pub time: Option<GpsTime>,
    /// One entry per header field, constants filled in
    pub header: Vec<Option<HeaderValue>>,
    /// Raw values by slot
    pub values: BTreeMap<u8, i32>,
    pub errors: Vec<BinaryDecodeError>,
}

impl TimeLogRow {
    fn new(index: usize, layout: &HeaderLayout) -> Self {
        Self {
            index,
            time: None,
            header: layout.fields().iter().map(|f| f.constant).collect(),
            values: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn value(&self, slot: u8) -> Option<i32> {
        self.values.get(&slot).copied()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

enum RowFailure {
    Incomplete,
    Invalid,
}

impl From<Underrun> for RowFailure {
    fn from(_: Underrun) -> Self {
        RowFailure::Incomplete
    }
}

/// Decode all rows of a binary TimeLog
pub fn decode_rows(
    layout: &HeaderLayout,
    slot_count: usize,
    data: &[u8],
    window: ResyncWindow,
) -> Vec<TimeLogRow> {
    let mut reader = ByteReader::new(data);
    let mut rows = Vec::new();
    let mut last: Option<GpsTime> = None;

    while reader.has_remaining() {
        let start = reader.position();
        let mut row = TimeLogRow::new(rows.len(), layout);

        match decode_row(&mut reader, &mut row, layout, slot_count, last, window) {
            Ok(()) => {}
            Err(RowFailure::Incomplete) => {
                row.errors.push(BinaryDecodeError::Incomplete);
                reader.set_position(reader.len());
            }
            Err(RowFailure::Invalid) => row.errors.push(BinaryDecodeError::Invalid),
        }

        if row.time.is_some() {
            last = row.time;
        }
        rows.push(row);
        if reader.position() == start {
            break;
        }
    }
    rows
}

fn decode_row(
    reader: &mut ByteReader<'_>,
    row: &mut TimeLogRow,
    layout: &HeaderLayout,
    slot_count: usize,
    last: Option<GpsTime>,
    window: ResyncWindow,
) -> Result<(), RowFailure> {
    let (time, consumed) = find_next_valid_time(reader, last, window)?;
    row.time = Some(time);
    row.header[0] = Some(HeaderValue::Time(time));

    if consumed > gps::GPS_TIME_SIZE {
        row.errors.push(BinaryDecodeError::Resynchronized);
    } else if let Some(last) = last {
        if time == last {
            row.errors.push(BinaryDecodeError::SameTimestamp);
        } else if time.days == last.days && time.ms < last.ms {
            row.errors.push(BinaryDecodeError::EarlierTimestamp(
                i64::from(last.ms) - i64::from(time.ms),
            ));
        }
    }

    for (i, field) in layout.fields().iter().enumerate().skip(1) {
        if field.binary {
            row.header[i] = Some(field.read(reader)?);
        }
    }

    let count = reader.read_u8()?;
    for _ in 0..count {
        let slot = reader.read_u8()?;
        let value = reader.read_i32()?;
        if usize::from(slot) >= slot_count {
            return Err(RowFailure::Invalid);
        }
        row.values.insert(slot, value);
    }
    Ok(())
}

#[derive(Debug)]
pub struct TimeLog {
    name: String,
    layout: HeaderLayout,
    descriptions: Vec<Result<ValueDescription, ReferenceError>>,
    rows: Vec<TimeLogRow>,
}

impl TimeLog {
    /// Load the TimeLog described by the `TLG` element `tlg`
    pub fn load(
        task: &Document,
        archive: &Archive,
        tlg: NodeId,
        config: &DecoderConfig,
    ) -> Result<Self, DecodeError> {
        let element = task.get(tlg);
        if element.tag() != "TLG" {
            return Err(DecodeError::UnexpectedElement {
                expected: "TLG".to_string(),
                found: element.tag().to_string(),
            });
        }
        let name = element
            .str_attr("filename")
            .filter(|f| !f.is_empty())
            .ok_or_else(|| DecodeError::MissingAttribute {
                element: task.path(tlg),
                attribute: "filename".to_string(),
            })?;

        let xml_name = format!("{}.xml", name);
        let header = Document::parse(&xml_name, archive.get_xml(&xml_name)?, Section::LogData)?;
        let data = archive.get_bin(&format!("{}.bin", name))?;
        Self::decode(name, task, &header, data, config)
    }

    /// Decode `data` using the layout and slots declared by `header`
    pub fn decode(
        name: &str,
        task: &Document,
        header: &Document,
        data: &[u8],
        config: &DecoderConfig,
    ) -> Result<Self, DecodeError> {
        let layout = HeaderLayout::from_document(header)?;
        let descriptions = describe_slots(task, header);
        let window = ResyncWindow {
            max_days_ahead: config.time_resync_days,
            max_backstep_ms: config.max_time_backstep_ms,
        };
        let rows = decode_rows(&layout, descriptions.len(), data, window);
        debug!(timelog = name, rows = rows.len(), slots = descriptions.len(), "Decoded TimeLog");

        Ok(Self {
            name: name.to_string(),
            layout,
            descriptions,
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }

    pub fn rows(&self) -> &[TimeLogRow] {
        &self.rows
    }

    pub fn slot_count(&self) -> usize {
        self.descriptions.len()
    }

    pub fn value_descriptions(&self) -> &[Result<ValueDescription, ReferenceError>] {
        &self.descriptions
    }

    pub fn description(&self, slot: u8) -> Option<&ValueDescription> {
        self.descriptions
            .get(usize::from(slot))
            .and_then(|d| d.as_ref().ok())
    }

    /// Physical value of `raw` in `slot`
    pub fn translate(&self, slot: u8, raw: i32) -> Option<f64> {
        self.description(slot)
            .map(|d| d.translation.translate(i64::from(raw)))
    }

    /// Row and slot problems as `name [row]: message`
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for (slot, description) in self.descriptions.iter().enumerate() {
            if let Err(e) = description {
                diagnostics.error(format!("{} DLV[{}]: {}", self.name, slot, e));
            }
        }
        for row in &self.rows {
            for error in &row.errors {
                diagnostics.error(format!("{} [{}]: {}", self.name, row.index, error));
            }
        }
        diagnostics
    }
}
