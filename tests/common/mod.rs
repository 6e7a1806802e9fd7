//! Shared test fixtures for the integration tests
//!
//! Builds task-data archives in memory: XML documents for the root, the
//! TimeLog headers and the binary streams they describe.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

use isoxml_decoder::GpsTime;

/// Days since 1980-01-01 used for generated timestamps (2021-01-25)
pub const TEST_DAY: u16 = 15_000;

/// In-memory zip archive under construction
#[derive(Default)]
pub struct ArchiveBuilder {
    files: Vec<(String, Vec<u8>)>,
    stored: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((name.to_string(), content.into()));
        self
    }

    /// Write entries uncompressed so their bytes appear verbatim
    pub fn stored(mut self) -> Self {
        self.stored = true;
        self
    }

    /// Root document stored under `TASKDATA/TASKDATA.XML`
    pub fn task_data(self, body: &str) -> Self {
        self.file("TASKDATA/TASKDATA.XML", task_data_xml(body))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let mut options = SimpleFileOptions::default();
        if self.stored {
            options = options.compression_method(zip::CompressionMethod::Stored);
        }
        for (name, content) in &self.files {
            writer.start_file(name.as_str(), options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Write the archive into `dir` and return its path
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join("taskdata.zip");
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

pub fn task_data_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ISO11783_TaskData VersionMajor="4" VersionMinor="3" DataTransferOrigin="1">
{}
</ISO11783_TaskData>"#,
        body
    )
}

/// A device with one element `DET-1` and three process data entries:
/// 0x0001 (rate), 0x0006 (mass) and 0x0084 (speed, km/h presentation)
pub const SPRAYER: &str = r#"<DVC A="DVC-1" B="Sprayer" D="A00084000D2C0A1B" F="01" G="01">
    <DET A="DET-1" B="1" C="1" D="Boom" E="0" F="0">
        <DOR A="10"/><DOR A="11"/><DOR A="12"/>
    </DET>
    <DPD A="10" B="0001" C="1" D="8" E="Rate"/>
    <DPD A="11" B="0006" C="1" D="8" E="Mass"/>
    <DPD A="12" B="0084" C="1" D="8" E="Speed" F="20"/>
    <DVP A="20" B="0" C="0.001" D="1" E="km/h"/>
</DVC>"#;

/// TimeLog header with only the time field, one DLV per `(ddi, element)`
pub fn timelog_header(values: &[(u16, &str)]) -> String {
    let dlvs: String = values
        .iter()
        .map(|(ddi, det)| format!(r#"<DLV A="{:04X}" C="{}"/>"#, ddi, det))
        .collect();
    format!(r#"<TIM A="" D="4">{}</TIM>"#, dlvs)
}

/// One binary TimeLog row with a time-only header
pub fn encode_row(time: GpsTime, values: &[(u8, i32)]) -> Vec<u8> {
    let mut bytes = time.to_bytes().to_vec();
    bytes.push(values.len() as u8);
    for (slot, value) in values {
        bytes.push(*slot);
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Timestamp `seconds` after 01:00 on [`TEST_DAY`]
pub fn time_at(seconds: i32) -> GpsTime {
    GpsTime::new(3_600_000 + seconds * 1_000, TEST_DAY)
}

/// Cells of a fixed-zone grid, row by row
pub fn encode_fixed_grid(cells: &[Vec<i32>]) -> Vec<u8> {
    cells
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}
