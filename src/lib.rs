// SPDX-License-Identifier: MIT
//! # isoxml_decoder - ISO 11783-10 task-data decoding
//!
//! Turns a task-data archive into a validated element tree and decodes the
//! binary streams it references.
//!
//! ## Layers
//!
//! - **Archive**: case-insensitive entry lookup over the zip container
//! - **Tree**: schema-typed attributes, global and scoped references,
//!   fragment splicing and link-list identities
//! - **Streams**: TimeLogs, grids and point files
//! - **Export**: GeoJSON features and a flat triple projection
//!
//! Every recoverable problem is collected as a diagnostic instead of
//! aborting the load.
//!
//! ## Example Usage
//!
//! ```no_run
//! use isoxml_decoder::TaskData;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("taskdata.zip")?;
//! let task = TaskData::open(&bytes)?;
//! for line in task.diagnostics().to_strings() {
//!     println!("{}", line);
//! }
//! let (timelogs, _) = task.timelogs();
//! for log in &timelogs {
//!     println!("{}: {} rows", log.name(), log.rows().len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod attribute;
pub mod binary;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fragment;
pub mod geometry;
pub mod grid;
pub mod linklist;
pub mod projection;
pub mod schema;
pub mod taskdata;
pub mod timelog;
pub mod tree;
pub mod value;

pub use archive::Archive;
pub use attribute::{Attribute, Value};
pub use config::{ConfigError, DecoderConfig};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{
    AttributeError, BinaryDecodeError, DecodeError, GeoExportError, ReferenceError, Severity,
};
pub use geometry::{Geometry, GeometryBuilder, LineString, Point, Polygon};
pub use grid::{Grid, GridEntry, GridType, GridValue};
pub use schema::{AttrKind, Schema, Section};
pub use taskdata::TaskData;
pub use timelog::{GpsTime, TimeLog, TimeLogRow, ValueDescription};
pub use tree::{Document, Element, NodeId};
pub use value::ValueTranslation;
