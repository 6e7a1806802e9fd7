// SPDX-License-Identifier: MIT
//! Loading a task-data archive
//!
//! [`TaskData`] opens the archive, builds the root document, splices
//! external fragments and integrates the link list. TimeLogs, grids and
//! geometry are decoded on request and not cached.

use tracing::{info, warn};

use crate::archive::Archive;
use crate::config::DecoderConfig;
use crate::diagnostics::Diagnostics;
use crate::error::DecodeError;
use crate::fragment::resolve_fragments;
use crate::geometry::{Geometry, GeometryBuilder, Point};
use crate::grid::Grid;
use crate::linklist::integrate_link_list;
use crate::schema::Section;
use crate::timelog::TimeLog;
use crate::tree::{Document, Element, NodeId};

pub struct TaskData {
    archive: Archive,
    document: Document,
    config: DecoderConfig,
    load_diagnostics: Diagnostics,
}

impl TaskData {
    pub fn open(data: &[u8]) -> Result<Self, DecodeError> {
        Self::open_with_config(data, DecoderConfig::default())
    }

    /// Fails only if the archive or its root document cannot be read
    pub fn open_with_config(data: &[u8], config: DecoderConfig) -> Result<Self, DecodeError> {
        config.validate()?;
        let archive = Archive::open_with_config(data, &config)?;
        let xml = archive.get_xml(&config.root_document)?;
        let mut document = Document::parse(&config.root_document, xml, Section::TaskData)?;

        let mut load_diagnostics = Diagnostics::new();
        if config.resolve_fragments {
            load_diagnostics.extend(resolve_fragments(&mut document, &archive));
        }
        if config.integrate_link_list {
            load_diagnostics.extend(integrate_link_list(&mut document, &archive));
        }

        info!(
            entries = archive.len(),
            elements = document.descendants().len(),
            problems = load_diagnostics.len(),
            "Loaded task data"
        );
        Ok(Self {
            archive,
            document,
            config,
            load_diagnostics,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.document.element_by_id(id)
    }

    /// Load problems followed by every element problem, in document order
    pub fn diagnostics(&self) -> Diagnostics {
        let mut diagnostics = self.load_diagnostics.clone();
        diagnostics.extend(self.document.diagnostics());
        diagnostics
    }

    fn nodes_with_tag(&self, tag: &str) -> Vec<NodeId> {
        self.document
            .descendants()
            .into_iter()
            .filter(|n| self.document.get(*n).tag() == tag)
            .collect()
    }

    pub fn timelog(&self, tlg: NodeId) -> Result<TimeLog, DecodeError> {
        TimeLog::load(&self.document, &self.archive, tlg, &self.config)
    }

    /// Every readable TimeLog; unreadable ones are reported and skipped
    pub fn timelogs(&self) -> (Vec<TimeLog>, Diagnostics) {
        self.load_each("TLG", |node| self.timelog(node))
    }

    pub fn grid(&self, grd: NodeId) -> Result<Grid, DecodeError> {
        Grid::load(&self.document, &self.archive, grd, &self.config)
    }

    /// Every readable grid; unreadable ones are reported and skipped
    pub fn grids(&self) -> (Vec<Grid>, Diagnostics) {
        self.load_each("GRD", |node| self.grid(node))
    }

    pub fn geometries(&self) -> (Vec<Geometry>, Diagnostics) {
        let mut builder = GeometryBuilder::new(&self.document, Some(&self.archive));
        let geometries = builder.collect();
        (geometries, builder.into_diagnostics())
    }

    /// The point of a `PNT`, or all points of its binary stream
    pub fn points(&self, pnt: NodeId) -> Result<Vec<Point>, DecodeError> {
        GeometryBuilder::new(&self.document, Some(&self.archive)).points(pnt)
    }

    fn load_each<T>(
        &self,
        tag: &str,
        load: impl Fn(NodeId) -> Result<T, DecodeError>,
    ) -> (Vec<T>, Diagnostics) {
        let mut loaded = Vec::new();
        let mut diagnostics = Diagnostics::new();
        for node in self.nodes_with_tag(tag) {
            match load(node) {
                Ok(item) => loaded.push(item),
                Err(e) => {
                    let path = self.document.path(node);
                    warn!(element = %path, error = %e, "Skipping unreadable {}", tag);
                    diagnostics.error(format!("{}: {}", path, e));
                }
            }
        }
        (loaded, diagnostics)
    }
}
