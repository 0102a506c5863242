//! Line enrichment
//!
//! Each component's lines run through the configured readers in order.
//! A reader fills fields of the line accumulator; a later reader may
//! overwrite what an earlier one set, so the configured order decides
//! which source wins.

pub mod duplication;
pub mod scm;

pub use duplication::DuplicationLineReader;
pub use scm::ScmLineReader;

use scanflow_report::{Changeset, ComponentKey, ComponentSection, Line};
use serde::{Deserialize, Serialize};

/// Something that can contribute fields to a line given its number
///
/// Readers with no data for a line leave it untouched.
pub trait LineReader {
    fn read(&mut self, line: &mut Line);
}

/// Enricher names as they appear in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnricherKind {
    Scm,
    Duplication,
}

impl EnricherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnricherKind::Scm => "scm",
            EnricherKind::Duplication => "duplication",
        }
    }

    /// Default order: blame first, then duplication
    pub fn default_order() -> Vec<EnricherKind> {
        vec![EnricherKind::Scm, EnricherKind::Duplication]
    }
}

impl std::fmt::Display for EnricherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A component after enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedComponent {
    pub key: ComponentKey,
    pub path: Option<String>,
    pub lines: Vec<Line>,
    /// Most recent changeset across the component's lines
    pub latest_change: Option<Changeset>,
}

enum ConfiguredReader<'a> {
    Scm(ScmLineReader<'a>),
    Duplication(DuplicationLineReader),
}

impl LineReader for ConfiguredReader<'_> {
    fn read(&mut self, line: &mut Line) {
        match self {
            ConfiguredReader::Scm(reader) => reader.read(line),
            ConfiguredReader::Duplication(reader) => reader.read(line),
        }
    }
}

/// Ordered list of enrichers applied to every component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePipeline {
    order: Vec<EnricherKind>,
}

impl Default for LinePipeline {
    fn default() -> Self {
        Self::new(EnricherKind::default_order())
    }
}

impl LinePipeline {
    pub fn new(order: Vec<EnricherKind>) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &[EnricherKind] {
        &self.order
    }

    pub fn enrich(&self, section: ComponentSection) -> EnrichedComponent {
        let ComponentSection {
            key,
            path,
            mut lines,
            scm,
            duplications,
        } = section;

        let mut readers: Vec<ConfiguredReader<'_>> = self
            .order
            .iter()
            .filter_map(|kind| match kind {
                EnricherKind::Scm => scm.as_ref().map(|s| ConfiguredReader::Scm(ScmLineReader::new(s))),
                EnricherKind::Duplication => Some(ConfiguredReader::Duplication(
                    DuplicationLineReader::new(&duplications),
                )),
            })
            .collect();

        for line in lines.iter_mut() {
            for reader in readers.iter_mut() {
                reader.read(line);
            }
        }

        let latest_change = readers.iter().find_map(|reader| match reader {
            ConfiguredReader::Scm(scm) => scm.latest_change().cloned(),
            ConfiguredReader::Duplication(_) => None,
        });

        EnrichedComponent {
            key,
            path,
            lines,
            latest_change,
        }
    }
}
