//! Report data model
//!
//! A report is one [`Metadata`] record followed by any number of
//! [`ComponentSection`]s. Sections carry the per-line accumulators plus the
//! raw SCM and duplication data the server-side enrichers consume.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ReportError, Result};

// ═══════════════════════════════════════════════════════════════════════════
// Metadata
// ═══════════════════════════════════════════════════════════════════════════

/// Analysis-wide metadata. Always the first record of a report.
///
/// Cross-project duplication is never active on a branch: the flag is
/// forced to `false` whenever `branch` is set, whatever the caller asked for.
///
/// ```rust
/// use scanflow_report::Metadata;
///
/// let metadata = Metadata::new(1234567, "foo", Some("myBranch".into()), true).unwrap();
/// assert!(!metadata.cross_project_duplication());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    analysis_date: i64,
    project_key: String,
    branch: Option<String>,
    cross_project_duplication: bool,
    root_component_ref: u32,
}

impl Metadata {
    /// Create metadata. Fails if `project_key` is blank.
    pub fn new(
        analysis_date: i64,
        project_key: impl Into<String>,
        branch: Option<String>,
        cross_project_duplication: bool,
    ) -> Result<Self> {
        let project_key = project_key.into();
        if project_key.trim().is_empty() {
            return Err(ReportError::invalid_input("project key must not be blank"));
        }
        let cross_project_duplication = cross_project_duplication && branch.is_none();
        Ok(Self {
            analysis_date,
            project_key,
            branch,
            cross_project_duplication,
            root_component_ref: 1,
        })
    }

    pub fn with_root_component_ref(mut self, root_component_ref: u32) -> Self {
        self.root_component_ref = root_component_ref;
        self
    }

    /// Analysis date, epoch millis
    pub fn analysis_date(&self) -> i64 {
        self.analysis_date
    }

    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn cross_project_duplication(&self) -> bool {
        self.cross_project_duplication
    }

    pub fn root_component_ref(&self) -> u32 {
        self.root_component_ref
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Components
// ═══════════════════════════════════════════════════════════════════════════

/// Stable identifier of a component inside a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKey {
    /// Reference number assigned by the scanner
    Ref(u32),
    Uuid(Uuid),
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKey::Ref(r) => write!(f, "ref:{}", r),
            ComponentKey::Uuid(u) => write!(f, "uuid:{}", u),
        }
    }
}

/// One source file (or other line-bearing component) of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSection {
    pub key: ComponentKey,
    pub path: Option<String>,
    /// 1-indexed, contiguous
    pub lines: Vec<Line>,
    pub scm: Option<ScmInfo>,
    pub duplications: Vec<Duplication>,
}

impl ComponentSection {
    /// Section with `line_count` blank lines numbered `1..=line_count`
    pub fn new(key: ComponentKey, line_count: u32) -> Self {
        Self {
            key,
            path: None,
            lines: (1..=line_count).map(Line::new).collect(),
            scm: None,
            duplications: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_scm(mut self, scm: ScmInfo) -> Self {
        self.scm = Some(scm);
        self
    }

    pub fn with_duplication(mut self, duplication: Duplication) -> Self {
        self.duplications.push(duplication);
        self
    }

    /// Check the 1-indexed, gap-free line numbering
    ///
    /// Returns the index of the first offending line.
    pub fn first_line_gap(&self) -> Option<usize> {
        self.lines
            .iter()
            .enumerate()
            .find(|(idx, line)| line.line as usize != idx + 1)
            .map(|(idx, _)| idx)
    }

    /// Check everything the reader verifies when decoding a section
    pub fn validate(&self) -> Result<()> {
        if let Some(idx) = self.first_line_gap() {
            return Err(ReportError::invalid_input(format!(
                "component {} has line {} at position {}",
                self.key,
                self.lines[idx].line,
                idx + 1
            )));
        }
        if let Some(scm) = &self.scm {
            if let Some((line, idx)) = scm
                .changeset_index_by_line
                .iter()
                .enumerate()
                .find(|(_, idx)| **idx as usize >= scm.changesets.len())
            {
                return Err(ReportError::invalid_input(format!(
                    "component {} line {} points at changeset {} out of {}",
                    self.key,
                    line + 1,
                    idx,
                    scm.changesets.len()
                )));
            }
        }
        let ranges = self.duplications.iter().flat_map(|d| {
            std::iter::once(&d.original).chain(d.duplicates.iter().map(|dup| &dup.range))
        });
        for range in ranges {
            if !range.is_valid() {
                return Err(ReportError::invalid_input(format!(
                    "component {} has invalid text range {}..={}",
                    self.key, range.start_line, range.end_line
                )));
            }
        }
        Ok(())
    }
}

/// Per-line accumulator, filled progressively by the enrichers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Line {
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scm_date: Option<i64>,
    /// Ids of the duplication blocks covering this line
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplications: Vec<u32>,
}

impl Line {
    pub fn new(line: u32) -> Self {
        Self {
            line,
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SCM
// ═══════════════════════════════════════════════════════════════════════════

/// One source-control revision as seen by a line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    pub author: Option<String>,
    pub revision: String,
    /// Epoch millis
    pub date: i64,
}

impl Changeset {
    pub fn new(author: Option<&str>, revision: impl Into<String>, date: i64) -> Self {
        Self {
            author: author.map(str::to_string),
            revision: revision.into(),
            date,
        }
    }
}

/// Changesets of one component plus, for each line, the index of its changeset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScmInfo {
    pub changesets: Vec<Changeset>,
    /// `changeset_index_by_line[n - 1]` is the changeset of line `n`
    pub changeset_index_by_line: Vec<u32>,
}

impl ScmInfo {
    pub fn new(changesets: Vec<Changeset>, changeset_index_by_line: Vec<u32>) -> Self {
        Self {
            changesets,
            changeset_index_by_line,
        }
    }

    /// Changeset for a 1-indexed line, `None` when the line is not covered
    pub fn changeset_for_line(&self, line: u32) -> Option<&Changeset> {
        let idx = (line as usize).checked_sub(1)?;
        let changeset_idx = *self.changeset_index_by_line.get(idx)?;
        self.changesets.get(changeset_idx as usize)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Duplications
// ═══════════════════════════════════════════════════════════════════════════

/// Inclusive range of 1-indexed lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl TextRange {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// 1-indexed and not reversed
    pub fn is_valid(&self) -> bool {
        self.start_line > 0 && self.end_line >= self.start_line
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// A copy of the original block, in this component or another one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    /// `None` for a duplicate inside the same component
    pub other_component: Option<ComponentKey>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplication {
    pub original: TextRange,
    pub duplicates: Vec<Duplicate>,
}

impl Duplication {
    pub fn new(original: TextRange) -> Self {
        Self {
            original,
            duplicates: Vec::new(),
        }
    }

    pub fn with_inner_duplicate(mut self, range: TextRange) -> Self {
        self.duplicates.push(Duplicate {
            other_component: None,
            range,
        });
        self
    }

    pub fn with_external_duplicate(mut self, component: ComponentKey, range: TextRange) -> Self {
        self.duplicates.push(Duplicate {
            other_component: Some(component),
            range,
        });
        self
    }
}
