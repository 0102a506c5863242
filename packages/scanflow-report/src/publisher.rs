//! Scanner-side metadata publishing
//!
//! Builds the report [`Metadata`] from the analysed project definition and
//! the analysis settings.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::Metadata;
use crate::writer::ReportWriter;

/// Setting holding the analysed branch name
pub const PROJECT_BRANCH_PROPERTY: &str = "sonar.branch";
/// Setting enabling cross-project duplication detection
pub const CPD_CROSS_PROJECT: &str = "sonar.cpd.cross_project";

/// The project being analysed, as declared to the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDefinition {
    /// Key as declared, without any branch suffix
    pub key: String,
    /// Epoch millis
    pub analysis_date: i64,
    pub root_component_ref: u32,
}

impl ProjectDefinition {
    pub fn new(key: impl Into<String>, analysis_date: i64) -> Self {
        Self {
            key: key.into(),
            analysis_date,
            root_component_ref: 1,
        }
    }
}

pub struct MetadataPublisher {
    project: ProjectDefinition,
    settings: HashMap<String, String>,
}

impl MetadataPublisher {
    pub fn new(project: ProjectDefinition, settings: HashMap<String, String>) -> Self {
        Self { project, settings }
    }

    /// Metadata as it will be written to the report
    pub fn metadata(&self) -> Result<Metadata> {
        let branch = self
            .settings
            .get(PROJECT_BRANCH_PROPERTY)
            .map(|b| b.trim())
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        let cross_project = self
            .settings
            .get(CPD_CROSS_PROJECT)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Metadata::new(
            self.project.analysis_date,
            self.project.key.clone(),
            branch,
            cross_project,
        )?
        .with_root_component_ref(self.project.root_component_ref))
    }

    pub fn publish(&self, writer: &mut ReportWriter) -> Result<()> {
        writer.write_metadata(&self.metadata()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_cross_project_off_by_default() {
        let publisher = MetadataPublisher::new(ProjectDefinition::new("foo", 1), HashMap::new());
        assert!(!publisher.metadata().unwrap().cross_project_duplication());
    }

    #[test]
    fn test_blank_branch_is_ignored() {
        let publisher = MetadataPublisher::new(
            ProjectDefinition::new("foo", 1),
            settings(&[(PROJECT_BRANCH_PROPERTY, "  "), (CPD_CROSS_PROJECT, "true")]),
        );
        let metadata = publisher.metadata().unwrap();
        assert_eq!(metadata.branch(), None);
        assert!(metadata.cross_project_duplication());
    }
}
