//! Source-control blame on lines

use super::LineReader;
use scanflow_report::{Changeset, Line, ScmInfo};

/// Copies each line's changeset onto the line and remembers the most
/// recent changeset of the component.
pub struct ScmLineReader<'a> {
    scm: &'a ScmInfo,
    latest_change: Option<&'a Changeset>,
}

impl<'a> ScmLineReader<'a> {
    pub fn new(scm: &'a ScmInfo) -> Self {
        Self {
            scm,
            latest_change: None,
        }
    }

    /// Changeset with the greatest date among the lines read so far.
    /// On equal dates the first one seen is kept.
    pub fn latest_change(&self) -> Option<&'a Changeset> {
        self.latest_change
    }
}

impl LineReader for ScmLineReader<'_> {
    fn read(&mut self, line: &mut Line) {
        // Lines without a changeset get nothing
        let Some(changeset) = self.scm.changeset_for_line(line.line) else {
            return;
        };

        line.scm_revision = Some(changeset.revision.clone());
        if let Some(author) = &changeset.author {
            line.scm_author = Some(author.clone());
        }
        line.scm_date = Some(changeset.date);

        match self.latest_change {
            Some(latest) if changeset.date <= latest.date => {}
            _ => self.latest_change = Some(changeset),
        }
    }
}
