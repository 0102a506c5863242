//! Qualifier hierarchy

use std::collections::{BTreeSet, HashMap};

/// Component qualifiers
pub mod qualifiers {
    pub const PROJECT: &str = "TRK";
    pub const MODULE: &str = "BRC";
    pub const DIRECTORY: &str = "DIR";
    pub const FILE: &str = "FIL";
    pub const UNIT_TEST_FILE: &str = "UTS";
    pub const VIEW: &str = "VW";
    pub const SUBVIEW: &str = "SVW";
}

/// Which qualifiers may appear directly below which
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTypeTree {
    children: HashMap<String, Vec<String>>,
}

impl Default for ResourceTypeTree {
    fn default() -> Self {
        use qualifiers::*;
        Self::new([
            (PROJECT, vec![MODULE, DIRECTORY]),
            (MODULE, vec![DIRECTORY]),
            (DIRECTORY, vec![FILE, UNIT_TEST_FILE]),
            (VIEW, vec![SUBVIEW, PROJECT]),
            (SUBVIEW, vec![PROJECT]),
        ])
    }
}

impl ResourceTypeTree {
    pub fn new<'a>(relations: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>) -> Self {
        let children = relations
            .into_iter()
            .map(|(parent, kids)| {
                (
                    parent.to_string(),
                    kids.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();
        Self { children }
    }

    pub fn children(&self, qualifier: &str) -> &[String] {
        self.children
            .get(qualifier)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_children(&self, qualifier: &str) -> bool {
        !self.children(qualifier).is_empty()
    }

    /// Qualifiers reachable below `qualifier` that have no children, sorted
    pub fn leaves_qualifiers(&self, qualifier: &str) -> Vec<String> {
        let mut leaves = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.children(qualifier).iter().map(String::as_str).collect();

        while let Some(q) = stack.pop() {
            if !seen.insert(q) {
                continue;
            }
            let kids = self.children(q);
            if kids.is_empty() {
                leaves.insert(q.to_string());
            } else {
                stack.extend(kids.iter().map(String::as_str));
            }
        }
        leaves.into_iter().collect()
    }
}
