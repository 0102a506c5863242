//! Duplication blocks on lines

use super::LineReader;
use scanflow_report::{Duplication, Line, TextRange};

/// Marks every line with the ids of the duplicated blocks covering it
///
/// Blocks are the original range and in-file duplicates of each
/// duplication, sorted by (start, end) and numbered from 1. A duplicate
/// living in another component contributes no block here; only its
/// original does.
pub struct DuplicationLineReader {
    blocks: Vec<TextRange>,
}

impl DuplicationLineReader {
    pub fn new(duplications: &[Duplication]) -> Self {
        let mut blocks = Vec::new();
        for duplication in duplications {
            blocks.push(duplication.original);
            blocks.extend(
                duplication
                    .duplicates
                    .iter()
                    .filter(|d| d.other_component.is_none())
                    .map(|d| d.range),
            );
        }
        blocks.sort();
        Self { blocks }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl LineReader for DuplicationLineReader {
    fn read(&mut self, line: &mut Line) {
        for (idx, block) in self.blocks.iter().enumerate() {
            if block.start_line > line.line {
                break;
            }
            if block.contains(line.line) {
                let id = idx as u32 + 1;
                if !line.duplications.contains(&id) {
                    line.duplications.push(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanflow_report::ComponentKey;

    fn marks(reader: &mut DuplicationLineReader, count: u32) -> Vec<Vec<u32>> {
        (1..=count)
            .map(|n| {
                let mut line = Line::new(n);
                reader.read(&mut line);
                line.duplications
            })
            .collect()
    }

    #[test]
    fn test_no_duplication() {
        let mut reader = DuplicationLineReader::new(&[]);
        assert_eq!(marks(&mut reader, 2), vec![Vec::<u32>::new(), vec![]]);
    }

    #[test]
    fn test_inner_duplicate_blocks_numbered_by_position() {
        // Duplicate (1..2) sorts before its original (3..4)
        let duplication = Duplication::new(TextRange::new(3, 4))
            .with_inner_duplicate(TextRange::new(1, 2));
        let mut reader = DuplicationLineReader::new(&[duplication]);

        assert_eq!(reader.block_count(), 2);
        assert_eq!(
            marks(&mut reader, 5),
            vec![vec![1], vec![1], vec![2], vec![2], vec![]]
        );
    }

    #[test]
    fn test_overlapping_blocks_mark_both_ids() {
        let first = Duplication::new(TextRange::new(1, 3))
            .with_inner_duplicate(TextRange::new(6, 8));
        let second = Duplication::new(TextRange::new(2, 4))
            .with_inner_duplicate(TextRange::new(10, 12));
        let mut reader = DuplicationLineReader::new(&[first, second]);

        let lines = marks(&mut reader, 12);
        assert_eq!(lines[0], vec![1]);
        assert_eq!(lines[1], vec![1, 2]);
        assert_eq!(lines[3], vec![2]);
        assert_eq!(lines[6], vec![3]);
        assert_eq!(lines[10], vec![4]);
    }

    #[test]
    fn test_same_start_sorted_by_end() {
        let duplication = Duplication::new(TextRange::new(1, 5))
            .with_inner_duplicate(TextRange::new(1, 2));
        let mut reader = DuplicationLineReader::new(&[duplication]);

        let lines = marks(&mut reader, 3);
        assert_eq!(lines[0], vec![1, 2]);
        assert_eq!(lines[2], vec![2]);
    }

    #[test]
    fn test_external_duplicate_marks_only_original() {
        let duplication = Duplication::new(TextRange::new(2, 3))
            .with_external_duplicate(ComponentKey::Ref(7), TextRange::new(1, 1));
        let mut reader = DuplicationLineReader::new(&[duplication]);

        assert_eq!(reader.block_count(), 1);
        assert_eq!(marks(&mut reader, 3), vec![vec![], vec![1], vec![1]]);
    }
}
