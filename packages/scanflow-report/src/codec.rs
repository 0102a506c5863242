//! Field-level encoding of report records
//!
//! Integers are little-endian, timestamps are `i64`, strings are
//! `[u32_le length][utf-8 bytes]`, optional values carry a one byte
//! presence flag. Every decoding failure is reported with the absolute
//! file offset at which it happened.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use uuid::Uuid;

use crate::error::{ReportError, Result};
use crate::model::{
    Changeset, ComponentKey, ComponentSection, Duplicate, Duplication, Line, Metadata, ScmInfo,
    TextRange,
};

/// File magic ("SFRP")
pub(crate) const MAGIC: [u8; 4] = *b"SFRP";
/// Current format version
pub(crate) const FORMAT_VERSION: u32 = 1;
/// magic(4) + version(4)
pub(crate) const HEADER_SIZE: u64 = 8;
/// index_offset(8) + magic(4)
pub(crate) const FOOTER_SIZE: u64 = 12;

const KEY_TAG_REF: u8 = 0;
const KEY_TAG_UUID: u8 = 1;

/// Location of one component frame inside the report file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IndexEntry {
    pub key: ComponentKey,
    /// Offset of the frame's length prefix
    pub offset: u64,
    /// Payload length (without the prefix)
    pub len: u32,
}

// ═══════════════════════════════════════════════════════════════════════════
// Encoding
// ═══════════════════════════════════════════════════════════════════════════

struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) -> Result<()> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    fn bool(&mut self, v: bool) -> Result<()> {
        self.u8(u8::from(v))
    }

    fn u32(&mut self, v: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    fn u64(&mut self, v: u64) -> Result<()> {
        self.buf.write_u64::<LittleEndian>(v)?;
        Ok(())
    }

    fn i64(&mut self, v: i64) -> Result<()> {
        self.buf.write_i64::<LittleEndian>(v)?;
        Ok(())
    }

    fn len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| ReportError::invalid_input(format!("length {} exceeds u32", len)))?;
        self.u32(len)
    }

    fn string(&mut self, v: &str) -> Result<()> {
        self.len(v.len())?;
        self.buf.extend_from_slice(v.as_bytes());
        Ok(())
    }

    fn opt_string(&mut self, v: Option<&str>) -> Result<()> {
        match v {
            Some(s) => {
                self.u8(1)?;
                self.string(s)
            }
            None => self.u8(0),
        }
    }

    fn opt_i64(&mut self, v: Option<i64>) -> Result<()> {
        match v {
            Some(n) => {
                self.u8(1)?;
                self.i64(n)
            }
            None => self.u8(0),
        }
    }

    fn key(&mut self, key: &ComponentKey) -> Result<()> {
        match key {
            ComponentKey::Ref(r) => {
                self.u8(KEY_TAG_REF)?;
                self.u32(*r)
            }
            ComponentKey::Uuid(u) => {
                self.u8(KEY_TAG_UUID)?;
                self.buf.extend_from_slice(u.as_bytes());
                Ok(())
            }
        }
    }

    fn range(&mut self, range: &TextRange) -> Result<()> {
        self.u32(range.start_line)?;
        self.u32(range.end_line)
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) fn encode_metadata(metadata: &Metadata) -> Result<Vec<u8>> {
    let mut w = FieldWriter::new();
    w.i64(metadata.analysis_date())?;
    w.string(metadata.project_key())?;
    w.opt_string(metadata.branch())?;
    w.bool(metadata.cross_project_duplication())?;
    w.u32(metadata.root_component_ref())?;
    Ok(w.finish())
}

pub(crate) fn encode_section(section: &ComponentSection) -> Result<Vec<u8>> {
    let mut w = FieldWriter::new();
    w.key(&section.key)?;
    w.opt_string(section.path.as_deref())?;

    w.len(section.lines.len())?;
    for line in &section.lines {
        w.u32(line.line)?;
        w.opt_string(line.scm_author.as_deref())?;
        w.opt_string(line.scm_revision.as_deref())?;
        w.opt_i64(line.scm_date)?;
        w.len(line.duplications.len())?;
        for block in &line.duplications {
            w.u32(*block)?;
        }
    }

    match &section.scm {
        Some(scm) => {
            w.u8(1)?;
            w.len(scm.changesets.len())?;
            for changeset in &scm.changesets {
                w.opt_string(changeset.author.as_deref())?;
                w.string(&changeset.revision)?;
                w.i64(changeset.date)?;
            }
            w.len(scm.changeset_index_by_line.len())?;
            for idx in &scm.changeset_index_by_line {
                w.u32(*idx)?;
            }
        }
        None => w.u8(0)?,
    }

    w.len(section.duplications.len())?;
    for duplication in &section.duplications {
        w.range(&duplication.original)?;
        w.len(duplication.duplicates.len())?;
        for duplicate in &duplication.duplicates {
            match &duplicate.other_component {
                Some(key) => {
                    w.u8(1)?;
                    w.key(key)?;
                }
                None => w.u8(0)?,
            }
            w.range(&duplicate.range)?;
        }
    }

    Ok(w.finish())
}

pub(crate) fn encode_index(entries: &[IndexEntry]) -> Result<Vec<u8>> {
    let mut w = FieldWriter::new();
    w.len(entries.len())?;
    for entry in entries {
        w.key(&entry.key)?;
        w.u64(entry.offset)?;
        w.u32(entry.len)?;
    }
    Ok(w.finish())
}

// ═══════════════════════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════════════════════

/// Cursor over one frame payload that knows its absolute file offset
pub(crate) struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
    base_offset: u64,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], base_offset: u64) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            base_offset,
        }
    }

    fn offset(&self) -> u64 {
        self.base_offset + self.cursor.position()
    }

    fn remaining(&self) -> u64 {
        self.cursor.get_ref().len() as u64 - self.cursor.position()
    }

    fn truncated(&self, what: &str) -> ReportError {
        ReportError::corrupt(self.offset(), format!("truncated {}", what))
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        let offset = self.offset();
        self.cursor
            .read_u8()
            .map_err(|_| ReportError::corrupt(offset, format!("truncated {}", what)))
    }

    fn bool(&mut self, what: &str) -> Result<bool> {
        let offset = self.offset();
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ReportError::corrupt(
                offset,
                format!("invalid {} flag {}", what, other),
            )),
        }
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let offset = self.offset();
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| ReportError::corrupt(offset, format!("truncated {}", what)))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let offset = self.offset();
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| ReportError::corrupt(offset, format!("truncated {}", what)))
    }

    fn i64(&mut self, what: &str) -> Result<i64> {
        let offset = self.offset();
        self.cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| ReportError::corrupt(offset, format!("truncated {}", what)))
    }

    /// Element count, checked against the bytes left so a corrupt length
    /// cannot trigger a huge allocation
    fn count(&mut self, what: &str, min_element_size: u64) -> Result<usize> {
        let offset = self.offset();
        let count = self.u32(what)? as u64;
        if count * min_element_size.max(1) > self.remaining() {
            return Err(ReportError::corrupt(
                offset,
                format!("{} count {} exceeds frame size", what, count),
            ));
        }
        Ok(count as usize)
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let offset = self.offset();
        let len = self.u32(what)? as u64;
        if len > self.remaining() {
            return Err(self.truncated(what));
        }
        let mut bytes = vec![0u8; len as usize];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| self.truncated(what))?;
        String::from_utf8(bytes)
            .map_err(|_| ReportError::corrupt(offset, format!("{} is not valid UTF-8", what)))
    }

    fn opt_string(&mut self, what: &str) -> Result<Option<String>> {
        if self.bool(what)? {
            self.string(what).map(Some)
        } else {
            Ok(None)
        }
    }

    fn opt_i64(&mut self, what: &str) -> Result<Option<i64>> {
        if self.bool(what)? {
            self.i64(what).map(Some)
        } else {
            Ok(None)
        }
    }

    fn key(&mut self) -> Result<ComponentKey> {
        let offset = self.offset();
        match self.u8("component key tag")? {
            KEY_TAG_REF => Ok(ComponentKey::Ref(self.u32("component ref")?)),
            KEY_TAG_UUID => {
                let mut bytes = [0u8; 16];
                self.cursor
                    .read_exact(&mut bytes)
                    .map_err(|_| self.truncated("component uuid"))?;
                Ok(ComponentKey::Uuid(Uuid::from_bytes(bytes)))
            }
            tag => Err(ReportError::corrupt(
                offset,
                format!("unknown component key tag {}", tag),
            )),
        }
    }

    fn range(&mut self) -> Result<TextRange> {
        let offset = self.offset();
        let start_line = self.u32("range start")?;
        let end_line = self.u32("range end")?;
        let range = TextRange::new(start_line, end_line);
        if !range.is_valid() {
            return Err(ReportError::corrupt(
                offset,
                format!("invalid text range {}..={}", start_line, end_line),
            ));
        }
        Ok(range)
    }

    /// Fails if the frame has bytes left over
    pub(crate) fn expect_end(&self, what: &str) -> Result<()> {
        if self.remaining() != 0 {
            return Err(ReportError::corrupt(
                self.offset(),
                format!("{} trailing bytes after {}", self.remaining(), what),
            ));
        }
        Ok(())
    }
}

pub(crate) fn decode_metadata(bytes: &[u8], base_offset: u64) -> Result<Metadata> {
    let mut r = FieldReader::new(bytes, base_offset);
    let analysis_date = r.i64("analysis date")?;
    let key_offset = r.offset();
    let project_key = r.string("project key")?;
    let branch = r.opt_string("branch")?;
    let cross_project_duplication = r.bool("cross project duplication")?;
    let root_component_ref = r.u32("root component ref")?;
    r.expect_end("metadata")?;

    let metadata = Metadata::new(analysis_date, project_key, branch, cross_project_duplication)
        .map_err(|_| ReportError::corrupt(key_offset, "blank project key"))?;
    Ok(metadata.with_root_component_ref(root_component_ref))
}

pub(crate) fn decode_section(bytes: &[u8], base_offset: u64) -> Result<ComponentSection> {
    let mut r = FieldReader::new(bytes, base_offset);
    let key = r.key()?;
    let path = r.opt_string("path")?;

    // line(4) + 3 presence flags + duplication count(4)
    let line_count = r.count("lines", 11)?;
    let mut lines = Vec::with_capacity(line_count);
    for idx in 0..line_count {
        let line_offset = r.offset();
        let number = r.u32("line number")?;
        if number as usize != idx + 1 {
            return Err(ReportError::corrupt(
                line_offset,
                format!("line {} found at position {}", number, idx + 1),
            ));
        }
        let scm_author = r.opt_string("scm author")?;
        let scm_revision = r.opt_string("scm revision")?;
        let scm_date = r.opt_i64("scm date")?;
        let dup_count = r.count("line duplications", 4)?;
        let mut duplications = Vec::with_capacity(dup_count);
        for _ in 0..dup_count {
            duplications.push(r.u32("duplication block")?);
        }
        lines.push(Line {
            line: number,
            scm_author,
            scm_revision,
            scm_date,
            duplications,
        });
    }

    let scm = if r.bool("scm")? {
        // presence flag + revision length + date
        let changeset_count = r.count("changesets", 13)?;
        let mut changesets = Vec::with_capacity(changeset_count);
        for _ in 0..changeset_count {
            let author = r.opt_string("changeset author")?;
            let revision = r.string("changeset revision")?;
            let date = r.i64("changeset date")?;
            changesets.push(Changeset {
                author,
                revision,
                date,
            });
        }
        let index_count = r.count("changeset index", 4)?;
        let mut changeset_index_by_line = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            let offset = r.offset();
            let idx = r.u32("changeset index")?;
            if idx as usize >= changesets.len() {
                return Err(ReportError::corrupt(
                    offset,
                    format!("changeset index {} out of {}", idx, changesets.len()),
                ));
            }
            changeset_index_by_line.push(idx);
        }
        Some(ScmInfo::new(changesets, changeset_index_by_line))
    } else {
        None
    };

    let duplication_count = r.count("duplications", 12)?;
    let mut duplications = Vec::with_capacity(duplication_count);
    for _ in 0..duplication_count {
        let original = r.range()?;
        let duplicate_count = r.count("duplicates", 9)?;
        let mut duplicates = Vec::with_capacity(duplicate_count);
        for _ in 0..duplicate_count {
            let other_component = if r.bool("duplicate component")? {
                Some(r.key()?)
            } else {
                None
            };
            let range = r.range()?;
            duplicates.push(Duplicate {
                other_component,
                range,
            });
        }
        duplications.push(Duplication {
            original,
            duplicates,
        });
    }

    r.expect_end("component section")?;

    Ok(ComponentSection {
        key,
        path,
        lines,
        scm,
        duplications,
    })
}

pub(crate) fn decode_index(bytes: &[u8], base_offset: u64) -> Result<Vec<IndexEntry>> {
    let mut r = FieldReader::new(bytes, base_offset);
    // tag(1) + ref(4) + offset(8) + len(4)
    let count = r.count("section index", 17)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let key = r.key()?;
        let offset = r.u64("section offset")?;
        let len = r.u32("section length")?;
        entries.push(IndexEntry { key, offset, len });
    }
    r.expect_end("section index")?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_section() -> ComponentSection {
        let mut section = ComponentSection::new(ComponentKey::Ref(3), 2).with_scm(ScmInfo::new(
            vec![Changeset::new(Some("alice"), "rev1", 100)],
            vec![0, 0],
        ));
        section.lines[0].scm_author = Some("alice".to_string());
        section.lines[1].duplications = vec![1, 2];
        section
    }

    #[test]
    fn test_section_decodes_what_was_encoded() {
        let section = sample_section();
        let bytes = encode_section(&section).unwrap();
        let decoded = decode_section(&bytes, 0).unwrap();
        assert_eq!(decoded, section);
    }

    #[test]
    fn test_truncated_section_reports_absolute_offset() {
        let bytes = encode_section(&sample_section()).unwrap();
        let truncated = &bytes[..bytes.len() - 3];

        let err = decode_section(truncated, 1000).unwrap_err();
        match err {
            ReportError::Corrupt { offset, .. } => {
                assert!(offset >= 1000);
                assert!(offset <= 1000 + truncated.len() as u64);
            }
            other => panic!("Expected Corrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_tag_is_corrupt() {
        let err = decode_section(&[9, 0, 0, 0, 0], 20).unwrap_err();
        assert_eq!(err.offset(), Some(20));
    }

    #[test]
    fn test_line_gap_is_corrupt() {
        let mut section = sample_section();
        section.lines[1].line = 3;
        let bytes = encode_section(&section).unwrap();
        let err = decode_section(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("line 3 found at position 2"));
    }

    #[test]
    fn test_changeset_index_out_of_range_is_corrupt() {
        let mut section = sample_section();
        if let Some(scm) = section.scm.as_mut() {
            scm.changeset_index_by_line = vec![0, 5];
        }
        let bytes = encode_section(&section).unwrap();
        assert!(matches!(
            decode_section(&bytes, 0),
            Err(ReportError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_huge_count_does_not_allocate() {
        // key ref:1, no path, line count u32::MAX
        let mut bytes = vec![0u8, 1, 0, 0, 0, 0];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = decode_section(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("exceeds frame size"));
    }

    #[test]
    fn test_metadata_with_trailing_bytes_is_corrupt() {
        let metadata = Metadata::new(1, "foo", None, false).unwrap();
        let mut bytes = encode_metadata(&metadata).unwrap();
        bytes.push(0);
        assert!(decode_metadata(&bytes, HEADER_SIZE).is_err());
    }
}
