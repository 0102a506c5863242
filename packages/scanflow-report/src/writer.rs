//! Streaming report writer
//!
//! File layout:
//!
//! ```text
//! [magic "SFRP"][u32_le format version]
//! [u32_le len][metadata]
//! [u32_le len][component section]   (repeated)
//! [u32_le len][section index]
//! [u64_le index offset][magic "SFRP"]
//! ```
//!
//! Frames are appended as they are written; nothing is buffered beyond the
//! index entries, which are flushed by [`ReportWriter::finish`].

use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codec::{self, IndexEntry, FORMAT_VERSION, HEADER_SIZE, MAGIC};
use crate::error::{ReportError, Result};
use crate::model::{ComponentSection, Metadata};

/// Write a complete report in one call
pub fn write_report<'a>(
    path: impl AsRef<Path>,
    metadata: &Metadata,
    sections: impl IntoIterator<Item = &'a ComponentSection>,
) -> Result<()> {
    let mut writer = ReportWriter::create(path)?;
    writer.write_metadata(metadata)?;
    for section in sections {
        writer.append_section(section)?;
    }
    writer.finish()
}

/// Append-only report writer
///
/// # Usage
///
/// ```rust,ignore
/// let mut writer = ReportWriter::create(&path)?;
/// writer.write_metadata(&metadata)?;
/// writer.append_section(&section)?;
/// writer.finish()?;
/// ```
pub struct ReportWriter {
    out: BufWriter<File>,
    path: PathBuf,
    position: u64,
    metadata_written: bool,
    index: Vec<IndexEntry>,
    keys: HashSet<crate::model::ComponentKey>,
}

impl ReportWriter {
    /// Create (or truncate) the report file and write its header
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&MAGIC)?;
        out.write_u32::<LittleEndian>(FORMAT_VERSION)?;

        Ok(Self {
            out,
            path,
            position: HEADER_SIZE,
            metadata_written: false,
            index: Vec::new(),
            keys: HashSet::new(),
        })
    }

    /// Write the metadata frame. Must be the first record, written once.
    pub fn write_metadata(&mut self, metadata: &Metadata) -> Result<()> {
        if self.metadata_written {
            return Err(ReportError::invalid_input("metadata already written"));
        }
        let bytes = codec::encode_metadata(metadata)?;
        self.write_frame(&bytes)?;
        self.metadata_written = true;
        Ok(())
    }

    /// Append one component section
    pub fn append_section(&mut self, section: &ComponentSection) -> Result<()> {
        if !self.metadata_written {
            return Err(ReportError::invalid_input(
                "metadata must be written before component sections",
            ));
        }
        section.validate()?;
        if !self.keys.insert(section.key) {
            return Err(ReportError::invalid_input(format!(
                "duplicate component section {}",
                section.key
            )));
        }

        let bytes = codec::encode_section(section)?;
        let offset = self.position;
        let len = self.write_frame(&bytes)?;
        self.index.push(IndexEntry {
            key: section.key,
            offset,
            len,
        });
        debug!(component = %section.key, offset, len, "appended component section");
        Ok(())
    }

    /// Write the section index and footer, then flush
    pub fn finish(mut self) -> Result<()> {
        if !self.metadata_written {
            return Err(ReportError::invalid_input("report has no metadata"));
        }
        let index_offset = self.position;
        let bytes = codec::encode_index(&self.index)?;
        self.write_frame(&bytes)?;
        self.out.write_u64::<LittleEndian>(index_offset)?;
        self.out.write_all(&MAGIC)?;
        self.out.flush()?;

        debug!(
            path = %self.path.display(),
            sections = self.index.len(),
            "report written"
        );
        Ok(())
    }

    /// `[u32_le len][bytes]`, returns the payload length
    fn write_frame(&mut self, bytes: &[u8]) -> Result<u32> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| ReportError::invalid_input("frame larger than 4 GiB"))?;
        self.out.write_u32::<LittleEndian>(len)?;
        self.out.write_all(bytes)?;
        self.position += 4 + len as u64;
        Ok(len)
    }
}
