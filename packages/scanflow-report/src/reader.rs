//! Random-access report reader
//!
//! Opening a report reads the header, the footer and the section index.
//! Each read after that seeks straight to one frame, so reading a component
//! section costs I/O proportional to that section only.

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codec::{self, IndexEntry, FOOTER_SIZE, FORMAT_VERSION, HEADER_SIZE, MAGIC};
use crate::error::{ReportError, Result};
use crate::model::{ComponentKey, ComponentSection, Metadata};

/// Read the metadata of the report at `path`
pub fn read_metadata(path: impl AsRef<Path>) -> Result<Metadata> {
    ReportReader::open(path)?.read_metadata()
}

/// Read one component section of the report at `path`
pub fn read_component_section(path: impl AsRef<Path>, key: ComponentKey) -> Result<ComponentSection> {
    ReportReader::open(path)?.read_component_section(key)
}

/// Open report file with its section index loaded
pub struct ReportReader {
    file: File,
    path: PathBuf,
    file_len: u64,
    index_offset: u64,
    entries: Vec<IndexEntry>,
    by_key: HashMap<ComponentKey, usize>,
}

impl ReportReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE + FOOTER_SIZE {
            return Err(ReportError::corrupt(
                0,
                format!("file of {} bytes is too short to be a report", file_len),
            ));
        }

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ReportError::corrupt(0, "bad magic number"));
        }
        let version = file.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(ReportError::corrupt(
                4,
                format!("unsupported format version {}", version),
            ));
        }

        let footer_offset = file_len - FOOTER_SIZE;
        file.seek(SeekFrom::Start(footer_offset))?;
        let index_offset = file.read_u64::<LittleEndian>()?;
        file.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ReportError::corrupt(footer_offset + 8, "bad footer magic"));
        }
        let index_body = index_offset
            .checked_add(4)
            .filter(|body| index_offset >= HEADER_SIZE && *body <= footer_offset);
        if index_body.is_none() {
            return Err(ReportError::corrupt(
                footer_offset,
                format!("index offset {} outside of file body", index_offset),
            ));
        }

        let index_bytes = read_frame(&mut file, index_offset, footer_offset)?;
        if index_offset + 4 + index_bytes.len() as u64 != footer_offset {
            return Err(ReportError::corrupt(
                index_offset,
                "section index does not end at footer",
            ));
        }
        let entries = codec::decode_index(&index_bytes, index_offset + 4)?;

        let mut by_key = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            let end = entry
                .offset
                .checked_add(4 + entry.len as u64)
                .filter(|end| entry.offset >= HEADER_SIZE && *end <= index_offset);
            if end.is_none() {
                return Err(ReportError::corrupt(
                    index_offset + 4,
                    format!("section {} points outside of file body", entry.key),
                ));
            }
            if by_key.insert(entry.key, pos).is_some() {
                return Err(ReportError::corrupt(
                    index_offset + 4,
                    format!("section {} indexed twice", entry.key),
                ));
            }
        }

        debug!(path = %path.display(), sections = entries.len(), "opened report");

        Ok(Self {
            file,
            path,
            file_len,
            index_offset,
            entries,
            by_key,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Component keys in write order
    pub fn component_keys(&self) -> Vec<ComponentKey> {
        self.entries.iter().map(|e| e.key).collect()
    }

    pub fn contains(&self, key: ComponentKey) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn read_metadata(&mut self) -> Result<Metadata> {
        let bytes = read_frame(&mut self.file, HEADER_SIZE, self.index_offset)?;
        codec::decode_metadata(&bytes, HEADER_SIZE + 4)
    }

    pub fn read_component_section(&mut self, key: ComponentKey) -> Result<ComponentSection> {
        let entry = self
            .by_key
            .get(&key)
            .map(|pos| self.entries[*pos])
            .ok_or(ReportError::SectionNotFound { key })?;

        let bytes = read_frame(&mut self.file, entry.offset, self.index_offset)?;
        if bytes.len() as u64 != entry.len as u64 {
            return Err(ReportError::corrupt(
                entry.offset,
                format!(
                    "section {} frame is {} bytes, index says {}",
                    key,
                    bytes.len(),
                    entry.len
                ),
            ));
        }

        let section = codec::decode_section(&bytes, entry.offset + 4)?;
        if section.key != key {
            return Err(ReportError::corrupt(
                entry.offset + 4,
                format!("section indexed as {} holds {}", key, section.key),
            ));
        }
        Ok(section)
    }
}

/// Read the `[u32_le len][bytes]` frame at `offset`; the frame must end at or
/// before `limit`
fn read_frame(file: &mut File, offset: u64, limit: u64) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let len = file.read_u32::<LittleEndian>().map_err(|e| eof_as_corrupt(e, offset))? as u64;
    if offset.checked_add(4 + len).map_or(true, |end| end > limit) {
        return Err(ReportError::corrupt(
            offset,
            format!("frame of {} bytes overruns its region", len),
        ));
    }
    let mut bytes = vec![0u8; len as usize];
    file.read_exact(&mut bytes)
        .map_err(|e| eof_as_corrupt(e, offset + 4))?;
    Ok(bytes)
}

fn eof_as_corrupt(err: std::io::Error, offset: u64) -> ReportError {
    if err.kind() == ErrorKind::UnexpectedEof {
        ReportError::corrupt(offset, "unexpected end of file")
    } else {
        ReportError::Io(err)
    }
}
