//! Assembling container files.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::format::{self, PREAMBLE_SIZE};
use super::reader::BlockLocation;
use crate::catalog::Catalog;
use crate::error::RabError;

/// Statistics from a completed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    /// Number of datasets written
    pub datasets_written: usize,
    /// Size of the header document
    pub header_bytes: u64,
    /// Size of the data section
    pub data_bytes: u64,
    /// Total file size in bytes
    pub file_size_bytes: u64,
}

impl WriteStats {
    /// Absolute offset of the data section
    pub fn data_offset(&self) -> u64 {
        PREAMBLE_SIZE + self.header_bytes
    }
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} datasets ({} header bytes, {} data bytes, {} bytes total)",
            self.datasets_written, self.header_bytes, self.data_bytes, self.file_size_bytes
        )
    }
}

/// Copy one block in chunks of at most `buffer.len()` bytes
fn copy_block<W: Write>(
    name: &str,
    location: &BlockLocation,
    writer: &mut W,
    buffer: &mut [u8],
) -> Result<u64, RabError> {
    let mut source = File::open(&location.path)?;
    source.seek(SeekFrom::Start(location.start))?;

    let mut remaining = location.length;
    while remaining > 0 {
        let want = remaining.min(buffer.len() as u64) as usize;
        let read = source.read(&mut buffer[..want])?;
        if read == 0 {
            return Err(RabError::ValidationError(format!(
                "block of dataset '{}' ended after {} of {} bytes",
                name,
                location.length - remaining,
                location.length
            )));
        }
        writer.write_all(&buffer[..read])?;
        remaining -= read as u64;
    }
    Ok(location.length)
}

/// Write `catalog` and its blocks to `path`.
///
/// `catalog` must already carry its final offsets and `locations` must be in
/// catalog order.
pub fn write_container(
    path: &Path,
    catalog: &Catalog,
    locations: &[BlockLocation],
    chunk_size: usize,
) -> Result<WriteStats, RabError> {
    let header = format::encode_header(catalog)?;

    let mut writer = BufWriter::new(File::create(path)?);
    format::write_preamble(&mut writer, &header)?;

    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut data_bytes = 0u64;
    for (entry, location) in catalog.entries().iter().zip(locations) {
        data_bytes += copy_block(&entry.name, location, &mut writer, &mut buffer)?;
    }

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    let stats = WriteStats {
        datasets_written: catalog.len(),
        header_bytes: header.len() as u64,
        data_bytes,
        file_size_bytes: file.metadata()?.len(),
    };
    log::info!("{} to {}", stats, path.display());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DatasetEntry, StagedBlock};
    use crate::codec::{CodecMeta, Layout};
    use serde_json::json;

    #[test]
    fn test_small_chunks_copy_everything() {
        let dir = tempfile::tempdir().unwrap();
        let block_path = dir.path().join("block");
        let block: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        std::fs::write(&block_path, &block).unwrap();

        let mut catalog = Catalog::new();
        catalog
            .add_entry(DatasetEntry::new(
                "blob",
                json!({}),
                CodecMeta::new(block.len() as u64, None, Layout::Buffer),
                StagedBlock::Staged(block_path.clone()),
            ))
            .unwrap();
        catalog.update_offsets();

        let location = BlockLocation {
            path: block_path,
            start: 0,
            length: block.len() as u64,
        };
        let output = dir.path().join("out.rab");
        let stats = write_container(&output, &catalog, &[location], 7).unwrap();

        let written = std::fs::read(&output).unwrap();
        assert_eq!(stats.file_size_bytes, written.len() as u64);
        assert_eq!(stats.data_bytes, block.len() as u64);
        assert_eq!(&written[stats.data_offset() as usize..], &block[..]);
        assert!(stats.to_string().starts_with("Wrote 1 datasets"));
    }

    #[test]
    fn test_short_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let block_path = dir.path().join("block");
        std::fs::write(&block_path, b"abc").unwrap();

        let mut catalog = Catalog::new();
        catalog
            .add_entry(DatasetEntry::new(
                "grown",
                json!({}),
                CodecMeta::new(10, None, Layout::Buffer),
                StagedBlock::External(block_path.clone()),
            ))
            .unwrap();
        catalog.update_offsets();

        let location = BlockLocation {
            path: block_path,
            start: 0,
            length: 10,
        };
        let result = write_container(&dir.path().join("out.rab"), &catalog, &[location], 4);
        assert!(matches!(result, Err(RabError::ValidationError(_))));
    }
}
