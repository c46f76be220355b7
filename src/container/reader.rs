//! Reading container files and dataset blocks.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::format::{self, Header};
use crate::error::RabError;

/// Open a container file and parse its header
pub fn read_container(path: &Path) -> Result<Header, RabError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            RabError::NotFoundError(format!("container file {}", path.display()))
        }
        _ => RabError::IoError(e),
    })?;
    let header = format::read_header(&mut BufReader::new(file))?;

    log::info!(
        "Read {} datasets from {} (header {} bytes)",
        header.catalog.len(),
        path.display(),
        header.header_length
    );
    Ok(header)
}

/// Where the stored bytes of one dataset live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    /// File holding the block
    pub path: PathBuf,
    /// Absolute offset of the block in that file
    pub start: u64,
    /// Stored block size
    pub length: u64,
}

impl BlockLocation {
    /// Read the whole block
    pub fn read_all(&self) -> Result<Vec<u8>, RabError> {
        self.read_at(0, self.length)
    }

    /// Read `length` bytes starting `offset` bytes into the block
    pub fn read_at(&self, offset: u64, length: u64) -> Result<Vec<u8>, RabError> {
        let length = usize::try_from(length).map_err(|_| {
            RabError::RangeError(format!("{} bytes do not fit in memory", length))
        })?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.start + offset))?;
        let mut bytes = vec![0u8; length];
        file.read_exact(&mut bytes).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => RabError::FormatError(format!(
                "{} ends before byte {} of its data",
                self.path.display(),
                self.start + offset + length as u64
            )),
            _ => RabError::IoError(e),
        })?;
        Ok(bytes)
    }
}
