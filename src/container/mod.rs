//! The `RandomAccessBuffer` container.
//!
//! Datasets are encoded as they are added and staged in a private temporary
//! directory. [`RandomAccessBuffer::write`] assembles the container file;
//! [`RandomAccessBuffer::read`] loads only its header, after which datasets
//! are decoded lazily and numerical elements can be read without decoding the
//! whole array.
//!
//! # Example
//!
//! ```rust,no_run
//! use rab::prelude::*;
//! use ndarray::array;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), RabError> {
//! let mut container = RandomAccessBuffer::new();
//! container.add_text("readme", "Hello", json!({"lang": "en"}), AddOptions::default())?;
//! container.add_numerical_array("grid", array![[1i32, 2], [3, 4]], json!(null), AddOptions::default())?;
//! container.write("data.rab")?;
//!
//! let reader = RandomAccessBuffer::open("data.rab")?;
//! assert_eq!(reader.dig_element("grid", [1, 0])?, Scalar::Int32(3));
//! # Ok(())
//! # }
//! ```

mod config;
mod dig;
mod format;
mod reader;
mod staging;
mod writer;


use std::path::{Path, PathBuf};

use arrow::array::RecordBatch;
use serde::Serialize;
use serde_json::Value;

pub use config::{AddOptions, ContainerConfig, DEFAULT_CHUNK_SIZE};
pub use dig::Position;
pub use format::{MAGIC, PREAMBLE_SIZE};
pub use reader::BlockLocation;
pub use writer::WriteStats;

use crate::catalog::{Catalog, DatasetEntry, StagedBlock};
use crate::codec::{self, document, CodecMeta, Dataset, Layout, NumericArray, Payload, Scalar};
use crate::error::RabError;
use staging::StagingArea;

/// The container file currently backing entries without a staged block
#[derive(Debug, Clone)]
struct SourceFile {
    path: PathBuf,
    data_offset: u64,
}

/// A container of named, heterogeneous datasets with random access
#[derive(Debug)]
pub struct RandomAccessBuffer {
    config: ContainerConfig,
    catalog: Catalog,
    staging: Option<StagingArea>,
    source: Option<SourceFile>,
}

impl Default for RandomAccessBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomAccessBuffer {
    /// Create an empty container with the default configuration
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Create an empty container
    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            config,
            catalog: Catalog::new(),
            staging: None,
            source: None,
        }
    }

    /// Open an existing container file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RabError> {
        let mut container = Self::new();
        container.read(path)?;
        Ok(container)
    }

    /// Configuration in use
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// The catalog of datasets
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn staging_area(&mut self) -> Result<&mut StagingArea, RabError> {
        if self.staging.is_none() {
            self.staging = Some(StagingArea::create(self.config.staging_root.as_deref())?);
        }
        self.staging
            .as_mut()
            .ok_or_else(|| RabError::OperationError("staging area unavailable".to_string()))
    }

    fn stage_dataset(
        &mut self,
        name: &str,
        dataset: &Dataset,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        self.catalog.ensure_available(name)?;
        let metadata = document::normalize_metadata(metadata)?;
        let (bytes, codec_meta) = codec::encode_dataset(dataset, &options)?;

        let path = self.staging_area()?.stage(&bytes)?;
        log::debug!(
            "Staged '{}' ({}, {} bytes)",
            name,
            codec_meta.type_name(),
            codec_meta.byte_length
        );
        self.catalog.add_entry(DatasetEntry::new(
            name,
            metadata,
            codec_meta,
            StagedBlock::Staged(path),
        ))
    }

    /// Add raw bytes
    pub fn add_buffer(
        &mut self,
        name: &str,
        bytes: impl Into<Vec<u8>>,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        self.stage_dataset(name, &Dataset::Buffer(bytes.into()), metadata, options)
    }

    /// Add UTF-8 text
    pub fn add_text(
        &mut self,
        name: &str,
        text: impl Into<String>,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        self.stage_dataset(name, &Dataset::Text(text.into()), metadata, options)
    }

    /// Add a structured document; it must serialize to a mapping
    pub fn add_object<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        object: &T,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        let object = document::to_document(object)?;
        self.stage_dataset(name, &Dataset::Object(object), metadata, options)
    }

    /// Add a typed n-dimensional array
    pub fn add_numerical_array(
        &mut self,
        name: &str,
        array: impl Into<NumericArray>,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        self.stage_dataset(name, &Dataset::Numerical(array.into()), metadata, options)
    }

    /// Add a dataframe
    pub fn add_dataframe(
        &mut self,
        name: &str,
        batch: RecordBatch,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        self.stage_dataset(name, &Dataset::Dataframe(batch), metadata, options)
    }

    /// Add an existing file by path, stored uncompressed as a buffer.
    ///
    /// The file is not copied; it is read when the container is written.
    pub fn add_file(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
        metadata: Value,
    ) -> Result<(), RabError> {
        let path = path.as_ref();
        self.catalog.ensure_available(name)?;
        let metadata = document::normalize_metadata(metadata)?;

        let file_metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                RabError::NotFoundError(format!("file {}", path.display()))
            }
            _ => RabError::IoError(e),
        })?;
        if !file_metadata.is_file() {
            return Err(RabError::ValidationError(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let codec_meta = CodecMeta::new(file_metadata.len(), None, Layout::Buffer);
        log::debug!(
            "Staged '{}' from {} ({} bytes)",
            name,
            path.display(),
            codec_meta.byte_length
        );
        self.catalog.add_entry(DatasetEntry::new(
            name,
            metadata,
            codec_meta,
            StagedBlock::External(path.to_path_buf()),
        ))
    }

    /// Add any supported value, dispatching on its kind.
    ///
    /// Files are staged by path and never compressed.
    pub fn add_dataset(
        &mut self,
        name: &str,
        payload: impl Into<Payload>,
        metadata: Value,
        options: AddOptions,
    ) -> Result<(), RabError> {
        match payload.into() {
            Payload::Dataset(dataset) => self.stage_dataset(name, &dataset, metadata, options),
            Payload::File(path) => {
                if options.compression.is_some() {
                    log::warn!("'{}' is added by path and will be stored uncompressed", name);
                }
                self.add_file(name, path, metadata)
            }
        }
    }

    fn block_location(&self, entry: &DatasetEntry) -> Result<BlockLocation, RabError> {
        let length = entry.codec_meta.byte_length;
        match &entry.block {
            Some(StagedBlock::Staged(path)) => Ok(BlockLocation {
                path: path.clone(),
                start: 0,
                length,
            }),
            Some(StagedBlock::External(path)) => {
                let size = std::fs::metadata(path)?.len();
                if size != length {
                    return Err(RabError::ValidationError(format!(
                        "{} changed size from {} to {} bytes since it was added as '{}'",
                        path.display(),
                        length,
                        size,
                        entry.name
                    )));
                }
                Ok(BlockLocation {
                    path: path.clone(),
                    start: 0,
                    length,
                })
            }
            None => {
                let source = self.source.as_ref().ok_or_else(|| {
                    RabError::OperationError(format!(
                        "dataset '{}' has neither staged bytes nor a container file",
                        entry.name
                    ))
                })?;
                let offset = entry.codec_meta.byte_offset.ok_or_else(|| {
                    RabError::DecodeError(format!("dataset '{}' has no byteOffset", entry.name))
                })?;
                Ok(BlockLocation {
                    path: source.path.clone(),
                    start: source.data_offset + offset,
                    length,
                })
            }
        }
    }

    fn ensure_not_source(&self, path: &Path) -> Result<(), RabError> {
        let Some(source) = &self.source else {
            return Ok(());
        };
        if let Ok(target) = std::fs::canonicalize(path) {
            if target == source.path {
                return Err(RabError::ValidationError(format!(
                    "cannot overwrite {}, datasets are being read from it",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Write every dataset to a container file at `path`.
    ///
    /// On success the container reads from the new file and the staging area
    /// is released. On failure the catalog is left unchanged, though a partial
    /// file may remain at `path`.
    pub fn write(&mut self, path: impl AsRef<Path>) -> Result<WriteStats, RabError> {
        let path = path.as_ref();
        self.ensure_not_source(path)?;

        let locations = self
            .catalog
            .entries()
            .iter()
            .map(|entry| self.block_location(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut catalog = self.catalog.clone();
        catalog.update_offsets();
        let stats = writer::write_container(path, &catalog, &locations, self.config.chunk_size)?;

        catalog.clear_blocks();
        self.catalog = catalog;
        self.source = Some(SourceFile {
            path: std::fs::canonicalize(path)?,
            data_offset: stats.data_offset(),
        });
        if let Some(staging) = self.staging.take() {
            if let Err(e) = staging.close() {
                log::warn!("Failed to remove staging area: {}", e);
            }
        }
        Ok(stats)
    }

    /// Load the header of the container file at `path`, replacing the current catalog
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<(), RabError> {
        let path = path.as_ref();
        let header = reader::read_container(path)?;

        self.source = Some(SourceFile {
            path: std::fs::canonicalize(path)?,
            data_offset: header.data_offset(),
        });
        self.catalog = header.catalog;
        self.staging = None;
        Ok(())
    }

    /// Dataset names in catalog order
    pub fn list_datasets(&self) -> Vec<String> {
        self.catalog.list_datasets()
    }

    /// Decode a dataset, returning it with its metadata
    pub fn get_dataset(&self, name: &str) -> Result<(Dataset, Value), RabError> {
        let entry = self.catalog.entry(name)?;
        let bytes = self.block_location(entry)?.read_all()?;
        let dataset = codec::decode_dataset(bytes, &entry.codec_meta)?;
        Ok((dataset, entry.metadata.clone()))
    }

    /// Metadata of a dataset
    pub fn get_metadata(&self, name: &str) -> Result<&Value, RabError> {
        self.catalog.get_metadata(name)
    }

    /// Type of a dataset: `bytes`, `text`, `object`, `dataframe` or a scalar type name
    pub fn get_dataset_type(&self, name: &str) -> Result<&str, RabError> {
        self.catalog.get_dataset_type(name)
    }

    /// Read one element of an uncompressed numerical dataset.
    ///
    /// Only the bytes of that element are read.
    pub fn dig_element(&self, name: &str, position: impl Into<Position>) -> Result<Scalar, RabError> {
        let entry = self.catalog.entry(name)?;
        dig::dig_element(entry, &self.block_location(entry)?, &position.into())
    }

    /// Read `length` stored bytes starting `offset` bytes into a dataset.
    ///
    /// Compressed datasets yield compressed bytes.
    pub fn dig_range(&self, name: &str, offset: u64, length: u64) -> Result<Vec<u8>, RabError> {
        let entry = self.catalog.entry(name)?;
        dig::dig_range(entry, &self.block_location(entry)?, offset, length)
    }

    /// Whether a dataset named `name` exists
    pub fn has_dataset(&self, name: &str) -> bool {
        self.catalog.has_dataset(name)
    }

    /// Sum of the stored sizes of all datasets
    pub fn total_byte_size(&self) -> u64 {
        self.catalog.total_byte_size()
    }

    /// Release the staging area, reporting removal errors
    pub fn dispose(mut self) -> Result<(), RabError> {
        match self.staging.take() {
            Some(staging) => staging.close(),
            None => Ok(()),
        }
    }
}
