//! Container and per-dataset options.
//!
//! Container settings can also be loaded from a TOML file:
//!
//! ```toml
//! # rab.toml
//! [container]
//! staging_root = "/scratch/rab"
//! chunk_size = 1048576
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::{ArrayOrder, Compression, Endianness};
use crate::error::RabError;

/// Default chunk used to copy staged blocks into the final file (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Configuration of a [`RandomAccessBuffer`](super::RandomAccessBuffer)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Directory in which the private staging area is created (system temp dir when unset)
    pub staging_root: Option<PathBuf>,

    /// Bytes copied per chunk while assembling the container file.
    /// Bounds peak memory during `write`
    pub chunk_size: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            staging_root: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ContainerConfig {
    /// Small copy chunks, for memory constrained environments
    pub fn low_memory() -> Self {
        Self {
            chunk_size: 4 * 1024,
            ..Default::default()
        }
    }

    /// Large copy chunks, for containers holding big datasets
    pub fn high_throughput() -> Self {
        Self {
            chunk_size: 8 * 1024 * 1024,
            ..Default::default()
        }
    }

    /// Stage datasets under `root` instead of the system temp dir
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Set the copy chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, RabError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RabError::ConfigError(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML; settings live in a `[container]` section
    pub fn from_toml_str(content: &str) -> Result<Self, RabError> {
        #[derive(Deserialize, Default)]
        struct ConfigFile {
            #[serde(default)]
            container: ContainerConfig,
        }

        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| RabError::ConfigError(format!("failed to parse TOML configuration: {}", e)))?;
        if file.container.chunk_size == 0 {
            return Err(RabError::ConfigError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(file.container)
    }
}

/// Per-dataset encoding options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddOptions {
    /// Whole-block compression
    pub compression: Option<Compression>,

    /// Linearization order of numerical arrays
    pub order: ArrayOrder,

    /// Byte order of numerical array elements (native when unset)
    pub endianness: Option<Endianness>,

    /// Store float64 dataframe columns as float32
    pub narrow_floats: bool,
}

impl AddOptions {
    /// Options that gzip the block
    pub fn compressed() -> Self {
        Self::default().with_compression(Compression::Gzip)
    }

    /// Compress the block
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Linearize numerical arrays in `order`
    pub fn with_order(mut self, order: ArrayOrder) -> Self {
        self.order = order;
        self
    }

    /// Write numerical arrays in `endianness`
    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = Some(endianness);
        self
    }

    /// Narrow float64 dataframe columns to float32
    pub fn with_narrow_floats(mut self, narrow_floats: bool) -> Self {
        self.narrow_floats = narrow_floats;
        self
    }
}
