//! # rab - Random Access Buffer
//!
//! `rab` packs any number of named, heterogeneous datasets into a single
//! seekable file together with a textual index describing how to decode each
//! of them. Single elements of numerical arrays can be read back by computing
//! their offset directly, without decoding the array.
//!
//! ## Key Features
//!
//! - **Heterogeneous datasets**: raw buffers, UTF-8 text, structured documents,
//!   typed n-dimensional arrays ([`ndarray`]) and dataframes ([`arrow`] record batches).
//!
//! - **Self-describing**: a YAML header lists every dataset with its user
//!   metadata and everything needed to decode it.
//!
//! - **Random access**: [`RandomAccessBuffer::dig_element`] reads exactly one
//!   element of an uncompressed array; [`RandomAccessBuffer::dig_range`] reads
//!   any byte range of any dataset.
//!
//! - **Compact dataframes**: integer columns are narrowed to the smallest type
//!   that holds their values and restored on read.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rab::prelude::*;
//! use ndarray::Array2;
//! use serde_json::json;
//!
//! let mut container = RandomAccessBuffer::new();
//! container.add_buffer("raw", vec![0u8, 1, 2, 3], json!({"source": "sensor"}), AddOptions::default())?;
//! container.add_object("settings", &json!({"gain": 2.5}), json!(null), AddOptions::default())?;
//! container.add_numerical_array(
//!     "image",
//!     Array2::<f32>::zeros((512, 512)),
//!     json!({"unit": "counts"}),
//!     AddOptions::default(),
//! )?;
//! let stats = container.write("capture.rab")?;
//! println!("{}", stats);
//!
//! let container = RandomAccessBuffer::open("capture.rab")?;
//! let pixel = container.dig_element("image", [256, 256])?;
//! let (settings, _) = container.get_dataset("settings")?;
//! # Ok::<(), rab::RabError>(())
//! ```
//!
//! ## File Layout
//!
//! | Offset | Field | Size |
//! |--------|-------|------|
//! | 0 | magic `rab` | 3 bytes |
//! | 3 | header length | 4 bytes, unsigned little-endian |
//! | 7 | header document | header length |
//! | 7 + header length | data section | concatenated dataset blocks |
//!
//! Each header entry is `{name, metadata, codecMeta}`; `codecMeta.byteOffset`
//! is relative to the start of the data section.
//!
//! ## Architecture
//!
//! - [`codec`]: encoders and decoders for every dataset kind
//! - [`catalog`]: ordered, name-unique index of dataset entries
//! - [`container`]: staging, file assembly, header parsing and random access
//! - [`error`]: the [`RabError`] taxonomy

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod codec;
pub mod container;
pub mod error;

pub use container::RandomAccessBuffer;
pub use error::RabError;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::catalog::{Catalog, DatasetEntry};
    pub use crate::codec::{
        ArrayOrder, CodecMeta, Compression, Dataset, Endianness, NumericArray, Payload, Scalar,
        ScalarType,
    };
    pub use crate::container::{
        AddOptions, ContainerConfig, Position, RandomAccessBuffer, WriteStats,
    };
    pub use crate::error::RabError;
}
