//! Whole-block compression of dataset bytes.
//!
//! Blocks labelled `"gzip"` are written as zlib streams, which is what
//! earlier writers stored under that label. Reading also accepts real gzip
//! members, recognised by their `1f 8b` magic.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;

use super::meta::Compression;
use crate::error::RabError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compress `bytes` with the given codec
pub fn compress(bytes: &[u8], compression: Compression) -> Result<Vec<u8>, RabError> {
    match compression {
        Compression::Gzip => {
            let mut encoder = ZlibEncoder::new(
                Vec::with_capacity(bytes.len() / 2),
                flate2::Compression::default(),
            );
            encoder.write_all(bytes)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Decompress a block written with `compression`
pub fn decompress(bytes: &[u8], compression: Compression) -> Result<Vec<u8>, RabError> {
    match compression {
        Compression::Gzip => {
            let mut decompressed = Vec::with_capacity(bytes.len() * 2);
            let result = if bytes.starts_with(&GZIP_MAGIC) {
                GzDecoder::new(bytes).read_to_end(&mut decompressed)
            } else {
                ZlibDecoder::new(bytes).read_to_end(&mut decompressed)
            };
            result.map_err(|e| {
                RabError::DecodeError(format!("{} decompression failed: {}", compression.name(), e))
            })?;
            Ok(decompressed)
        }
    }
}

/// Apply optional compression, returning the bytes unchanged when there is none
pub fn maybe_compress(bytes: Vec<u8>, compression: Option<Compression>) -> Result<Vec<u8>, RabError> {
    match compression {
        Some(compression) => compress(&bytes, compression),
        None => Ok(bytes),
    }
}

/// Reverse [`maybe_compress`]
pub fn maybe_decompress(
    bytes: Vec<u8>,
    compression: Option<Compression>,
) -> Result<Vec<u8>, RabError> {
    match compression {
        Some(compression) => decompress(&bytes, compression),
        None => Ok(bytes),
    }
}
