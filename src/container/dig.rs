//! Random access into stored datasets.
//!
//! [`dig_element`] turns a multi-dimensional position into a byte offset:
//!
//! ```text
//! element = Σ strides[d] * position[d]
//! offset  = block start + element * bytes per element
//! ```
//!
//! and reads exactly one element from there. [`dig_range`] returns raw bytes
//! of any dataset without decoding them.

use super::reader::BlockLocation;
use crate::catalog::DatasetEntry;
use crate::codec::{ArrayOrder, Layout, NumericalLayout, Scalar, ScalarType};
use crate::error::RabError;

/// Element position, one index per axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position(pub Vec<i64>);

impl Position {
    /// Indices per axis
    pub fn indices(&self) -> &[i64] {
        &self.0
    }
}

macro_rules! impl_position_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Position {
                fn from(index: $t) -> Self {
                    Position(vec![index as i64])
                }
            }

            impl From<Vec<$t>> for Position {
                fn from(indices: Vec<$t>) -> Self {
                    Position(indices.into_iter().map(|i| i as i64).collect())
                }
            }

            impl From<&[$t]> for Position {
                fn from(indices: &[$t]) -> Self {
                    Position(indices.iter().map(|&i| i as i64).collect())
                }
            }

            impl<const N: usize> From<[$t; N]> for Position {
                fn from(indices: [$t; N]) -> Self {
                    Position(indices.iter().map(|&i| i as i64).collect())
                }
            }
        )*
    };
}

impl_position_from!(i32, i64, usize);

fn numerical_layout<'a>(entry: &'a DatasetEntry) -> Result<&'a NumericalLayout, RabError> {
    match &entry.codec_meta.layout {
        Layout::Numerical(layout) => Ok(layout),
        // Numerical type with an unreadable layout
        Layout::Invalid { record, reason } if ScalarType::from_name(&record.type_name).is_some() => {
            Err(RabError::DecodeError(reason.clone()))
        }
        _ => Err(RabError::TypeError {
            name: entry.name.clone(),
            actual: entry.codec_meta.type_name().to_string(),
        }),
    }
}

/// Linear element offset of `position` in an array described by `layout`
///
/// Entries written without strides get row-major contiguous strides derived
/// from the shape. That fallback is degraded compatibility for C-contiguous
/// legacy files only, not a general stride formula.
pub fn element_offset(layout: &NumericalLayout, position: &Position) -> Result<u64, RabError> {
    let indices = position.indices();
    if indices.len() != layout.shape.len() {
        return Err(RabError::DimensionError {
            expected: layout.shape.len(),
            actual: indices.len(),
        });
    }

    for (axis, (&index, &extent)) in indices.iter().zip(&layout.shape).enumerate() {
        if index < 0 || index as u64 >= extent as u64 {
            return Err(RabError::RangeError(format!(
                "index {} on axis {} is outside [0, {}]",
                index,
                axis,
                extent as i128 - 1
            )));
        }
    }

    let recomputed;
    let strides = match &layout.strides {
        Some(strides) => strides,
        None => {
            log::warn!("No strides recorded, assuming row-major order");
            recomputed = ArrayOrder::RowMajor.strides(&layout.shape).ok_or_else(|| {
                RabError::DecodeError(format!("shape {:?} is too large", layout.shape))
            })?;
            &recomputed
        }
    };

    let mut offset = 0u64;
    for (&index, &stride) in indices.iter().zip(strides) {
        offset = (stride as u64)
            .checked_mul(index as u64)
            .and_then(|step| offset.checked_add(step))
            .ok_or_else(|| {
                RabError::DecodeError(format!(
                    "strides {:?} overflow at position {:?}",
                    strides, indices
                ))
            })?;
    }
    Ok(offset)
}

/// Read a single element of a numerical dataset
pub fn dig_element(
    entry: &DatasetEntry,
    location: &BlockLocation,
    position: &Position,
) -> Result<Scalar, RabError> {
    let layout = numerical_layout(entry)?;
    if entry.codec_meta.is_compressed() {
        return Err(RabError::OperationError(format!(
            "dataset '{}' is compressed; element access needs the full dataset",
            entry.name
        )));
    }

    let element = element_offset(layout, position)?;
    let size = layout.scalar_type.byte_size() as u64;
    let byte_offset = element
        .checked_mul(size)
        .filter(|offset| {
            offset
                .checked_add(size)
                .is_some_and(|end| end <= entry.codec_meta.byte_length)
        })
        .ok_or_else(|| {
            RabError::DecodeError(format!(
                "element {} lies beyond the {} bytes of dataset '{}'",
                element, entry.codec_meta.byte_length, entry.name
            ))
        })?;

    log::trace!(
        "dig '{}' {:?} -> byte {}",
        entry.name,
        position.indices(),
        location.start + byte_offset
    );
    let bytes = location.read_at(byte_offset, size)?;
    Ok(layout.scalar_type.decode_one(&bytes, layout.endianness))
}

/// Read raw stored bytes of any dataset
pub fn dig_range(
    entry: &DatasetEntry,
    location: &BlockLocation,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>, RabError> {
    let end = offset.checked_add(length);
    match end {
        Some(end) if end <= entry.codec_meta.byte_length => location.read_at(offset, length),
        _ => Err(RabError::RangeError(format!(
            "bytes {}..{} are outside dataset '{}' of {} bytes",
            offset,
            offset as u128 + length as u128,
            entry.name,
            entry.codec_meta.byte_length
        ))),
    }
}
