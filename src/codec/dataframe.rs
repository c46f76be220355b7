//! Dataframe codec over Arrow record batches.
//!
//! Columns are encoded one after the other into a single contiguous buffer:
//!
//! - Boolean columns are stored as `uint8`
//! - Integer columns are narrowed to the smallest integer type holding their
//!   observed minimum and maximum (unsigned before signed at each width)
//! - Float columns keep their width unless float narrowing was requested,
//!   in which case `float64` is stored as `float32`
//! - Text columns are NUL-padded to their longest UTF-8 cell
//!
//! `columnInfo` records both the original and the stored type, so decoding
//! restores the original Arrow column types.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float16Array, Float32Array, Float64Array, Int16Array,
    Int32Array, Int64Array, Int8Array, RecordBatch, RecordBatchOptions, StringArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{
    DataType, Field, Float16Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, Schema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use half::f16;

use super::meta::{ColumnInfo, ColumnType, DataframeLayout, Endianness};
use super::scalar::{decode_elements, Element, ScalarType};
use crate::error::RabError;

/// Integer candidates in narrowing order
const INTEGER_CANDIDATES: [ScalarType; 8] = [
    ScalarType::UInt8,
    ScalarType::Int8,
    ScalarType::UInt16,
    ScalarType::Int16,
    ScalarType::UInt32,
    ScalarType::Int32,
    ScalarType::UInt64,
    ScalarType::Int64,
];

/// Smallest integer type that holds every value in `[min, max]`
pub fn smallest_integer_type(min: i128, max: i128) -> Option<ScalarType> {
    INTEGER_CANDIDATES.iter().copied().find(|candidate| {
        candidate
            .integer_range()
            .map(|(lo, hi)| min >= lo && max <= hi)
            .unwrap_or(false)
    })
}

fn scalar_type_of(data_type: &DataType) -> Option<ScalarType> {
    let scalar_type = match data_type {
        DataType::Boolean => ScalarType::Bool,
        DataType::Int8 => ScalarType::Int8,
        DataType::UInt8 => ScalarType::UInt8,
        DataType::Int16 => ScalarType::Int16,
        DataType::UInt16 => ScalarType::UInt16,
        DataType::Int32 => ScalarType::Int32,
        DataType::UInt32 => ScalarType::UInt32,
        DataType::Int64 => ScalarType::Int64,
        DataType::UInt64 => ScalarType::UInt64,
        DataType::Float16 => ScalarType::Float16,
        DataType::Float32 => ScalarType::Float32,
        DataType::Float64 => ScalarType::Float64,
        _ => return None,
    };
    Some(scalar_type)
}

fn data_type_of(column_type: ColumnType) -> Option<DataType> {
    let data_type = match column_type {
        ColumnType::Text => DataType::Utf8,
        ColumnType::Scalar(scalar_type) => match scalar_type {
            ScalarType::Bool => DataType::Boolean,
            ScalarType::Int8 => DataType::Int8,
            ScalarType::UInt8 => DataType::UInt8,
            ScalarType::Int16 => DataType::Int16,
            ScalarType::UInt16 => DataType::UInt16,
            ScalarType::Int32 => DataType::Int32,
            ScalarType::UInt32 => DataType::UInt32,
            ScalarType::Int64 => DataType::Int64,
            ScalarType::UInt64 => DataType::UInt64,
            ScalarType::Float16 => DataType::Float16,
            ScalarType::Float32 => DataType::Float32,
            ScalarType::Float64 => DataType::Float64,
            ScalarType::Complex64 | ScalarType::Complex128 => return None,
        },
    };
    Some(data_type)
}

fn integer_values(column: &dyn Array) -> Option<Vec<i128>> {
    let values = match column.data_type() {
        DataType::Int8 => column.as_primitive::<Int8Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::UInt8 => column.as_primitive::<UInt8Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::Int16 => column.as_primitive::<Int16Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::UInt16 => column.as_primitive::<UInt16Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::Int32 => column.as_primitive::<Int32Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::UInt32 => column.as_primitive::<UInt32Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::Int64 => column.as_primitive::<Int64Type>().values().iter().map(|&v| v.into()).collect(),
        DataType::UInt64 => column.as_primitive::<UInt64Type>().values().iter().map(|&v| v.into()).collect(),
        _ => return None,
    };
    Some(values)
}

/// Write an integer that is known to fit `target`
fn write_integer(value: i128, target: ScalarType, endianness: Endianness, out: &mut Vec<u8>) {
    match target {
        ScalarType::Int8 => (value as i8).write(endianness, out),
        ScalarType::UInt8 => (value as u8).write(endianness, out),
        ScalarType::Int16 => (value as i16).write(endianness, out),
        ScalarType::UInt16 => (value as u16).write(endianness, out),
        ScalarType::Int32 => (value as i32).write(endianness, out),
        ScalarType::UInt32 => (value as u32).write(endianness, out),
        ScalarType::Int64 => (value as i64).write(endianness, out),
        _ => (value as u64).write(endianness, out),
    }
}

fn read_integers(bytes: &[u8], stored: ScalarType, endianness: Endianness) -> Option<Vec<i128>> {
    fn widen<T: Element + Into<i128>>(bytes: &[u8], endianness: Endianness) -> Vec<i128> {
        decode_elements::<T>(bytes, endianness)
            .into_iter()
            .map(Into::into)
            .collect()
    }

    let values = match stored {
        ScalarType::Int8 => widen::<i8>(bytes, endianness),
        ScalarType::UInt8 => widen::<u8>(bytes, endianness),
        ScalarType::Int16 => widen::<i16>(bytes, endianness),
        ScalarType::UInt16 => widen::<u16>(bytes, endianness),
        ScalarType::Int32 => widen::<i32>(bytes, endianness),
        ScalarType::UInt32 => widen::<u32>(bytes, endianness),
        ScalarType::Int64 => widen::<i64>(bytes, endianness),
        ScalarType::UInt64 => widen::<u64>(bytes, endianness),
        _ => return None,
    };
    Some(values)
}

fn integer_array(values: Vec<i128>, original: ScalarType, key: &str) -> Result<ArrayRef, RabError> {
    fn narrow<T: TryFrom<i128>>(values: Vec<i128>, key: &str) -> Result<Vec<T>, RabError> {
        values
            .into_iter()
            .map(|v| {
                T::try_from(v).map_err(|_| {
                    RabError::DecodeError(format!(
                        "value {} of column '{}' does not fit its original type",
                        v, key
                    ))
                })
            })
            .collect()
    }

    let array: ArrayRef = match original {
        ScalarType::Int8 => Arc::new(Int8Array::from(narrow::<i8>(values, key)?)),
        ScalarType::UInt8 => Arc::new(UInt8Array::from(narrow::<u8>(values, key)?)),
        ScalarType::Int16 => Arc::new(Int16Array::from(narrow::<i16>(values, key)?)),
        ScalarType::UInt16 => Arc::new(UInt16Array::from(narrow::<u16>(values, key)?)),
        ScalarType::Int32 => Arc::new(Int32Array::from(narrow::<i32>(values, key)?)),
        ScalarType::UInt32 => Arc::new(UInt32Array::from(narrow::<u32>(values, key)?)),
        ScalarType::Int64 => Arc::new(Int64Array::from(narrow::<i64>(values, key)?)),
        ScalarType::UInt64 => Arc::new(UInt64Array::from(narrow::<u64>(values, key)?)),
        other => {
            return Err(RabError::DecodeError(format!(
                "column '{}' stores integers but its original type is {}",
                key, other
            )))
        }
    };
    Ok(array)
}

fn encode_column(
    key: &str,
    column: &dyn Array,
    narrow_floats: bool,
    out: &mut Vec<u8>,
) -> Result<ColumnInfo, RabError> {
    if column.null_count() > 0 {
        return Err(RabError::ValidationError(format!(
            "Column {} contains {} null values, which cannot be stored",
            key,
            column.null_count()
        )));
    }

    let native = Endianness::native();
    let info = |original: ColumnType, encoding: ColumnType, endianness: Endianness| ColumnInfo {
        key: key.to_string(),
        original_type: original,
        encoding_type: encoding,
        endianness,
        max_byte_size: None,
    };

    let info = match column.data_type() {
        DataType::Boolean => {
            out.extend(column.as_boolean().values().iter().map(u8::from));
            info(
                ColumnType::Scalar(ScalarType::Bool),
                ColumnType::Scalar(ScalarType::UInt8),
                Endianness::Na,
            )
        }
        DataType::Float16 => {
            let values = column.as_primitive::<Float16Type>().values();
            values.iter().for_each(|v| v.write(native, out));
            let f16_type = ColumnType::Scalar(ScalarType::Float16);
            info(f16_type, f16_type, native)
        }
        DataType::Float32 => {
            let values = column.as_primitive::<Float32Type>().values();
            values.iter().for_each(|v| v.write(native, out));
            let f32_type = ColumnType::Scalar(ScalarType::Float32);
            info(f32_type, f32_type, native)
        }
        DataType::Float64 => {
            let values = column.as_primitive::<Float64Type>().values();
            let encoding = if narrow_floats {
                values.iter().for_each(|&v| (v as f32).write(native, out));
                ScalarType::Float32
            } else {
                values.iter().for_each(|v| v.write(native, out));
                ScalarType::Float64
            };
            info(
                ColumnType::Scalar(ScalarType::Float64),
                ColumnType::Scalar(encoding),
                native,
            )
        }
        DataType::Utf8 => {
            let strings = column.as_string::<i32>();
            let max_byte_size = strings.iter().flatten().map(str::len).max().unwrap_or(0);
            for value in strings.iter().flatten() {
                out.extend_from_slice(value.as_bytes());
                out.resize(out.len() + max_byte_size - value.len(), 0);
            }
            let mut text = info(ColumnType::Text, ColumnType::Text, Endianness::Na);
            text.max_byte_size = Some(max_byte_size);
            text
        }
        data_type => {
            let (original, values) = match (scalar_type_of(data_type), integer_values(column)) {
                (Some(original), Some(values)) => (original, values),
                _ => {
                    return Err(RabError::ValidationError(format!(
                        "Column {} is of an unsupported type: {}",
                        key, data_type
                    )))
                }
            };
            let min = values.iter().copied().min().unwrap_or(0);
            let max = values.iter().copied().max().unwrap_or(0);
            let encoding = smallest_integer_type(min, max).unwrap_or(original);
            let endianness = Endianness::for_element_size(encoding.byte_size(), None);
            values
                .iter()
                .for_each(|&v| write_integer(v, encoding, endianness, out));
            info(
                ColumnType::Scalar(original),
                ColumnType::Scalar(encoding),
                endianness,
            )
        }
    };

    Ok(info)
}

/// Encode a record batch, returning its bytes and layout
pub fn encode(batch: &RecordBatch, narrow_floats: bool) -> Result<(Vec<u8>, DataframeLayout), RabError> {
    let rows = batch.num_rows();
    if rows == 0 {
        return Err(RabError::ValidationError(
            "the dataframe has zero rows".to_string(),
        ));
    }

    let schema = batch.schema();
    let mut bytes = Vec::new();
    let mut column_info = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        column_info.push(encode_column(
            field.name(),
            column.as_ref(),
            narrow_floats,
            &mut bytes,
        )?);
    }

    let layout = DataframeLayout {
        rows,
        columns: column_info.len(),
        column_info,
    };
    Ok((bytes, layout))
}

fn decode_column(bytes: &[u8], info: &ColumnInfo, rows: usize) -> Result<ArrayRef, RabError> {
    let mismatch = || {
        RabError::DecodeError(format!(
            "column '{}' cannot be decoded from {} into {}",
            info.key,
            info.encoding_type.name(),
            info.original_type.name()
        ))
    };

    let array: ArrayRef = match (info.original_type, info.encoding_type) {
        (ColumnType::Text, ColumnType::Text) => {
            let width = info.max_byte_size.unwrap_or(0);
            let mut values = Vec::with_capacity(rows);
            for row in 0..rows {
                let cell = &bytes[row * width..(row + 1) * width];
                let text = std::str::from_utf8(cell).map_err(|e| {
                    RabError::DecodeError(format!(
                        "column '{}' row {} is not valid UTF-8: {}",
                        info.key, row, e
                    ))
                })?;
                values.push(text.trim_end_matches('\0'));
            }
            Arc::new(StringArray::from(values))
        }
        (ColumnType::Scalar(ScalarType::Bool), ColumnType::Scalar(ScalarType::UInt8)) => {
            Arc::new(BooleanArray::from(
                bytes.iter().map(|&b| b != 0).collect::<Vec<_>>(),
            ))
        }
        (ColumnType::Scalar(ScalarType::Float64), ColumnType::Scalar(stored)) => {
            let values: Vec<f64> = match stored {
                ScalarType::Float64 => decode_elements(bytes, info.endianness),
                ScalarType::Float32 => decode_elements::<f32>(bytes, info.endianness)
                    .into_iter()
                    .map(f64::from)
                    .collect(),
                _ => return Err(mismatch()),
            };
            Arc::new(Float64Array::from(values))
        }
        (ColumnType::Scalar(ScalarType::Float32), ColumnType::Scalar(ScalarType::Float32)) => {
            Arc::new(Float32Array::from(decode_elements::<f32>(
                bytes,
                info.endianness,
            )))
        }
        (ColumnType::Scalar(ScalarType::Float16), ColumnType::Scalar(ScalarType::Float16)) => {
            Arc::new(Float16Array::from(decode_elements::<f16>(
                bytes,
                info.endianness,
            )))
        }
        (ColumnType::Scalar(original), ColumnType::Scalar(stored))
            if original.is_integer() && stored.is_integer() =>
        {
            let values = read_integers(bytes, stored, info.endianness).ok_or_else(mismatch)?;
            integer_array(values, original, &info.key)?
        }
        _ => return Err(mismatch()),
    };

    Ok(array)
}

/// Decode (already decompressed) bytes into a record batch
pub fn decode(bytes: &[u8], layout: &DataframeLayout) -> Result<RecordBatch, RabError> {
    if layout.column_info.len() != layout.columns {
        return Err(RabError::DecodeError(format!(
            "inconsistent number of columns in metadata: columns is {} but columnInfo has {} entries",
            layout.columns,
            layout.column_info.len()
        )));
    }

    let mut fields = Vec::with_capacity(layout.columns);
    let mut columns = Vec::with_capacity(layout.columns);
    let mut offset = 0usize;

    for info in &layout.column_info {
        let length = info.block_length(layout.rows).ok_or_else(|| {
            RabError::DecodeError(format!("column '{}' has no computable size", info.key))
        })?;
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                RabError::DecodeError(format!(
                    "column '{}' needs bytes {}..{} but the dataset has {}",
                    info.key,
                    offset,
                    offset.saturating_add(length),
                    bytes.len()
                ))
            })?;

        let data_type = data_type_of(info.original_type).ok_or_else(|| {
            RabError::DecodeError(format!(
                "column '{}' has unsupported original type {}",
                info.key,
                info.original_type.name()
            ))
        })?;
        columns.push(decode_column(&bytes[offset..end], info, layout.rows)?);
        fields.push(Field::new(info.key.clone(), data_type, false));
        offset = end;
    }

    let options = RecordBatchOptions::new().with_row_count(Some(layout.rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        columns,
        &options,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_smallest_integer_type() {
        assert_eq!(smallest_integer_type(0, 255), Some(ScalarType::UInt8));
        assert_eq!(smallest_integer_type(-1, 100), Some(ScalarType::Int8));
        assert_eq!(smallest_integer_type(0, 256), Some(ScalarType::UInt16));
        assert_eq!(smallest_integer_type(-500_000, 499_999), Some(ScalarType::Int32));
        assert_eq!(
            smallest_integer_type(i64::MIN as i128, 0),
            Some(ScalarType::Int64)
        );
        assert_eq!(
            smallest_integer_type(0, u64::MAX as i128),
            Some(ScalarType::UInt64)
        );
    }

    #[test]
    fn test_integer_column_is_narrowed() {
        let input = batch(vec![(
            "ids",
            Arc::new(Int64Array::from(vec![1i64, 2, 300])) as ArrayRef,
        )]);
        let (bytes, layout) = encode(&input, false).unwrap();

        assert_eq!(bytes.len(), 6);
        let info = &layout.column_info[0];
        assert_eq!(info.original_type, ColumnType::Scalar(ScalarType::Int64));
        assert_eq!(info.encoding_type, ColumnType::Scalar(ScalarType::UInt16));
        assert_eq!(decode(&bytes, &layout).unwrap(), input);
    }

    #[test]
    fn test_mixed_columns_roundtrip() {
        let input = batch(vec![
            ("some_uint8", Arc::new(UInt8Array::from(vec![0u8, 17, 255])) as ArrayRef),
            ("some_float64", Arc::new(Float64Array::from(vec![0.1, 2.5, -7.25])) as ArrayRef),
            ("some_float32", Arc::new(Float32Array::from(vec![1.5f32, 2.0, 3.25])) as ArrayRef),
            ("some_int32", Arc::new(Int32Array::from(vec![-500_000, 0, 499_999])) as ArrayRef),
            ("some_bool", Arc::new(BooleanArray::from(vec![true, false, true])) as ArrayRef),
            ("some_str", Arc::new(StringArray::from(vec!["a", "çà et là", ""])) as ArrayRef),
        ]);
        let (bytes, layout) = encode(&input, false).unwrap();

        assert_eq!(layout.rows, 3);
        assert_eq!(layout.columns, 6);
        let text = &layout.column_info[5];
        assert_eq!(text.max_byte_size, Some("çà et là".len()));
        assert_eq!(decode(&bytes, &layout).unwrap(), input);
    }

    #[test]
    fn test_float_narrowing_is_opt_in() {
        let input = batch(vec![(
            "x",
            Arc::new(Float64Array::from(vec![0.1, 0.2])) as ArrayRef,
        )]);

        let (wide, layout) = encode(&input, false).unwrap();
        assert_eq!(wide.len(), 16);
        assert_eq!(decode(&wide, &layout).unwrap(), input);

        let (narrow, layout) = encode(&input, true).unwrap();
        assert_eq!(narrow.len(), 8);
        let info = &layout.column_info[0];
        assert_eq!(info.original_type, ColumnType::Scalar(ScalarType::Float64));
        assert_eq!(info.encoding_type, ColumnType::Scalar(ScalarType::Float32));

        let decoded = decode(&narrow, &layout).unwrap();
        let column = decoded.column(0).as_primitive::<Float64Type>();
        assert_eq!(column.value(0), 0.1f32 as f64);
        assert_eq!(decoded.schema().field(0).data_type(), &DataType::Float64);
    }

    #[test]
    fn test_zero_rows_rejected() {
        let input = batch(vec![(
            "empty",
            Arc::new(Int32Array::from(Vec::<i32>::new())) as ArrayRef,
        )]);
        assert!(matches!(
            encode(&input, false),
            Err(RabError::ValidationError(_))
        ));
    }

    #[test]
    fn test_unsupported_column_names_column() {
        let input = batch(vec![(
            "when",
            Arc::new(arrow::array::Date32Array::from(vec![1, 2])) as ArrayRef,
        )]);
        match encode(&input, false) {
            Err(RabError::ValidationError(message)) => assert!(message.contains("when")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_nulls_rejected() {
        let input = batch(vec![(
            "maybe",
            Arc::new(Int32Array::from(vec![Some(1), None])) as ArrayRef,
        )]);
        assert!(matches!(
            encode(&input, false),
            Err(RabError::ValidationError(_))
        ));
    }

    #[test]
    fn test_column_count_mismatch() {
        let input = batch(vec![(
            "a",
            Arc::new(UInt8Array::from(vec![1u8, 2])) as ArrayRef,
        )]);
        let (bytes, mut layout) = encode(&input, false).unwrap();
        layout.columns = 2;

        assert!(matches!(
            decode(&bytes, &layout),
            Err(RabError::DecodeError(_))
        ));
    }

    #[test]
    fn test_all_empty_strings() {
        let input = batch(vec![(
            "blank",
            Arc::new(StringArray::from(vec!["", ""])) as ArrayRef,
        )]);
        let (bytes, layout) = encode(&input, false).unwrap();

        assert!(bytes.is_empty());
        assert_eq!(decode(&bytes, &layout).unwrap(), input);
    }
}
