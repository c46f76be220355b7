//! Numerical Array codec.
//!
//! Arrays are linearized in row-major (`C`) or column-major (`F`) order and
//! each element is written in the requested byte order. The codec metadata
//! records shape, element strides of that order, scalar type and endianness,
//! which is everything the dig engine needs to locate a single element.

use half::f16;
use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn, ShapeBuilder};
use num_complex::Complex;
use serde::{Serialize, Serializer};

use super::meta::{ArrayOrder, Endianness, NumericalLayout};
use super::scalar::{decode_elements, Element, Scalar, ScalarType};
use crate::error::RabError;

/// A dynamically typed n-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    /// bool elements
    Bool(ArrayD<bool>),
    /// int8 elements
    Int8(ArrayD<i8>),
    /// uint8 elements
    UInt8(ArrayD<u8>),
    /// int16 elements
    Int16(ArrayD<i16>),
    /// uint16 elements
    UInt16(ArrayD<u16>),
    /// int32 elements
    Int32(ArrayD<i32>),
    /// uint32 elements
    UInt32(ArrayD<u32>),
    /// int64 elements
    Int64(ArrayD<i64>),
    /// uint64 elements
    UInt64(ArrayD<u64>),
    /// float16 elements
    Float16(ArrayD<f16>),
    /// float32 elements
    Float32(ArrayD<f32>),
    /// float64 elements
    Float64(ArrayD<f64>),
    /// complex64 elements
    Complex64(ArrayD<Complex<f32>>),
    /// complex128 elements
    Complex128(ArrayD<Complex<f64>>),
}

/// Run `$body` with `$arr` bound to the typed array inside any variant
macro_rules! with_array {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            NumericArray::Bool($arr) => $body,
            NumericArray::Int8($arr) => $body,
            NumericArray::UInt8($arr) => $body,
            NumericArray::Int16($arr) => $body,
            NumericArray::UInt16($arr) => $body,
            NumericArray::Int32($arr) => $body,
            NumericArray::UInt32($arr) => $body,
            NumericArray::Int64($arr) => $body,
            NumericArray::UInt64($arr) => $body,
            NumericArray::Float16($arr) => $body,
            NumericArray::Float32($arr) => $body,
            NumericArray::Float64($arr) => $body,
            NumericArray::Complex64($arr) => $body,
            NumericArray::Complex128($arr) => $body,
        }
    };
}

/// Element types that have a [`NumericArray`] variant
pub trait ArrayElement: Element {
    /// Wrap a typed array
    fn wrap(array: ArrayD<Self>) -> NumericArray;

    /// Borrow the typed array if `array` holds this element type
    fn unwrap(array: &NumericArray) -> Option<&ArrayD<Self>>;
}

macro_rules! impl_array_element {
    ($ty:ty, $variant:ident) => {
        impl ArrayElement for $ty {
            fn wrap(array: ArrayD<Self>) -> NumericArray {
                NumericArray::$variant(array)
            }

            fn unwrap(array: &NumericArray) -> Option<&ArrayD<Self>> {
                match array {
                    NumericArray::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_array_element!(bool, Bool);
impl_array_element!(i8, Int8);
impl_array_element!(u8, UInt8);
impl_array_element!(i16, Int16);
impl_array_element!(u16, UInt16);
impl_array_element!(i32, Int32);
impl_array_element!(u32, UInt32);
impl_array_element!(i64, Int64);
impl_array_element!(u64, UInt64);
impl_array_element!(f16, Float16);
impl_array_element!(f32, Float32);
impl_array_element!(f64, Float64);
impl_array_element!(Complex<f32>, Complex64);
impl_array_element!(Complex<f64>, Complex128);

impl<T: ArrayElement, D: Dimension> From<ndarray::Array<T, D>> for NumericArray {
    fn from(array: ndarray::Array<T, D>) -> Self {
        T::wrap(array.into_dyn())
    }
}

impl NumericArray {
    /// Element type
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            NumericArray::Bool(_) => ScalarType::Bool,
            NumericArray::Int8(_) => ScalarType::Int8,
            NumericArray::UInt8(_) => ScalarType::UInt8,
            NumericArray::Int16(_) => ScalarType::Int16,
            NumericArray::UInt16(_) => ScalarType::UInt16,
            NumericArray::Int32(_) => ScalarType::Int32,
            NumericArray::UInt32(_) => ScalarType::UInt32,
            NumericArray::Int64(_) => ScalarType::Int64,
            NumericArray::UInt64(_) => ScalarType::UInt64,
            NumericArray::Float16(_) => ScalarType::Float16,
            NumericArray::Float32(_) => ScalarType::Float32,
            NumericArray::Float64(_) => ScalarType::Float64,
            NumericArray::Complex64(_) => ScalarType::Complex64,
            NumericArray::Complex128(_) => ScalarType::Complex128,
        }
    }

    /// Axis extents
    pub fn shape(&self) -> &[usize] {
        with_array!(self, arr => arr.shape())
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        with_array!(self, arr => arr.len())
    }

    /// Whether the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, one entry per axis
    pub fn get(&self, index: &[usize]) -> Option<Scalar> {
        if index.len() != self.ndim() {
            return None;
        }
        with_array!(self, arr => arr.get(IxDyn(index)).map(|v| v.into_scalar()))
    }

    /// Borrow as a typed array
    pub fn as_array<T: ArrayElement>(&self) -> Option<&ArrayD<T>> {
        T::unwrap(self)
    }

    /// Plain nested sequences, as embedded in documents
    pub fn to_document(&self) -> Result<serde_json::Value, RabError> {
        Ok(serde_json::to_value(self)?)
    }
}

struct Nested<'a, T>(ArrayViewD<'a, T>);

impl<T: Element> Serialize for Nested<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.ndim() == 0 {
            match self.0.first() {
                Some(value) => value.into_scalar().serialize(serializer),
                None => serializer.serialize_unit(),
            }
        } else {
            serializer.collect_seq(self.0.outer_iter().map(Nested))
        }
    }
}

impl Serialize for NumericArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        with_array!(self, arr => Nested(arr.view()).serialize(serializer))
    }
}

fn encode_typed<T: Element>(array: &ArrayD<T>, order: ArrayOrder, endianness: Endianness) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(array.len() * T::SCALAR_TYPE.byte_size());
    match order {
        // Logical iteration is row-major whatever the memory layout is
        ArrayOrder::RowMajor => array.iter().for_each(|v| v.write(endianness, &mut bytes)),
        ArrayOrder::ColumnMajor => array.t().iter().for_each(|v| v.write(endianness, &mut bytes)),
    }
    bytes
}

fn decode_typed<T: ArrayElement>(bytes: &[u8], layout: &NumericalLayout) -> Result<NumericArray, RabError> {
    let values = decode_elements::<T>(bytes, layout.endianness);
    let array = match layout.order {
        ArrayOrder::RowMajor => ArrayD::from_shape_vec(IxDyn(&layout.shape), values)?,
        ArrayOrder::ColumnMajor => ArrayD::from_shape_vec(IxDyn(&layout.shape).f(), values)?,
    };
    Ok(T::wrap(array))
}

/// Encode an array, returning its bytes and layout
pub fn encode(
    array: &NumericArray,
    order: ArrayOrder,
    endianness: Option<Endianness>,
) -> Result<(Vec<u8>, NumericalLayout), RabError> {
    let scalar_type = array.scalar_type();
    let endianness = Endianness::for_element_size(scalar_type.byte_size(), endianness);
    let shape = array.shape().to_vec();
    let strides = order.strides(&shape).ok_or_else(|| {
        RabError::ValidationError(format!("strides of shape {:?} overflow", shape))
    })?;
    let bytes = with_array!(array, arr => encode_typed(arr, order, endianness));

    let layout = NumericalLayout {
        scalar_type,
        strides: Some(strides),
        shape,
        order,
        endianness,
    };
    Ok((bytes, layout))
}

/// Decode (already decompressed) bytes into an array
pub fn decode(bytes: &[u8], layout: &NumericalLayout) -> Result<NumericArray, RabError> {
    let expected = layout
        .element_count()
        .and_then(|count| count.checked_mul(layout.scalar_type.byte_size()))
        .ok_or_else(|| RabError::DecodeError(format!("shape {:?} is too large", layout.shape)))?;
    if bytes.len() != expected {
        return Err(RabError::DecodeError(format!(
            "{} array of shape {:?} needs {} bytes, got {}",
            layout.scalar_type,
            layout.shape,
            expected,
            bytes.len()
        )));
    }

    match layout.scalar_type {
        ScalarType::Bool => decode_typed::<bool>(bytes, layout),
        ScalarType::Int8 => decode_typed::<i8>(bytes, layout),
        ScalarType::UInt8 => decode_typed::<u8>(bytes, layout),
        ScalarType::Int16 => decode_typed::<i16>(bytes, layout),
        ScalarType::UInt16 => decode_typed::<u16>(bytes, layout),
        ScalarType::Int32 => decode_typed::<i32>(bytes, layout),
        ScalarType::UInt32 => decode_typed::<u32>(bytes, layout),
        ScalarType::Int64 => decode_typed::<i64>(bytes, layout),
        ScalarType::UInt64 => decode_typed::<u64>(bytes, layout),
        ScalarType::Float16 => decode_typed::<f16>(bytes, layout),
        ScalarType::Float32 => decode_typed::<f32>(bytes, layout),
        ScalarType::Float64 => decode_typed::<f64>(bytes, layout),
        ScalarType::Complex64 => decode_typed::<Complex<f32>>(bytes, layout),
        ScalarType::Complex128 => decode_typed::<Complex<f64>>(bytes, layout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};

    #[test]
    fn test_encode_int32_row_major() {
        let array = NumericArray::from(arr2(&[[1i32, 2, 3], [4, 5, 6]]));
        let (bytes, layout) = encode(&array, ArrayOrder::RowMajor, Some(Endianness::Little)).unwrap();

        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[4..8], &2i32.to_le_bytes());
        assert_eq!(layout.shape, vec![2, 3]);
        assert_eq!(layout.strides, Some(vec![3, 1]));
        assert_eq!(layout.scalar_type, ScalarType::Int32);
        assert_eq!(layout.endianness, Endianness::Little);
    }

    #[test]
    fn test_encode_column_major() {
        let array = NumericArray::from(arr2(&[[1u16, 2, 3], [4, 5, 6]]));
        let (bytes, layout) = encode(&array, ArrayOrder::ColumnMajor, Some(Endianness::Big)).unwrap();

        let values: Vec<u16> = decode_elements(&bytes, Endianness::Big);
        assert_eq!(values, vec![1, 4, 2, 5, 3, 6]);
        assert_eq!(layout.strides, Some(vec![1, 2]));
        assert_eq!(decode(&bytes, &layout).unwrap(), array);
    }

    #[test]
    fn test_transposed_input_is_linearized_logically() {
        let base = arr2(&[[1i64, 2], [3, 4], [5, 6]]);
        let transposed = base.t().to_owned();
        let array = NumericArray::from(base.reversed_axes());
        let (bytes, layout) = encode(&array, ArrayOrder::RowMajor, None).unwrap();

        assert_eq!(decode(&bytes, &layout).unwrap(), NumericArray::from(transposed));
    }

    #[test]
    fn test_single_byte_types_have_no_endianness() {
        let array = NumericArray::from(arr1(&[true, false, true]));
        let (bytes, layout) = encode(&array, ArrayOrder::RowMajor, Some(Endianness::Big)).unwrap();

        assert_eq!(bytes, vec![1, 0, 1]);
        assert_eq!(layout.endianness, Endianness::Na);
    }

    #[test]
    fn test_decode_rank3() {
        let array = NumericArray::from(Array3::from_shape_fn((2, 3, 4), |(i, j, k)| {
            (i * 100 + j * 10 + k) as f32
        }));
        let (bytes, layout) = encode(&array, ArrayOrder::RowMajor, None).unwrap();
        let decoded = decode(&bytes, &layout).unwrap();

        assert_eq!(decoded, array);
        assert_eq!(decoded.get(&[1, 2, 3]), Some(Scalar::Float32(123.0)));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let array = NumericArray::from(arr1(&[1.0f64, 2.0]));
        let (bytes, layout) = encode(&array, ArrayOrder::RowMajor, None).unwrap();

        let result = decode(&bytes[..12], &layout);
        assert!(matches!(result, Err(RabError::DecodeError(_))));
    }

    #[test]
    fn test_nested_document() {
        let array = NumericArray::from(arr2(&[[1u8, 2], [3, 4]]));
        assert_eq!(
            array.to_document().unwrap(),
            serde_json::json!([[1, 2], [3, 4]])
        );
    }

    #[test]
    fn test_get_rejects_wrong_rank() {
        let array = NumericArray::from(arr1(&[1i32, 2, 3]));
        assert_eq!(array.get(&[0, 0]), None);
        assert_eq!(array.get(&[2]), Some(Scalar::Int32(3)));
        assert_eq!(array.get(&[3]), None);
    }
}
