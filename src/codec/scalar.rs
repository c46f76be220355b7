//! Scalar element types of numerical arrays and their byte codec.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use half::f16;
use num_complex::Complex;
use serde::{Serialize, Serializer};

use super::meta::Endianness;

/// Element type of a numerical array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean stored as one byte
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// IEEE half precision float
    Float16,
    /// IEEE single precision float
    Float32,
    /// IEEE double precision float
    Float64,
    /// Complex number of two single precision floats
    Complex64,
    /// Complex number of two double precision floats
    Complex128,
}

impl ScalarType {
    /// Every scalar type, in header-table order
    pub const ALL: [ScalarType; 14] = [
        ScalarType::Bool,
        ScalarType::Int8,
        ScalarType::UInt8,
        ScalarType::Int16,
        ScalarType::UInt16,
        ScalarType::Int32,
        ScalarType::UInt32,
        ScalarType::Int64,
        ScalarType::UInt64,
        ScalarType::Float16,
        ScalarType::Float32,
        ScalarType::Float64,
        ScalarType::Complex64,
        ScalarType::Complex128,
    ];

    /// Name used in the header `type` field
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int8 => "int8",
            ScalarType::UInt8 => "uint8",
            ScalarType::Int16 => "int16",
            ScalarType::UInt16 => "uint16",
            ScalarType::Int32 => "int32",
            ScalarType::UInt32 => "uint32",
            ScalarType::Int64 => "int64",
            ScalarType::UInt64 => "uint64",
            ScalarType::Float16 => "float16",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
            ScalarType::Complex64 => "complex64",
            ScalarType::Complex128 => "complex128",
        }
    }

    /// Look up a type by its header name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Size in bytes of a single element
    pub fn byte_size(&self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 | ScalarType::Float16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::UInt64 | ScalarType::Float64 => 8,
            ScalarType::Complex64 => 8,
            ScalarType::Complex128 => 16,
        }
    }

    /// Whether this is one of the eight integer types
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarType::Int8
                | ScalarType::UInt8
                | ScalarType::Int16
                | ScalarType::UInt16
                | ScalarType::Int32
                | ScalarType::UInt32
                | ScalarType::Int64
                | ScalarType::UInt64
        )
    }

    /// Inclusive value range of an integer type
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            ScalarType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            ScalarType::UInt8 => (0, u8::MAX as i128),
            ScalarType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            ScalarType::UInt16 => (0, u16::MAX as i128),
            ScalarType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            ScalarType::UInt32 => (0, u32::MAX as i128),
            ScalarType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            ScalarType::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Decode a single element from exactly `byte_size()` bytes
    pub fn decode_one(&self, bytes: &[u8], endianness: Endianness) -> Scalar {
        match self {
            ScalarType::Bool => bool::read(bytes, endianness).into_scalar(),
            ScalarType::Int8 => i8::read(bytes, endianness).into_scalar(),
            ScalarType::UInt8 => u8::read(bytes, endianness).into_scalar(),
            ScalarType::Int16 => i16::read(bytes, endianness).into_scalar(),
            ScalarType::UInt16 => u16::read(bytes, endianness).into_scalar(),
            ScalarType::Int32 => i32::read(bytes, endianness).into_scalar(),
            ScalarType::UInt32 => u32::read(bytes, endianness).into_scalar(),
            ScalarType::Int64 => i64::read(bytes, endianness).into_scalar(),
            ScalarType::UInt64 => u64::read(bytes, endianness).into_scalar(),
            ScalarType::Float16 => f16::read(bytes, endianness).into_scalar(),
            ScalarType::Float32 => f32::read(bytes, endianness).into_scalar(),
            ScalarType::Float64 => f64::read(bytes, endianness).into_scalar(),
            ScalarType::Complex64 => Complex::<f32>::read(bytes, endianness).into_scalar(),
            ScalarType::Complex128 => Complex::<f64>::read(bytes, endianness).into_scalar(),
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single decoded element
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// bool
    Bool(bool),
    /// int8
    Int8(i8),
    /// uint8
    UInt8(u8),
    /// int16
    Int16(i16),
    /// uint16
    UInt16(u16),
    /// int32
    Int32(i32),
    /// uint32
    UInt32(u32),
    /// int64
    Int64(i64),
    /// uint64
    UInt64(u64),
    /// float16
    Float16(f16),
    /// float32
    Float32(f32),
    /// float64
    Float64(f64),
    /// complex64
    Complex64(Complex<f32>),
    /// complex128
    Complex128(Complex<f64>),
}

impl Scalar {
    /// Element type of this value
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::Int8(_) => ScalarType::Int8,
            Scalar::UInt8(_) => ScalarType::UInt8,
            Scalar::Int16(_) => ScalarType::Int16,
            Scalar::UInt16(_) => ScalarType::UInt16,
            Scalar::Int32(_) => ScalarType::Int32,
            Scalar::UInt32(_) => ScalarType::UInt32,
            Scalar::Int64(_) => ScalarType::Int64,
            Scalar::UInt64(_) => ScalarType::UInt64,
            Scalar::Float16(_) => ScalarType::Float16,
            Scalar::Float32(_) => ScalarType::Float32,
            Scalar::Float64(_) => ScalarType::Float64,
            Scalar::Complex64(_) => ScalarType::Complex64,
            Scalar::Complex128(_) => ScalarType::Complex128,
        }
    }

    /// Integer value, for integer and boolean elements
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Scalar::Bool(v) => Some(v as i128),
            Scalar::Int8(v) => Some(v.into()),
            Scalar::UInt8(v) => Some(v.into()),
            Scalar::Int16(v) => Some(v.into()),
            Scalar::UInt16(v) => Some(v.into()),
            Scalar::Int32(v) => Some(v.into()),
            Scalar::UInt32(v) => Some(v.into()),
            Scalar::Int64(v) => Some(v.into()),
            Scalar::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Real value widened to f64 (complex values have none)
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Scalar::Float16(v) => Some(v.to_f64()),
            Scalar::Float32(v) => Some(v.into()),
            Scalar::Float64(v) => Some(v),
            Scalar::Complex64(_) | Scalar::Complex128(_) => None,
            // Integers beyond 2^53 lose precision, as any f64 conversion does
            other => other.as_i128().map(|v| v as f64),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Scalar::Bool(v) => serializer.serialize_bool(v),
            Scalar::Int8(v) => serializer.serialize_i8(v),
            Scalar::UInt8(v) => serializer.serialize_u8(v),
            Scalar::Int16(v) => serializer.serialize_i16(v),
            Scalar::UInt16(v) => serializer.serialize_u16(v),
            Scalar::Int32(v) => serializer.serialize_i32(v),
            Scalar::UInt32(v) => serializer.serialize_u32(v),
            Scalar::Int64(v) => serializer.serialize_i64(v),
            Scalar::UInt64(v) => serializer.serialize_u64(v),
            Scalar::Float16(v) => serializer.serialize_f64(v.to_f64()),
            Scalar::Float32(v) => serializer.serialize_f64(v.into()),
            Scalar::Float64(v) => serializer.serialize_f64(v),
            Scalar::Complex64(v) => [f64::from(v.re), f64::from(v.im)].serialize(serializer),
            Scalar::Complex128(v) => [v.re, v.im].serialize(serializer),
        }
    }
}

/// Rust element types that can be stored in a numerical array
pub trait Element: Copy + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Matching scalar type
    const SCALAR_TYPE: ScalarType;

    /// Append this element's bytes in the given byte order
    fn write(self, endianness: Endianness, out: &mut Vec<u8>);

    /// Decode an element from exactly `SCALAR_TYPE.byte_size()` bytes
    fn read(bytes: &[u8], endianness: Endianness) -> Self;

    /// Wrap into the dynamically typed scalar
    fn into_scalar(self) -> Scalar;
}

macro_rules! impl_multibyte_element {
    ($ty:ty, $variant:ident, $read:ident, $write:ident) => {
        impl Element for $ty {
            const SCALAR_TYPE: ScalarType = ScalarType::$variant;

            fn write(self, endianness: Endianness, out: &mut Vec<u8>) {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                match endianness {
                    Endianness::Big => BigEndian::$write(&mut buf, self),
                    Endianness::Little | Endianness::Na => LittleEndian::$write(&mut buf, self),
                }
                out.extend_from_slice(&buf);
            }

            fn read(bytes: &[u8], endianness: Endianness) -> Self {
                match endianness {
                    Endianness::Big => BigEndian::$read(bytes),
                    Endianness::Little | Endianness::Na => LittleEndian::$read(bytes),
                }
            }

            fn into_scalar(self) -> Scalar {
                Scalar::$variant(self)
            }
        }
    };
}

impl_multibyte_element!(i16, Int16, read_i16, write_i16);
impl_multibyte_element!(u16, UInt16, read_u16, write_u16);
impl_multibyte_element!(i32, Int32, read_i32, write_i32);
impl_multibyte_element!(u32, UInt32, read_u32, write_u32);
impl_multibyte_element!(i64, Int64, read_i64, write_i64);
impl_multibyte_element!(u64, UInt64, read_u64, write_u64);
impl_multibyte_element!(f32, Float32, read_f32, write_f32);
impl_multibyte_element!(f64, Float64, read_f64, write_f64);

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;

    fn write(self, _endianness: Endianness, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    fn read(bytes: &[u8], _endianness: Endianness) -> Self {
        bytes[0] != 0
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }
}

impl Element for i8 {
    const SCALAR_TYPE: ScalarType = ScalarType::Int8;

    fn write(self, _endianness: Endianness, out: &mut Vec<u8>) {
        out.push(self as u8);
    }

    fn read(bytes: &[u8], _endianness: Endianness) -> Self {
        bytes[0] as i8
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Int8(self)
    }
}

impl Element for u8 {
    const SCALAR_TYPE: ScalarType = ScalarType::UInt8;

    fn write(self, _endianness: Endianness, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn read(bytes: &[u8], _endianness: Endianness) -> Self {
        bytes[0]
    }

    fn into_scalar(self) -> Scalar {
        Scalar::UInt8(self)
    }
}

impl Element for f16 {
    const SCALAR_TYPE: ScalarType = ScalarType::Float16;

    fn write(self, endianness: Endianness, out: &mut Vec<u8>) {
        self.to_bits().write(endianness, out);
    }

    fn read(bytes: &[u8], endianness: Endianness) -> Self {
        f16::from_bits(u16::read(bytes, endianness))
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Float16(self)
    }
}

// Complex numbers are stored as the real part followed by the imaginary part

impl Element for Complex<f32> {
    const SCALAR_TYPE: ScalarType = ScalarType::Complex64;

    fn write(self, endianness: Endianness, out: &mut Vec<u8>) {
        self.re.write(endianness, out);
        self.im.write(endianness, out);
    }

    fn read(bytes: &[u8], endianness: Endianness) -> Self {
        Complex::new(f32::read(&bytes[..4], endianness), f32::read(&bytes[4..8], endianness))
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Complex64(self)
    }
}

impl Element for Complex<f64> {
    const SCALAR_TYPE: ScalarType = ScalarType::Complex128;

    fn write(self, endianness: Endianness, out: &mut Vec<u8>) {
        self.re.write(endianness, out);
        self.im.write(endianness, out);
    }

    fn read(bytes: &[u8], endianness: Endianness) -> Self {
        Complex::new(f64::read(&bytes[..8], endianness), f64::read(&bytes[8..16], endianness))
    }

    fn into_scalar(self) -> Scalar {
        Scalar::Complex128(self)
    }
}

/// Decode a contiguous run of elements; `bytes.len()` must be a multiple of the element size
pub fn decode_elements<T: Element>(bytes: &[u8], endianness: Endianness) -> Vec<T> {
    bytes
        .chunks_exact(T::SCALAR_TYPE.byte_size())
        .map(|chunk| T::read(chunk, endianness))
        .collect()
}
