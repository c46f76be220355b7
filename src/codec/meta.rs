//! Codec metadata: the per-dataset record describing how its bytes were
//! encoded and how to reverse that encoding.
//!
//! Two representations exist. [`CodecMetaRecord`] is the flat, lenient form
//! persisted in the header (`type`, `byteOffset`, `byteLength`, ...), and
//! [`CodecMeta`] is the typed form the codecs work with. Converting a record
//! never fails: fields that cannot be understood turn the layout into
//! [`Layout::Invalid`], which only errors once that dataset is decoded.

use serde::{Deserialize, Serialize};

use super::scalar::ScalarType;

/// Type name of raw byte buffers
pub const TYPE_BUFFER: &str = "bytes";
/// Type name of UTF-8 text
pub const TYPE_TEXT: &str = "text";
/// Type name of structured documents
pub const TYPE_OBJECT: &str = "object";
/// Type name of dataframes
pub const TYPE_DATAFRAME: &str = "dataframe";

/// Compression applied to a dataset's whole byte block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Deflate-based compression, persisted under the label `"gzip"`
    Gzip,
}

impl Compression {
    /// Label stored in the header
    pub fn name(&self) -> &'static str {
        match self {
            Compression::Gzip => "gzip",
        }
    }

    /// Parse a header label
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gzip" => Some(Compression::Gzip),
            _ => None,
        }
    }
}

/// Byte order of the stored elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
    /// Not applicable (single-byte element types)
    Na,
}

impl Endianness {
    /// Byte order of the running platform
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Label stored in the header
    pub fn name(&self) -> &'static str {
        match self {
            Endianness::Little => "little",
            Endianness::Big => "big",
            Endianness::Na => "na",
        }
    }

    /// Parse a header label
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "little" => Some(Endianness::Little),
            "big" => Some(Endianness::Big),
            "na" => Some(Endianness::Na),
            _ => None,
        }
    }

    /// Endianness recorded for elements of `byte_size` bytes when `requested` was asked for
    pub(crate) fn for_element_size(byte_size: usize, requested: Option<Endianness>) -> Self {
        if byte_size <= 1 {
            return Endianness::Na;
        }
        match requested {
            None | Some(Endianness::Na) => Endianness::native(),
            Some(endianness) => endianness,
        }
    }
}

/// Order in which a multi-dimensional array was linearized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArrayOrder {
    /// Row-major: last axis varies fastest
    #[default]
    #[serde(rename = "C")]
    RowMajor,
    /// Column-major: first axis varies fastest
    #[serde(rename = "F")]
    ColumnMajor,
}

impl ArrayOrder {
    /// Label stored in the header
    pub fn name(&self) -> &'static str {
        match self {
            ArrayOrder::RowMajor => "C",
            ArrayOrder::ColumnMajor => "F",
        }
    }

    /// Parse a header label
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "C" => Some(ArrayOrder::RowMajor),
            "F" => Some(ArrayOrder::ColumnMajor),
            _ => None,
        }
    }

    /// Element strides of a contiguous array of `shape` linearized in this order
    ///
    /// Returns `None` when a stride does not fit in `usize`.
    pub fn strides(&self, shape: &[usize]) -> Option<Vec<usize>> {
        let mut strides = vec![1usize; shape.len()];
        match self {
            ArrayOrder::RowMajor => {
                for d in (0..shape.len().saturating_sub(1)).rev() {
                    strides[d] = strides[d + 1].checked_mul(shape[d + 1])?;
                }
            }
            ArrayOrder::ColumnMajor => {
                for d in 1..shape.len() {
                    strides[d] = strides[d - 1].checked_mul(shape[d - 1])?;
                }
            }
        }
        Some(strides)
    }
}

/// Storage type of a dataframe column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Fixed-width numerical or boolean column
    Scalar(ScalarType),
    /// NUL-padded UTF-8 column
    Text,
}

impl ColumnType {
    /// Label stored in the header
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Scalar(scalar_type) => scalar_type.name(),
            ColumnType::Text => TYPE_TEXT,
        }
    }

    /// Parse a header label
    pub fn from_name(name: &str) -> Option<Self> {
        if name == TYPE_TEXT {
            return Some(ColumnType::Text);
        }
        ScalarType::from_name(name).map(ColumnType::Scalar)
    }
}

/// Per-column descriptor of a dataframe
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// Column name
    pub key: String,
    /// Type of the column before encoding
    pub original_type: ColumnType,
    /// Type the column bytes are stored as
    pub encoding_type: ColumnType,
    /// Byte order of the stored elements
    pub endianness: Endianness,
    /// Padded byte size of every cell (text columns only)
    pub max_byte_size: Option<usize>,
}

impl ColumnInfo {
    /// Number of bytes this column occupies for `rows` rows
    pub fn block_length(&self, rows: usize) -> Option<usize> {
        let per_row = match self.encoding_type {
            ColumnType::Scalar(scalar_type) => scalar_type.byte_size(),
            ColumnType::Text => self.max_byte_size?,
        };
        per_row.checked_mul(rows)
    }
}

/// Layout of a numerical array
#[derive(Debug, Clone, PartialEq)]
pub struct NumericalLayout {
    /// Element type
    pub scalar_type: ScalarType,
    /// Extent of every axis
    pub shape: Vec<usize>,
    /// Element step per axis (absent in files from early writers)
    pub strides: Option<Vec<usize>>,
    /// Linearization order
    pub order: ArrayOrder,
    /// Byte order of the stored elements
    pub endianness: Endianness,
}

impl NumericalLayout {
    /// Number of elements, `None` if the shape overflows `usize`
    pub fn element_count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |count, &extent| count.checked_mul(extent))
    }
}

/// Layout of a dataframe
#[derive(Debug, Clone, PartialEq)]
pub struct DataframeLayout {
    /// Row count
    pub rows: usize,
    /// Column count
    pub columns: usize,
    /// Column descriptors in storage order
    pub column_info: Vec<ColumnInfo>,
}

/// Kind-specific part of the codec metadata
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Raw bytes
    Buffer,
    /// UTF-8 text
    Text,
    /// Serialized structured document
    Object,
    /// Typed multi-dimensional array
    Numerical(NumericalLayout),
    /// Columnar frame
    Dataframe(DataframeLayout),
    /// Header entry whose codec fields could not be understood
    Invalid {
        /// The record as it was read
        record: Box<CodecMetaRecord>,
        /// What was wrong with it
        reason: String,
    },
}

/// Typed codec metadata of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CodecMetaRecord", into = "CodecMetaRecord")]
pub struct CodecMeta {
    /// Offset of the block inside the data section, assigned at write time
    pub byte_offset: Option<u64>,
    /// Size of the stored (possibly compressed) block
    pub byte_length: u64,
    /// Compression applied to the block
    pub compression: Option<Compression>,
    /// Kind-specific layout
    pub layout: Layout,
}

impl CodecMeta {
    /// Metadata for a freshly encoded block
    pub fn new(byte_length: u64, compression: Option<Compression>, layout: Layout) -> Self {
        Self {
            byte_offset: None,
            byte_length,
            compression,
            layout,
        }
    }

    /// The `type` field: kind name, or the scalar type for numerical arrays
    pub fn type_name(&self) -> &str {
        match &self.layout {
            Layout::Buffer => TYPE_BUFFER,
            Layout::Text => TYPE_TEXT,
            Layout::Object => TYPE_OBJECT,
            Layout::Numerical(numerical) => numerical.scalar_type.name(),
            Layout::Dataframe(_) => TYPE_DATAFRAME,
            Layout::Invalid { record, .. } => &record.type_name,
        }
    }

    /// Whether the block is stored compressed
    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }
}

/// Dataframe column descriptor as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfoRecord {
    /// Column name
    pub key: String,
    /// Type before encoding
    pub original_type: String,
    /// Stored type
    pub encoding_type: String,
    /// Byte order label (early writers spelled the key `endianess`)
    #[serde(alias = "endianess", default)]
    pub endianness: Option<String>,
    /// Padded cell size of text columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_byte_size: Option<u64>,
}

/// Codec metadata as persisted in the header document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecMetaRecord {
    /// Kind name or scalar type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Offset inside the data section
    #[serde(default)]
    pub byte_offset: Option<u64>,
    /// Stored block size
    #[serde(default)]
    pub byte_length: u64,
    /// Compression label
    #[serde(default)]
    pub compression: Option<String>,
    /// Array shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<u64>>,
    /// Array element strides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strides: Option<Vec<u64>>,
    /// Array linearization order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<String>,
    /// Array byte order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endianness: Option<String>,
    /// Dataframe row count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    /// Dataframe column count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u64>,
    /// Dataframe column descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_info: Option<Vec<ColumnInfoRecord>>,
}

impl CodecMetaRecord {
    fn bare(type_name: &str, meta: &CodecMeta) -> Self {
        Self {
            type_name: type_name.to_string(),
            byte_offset: meta.byte_offset,
            byte_length: meta.byte_length,
            compression: meta.compression.map(|c| c.name().to_string()),
            shape: None,
            strides: None,
            byte_order: None,
            endianness: None,
            rows: None,
            columns: None,
            column_info: None,
        }
    }
}

fn to_usize(value: u64, field: &str) -> Result<usize, String> {
    usize::try_from(value).map_err(|_| format!("{} value {} does not fit this platform", field, value))
}

fn to_usizes(values: &[u64], field: &str) -> Result<Vec<usize>, String> {
    values.iter().map(|&v| to_usize(v, field)).collect()
}

fn parse_numerical(record: &CodecMetaRecord, scalar_type: ScalarType) -> Result<Layout, String> {
    let shape = record
        .shape
        .as_deref()
        .ok_or_else(|| "numerical dataset without shape".to_string())?;
    let shape = to_usizes(shape, "shape")?;

    let strides = match record.strides.as_deref() {
        Some(strides) if strides.len() != shape.len() => {
            return Err(format!(
                "strides {:?} do not match shape {:?}",
                strides, shape
            ))
        }
        Some(strides) => Some(to_usizes(strides, "strides")?),
        None => None,
    };

    let order = match record.byte_order.as_deref() {
        None => ArrayOrder::RowMajor,
        Some(name) => {
            ArrayOrder::from_name(name).ok_or_else(|| format!("unknown byteOrder '{}'", name))?
        }
    };

    let endianness = match record.endianness.as_deref() {
        None => Endianness::Na,
        Some(name) => {
            Endianness::from_name(name).ok_or_else(|| format!("unknown endianness '{}'", name))?
        }
    };

    Ok(Layout::Numerical(NumericalLayout {
        scalar_type,
        shape,
        strides,
        order,
        endianness,
    }))
}

fn parse_column(record: &ColumnInfoRecord) -> Result<ColumnInfo, String> {
    let original_type = ColumnType::from_name(&record.original_type).ok_or_else(|| {
        format!(
            "unknown column data type '{}' for column '{}'",
            record.original_type, record.key
        )
    })?;
    let encoding_type = ColumnType::from_name(&record.encoding_type).ok_or_else(|| {
        format!(
            "unknown column data type '{}' for column '{}'",
            record.encoding_type, record.key
        )
    })?;
    let endianness = match record.endianness.as_deref() {
        None => Endianness::Na,
        Some(name) => Endianness::from_name(name)
            .ok_or_else(|| format!("unknown endianness '{}' for column '{}'", name, record.key))?,
    };
    let max_byte_size = match record.max_byte_size {
        Some(size) => Some(to_usize(size, "maxByteSize")?),
        None if encoding_type == ColumnType::Text => {
            return Err(format!("text column '{}' without maxByteSize", record.key))
        }
        None => None,
    };

    Ok(ColumnInfo {
        key: record.key.clone(),
        original_type,
        encoding_type,
        endianness,
        max_byte_size,
    })
}

fn parse_dataframe(record: &CodecMetaRecord) -> Result<Layout, String> {
    let rows = record
        .rows
        .ok_or_else(|| "dataframe without rows".to_string())?;
    let columns = record
        .columns
        .ok_or_else(|| "dataframe without columns".to_string())?;
    let column_info = record
        .column_info
        .as_deref()
        .ok_or_else(|| "dataframe without columnInfo".to_string())?
        .iter()
        .map(parse_column)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Layout::Dataframe(DataframeLayout {
        rows: to_usize(rows, "rows")?,
        columns: to_usize(columns, "columns")?,
        column_info,
    }))
}

fn parse_layout(record: &CodecMetaRecord) -> Result<(Option<Compression>, Layout), String> {
    let compression = match record.compression.as_deref() {
        None => None,
        Some(name) => Some(
            Compression::from_name(name).ok_or_else(|| format!("unknown compression '{}'", name))?,
        ),
    };

    let layout = match record.type_name.as_str() {
        TYPE_BUFFER => Layout::Buffer,
        TYPE_TEXT => Layout::Text,
        TYPE_OBJECT => Layout::Object,
        TYPE_DATAFRAME => parse_dataframe(record)?,
        other => match ScalarType::from_name(other) {
            Some(scalar_type) => parse_numerical(record, scalar_type)?,
            None => return Err(format!("unknown dataset type '{}'", other)),
        },
    };

    Ok((compression, layout))
}

impl From<CodecMetaRecord> for CodecMeta {
    fn from(record: CodecMetaRecord) -> Self {
        match parse_layout(&record) {
            Ok((compression, layout)) => Self {
                byte_offset: record.byte_offset,
                byte_length: record.byte_length,
                compression,
                layout,
            },
            Err(reason) => Self {
                byte_offset: record.byte_offset,
                byte_length: record.byte_length,
                compression: None,
                layout: Layout::Invalid {
                    record: Box::new(record),
                    reason,
                },
            },
        }
    }
}

impl From<CodecMeta> for CodecMetaRecord {
    fn from(meta: CodecMeta) -> Self {
        let mut record = CodecMetaRecord::bare(meta.type_name(), &meta);
        match meta.layout {
            Layout::Buffer | Layout::Text | Layout::Object => {}
            Layout::Numerical(numerical) => {
                record.shape = Some(numerical.shape.iter().map(|&d| d as u64).collect());
                record.strides = numerical
                    .strides
                    .map(|strides| strides.iter().map(|&s| s as u64).collect());
                record.byte_order = Some(numerical.order.name().to_string());
                record.endianness = Some(numerical.endianness.name().to_string());
            }
            Layout::Dataframe(dataframe) => {
                record.rows = Some(dataframe.rows as u64);
                record.columns = Some(dataframe.columns as u64);
                record.column_info = Some(
                    dataframe
                        .column_info
                        .into_iter()
                        .map(|column| ColumnInfoRecord {
                            key: column.key,
                            original_type: column.original_type.name().to_string(),
                            encoding_type: column.encoding_type.name().to_string(),
                            endianness: Some(column.endianness.name().to_string()),
                            max_byte_size: column.max_byte_size.map(|size| size as u64),
                        })
                        .collect(),
                );
            }
            Layout::Invalid { record: original, .. } => {
                // Preserve what was read, with the offset assigned by this write
                let mut original = *original;
                original.byte_offset = meta.byte_offset;
                original.byte_length = meta.byte_length;
                return original;
            }
        }
        record
    }
}
