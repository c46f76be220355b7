//! Codec registry: maps every dataset kind to its encoder and decoder.
//!
//! | Kind | Stored as | `type` field |
//! |------|-----------|--------------|
//! | [`Dataset::Buffer`] | raw bytes | `bytes` |
//! | [`Dataset::Text`] | UTF-8 bytes | `text` |
//! | [`Dataset::Object`] | YAML document | `object` |
//! | [`Dataset::Numerical`] | linearized elements | scalar type (`int32`, ...) |
//! | [`Dataset::Dataframe`] | concatenated columns | `dataframe` |
//!
//! Every kind may additionally be compressed as a whole block.

pub mod compression;
pub mod dataframe;
pub mod document;
pub mod meta;
pub mod numerical;
pub mod scalar;

use std::path::{Path, PathBuf};

use arrow::array::RecordBatch;
use ndarray::{Array, Dimension};
use serde_json::Value;

pub use meta::{
    ArrayOrder, CodecMeta, ColumnInfo, ColumnType, Compression, DataframeLayout, Endianness,
    Layout, NumericalLayout,
};
pub use numerical::{ArrayElement, NumericArray};
pub use scalar::{Element, Scalar, ScalarType};

use crate::container::AddOptions;
use crate::error::RabError;

/// A decoded dataset
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    /// Raw bytes
    Buffer(Vec<u8>),
    /// UTF-8 text
    Text(String),
    /// Structured document (always a mapping)
    Object(Value),
    /// Typed n-dimensional array
    Numerical(NumericArray),
    /// Columnar frame
    Dataframe(RecordBatch),
}

impl Dataset {
    /// Kind name as stored in the `type` field
    pub fn type_name(&self) -> &'static str {
        match self {
            Dataset::Buffer(_) => meta::TYPE_BUFFER,
            Dataset::Text(_) => meta::TYPE_TEXT,
            Dataset::Object(_) => meta::TYPE_OBJECT,
            Dataset::Numerical(array) => array.scalar_type().name(),
            Dataset::Dataframe(_) => meta::TYPE_DATAFRAME,
        }
    }

    /// Borrow the bytes of a buffer dataset
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Dataset::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Borrow the text of a text dataset
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Dataset::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Borrow the document of an object dataset
    pub fn as_object(&self) -> Option<&Value> {
        match self {
            Dataset::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Borrow the array of a numerical dataset
    pub fn as_numerical(&self) -> Option<&NumericArray> {
        match self {
            Dataset::Numerical(array) => Some(array),
            _ => None,
        }
    }

    /// Borrow the batch of a dataframe dataset
    pub fn as_dataframe(&self) -> Option<&RecordBatch> {
        match self {
            Dataset::Dataframe(batch) => Some(batch),
            _ => None,
        }
    }
}

/// Anything that can be added to a container
#[derive(Debug, Clone)]
pub enum Payload {
    /// A dataset encoded in memory
    Dataset(Dataset),
    /// An existing file, staged by path and stored as a buffer
    File(PathBuf),
}

impl From<Dataset> for Payload {
    fn from(dataset: Dataset) -> Self {
        Payload::Dataset(dataset)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Dataset(Dataset::Buffer(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Dataset(Dataset::Buffer(bytes.to_vec()))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Dataset(Dataset::Text(text))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Dataset(Dataset::Text(text.to_string()))
    }
}

impl From<Value> for Payload {
    fn from(object: Value) -> Self {
        Payload::Dataset(Dataset::Object(object))
    }
}

impl From<NumericArray> for Payload {
    fn from(array: NumericArray) -> Self {
        Payload::Dataset(Dataset::Numerical(array))
    }
}

impl<T: ArrayElement, D: Dimension> From<Array<T, D>> for Payload {
    fn from(array: Array<T, D>) -> Self {
        Payload::Dataset(Dataset::Numerical(array.into()))
    }
}

impl From<RecordBatch> for Payload {
    fn from(batch: RecordBatch) -> Self {
        Payload::Dataset(Dataset::Dataframe(batch))
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::File(path)
    }
}

impl From<&Path> for Payload {
    fn from(path: &Path) -> Self {
        Payload::File(path.to_path_buf())
    }
}

/// Encode a dataset into its stored (possibly compressed) bytes and codec metadata
pub fn encode_dataset(dataset: &Dataset, options: &AddOptions) -> Result<(Vec<u8>, CodecMeta), RabError> {
    let (bytes, layout) = match dataset {
        Dataset::Buffer(bytes) => (bytes.clone(), Layout::Buffer),
        Dataset::Text(text) => (text.as_bytes().to_vec(), Layout::Text),
        Dataset::Object(object) => (document::encode_object(object)?, Layout::Object),
        Dataset::Numerical(array) => {
            let (bytes, layout) = numerical::encode(array, options.order, options.endianness)?;
            (bytes, Layout::Numerical(layout))
        }
        Dataset::Dataframe(batch) => {
            let (bytes, layout) = dataframe::encode(batch, options.narrow_floats)?;
            (bytes, Layout::Dataframe(layout))
        }
    };

    let bytes = compression::maybe_compress(bytes, options.compression)?;
    let codec_meta = CodecMeta::new(bytes.len() as u64, options.compression, layout);
    Ok((bytes, codec_meta))
}

/// Decode stored bytes according to their codec metadata
pub fn decode_dataset(bytes: Vec<u8>, codec_meta: &CodecMeta) -> Result<Dataset, RabError> {
    if let Layout::Invalid { reason, .. } = &codec_meta.layout {
        return Err(RabError::DecodeError(reason.clone()));
    }

    let bytes = compression::maybe_decompress(bytes, codec_meta.compression)?;
    let dataset = match &codec_meta.layout {
        Layout::Buffer => Dataset::Buffer(bytes),
        Layout::Text => Dataset::Text(String::from_utf8(bytes).map_err(|e| {
            RabError::ValidationError(format!("text dataset is not valid UTF-8: {}", e))
        })?),
        Layout::Object => Dataset::Object(document::decode_object(&bytes)?),
        Layout::Numerical(layout) => Dataset::Numerical(numerical::decode(&bytes, layout)?),
        Layout::Dataframe(layout) => Dataset::Dataframe(dataframe::decode(&bytes, layout)?),
        Layout::Invalid { reason, .. } => return Err(RabError::DecodeError(reason.clone())),
    };
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn roundtrip(dataset: Dataset, options: &AddOptions) -> Dataset {
        let (bytes, codec_meta) = encode_dataset(&dataset, options).unwrap();
        assert_eq!(codec_meta.byte_length, bytes.len() as u64);
        decode_dataset(bytes, &codec_meta).unwrap()
    }

    #[test]
    fn test_every_kind_roundtrips() {
        let datasets = vec![
            Dataset::Buffer(vec![0, 1, 2, 255]),
            Dataset::Text("Hello, world!".to_string()),
            Dataset::Object(json!({"a": [1, 2], "b": {"c": "d"}})),
            Dataset::Numerical(array![[1i32, 2], [3, 4]].into()),
        ];

        for dataset in datasets {
            assert_eq!(roundtrip(dataset.clone(), &AddOptions::default()), dataset);
            let compressed = AddOptions::default().with_compression(Compression::Gzip);
            assert_eq!(roundtrip(dataset.clone(), &compressed), dataset);
        }
    }

    #[test]
    fn test_type_names_match_header() {
        let numerical = Dataset::Numerical(array![1.0f32, 2.0].into());
        let (_, codec_meta) = encode_dataset(&numerical, &AddOptions::default()).unwrap();

        assert_eq!(numerical.type_name(), "float32");
        assert_eq!(codec_meta.type_name(), "float32");
        assert_eq!(Dataset::Buffer(vec![]).type_name(), "bytes");
    }

    #[test]
    fn test_empty_text_and_buffer() {
        let (bytes, codec_meta) =
            encode_dataset(&Dataset::Text(String::new()), &AddOptions::default()).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(codec_meta.byte_length, 0);
        assert_eq!(
            decode_dataset(bytes, &codec_meta).unwrap(),
            Dataset::Text(String::new())
        );
    }

    #[test]
    fn test_object_must_be_mapping() {
        let result = encode_dataset(&Dataset::Object(json!(42)), &AddOptions::default());
        assert!(matches!(result, Err(RabError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_utf8_text_is_validation_error() {
        let codec_meta = CodecMeta::new(2, None, Layout::Text);
        let result = decode_dataset(vec![0xff, 0xfe], &codec_meta);
        assert!(matches!(result, Err(RabError::ValidationError(_))));
    }

    #[test]
    fn test_payload_conversions() {
        assert!(matches!(Payload::from("text"), Payload::Dataset(Dataset::Text(_))));
        assert!(matches!(
            Payload::from(vec![1u8, 2]),
            Payload::Dataset(Dataset::Buffer(_))
        ));
        assert!(matches!(
            Payload::from(array![1u16, 2, 3]),
            Payload::Dataset(Dataset::Numerical(NumericArray::UInt16(_)))
        ));
        assert!(matches!(
            Payload::from(Path::new("/tmp/some.file")),
            Payload::File(_)
        ));
    }
}
