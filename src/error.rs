//! Error taxonomy shared by the codecs, the catalog and the container.

/// Errors that can occur while building, writing, reading or digging into a container
#[derive(Debug, thiserror::Error)]
pub enum RabError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the JSON document parser/serializer
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the YAML document parser/serializer
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Error from the Arrow library while assembling dataframe columns
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Decoded element count does not fit the recorded shape
    #[error("Shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    /// Bad magic marker, or a header/object that neither document parser accepts
    #[error("Invalid format: {0}")]
    FormatError(String),

    /// Input that cannot be stored (metadata not a mapping, unsupported column type, ...)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A dataset with this name already exists
    #[error("Dataset already exists: {0}")]
    ConflictError(String),

    /// No dataset (or staged file) with this name
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// The dataset is not of the kind the operation requires
    #[error("Dataset '{name}' is of type '{actual}', only numerical datasets can be dug into")]
    TypeError {
        /// Dataset name
        name: String,
        /// Type name recorded in the codec metadata
        actual: String,
    },

    /// Position rank does not match the array rank
    #[error("The dataset is {expected}-dimensional, the position has {actual} dimensions")]
    DimensionError {
        /// Rank of the stored array
        expected: usize,
        /// Rank of the supplied position
        actual: usize,
    },

    /// Position or byte range out of bounds
    #[error("Out of range: {0}")]
    RangeError(String),

    /// Operation not permitted on this dataset (element dig on compressed data)
    #[error("Operation not supported: {0}")]
    OperationError(String),

    /// Codec metadata that cannot be reversed (unknown type, column count mismatch, ...)
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Invalid configuration file
    #[error("Config error: {0}")]
    ConfigError(String),
}
