//! Error type for dataset analysis, rounding and storage

use bitinfo_core::{BitinfoError, DataType};

/// Errors produced by the bitinfo crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from the core definitions
    #[error("{0}")]
    Core(BitinfoError),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata or cache could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Variable name not present in the dataset
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// Variable name used twice
    #[error("duplicate variable `{0}`")]
    DuplicateVariable(String),

    /// No keepbits given for a variable that has to be rounded
    #[error("no keepbits found for variable `{0}`")]
    KeepbitsNotFound(String),

    /// A keepbits table with several information levels was used for rounding
    #[error("only one information level is allowed for rounding, got {0}")]
    AmbiguousKeepbits(usize),

    /// Dimension missing or axis out of range
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// Shape, dims and data length disagree
    #[error("shape mismatch for `{name}`: {reason}")]
    ShapeMismatch { name: String, reason: String },

    /// Operation needs a floating-point variable
    #[error("variable `{name}` has data type {data_type}, expected a float type")]
    NotFloat { name: String, data_type: DataType },

    /// Nothing left to analyse after filtering variables
    #[error("no variable could be analysed: {0}")]
    NothingToAnalyse(String),

    /// Chunk payload could not be decoded
    #[error("corrupted chunk {chunk} of `{name}`: {reason}")]
    CorruptedChunk {
        name: String,
        chunk: usize,
        reason: String,
    },

    /// Invalid user parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<BitinfoError> for Error {
    fn from(err: BitinfoError) -> Self {
        Error::Core(err)
    }
}

/// Result type for bitinfo operations
pub type Result<T> = std::result::Result<T, Error>;
