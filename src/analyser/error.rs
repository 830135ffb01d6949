use thiserror::Error;

/// Errors that abort an analysis run.
///
/// Unknown layers and unparseable field text are not errors; they end up in the
/// record as a terminal label or a null column.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Capture file does not exist or is not a regular file
    #[error("Capture file not found: {0}")]
    MissingInput(String),

    /// Capture file exists but holds no bytes
    #[error("Capture file is empty: {0}")]
    EmptyInput(String),

    /// tshark produced no usable frames
    #[error("No frames decoded from {0}")]
    NoFrames(String),

    /// Failed to start or read from tshark
    #[error("tshark error: {0}")]
    Tshark(String),

    /// A numeric field does not fit its declared column width
    #[error("Field {field} value {value} exceeds {bits}-bit width")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        bits: u32,
    },

    /// Classifier parameters are unusable
    #[error("Invalid model: {0}")]
    Model(String),

    /// Nothing to classify
    #[error("Feature frame has no rows to classify")]
    EmptyFrame,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
