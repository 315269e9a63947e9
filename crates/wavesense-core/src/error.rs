//! Error types for the wavesense system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed frame: expected {expected} subcarriers, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Invalid subcarrier mask: expected {expected} entries, got {actual}")]
    InvalidMask { expected: usize, actual: usize },

    #[error("Unknown configuration key: {0}")]
    UnknownConfigKey(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Model evaluation error: {0}")]
    ModelEvaluation(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient data: need {required} samples, have {available}")]
    InsufficientData { required: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(e: ndarray::ShapeError) -> Self {
        Error::Shape(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_frame_message() {
        let err = Error::MalformedFrame {
            expected: 256,
            actual: 64,
        };
        assert_eq!(
            err.to_string(),
            "Malformed frame: expected 256 subcarriers, got 64"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
