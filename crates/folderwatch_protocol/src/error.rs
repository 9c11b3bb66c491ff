//! Encoding error types

use crate::Format;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EncodingError>;

/// Errors raised while building or reading a message body.
///
/// Encoding is pure, so none of these are worth retrying.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Path {path:?} contains {ch:?}, which XML 1.0 cannot represent")]
    InvalidXmlChar { path: String, ch: char },

    #[error("Payload is missing the <{0}> field")]
    MissingField(&'static str),

    #[error("isDir must be \"true\" or \"false\", got {0:?}")]
    InvalidIsDir(String),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Payload has no <{0}> root element")]
    MissingRoot(&'static str),

    #[error("Unknown action: {0:?}")]
    UnknownAction(String),

    #[error("Unknown message format: {0:?} (expected \"json\" or \"xml\")")]
    UnknownFormat(String),

    #[error("Format mismatch: expected {expected}, got {got}")]
    FormatMismatch { expected: Format, got: Format },
}
