use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Display, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum SError {
    #[display("Not found: {_0}")]
    NotFound(String),
    /// An archive or folder that does not contain a mod manifest.
    #[display("Invalid mod package: {_0}")]
    InvalidPackage(String),
    /// Variant/mod parentage mismatch, or a refused overwrite.
    #[display("Conflict: {_0}")]
    Conflict(String),
    #[display("Operation cancelled")]
    Cancelled,
    #[display("IO error: {_0}")]
    IOError(String),
    #[display("Parse error: {_0}")]
    ParseError(String),
    #[display("Configuration error: {_0}")]
    Config(String),
    #[display("Unexpected error: {}", _0.as_deref().unwrap_or("unknown"))]
    Unexpected(Option<String>),
}

impl std::error::Error for SError {}

impl SError {
    /// Batch operations use this to tell a user cancel apart from a per-item failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SError::Cancelled)
    }
}

impl From<std::io::Error> for SError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => SError::NotFound(e.to_string()),
            _ => SError::IOError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for SError {
    fn from(e: serde_json::Error) -> Self {
        SError::ParseError(e.to_string())
    }
}

impl From<zip::result::ZipError> for SError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => io.into(),
            zip::result::ZipError::FileNotFound => SError::NotFound(e.to_string()),
            other => SError::InvalidPackage(other.to_string()),
        }
    }
}

impl From<walkdir::Error> for SError {
    fn from(e: walkdir::Error) -> Self {
        SError::IOError(e.to_string())
    }
}

impl From<std::path::StripPrefixError> for SError {
    fn from(e: std::path::StripPrefixError) -> Self {
        SError::Unexpected(Some(e.to_string()))
    }
}

impl From<confy::ConfyError> for SError {
    fn from(e: confy::ConfyError) -> Self {
        SError::Config(e.to_string())
    }
}
