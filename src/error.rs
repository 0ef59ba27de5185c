//! Error types for score conversion.
//!
//! Fatal kinds abort a conversion before anything is written. The two
//! recoverable kinds (`UnknownAccidental`, `UnrecognizedDurationType`)
//! are produced by the lookup tables and resolved by the readers, which
//! drop the affected field and keep going.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while converting a score.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A required attribute or child is missing or unreadable.
    #[error("malformed <{element}>: {detail}")]
    MalformedSourceElement { element: String, detail: String },

    /// Alteration or accidental code outside the supported range.
    #[error("unknown accidental '{0}'")]
    UnknownAccidental(String),

    /// Note type with neither a known name nor a leading number.
    #[error("unrecognized duration type '{0}'")]
    UnrecognizedDurationType(String),

    /// Document root is not one the pipeline understands.
    #[error("unsupported root element <{found}>, expected {expected}")]
    UnsupportedRootElement { found: String, expected: String },

    /// File extensions do not describe a known conversion direction.
    #[error("unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    #[error("input file '{}' does not exist", .0.display())]
    InputNotFound(PathBuf),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("XML write error: {0}")]
    Write(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MXL archive error: {0}")]
    Archive(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    pub(crate) fn malformed(element: &str, detail: impl Into<String>) -> Self {
        ConvertError::MalformedSourceElement {
            element: element.to_string(),
            detail: detail.into(),
        }
    }

    /// Whether a reader may drop the offending field instead of failing.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConvertError::UnknownAccidental(_) | ConvertError::UnrecognizedDurationType(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Resolve a lookup result: recoverable errors are logged and turn into
/// `None` so the caller drops `field`; anything else propagates.
pub(crate) fn recover<T>(result: Result<T>, field: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_recoverable() => {
            log::warn!("{e}; omitting {field}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
