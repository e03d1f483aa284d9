use thiserror::Error;

/// Errors surfaced to callers of the grouping engine.
///
/// Individual pair comparisons never produce one of these; a failed
/// comparison is a rejected pair.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No entities were passed where at least one is required.
    #[error("empty input: at least one entity is required")]
    EmptyInput,

    /// A configuration value is out of its valid range.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl EngineError {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
