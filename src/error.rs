//! Error type shared by the selection engine and its bindings.

use crate::selection::document::LayerId;

/// Recoverable failures of tile construction, document lookup and fills.
///
/// Internal invariant violations (for example a malformed boundary edge)
/// are defects and panic instead of surfacing here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WandError {
    /// Tile sizes must be non-zero powers of two.
    #[error("tile size {0} is not a non-zero power of two")]
    InvalidTileSize(usize),

    /// A pixel buffer did not have the expected shape.
    #[error("buffer shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A layer id was requested that the document does not contain.
    #[error("document has no layer with id {0}")]
    UnknownLayer(LayerId),

    /// The fill was cancelled through its cancellation token.
    #[error("flood fill was cancelled")]
    Cancelled,

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, WandError>;
