// ============================================================================
// ERROR TAXONOMY — every user-visible failure in the editor
// ============================================================================
//
// All failures are handled at the boundary where they occur and surfaced as a
// single message. Nothing here is retried automatically; the user retries by
// clicking again or closes the editor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    /// No subject image could be located for the session. Aborts session open.
    #[error("no source image found")]
    SourceNotFound,

    /// Export attempted before an image's natural dimensions are known.
    /// Aborts that export attempt only; the session stays open.
    #[error("image is still loading, try again in a moment")]
    ImageNotReady,

    /// The composite surface could not be encoded to bytes.
    #[error("failed to render composite: {0}")]
    RenderFailed(String),

    /// The clipboard or insertion sink rejected the payload.
    #[error("could not deliver image: {0}")]
    SinkUnavailable(String),

    /// A sticker asset name did not resolve. Fatal to `add_overlay`.
    #[error("unknown sticker asset '{0}'")]
    StickerNotFound(String),

    /// A second export was requested while one is still outstanding.
    /// The session allows at most one in-flight export.
    #[error("an export is already in progress")]
    ExportInFlight,

    /// There is no live session to operate on.
    #[error("no editing session is open")]
    NoSession,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, EditorError>;
