use thiserror::Error;

/// Result type for markpipe operations.
pub type MarkpipeResult<T> = Result<T, MarkpipeError>;

#[derive(Error, Debug)]
pub enum MarkpipeError {
    /// Clip store access failed
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Video source could not be opened
    #[error("failed to open video {path}: {source}")]
    VideoOpen {
        path: String,
        source: ffmpeg_next::Error,
    },

    /// Decoding failed after the source was opened
    #[error("decode error: {0}")]
    Decode(#[from] ffmpeg_next::Error),

    /// Terminal setup or rendering failed
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    /// Marker key table rejected at construction
    #[error("invalid marker binding: {0}")]
    InvalidBinding(String),
}
