//! Parse errors for user-supplied format and quality values.

/// Error returned when a format or bitrate string cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The audio format is not one of the supported outputs.
    #[error("unsupported audio format: {0} (expected one of mp3, aac, wav, flac)")]
    UnknownFormat(String),

    /// The bitrate string is malformed or not positive.
    #[error("invalid bitrate: {0:?} (expected a value like 128k, 192k or 320k)")]
    InvalidBitrate(String),
}
