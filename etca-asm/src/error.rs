use thiserror::Error;

/// Errors produced when encoding user-provided values into fixed widths.
///
/// Width violations coming from user input (e.g. a word directive argument
/// that does not fit) are reported through this type; width violations inside
/// instruction encoders are contract bugs and panic in [`crate::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The value does not fit the requested byte width, two's-complement for
    /// negatives.
    #[error("value {value} does not fit in {width} byte(s)")]
    ValueOutOfRange {
        /// The value that was being encoded.
        value: i128,
        /// The requested width in bytes.
        width: usize,
    },
}
