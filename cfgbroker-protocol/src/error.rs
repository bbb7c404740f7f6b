use thiserror::Error;

// No variant carries heap data: these are produced inside the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeserializeError {
    #[error("Unexpected end of input")]
    UnexpectedEOF,

    #[error("Invalid UTF-8 in record")]
    InvalidUtf8,

    #[error("Unsupported record version: {0}")]
    UnsupportedVersion(u8),

    #[error("Token length {0} exceeds limit")]
    TokenTooLong(usize),

    #[error("Checksum Mismatch expected: {expected} found: {found}")]
    ChecksumMismatch { expected: u32, found: u32 },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}
