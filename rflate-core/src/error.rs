//! Error types for rflate operations.
//!
//! A single tagged enum covers every failure mode in the workspace: I/O
//! errors, malformed DEFLATE streams, bad container headers, and checksum
//! mismatches. Decode-side variants carry the bit position at which the
//! condition was detected; checksum variants carry both the stored and the
//! computed value.

use std::io;
use thiserror::Error;

/// The main error type for rflate operations.
#[derive(Debug, Error)]
pub enum FlateError {
    /// I/O error from an underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input ended before the stream was complete.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Reserved or inconsistent block header.
    #[error("invalid block type at bit position {bit_position}")]
    InvalidBlockType {
        /// Bit position where the bad header was found.
        bit_position: usize,
    },

    /// A literal/length code with no assigned symbol.
    #[error("invalid length/literal code at bit position {bit_position}")]
    InvalidLengthLiteral {
        /// Bit position where the bad code was found.
        bit_position: usize,
    },

    /// A distance code with no assigned symbol, a reserved distance symbol,
    /// or a back-reference reaching before the start of the data.
    #[error("invalid distance at bit position {bit_position}")]
    InvalidDistance {
        /// Bit position where the bad distance was found.
        bit_position: usize,
    },

    /// Code lengths that are oversubscribed or incomplete.
    #[error("invalid Huffman tree: oversubscribed or incomplete")]
    InvalidHuffmanTree,

    /// Malformed gzip or zlib header.
    #[error("invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Adler-32 checksum mismatch in a zlib stream.
    #[error("Adler-32 mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream.
        expected: u32,
        /// Checksum computed from the data.
        computed: u32,
    },

    /// CRC-32 mismatch in a gzip trailer.
    #[error("CRC-32 mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        /// CRC stored in the stream.
        expected: u32,
        /// CRC computed from the data.
        computed: u32,
    },

    /// gzip ISIZE field does not match the decompressed length.
    #[error("size mismatch: expected {expected} bytes, produced {computed}")]
    SizeMismatch {
        /// Size stored in the trailer (mod 2^32).
        expected: u64,
        /// Size actually produced (mod 2^32).
        computed: u64,
    },

    /// Bytes after the end of a gzip member that are not another member.
    #[error("trailing garbage after gzip member")]
    TrailingGarbage,

    /// Options rejected by validation.
    #[error("invalid options: {message}")]
    InvalidOptions {
        /// Description of the rejected option.
        message: String,
    },
}

/// Result type alias for rflate operations.
pub type Result<T> = std::result::Result<T, FlateError>;

impl FlateError {
    /// Create an invalid block type error.
    pub fn invalid_block_type(bit_position: usize) -> Self {
        Self::InvalidBlockType { bit_position }
    }

    /// Create an invalid length/literal error.
    pub fn invalid_length_literal(bit_position: usize) -> Self {
        Self::InvalidLengthLiteral { bit_position }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(bit_position: usize) -> Self {
        Self::InvalidDistance { bit_position }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an Adler-32 mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create a CRC-32 mismatch error.
    pub fn crc_mismatch(expected: u32, computed: u32) -> Self {
        Self::CrcMismatch { expected, computed }
    }

    /// Create an ISIZE mismatch error.
    pub fn size_mismatch(expected: u64, computed: u64) -> Self {
        Self::SizeMismatch { expected, computed }
    }

    /// Create an invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlateError::invalid_block_type(42);
        assert!(err.to_string().contains("bit position 42"));

        let err = FlateError::crc_mismatch(0x12345678, 0xDEADBEEF);
        assert!(err.to_string().contains("CRC-32 mismatch"));

        let err = FlateError::invalid_header("bad magic");
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: FlateError = io_err.into();
        assert!(matches!(err, FlateError::Io(_)));
    }
}
