//! # rflate Core
//!
//! Core components shared by the rflate codec crates:
//!
//! - **Bit cursor**: absolute-position bit reads and writes over byte
//!   buffers, LSB-first as DEFLATE requires (RFC 1951 Section 3.1.1)
//! - **Checksums**: CRC-32 (gzip trailers), Adler-32 (zlib trailers),
//!   and the gzip header CRC-16
//! - **Error types**: the [`FlateError`] enum used across the workspace
//!
//! The bit cursor works on plain slices with an explicit bit position
//! instead of wrapping an `io::Read`. That is what lets the codec suspend
//! mid-stream and resume later: a position is just a number that can be
//! saved, rolled back, or carried across calls.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bits;
pub mod checksum;
pub mod error;

// Re-export commonly used types
pub use checksum::{Adler32, Crc32};
pub use error::{FlateError, Result};
