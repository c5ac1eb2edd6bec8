//! # rflate
//!
//! Pure Rust DEFLATE codec (RFC 1951) with resumable streaming and the gzip
//! (RFC 1952) and zlib (RFC 1950) container formats.
//!
//! ## One-shot
//!
//! ```rust
//! use rflate::{deflate, inflate};
//!
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6)?;
//! let decompressed = inflate(&compressed)?;
//! assert_eq!(&decompressed, original);
//! # Ok::<(), rflate::FlateError>(())
//! ```
//!
//! ## Streaming
//!
//! [`DeflateStream`] and [`InflateStream`] accept input in chunks of any
//! size and produce output incrementally; [`deflate_stream`] and
//! [`inflate_stream`] drive them over `std::io` reader/writer pairs. The
//! [`gzip`] and [`zlib`] modules offer the same surface for framed streams.
//!
//! ## Compression levels
//!
//! - Level 0: no compression (stored blocks)
//! - Levels 1-3: fast, short hash chains
//! - Levels 4-6: balanced (default is 6)
//! - Levels 7-9: best compression, long chain searches

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod deflate;
pub mod gzip;
pub mod huffman;
pub mod inflate;
mod lz77;
pub mod stream;
pub mod tables;
pub mod zlib;

// Re-exports
pub use deflate::{DeflateOptions, deflate, deflate_with_options};
pub use inflate::{inflate, inflate_with_dictionary};
pub use rflate_core::{FlateError, Result};
pub use stream::{
    DeflateStream, InflateStream, deflate_stream, inflate_stream, inflate_stream_with_dictionary,
};
