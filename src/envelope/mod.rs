//! Envelope header/trailer parsers: zlib and gzip delegate their payload to
//! [`crate::deflate`]; LZ4 and Zstandard walk block structure only.

pub mod gzip;
pub mod lz4;
pub mod zlib;
pub mod zstd;
