pub mod bitreader;
pub mod checksum;
pub mod deflate;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod huffman;
pub mod trace;

pub use error::{DecodeError, DecodeResult};
