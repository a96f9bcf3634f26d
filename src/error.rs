/*
 * Error hierarchy for the DEFLATE family decoder.
 *
 * Every fallible call in this crate returns a `Result<_, DecodeError>` and
 * propagates with `?`. `DecodeError::code()` tabulates the documented
 * signed return code for each failure mode so the CLI drivers can turn it
 * into the matching process exit status.
 */

use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// Fewer unread bits/bytes remained in the input than the caller asked
    /// for.
    UnexpectedEndOfInput,
    /// The caller-provided output buffer could not hold the full payload.
    OutputBufferTooSmall,
    /// BTYPE was 3 (reserved, invalid).
    InvalidBlockType,
    /// A stored block's LEN and NLEN were not complements of each other.
    StoredLengthMismatch,
    /// HLIT, HDIST, or HCLEN decoded to an out-of-range count.
    BadCounts,
    /// The 19-symbol code-length Huffman code was not complete.
    CodeLengthCodeIncomplete,
    /// A repeat-previous-length symbol (16) appeared with no prior length.
    RepeatWithoutPrevious,
    /// A repeat run (16/17/18) would overflow HLIT + HDIST slots.
    RepeatOverrun,
    /// The literal/length code was incomplete (other than the one
    /// permitted single-symbol-of-length-1 case) or oversubscribed.
    InvalidLiteralLengthTable,
    /// The distance code was incomplete (other than the permitted
    /// single-symbol-of-length-1 case) or oversubscribed.
    InvalidDistanceTable,
    /// A dynamic block's literal/length table had no code for symbol 256.
    MissingEndOfBlock,
    /// A Huffman decode ran off the end of an incomplete table, or hit a
    /// structurally invalid symbol (e.g. length/distance symbol 286/287,
    /// distance symbol 30/31 in a fixed block).
    BadHuffmanSymbol,
    /// A back-reference's distance pointed before the start of output.
    DistanceTooFar,
    /// An envelope header (zlib/gzip/LZ4/zstd) failed a structural check
    /// treated as fatal (bad magic, bad method, reserved bits set, oversized
    /// field count, and so on).
    EnvelopeHeaderInvalid,
}

impl DecodeError {
    /// The documented signed return code for this error. The CLI drivers
    /// turn this into the documented positive process exit status.
    pub const fn code(self) -> i32 {
        match self {
            DecodeError::UnexpectedEndOfInput => 2,
            DecodeError::OutputBufferTooSmall => 1,
            DecodeError::InvalidBlockType => -1,
            DecodeError::StoredLengthMismatch => -2,
            DecodeError::BadCounts => -3,
            DecodeError::CodeLengthCodeIncomplete => -4,
            DecodeError::RepeatWithoutPrevious => -5,
            DecodeError::RepeatOverrun => -6,
            DecodeError::InvalidLiteralLengthTable => -7,
            DecodeError::InvalidDistanceTable => -8,
            DecodeError::MissingEndOfBlock => -9,
            DecodeError::BadHuffmanSymbol => -10,
            DecodeError::DistanceTooFar => -11,
            DecodeError::EnvelopeHeaderInvalid => -1,
        }
    }

    /// The process exit status a CLI driver should return for this error.
    pub const fn exit_code(self) -> i32 {
        self.code().unsigned_abs() as i32
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEndOfInput => {
                write!(f, "truncated input: ran out of bits before the stream ended")
            }
            DecodeError::OutputBufferTooSmall => {
                write!(f, "output buffer too small for the decompressed payload")
            }
            DecodeError::InvalidBlockType => write!(f, "invalid DEFLATE block type (BTYPE=3)"),
            DecodeError::StoredLengthMismatch => {
                write!(f, "stored block LEN did not complement NLEN")
            }
            DecodeError::BadCounts => write!(f, "HLIT/HDIST/HCLEN out of range"),
            DecodeError::CodeLengthCodeIncomplete => {
                write!(f, "code-length Huffman code was incomplete")
            }
            DecodeError::RepeatWithoutPrevious => {
                write!(f, "repeat-previous-length symbol with no previous length")
            }
            DecodeError::RepeatOverrun => {
                write!(f, "code-length repeat run overran HLIT + HDIST")
            }
            DecodeError::InvalidLiteralLengthTable => {
                write!(f, "literal/length Huffman table was invalid")
            }
            DecodeError::InvalidDistanceTable => write!(f, "distance Huffman table was invalid"),
            DecodeError::MissingEndOfBlock => {
                write!(f, "literal/length table has no code for end-of-block")
            }
            DecodeError::BadHuffmanSymbol => write!(f, "invalid or unresolvable Huffman symbol"),
            DecodeError::DistanceTooFar => {
                write!(f, "back-reference distance pointed before the output start")
            }
            DecodeError::EnvelopeHeaderInvalid => write!(f, "envelope header failed validation"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub type DecodeResult<T> = Result<T, DecodeError>;
