/*
 * The DEFLATE core: block dispatcher, canonical Huffman tables for the
 * fixed block type, dynamic code-length decoding, and the length/distance
 * back-reference engine.
 *
 * This is a direct, traceable reimplementation of the algorithm documented
 * in RFC 1951 and demonstrated unambiguously by Mark Adler's puff.c. It
 * deliberately avoids a table-driven fast-decode strategy (consuming
 * several bits at a time via a lookup table) because that approach cannot
 * report, per symbol, the exact canonical code and bit length a structural
 * trace needs.
 */

use crate::bitreader::BitReader;
use crate::error::{DecodeError, DecodeResult};
use crate::huffman::{ConstructOutcome, HuffmanTable};
use crate::trace::TraceSink;
use serde_json::Value;
use std::sync::OnceLock;

const LBASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];
const LEXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];
const DBASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];
const DEXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Permutation giving the bit-stream order in which code-length-code
/// lengths are transmitted for a dynamic block.
const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

struct FixedTables {
    litlen: HuffmanTable,
    distance: HuffmanTable,
}

/// The static fixed-Huffman tables, built once and cached behind a
/// `OnceLock` rather than recomputed for every fixed block.
fn fixed_tables() -> &'static FixedTables {
    static TABLES: OnceLock<FixedTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        let mut lens = [0u8; 288];
        lens[0..144].fill(8);
        lens[144..256].fill(9);
        lens[256..280].fill(7);
        lens[280..288].fill(8);
        let (litlen, _) = HuffmanTable::construct(&lens);

        let dist_lens = [5u8; 30];
        let (distance, _) = HuffmanTable::construct(&dist_lens);

        FixedTables { litlen, distance }
    })
}

/// Abstracts over "materialize the decompressed bytes" and "just count
/// them", so a sizing-only pass shares exactly the same block dispatcher
/// and back-reference logic as the real decode.
trait DeflateSink {
    fn len(&self) -> usize;
    fn push(&mut self, byte: u8);
    fn push_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }
    fn copy_backreference(&mut self, distance: usize, length: usize) -> DecodeResult<()>;
    /// The bytes produced since output length `from`, for verbose tracing
    /// of a single block's decoded data. `None` when the sink does not
    /// materialize bytes at all (a size-only scan).
    fn bytes_since(&self, from: usize) -> Option<&[u8]> {
        let _ = from;
        None
    }
}

struct MaterializingSink {
    bytes: Vec<u8>,
}

impl DeflateSink for MaterializingSink {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn bytes_since(&self, from: usize) -> Option<&[u8]> {
        Some(&self.bytes[from..])
    }

    fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn copy_backreference(&mut self, distance: usize, length: usize) -> DecodeResult<()> {
        if distance > self.bytes.len() {
            return out_of_range_copy(&mut self.bytes, length);
        }
        // One byte at a time: `length` may exceed `distance`, in which
        // case this deliberately re-reads bytes this same loop just wrote
        // (RLE-style self-reference). A bulk memcpy/memmove would be
        // incorrect here.
        let mut src = self.bytes.len() - distance;
        for _ in 0..length {
            let byte = self.bytes[src];
            self.bytes.push(byte);
            src += 1;
        }
        Ok(())
    }
}

#[cfg(feature = "relaxed-distance")]
fn out_of_range_copy(bytes: &mut Vec<u8>, length: usize) -> DecodeResult<()> {
    bytes.resize(bytes.len() + length, 0);
    Ok(())
}

#[cfg(not(feature = "relaxed-distance"))]
fn out_of_range_copy(_bytes: &mut [u8], _length: usize) -> DecodeResult<()> {
    Err(DecodeError::DistanceTooFar)
}

struct CountingSink {
    count: usize,
}

impl DeflateSink for CountingSink {
    fn len(&self) -> usize {
        self.count
    }

    fn push(&mut self, _byte: u8) {
        self.count += 1;
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.count += bytes.len();
    }

    fn copy_backreference(&mut self, distance: usize, length: usize) -> DecodeResult<()> {
        if distance > self.count {
            #[cfg(feature = "relaxed-distance")]
            {
                self.count += length;
                return Ok(());
            }
            #[cfg(not(feature = "relaxed-distance"))]
            {
                return Err(DecodeError::DistanceTooFar);
            }
        }
        self.count += length;
        Ok(())
    }
}

/// Decode a raw DEFLATE stream, materializing the decompressed bytes and
/// recording a full structural trace into `sink`.
pub fn decode(input: &[u8], sink: &mut TraceSink) -> DecodeResult<Vec<u8>> {
    let mut reader = BitReader::new(input);
    decode_from_reader(&mut reader, sink)
}

pub fn decode_from_reader(reader: &mut BitReader, sink: &mut TraceSink) -> DecodeResult<Vec<u8>> {
    let mut out = MaterializingSink { bytes: Vec::new() };
    run(reader, sink, &mut out)?;
    Ok(out.bytes)
}

/// Sizing pass: runs the full state machine, including every Huffman
/// decode and back-reference bounds check, but only accumulates an output
/// length rather than the bytes themselves. Lets a caller learn the
/// decompressed size without allocating the decompressed buffer twice.
pub fn scan_size(input: &[u8], sink: &mut TraceSink) -> DecodeResult<usize> {
    let mut reader = BitReader::new(input);
    scan_size_from_reader(&mut reader, sink)
}

pub fn scan_size_from_reader(reader: &mut BitReader, sink: &mut TraceSink) -> DecodeResult<usize> {
    let mut out = CountingSink { count: 0 };
    run(reader, sink, &mut out)?;
    Ok(out.count)
}

fn run(reader: &mut BitReader, sink: &mut TraceSink, out: &mut dyn DeflateSink) -> DecodeResult<()> {
    let mut blocks: Vec<Value> = Vec::new();
    let mut block_count: u32 = 0;

    let result: DecodeResult<()> = (|| loop {
        let block_start_bit = reader.bit_position();
        let bytes_before = out.len();
        let mut block_sink = TraceSink::new(sink.is_verbose());
        block_sink.field_u64("BLOCK_BIT_POSITION", block_start_bit as u64);

        match decode_one_block(reader, out, &mut block_sink) {
            Ok(bfinal) => {
                let block_end_bit = reader.bit_position();
                block_sink.field_u64("BLOCK_BIT_SIZE", (block_end_bit - block_start_bit) as u64);
                if block_sink.is_verbose() {
                    let encoded = reader.raw_bit_range(block_start_bit, block_end_bit);
                    block_sink.field_bytes("ENCODED_BIT_STREAM", encoded);
                    if let Some(decoded) = out.bytes_since(bytes_before) {
                        block_sink.field_bytes("DECOMPRESSED_DATA", decoded);
                    }
                }
                block_count += 1;
                blocks.push(block_sink.finish_partial());
                if bfinal {
                    return Ok(());
                }
            }
            Err(e) => {
                blocks.push(block_sink.finish_partial());
                return Err(e);
            }
        }
    })();

    sink.array("BLOCKS", blocks);
    sink.open("BLOCK_SUMMARY");
    sink.field_u64("BLOCK_COUNT", block_count as u64);
    sink.field_u64("DECOMPRESSED_BYTES", out.len() as u64);
    sink.close();

    result
}

/// Decode exactly one block; returns whether it was the final block
/// (BFINAL=1).
fn decode_one_block(
    reader: &mut BitReader,
    out: &mut dyn DeflateSink,
    block_sink: &mut TraceSink,
) -> DecodeResult<bool> {
    let bfinal = reader.read(1)?;
    let btype = reader.read(2)?;
    block_sink.field_u64("BFINAL", bfinal as u64);
    block_sink.field_u64("BTYPE", btype as u64);

    match btype {
        0 => decode_stored_block(reader, out, block_sink)?,
        1 => {
            let tables = fixed_tables();
            decode_huffman_block(reader, &tables.litlen, &tables.distance, out, block_sink)?;
        }
        2 => {
            let (litlen, distance) = read_dynamic_tables(reader, block_sink)?;
            decode_huffman_block(reader, &litlen, &distance, out, block_sink)?;
        }
        _ => return Err(DecodeError::InvalidBlockType),
    }

    Ok(bfinal == 1)
}

fn decode_stored_block(
    reader: &mut BitReader,
    out: &mut dyn DeflateSink,
    sink: &mut TraceSink,
) -> DecodeResult<()> {
    reader.align_to_byte();
    let len = reader.read(16)?;
    let nlen = reader.read(16)?;
    sink.field_u64("LEN", len as u64);
    sink.field_u64("NLEN", nlen as u64);
    if len + nlen != 0xFFFF {
        return Err(DecodeError::StoredLengthMismatch);
    }
    let data = reader.read_bytes(len as usize)?;
    if sink.is_verbose() {
        sink.field_bytes("RAW_DATA", &data);
    }
    out.push_bytes(&data);
    Ok(())
}

fn read_dynamic_tables(
    reader: &mut BitReader,
    sink: &mut TraceSink,
) -> DecodeResult<(HuffmanTable, HuffmanTable)> {
    let hlit = reader.read(5)? + 257;
    let hdist = reader.read(5)? + 1;
    let hclen = reader.read(4)? + 4;
    if hlit > 286 || hdist > 30 || hclen > 19 {
        return Err(DecodeError::BadCounts);
    }
    sink.field_u64("HLIT", hlit as u64);
    sink.field_u64("HDIST", hdist as u64);
    sink.field_u64("HCLEN", hclen as u64);

    let mut cl_lengths = [0u8; 19];
    for i in 0..hclen as usize {
        cl_lengths[CODE_LENGTH_ORDER[i]] = reader.read(3)? as u8;
    }

    let (cl_table, outcome) = HuffmanTable::construct(&cl_lengths);
    if outcome != ConstructOutcome::Complete {
        return Err(DecodeError::CodeLengthCodeIncomplete);
    }

    if sink.is_verbose() {
        let records: Vec<Value> = cl_lengths
            .iter()
            .enumerate()
            .filter(|&(_, &len)| len != 0)
            .map(|(sym, &len)| {
                let (code, _) = cl_table
                    .encoded_value(sym as u16)
                    .unwrap_or((0, len as u32));
                TraceSink::symbol_record(
                    len as u32,
                    code,
                    sym as i64,
                    format!("code-length symbol {sym}"),
                )
            })
            .collect();
        sink.array("CODE_LENGTH_TABLE", records);
    }

    let total = (hlit + hdist) as usize;
    let mut lengths = vec![0u8; total];
    let mut i = 0usize;
    while i < total {
        let (sym, _) = cl_table.decode(reader)?;
        match sym {
            0..=15 => {
                lengths[i] = sym as u8;
                i += 1;
            }
            16 => {
                if i == 0 {
                    return Err(DecodeError::RepeatWithoutPrevious);
                }
                let rep = (3 + reader.read(2)?) as usize;
                if i + rep > total {
                    return Err(DecodeError::RepeatOverrun);
                }
                let prev = lengths[i - 1];
                lengths[i..i + rep].fill(prev);
                i += rep;
            }
            17 => {
                let rep = (3 + reader.read(3)?) as usize;
                if i + rep > total {
                    return Err(DecodeError::RepeatOverrun);
                }
                lengths[i..i + rep].fill(0);
                i += rep;
            }
            18 => {
                let rep = (11 + reader.read(7)?) as usize;
                if i + rep > total {
                    return Err(DecodeError::RepeatOverrun);
                }
                lengths[i..i + rep].fill(0);
                i += rep;
            }
            _ => return Err(DecodeError::BadHuffmanSymbol),
        }
    }

    let litlen_lengths = &lengths[..hlit as usize];
    let dist_lengths = &lengths[hlit as usize..];

    let (litlen_table, litlen_outcome) = HuffmanTable::construct(litlen_lengths);
    if !table_acceptable(&litlen_table, litlen_outcome) {
        return Err(DecodeError::InvalidLiteralLengthTable);
    }
    if litlen_lengths.get(256).copied().unwrap_or(0) == 0 {
        return Err(DecodeError::MissingEndOfBlock);
    }

    let (dist_table, dist_outcome) = HuffmanTable::construct(dist_lengths);
    if !table_acceptable(&dist_table, dist_outcome) {
        return Err(DecodeError::InvalidDistanceTable);
    }

    if sink.is_verbose() {
        let mut records = Vec::new();
        for (sym, &len) in litlen_lengths.iter().enumerate() {
            if len != 0 {
                let (code, _) = litlen_table
                    .encoded_value(sym as u16)
                    .unwrap_or((0, len as u32));
                records.push(TraceSink::symbol_record(
                    len as u32,
                    code,
                    sym as i64,
                    format!("litlen symbol {sym}"),
                ));
            }
        }
        for (sym, &len) in dist_lengths.iter().enumerate() {
            if len != 0 {
                let (code, _) = dist_table
                    .encoded_value(sym as u16)
                    .unwrap_or((0, len as u32));
                records.push(TraceSink::symbol_record(
                    len as u32,
                    code,
                    sym as i64,
                    format!("distance symbol {sym}"),
                ));
            }
        }
        sink.array("LITERAL_LENGTH_DISTANCE_TABLE", records);
    }

    Ok((litlen_table, dist_table))
}

fn table_acceptable(table: &HuffmanTable, outcome: ConstructOutcome) -> bool {
    match outcome {
        ConstructOutcome::Complete => true,
        ConstructOutcome::Incomplete(_) => table.is_single_length_one(),
        ConstructOutcome::Oversubscribed => false,
    }
}

fn decode_huffman_block(
    reader: &mut BitReader,
    litlen: &HuffmanTable,
    distance: &HuffmanTable,
    out: &mut dyn DeflateSink,
    sink: &mut TraceSink,
) -> DecodeResult<()> {
    let mut symbols: Vec<Value> = Vec::new();

    loop {
        let (symbol, code_len) = litlen.decode(reader)?;

        if symbol < 256 {
            out.push(symbol as u8);
            if sink.is_verbose() {
                let (code, _) = litlen.encoded_value(symbol).unwrap_or((0, code_len));
                symbols.push(TraceSink::symbol_record(
                    code_len,
                    code,
                    symbol as i64,
                    format!("literal 0x{symbol:02X}"),
                ));
            }
            continue;
        }

        if symbol == 256 {
            if sink.is_verbose() {
                let (code, _) = litlen.encoded_value(symbol).unwrap_or((0, code_len));
                symbols.push(TraceSink::symbol_record(code_len, code, 256, "end of block"));
            }
            break;
        }

        if symbol > 285 {
            return Err(DecodeError::BadHuffmanSymbol);
        }

        let i = (symbol - 257) as usize;
        let extra_len = reader.read(LEXTRA[i] as u32)?;
        let length = LBASE[i] as u32 + extra_len;

        let (dist_symbol, dist_code_len) = distance.decode(reader)?;
        if dist_symbol > 29 {
            return Err(DecodeError::BadHuffmanSymbol);
        }
        let dj = dist_symbol as usize;
        let extra_dist = reader.read(DEXTRA[dj] as u32)?;
        let dist = DBASE[dj] as u32 + extra_dist;

        if sink.is_verbose() {
            let (code, _) = litlen.encoded_value(symbol).unwrap_or((0, code_len));
            symbols.push(TraceSink::symbol_record(
                code_len,
                code,
                length as i64,
                format!("length {length}"),
            ));
            let (dcode, _) = distance.encoded_value(dist_symbol).unwrap_or((0, dist_code_len));
            symbols.push(TraceSink::symbol_record(
                dist_code_len,
                dcode,
                dist as i64,
                format!("distance {dist}"),
            ));
        }

        out.copy_backreference(dist as usize, length as usize)?;
    }

    if sink.is_verbose() {
        sink.array("SYMBOLS", symbols);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// zlib-wrapped empty stream's DEFLATE payload: a single final stored
    /// block of length 0.
    #[test]
    fn empty_stored_block() {
        let payload = [0x01u8, 0x00, 0x00, 0xFF, 0xFF];
        let mut sink = TraceSink::new(false);
        let out = decode(&payload, &mut sink).unwrap();
        assert!(out.is_empty());
    }

    /// Fixed-Huffman encoding of "Hello".
    #[test]
    fn fixed_huffman_hello() {
        // Built by hand from the fixed-code table: 'H'=0x48 -> litlen 72 is
        // in the 144..256 band -> 9-bit code = 0x30 + 72 = 0x138, etc. We
        // instead assemble the bitstream via the encoder-side formula:
        // code(sym) for band 0..143 is 0x30 + sym (8 bits),
        // for 144..255 is 0x190 + (sym-144) (9 bits),
        // end-of-block (256) is 0x0000 (7 bits).
        fn fixed_code(sym: u32) -> (u32, u32) {
            match sym {
                0..=143 => (0x30 + sym, 8),
                144..=255 => (0x190 + (sym - 144), 9),
                256..=279 => (sym - 256, 7),
                280..=287 => (0xC0 + (sym - 280), 8),
                _ => unreachable!(),
            }
        }
        let mut bits: Vec<u8> = Vec::new();
        let mut push_code = |code: u32, len: u32| {
            for i in (0..len).rev() {
                bits.push(((code >> i) & 1) as u8);
            }
        };
        push_code(1, 1); // BFINAL
        // BTYPE is a plain LSB-first 2-bit field (not Huffman-coded);
        // BTYPE=1 (fixed Huffman) transmits as bit0=1, bit1=0.
        bits.push(1);
        bits.push(0);

        for &b in b"Hello" {
            let (code, len) = fixed_code(b as u32);
            push_code(code, len);
        }
        let (eob_code, eob_len) = fixed_code(256);
        push_code(eob_code, eob_len);

        let mut bytes = Vec::new();
        let mut cur = 0u8;
        let mut n = 0u8;
        for b in bits {
            cur |= b << n;
            n += 1;
            if n == 8 {
                bytes.push(cur);
                cur = 0;
                n = 0;
            }
        }
        if n > 0 {
            bytes.push(cur);
        }

        let mut sink = TraceSink::new(false);
        let out = decode(&bytes, &mut sink).unwrap();
        assert_eq!(out, b"Hello");
    }

    #[test]
    fn self_referential_run_length_copy() {
        // distance=1 length=258 must replicate the last byte 258 times.
        let mut out = MaterializingSink { bytes: vec![b'x'] };
        out.copy_backreference(1, 258).unwrap();
        assert_eq!(out.bytes.len(), 259);
        assert!(out.bytes.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn overlapping_copy_four_byte_period() {
        let mut out = MaterializingSink {
            bytes: b"abcd".to_vec(),
        };
        out.copy_backreference(4, 12).unwrap();
        assert_eq!(out.bytes, b"abcdabcdabcdabcd");
    }

    #[test]
    fn distance_too_far_is_rejected() {
        let mut out = MaterializingSink { bytes: vec![1, 2] };
        assert_eq!(
            out.copy_backreference(5, 3),
            Err(DecodeError::DistanceTooFar)
        );
    }

    #[test]
    fn scan_size_matches_materialized_length() {
        let payload = [0x01u8, 0x00, 0x00, 0xFF, 0xFF];
        let mut sink_a = TraceSink::new(false);
        let decoded = decode(&payload, &mut sink_a).unwrap();
        let mut sink_b = TraceSink::new(false);
        let size = scan_size(&payload, &mut sink_b).unwrap();
        assert_eq!(decoded.len(), size);
    }

    #[test]
    fn verbose_block_reports_raw_bits_and_decoded_bytes() {
        // A single stored block carrying "hi".
        let payload = [0x01u8, 0x02, 0x00, 0xFD, 0xFF, b'h', b'i'];
        let mut sink = TraceSink::new(true);
        let out = decode(&payload, &mut sink).unwrap();
        assert_eq!(out, b"hi");

        let tree = sink.finish();
        let blocks = tree["BLOCKS"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0]["DECOMPRESSED_DATA"].as_array().unwrap().len(),
            2
        );
        assert!(!blocks[0]["ENCODED_BIT_STREAM"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn truncated_block_reports_position_without_size() {
        // A dynamic-block header cut off mid-HCLEN-table.
        let payload = [0b0000_0100u8];
        let mut sink = TraceSink::new(false);
        let err = decode(&payload, &mut sink).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEndOfInput);
        let tree = sink.finish();
        let blocks = tree["BLOCKS"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].get("BLOCK_BIT_POSITION").is_some());
        assert!(blocks[0].get("BLOCK_BIT_SIZE").is_none());
    }
}
