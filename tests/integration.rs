use deflate_dump_rs::envelope::{gzip, zlib};
use deflate_dump_rs::error::DecodeError;
use deflate_dump_rs::{deflate, trace::TraceSink};

/// Assembles a fixed-Huffman block that emits "ab" as two literals, then
/// two back-references (length 8, distance 2 -- symbol 262 has a fixed
/// length of 8 with no extra bits) that repeat the two-byte pattern,
/// exercising the same back-reference engine a dynamic block's
/// length/distance loop would.
#[test]
fn repeated_two_byte_pattern_round_trips_through_backreference() {
    fn fixed_code(sym: u32) -> (u32, u32) {
        match sym {
            0..=143 => (0x30 + sym, 8),
            144..=255 => (0x190 + (sym - 144), 9),
            256..=279 => (sym - 256, 7),
            280..=287 => (0xC0 + (sym - 280), 8),
            _ => unreachable!(),
        }
    }
    fn dist_code(sym: u32) -> (u32, u32) {
        (sym, 5)
    }

    let mut bits: Vec<u8> = Vec::new();
    let mut push_bits_lsb_first = |value: u32, len: u32| {
        for i in 0..len {
            bits.push(((value >> i) & 1) as u8);
        }
    };
    let mut push_code_msb_first = |code: u32, len: u32| {
        for i in (0..len).rev() {
            bits.push(((code >> i) & 1) as u8);
        }
    };

    push_bits_lsb_first(1, 1); // BFINAL
    push_bits_lsb_first(0b01, 2); // BTYPE=1 (fixed)

    let (a_code, a_len) = fixed_code(b'a' as u32);
    push_code_msb_first(a_code, a_len);
    let (b_code, b_len) = fixed_code(b'b' as u32);
    push_code_msb_first(b_code, b_len);

    // symbol 262: LBASE[5] = 8, LEXTRA[5] = 0 -> fixed length 8.
    // distance symbol 1: DBASE[1] = 2, DEXTRA[1] = 0 -> fixed distance 2.
    let (len_code, len_len) = fixed_code(262);
    let (d_code, d_len) = dist_code(1);
    for _ in 0..2 {
        push_code_msb_first(len_code, len_len);
        push_code_msb_first(d_code, d_len);
    }

    let (eob_code, eob_len) = fixed_code(256);
    push_code_msb_first(eob_code, eob_len);

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
    let out = deflate::decode(&bytes, &mut sink).unwrap();
    // two literals + two length-8 back-references = 18 bytes, nine "ab" pairs.
    assert_eq!(out, "ab".repeat(9).into_bytes());
}

#[test]
fn zlib_wrapped_empty_stream() {
    let input = [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
    let mut sink = TraceSink::new(false);
    let out = zlib::decode(&input, &mut sink).unwrap();
    assert!(out.is_empty());

    let tree = sink.finish();
    let blocks = tree["BLOCKS"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["BTYPE"], 0);
    assert_eq!(blocks[0]["LEN"], 0);
    assert_eq!(blocks[0]["NLEN"], 65535);
}

#[test]
fn truncated_gzip_header_reports_bit_position_without_size() {
    // Valid gzip magic and method, but the stream is cut before any
    // DEFLATE block bits follow.
    let input = [0x1F, 0x8B, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xFF];
    let mut sink = TraceSink::new(false);
    let err = gzip::decode(&input, &mut sink).unwrap_err();
    assert_eq!(err, DecodeError::UnexpectedEndOfInput);
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn bit_position_monotonicity_across_blocks() {
    // Two back-to-back stored blocks: an empty non-final one followed by
    // an empty final one.
    let mut bytes = vec![0x00u8, 0x00, 0x00, 0xFF, 0xFF];
    bytes.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
    let mut sink = TraceSink::new(false);
    let out = deflate::decode(&bytes, &mut sink).unwrap();
    assert!(out.is_empty());

    let tree = sink.finish();
    let blocks = tree["BLOCKS"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    let first_pos = blocks[0]["BLOCK_BIT_POSITION"].as_u64().unwrap();
    let first_size = blocks[0]["BLOCK_BIT_SIZE"].as_u64().unwrap();
    let second_pos = blocks[1]["BLOCK_BIT_POSITION"].as_u64().unwrap();
    assert_eq!(first_pos + first_size, second_pos);
}

#[test]
fn sizing_pass_matches_decoding_pass_length() {
    let input = [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
    let mut sink_a = TraceSink::new(false);
    let decoded = zlib::decode(&input, &mut sink_a).unwrap();
    let mut sink_b = TraceSink::new(false);
    let sized = zlib::scan_size(&input, &mut sink_b).unwrap();
    assert_eq!(decoded.len(), sized);
}
