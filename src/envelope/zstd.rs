/*
 * Zstandard frame format: a frame header describing window size and
 * optional content size/dictionary ID, followed by a sequence of blocks.
 * Block bodies are walked but not entropy-decoded (Zstandard's FSE/Huffman
 * literal and sequence stages are out of scope here).
 */

use crate::bitreader::BitReader;
use crate::error::{DecodeError, DecodeResult};
use crate::trace::TraceSink;

const MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

pub fn walk(input: &[u8], sink: &mut TraceSink) -> DecodeResult<()> {
    let mut reader = BitReader::new(input);

    let magic = reader.read_bytes(4)?;
    if magic != MAGIC {
        sink.field_str("description", "bad zstd frame magic");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }

    let fhd = reader.read_bytes(1)?[0];
    let dict_id_flag = fhd & 0x03;
    let content_checksum = fhd & 0x04 != 0;
    let reserved = fhd & 0x08 != 0;
    let single_segment = fhd & 0x20 != 0;
    let fcs_flag = (fhd >> 6) & 0x03;

    if reserved {
        sink.field_str("description", "reserved frame header descriptor bit set");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }

    sink.open("ZSTD_FRAME_HEADER");
    sink.field_u64("FRAME_HEADER_DESCRIPTOR", fhd as u64);
    sink.field_u64("DICT_ID_FLAG", dict_id_flag as u64);
    sink.field_bool("CONTENT_CHECKSUM_FLAG", content_checksum);
    sink.field_bool("SINGLE_SEGMENT", single_segment);
    sink.field_u64("FCS_FLAG", fcs_flag as u64);

    if !single_segment {
        let wd = reader.read_bytes(1)?[0];
        let mantissa = (wd & 0x07) as u64;
        let exponent = (wd >> 3) as u32;
        let window_log = 10 + exponent;
        let base = 1u64 << window_log;
        let window_size = base + (base / 8) * mantissa;
        sink.field_u64("WINDOW_DESCRIPTOR", wd as u64);
        sink.field_u64("WINDOW_SIZE", window_size);
    }

    let dict_id_size: usize = match dict_id_flag {
        0 => 0,
        1 => 1,
        2 => 2,
        3 => 4,
        _ => unreachable!(),
    };
    if dict_id_size > 0 {
        let bytes = reader.read_bytes(dict_id_size)?;
        let dict_id = le_to_u64(&bytes);
        sink.field_u64("DICT_ID", dict_id);
    }

    let fcs_size: usize = match (fcs_flag, single_segment) {
        (0, true) => 1,
        (0, false) => 0,
        (1, _) => 2,
        (2, _) => 4,
        (3, _) => 8,
        _ => unreachable!(),
    };
    if fcs_size > 0 {
        let bytes = reader.read_bytes(fcs_size)?;
        let mut value = le_to_u64(&bytes);
        if fcs_size == 2 {
            value += 256;
        }
        sink.field_u64("FRAME_CONTENT_SIZE", value);
    }
    sink.close();

    let mut blocks = Vec::new();
    loop {
        let header_bytes = reader.read_bytes(3)?;
        let header = le_to_u64(&header_bytes) as u32;
        let last_block = header & 0x1 != 0;
        let block_type = (header >> 1) & 0x3;
        let block_size = (header >> 3) & 0x1F_FFFF;

        if block_type == 3 {
            return Err(DecodeError::EnvelopeHeaderInvalid);
        }

        let mut block_sink = TraceSink::new(sink.is_verbose());
        block_sink.field_bool("LAST_BLOCK", last_block);
        block_sink.field_u64("BLOCK_TYPE", block_type as u64);
        block_sink.field_u64("BLOCK_SIZE", block_size as u64);

        let on_disk_size = if block_type == 1 { 1 } else { block_size as usize };
        let body = reader.read_bytes(on_disk_size)?;
        if sink.is_verbose() {
            block_sink.field_bytes("BLOCK_DATA", &body);
        }

        blocks.push(block_sink.finish());

        if last_block {
            break;
        }
    }
    sink.array("BLOCKS", blocks);

    if content_checksum {
        let bytes = reader.read_bytes(4)?;
        let checksum = u32::from_le_bytes(bytes.try_into().unwrap());
        sink.field_u64("CONTENT_CHECKSUM", checksum as u64);
    }

    Ok(())
}

fn le_to_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &b)| acc | (b as u64) << (8 * i))
}
