/*
 * LZ4 frame format: header, a sequence of length-prefixed blocks ended by
 * a zero word, optional checksums. Block bodies are walked but not
 * decompressed (LZ4's own entropy stage is out of scope here).
 */

use crate::bitreader::BitReader;
use crate::error::{DecodeError, DecodeResult};
use crate::trace::TraceSink;

const MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

pub fn walk(input: &[u8], sink: &mut TraceSink) -> DecodeResult<()> {
    let mut reader = BitReader::new(input);

    let magic = reader.read_bytes(4)?;
    if magic != MAGIC {
        sink.field_str("description", "bad LZ4 frame magic");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }

    let flg = reader.read_bytes(1)?[0];
    let bd = reader.read_bytes(1)?[0];

    let dict_id_flag = flg & 0x01 != 0;
    let reserved_bit = flg & 0x02 != 0;
    let content_checksum = flg & 0x04 != 0;
    let content_size_flag = flg & 0x08 != 0;
    let block_checksum = flg & 0x10 != 0;
    let block_independence = flg & 0x20 != 0;
    let version = (flg >> 6) & 0x03;

    if reserved_bit || version != 1 {
        sink.field_str("description", "reserved FLG bit set or unsupported version");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }

    let block_max_size_code = (bd >> 4) & 0x07;
    let block_max_size: u64 = match block_max_size_code {
        4 => 64 * 1024,
        5 => 256 * 1024,
        6 => 1024 * 1024,
        7 => 4 * 1024 * 1024,
        _ => 0,
    };

    sink.open("LZ4_FRAME_HEADER");
    sink.field_u64("FLG", flg as u64);
    sink.field_u64("BD", bd as u64);
    sink.field_bool("DICT_ID_FLAG", dict_id_flag);
    sink.field_bool("CONTENT_CHECKSUM_FLAG", content_checksum);
    sink.field_bool("CONTENT_SIZE_FLAG", content_size_flag);
    sink.field_bool("BLOCK_CHECKSUM_FLAG", block_checksum);
    sink.field_bool("BLOCK_INDEPENDENCE_FLAG", block_independence);
    sink.field_u64("VERSION", version as u64);
    sink.field_u64("BLOCK_MAX_SIZE", block_max_size);

    if content_size_flag {
        let bytes = reader.read_bytes(8)?;
        let content_size = u64::from_le_bytes(bytes.try_into().unwrap());
        sink.field_u64("CONTENT_SIZE", content_size);
    }
    if dict_id_flag {
        let bytes = reader.read_bytes(4)?;
        let dict_id = u32::from_le_bytes(bytes.try_into().unwrap());
        sink.field_u64("DICT_ID", dict_id as u64);
    }

    let hc = reader.read_bytes(1)?[0];
    sink.field_u64("HEADER_CHECKSUM", hc as u64);
    sink.close();

    let mut blocks = Vec::new();
    loop {
        let word_bytes = reader.read_bytes(4)?;
        let word = u32::from_le_bytes(word_bytes.try_into().unwrap());
        if word == 0 {
            break;
        }
        // High bit set means the block is stored uncompressed.
        let uncompressed = word & 0x8000_0000 != 0;
        let size = (word & 0x7FFF_FFFF) as usize;

        let mut block_sink = TraceSink::new(sink.is_verbose());
        block_sink.field_u64("BLOCK_SIZE", size as u64);
        block_sink.field_bool("BLOCK_UNCOMPRESSED", uncompressed);

        let body = reader.read_bytes(size)?;
        if sink.is_verbose() {
            block_sink.field_bytes("BLOCK_DATA", &body);
        }

        if block_checksum {
            let checksum_bytes = reader.read_bytes(4)?;
            let checksum = u32::from_le_bytes(checksum_bytes.try_into().unwrap());
            block_sink.field_u64("BLOCK_CHECKSUM", checksum as u64);
        }

        blocks.push(block_sink.finish());
    }
    sink.array("BLOCKS", blocks);

    if content_checksum {
        let bytes = reader.read_bytes(4)?;
        let checksum = u32::from_le_bytes(bytes.try_into().unwrap());
        sink.field_u64("CONTENT_CHECKSUM", checksum as u64);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_uncompressed_block_then_endmark() {
        let mut input = MAGIC.to_vec();
        input.push(0b0100_0000); // FLG: version=1, no optional fields
        input.push(0); // BD
        input.push(0); // header checksum (unvalidated)
        let body = b"hello world";
        let word = 0x8000_0000u32 | body.len() as u32;
        input.extend_from_slice(&word.to_le_bytes());
        input.extend_from_slice(body);
        input.extend_from_slice(&0u32.to_le_bytes()); // EndMark

        let mut sink = TraceSink::new(false);
        walk(&input, &mut sink).unwrap();
        let tree = sink.finish();
        let blocks = tree["BLOCKS"].as_array().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["BLOCK_UNCOMPRESSED"], true);
        assert_eq!(blocks[0]["BLOCK_SIZE"], body.len() as u64);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut sink = TraceSink::new(false);
        assert_eq!(
            walk(&[0, 0, 0, 0], &mut sink).unwrap_err(),
            DecodeError::EnvelopeHeaderInvalid
        );
    }
}
