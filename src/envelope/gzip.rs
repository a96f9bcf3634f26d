/*
 * gzip envelope (RFC 1952): fixed magic, a flags-driven variable header,
 * a DEFLATE payload, an 8-byte trailer (CRC-32 then ISIZE).
 */

use crate::bitreader::BitReader;
use crate::checksum::Crc32;
use crate::deflate;
use crate::error::{DecodeError, DecodeResult};
use crate::trace::TraceSink;

const MAGIC: [u8; 2] = [0x1F, 0x8B];

pub fn decode(input: &[u8], sink: &mut TraceSink) -> DecodeResult<Vec<u8>> {
    let mut reader = BitReader::new(input);
    decode_from_reader(&mut reader, sink)
}

/// Sizing pass: parses the header the same way as [`decode`] but only
/// reports the decompressed length.
pub fn scan_size(input: &[u8], sink: &mut TraceSink) -> DecodeResult<usize> {
    let mut reader = BitReader::new(input);
    read_header(&mut reader, sink)?;
    deflate::scan_size_from_reader(&mut reader, sink)
}

/// Parses and validates the gzip header (magic, CM/FLG, MTIME/XFL/OS, and
/// any FEXTRA/FNAME/FCOMMENT/FHCRC fields FLG selects), writing the full
/// `GZIP_HEADER` trace record. Shared by the sizing and decoding passes
/// so both emit the same header structure.
fn read_header(reader: &mut BitReader, sink: &mut TraceSink) -> DecodeResult<()> {
    let magic = reader.read_bytes(2)?;
    if magic != MAGIC {
        sink.field_str("description", "bad gzip magic");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }

    let cm = reader.read_bytes(1)?[0];
    let flg = reader.read_bytes(1)?[0];
    let mtime_bytes = reader.read_bytes(4)?;
    let xfl = reader.read_bytes(1)?[0];
    let os = reader.read_bytes(1)?[0];

    if cm != 8 {
        sink.field_str("description", "unsupported compression method (CM != 8)");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }
    if flg & 0xE0 != 0 {
        sink.field_str("description", "reserved FLG bits set");
        return Err(DecodeError::EnvelopeHeaderInvalid);
    }

    let ftext = flg & 0x01 != 0;
    let fhcrc = flg & 0x02 != 0;
    let fextra = flg & 0x04 != 0;
    let fname = flg & 0x08 != 0;
    let fcomment = flg & 0x10 != 0;
    let mtime = u32::from_le_bytes([mtime_bytes[0], mtime_bytes[1], mtime_bytes[2], mtime_bytes[3]]);

    sink.open("GZIP_HEADER");
    sink.field_u64("ID1", MAGIC[0] as u64);
    sink.field_u64("ID2", MAGIC[1] as u64);
    sink.field_u64("CM", cm as u64);
    sink.field_u64("FLG", flg as u64);
    sink.field_bool("FTEXT", ftext);
    sink.field_bool("FHCRC", fhcrc);
    sink.field_bool("FEXTRA", fextra);
    sink.field_bool("FNAME", fname);
    sink.field_bool("FCOMMENT", fcomment);
    sink.field_u64("MTIME", mtime as u64);
    sink.field_u64("XFL", xfl as u64);
    sink.field_u64("OS", os as u64);
    sink.field_str("OS_NAME", os_name(os));

    if fextra {
        let xlen_bytes = reader.read_bytes(2)?;
        let xlen = u16::from_le_bytes([xlen_bytes[0], xlen_bytes[1]]);
        let extra = reader.read_bytes(xlen as usize)?;
        sink.field_u64("XLEN", xlen as u64);
        if sink.is_verbose() {
            sink.field_bytes("EXTRA", &extra);
        }
    }
    if fname {
        let name = read_nul_terminated(reader)?;
        sink.field_str("FNAME_VALUE", String::from_utf8_lossy(&name).into_owned());
    }
    if fcomment {
        let comment = read_nul_terminated(reader)?;
        sink.field_str("FCOMMENT_VALUE", String::from_utf8_lossy(&comment).into_owned());
    }
    if fhcrc {
        let crc16 = reader.read_bytes(2)?;
        sink.field_bytes("HCRC", &crc16);
    }
    sink.close();
    Ok(())
}

pub fn decode_from_reader(reader: &mut BitReader, sink: &mut TraceSink) -> DecodeResult<Vec<u8>> {
    read_header(reader, sink)?;
    let payload = deflate::decode_from_reader(reader, sink)?;

    reader.align_to_byte();
    let trailer = reader.read_bytes(8)?;
    let embedded_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let embedded_isize = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

    let mut crc = Crc32::new();
    crc.write(&payload);
    let computed_crc = crc.finish();
    let computed_isize = (payload.len() as u64 % (1u64 << 32)) as u32;

    sink.open("GZIP_TRAILER");
    sink.field_u64("CRC32_EMBEDDED", embedded_crc as u64);
    sink.field_u64("CRC32_COMPUTED", computed_crc as u64);
    sink.field_bool("CRC32_MATCH", embedded_crc == computed_crc);
    sink.field_u64("ISIZE_EMBEDDED", embedded_isize as u64);
    sink.field_u64("ISIZE_COMPUTED", computed_isize as u64);
    sink.field_bool("ISIZE_MATCH", embedded_isize == computed_isize);
    sink.close();

    Ok(payload)
}

/// Reads bytes up to and including the next NUL, returning everything
/// before it. Always advances the reader by the field's length plus one.
fn read_nul_terminated(reader: &mut BitReader) -> DecodeResult<Vec<u8>> {
    let mut buf = Vec::new();
    loop {
        let b = reader.read_bytes(1)?[0];
        if b == 0 {
            break;
        }
        buf.push(b);
    }
    Ok(buf)
}

fn os_name(b: u8) -> &'static str {
    match b {
        0 => "FAT",
        1 => "Amiga",
        2 => "VMS",
        3 => "Unix",
        4 => "VM/CMS",
        5 => "Atari TOS",
        6 => "HPFS",
        7 => "Macintosh",
        8 => "Z-System",
        9 => "CP/M",
        10 => "TOPS-20",
        11 => "NTFS",
        12 => "QDOS",
        13 => "Acorn RISCOS",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gzip_of_0_to_255() -> Vec<u8> {
        // Header (no optional fields) + a single stored DEFLATE block
        // containing the 256 bytes 0x00..=0xFF + CRC-32/ISIZE trailer.
        let mut out = vec![0x1F, 0x8B, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xFF];
        let payload: Vec<u8> = (0u8..=255).collect();
        out.push(0x01); // BFINAL=1, BTYPE=0 (stored), rest of byte padding
        let len = payload.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(&payload);

        let mut crc = Crc32::new();
        crc.write(&payload);
        out.extend_from_slice(&crc.finish().to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out
    }

    #[test]
    fn sizing_pass_emits_header_record() {
        let input = gzip_of_0_to_255();
        let mut sink = TraceSink::new(false);
        let size = scan_size(&input, &mut sink).unwrap();
        assert_eq!(size, 256);
        let tree = sink.finish_partial();
        assert_eq!(tree["GZIP_HEADER"]["CM"], 8);
        assert_eq!(tree["GZIP_HEADER"]["OS_NAME"], "unknown");
    }

    #[test]
    fn known_crc_and_isize_for_256_byte_sequence() {
        let input = gzip_of_0_to_255();
        let mut sink = TraceSink::new(false);
        let out = decode(&input, &mut sink).unwrap();
        assert_eq!(out, (0u8..=255).collect::<Vec<u8>>());
        let tree = sink.finish();
        assert_eq!(tree["GZIP_TRAILER"]["CRC32_EMBEDDED"], 0x2905_8C73);
        assert_eq!(tree["GZIP_TRAILER"]["ISIZE_EMBEDDED"], 0x100);
        assert_eq!(tree["GZIP_TRAILER"]["CRC32_MATCH"], true);
    }
}
