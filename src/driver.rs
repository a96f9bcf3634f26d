/*
 * Shared CLI driver logic: load a file, run the matching envelope's
 * sizing and decoding passes, serialize both traces to disk, optionally
 * write the reconstructed payload, and map the result onto the
 * documented process exit status.
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::envelope::{gzip, lz4, zlib, zstd};
use crate::error::DecodeError;
use crate::trace::TraceSink;
use crate::{deflate, DecodeResult};

#[derive(Copy, Clone, Debug)]
pub enum Envelope {
    Deflate,
    Zlib,
    Gzip,
    Lz4,
    Zstd,
}

pub struct ToolDriver {
    pub envelope: Envelope,
    pub write_output: bool,
    pub verbose: bool,
    pub skip_bytes: usize,
}

impl ToolDriver {
    /// Runs both passes against `path`, writes the trace files (and the
    /// reconstructed payload under `-w`), and returns the process exit
    /// status to use.
    pub fn run(&self, path: &Path) -> i32 {
        match self.run_inner(path) {
            Ok(()) => 0,
            Err(DriverError::Decode(e)) => {
                log::error!("{e}");
                e.exit_code()
            }
            Err(DriverError::Io(msg)) => {
                log::error!("{msg}");
                3
            }
        }
    }

    fn run_inner(&self, path: &Path) -> Result<(), DriverError> {
        let bytes = fs::read(path).map_err(|e| DriverError::Io(format!("{}: {e}", path.display())))?;
        let input = bytes.get(self.skip_bytes..).unwrap_or(&[]);

        let mut sizing_sink = TraceSink::new(self.verbose);
        let sizing_result = self.scan_size(input, &mut sizing_sink);
        self.write_trace(path, "_compressed.json", sizing_sink)?;
        let _sizing_len = sizing_result?;

        let mut decode_sink = TraceSink::new(self.verbose);
        let payload = self.decode(input, &mut decode_sink);
        self.write_trace(path, "_decompressed.json", decode_sink)?;

        let payload = payload?;
        if self.write_output {
            if let Some(payload) = &payload {
                let out_path = with_suffix(path, "_decompressed.bin");
                fs::write(&out_path, payload)
                    .map_err(|e| DriverError::Io(format!("{}: {e}", out_path.display())))?;
            }
        }

        Ok(())
    }

    fn scan_size(&self, input: &[u8], sink: &mut TraceSink) -> DecodeResult<usize> {
        match self.envelope {
            Envelope::Deflate => deflate::scan_size(input, sink),
            Envelope::Zlib => zlib::scan_size(input, sink),
            Envelope::Gzip => gzip::scan_size(input, sink),
            Envelope::Lz4 => lz4::walk(input, sink).map(|()| 0),
            Envelope::Zstd => zstd::walk(input, sink).map(|()| 0),
        }
    }

    fn decode(&self, input: &[u8], sink: &mut TraceSink) -> DecodeResult<Option<Vec<u8>>> {
        match self.envelope {
            Envelope::Deflate => deflate::decode(input, sink).map(Some),
            Envelope::Zlib => zlib::decode(input, sink).map(Some),
            Envelope::Gzip => gzip::decode(input, sink).map(Some),
            Envelope::Lz4 => lz4::walk(input, sink).map(|()| None),
            Envelope::Zstd => zstd::walk(input, sink).map(|()| None),
        }
    }

    fn write_trace(&self, path: &Path, suffix: &str, sink: TraceSink) -> Result<(), DriverError> {
        let tree = sink.finish_partial();
        let text = TraceSink::to_pretty_string(&tree);
        let out_path = with_suffix(path, suffix);
        fs::write(&out_path, text).map_err(|e| DriverError::Io(format!("{}: {e}", out_path.display())))
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut stem = path.to_path_buf();
    let file_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.set_file_name(format!("{file_name}{suffix}"));
    stem
}

enum DriverError {
    Decode(DecodeError),
    Io(String),
}

impl From<DecodeError> for DriverError {
    fn from(e: DecodeError) -> Self {
        DriverError::Decode(e)
    }
}
