use std::path::PathBuf;
use std::process::exit;

use deflate_dump_rs::driver::{Envelope, ToolDriver};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "zstd_dump", about = "Structural trace dumper for Zstandard frames")]
struct Params {
    /// Write the reconstructed payload to <file>_decompressed.bin. Has
    /// no effect for Zstandard, whose block bodies are walked but not
    /// entropy-decoded.
    #[structopt(short = "w")]
    write_output: bool,
    /// Include raw-byte dumps of each block in the trace.
    #[structopt(short = "v")]
    verbose: bool,
    file: PathBuf,
}

fn main() {
    let params = Params::from_args();
    let level = if params.verbose { log::Level::Debug } else { log::Level::Warn };
    simple_logger::init_with_level(level).ok();

    let driver = ToolDriver {
        envelope: Envelope::Zstd,
        write_output: params.write_output,
        verbose: params.verbose,
        skip_bytes: 0,
    };
    exit(driver.run(&params.file));
}
