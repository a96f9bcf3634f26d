use std::path::PathBuf;
use std::process::exit;

use deflate_dump_rs::driver::{Envelope, ToolDriver};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "lz4_dump", about = "Structural trace dumper for LZ4 frames")]
struct Params {
    /// Write the reconstructed payload to <file>_decompressed.bin. Has
    /// no effect for LZ4, whose block bodies are walked but not
    /// decompressed.
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
        envelope: Envelope::Lz4,
        write_output: params.write_output,
        verbose: params.verbose,
        skip_bytes: 0,
    };
    exit(driver.run(&params.file));
}
