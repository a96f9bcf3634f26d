use std::path::PathBuf;
use std::process::exit;

use deflate_dump_rs::driver::{Envelope, ToolDriver};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
    name = "deflate_dump",
    about = "Structural trace dumper for raw DEFLATE streams"
)]
struct Params {
    /// Write the reconstructed payload to <file>_decompressed.bin.
    #[structopt(short = "w")]
    write_output: bool,
    /// Include raw-byte dumps and per-symbol tables in the trace.
    #[structopt(short = "v")]
    verbose: bool,
    /// Skip this many leading bytes of input before decoding, useful
    /// for stripping an unknown outer envelope.
    #[structopt(short = "s", long = "skip", default_value = "0")]
    skip: usize,
    file: PathBuf,
}

fn main() {
    let params = Params::from_args();
    init_logging(params.verbose);

    let driver = ToolDriver {
        envelope: Envelope::Deflate,
        write_output: params.write_output,
        verbose: params.verbose,
        skip_bytes: params.skip,
    };
    exit(driver.run(&params.file));
}

fn init_logging(verbose: bool) {
    let level = if verbose { log::Level::Debug } else { log::Level::Warn };
    simple_logger::init_with_level(level).ok();
}
