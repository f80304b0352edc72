use backup_projects::cli::{run, Args};
use backup_projects::logging;
use clap::Parser;
use std::process::exit;

fn main() {
    let args = Args::parse();
    if let Err(e) = logging::init(args.debug) {
        eprintln!("{e}");
    }

    exit(run(args));
}
