use std::path::PathBuf;

use clap::Parser;
use miette::Result;
use protoschema::{DescriptorPool, StderrSink, DEFAULT_MAX_NESTING_DEPTH};

/// Parses protobuf schema files and prints the merged package trees.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Names of the files to parse, relative to an include directory. Their imports are parsed too.
    #[arg(value_name = "PROTO_FILES", required_unless_present = "all")]
    files: Vec<String>,
    /// Directories to search for files. Earlier directories take precedence.
    #[arg(
        short = 'I',
        long = "include",
        visible_alias = "proto_path",
        value_name = "PATH",
        default_value = "."
    )]
    includes: Vec<PathBuf>,
    /// Parse every file found in the include directories.
    #[arg(long)]
    all: bool,
    /// Keep parsing the remaining files after one fails.
    #[arg(long)]
    keep_going: bool,
    /// The maximum depth to which messages may be nested.
    #[arg(long, value_name = "DEPTH", default_value_t = DEFAULT_MAX_NESTING_DEPTH)]
    max_depth: usize,
}

pub fn main() -> Result<()> {
    miette::set_panic_hook();

    let args = Args::parse();

    let mut pool = DescriptorPool::new();
    pool.stop_on_error(!args.keep_going)
        .max_nesting_depth(args.max_depth);

    let mut discovered = Vec::new();
    for include in &args.includes {
        discovered.extend(pool.add_directory(include)?);
    }

    if args.all {
        for name in discovered {
            pool.enqueue(name);
        }
    }
    for name in args.files {
        pool.enqueue(name);
    }

    pool.run(&mut StderrSink)?;

    for package in pool.packages() {
        print!("{}", package);
    }
    Ok(())
}
