//! `meixml` converts between MEI and MusicXML; the direction follows the
//! file extensions (`.mei` → `.xml`, or `.xml`/`.musicxml`/`.mxl` → `.mei`).

use std::path::PathBuf;

use clap::Parser;
use meixml::{convert_file, read_file, score_to_json, ConvertOptions};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Source score (.mei, .xml, .musicxml or .mxl)
    input: PathBuf,

    /// Target score (.xml for MEI input, .mei for MusicXML input)
    output: PathBuf,

    /// Log every skipped element and suppressed definition
    #[clap(short = 'v', long, value_parser)]
    verbose: bool,

    /// Spaces per nesting level in the output; 0 writes one line
    #[clap(long, default_value_t = 2)]
    indent: usize,

    /// Print the intermediate score model as JSON to stdout
    #[clap(long, value_parser)]
    dump_score: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let options = ConvertOptions {
        indent: args.indent,
        ..ConvertOptions::default()
    };

    if args.dump_score {
        let score = read_file(&args.input, &options)?;
        println!("{}", score_to_json(&score)?);
    }

    let direction = convert_file(&args.input, &args.output, &options)?;
    log::info!("done ({direction:?})");
    Ok(())
}
