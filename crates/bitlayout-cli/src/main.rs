use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use bitlayout_cli::{
    catalog::Catalog,
    driver::{Driver, load_layout},
    errors::DriverError,
};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// bitlayout -- flatten type layouts and decode raw buffers
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Log progress at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump the layout of each `[scope, name]` request line as one JSON line
    Dump(DumpArgs),
    /// Decode a buffer with a dumped layout, one `path = value` line per field
    Gron(GronArgs),
}

#[derive(Args)]
struct DumpArgs {
    /// JSON type catalog used to resolve requests
    #[arg(long, value_name = "FILE")]
    types: PathBuf,

    /// Request lines (`-` for stdin)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    input: PathBuf,

    /// Output file (`-` for stdout)
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    output: PathBuf,

    /// Describe pointer and array roots themselves, not their targets
    #[arg(long)]
    no_deref: bool,
}

#[derive(Args)]
struct GronArgs {
    /// Layout array, layout record, or dump output
    #[arg(long, value_name = "FILE")]
    layout: PathBuf,

    /// Raw bytes to decode
    #[arg(long, value_name = "FILE")]
    data: PathBuf,

    /// Byte offset of the root within the data file
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdin().lock()))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if is_stdio(path) {
        Ok(Box::new(io::stdout().lock()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}

fn dump(args: DumpArgs) -> Result<(), DriverError> {
    let catalog = Catalog::from_path(&args.types)?;
    let driver = Driver::new(catalog, !args.no_deref);

    let input = open_input(&args.input)?;
    let output = open_output(&args.output)?;
    let summary = driver.run(input, output)?;

    tracing::info!(
        records = summary.records,
        failed = summary.failed,
        "dump finished"
    );
    Ok(())
}

fn gron(args: GronArgs) -> Result<(), DriverError> {
    let layout = load_layout(&std::fs::read_to_string(&args.layout)?)?;
    let data = std::fs::read(&args.data)?;
    let data = data.get(args.offset..).unwrap_or_default();

    if (data.len() as u64) * 8 < layout.bit_len() {
        tracing::warn!(
            have = data.len(),
            need = layout.bit_len().div_ceil(8),
            "buffer is shorter than the layout"
        );
    }

    let mut out = io::stdout().lock();
    out.write_all(layout.gron(data).as_bytes())?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Dump(args) => dump(args),
        Command::Gron(args) => gron(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bitlayout: {err}");
            ExitCode::FAILURE
        }
    }
}
