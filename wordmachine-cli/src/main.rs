//! A small batch front end around `wordmachine-core`: assembles or loads a program, seeds memory,
//! runs it to completion, and reports whatever the operator asked to see.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use thiserror::Error;
use wordmachine_core::cpu::{Computer, DEFAULT_MEMORY_SIZE};
use wordmachine_core::observer::CostMetricTracker;

/// Runs a wordmachine assembly program or raw machine-code image to completion.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to an assembly source file, or a raw machine-code image if `--raw` is set.
    program: PathBuf,

    /// Treat `program` as a raw big-endian machine-code image rather than assembly source.
    #[arg(long)]
    raw: bool,

    /// Override the machine's memory size in words (default 65536).
    #[arg(long, value_name = "WORDS")]
    memory_size: Option<usize>,

    /// Seed a memory address with a value before running, e.g. `--set 100=42`. Repeatable.
    #[arg(long = "set", value_name = "ADDRESS=VALUE", value_parser = parse_seed)]
    set: Vec<(u32, u32)>,

    /// Print a memory address's value after running. Repeatable.
    #[arg(long = "print-address", value_name = "ADDRESS")]
    print_addresses: Vec<u32>,

    /// Enable debug-level instruction tracing.
    #[arg(long)]
    debug: bool,

    /// Print a cost-metric summary after running.
    #[arg(long)]
    metrics: bool,
}

fn parse_seed(s: &str) -> Result<(u32, u32), String> {
    let (address, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDRESS=VALUE, got '{s}'"))?;
    let address: u32 = address
        .parse()
        .map_err(|_| format!("invalid address '{address}'"))?;
    let value: u32 = value
        .parse()
        .map_err(|_| format!("invalid value '{value}'"))?;
    Ok((address, value))
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Syntax(#[from] wordmachine_core::SyntaxError),
    #[error("{0}")]
    Config(#[from] wordmachine_core::ConfigError),
    #[error("{0}")]
    Fault(#[from] wordmachine_core::Fault),
    #[error("raw image size {len} is not a multiple of 4 bytes")]
    MisalignedImage { len: usize },
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let program = load_program(&args.program, args.raw)?;
    let memory_size = args.memory_size.unwrap_or(DEFAULT_MEMORY_SIZE);

    let tracker = CostMetricTracker::new();
    let mut computer = Computer::try_new_with_observer(memory_size, tracker)?;
    computer.set_memory_chunk(0, &program)?;

    for (address, value) in args.set {
        computer.set_memory_address(address, value)?;
    }

    info!("running {} word(s) of program, debug_mode = {}", program.len(), args.debug);
    computer.execute(args.debug)?;

    for address in args.print_addresses {
        let value = computer.get_memory_address(address)?;
        println!("{address}: {value} (0x{value:08x})");
    }

    if args.metrics {
        println!("{}", computer.observer().summary());
    }

    Ok(())
}

fn load_program(path: &PathBuf, raw: bool) -> Result<Vec<u32>, CliError> {
    let bytes_or_text = fs::read(path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;

    if raw {
        if bytes_or_text.len() % 4 != 0 {
            return Err(CliError::MisalignedImage {
                len: bytes_or_text.len(),
            });
        }
        Ok(bytes_or_text
            .chunks_exact(4)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    } else {
        let text = String::from_utf8_lossy(&bytes_or_text);
        Ok(wordmachine_core::assembler::assemble(&text)?)
    }
}
