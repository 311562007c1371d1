use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod loader;
mod target;

use clap::{CommandFactory, Parser};
use loader::LoadError;
use log::{error, info};
use rvemu_core::{Config, Core, Halt, MemoryError, RunError, StdHost};
use stderrlog::LogLevelNum;
use target::command::parse_address;
use target::{DebugSession, ExecutionMode};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// RV64 ELF executables to run, one after the other.
    files: Vec<PathBuf>,
    /// Log more (-v info, -vv debug, -vvv every executed instruction).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Don't log anything, not even errors.
    #[arg(short, long)]
    quiet: bool,
    /// Size of the guest address space in bytes.
    #[arg(long, value_parser = parse_number, default_value_t = Config::default().memory_size as u64)]
    memory_size: u64,
    /// Start in the interactive debugger, prompting before every instruction.
    #[arg(long)]
    step: bool,
    /// Stop in the interactive debugger when reaching this address.
    #[arg(long = "break", value_name = "ADDR", value_parser = parse_number)]
    breakpoints: Vec<u64>,
}

fn parse_number(s: &str) -> Result<u64, String> {
    parse_address(s).ok_or_else(|| format!("{s:?} is not a decimal or 0x-prefixed number"))
}

#[derive(Error, Debug)]
enum Error {
    #[error("unable to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to set up guest memory: {0}")]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Run(#[from] RunError),
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.files.is_empty() || args.files == [PathBuf::from("help")] {
        if let Err(err) = Args::command().print_help() {
            eprintln!("{err}");
        }
        return ExitCode::SUCCESS;
    }

    let verbosity = match args.verbose {
        0 => LogLevelNum::Warn,
        1 => LogLevelNum::Info,
        2 => LogLevelNum::Debug,
        _ => LogLevelNum::Trace,
    };
    if let Err(err) = stderrlog::new()
        .verbosity(verbosity)
        .quiet(args.quiet)
        .modules([module_path!(), "rvemu_core"])
        .init()
    {
        eprintln!("unable to initialize logging: {err}");
    }

    let Ok(memory_size) = usize::try_from(args.memory_size) else {
        error!("memory size {} doesn't fit in this host's address space", args.memory_size);
        return ExitCode::FAILURE;
    };
    let config = Config {
        memory_size,
        ..Config::default()
    };

    let mut exit_code = ExitCode::SUCCESS;
    for path in &args.files {
        match run(path, &config, &args) {
            Ok(Halt::Exited(code)) => {
                info!("{} exited with code {code}", path.display());
                exit_code = ExitCode::from(code as u8);
            }
            Ok(Halt::Quit) => return ExitCode::SUCCESS,
            Err(err) => {
                error!("{}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }
    exit_code
}

/// Runs a single executable in a freshly created core.
fn run(path: &Path, config: &Config, args: &Args) -> Result<Halt, Error> {
    let image = fs::read(path).map_err(|source| Error::Read {
        path: path.to_owned(),
        source,
    })?;

    let mut core = Core::new(config.clone(), StdHost)?;
    loader::load(&mut core, &image)?;
    info!("running {}", path.display());

    if !args.step && args.breakpoints.is_empty() {
        return Ok(core.run(None)?);
    }

    let mode = if args.step {
        ExecutionMode::Step
    } else {
        ExecutionMode::Continue
    };
    // Not locked, the guest reads from stdin as well
    let mut session = DebugSession::new(BufReader::new(io::stdin()), io::stdout(), mode)
        .with_breakpoints(args.breakpoints.iter().copied());
    Ok(core.run(Some(&mut session))?)
}
