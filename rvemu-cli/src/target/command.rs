use std::str::FromStr;
use thiserror::Error;

/// A command typed at the debugger prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    // Execute the next instruction and prompt again
    Step,
    // Run until a breakpoint is hit
    Continue,
    // Run to the end, ignoring breakpoints
    RunToCompletion,
    Registers,
    AddBreakpoint(u64),
    RemoveBreakpoint(u64),
    // Stop the emulator
    Exit,
}

impl Command {
    pub const HELP: &'static str = "\
help         show this message
n            execute the next instruction
r            run to the next breakpoint
rtn          run until the program ends
reg          print all registers
b <addr>     set a breakpoint
d <addr>     delete a breakpoint
exit, q      stop the emulator";
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("invalid command {0:?}, enter 'help' for help")]
    Unknown(String),
    #[error("{0} expects an address")]
    MissingAddress(&'static str),
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().unwrap_or_default();
        let address = |name: &'static str, word: Option<&str>| -> Result<u64, Self::Err> {
            let word = word.ok_or(ParseCommandError::MissingAddress(name))?;
            parse_address(word).ok_or_else(|| ParseCommandError::InvalidAddress(word.to_owned()))
        };
        let command = match name {
            "help" | "h" => Command::Help,
            "n" => Command::Step,
            "r" => Command::Continue,
            "rtn" => Command::RunToCompletion,
            "reg" => Command::Registers,
            "b" => Command::AddBreakpoint(address("b", words.next())?),
            "d" => Command::RemoveBreakpoint(address("d", words.next())?),
            "exit" | "q" => Command::Exit,
            _ => return Err(ParseCommandError::Unknown(s.trim().to_owned())),
        };
        Ok(command)
    }
}

/// Parses an address written either in hexadecimal with a `0x` prefix or in decimal.
pub fn parse_address(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
