use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use log::warn;
use rvemu_core::debug::{Control, Debugger, RegisterDump};
use rvemu_core::registers::Registers;

pub mod command;

use command::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Prompt after every instruction.
    Step,
    /// Prompt when `pc` reaches a breakpoint.
    Continue,
    /// Never prompt again.
    RunToCompletion,
}

/// Interactive debugger reading commands from `input` and answering on `output`.
#[derive(Debug)]
pub struct DebugSession<R, W> {
    pub breakpoints: HashSet<u64>,
    pub execution_mode: ExecutionMode,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> DebugSession<R, W> {
    pub fn new(input: R, output: W, execution_mode: ExecutionMode) -> Self {
        Self {
            breakpoints: HashSet::new(),
            execution_mode,
            input,
            output,
        }
    }

    pub fn with_breakpoints(mut self, breakpoints: impl IntoIterator<Item = u64>) -> Self {
        self.breakpoints.extend(breakpoints);
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn should_prompt(&self, pc: u64) -> bool {
        match self.execution_mode {
            ExecutionMode::Step => true,
            ExecutionMode::Continue => self.breakpoints.contains(&pc),
            ExecutionMode::RunToCompletion => false,
        }
    }

    /// Reads and handles commands until one of them resumes the guest.
    fn prompt(&mut self, registers: &Registers) -> io::Result<Control> {
        let mut line = String::new();
        loop {
            write!(self.output, "{:#010x}> ", registers.pc())?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                // Nobody left to ask
                writeln!(self.output)?;
                self.execution_mode = ExecutionMode::RunToCompletion;
                return Ok(Control::Continue);
            }
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    writeln!(self.output, "{err}")?;
                    continue;
                }
            };
            match command {
                Command::Help => writeln!(self.output, "{}", Command::HELP)?,
                Command::Registers => writeln!(self.output, "{}", RegisterDump(registers))?,
                Command::AddBreakpoint(address) => {
                    self.breakpoints.insert(address);
                }
                Command::RemoveBreakpoint(address) => {
                    if !self.breakpoints.remove(&address) {
                        writeln!(self.output, "no breakpoint at {address:#x}")?;
                    }
                }
                Command::Step => {
                    self.execution_mode = ExecutionMode::Step;
                    return Ok(Control::Continue);
                }
                Command::Continue => {
                    self.execution_mode = ExecutionMode::Continue;
                    return Ok(Control::Continue);
                }
                Command::RunToCompletion => {
                    self.execution_mode = ExecutionMode::RunToCompletion;
                    return Ok(Control::Continue);
                }
                Command::Exit => return Ok(Control::Quit),
            }
        }
    }
}

impl<R: BufRead, W: Write> Debugger for DebugSession<R, W> {
    fn inspect(&mut self, registers: &Registers) -> Control {
        if !self.should_prompt(registers.pc()) {
            return Control::Continue;
        }
        self.prompt(registers).unwrap_or_else(|err| {
            warn!("debugger I/O failed ({err}), running to completion");
            self.execution_mode = ExecutionMode::RunToCompletion;
            Control::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn session(input: &str, mode: ExecutionMode) -> DebugSession<Cursor<Vec<u8>>, Vec<u8>> {
        DebugSession::new(Cursor::new(input.as_bytes().to_vec()), Vec::new(), mode)
    }

    fn output(session: DebugSession<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(session.into_output()).unwrap()
    }

    #[test]
    fn test_step_prompts_every_instruction() {
        let mut session = session("n\nn\n", ExecutionMode::Step);
        assert_eq!(Control::Continue, session.inspect(&Registers::new(0x100)));
        assert_eq!(Control::Continue, session.inspect(&Registers::new(0x104)));
        assert_eq!(ExecutionMode::Step, session.execution_mode);
        assert_eq!("0x00000100> 0x00000104> ", output(session));
    }

    #[test]
    fn test_continue_stops_at_breakpoints() {
        let mut session = session("r\n", ExecutionMode::Continue).with_breakpoints([0x108]);
        assert_eq!(Control::Continue, session.inspect(&Registers::new(0x104)));
        assert_eq!(Control::Continue, session.inspect(&Registers::new(0x108)));
        assert_eq!(ExecutionMode::Continue, session.execution_mode);
        assert_eq!("0x00000108> ", output(session));
    }

    #[test]
    fn test_run_to_completion_ignores_breakpoints() {
        let mut session = session("rtn\n", ExecutionMode::Step).with_breakpoints([0x108]);
        session.inspect(&Registers::new(0x104));
        assert_eq!(ExecutionMode::RunToCompletion, session.execution_mode);
        assert_eq!(Control::Continue, session.inspect(&Registers::new(0x108)));
        assert_eq!("0x00000104> ", output(session));
    }

    #[test]
    fn test_exit_quits() {
        let mut session = session("bogus\nq\n", ExecutionMode::Step);
        assert_eq!(Control::Quit, session.inspect(&Registers::new(0x100)));
        let output = output(session);
        assert!(output.contains("invalid command \"bogus\""), "{output}");
    }

    #[test]
    fn test_registers_and_breakpoint_commands() {
        let mut session = session("reg\nb 0x200\nd 0x300\nn\n", ExecutionMode::Step);
        session.inspect(&Registers::new(0x100));
        assert!(session.breakpoints.contains(&0x200));
        let output = output(session);
        assert!(output.contains("x10   a0    0x0000000000000000"), "{output}");
        assert!(output.contains("pc          0x0000000000000100"), "{output}");
        assert!(output.contains("no breakpoint at 0x300"), "{output}");
    }

    #[test]
    fn test_end_of_input_runs_to_completion() {
        let mut session = session("", ExecutionMode::Step);
        assert_eq!(Control::Continue, session.inspect(&Registers::new(0x100)));
        assert_eq!(ExecutionMode::RunToCompletion, session.execution_mode);
    }
}
