//! Provides a user-mode RV64IMFD core implementation together with the loop driving it.

mod dispatch;
mod execute;
pub mod fcsr;
mod float;

use crate::debug::{Control, Debugger};
use crate::instruction::{decode, DecodedInstruction};
use crate::memory::{Memory, MemoryError};
use crate::registers::{Registers, Specifier};
use crate::syscall::{self, Host, SyscallOutcome};
use crate::Config;
use execute::Executor;
use log::{info, trace};
use std::time::Instant;
use thiserror::Error;

/// RISC-V core running a single user-mode process.
///
/// As we don't support hardware multithreading, every core always only has a single hart.
/// The core owns its register file, its guest memory and the [`Host`] servicing its system calls,
/// so nothing outside the driver loop can change the process state while it runs.
///
/// > From the perspective of software running in a given execution environment, a hart is a
/// > resource that autonomously fetches and executes RISC-V instructions within that execution
/// > environment.
///
/// A core is meant to run a single executable. Running another one requires a fresh core.
#[derive(Debug)]
pub struct Core<H: Host> {
    config: Config,
    registers: Registers,
    memory: Memory,
    host: H,
    /// Number of retired instructions.
    retired: u64,
    started: Instant,
    exit_code: Option<i32>,
}

impl<H: Host> Core<H> {
    /// Creates a core with zeroed memory, all registers zero except `sp`, and `pc` at `0`.
    pub fn new(config: Config, host: H) -> Result<Self, MemoryError> {
        let memory = Memory::new(&config)?;
        let mut registers = Registers::new(0);
        registers.set_x(Specifier::SP, config.initial_stack_pointer());
        Ok(Self {
            config,
            registers,
            memory,
            host,
            retired: 0,
            started: Instant::now(),
            exit_code: None,
        })
    }

    /// Provide a read-only view of this core's configuration.
    ///
    /// It is not possible to modify the configuration after creation.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Number of instructions retired so far.
    pub fn retired(&self) -> u64 {
        self.retired
    }

    /// Returns the guest's exit code once it has called `exit`.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Fetches, decodes and executes a single instruction, servicing a system call if it was an
    /// `ecall`.
    ///
    /// `pc` is advanced past the instruction before it executes, so jumps and branches overwrite
    /// it while every other instruction leaves it pointing at its successor.
    pub fn step(&mut self) -> Result<(), RunError> {
        let pc = self.registers.pc();
        let raw_instruction = self
            .fetch_instruction(pc)
            .map_err(|err| RunError::new(pc, err.into()))?;
        trace!("{pc:#010x}: {raw_instruction:#010x}");
        self.registers.advance_pc();

        let instruction = decode(raw_instruction);
        let retired = self
            .execute_instruction(pc, instruction)
            .map_err(|source| RunError::new(pc, source))?;
        self.retired += 1;

        if retired == Retired::EnvironmentCall {
            let outcome = syscall::dispatch(&mut self.registers, &mut self.memory, &mut self.host);
            if let SyscallOutcome::Exit(code) = outcome {
                self.exit_code = Some(code);
            }
        }
        Ok(())
    }

    /// Runs until the guest exits or the debugger quits.
    ///
    /// The debugger, if any, is consulted before every instruction is fetched. It sees the entry
    /// state and the state after every retired instruction except the final `exit` call.
    pub fn run(&mut self, mut debugger: Option<&mut dyn Debugger>) -> Result<Halt, RunError> {
        loop {
            if let Some(code) = self.exit_code {
                info!(
                    "guest exited with code {code} after {} instructions",
                    self.retired
                );
                return Ok(Halt::Exited(code));
            }
            if let Some(debugger) = debugger.as_deref_mut() {
                if debugger.inspect(&self.registers) == Control::Quit {
                    info!("debugger quit after {} instructions", self.retired);
                    return Ok(Halt::Quit);
                }
            }
            self.step()?;
        }
    }

    /// Execute a single, already decoded instruction located at `address`.
    ///
    /// This only takes care of the instruction-specific operations. Fetching, counting retired
    /// instructions and servicing system calls are done by [`step`](Self::step).
    fn execute_instruction(
        &mut self,
        address: u64,
        instruction: DecodedInstruction,
    ) -> ExecutionResult {
        let counters = Counters {
            cycle: self.retired,
            instret: self.retired,
            started: self.started,
        };
        Executor {
            registers: &mut self.registers,
            memory: &mut self.memory,
            instruction,
            address,
            counters,
        }
        .execute()
    }

    /// "Independent instruction fetch unit"
    ///
    /// > Instructions are stored in memory as a sequence of 16-bit little-endian parcels,
    /// > regardless of memory system endianness.
    fn fetch_instruction(&self, address: u64) -> Result<u32, MemoryError> {
        self.memory.read_word(address)
    }
}

/// Sources of the read-only counter CSRs at the time an instruction executes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Counters {
    pub cycle: u64,
    pub instret: u64,
    /// When the core was created. The `time` CSR counts microseconds since then, and is only
    /// computed when read.
    pub started: Instant,
}

impl Counters {
    pub fn time(&self) -> u64 {
        self.started.elapsed().as_micros() as u64
    }
}

/// How an instruction retired.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Retired {
    Normal,
    /// The instruction was an `ecall`, which the driver loop services as a system call.
    EnvironmentCall,
}

pub type ExecutionResult = Result<Retired, ExecutionError>;

/// Fatal conditions while executing an instruction. There are no guest trap handlers, so these
/// always end the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("undefined instruction {0}")]
    UndefinedInstruction(DecodedInstruction),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// A fatal [`ExecutionError`] together with the address of the instruction that caused it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("at pc {pc:#x}: {source}")]
pub struct RunError {
    pub pc: u64,
    pub source: ExecutionError,
}

impl RunError {
    fn new(pc: u64, source: ExecutionError) -> Self {
        Self { pc, source }
    }
}

/// Why [`Core::run`] stopped.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Halt {
    /// The guest called `exit` with this code.
    Exited(i32),
    /// The debugger asked to stop.
    Quit,
}
