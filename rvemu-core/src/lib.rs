#[macro_use]
extern crate static_assertions;

pub mod core;
pub mod debug;
pub mod instruction;
pub mod memory;
pub mod registers;
pub mod syscall;

pub use crate::core::{Core, ExecutionError, Halt, RunError};
pub use memory::{Memory, MemoryError};
pub use syscall::{Host, StdHost};

/// Layout of the emulated process, shared by every executable run with it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    /// Size of the guest address space in bytes.
    pub memory_size: usize,
    /// Initial value of the stack pointer. The stack grows down from here.
    pub stack_top: u64,
    /// Number of bytes below `stack_top` reserved for the stack, which the heap may not grow into.
    pub stack_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memory_size: 128 * unit::MIB,
            stack_top: 0x0600_0000,
            stack_size: 8 * unit::MIB as u64,
        }
    }
}

impl Config {
    /// The stack pointer a fresh process starts with: `stack_top`, kept inside the address space
    /// and 16-byte aligned as the calling convention requires.
    pub fn initial_stack_pointer(&self) -> u64 {
        self.stack_top.min(self.memory_size as u64) & !0xF
    }
}

pub mod unit {
    //! Sizes of the guest address space, in bytes.

    pub const MIB: usize = 1 << 20;
}
