//! Emulation of the handful of Linux system calls a statically linked user program needs.
//!
//! The call number is taken from `a7`, the arguments from `a0` to `a2` and the result is
//! returned in `a0`, following the Linux RISC-V calling convention. Failures are reported the
//! way the kernel does it: as a negated `errno` value in `a0`.

use crate::memory::Memory;
use crate::registers::{Registers, Specifier};
use log::{debug, warn};
use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::time::{Duration, SystemTime};

pub mod number {
    pub const CLOSE: u64 = 57;
    pub const READ: u64 = 63;
    pub const WRITE: u64 = 64;
    pub const FSTAT: u64 = 80;
    pub const EXIT: u64 = 93;
    pub const EXIT_GROUP: u64 = 94;
    pub const GETTIMEOFDAY: u64 = 169;
    pub const BRK: u64 = 214;
}

pub mod errno {
    pub const EIO: i64 = 5;
    pub const EBADF: i64 = 9;
    pub const EFAULT: i64 = 14;
    pub const ENOSYS: i64 = 38;
}

/// Size of `struct stat` on 64-bit RISC-V Linux.
const STAT_SIZE: usize = 128;
const STAT_MODE_OFFSET: u64 = 16;
/// A character device, readable and writable by its owner and writable by its group, which is
/// what a terminal looks like.
const S_IFCHR_TERMINAL: u32 = 0o020000 | 0o620;

/// The host side of guest I/O.
///
/// File descriptors are the guest's, so an implementation decides what `0`, `1` and `2` (and any
/// other descriptor) map to.
pub trait Host: Debug {
    fn read(&mut self, fd: u64, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, fd: u64, buf: &[u8]) -> io::Result<usize>;

    /// Wall-clock time as a duration since the Unix epoch.
    fn now(&self) -> Duration;
}

/// [`Host`] connecting the guest's standard streams to those of this process.
#[derive(Debug, Default)]
pub struct StdHost;

impl Host for StdHost {
    fn read(&mut self, fd: u64, buf: &mut [u8]) -> io::Result<usize> {
        match fd {
            0 => io::stdin().lock().read(buf),
            _ => Err(bad_fd()),
        }
    }

    fn write(&mut self, fd: u64, buf: &[u8]) -> io::Result<usize> {
        // Flushing right away keeps guest output interleaved with the debugger's
        match fd {
            1 => {
                let mut stdout = io::stdout().lock();
                let written = stdout.write(buf)?;
                stdout.flush()?;
                Ok(written)
            }
            2 => io::stderr().lock().write(buf),
            _ => Err(bad_fd()),
        }
    }

    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
    }
}

fn bad_fd() -> io::Error {
    io::Error::from_raw_os_error(errno::EBADF as i32)
}

/// What the driver loop has to do after a system call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SyscallOutcome {
    Continue,
    /// The guest asked to terminate with this exit code.
    Exit(i32),
}

/// Services the system call requested by the registers.
///
/// Nothing here is fatal: bad guest pointers and host failures are returned to the guest as
/// error numbers, and unknown calls only produce a warning.
pub fn dispatch<H: Host>(
    registers: &mut Registers,
    memory: &mut Memory,
    host: &mut H,
) -> SyscallOutcome {
    let call = registers.x(Specifier::A7);
    let args = [
        registers.x(Specifier::A0),
        registers.x(Specifier::A1),
        registers.x(Specifier::A2),
    ];
    debug!("syscall {call} with arguments {args:#x?}");

    let result = match call {
        number::EXIT | number::EXIT_GROUP => {
            return SyscallOutcome::Exit(args[0] as i32);
        }
        number::CLOSE => close(args[0]),
        number::READ => read(memory, host, args[0], args[1], args[2]),
        number::WRITE => write(memory, host, args[0], args[1], args[2]),
        number::FSTAT => fstat(memory, args[0], args[1]),
        number::GETTIMEOFDAY => gettimeofday(memory, host, args[0]),
        number::BRK => brk(memory, args[0]),
        _ => {
            warn!(
                "unknown syscall {call} at pc {:#x}, returning -ENOSYS",
                registers.pc().wrapping_sub(crate::registers::INSTRUCTION_SIZE)
            );
            -errno::ENOSYS
        }
    };
    registers.set_x(Specifier::A0, result as u64);
    SyscallOutcome::Continue
}

fn is_standard_stream(fd: u64) -> bool {
    fd <= 2
}

fn close(fd: u64) -> i64 {
    // The standard streams are the only descriptors there are, and they stay open for the host
    if is_standard_stream(fd) {
        0
    } else {
        -errno::EBADF
    }
}

fn read<H: Host>(memory: &mut Memory, host: &mut H, fd: u64, buf: u64, count: u64) -> i64 {
    let Ok(buf) = memory.slice_mut(buf, count as usize) else {
        return -errno::EFAULT;
    };
    host.read(fd, buf).map_or_else(host_error, |n| n as i64)
}

fn write<H: Host>(memory: &Memory, host: &mut H, fd: u64, buf: u64, count: u64) -> i64 {
    let Ok(buf) = memory.slice(buf, count as usize) else {
        return -errno::EFAULT;
    };
    host.write(fd, buf).map_or_else(host_error, |n| n as i64)
}

fn host_error(err: io::Error) -> i64 {
    -err.raw_os_error().map_or(errno::EIO, i64::from)
}

fn fstat(memory: &mut Memory, fd: u64, stat: u64) -> i64 {
    if !is_standard_stream(fd) {
        return -errno::EBADF;
    }
    let result = memory
        .write(stat, &[0; STAT_SIZE])
        .and_then(|()| memory.write_word(stat + STAT_MODE_OFFSET, S_IFCHR_TERMINAL));
    match result {
        Ok(()) => 0,
        Err(_) => -errno::EFAULT,
    }
}

fn gettimeofday<H: Host>(memory: &mut Memory, host: &H, timeval: u64) -> i64 {
    if timeval == 0 {
        return 0;
    }
    let now = host.now();
    let result = memory
        .write_doubleword(timeval, now.as_secs())
        .and_then(|()| memory.write_doubleword(timeval + 8, now.subsec_micros() as u64));
    match result {
        Ok(()) => 0,
        Err(_) => -errno::EFAULT,
    }
}

fn brk(memory: &mut Memory, address: u64) -> i64 {
    let heap_break = if address == 0 {
        memory.heap_break()
    } else {
        memory.move_heap_break(address)
    };
    heap_break as i64
}
