//! Integer and floating point register file of a single RV64 hart.

use crate::core::fcsr::Fcsr;
use log::trace;
use std::fmt;
use std::fmt::Formatter;

/// The type of a single `x` register.
pub type X = u64;

/// The type of a single `f` register. Holds the raw bit pattern, never a host float.
pub type F = u64;

/// The bit width of the `x` registers.
pub const XLEN: u32 = X::BITS;

/// The number of `x` (and `f`) registers available (indices start at `0`).
pub const LEN: u8 = 32;

/// Size in bytes of every instruction the fetch unit handles.
pub const INSTRUCTION_SIZE: u64 = 4;

/// ABI mnemonics of the `x` registers, indexed by register number.
pub const ABI_NAMES: [&str; LEN as usize] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0/fp", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// ABI mnemonics of the `f` registers, indexed by register number.
pub const FP_ABI_NAMES: [&str; LEN as usize] = [
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

/// A RISC-V hart's unprivileged register state.
///
/// There are 32 `x` registers of 64 bits, named `x0` up to `x31`.
/// The register `x0` (aka `zero`) is always zero. Writes to it are ignored.
/// Next to those there are 32 `f` registers, each holding a raw 64-bit pattern that the executing
/// instruction reinterprets as a binary32 (low half) or binary64 value, the `pc` register and the
/// floating point control and status register `fcsr`.
///
/// > For RV64I, the 32 x registers are each 64 bits wide, i.e., XLEN=64. Register x0 is hardwired
/// > with all bits equal to 0.
///
/// It is not possible to get a mutable reference to an `x` register, since that would allow
/// unchecked writes to register `x0`.
#[derive(Debug, Clone)]
pub struct Registers {
    x_registers: [X; LEN as usize],
    f_registers: [F; LEN as usize],
    pc: u64,
    fcsr: Fcsr,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Registers {
    /// Returns a fresh set of all-zero registers, with `pc` set to `initial_pc`.
    pub fn new(initial_pc: u64) -> Self {
        Self {
            x_registers: [0; LEN as usize],
            f_registers: [0; LEN as usize],
            pc: initial_pc,
            fcsr: Fcsr::new(),
        }
    }

    /// Returns the value of an `x` register.
    pub fn x(&self, specifier: Specifier) -> u64 {
        self.x_registers[usize::from(specifier)]
    }

    /// Sets the value of an `x` register.
    ///
    /// Writes to register `x0` are ignored.
    pub fn set_x(&mut self, specifier: Specifier, value: u64) {
        self.replace_x(specifier, value);
    }

    /// Replaces the value of an `x` register, returning its old value.
    ///
    /// Writes to register `x0` are ignored.
    pub fn replace_x(&mut self, specifier: Specifier, value: u64) -> u64 {
        if specifier == Specifier::X0 {
            if value != 0 {
                trace!("ignoring write of {value:#x} to x0");
            }
            0
        } else {
            std::mem::replace(&mut self.x_registers[usize::from(specifier)], value)
        }
    }

    /// Returns the raw bits of an `f` register.
    pub fn f(&self, specifier: Specifier) -> u64 {
        self.f_registers[usize::from(specifier)]
    }

    /// Sets the raw bits of an `f` register.
    pub fn set_f(&mut self, specifier: Specifier, value: u64) {
        self.f_registers[usize::from(specifier)] = value;
    }

    /// Returns the value of the `pc` register.
    pub fn pc(&self) -> u64 {
        self.pc
    }

    /// Returns a mutable reference to the `pc` register value.
    pub fn pc_mut(&mut self) -> &mut u64 {
        &mut self.pc
    }

    /// Moves `pc` past the instruction it currently points at.
    pub fn advance_pc(&mut self) {
        self.pc = self.pc.wrapping_add(INSTRUCTION_SIZE);
    }

    pub fn fcsr(&self) -> &Fcsr {
        &self.fcsr
    }

    pub fn fcsr_mut(&mut self) -> &mut Fcsr {
        &mut self.fcsr
    }
}

/// A register specifier. Can take values in the range `0..LEN`.
///
/// Used for both the `x` and the `f` register banks; the instruction decides which bank it names.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Specifier(u8);

impl Specifier {
    /// Register `x0`, a.k.a. register `zero`, always returns `0` on read, and ignores any writes.
    pub const X0: Self = Specifier(0);

    /// Return address register `x1` (`ra`).
    pub const RA: Self = Specifier(1);

    /// Stack pointer register `x2` (`sp`).
    pub const SP: Self = Specifier(2);

    /// First argument / return value register `x10` (`a0`).
    pub const A0: Self = Specifier(10);

    pub const A1: Self = Specifier(11);

    pub const A2: Self = Specifier(12);

    /// Register `x17` (`a7`), which carries the system call number.
    pub const A7: Self = Specifier(17);

    /// Create a register specifier from its index, returning `None` if `index > 31`.
    pub fn new<U: TryInto<u8>>(index: U) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < LEN).then_some(Self(index))
    }

    /// Convert a 5-bit value into a register specifier.
    /// Panics if the value doesn't fit in 5 bits (`0..=31`).
    pub fn from_u5(value_u5: u8) -> Self {
        const_assert_eq!(LEN, 32);
        if value_u5 > 31 {
            panic!("out of range u5 used");
        }
        Self(value_u5)
    }

    /// Return an iterator over all register specifier, starting at x0 up to x31.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..LEN).map(Self)
    }

    /// The ABI mnemonic of this specifier when used as an `x` register.
    pub fn abi_name(self) -> &'static str {
        ABI_NAMES[self.0 as usize]
    }

    /// The ABI mnemonic of this specifier when used as an `f` register.
    pub fn fp_abi_name(self) -> &'static str {
        FP_ABI_NAMES[self.0 as usize]
    }
}

impl From<Specifier> for u8 {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl From<Specifier> for u32 {
    fn from(value: Specifier) -> Self {
        value.0 as u32
    }
}

impl From<Specifier> for usize {
    fn from(value: Specifier) -> Self {
        value.0 as usize
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(64, XLEN);
        const_assert!(LEN > 1);
        assert_eq!("a7", Specifier::A7.abi_name());
        assert_eq!("fa0", Specifier::A0.fp_abi_name());
    }

    #[test]
    fn test_write_to_zero() {
        let mut registers = Registers::default();
        assert_eq!(0, registers.x(Specifier::X0));
        assert_eq!(0, registers.pc());
        registers.set_x(Specifier::X0, 0xDEAD_BEEF_DEAD_BEEF);
        assert_eq!(0, registers.x(Specifier::X0));
        registers.set_x(Specifier::X0, u64::MAX);
        registers.set_x(Specifier::from_u5(1), 5);
        assert_eq!(0, registers.x(Specifier::X0));
        assert_eq!(0, registers.pc());
    }

    #[test]
    fn test_write_to_pc() {
        let mut registers = Registers::new(0x1000);
        assert_eq!(0x1000, registers.pc());
        *registers.pc_mut() = 0xDEAD_BEEF;
        assert_eq!(0xDEAD_BEEF, registers.pc());
        registers.advance_pc();
        assert_eq!(0xDEAD_BEF3, registers.pc());
        assert_eq!(0, registers.x(Specifier::X0));
    }

    #[test]
    fn test_set_x() {
        let mut registers = Registers::default();
        registers.set_x(Specifier::X0, 1);
        for i in 1..LEN {
            registers.set_x(Specifier::from_u5(i), i as u64 + 1);
        }
        assert_eq!(0, registers.x(Specifier::X0));
        for i in 1..LEN {
            assert_eq!(i as u64 + 1, registers.x(Specifier::from_u5(i)));
        }
    }

    #[test]
    fn test_replace_x() {
        let mut registers = Registers::default();
        assert_eq!(0, registers.replace_x(Specifier::X0, 0));
        for i in 1..LEN {
            assert_eq!(0, registers.replace_x(Specifier::from_u5(i), i as u64));
        }
        assert_eq!(0, registers.replace_x(Specifier::X0, 1));
        for i in 1..LEN {
            assert_eq!(
                i as u64,
                registers.replace_x(Specifier::from_u5(i), i as u64 + 1)
            );
        }
        assert_eq!(0, registers.x(Specifier::X0));
    }

    #[test]
    fn test_f_registers_hold_raw_bits() {
        let mut registers = Registers::default();
        // f0 is a regular register, unlike x0
        registers.set_f(Specifier::from_u5(0), 0xFFFF_FFFF_3F80_0000);
        assert_eq!(0xFFFF_FFFF_3F80_0000, registers.f(Specifier::from_u5(0)));
        assert_eq!(0, registers.x(Specifier::X0));
    }

    #[test]
    fn test_specifier_new() {
        assert_eq!(Some(Specifier::A0), Specifier::new(10));
        assert_eq!(None, Specifier::new(32));
        assert_eq!(None, Specifier::new(-1));
        assert_eq!(32, Specifier::iter_all().count());
    }
}
