//! Hook for inspecting a running guest between instructions.

use crate::registers::{Registers, Specifier};
use std::fmt;

/// Called by [`Core::run`](crate::Core::run) before every instruction is fetched, so it sees the
/// entry point as well as the state after each retired instruction.
///
/// A debugger only gets to look at the registers. Memory and registers are owned by the driver
/// loop for the whole run, so a debugger can't change the state the guest observes.
pub trait Debugger {
    fn inspect(&mut self, registers: &Registers) -> Control;
}

/// What the driver loop should do after consulting the [`Debugger`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Control {
    Continue,
    /// Stop running the guest. [`Core::run`](crate::Core::run) returns
    /// [`Halt::Quit`](crate::Halt::Quit).
    Quit,
}

/// Human-readable dump of a register file, as shown by interactive debuggers.
///
/// Lists every integer and floating-point register with its ABI name, followed by `pc` and
/// `fcsr`. Single-precision values in floating-point registers are only recognizable by their
/// NaN-boxing, so floating-point registers are shown as raw bits.
pub struct RegisterDump<'a>(pub &'a Registers);

impl fmt::Display for RegisterDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registers = self.0;
        writeln!(f, "reg   name  value")?;
        for specifier in Specifier::iter_all() {
            writeln!(
                f,
                "{:<5} {:<5} {:#018x}",
                specifier.to_string(),
                specifier.abi_name(),
                registers.x(specifier)
            )?;
        }
        for specifier in Specifier::iter_all() {
            writeln!(
                f,
                "{:<5} {:<5} {:#018x}",
                format!("f{}", u8::from(specifier)),
                specifier.fp_abi_name(),
                registers.f(specifier)
            )?;
        }
        writeln!(f, "pc          {:#018x}", registers.pc())?;
        write!(
            f,
            "fcsr        {:#010x} (frm {}, fflags {:#07b})",
            registers.fcsr().read(),
            registers.fcsr().frm(),
            registers.fcsr().fflags()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_dump() {
        let mut registers = Registers::new(0x1_0078);
        registers.set_x(Specifier::SP, 0x0600_0000);
        registers.set_f(Specifier::A0, 0xFFFF_FFFF_3F80_0000);
        registers.fcsr_mut().write(0b010_00001);

        let dump = RegisterDump(&registers).to_string();
        let lines: Vec<&str> = dump.lines().collect();
        // header, 32 integer, 32 floating-point, pc and fcsr
        assert_eq!(1 + 32 + 32 + 2, lines.len());
        assert_eq!("x0    zero  0x0000000000000000", lines[1]);
        assert_eq!("x2    sp    0x0000000006000000", lines[3]);
        assert_eq!("f10   fa0   0xffffffff3f800000", lines[33 + 10]);
        assert_eq!("pc          0x0000000000010078", lines[65]);
        assert_eq!("fcsr        0x00000041 (frm 2, fflags 0b00001)", lines[66]);
    }
}
