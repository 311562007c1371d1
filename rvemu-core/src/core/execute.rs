use super::{Counters, ExecutionError, ExecutionResult, Retired};
use crate::instruction::DecodedInstruction;
use crate::memory::{Memory, MemoryError};
use crate::registers::{Registers, Specifier};
use log::trace;

/// Addresses of the CSRs the core implements.
pub(super) mod csr {
    pub const FFLAGS: u16 = 0x001;
    pub const FRM: u16 = 0x002;
    pub const FCSR: u16 = 0x003;
    pub const CYCLE: u16 = 0xC00;
    pub const TIME: u16 = 0xC01;
    pub const INSTRET: u16 = 0xC02;
}

/// Executes a single instruction against the register file and memory of a core.
///
/// When an instruction executes, `pc` already points at the next instruction. The address of
/// the executing instruction itself is `address`, which is what jump and branch targets are
/// relative to.
#[derive(Debug)]
pub(super) struct Executor<'a> {
    pub registers: &'a mut Registers,
    pub memory: &'a mut Memory,
    pub instruction: DecodedInstruction,
    pub address: u64,
    pub counters: Counters,
}

impl<'a> Executor<'a> {
    /// Executes an `addi` instruction.
    ///
    /// Corresponds to the assembly instruction `addi dest src immediate`.
    ///
    /// > ADDI adds the sign-extended 12-bit immediate to register rs1. Arithmetic overflow is
    /// > ignored and the result is simply the low XLEN bits of the result. ADDI rd, rs1, 0 is used
    /// > to implement the MV rd, rs1 assembler pseudoinstruction.
    pub fn addi(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| s.wrapping_add_signed(imm))
    }

    /// Executes a `slti` instruction.
    ///
    /// Corresponds to the assembly instruction `slti dest src immediate`.
    ///
    /// > SLTI (set less than immediate) places the value 1 in register rd if register rs1 is less
    /// > than the sign-extended immediate when both are treated as signed numbers, else 0 is
    /// > written to rd.
    pub fn slti(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| ((s as i64) < imm) as u64)
    }

    /// Executes a `sltiu` instruction.
    ///
    /// Corresponds to the assembly instruction `sltiu dest src immediate`.
    ///
    /// > SLTIU is similar but compares the values as unsigned numbers (i.e., the immediate is
    /// > first sign-extended to XLEN bits then treated as an unsigned number).
    pub fn sltiu(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| (s < imm as u64) as u64)
    }

    /// Executes an `andi` instruction.
    ///
    /// > ANDI, ORI, XORI are logical operations that perform bitwise AND, OR, and XOR on register
    /// > rs1 and the sign-extended 12-bit immediate and place the result in rd.
    pub fn andi(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| s & imm as u64)
    }

    /// Executes an `ori` instruction.
    pub fn ori(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| s | imm as u64)
    }

    /// Executes a `xori` instruction.
    ///
    /// > Note, XORI rd, rs1, -1 performs a bitwise logical inversion of register rs1 (assembler
    /// > pseudoinstruction NOT rd, rs).
    pub fn xori(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| s ^ imm as u64)
    }

    /// Executes an `addiw` instruction.
    ///
    /// > ADDIW is an RV64I instruction that adds the sign-extended 12-bit immediate to register
    /// > rs1 and produces the proper sign-extension of a 32-bit result in rd. Overflows are
    /// > ignored and the result is the low 32 bits of the result sign-extended to 64 bits.
    pub fn addiw(&mut self, dest: Specifier, src: Specifier, immediate: i64) -> ExecutionResult {
        self.reg_imm_op(dest, src, immediate, |s, imm| {
            sign_extend_word(s.wrapping_add_signed(imm) as u32)
        })
    }

    /// Executes a `slli` instruction.
    ///
    /// > SLLI is a logical left shift (zeros are shifted into the lower bits).
    ///
    /// # Panics
    ///
    /// `shift_amount_u6` must fit in a u6 (`0..=63`), otherwise this will panic.
    pub fn slli(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u6: u32,
    ) -> ExecutionResult {
        self.reg_shamt_op(dest, src, shift_amount_u6, |s, shamt| s << shamt)
    }

    /// Executes a `srli` instruction.
    ///
    /// > SRLI is a logical right shift (zeros are shifted into the upper bits).
    pub fn srli(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u6: u32,
    ) -> ExecutionResult {
        self.reg_shamt_op(dest, src, shift_amount_u6, |s, shamt| s >> shamt)
    }

    /// Executes a `srai` instruction.
    ///
    /// > SRAI is an arithmetic right shift (the original sign bit is copied into the vacated upper
    /// > bits).
    pub fn srai(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u6: u32,
    ) -> ExecutionResult {
        self.reg_shamt_op(dest, src, shift_amount_u6, |s, shamt| {
            ((s as i64) >> shamt) as u64
        })
    }

    /// Executes a `slliw` instruction.
    ///
    /// > SLLIW, SRLIW, and SRAIW are RV64I-only instructions that are analogously defined but
    /// > operate on 32-bit values and sign-extend their 32-bit results to 64 bits.
    pub fn slliw(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
    ) -> ExecutionResult {
        self.reg_shamt_op(dest, src, shift_amount_u5 & 0x1F, |s, shamt| {
            sign_extend_word((s as u32) << shamt)
        })
    }

    pub fn srliw(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
    ) -> ExecutionResult {
        self.reg_shamt_op(dest, src, shift_amount_u5 & 0x1F, |s, shamt| {
            sign_extend_word((s as u32) >> shamt)
        })
    }

    pub fn sraiw(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
    ) -> ExecutionResult {
        self.reg_shamt_op(dest, src, shift_amount_u5 & 0x1F, |s, shamt| {
            ((s as i32) >> shamt) as i64 as u64
        })
    }

    /// Executes a `lui` instruction.
    ///
    /// Corresponds to the assembly instruction `lui dest immediate`.
    ///
    /// > LUI (load upper immediate) uses the same opcode as RV32I. LUI places the 20-bit
    /// > U-immediate into bits 31–12 of register rd and places zero in the lowest 12 bits. The
    /// > 32-bit result is sign-extended to 64 bits.
    pub fn lui(&mut self, dest: Specifier, immediate: i64) -> ExecutionResult {
        self.registers.set_x(dest, (immediate & !0xFFF) as u64);
        Ok(Retired::Normal)
    }

    /// Executes an `auipc` instruction.
    ///
    /// > AUIPC (add upper immediate to pc) is used to build pc-relative addresses and uses the
    /// > U-type format. AUIPC forms a 32-bit offset from the U-immediate, filling in the lowest
    /// > 12 bits with zeros, sign-extends the result to 64 bits, adds it to the address of the
    /// > AUIPC instruction, then places the result in register rd.
    pub fn auipc(&mut self, dest: Specifier, immediate: i64) -> ExecutionResult {
        let result = self.address.wrapping_add_signed(immediate & !0xFFF);
        self.registers.set_x(dest, result);
        Ok(Retired::Normal)
    }

    /// Executes an `add` instruction.
    ///
    /// > ADD performs the addition of rs1 and rs2.
    pub fn add(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1.wrapping_add(s2))
    }

    /// Executes a `sub` instruction.
    ///
    /// > SUB performs the subtraction of rs2 from rs1.
    pub fn sub(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1.wrapping_sub(s2))
    }

    /// Executes a `slt` instruction.
    ///
    /// > SLT and SLTU perform signed and unsigned compares respectively, writing 1 to rd if
    /// > rs1 < rs2, 0 otherwise.
    pub fn slt(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            ((s1 as i64) < (s2 as i64)) as u64
        })
    }

    /// Executes a `sltu` instruction.
    ///
    /// > Note, SLTU rd, x0, rs2 sets rd to 1 if rs2 is not equal to zero, otherwise sets rd to
    /// > zero (assembler pseudoinstruction SNEZ rd, rs).
    pub fn sltu(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| (s1 < s2) as u64)
    }

    pub fn and(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1 & s2)
    }

    pub fn or(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1 | s2)
    }

    pub fn xor(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1 ^ s2)
    }

    /// Executes a `sll` instruction.
    ///
    /// > SLL, SRL, and SRA perform logical left, logical right, and arithmetic right shifts on the
    /// > value in register rs1 by the shift amount held in register rs2. In RV64I, only the low 6
    /// > bits of rs2 are considered for the shift amount.
    pub fn sll(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1 << (s2 & 0x3F))
    }

    pub fn srl(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1 >> (s2 & 0x3F))
    }

    pub fn sra(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            ((s1 as i64) >> (s2 & 0x3F)) as u64
        })
    }

    /// Executes an `addw` instruction.
    ///
    /// > ADDW and SUBW are RV64I-only instructions that are defined analogously to ADD and SUB
    /// > but operate on 32-bit values and produce signed 32-bit results. Overflows are ignored,
    /// > and the low 32-bits of the result is sign-extended to 64-bits and written to the
    /// > destination register.
    pub fn addw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            sign_extend_word((s1 as u32).wrapping_add(s2 as u32))
        })
    }

    pub fn subw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            sign_extend_word((s1 as u32).wrapping_sub(s2 as u32))
        })
    }

    /// Executes a `sllw` instruction.
    ///
    /// > SLLW, SRLW, and SRAW are RV64I-only instructions that are analogously defined but
    /// > operate on 32-bit values and sign-extend their 32-bit results to 64 bits. The shift
    /// > amount is given by rs2[4:0].
    pub fn sllw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            sign_extend_word((s1 as u32) << (s2 & 0x1F))
        })
    }

    pub fn srlw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            sign_extend_word((s1 as u32) >> (s2 & 0x1F))
        })
    }

    pub fn sraw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            ((s1 as i32) >> (s2 & 0x1F)) as i64 as u64
        })
    }

    /// Executes a `mul` instruction.
    ///
    /// > MUL performs an XLEN-bit×XLEN-bit multiplication of rs1 by rs2 and places the lower XLEN
    /// > bits in the destination register.
    pub fn mul(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| s1.wrapping_mul(s2))
    }

    /// Executes a `mulh` instruction.
    ///
    /// > MULH, MULHU, and MULHSU perform the same multiplication but return the upper XLEN bits
    /// > of the full 2×XLEN-bit product, for signed×signed, unsigned×unsigned, and
    /// > signed rs1×unsigned rs2 multiplication, respectively.
    pub fn mulh(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            ((s1 as i64 as i128 * s2 as i64 as i128) >> 64) as u64
        })
    }

    pub fn mulhsu(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            ((s1 as i64 as i128).wrapping_mul(s2 as i128) >> 64) as u64
        })
    }

    pub fn mulhu(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            ((s1 as u128 * s2 as u128) >> 64) as u64
        })
    }

    /// Executes a `div` instruction.
    ///
    /// > The quotient of division by zero has all bits set, and the remainder of division by
    /// > zero equals the dividend. Signed division overflow occurs only when the most-negative
    /// > integer is divided by −1. The quotient of a signed division with overflow is equal to
    /// > the dividend, and the remainder is zero.
    pub fn div(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 {
            0 => u64::MAX,
            _ => (s1 as i64).wrapping_div(s2 as i64) as u64,
        })
    }

    pub fn divu(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 {
            0 => u64::MAX,
            _ => s1 / s2,
        })
    }

    pub fn rem(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 {
            0 => s1,
            _ => (s1 as i64).wrapping_rem(s2 as i64) as u64,
        })
    }

    pub fn remu(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 {
            0 => s1,
            _ => s1 % s2,
        })
    }

    /// Executes a `mulw` instruction.
    ///
    /// > MULW is an RV64 instruction that multiplies the lower 32 bits of the source registers,
    /// > placing the sign-extension of the lower 32 bits of the result into the destination
    /// > register.
    pub fn mulw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| {
            sign_extend_word((s1 as u32).wrapping_mul(s2 as u32))
        })
    }

    /// Executes a `divw` instruction.
    ///
    /// > DIVW and DIVUW are RV64 instructions that divide the lower 32 bits of rs1 by the lower
    /// > 32 bits of rs2, treating them as signed and unsigned integers respectively, placing the
    /// > 32-bit quotient in rd, sign-extended to 64 bits.
    pub fn divw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 as i32 {
            0 => u64::MAX,
            divisor => (s1 as i32).wrapping_div(divisor) as i64 as u64,
        })
    }

    pub fn divuw(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 as u32 {
            0 => u64::MAX,
            divisor => sign_extend_word(s1 as u32 / divisor),
        })
    }

    /// Executes a `remw` instruction.
    ///
    /// > REMW and REMUW are RV64 instructions that provide the corresponding signed and unsigned
    /// > remainder operations. Both REMW and REMUW always sign-extend the 32-bit result to 64
    /// > bits, including on a divide by zero.
    pub fn remw(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 as i32 {
            0 => sign_extend_word(s1 as u32),
            divisor => (s1 as i32).wrapping_rem(divisor) as i64 as u64,
        })
    }

    pub fn remuw(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.reg_reg_op(dest, src1, src2, |s1, s2| match s2 as u32 {
            0 => sign_extend_word(s1 as u32),
            divisor => sign_extend_word(s1 as u32 % divisor),
        })
    }

    /// Executes a `jal` instruction.
    ///
    /// > The jump and link (JAL) instruction uses the J-type format, where the J-immediate
    /// > encodes a signed offset in multiples of 2 bytes. The offset is sign-extended and added
    /// > to the address of the jump instruction to form the jump target address. JAL stores the
    /// > address of the instruction following the jump ('pc'+4) into register rd.
    pub fn jal(&mut self, dest: Specifier, offset: i64) -> ExecutionResult {
        let target = self.address.wrapping_add_signed(offset);
        self.jump_op(dest, target)
    }

    /// Executes a `jalr` instruction.
    ///
    /// > The target address is obtained by adding the sign-extended 12-bit I-immediate to the
    /// > register rs1, then setting the least-significant bit of the result to zero.
    pub fn jalr(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        let target = self.registers.x(base).wrapping_add_signed(offset) & !1;
        self.jump_op(dest, target)
    }

    pub fn beq(&mut self, src1: Specifier, src2: Specifier, offset: i64) -> ExecutionResult {
        self.cond_branch(src1, src2, offset, |s1, s2| s1 == s2)
    }

    pub fn bne(&mut self, src1: Specifier, src2: Specifier, offset: i64) -> ExecutionResult {
        self.cond_branch(src1, src2, offset, |s1, s2| s1 != s2)
    }

    pub fn blt(&mut self, src1: Specifier, src2: Specifier, offset: i64) -> ExecutionResult {
        self.cond_branch(src1, src2, offset, |s1, s2| (s1 as i64) < (s2 as i64))
    }

    pub fn bltu(&mut self, src1: Specifier, src2: Specifier, offset: i64) -> ExecutionResult {
        self.cond_branch(src1, src2, offset, |s1, s2| s1 < s2)
    }

    pub fn bge(&mut self, src1: Specifier, src2: Specifier, offset: i64) -> ExecutionResult {
        self.cond_branch(src1, src2, offset, |s1, s2| (s1 as i64) >= (s2 as i64))
    }

    pub fn bgeu(&mut self, src1: Specifier, src2: Specifier, offset: i64) -> ExecutionResult {
        self.cond_branch(src1, src2, offset, |s1, s2| s1 >= s2)
    }

    pub fn lb(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_byte(address).map(|value| value as i8 as u64)
        })
    }

    pub fn lbu(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_byte(address).map(|value| value as u64)
        })
    }

    pub fn lh(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_halfword(address).map(|value| value as i16 as u64)
        })
    }

    pub fn lhu(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_halfword(address).map(|value| value as u64)
        })
    }

    /// Executes an `lw` instruction.
    ///
    /// > The LW instruction loads a 32-bit value from memory and sign-extends this to 64 bits
    /// > before storing it in register rd for RV64I. The LWU instruction, on the other hand,
    /// > zero-extends the 32-bit value from memory for RV64I.
    pub fn lw(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_word(address).map(sign_extend_word)
        })
    }

    pub fn lwu(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_word(address).map(|value| value as u64)
        })
    }

    pub fn ld(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.load_op(dest, base, offset, |memory, address| {
            memory.read_doubleword(address)
        })
    }

    pub fn sb(&mut self, src: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.store_op(src, base, offset, |memory, address, value| {
            memory.write_byte(address, value as u8)
        })
    }

    pub fn sh(&mut self, src: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.store_op(src, base, offset, |memory, address, value| {
            memory.write_halfword(address, value as u16)
        })
    }

    pub fn sw(&mut self, src: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.store_op(src, base, offset, |memory, address, value| {
            memory.write_word(address, value as u32)
        })
    }

    pub fn sd(&mut self, src: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        self.store_op(src, base, offset, |memory, address, value| {
            memory.write_doubleword(address, value)
        })
    }

    pub fn fence(&mut self) -> ExecutionResult {
        // Since only one hart is supported, this is equivalent to a nop instruction.
        Ok(Retired::Normal)
    }

    /// Executes a `fence.i` instruction.
    ///
    /// Instructions are fetched straight from memory on every step, so stores are always visible
    /// to subsequent fetches.
    pub fn fence_i(&mut self) -> ExecutionResult {
        Ok(Retired::Normal)
    }

    /// Executes an `ecall` instruction. The system call itself is handled by the driver loop.
    pub fn ecall(&mut self) -> ExecutionResult {
        Ok(Retired::EnvironmentCall)
    }

    /// Executes a `csrrw` instruction.
    ///
    /// > The CSRRW (Atomic Read/Write CSR) instruction atomically swaps values in the CSRs and
    /// > integer registers. CSRRW reads the old value of the CSR, zero-extends the value to XLEN
    /// > bits, then writes it to integer register rd. The initial value in rs1 is written to the
    /// > CSR.
    pub fn csrrw(&mut self, dest: Specifier, src: Specifier, csr: u16) -> ExecutionResult {
        let value = self.registers.x(src);
        self.csr_op(dest, csr, true, |_| value)
    }

    /// Executes a `csrrs` instruction.
    ///
    /// > If rs1=x0, then the instruction will not write to the CSR at all, and so shall not cause
    /// > any of the side effects that might otherwise occur on a CSR write.
    pub fn csrrs(&mut self, dest: Specifier, src: Specifier, csr: u16) -> ExecutionResult {
        let mask = self.registers.x(src);
        self.csr_op(dest, csr, src != Specifier::X0, |old| old | mask)
    }

    pub fn csrrc(&mut self, dest: Specifier, src: Specifier, csr: u16) -> ExecutionResult {
        let mask = self.registers.x(src);
        self.csr_op(dest, csr, src != Specifier::X0, |old| old & !mask)
    }

    /// Executes a `csrrwi` instruction, where `immediate` is the 5-bit unsigned value encoded in
    /// the rs1 field.
    pub fn csrrwi(&mut self, dest: Specifier, immediate: u64, csr: u16) -> ExecutionResult {
        self.csr_op(dest, csr, true, |_| immediate)
    }

    pub fn csrrsi(&mut self, dest: Specifier, immediate: u64, csr: u16) -> ExecutionResult {
        self.csr_op(dest, csr, immediate != 0, |old| old | immediate)
    }

    pub fn csrrci(&mut self, dest: Specifier, immediate: u64, csr: u16) -> ExecutionResult {
        self.csr_op(dest, csr, immediate != 0, |old| old & !immediate)
    }

    /// The error for the instruction being executed when it turns out to be unsupported.
    pub fn undefined(&self) -> ExecutionError {
        ExecutionError::UndefinedInstruction(self.instruction)
    }

    fn read_csr(&self, csr: u16) -> Option<u64> {
        let fcsr = self.registers.fcsr();
        match csr {
            csr::FFLAGS => Some(fcsr.fflags() as u64),
            csr::FRM => Some(fcsr.frm() as u64),
            csr::FCSR => Some(fcsr.read() as u64),
            csr::CYCLE => Some(self.counters.cycle),
            csr::TIME => Some(self.counters.time()),
            csr::INSTRET => Some(self.counters.instret),
            _ => None,
        }
    }

    /// Returns `false` if the CSR can't be written.
    fn write_csr(&mut self, csr: u16, value: u64) -> bool {
        let fcsr = self.registers.fcsr_mut();
        match csr {
            csr::FFLAGS => fcsr.write_fflags(value as u32),
            csr::FRM => fcsr.write_frm(value as u32),
            csr::FCSR => fcsr.write(value as u32),
            _ => return false,
        }
        true
    }

    fn csr_op<F>(&mut self, dest: Specifier, csr: u16, write: bool, op: F) -> ExecutionResult
    where
        F: FnOnce(u64) -> u64,
    {
        let old = self.read_csr(csr).ok_or_else(|| self.undefined())?;
        if write && !self.write_csr(csr, op(old)) {
            return Err(self.undefined());
        }
        self.registers.set_x(dest, old);
        Ok(Retired::Normal)
    }

    #[inline]
    fn reg_imm_op<F>(
        &mut self,
        dest: Specifier,
        src: Specifier,
        immediate: i64,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(u64, i64) -> u64,
    {
        let result = op(self.registers.x(src), immediate);
        self.registers.set_x(dest, result);
        Ok(Retired::Normal)
    }

    #[inline]
    fn reg_shamt_op<F>(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u6: u32,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(u64, u32) -> u64,
    {
        if shift_amount_u6 > 63 {
            panic!("out of range u6 used");
        }
        let result = op(self.registers.x(src), shift_amount_u6);
        self.registers.set_x(dest, result);
        Ok(Retired::Normal)
    }

    #[inline]
    fn reg_reg_op<F>(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(u64, u64) -> u64,
    {
        let result = op(self.registers.x(src1), self.registers.x(src2));
        self.registers.set_x(dest, result);
        Ok(Retired::Normal)
    }

    fn jump_op(&mut self, dest: Specifier, target: u64) -> ExecutionResult {
        // `pc` already holds the address of the next instruction, the link value
        let link = std::mem::replace(self.registers.pc_mut(), target);
        if dest != Specifier::X0 {
            self.registers.set_x(dest, link);
        }
        trace!("jump from {:#x} to {target:#x}", self.address);
        Ok(Retired::Normal)
    }

    // Takes the branch if `predicate` returns `true`.
    fn cond_branch<P>(
        &mut self,
        src1: Specifier,
        src2: Specifier,
        offset: i64,
        predicate: P,
    ) -> ExecutionResult
    where
        P: FnOnce(u64, u64) -> bool,
    {
        if predicate(self.registers.x(src1), self.registers.x(src2)) {
            *self.registers.pc_mut() = self.address.wrapping_add_signed(offset);
        }
        Ok(Retired::Normal)
    }

    #[inline]
    fn load_op<F>(
        &mut self,
        dest: Specifier,
        base: Specifier,
        offset: i64,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(&Memory, u64) -> Result<u64, MemoryError>,
    {
        let address = self.registers.x(base).wrapping_add_signed(offset);
        let value = op(&*self.memory, address)?;
        self.registers.set_x(dest, value);
        Ok(Retired::Normal)
    }

    #[inline]
    fn store_op<F>(
        &mut self,
        src: Specifier,
        base: Specifier,
        offset: i64,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(&mut Memory, u64, u64) -> Result<(), MemoryError>,
    {
        let value = self.registers.x(src);
        let address = self.registers.x(base).wrapping_add_signed(offset);
        op(&mut *self.memory, address, value)?;
        Ok(Retired::Normal)
    }
}

/// Sign-extends the 32-bit result of a word operation to 64 bits.
pub(super) fn sign_extend_word(value: u32) -> u64 {
    value as i32 as i64 as u64
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::core::fcsr::Fcsr;
    use crate::instruction::encode::*;
    use crate::instruction::opcode;
    use crate::registers::Specifier;

    /// Runs a single instruction with x1 = `a` and x2 = `b`, returning x3.
    fn op(raw: u32, a: u64, b: u64) -> u64 {
        let mut core = core_with(&[raw]);
        core.registers_mut().set_x(x(1), a);
        core.registers_mut().set_x(x(2), b);
        core.step().unwrap();
        core.registers().x(x(3))
    }

    fn reg(funct3: u8, funct7: u8) -> u32 {
        r_type(opcode::OP, 3, funct3, 1, 2, funct7)
    }

    fn reg_w(funct3: u8, funct7: u8) -> u32 {
        r_type(opcode::OP_32, 3, funct3, 1, 2, funct7)
    }

    fn imm(funct3: u8, immediate: i32) -> u32 {
        i_type(opcode::OP_IMM, 3, funct3, 1, immediate)
    }

    const NEG_ONE: u64 = u64::MAX;
    const MIN: u64 = i64::MIN as u64;

    #[test]
    fn test_word_add_sign_extends() {
        assert_eq!(0xFFFF_FFFF_8000_0000, op(reg_w(0b000, 0), 0x7FFF_FFFF, 1));
        assert_eq!(0x7FFF_FFFF, op(reg_w(0b000, 0x20), 0x8000_0000, 1));
        assert_eq!(
            0xFFFF_FFFF_8000_0000,
            op(i_type(opcode::OP_IMM_32, 3, 0, 1, 1), 0x7FFF_FFFF, 0)
        );
        // upper bits of the operands are ignored
        assert_eq!(3, op(reg_w(0b000, 0), 0xFFFF_0000_0000_0001, 2));
        assert_eq!(0x8000_0001, op(reg(0b000, 0), 0x7FFF_FFFF, 2));
    }

    #[test]
    fn test_signed_vs_unsigned_compare() {
        assert_eq!(1, op(reg(0b010, 0), NEG_ONE, 1));
        assert_eq!(0, op(reg(0b011, 0), NEG_ONE, 1));
        assert_eq!(1, op(imm(0b010, 0), NEG_ONE, 0));
        assert_eq!(0, op(imm(0b011, 0), NEG_ONE, 0));
        // sltiu with -1 compares against u64::MAX
        assert_eq!(1, op(imm(0b011, -1), 5, 0));
    }

    #[test]
    fn test_shifts() {
        let shift_imm = |funct3, amount| imm(funct3, amount);
        assert_eq!(1 << 63, op(shift_imm(0b001, 63), 1, 0));
        assert_eq!(1, op(shift_imm(0b101, 63), MIN, 0));
        assert_eq!(NEG_ONE, op(shift_imm(0b101, 0x400 | 63), MIN, 0));
        // register shifts use the low 6 bits
        assert_eq!(2, op(reg(0b001, 0), 1, 65));
        assert_eq!(0xC000_0000_0000_0000, op(reg(0b101, 0x20), MIN, 1));
        assert_eq!(0x4000_0000_0000_0000, op(reg(0b101, 0), MIN, 1));
        // word shifts use the low 5 bits and sign-extend
        assert_eq!(0xFFFF_FFFF_8000_0000, op(reg_w(0b001, 0), 1, 31 + 32));
        assert_eq!(0x4000_0000, op(reg_w(0b101, 0), 0x8000_0000, 1));
        assert_eq!(0xFFFF_FFFF_C000_0000, op(reg_w(0b101, 0x20), 0x8000_0000, 1));
        let sraiw = i_type(opcode::OP_IMM_32, 3, 0b101, 1, 0x400 | 4);
        assert_eq!(0xFFFF_FFFF_F800_0000, op(sraiw, 0x8000_0000, 0));
        let srliw = i_type(opcode::OP_IMM_32, 3, 0b101, 1, 4);
        assert_eq!(0x0800_0000, op(srliw, 0xFFFF_FFFF_8000_0000, 0));
    }

    #[test]
    fn test_logic_immediates() {
        assert_eq!(NEG_ONE ^ 0xF0, op(imm(0b100, -1), 0xF0, 0));
        assert_eq!(0xFFFF_FFFF_FFFF_F800, op(imm(0b110, -2048), 0, 0));
        assert_eq!(0x0F, op(imm(0b111, 0x0F), 0xFF, 0));
        assert_eq!(9, op(imm(0b000, -1), 10, 0));
    }

    #[test]
    fn test_multiply() {
        assert_eq!(6, op(reg(0b000, 1), 2, 3));
        assert_eq!(NEG_ONE, op(reg(0b001, 1), NEG_ONE, 1)); // mulh
        assert_eq!(0, op(reg(0b011, 1), NEG_ONE, 1)); // mulhu
        assert_eq!(NEG_ONE - 1, op(reg(0b011, 1), NEG_ONE, NEG_ONE)); // mulhu
        assert_eq!(NEG_ONE, op(reg(0b010, 1), NEG_ONE, 1)); // mulhsu
        assert_eq!(NEG_ONE, op(reg(0b010, 1), NEG_ONE, NEG_ONE)); // mulhsu
        assert_eq!(
            0xFFFF_FFFF_FFFF_FFFE,
            op(reg_w(0b000, 1), 0x7FFF_FFFF, 2)
        );
    }

    #[test]
    fn test_division_edge_cases() {
        let (div, divu, rem, remu) = (reg(0b100, 1), reg(0b101, 1), reg(0b110, 1), reg(0b111, 1));
        assert_eq!(NEG_ONE, op(div, 7, 0));
        assert_eq!(NEG_ONE, op(divu, 7, 0));
        assert_eq!(7, op(rem, 7, 0));
        assert_eq!(7, op(remu, 7, 0));
        assert_eq!(MIN, op(div, MIN, NEG_ONE));
        assert_eq!(0, op(rem, MIN, NEG_ONE));
        assert_eq!(-3_i64 as u64, op(div, -7_i64 as u64, 2));
        assert_eq!(-1_i64 as u64, op(rem, -7_i64 as u64, 2));

        let (divw, divuw, remw, remuw) =
            (reg_w(0b100, 1), reg_w(0b101, 1), reg_w(0b110, 1), reg_w(0b111, 1));
        assert_eq!(NEG_ONE, op(divw, 7, 0));
        assert_eq!(NEG_ONE, op(divuw, 7, 0));
        assert_eq!(0xFFFF_FFFF_8000_0000, op(remw, 0x8000_0000, 0));
        assert_eq!(0xFFFF_FFFF_8000_0000, op(remuw, 0x8000_0000, 0));
        assert_eq!(0xFFFF_FFFF_8000_0000, op(divw, 0x8000_0000, NEG_ONE));
        assert_eq!(0, op(remw, 0x8000_0000, NEG_ONE));
        assert_eq!(0x7FFF_FFFF, op(divuw, 0xFFFF_FFFE, 2));
    }

    #[test]
    fn test_branch_target_is_relative_to_instruction() {
        // x1 and x3 both start out as zero, unlike x2 (sp)
        let mut core = core_with(&[b_type(0b000, 1, 3, -8)]);
        core.step().unwrap();
        assert_eq!(BASE - 8, core.registers().pc());

        let mut core = core_with(&[b_type(0b001, 1, 3, 16)]);
        core.step().unwrap();
        // not taken
        assert_eq!(BASE + 4, core.registers().pc());

        // -1 < 0 when signed
        let mut core = core_with(&[b_type(0b100, 1, 3, 12)]);
        core.registers_mut().set_x(x(1), NEG_ONE);
        core.step().unwrap();
        assert_eq!(BASE + 12, core.registers().pc());

        // but not when unsigned
        let mut core = core_with(&[b_type(0b110, 1, 3, 12)]);
        core.registers_mut().set_x(x(1), NEG_ONE);
        core.step().unwrap();
        assert_eq!(BASE + 4, core.registers().pc());

        let mut core = core_with(&[b_type(0b110, 3, 1, 12)]);
        core.registers_mut().set_x(x(1), NEG_ONE);
        core.step().unwrap();
        assert_eq!(BASE + 12, core.registers().pc());

        // bge at BASE + 4 jumps back to BASE
        let mut core = core_with(&[i_type(opcode::OP_IMM, 0, 0, 0, 0), b_type(0b101, 1, 3, -4)]);
        core.step().unwrap();
        core.step().unwrap();
        assert_eq!(BASE, core.registers().pc());
    }

    #[test]
    fn test_jumps() {
        let mut core = core_with(&[j_type(1, 0x100)]);
        core.step().unwrap();
        assert_eq!(BASE + 0x100, core.registers().pc());
        assert_eq!(BASE + 4, core.registers().x(Specifier::RA));

        // jalr clears the lowest bit and doesn't link into x0
        let mut core = core_with(&[i_type(opcode::JALR, 0, 0, 1, 3)]);
        core.registers_mut().set_x(x(1), 0x2000);
        core.step().unwrap();
        assert_eq!(0x2002, core.registers().pc());
        assert_eq!(0, core.registers().x(Specifier::X0));

        // jalr reads its base before linking into the same register
        let mut core = core_with(&[i_type(opcode::JALR, 1, 0, 1, -4)]);
        core.registers_mut().set_x(x(1), 0x2000);
        core.step().unwrap();
        assert_eq!(0x1FFC, core.registers().pc());
        assert_eq!(BASE + 4, core.registers().x(x(1)));
    }

    #[test]
    fn test_upper_immediates() {
        let mut core = core_with(&[
            u_type(opcode::LUI, 1, 0x8000_0000_u32 as i32),
            u_type(opcode::AUIPC, 2, 0x1000),
            u_type(opcode::AUIPC, 3, -0x1000),
        ]);
        for _ in 0..3 {
            core.step().unwrap();
        }
        assert_eq!(0xFFFF_FFFF_8000_0000, core.registers().x(x(1)));
        assert_eq!(BASE + 4 + 0x1000, core.registers().x(x(2)));
        assert_eq!(BASE + 8 - 0x1000, core.registers().x(x(3)));
    }

    #[test]
    fn test_loads_and_stores() {
        let mut core = core_with(&[
            s_type(opcode::STORE, 0b011, 1, 2, 8),     // sd x2, 8(x1)
            i_type(opcode::LOAD, 3, 0b000, 1, 8),      // lb x3, 8(x1)
            i_type(opcode::LOAD, 4, 0b100, 1, 8),      // lbu x4, 8(x1)
            i_type(opcode::LOAD, 5, 0b001, 1, 8),      // lh x5, 8(x1)
            i_type(opcode::LOAD, 6, 0b101, 1, 8),      // lhu x6, 8(x1)
            i_type(opcode::LOAD, 7, 0b010, 1, 8),      // lw x7, 8(x1)
            i_type(opcode::LOAD, 8, 0b110, 1, 8),      // lwu x8, 8(x1)
            i_type(opcode::LOAD, 9, 0b011, 1, 8),      // ld x9, 8(x1)
            s_type(opcode::STORE, 0b000, 1, 2, -1),    // sb x2, -1(x1)
            s_type(opcode::STORE, 0b001, 1, 2, 0x101), // sh x2, 0x101(x1)
            s_type(opcode::STORE, 0b010, 1, 2, 0x201), // sw x2, 0x201(x1)
        ]);
        core.registers_mut().set_x(x(1), 0x8000);
        core.registers_mut().set_x(x(2), 0x8765_4321_F0E1_D2C3);
        for _ in 0..11 {
            core.step().unwrap();
        }
        let registers = core.registers();
        assert_eq!(0xFFFF_FFFF_FFFF_FFC3, registers.x(x(3)));
        assert_eq!(0xC3, registers.x(x(4)));
        assert_eq!(0xFFFF_FFFF_FFFF_D2C3, registers.x(x(5)));
        assert_eq!(0xD2C3, registers.x(x(6)));
        assert_eq!(0xFFFF_FFFF_F0E1_D2C3, registers.x(x(7)));
        assert_eq!(0xF0E1_D2C3, registers.x(x(8)));
        assert_eq!(0x8765_4321_F0E1_D2C3, registers.x(x(9)));
        let memory = core.memory();
        assert_eq!(Ok(0xC3), memory.read_byte(0x7FFF));
        assert_eq!(Ok(0xD2C3), memory.read_halfword(0x8101));
        assert_eq!(Ok(0xF0E1_D2C3), memory.read_word(0x8201));
    }

    #[test]
    fn test_writes_to_x0_are_dropped() {
        let mut core = core_with(&[
            i_type(opcode::OP_IMM, 0, 0b000, 0, 5),
            u_type(opcode::LUI, 0, 0x1000),
            i_type(opcode::LOAD, 0, 0b011, 0, 0x100),
        ]);
        for _ in 0..3 {
            core.step().unwrap();
            assert_eq!(0, core.registers().x(Specifier::X0));
        }
    }

    #[test]
    fn test_out_of_bounds_load_is_fatal() {
        let mut core = core_with(&[i_type(opcode::LOAD, 3, 0b011, 1, 0)]);
        core.registers_mut().set_x(x(1), 0xFFFF);
        let err = core.step().unwrap_err();
        assert_eq!(BASE, err.pc);
    }

    #[test]
    fn test_csr_access() {
        let csrrw = |rd, rs1, csr| i_type(opcode::SYSTEM, rd, 0b001, rs1, csr);
        let csrrs = |rd, rs1, csr| i_type(opcode::SYSTEM, rd, 0b010, rs1, csr);
        let mut core = core_with(&[
            csrrw(3, 1, 0x003),                           // fcsr <- x1
            csrrs(4, 0, 0x002),                           // x4 <- frm
            csrrs(5, 0, 0x001),                           // x5 <- fflags
            i_type(opcode::SYSTEM, 6, 0b111, 0b00011, 1), // csrrci x6, fflags, 3
            csrrs(7, 0, 0xC02),                           // x7 <- instret
        ]);
        core.registers_mut().set_x(x(1), 0xFFF_FFEB);
        for _ in 0..5 {
            core.step().unwrap();
        }
        let registers = core.registers();
        assert_eq!(0, registers.x(x(3)));
        assert_eq!(0b111, registers.x(x(4)));
        assert_eq!(0b01011, registers.x(x(5)));
        assert_eq!(0b01011, registers.x(x(6)));
        assert_eq!(0b1110_1000, registers.fcsr().read());
        assert_eq!(4, registers.x(x(7)));
    }

    #[test]
    fn test_time_is_read_when_accessed() {
        let mut core = core_with(&[
            i_type(opcode::SYSTEM, 5, 0b010, 0, 0xC01), // csrr x5, time
            i_type(opcode::SYSTEM, 6, 0b010, 0, 0xC01), // csrr x6, time
        ]);
        core.step().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        core.step().unwrap();
        let registers = core.registers();
        assert!(registers.x(x(6)) - registers.x(x(5)) >= 1000);
    }

    #[test]
    fn test_unsupported_csr_accesses() {
        // writing a read-only counter
        let mut core = core_with(&[i_type(opcode::SYSTEM, 1, 0b001, 2, 0xC00)]);
        assert!(core.step().is_err());
        // reading a counter without writing is fine
        let mut core = core_with(&[i_type(opcode::SYSTEM, 1, 0b010, 0, 0xC00)]);
        assert!(core.step().is_ok());
        // unknown CSR
        let mut core = core_with(&[i_type(opcode::SYSTEM, 1, 0b010, 0, 0x300)]);
        assert!(core.step().is_err());
        assert_eq!(Fcsr::new(), *core.registers().fcsr());
    }

    #[test]
    fn test_fences_are_nops() {
        let mut core = core_with(&[
            i_type(opcode::MISC_MEM, 0, 0b000, 0, 0x0FF),
            i_type(opcode::MISC_MEM, 0, 0b001, 0, 0),
        ]);
        core.step().unwrap();
        core.step().unwrap();
        assert_eq!(BASE + 8, core.registers().pc());
    }
}
