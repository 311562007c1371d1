//! Field extraction and format classification of 32-bit RISC-V instruction words.

use crate::registers::Specifier;
use std::fmt;

/// Major opcodes (bits `6:0`) known to the decoder.
#[allow(clippy::unusual_byte_groupings)]
pub mod opcode {
    pub const LOAD: u8 = 0b00_000_11;
    pub const LOAD_FP: u8 = 0b00_001_11;
    pub const MISC_MEM: u8 = 0b00_011_11;
    pub const OP_IMM: u8 = 0b00_100_11;
    pub const AUIPC: u8 = 0b00_101_11;
    pub const OP_IMM_32: u8 = 0b00_110_11;
    pub const STORE: u8 = 0b01_000_11;
    pub const STORE_FP: u8 = 0b01_001_11;
    pub const OP: u8 = 0b01_100_11;
    pub const LUI: u8 = 0b01_101_11;
    pub const OP_32: u8 = 0b01_110_11;
    pub const MADD: u8 = 0b10_000_11;
    pub const MSUB: u8 = 0b10_001_11;
    pub const NMSUB: u8 = 0b10_010_11;
    pub const NMADD: u8 = 0b10_011_11;
    pub const OP_FP: u8 = 0b10_100_11;
    pub const BRANCH: u8 = 0b11_000_11;
    pub const JALR: u8 = 0b11_001_11;
    pub const JAL: u8 = 0b11_011_11;
    pub const SYSTEM: u8 = 0b11_100_11;
}

/// Encoding format of an instruction, which decides where its operands and immediate live.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InstructionType {
    /// Register-register, also used for immediate shifts whose third operand is a shift amount.
    R,
    /// Fused multiply-add with three source registers.
    R4,
    I,
    S,
    /// Conditional branch (B-type).
    SB,
    U,
    /// Unconditional jump (J-type).
    UJ,
    Undefined,
}

impl InstructionType {
    /// Determines the format from an opcode, using `funct3` to split the immediate arithmetic
    /// opcodes into shifts (R) and the rest (I).
    pub fn of(opcode: u8, funct3: u8) -> Self {
        use opcode::*;
        match opcode {
            OP | OP_32 | OP_FP => Self::R,
            MADD | MSUB | NMSUB | NMADD => Self::R4,
            OP_IMM => match funct3 {
                0b001 | 0b101 => Self::R,
                _ => Self::I,
            },
            OP_IMM_32 => match funct3 {
                0b000 => Self::I,
                0b001 | 0b101 => Self::R,
                _ => Self::Undefined,
            },
            LOAD | LOAD_FP | JALR | SYSTEM | MISC_MEM => Self::I,
            STORE | STORE_FP => Self::S,
            BRANCH => Self::SB,
            LUI | AUIPC => Self::U,
            JAL => Self::UJ,
            _ => Self::Undefined,
        }
    }
}

/// Every field that could apply to an instruction word, extracted up front.
///
/// Which of them are meaningful depends on the [`InstructionType`]; the others simply hold
/// whatever bits happen to occupy their position. The five raw immediates are all sign-extended
/// to 64 bits, and `immediate` holds the one matching the classified format (`0` for R and R4).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecodedInstruction {
    pub raw: u32,
    pub opcode: u8,
    pub funct2: u8,
    pub funct3: u8,
    pub funct5: u8,
    pub funct6: u8,
    pub funct7: u8,
    pub rd: Specifier,
    pub rs1: Specifier,
    pub rs2: Specifier,
    pub rs3: Specifier,
    /// Shift amount of the 64-bit shifts (6 bits).
    pub shamt64: u32,
    /// Shift amount of the word shifts (5 bits).
    pub shamt32: u32,
    pub i_imm: i64,
    pub s_imm: i64,
    pub sb_imm: i64,
    pub u_imm: i64,
    pub uj_imm: i64,
    pub immediate: i64,
    /// Floating point rounding mode, aliases `funct3`.
    pub rm: u8,
    /// Floating point format, aliases `funct2`.
    pub fmt: u8,
    /// Floating point load/store width, aliases `funct3`.
    pub width: u8,
    /// CSR address (bits `31:20`).
    pub csr: u16,
}

impl DecodedInstruction {
    /// Extracts all fields from `raw_instruction`. Never fails: garbage words decode into garbage
    /// fields and are rejected by [`classify`] or the executor.
    pub fn decode(raw_instruction: u32) -> Self {
        let opcode = (raw_instruction & 0x7F) as u8;
        let funct3 = funct3(raw_instruction);
        let funct2 = ((raw_instruction >> 25) & 0b11) as u8;
        let mut decoded = Self {
            raw: raw_instruction,
            opcode,
            funct2,
            funct3,
            funct5: (raw_instruction >> 27) as u8,
            funct6: (raw_instruction >> 26) as u8,
            funct7: (raw_instruction >> 25) as u8,
            rd: rd(raw_instruction),
            rs1: rs1(raw_instruction),
            rs2: rs2(raw_instruction),
            rs3: rs3(raw_instruction),
            shamt64: (raw_instruction >> 20) & 0x3F,
            shamt32: (raw_instruction >> 20) & 0x1F,
            i_imm: i_imm(raw_instruction),
            s_imm: s_imm(raw_instruction),
            sb_imm: b_imm(raw_instruction),
            u_imm: u_imm(raw_instruction),
            uj_imm: j_imm(raw_instruction),
            immediate: 0,
            rm: funct3,
            fmt: funct2,
            width: funct3,
            csr: (raw_instruction >> 20) as u16,
        };
        decoded.immediate = match classify(&decoded) {
            InstructionType::I => decoded.i_imm,
            InstructionType::S => decoded.s_imm,
            InstructionType::SB => decoded.sb_imm,
            InstructionType::U => decoded.u_imm,
            InstructionType::UJ => decoded.uj_imm,
            InstructionType::R | InstructionType::R4 | InstructionType::Undefined => 0,
        };
        decoded
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x} (opcode {:#04x}, funct3 {:#x}, funct7 {:#04x}, rd {}, rs1 {}, rs2 {})",
            self.raw, self.opcode, self.funct3, self.funct7, self.rd, self.rs1, self.rs2
        )
    }
}

/// Shorthand for [`DecodedInstruction::decode`].
pub fn decode(raw_instruction: u32) -> DecodedInstruction {
    DecodedInstruction::decode(raw_instruction)
}

/// Returns the encoding format of a decoded instruction.
pub fn classify(decoded: &DecodedInstruction) -> InstructionType {
    InstructionType::of(decoded.opcode, decoded.funct3)
}

/// Returns the 5-bit *rd* value for R-type, I-type, U-type, J-type instructions.
fn rd(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 7) & 0x1F) as u8)
}

/// Returns the 5-bit *rs1* value for R-type, I-type, S-type, B-type instructions.
fn rs1(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 15) & 0x1F) as u8)
}

/// Returns the 5-bit *rs2* value for R-type, S-type, B-type instructions.
fn rs2(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 20) & 0x1F) as u8)
}

/// Returns the 5-bit *rs3* value for R4-type instructions.
fn rs3(raw_instruction: u32) -> Specifier {
    Specifier::from_u5((raw_instruction >> 27) as u8)
}

/// Returns the 3-bit *funct3* value for R-type, I-type, S-type, B-type instructions.
fn funct3(raw_instruction: u32) -> u8 {
    ((raw_instruction >> 12) & 0b111) as u8
}

/// Returns the 12-bit I-immediate sign-extended to 64 bits.
fn i_imm(raw_instruction: u32) -> i64 {
    (raw_instruction as i32 >> 20) as i64
}

/// Returns the 12-bit S-immediate sign-extended to 64 bits.
fn s_imm(raw_instruction: u32) -> i64 {
    let imm_11_5 = raw_instruction & 0xFE00_0000;
    let imm_4_0 = raw_instruction & 0x0000_0F80;
    ((imm_11_5 | (imm_4_0 << 13)) as i32 >> 20) as i64
}

/// Returns the 13-bit B-immediate sign-extended to 64 bits.
fn b_imm(raw_instruction: u32) -> i64 {
    let imm_12 = raw_instruction & 0x8000_0000;
    let imm_10_5 = raw_instruction & 0x7E00_0000;
    let imm_4_1 = raw_instruction & 0x0000_0F00;
    let imm_11 = raw_instruction & 0x0000_0080;
    ((imm_12 | (imm_11 << 23) | (imm_10_5 >> 1) | (imm_4_1 << 12)) as i32 >> 19) as i64
}

/// Returns the U-immediate (upper 20 bits, low 12 bits zero) sign-extended to 64 bits.
fn u_imm(raw_instruction: u32) -> i64 {
    (raw_instruction & 0xFFFF_F000) as i32 as i64
}

/// Returns the 21-bit J-immediate sign-extended to 64 bits.
fn j_imm(raw_instruction: u32) -> i64 {
    let imm_20 = raw_instruction & 0x8000_0000;
    let imm_10_1 = raw_instruction & 0x7FE0_0000;
    let imm_11 = raw_instruction & 0x0010_0000;
    let imm_19_12 = raw_instruction & 0x000F_F000;
    ((imm_20 | (imm_19_12 << 11) | (imm_11 << 2) | (imm_10_1 >> 9)) as i32 >> 11) as i64
}


#[cfg(test)]
mod tests {
    use super::encode::*;
    use super::*;

    #[test]
    fn test_i_imm() {
        assert_eq!(0, i_imm(0x0000_0000));
        assert_eq!(-1, i_imm(0xFFF0_0000));
        assert_eq!(2047, i_imm(2047 << 20));
        assert_eq!(-2048, i_imm(0x8000_0000));
        assert_eq!(-42, i_imm((-42_i32 << 20) as u32));
        // Check other bits are ignored
        assert_eq!(0, i_imm(0x000F_FFFF));
        assert_eq!(-1, i_imm(0xFFF1_2345));
        assert_eq!(1209, i_imm((1209 << 20) | 0x000C_D10A));
    }

    #[test]
    fn test_immediates_round_trip() {
        for value in [0, 1, 4, 100, 2047, -1, -4, -100, -2048] {
            let decoded = decode(i_type(opcode::OP_IMM, 1, 0, 2, value));
            assert_eq!(value as i64, decoded.immediate);
            let decoded = decode(s_type(opcode::STORE, 3, 2, 1, value));
            assert_eq!(value as i64, decoded.immediate);
        }
        for value in [0, 2, 8, 4094, -2, -8, -4096] {
            let decoded = decode(b_type(0, 1, 2, value));
            assert_eq!(value as i64, decoded.immediate);
        }
        for value in [0, 0x1000, 0x7FFF_F000, -0x1000, i32::MIN] {
            let decoded = decode(u_type(opcode::LUI, 1, value));
            assert_eq!(value as i64, decoded.immediate);
        }
        for value in [0, 2, 0x800, 0xF_FFFE, -2, -0x800, -0x10_0000] {
            let decoded = decode(j_type(1, value));
            assert_eq!(value as i64, decoded.immediate);
        }
    }

    #[test]
    fn test_fields() {
        // fmadd.d f1, f2, f3, f4, rtz
        let decoded = decode(r4_type(opcode::MADD, 1, 0b001, 2, 3, 4, 0b01));
        assert_eq!(InstructionType::R4, classify(&decoded));
        assert_eq!(1, u8::from(decoded.rd));
        assert_eq!(2, u8::from(decoded.rs1));
        assert_eq!(3, u8::from(decoded.rs2));
        assert_eq!(4, u8::from(decoded.rs3));
        assert_eq!(0b001, decoded.rm);
        assert_eq!(0b01, decoded.fmt);
        assert_eq!(0, decoded.immediate);

        // srai x5, x6, 63
        let decoded = decode(i_type(opcode::OP_IMM, 5, 0b101, 6, 0x400 | 63));
        assert_eq!(InstructionType::R, classify(&decoded));
        assert_eq!(63, decoded.shamt64);
        assert_eq!(31, decoded.shamt32);
        assert_eq!(0b010000, decoded.funct6);

        // csrrs x1, fcsr, x0
        let decoded = decode(i_type(opcode::SYSTEM, 1, 0b010, 0, 0x003));
        assert_eq!(0x003, decoded.csr);
    }

    #[test]
    fn test_classify() {
        let of = InstructionType::of;
        assert_eq!(InstructionType::I, of(opcode::OP_IMM, 0b000));
        assert_eq!(InstructionType::R, of(opcode::OP_IMM, 0b001));
        assert_eq!(InstructionType::R, of(opcode::OP_IMM, 0b101));
        assert_eq!(InstructionType::I, of(opcode::OP_IMM_32, 0b000));
        assert_eq!(InstructionType::R, of(opcode::OP_IMM_32, 0b101));
        assert_eq!(InstructionType::Undefined, of(opcode::OP_IMM_32, 0b010));
        assert_eq!(InstructionType::I, of(opcode::LOAD_FP, 0b011));
        assert_eq!(InstructionType::S, of(opcode::STORE_FP, 0b010));
        assert_eq!(InstructionType::SB, of(opcode::BRANCH, 0b000));
        assert_eq!(InstructionType::U, of(opcode::AUIPC, 0b000));
        assert_eq!(InstructionType::UJ, of(opcode::JAL, 0b000));
        assert_eq!(InstructionType::R4, of(opcode::NMADD, 0b000));
        assert_eq!(InstructionType::Undefined, of(0b0101111, 0b000));
        assert_eq!(InstructionType::Undefined, of(0, 0));
    }
}
