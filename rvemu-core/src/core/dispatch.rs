//! Maps decoded instructions onto the [`Executor`] operation implementing them.
//!
//! Dispatch narrows down in a fixed order: instruction type, opcode, `funct3`, and only then
//! `funct7`, `funct2` or the `rs2` field for instructions that use it as a selector. Any
//! combination that doesn't match an implemented instruction is undefined.

use super::execute::Executor;
use super::ExecutionResult;
use crate::instruction::{classify, opcode, DecodedInstruction, InstructionType};

/// Value of `funct6` (64-bit shifts) or `funct7` (everything else) for arithmetic right shifts
/// and `sub`.
const ALT: u8 = 0b0100000;
const ALT_SHIFT64: u8 = 0b010000;
/// Value of `funct7` selecting the M extension.
const MULDIV: u8 = 0b0000001;

/// The complete `ecall` encoding. Everything else in SYSTEM with `funct3 == 0` is unsupported.
const ECALL: u32 = 0x0000_0073;

impl<'a> Executor<'a> {
    /// Executes the instruction this executor was created for.
    pub fn execute(&mut self) -> ExecutionResult {
        let instruction = self.instruction;
        match classify(&instruction) {
            InstructionType::R => self.execute_r(&instruction),
            InstructionType::R4 => self.execute_r4(&instruction),
            InstructionType::I => self.execute_i(&instruction),
            InstructionType::S => self.execute_s(&instruction),
            InstructionType::SB => self.execute_sb(&instruction),
            InstructionType::U => self.execute_u(&instruction),
            InstructionType::UJ => self.jal(instruction.rd, instruction.immediate),
            InstructionType::Undefined => Err(self.undefined()),
        }
    }

    fn execute_r(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        let (rd, rs1, rs2) = (i.rd, i.rs1, i.rs2);
        match i.opcode {
            opcode::OP_IMM => match (i.funct3, i.funct6) {
                (0b001, 0) => self.slli(rd, rs1, i.shamt64),
                (0b101, 0) => self.srli(rd, rs1, i.shamt64),
                (0b101, ALT_SHIFT64) => self.srai(rd, rs1, i.shamt64),
                _ => Err(self.undefined()),
            },
            opcode::OP_IMM_32 => match (i.funct3, i.funct7) {
                (0b001, 0) => self.slliw(rd, rs1, i.shamt32),
                (0b101, 0) => self.srliw(rd, rs1, i.shamt32),
                (0b101, ALT) => self.sraiw(rd, rs1, i.shamt32),
                _ => Err(self.undefined()),
            },
            opcode::OP => {
                let op = match (i.funct3, i.funct7) {
                    (0b000, 0) => Executor::add,
                    (0b000, ALT) => Executor::sub,
                    (0b001, 0) => Executor::sll,
                    (0b010, 0) => Executor::slt,
                    (0b011, 0) => Executor::sltu,
                    (0b100, 0) => Executor::xor,
                    (0b101, 0) => Executor::srl,
                    (0b101, ALT) => Executor::sra,
                    (0b110, 0) => Executor::or,
                    (0b111, 0) => Executor::and,
                    (0b000, MULDIV) => Executor::mul,
                    (0b001, MULDIV) => Executor::mulh,
                    (0b010, MULDIV) => Executor::mulhsu,
                    (0b011, MULDIV) => Executor::mulhu,
                    (0b100, MULDIV) => Executor::div,
                    (0b101, MULDIV) => Executor::divu,
                    (0b110, MULDIV) => Executor::rem,
                    (0b111, MULDIV) => Executor::remu,
                    _ => return Err(self.undefined()),
                };
                op(self, rd, rs1, rs2)
            }
            opcode::OP_32 => {
                let op = match (i.funct3, i.funct7) {
                    (0b000, 0) => Executor::addw,
                    (0b000, ALT) => Executor::subw,
                    (0b001, 0) => Executor::sllw,
                    (0b101, 0) => Executor::srlw,
                    (0b101, ALT) => Executor::sraw,
                    (0b000, MULDIV) => Executor::mulw,
                    (0b100, MULDIV) => Executor::divw,
                    (0b101, MULDIV) => Executor::divuw,
                    (0b110, MULDIV) => Executor::remw,
                    (0b111, MULDIV) => Executor::remuw,
                    _ => return Err(self.undefined()),
                };
                op(self, rd, rs1, rs2)
            }
            opcode::OP_FP => self.execute_op_fp(i),
            _ => Err(self.undefined()),
        }
    }

    /// OP-FP is selected by `funct7` first, which holds both the operation and the format.
    fn execute_op_fp(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        let (rd, rs1, rs2) = (i.rd, i.rs1, i.rs2);
        let rs2_selector = u8::from(rs2);
        match i.funct7 {
            0x00 => self.fadd_s(rd, rs1, rs2),
            0x01 => self.fadd_d(rd, rs1, rs2),
            0x04 => self.fsub_s(rd, rs1, rs2),
            0x05 => self.fsub_d(rd, rs1, rs2),
            0x08 => self.fmul_s(rd, rs1, rs2),
            0x09 => self.fmul_d(rd, rs1, rs2),
            0x0C => self.fdiv_s(rd, rs1, rs2),
            0x0D => self.fdiv_d(rd, rs1, rs2),
            0x2C if rs2_selector == 0 => self.fsqrt_s(rd, rs1),
            0x2D if rs2_selector == 0 => self.fsqrt_d(rd, rs1),
            0x10 => match i.funct3 {
                0b000 => self.fsgnj_s(rd, rs1, rs2),
                0b001 => self.fsgnjn_s(rd, rs1, rs2),
                0b010 => self.fsgnjx_s(rd, rs1, rs2),
                _ => Err(self.undefined()),
            },
            0x11 => match i.funct3 {
                0b000 => self.fsgnj_d(rd, rs1, rs2),
                0b001 => self.fsgnjn_d(rd, rs1, rs2),
                0b010 => self.fsgnjx_d(rd, rs1, rs2),
                _ => Err(self.undefined()),
            },
            0x14 => match i.funct3 {
                0b000 => self.fmin_s(rd, rs1, rs2),
                0b001 => self.fmax_s(rd, rs1, rs2),
                _ => Err(self.undefined()),
            },
            0x15 => match i.funct3 {
                0b000 => self.fmin_d(rd, rs1, rs2),
                0b001 => self.fmax_d(rd, rs1, rs2),
                _ => Err(self.undefined()),
            },
            0x20 if rs2_selector == 1 => self.fcvt_s_d(rd, rs1),
            0x21 if rs2_selector == 0 => self.fcvt_d_s(rd, rs1),
            0x50 => match i.funct3 {
                0b000 => self.fle_s(rd, rs1, rs2),
                0b001 => self.flt_s(rd, rs1, rs2),
                0b010 => self.feq_s(rd, rs1, rs2),
                _ => Err(self.undefined()),
            },
            0x51 => match i.funct3 {
                0b000 => self.fle_d(rd, rs1, rs2),
                0b001 => self.flt_d(rd, rs1, rs2),
                0b010 => self.feq_d(rd, rs1, rs2),
                _ => Err(self.undefined()),
            },
            0x60 => self.fcvt_int_s(rd, rs1, rs2, i.rm),
            0x61 => self.fcvt_int_d(rd, rs1, rs2, i.rm),
            0x68 => self.fcvt_s_int(rd, rs1, rs2),
            0x69 => self.fcvt_d_int(rd, rs1, rs2),
            0x70 if rs2_selector == 0 => match i.funct3 {
                0b000 => self.fmv_x_w(rd, rs1),
                0b001 => self.fclass_s(rd, rs1),
                _ => Err(self.undefined()),
            },
            0x71 if rs2_selector == 0 => match i.funct3 {
                0b000 => self.fmv_x_d(rd, rs1),
                0b001 => self.fclass_d(rd, rs1),
                _ => Err(self.undefined()),
            },
            0x78 if rs2_selector == 0 && i.funct3 == 0 => self.fmv_w_x(rd, rs1),
            0x79 if rs2_selector == 0 && i.funct3 == 0 => self.fmv_d_x(rd, rs1),
            _ => Err(self.undefined()),
        }
    }

    fn execute_r4(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        let op = match (i.opcode, i.funct2) {
            (opcode::MADD, 0) => Executor::fmadd_s,
            (opcode::MADD, 1) => Executor::fmadd_d,
            (opcode::MSUB, 0) => Executor::fmsub_s,
            (opcode::MSUB, 1) => Executor::fmsub_d,
            (opcode::NMSUB, 0) => Executor::fnmsub_s,
            (opcode::NMSUB, 1) => Executor::fnmsub_d,
            (opcode::NMADD, 0) => Executor::fnmadd_s,
            (opcode::NMADD, 1) => Executor::fnmadd_d,
            _ => return Err(self.undefined()),
        };
        op(self, i.rd, i.rs1, i.rs2, i.rs3)
    }

    fn execute_i(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        let (rd, rs1, imm) = (i.rd, i.rs1, i.immediate);
        match i.opcode {
            opcode::LOAD => {
                let op = match i.funct3 {
                    0b000 => Executor::lb,
                    0b001 => Executor::lh,
                    0b010 => Executor::lw,
                    0b011 => Executor::ld,
                    0b100 => Executor::lbu,
                    0b101 => Executor::lhu,
                    0b110 => Executor::lwu,
                    _ => return Err(self.undefined()),
                };
                op(self, rd, rs1, imm)
            }
            opcode::LOAD_FP => match i.width {
                0b010 => self.flw(rd, rs1, imm),
                0b011 => self.fld(rd, rs1, imm),
                _ => Err(self.undefined()),
            },
            opcode::OP_IMM => {
                let op = match i.funct3 {
                    0b000 => Executor::addi,
                    0b010 => Executor::slti,
                    0b011 => Executor::sltiu,
                    0b100 => Executor::xori,
                    0b110 => Executor::ori,
                    0b111 => Executor::andi,
                    _ => return Err(self.undefined()),
                };
                op(self, rd, rs1, imm)
            }
            opcode::OP_IMM_32 if i.funct3 == 0b000 => self.addiw(rd, rs1, imm),
            opcode::JALR if i.funct3 == 0b000 => self.jalr(rd, rs1, imm),
            opcode::MISC_MEM => match i.funct3 {
                0b000 => self.fence(),
                0b001 => self.fence_i(),
                _ => Err(self.undefined()),
            },
            opcode::SYSTEM => {
                // csr*i variants encode their 5-bit immediate in the rs1 field
                let uimm = u8::from(rs1) as u64;
                match i.funct3 {
                    0b000 if i.raw == ECALL => self.ecall(),
                    0b001 => self.csrrw(rd, rs1, i.csr),
                    0b010 => self.csrrs(rd, rs1, i.csr),
                    0b011 => self.csrrc(rd, rs1, i.csr),
                    0b101 => self.csrrwi(rd, uimm, i.csr),
                    0b110 => self.csrrsi(rd, uimm, i.csr),
                    0b111 => self.csrrci(rd, uimm, i.csr),
                    _ => Err(self.undefined()),
                }
            }
            _ => Err(self.undefined()),
        }
    }

    fn execute_s(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        let (rs1, rs2, imm) = (i.rs1, i.rs2, i.immediate);
        match i.opcode {
            opcode::STORE => {
                let op = match i.funct3 {
                    0b000 => Executor::sb,
                    0b001 => Executor::sh,
                    0b010 => Executor::sw,
                    0b011 => Executor::sd,
                    _ => return Err(self.undefined()),
                };
                op(self, rs2, rs1, imm)
            }
            opcode::STORE_FP => match i.width {
                0b010 => self.fsw(rs2, rs1, imm),
                0b011 => self.fsd(rs2, rs1, imm),
                _ => Err(self.undefined()),
            },
            _ => Err(self.undefined()),
        }
    }

    fn execute_sb(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        let op = match i.funct3 {
            0b000 => Executor::beq,
            0b001 => Executor::bne,
            0b100 => Executor::blt,
            0b101 => Executor::bge,
            0b110 => Executor::bltu,
            0b111 => Executor::bgeu,
            _ => return Err(self.undefined()),
        };
        op(self, i.rs1, i.rs2, i.immediate)
    }

    fn execute_u(&mut self, i: &DecodedInstruction) -> ExecutionResult {
        match i.opcode {
            opcode::LUI => self.lui(i.rd, i.immediate),
            opcode::AUIPC => self.auipc(i.rd, i.immediate),
            _ => Err(self.undefined()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::core::ExecutionError;
    use crate::instruction::encode::*;
    use crate::instruction::opcode;

    fn is_undefined(raw: u32) -> bool {
        let mut core = core_with(&[raw]);
        matches!(
            core.step().map_err(|err| err.source),
            Err(ExecutionError::UndefinedInstruction(_))
        )
    }

    #[test]
    fn test_undefined_encodings() {
        // ebreak
        assert!(is_undefined(0x0010_0073));
        // ecall with a non-zero rd
        assert!(is_undefined(0x0000_00F3));
        // OP with an unknown funct7
        assert!(is_undefined(r_type(opcode::OP, 1, 0b000, 2, 3, 0b0000010)));
        // sra variant of sltu
        assert!(is_undefined(r_type(opcode::OP, 1, 0b011, 2, 3, 0b0100000)));
        // OP-32 has no sltw
        assert!(is_undefined(r_type(opcode::OP_32, 1, 0b010, 2, 3, 0)));
        // OP-IMM-32 with funct3 = 0b010
        assert!(is_undefined(i_type(opcode::OP_IMM_32, 1, 0b010, 2, 0)));
        // slli with bit 30 set
        assert!(is_undefined(i_type(opcode::OP_IMM, 1, 0b001, 2, 0x400)));
        // slliw with a 6-bit shift amount
        assert!(is_undefined(i_type(opcode::OP_IMM_32, 1, 0b001, 2, 32)));
        // load with funct3 = 0b111
        assert!(is_undefined(i_type(opcode::LOAD, 1, 0b111, 2, 0)));
        // branch with funct3 = 0b010
        assert!(is_undefined(b_type(0b010, 1, 2, 8)));
        // quad precision
        assert!(is_undefined(r_type(opcode::OP_FP, 1, 0, 2, 3, 0x03)));
        assert!(is_undefined(r4_type(opcode::MADD, 1, 0, 2, 3, 4, 0b11)));
        // fsqrt with a non-zero rs2
        assert!(is_undefined(r_type(opcode::OP_FP, 1, 0, 2, 3, 0x2C)));
        // fcvt.w.s with an unknown integer format
        assert!(is_undefined(r_type(opcode::OP_FP, 1, 0, 2, 4, 0x60)));
        // atomics aren't supported
        assert!(is_undefined(r_type(0b0101111, 1, 0b010, 2, 3, 0)));
        assert!(is_undefined(0));
    }

    #[test]
    fn test_ecall_services_syscall() {
        let mut core = core_with(&[0x0000_0073]);
        core.registers_mut().set_x(x(17), 93);
        core.registers_mut().set_x(x(10), 3);
        core.step().unwrap();
        assert_eq!(Some(3), core.exit_code());
    }

    #[test]
    fn test_dispatches_each_format() {
        let mut core = core_with(&[
            u_type(opcode::LUI, 5, 0x8000),                        // lui x5, 0x8
            i_type(opcode::OP_IMM, 6, 0b000, 5, 8),                // addi x6, x5, 8
            r_type(opcode::OP, 7, 0b000, 5, 6, 0b0100000),         // sub x7, x5, x6
            r_type(opcode::OP, 8, 0b000, 6, 6, 0b0000001),         // mul x8, x6, x6
            i_type(opcode::OP_IMM, 9, 0b101, 7, 0x400 | 63),       // srai x9, x7, 63
            s_type(opcode::STORE, 0b011, 5, 6, 16),                // sd x6, 16(x5)
            i_type(opcode::LOAD, 10, 0b011, 5, 16),                // ld x10, 16(x5)
            b_type(0b001, 10, 6, 8),                               // bne x10, x6, +8
            j_type(11, 8),                                         // jal x11, +8
            0xFFFF_FFFF,
            r_type(opcode::OP_FP, 1, 0b000, 6, 0, 0x69),           // fcvt.d.w f1, x6
            r4_type(opcode::MADD, 2, 0b111, 1, 1, 1, 1),           // fmadd.d f2, f1, f1, f1
            r_type(opcode::OP_FP, 12, 0b001, 2, 0, 0x61),          // fcvt.w.d x12, f2, rtz
        ]);
        for _ in 0..12 {
            core.step().unwrap();
        }
        let registers = core.registers();
        assert_eq!(0x8008, registers.x(x(6)));
        assert_eq!(-8i64 as u64, registers.x(x(7)));
        assert_eq!(0x8008 * 0x8008, registers.x(x(8)));
        assert_eq!(u64::MAX, registers.x(x(9)));
        assert_eq!(0x8008, registers.x(x(10)));
        assert_eq!(BASE + 9 * 4, registers.x(x(11)));
        assert_eq!(0x8008 * 0x8008 + 0x8008, registers.x(x(12)));
        assert_eq!(BASE + 13 * 4, registers.pc());
    }
}
