//! Single and double precision floating point instructions (F and D extensions).
//!
//! The `f` registers only ever hold raw bit patterns. Values are reinterpreted per instruction
//! with [`f32::from_bits`] and [`f64::from_bits`]. Single precision values live in the low 32 bits
//! and are NaN-boxed (upper 32 bits all ones) when written.
//!
//! Arithmetic uses the host's round-to-nearest-even. Only conversions to integers honor the
//! instruction's rounding mode, and no exception flags are accrued.

use super::execute::{sign_extend_word, Executor};
use super::fcsr::RoundingMode;
use super::{ExecutionResult, Retired};
use crate::registers::Specifier;

const CANONICAL_NAN_S: u32 = 0x7FC0_0000;
const CANONICAL_NAN_D: u64 = 0x7FF8_0000_0000_0000;
const NAN_BOX: u64 = 0xFFFF_FFFF_0000_0000;

const SIGN_S: u32 = 1 << 31;
const SIGN_D: u64 = 1 << 63;

/// Destination integer type of a float-to-integer conversion.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum IntFormat {
    W,
    Wu,
    L,
    Lu,
}

impl IntFormat {
    /// Selects the integer format from the rs2 field of `fcvt` instructions.
    fn from_rs2(rs2: Specifier) -> Option<Self> {
        match u8::from(rs2) {
            0 => Some(Self::W),
            1 => Some(Self::Wu),
            2 => Some(Self::L),
            3 => Some(Self::Lu),
            _ => None,
        }
    }
}

impl<'a> Executor<'a> {
    /// Executes a `flw` instruction.
    ///
    /// > The FLW instruction loads a single-precision floating-point value from memory into
    /// > floating-point register rd. FLW and FSW are only guaranteed to execute atomically if the
    /// > effective address is naturally aligned.
    pub fn flw(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        let address = self.registers.x(base).wrapping_add_signed(offset);
        let bits = self.memory.read_word(address)?;
        self.registers.set_f(dest, nan_box(bits));
        Ok(Retired::Normal)
    }

    pub fn fld(&mut self, dest: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        let address = self.registers.x(base).wrapping_add_signed(offset);
        let bits = self.memory.read_doubleword(address)?;
        self.registers.set_f(dest, bits);
        Ok(Retired::Normal)
    }

    /// Executes a `fsw` instruction, storing the low 32 bits of `src`.
    pub fn fsw(&mut self, src: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        let address = self.registers.x(base).wrapping_add_signed(offset);
        self.memory
            .write_word(address, self.registers.f(src) as u32)?;
        Ok(Retired::Normal)
    }

    pub fn fsd(&mut self, src: Specifier, base: Specifier, offset: i64) -> ExecutionResult {
        let address = self.registers.x(base).wrapping_add_signed(offset);
        self.memory.write_doubleword(address, self.registers.f(src))?;
        Ok(Retired::Normal)
    }

    pub fn fadd_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_s(dest, src1, src2, |a, b| a + b)
    }

    pub fn fsub_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_s(dest, src1, src2, |a, b| a - b)
    }

    pub fn fmul_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_s(dest, src1, src2, |a, b| a * b)
    }

    pub fn fdiv_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_s(dest, src1, src2, |a, b| a / b)
    }

    pub fn fsqrt_s(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let result = self.f32(src).sqrt();
        self.set_f32(dest, result)
    }

    /// Executes a `fmin.s` instruction.
    ///
    /// > Floating-point minimum-number and maximum-number instructions FMIN.S and FMAX.S write,
    /// > respectively, the smaller or larger of rs1 and rs2 to rd. For the purposes of these
    /// > instructions only, the value −0.0 is considered to be less than the value +0.0. If both
    /// > inputs are NaNs, the result is the canonical NaN. If only one operand is a NaN, the
    /// > result is the non-NaN operand.
    pub fn fmin_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        // Widening is exact, so comparing as doubles gives the same answer
        self.binary_op_s(dest, src1, src2, |a, b| minimum(a as f64, b as f64) as f32)
    }

    pub fn fmax_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_s(dest, src1, src2, |a, b| maximum(a as f64, b as f64) as f32)
    }

    /// Executes a `fmadd.s` instruction.
    ///
    /// > FMADD.S multiplies the values in rs1 and rs2, adds the value in rs3, and writes the final
    /// > result to rd. FMADD.S computes (rs1×rs2)+rs3.
    pub fn fmadd_s(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f32(src1), self.f32(src2), self.f32(src3));
        self.set_f32(dest, a.mul_add(b, c))
    }

    /// Executes a `fmsub.s` instruction, computing (rs1×rs2)-rs3.
    pub fn fmsub_s(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f32(src1), self.f32(src2), self.f32(src3));
        self.set_f32(dest, a.mul_add(b, -c))
    }

    /// Executes a `fnmsub.s` instruction, computing -(rs1×rs2)+rs3.
    pub fn fnmsub_s(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f32(src1), self.f32(src2), self.f32(src3));
        self.set_f32(dest, (-a).mul_add(b, c))
    }

    /// Executes a `fnmadd.s` instruction, computing -(rs1×rs2)-rs3.
    pub fn fnmadd_s(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f32(src1), self.f32(src2), self.f32(src3));
        self.set_f32(dest, (-a).mul_add(b, -c))
    }

    /// Executes a `fsgnj.s` instruction.
    ///
    /// > FSGNJ.S, FSGNJN.S, and FSGNJX.S produce a result that takes all bits except the sign bit
    /// > from rs1. For FSGNJ, the result's sign bit is rs2's sign bit; for FSGNJN, the result's
    /// > sign bit is the opposite of rs2's sign bit; and for FSGNJX, the sign bit is the XOR of
    /// > the sign bits of rs1 and rs2.
    pub fn fsgnj_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.sign_op_s(dest, src1, src2, |a, b| (a & !SIGN_S) | (b & SIGN_S))
    }

    pub fn fsgnjn_s(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.sign_op_s(dest, src1, src2, |a, b| (a & !SIGN_S) | (!b & SIGN_S))
    }

    pub fn fsgnjx_s(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.sign_op_s(dest, src1, src2, |a, b| a ^ (b & SIGN_S))
    }

    /// Executes a `feq.s` instruction.
    ///
    /// > FEQ.S performs a quiet comparison: it only sets the invalid operation exception flag if
    /// > either input is a signaling NaN. For all three instructions, the result is 0 if either
    /// > operand is NaN.
    pub fn feq_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        let result = self.f32(src1) == self.f32(src2);
        self.registers.set_x(dest, result as u64);
        Ok(Retired::Normal)
    }

    pub fn flt_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        let result = self.f32(src1) < self.f32(src2);
        self.registers.set_x(dest, result as u64);
        Ok(Retired::Normal)
    }

    pub fn fle_s(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        let result = self.f32(src1) <= self.f32(src2);
        self.registers.set_x(dest, result as u64);
        Ok(Retired::Normal)
    }

    /// Executes a `fclass.s` instruction.
    ///
    /// > The FCLASS.S instruction examines the value in floating-point register rs1 and writes to
    /// > integer register rd a 10-bit mask that indicates the class of the floating-point number.
    pub fn fclass_s(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let mask = fclass_mask(self.registers.f(src) & 0xFFFF_FFFF, 8, 23);
        self.registers.set_x(dest, mask);
        Ok(Retired::Normal)
    }

    /// Executes one of `fcvt.w.s`, `fcvt.wu.s`, `fcvt.l.s` and `fcvt.lu.s`, depending on the
    /// rs2 field.
    ///
    /// > If the rounded result is not representable in the destination format, it is clipped to
    /// > the nearest value and the invalid flag is set.
    pub fn fcvt_int_s(
        &mut self,
        dest: Specifier,
        src: Specifier,
        variant: Specifier,
        rm: u8,
    ) -> ExecutionResult {
        let value = self.f32(src) as f64;
        self.convert_to_int(dest, value, variant, rm)
    }

    /// Executes one of `fcvt.w.d`, `fcvt.wu.d`, `fcvt.l.d` and `fcvt.lu.d`, depending on the
    /// rs2 field.
    pub fn fcvt_int_d(
        &mut self,
        dest: Specifier,
        src: Specifier,
        variant: Specifier,
        rm: u8,
    ) -> ExecutionResult {
        let value = self.f64(src);
        self.convert_to_int(dest, value, variant, rm)
    }

    /// Executes one of `fcvt.s.w`, `fcvt.s.wu`, `fcvt.s.l` and `fcvt.s.lu`, depending on the
    /// rs2 field.
    pub fn fcvt_s_int(
        &mut self,
        dest: Specifier,
        src: Specifier,
        variant: Specifier,
    ) -> ExecutionResult {
        let value = self.registers.x(src);
        let result = match IntFormat::from_rs2(variant).ok_or_else(|| self.undefined())? {
            IntFormat::W => value as i32 as f32,
            IntFormat::Wu => value as u32 as f32,
            IntFormat::L => value as i64 as f32,
            IntFormat::Lu => value as f32,
        };
        self.set_f32(dest, result)
    }

    /// Executes one of `fcvt.d.w`, `fcvt.d.wu`, `fcvt.d.l` and `fcvt.d.lu`, depending on the
    /// rs2 field.
    pub fn fcvt_d_int(
        &mut self,
        dest: Specifier,
        src: Specifier,
        variant: Specifier,
    ) -> ExecutionResult {
        let value = self.registers.x(src);
        let result = match IntFormat::from_rs2(variant).ok_or_else(|| self.undefined())? {
            IntFormat::W => value as i32 as f64,
            IntFormat::Wu => value as u32 as f64,
            IntFormat::L => value as i64 as f64,
            IntFormat::Lu => value as f64,
        };
        self.set_f64(dest, result)
    }

    /// Executes a `fcvt.s.d` instruction.
    pub fn fcvt_s_d(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let result = self.f64(src) as f32;
        self.set_f32(dest, result)
    }

    /// Executes a `fcvt.d.s` instruction. Widening is always exact.
    pub fn fcvt_d_s(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let result = self.f32(src) as f64;
        self.set_f64(dest, result)
    }

    /// Executes a `fmv.x.w` instruction.
    ///
    /// > FMV.X.W moves the single-precision value in floating-point register rs1 represented in
    /// > IEEE 754-2008 encoding to the lower 32 bits of integer register rd. The bits are not
    /// > modified in the transfer, and in particular, the payloads of non-canonical NaNs are
    /// > preserved. For RV64, the higher 32 bits of the destination register are filled with
    /// > copies of the floating-point number's sign bit.
    pub fn fmv_x_w(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let bits = self.registers.f(src) as u32;
        self.registers.set_x(dest, sign_extend_word(bits));
        Ok(Retired::Normal)
    }

    /// Executes a `fmv.w.x` instruction.
    ///
    /// > FMV.W.X moves the single-precision value encoded in IEEE 754-2008 standard encoding from
    /// > the lower 32 bits of integer register rs1 to the floating-point register rd.
    pub fn fmv_w_x(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let bits = self.registers.x(src) as u32;
        self.registers.set_f(dest, nan_box(bits));
        Ok(Retired::Normal)
    }

    pub fn fadd_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_d(dest, src1, src2, |a, b| a + b)
    }

    pub fn fsub_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_d(dest, src1, src2, |a, b| a - b)
    }

    pub fn fmul_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_d(dest, src1, src2, |a, b| a * b)
    }

    pub fn fdiv_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_d(dest, src1, src2, |a, b| a / b)
    }

    pub fn fsqrt_d(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let result = self.f64(src).sqrt();
        self.set_f64(dest, result)
    }

    pub fn fmin_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_d(dest, src1, src2, minimum)
    }

    pub fn fmax_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.binary_op_d(dest, src1, src2, maximum)
    }

    pub fn fmadd_d(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f64(src1), self.f64(src2), self.f64(src3));
        self.set_f64(dest, a.mul_add(b, c))
    }

    pub fn fmsub_d(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f64(src1), self.f64(src2), self.f64(src3));
        self.set_f64(dest, a.mul_add(b, -c))
    }

    pub fn fnmsub_d(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f64(src1), self.f64(src2), self.f64(src3));
        self.set_f64(dest, (-a).mul_add(b, c))
    }

    pub fn fnmadd_d(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        src3: Specifier,
    ) -> ExecutionResult {
        let (a, b, c) = (self.f64(src1), self.f64(src2), self.f64(src3));
        self.set_f64(dest, (-a).mul_add(b, -c))
    }

    pub fn fsgnj_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        self.sign_op_d(dest, src1, src2, |a, b| (a & !SIGN_D) | (b & SIGN_D))
    }

    pub fn fsgnjn_d(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.sign_op_d(dest, src1, src2, |a, b| (a & !SIGN_D) | (!b & SIGN_D))
    }

    pub fn fsgnjx_d(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    ) -> ExecutionResult {
        self.sign_op_d(dest, src1, src2, |a, b| a ^ (b & SIGN_D))
    }

    pub fn feq_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        let result = self.f64(src1) == self.f64(src2);
        self.registers.set_x(dest, result as u64);
        Ok(Retired::Normal)
    }

    pub fn flt_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        let result = self.f64(src1) < self.f64(src2);
        self.registers.set_x(dest, result as u64);
        Ok(Retired::Normal)
    }

    pub fn fle_d(&mut self, dest: Specifier, src1: Specifier, src2: Specifier) -> ExecutionResult {
        let result = self.f64(src1) <= self.f64(src2);
        self.registers.set_x(dest, result as u64);
        Ok(Retired::Normal)
    }

    pub fn fclass_d(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let mask = fclass_mask(self.registers.f(src), 11, 52);
        self.registers.set_x(dest, mask);
        Ok(Retired::Normal)
    }

    pub fn fmv_x_d(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let bits = self.registers.f(src);
        self.registers.set_x(dest, bits);
        Ok(Retired::Normal)
    }

    pub fn fmv_d_x(&mut self, dest: Specifier, src: Specifier) -> ExecutionResult {
        let bits = self.registers.x(src);
        self.registers.set_f(dest, bits);
        Ok(Retired::Normal)
    }

    /// Reads the single precision value held in the low 32 bits of an `f` register.
    fn f32(&self, src: Specifier) -> f32 {
        f32::from_bits(self.registers.f(src) as u32)
    }

    fn f64(&self, src: Specifier) -> f64 {
        f64::from_bits(self.registers.f(src))
    }

    /// NaN-boxes `value` into an `f` register, replacing any NaN by the canonical NaN.
    fn set_f32(&mut self, dest: Specifier, value: f32) -> ExecutionResult {
        let bits = if value.is_nan() {
            CANONICAL_NAN_S
        } else {
            value.to_bits()
        };
        self.registers.set_f(dest, nan_box(bits));
        Ok(Retired::Normal)
    }

    fn set_f64(&mut self, dest: Specifier, value: f64) -> ExecutionResult {
        let bits = if value.is_nan() {
            CANONICAL_NAN_D
        } else {
            value.to_bits()
        };
        self.registers.set_f(dest, bits);
        Ok(Retired::Normal)
    }

    #[inline]
    fn binary_op_s<F>(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(f32, f32) -> f32,
    {
        let result = op(self.f32(src1), self.f32(src2));
        self.set_f32(dest, result)
    }

    #[inline]
    fn binary_op_d<F>(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let result = op(self.f64(src1), self.f64(src2));
        self.set_f64(dest, result)
    }

    // Sign injection works on raw bits, NaN payloads pass through untouched.
    fn sign_op_s<F>(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(u32, u32) -> u32,
    {
        let bits = op(self.registers.f(src1) as u32, self.registers.f(src2) as u32);
        self.registers.set_f(dest, nan_box(bits));
        Ok(Retired::Normal)
    }

    fn sign_op_d<F>(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(u64, u64) -> u64,
    {
        let bits = op(self.registers.f(src1), self.registers.f(src2));
        self.registers.set_f(dest, bits);
        Ok(Retired::Normal)
    }

    /// Rounds `value` with the instruction's rounding mode and saturates it into the integer
    /// format selected by `variant`. NaN converts to the largest representable value.
    fn convert_to_int(
        &mut self,
        dest: Specifier,
        value: f64,
        variant: Specifier,
        rm: u8,
    ) -> ExecutionResult {
        let format = IntFormat::from_rs2(variant).ok_or_else(|| self.undefined())?;
        let mode =
            RoundingMode::resolve(rm, self.registers.fcsr()).ok_or_else(|| self.undefined())?;
        let rounded = mode.round(value);
        // `as` saturates out of range values
        let result = match (format, value.is_nan()) {
            (IntFormat::W, true) => sign_extend_word(i32::MAX as u32),
            (IntFormat::W, false) => rounded as i32 as i64 as u64,
            (IntFormat::Wu, true) => sign_extend_word(u32::MAX),
            (IntFormat::Wu, false) => sign_extend_word(rounded as u32),
            (IntFormat::L, true) => i64::MAX as u64,
            (IntFormat::L, false) => rounded as i64 as u64,
            (IntFormat::Lu, true) => u64::MAX,
            (IntFormat::Lu, false) => rounded as u64,
        };
        self.registers.set_x(dest, result);
        Ok(Retired::Normal)
    }
}

fn nan_box(bits: u32) -> u64 {
    NAN_BOX | bits as u64
}

/// RISC-V `fmin`: NaN operands are ignored unless both are NaN, and -0.0 orders below +0.0.
fn minimum(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => b,
        (false, true) => a,
        _ if a == b => {
            if a.is_sign_negative() {
                a
            } else {
                b
            }
        }
        _ => a.min(b),
    }
}

/// RISC-V `fmax`, the mirror image of [`minimum`].
fn maximum(a: f64, b: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => b,
        (false, true) => a,
        _ if a == b => {
            if a.is_sign_positive() {
                a
            } else {
                b
            }
        }
        _ => a.max(b),
    }
}

/// Computes the `fclass` mask of a raw IEEE 754 value with the given field widths.
///
/// | bit | meaning                   |
/// |-----|---------------------------|
/// | 0   | negative infinity         |
/// | 1   | negative normal number    |
/// | 2   | negative subnormal number |
/// | 3   | negative zero             |
/// | 4   | positive zero             |
/// | 5   | positive subnormal number |
/// | 6   | positive normal number    |
/// | 7   | positive infinity         |
/// | 8   | signaling NaN             |
/// | 9   | quiet NaN                 |
fn fclass_mask(bits: u64, exponent_bits: u32, mantissa_bits: u32) -> u64 {
    let negative = (bits >> (exponent_bits + mantissa_bits)) & 1 == 1;
    let exponent_max = (1 << exponent_bits) - 1;
    let exponent = (bits >> mantissa_bits) & exponent_max;
    let mantissa = bits & ((1 << mantissa_bits) - 1);
    let quiet = mantissa >> (mantissa_bits - 1) == 1;
    let index = match (exponent, mantissa) {
        (e, 0) if e == exponent_max => match negative {
            true => 0,
            false => 7,
        },
        (e, _) if e == exponent_max => match quiet {
            true => 9,
            false => 8,
        },
        (0, 0) => match negative {
            true => 3,
            false => 4,
        },
        (0, _) => match negative {
            true => 2,
            false => 5,
        },
        _ => match negative {
            true => 1,
            false => 6,
        },
    };
    1 << index
}
