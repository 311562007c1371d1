use bitvec::{field::BitField, order::Lsb0, view::BitView};

/// Floating-Point Control and Status Register (fcsr).
///
/// > The floating-point control and status register, fcsr, is a RISC-V control and status register
/// > (CSR). It is a 32-bit read/write register that selects the dynamic rounding mode for
/// > floating-point arithmetic operations and holds the accrued exception flags.
///
/// Exception flags are stored when software writes them, but are never raised by arithmetic.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Fcsr(u32);

impl Fcsr {
    const FFLAGS: std::ops::Range<usize> = 0..5;
    const FRM: std::ops::Range<usize> = 5..8;

    /// Only the low 8 bits are defined, the rest are read-only zero.
    const MASK: u32 = 0xFF;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn read(&self) -> u32 {
        self.0
    }

    pub fn write(&mut self, value: u32) {
        self.0 = value & Self::MASK;
    }

    /// Accrued exception flags (NV, DZ, OF, UF, NX).
    pub fn fflags(&self) -> u32 {
        self.0.view_bits::<Lsb0>()[Self::FFLAGS].load_le::<u32>()
    }

    pub fn write_fflags(&mut self, value: u32) {
        self.0.view_bits_mut::<Lsb0>()[Self::FFLAGS].store_le(value & 0x1F);
    }

    /// Raw dynamic rounding mode field.
    pub fn frm(&self) -> u32 {
        self.0.view_bits::<Lsb0>()[Self::FRM].load_le::<u32>()
    }

    pub fn write_frm(&mut self, value: u32) {
        self.0.view_bits_mut::<Lsb0>()[Self::FRM].store_le(value & 0b111);
    }
}

/// Static rounding modes encoded in the `rm` field of floating point instructions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RoundingMode {
    /// Round to Nearest, ties to Even
    Rne,
    /// Round towards Zero
    Rtz,
    /// Round Down (towards negative infinity)
    Rdn,
    /// Round Up (towards positive infinity)
    Rup,
    /// Round to Nearest, ties to Max Magnitude
    Rmm,
}

impl RoundingMode {
    /// Decodes a 3-bit rounding mode. `0b111` (DYN) is resolved through `fcsr`. Returns `None` for
    /// the reserved encodings.
    pub fn resolve(rm: u8, fcsr: &Fcsr) -> Option<Self> {
        match rm {
            0b000 => Some(Self::Rne),
            0b001 => Some(Self::Rtz),
            0b010 => Some(Self::Rdn),
            0b011 => Some(Self::Rup),
            0b100 => Some(Self::Rmm),
            0b111 => match fcsr.frm() as u8 {
                0b111 => None,
                frm => Self::resolve(frm, fcsr),
            },
            _ => None,
        }
    }

    /// Rounds `value` to an integral value according to this mode.
    pub fn round(self, value: f64) -> f64 {
        match self {
            Self::Rne => value.round_ties_even(),
            Self::Rtz => value.trunc(),
            Self::Rdn => value.floor(),
            Self::Rup => value.ceil(),
            // `f64::round` rounds half-way cases away from zero
            Self::Rmm => value.round(),
        }
    }
}
