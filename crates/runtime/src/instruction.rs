use std::fmt;

/// A 32 bit bytecode instruction word
///
/// The runtime doesn't decode instructions itself, that's the job of the bytecode loop
/// (see [Execute](crate::Execute)). The layout is shared so that the call protocol can detect
/// when a call was made from a tail-call instruction.
///
/// ```text
///  31      23 22      14 13     6 5    0
/// |    B     |    C     |   A    |  op  |
/// |         Bx          |   A    |  op  |
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    /// The op code used for tail calls
    pub const TAIL_CALL: u8 = 30;

    const SIZE_OP: u32 = 6;
    const SIZE_A: u32 = 8;
    const SIZE_B: u32 = 9;
    const SIZE_C: u32 = 9;
    const SIZE_BX: u32 = Self::SIZE_B + Self::SIZE_C;
    const POS_A: u32 = Self::SIZE_OP;
    const POS_C: u32 = Self::POS_A + Self::SIZE_A;
    const POS_B: u32 = Self::POS_C + Self::SIZE_C;
    const POS_BX: u32 = Self::POS_C;

    /// The largest value that can be stored in the Bx field
    pub const MAX_BX: u32 = (1 << Self::SIZE_BX) - 1;
    /// The offset applied to the Bx field when it's used as a signed value
    pub const MAX_SBX: i32 = (Self::MAX_BX >> 1) as i32;

    /// Makes an instruction with A, B, and C fields
    pub const fn abc(op: u8, a: u32, b: u32, c: u32) -> Self {
        Self(
            (op as u32 & mask(Self::SIZE_OP))
                | ((a & mask(Self::SIZE_A)) << Self::POS_A)
                | ((b & mask(Self::SIZE_B)) << Self::POS_B)
                | ((c & mask(Self::SIZE_C)) << Self::POS_C),
        )
    }

    /// Makes an instruction with A and Bx fields
    pub const fn abx(op: u8, a: u32, bx: u32) -> Self {
        Self(
            (op as u32 & mask(Self::SIZE_OP))
                | ((a & mask(Self::SIZE_A)) << Self::POS_A)
                | ((bx & mask(Self::SIZE_BX)) << Self::POS_BX),
        )
    }

    /// Makes an instruction with A and signed Bx fields
    pub const fn asbx(op: u8, a: u32, sbx: i32) -> Self {
        Self::abx(op, a, (sbx + Self::MAX_SBX) as u32)
    }

    /// The instruction's op code
    pub const fn op_code(self) -> u8 {
        (self.0 & mask(Self::SIZE_OP)) as u8
    }

    /// The A field
    pub const fn a(self) -> usize {
        ((self.0 >> Self::POS_A) & mask(Self::SIZE_A)) as usize
    }

    /// The B field
    pub const fn b(self) -> usize {
        ((self.0 >> Self::POS_B) & mask(Self::SIZE_B)) as usize
    }

    /// The C field
    pub const fn c(self) -> usize {
        ((self.0 >> Self::POS_C) & mask(Self::SIZE_C)) as usize
    }

    /// The Bx field
    pub const fn bx(self) -> usize {
        ((self.0 >> Self::POS_BX) & mask(Self::SIZE_BX)) as usize
    }

    /// The Bx field interpreted as a signed value
    pub const fn sbx(self) -> isize {
        self.bx() as isize - Self::MAX_SBX as isize
    }

    /// True if this is a tail-call instruction
    pub const fn is_tail_call(self) -> bool {
        self.op_code() == Self::TAIL_CALL
    }
}

const fn mask(size: u32) -> u32 {
    (1 << size) - 1
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>2}] a: {} b: {} c: {}",
            self.op_code(),
            self.a(),
            self.b(),
            self.c()
        )
    }
}
