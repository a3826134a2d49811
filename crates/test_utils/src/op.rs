//! Op codes understood by [TestInterpreter](crate::TestInterpreter), with helpers for making
//! instructions
//!
//! Register/constant operands (`RK`) refer to a constant when [CONSTANT] is set.

use wisp_runtime::Instruction;

/// `R(A) := R(B)`
pub const MOVE: u8 = 0;
/// `R(A) := K(Bx)`
pub const LOADK: u8 = 1;
/// `R(A), ..., R(A+B) := nil`
pub const LOADNIL: u8 = 4;
/// `R(A) := UpValue[B]`
pub const GETUPVAL: u8 = 5;
/// `UpValue[B] := R(A)`
pub const SETUPVAL: u8 = 9;
/// `R(A) := RK(B) + RK(C)`
pub const ADD: u8 = 13;
/// `R(A) := RK(B) - RK(C)`
pub const SUB: u8 = 14;
/// `pc += sBx`, and if A is non-zero then upvalues at or above `R(A-1)` are closed
pub const JMP: u8 = 23;
/// `if (RK(B) == RK(C)) != A then pc++`
pub const EQ: u8 = 24;
/// `R(A), ..., R(A+C-2) := R(A)(R(A+1), ..., R(A+B-1))`
pub const CALL: u8 = 29;
/// `return R(A)(R(A+1), ..., R(A+B-1))`
pub const TAILCALL: u8 = Instruction::TAIL_CALL;
/// `return R(A), ..., R(A+B-2)`
pub const RETURN: u8 = 31;
/// `R(A) := closure(KPROTO[Bx])`
pub const CLOSURE: u8 = 37;
/// `R(A), R(A+1), ..., R(A+B-2) := vararg`
pub const VARARG: u8 = 38;

/// The flag that marks an `RK` operand as a constant index
pub const CONSTANT: u32 = 1 << 8;

/// Makes an instruction with A, B, and C operands
pub fn abc(op: u8, a: u32, b: u32, c: u32) -> Instruction {
    Instruction::abc(op, a, b, c)
}

/// Makes an instruction with A and Bx operands
pub fn abx(op: u8, a: u32, bx: u32) -> Instruction {
    Instruction::abx(op, a, bx)
}

/// Makes an instruction with A and signed Bx operands
pub fn asbx(op: u8, a: u32, sbx: i32) -> Instruction {
    Instruction::asbx(op, a, sbx)
}

/// Marks a constant index as an `RK` operand
pub fn k(index: u32) -> u32 {
    index | CONSTANT
}
