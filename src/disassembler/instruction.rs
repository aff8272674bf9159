use crate::metadata::token::Token;

/// The operand encoding of an opcode. Operand lengths are a fixed per-opcode property;
/// the decoder reads exactly the bytes the encoding names.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandType {
    /// No operand bytes
    None,
    /// A signed 8-bit immediate
    Int8,
    /// An unsigned 8-bit immediate
    UInt8,
    /// An unsigned 16-bit immediate
    UInt16,
    /// A signed 32-bit immediate
    Int32,
    /// A signed 64-bit immediate
    Int64,
    /// A 32-bit IEEE float
    Float32,
    /// A 64-bit IEEE float
    Float64,
    /// A 32-bit metadata token
    Token,
}

/// A decoded immediate operand value
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Immediate {
    /// A signed 8-bit value
    Int8(i8),
    /// An unsigned 8-bit value
    UInt8(u8),
    /// An unsigned 16-bit value
    UInt16(u16),
    /// A signed 32-bit value
    Int32(i32),
    /// A signed 64-bit value
    Int64(i64),
    /// A 32-bit IEEE float
    Float32(f32),
    /// A 64-bit IEEE float
    Float64(f64),
}

/// A decoded instruction operand
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Operand {
    /// The instruction has no operand
    None,
    /// An immediate value
    Immediate(Immediate),
    /// A metadata token
    Token(Token),
}

/// How an instruction affects control flow
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FlowType {
    /// Control continues at the next instruction
    Sequential,
    /// Control transfers unconditionally by a relative offset
    UnconditionalBranch,
    /// Control transfers into a callee and returns
    Call,
    /// Control returns to the caller
    Return,
    /// A debug break is delivered to the host
    Breakpoint,
}

/// A single decoded CIL instruction.
///
/// Carries the opcode bytes, the resolved mnemonic and flow type from the opcode
/// table, the decoded operand, and the instruction's offset and total encoded length
/// within the method body.
#[derive(Clone, Debug)]
pub struct Instruction {
    /// Byte offset of this instruction within the method body
    pub offset: u64,
    /// Total encoded length in bytes, including prefix and operand
    pub size: u64,
    /// The opcode byte (the second byte for `0xFE`-prefixed opcodes)
    pub opcode: u8,
    /// The prefix byte, `0xFE` for two-byte opcodes and 0 otherwise
    pub prefix: u8,
    /// The instruction mnemonic
    pub mnemonic: &'static str,
    /// How this instruction affects control flow
    pub flow_type: FlowType,
    /// The decoded operand
    pub operand: Operand,
}

impl Instruction {
    /// The token operand, if this instruction carries one
    #[must_use]
    pub fn token_operand(&self) -> Option<Token> {
        match self.operand {
            Operand::Token(token) => Some(token),
            _ => None,
        }
    }

    /// The operand as an unsigned 16-bit index (`u8` and `u16` immediates widen)
    #[must_use]
    pub fn index_operand(&self) -> Option<u16> {
        match self.operand {
            Operand::Immediate(Immediate::UInt8(value)) => Some(u16::from(value)),
            Operand::Immediate(Immediate::UInt16(value)) => Some(value),
            _ => None,
        }
    }

    /// The operand as a signed branch offset (`i8` and `i32` immediates widen)
    #[must_use]
    pub fn branch_operand(&self) -> Option<i64> {
        match self.operand {
            Operand::Immediate(Immediate::Int8(value)) => Some(i64::from(value)),
            Operand::Immediate(Immediate::Int32(value)) => Some(i64::from(value)),
            _ => None,
        }
    }

    /// The operand as an `i32` constant (`i8` immediates widen, as for `ldc.i4.s`)
    #[must_use]
    pub fn i32_operand(&self) -> Option<i32> {
        match self.operand {
            Operand::Immediate(Immediate::Int8(value)) => Some(i32::from(value)),
            Operand::Immediate(Immediate::Int32(value)) => Some(value),
            _ => None,
        }
    }

    /// The operand as an `i64` constant
    #[must_use]
    pub fn i64_operand(&self) -> Option<i64> {
        match self.operand {
            Operand::Immediate(Immediate::Int64(value)) => Some(value),
            _ => None,
        }
    }

    /// The operand as an `f64` constant (`f32` immediates widen, as for `ldc.r4`)
    #[must_use]
    pub fn f64_operand(&self) -> Option<f64> {
        match self.operand {
            Operand::Immediate(Immediate::Float32(value)) => Some(f64::from(value)),
            Operand::Immediate(Immediate::Float64(value)) => Some(value),
            _ => None,
        }
    }
}
