//! CIL (Common Intermediate Language) instruction decoding.
//!
//! This module turns raw CIL bytecode into structured [`Instruction`] values. It
//! implements the opcode subset the interpreter executes, with fixed per-opcode
//! operand widths; anything outside the subset surfaces as
//! [`crate::Error::Unimplemented`].
//!
//! # Key Types
//! - [`Instruction`] - A decoded CIL instruction
//! - [`Operand`] / [`Immediate`] - Instruction operands
//! - [`FlowType`] - How instructions affect control flow
//! - [`decode_instruction`] - Decode a single instruction
//!
//! # Example
//! ```rust
//! use ilrun::{disassembler::decode_instruction, Parser};
//! let bytecode = &[0x00, 0x2A]; // nop, ret
//! let mut parser = Parser::new(bytecode);
//! let instruction = decode_instruction(&mut parser)?;
//! assert_eq!(instruction.mnemonic, "nop");
//! # Ok::<(), ilrun::Error>(())
//! ```

mod decoder;
mod instruction;
/// CIL opcode byte constants.
pub mod opcodes;

pub use decoder::{decode_instruction, OpcodeDesc, OPCODES, OPCODES_FE};
pub use instruction::{FlowType, Immediate, Instruction, Operand, OperandType};
