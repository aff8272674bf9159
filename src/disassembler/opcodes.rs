//! CIL opcode byte constants (ECMA-335).
//!
//! This module provides the raw byte values for the CIL opcodes the interpreter
//! executes. Single-byte opcodes are named after their mnemonic (e.g. [`CALL`] =
//! `0x28`). Two-byte opcodes that use the `0xFE` prefix have their second byte stored
//! with an `FE_` prefix (e.g. [`FE_LDLOC`] = `0x0C` for the `ldloc` instruction
//! `0xFE 0x0C`). [`FE_PREFIX`] holds the shared first byte.
#![allow(missing_docs)]

// ── Single-byte opcodes ────────────────────────────────────────────────────

// Misc
pub const NOP: u8 = 0x00;
pub const BREAK: u8 = 0x01;

// Load argument shorthand
pub const LDARG_0: u8 = 0x02;
pub const LDARG_1: u8 = 0x03;
pub const LDARG_2: u8 = 0x04;
pub const LDARG_3: u8 = 0x05;

// Load/store local shorthand
pub const LDLOC_0: u8 = 0x06;
pub const LDLOC_1: u8 = 0x07;
pub const LDLOC_2: u8 = 0x08;
pub const LDLOC_3: u8 = 0x09;
pub const STLOC_0: u8 = 0x0A;
pub const STLOC_1: u8 = 0x0B;
pub const STLOC_2: u8 = 0x0C;
pub const STLOC_3: u8 = 0x0D;

// Load/store argument/local (short form)
pub const LDARG_S: u8 = 0x0E;
pub const STARG_S: u8 = 0x10;
pub const LDLOC_S: u8 = 0x11;
pub const LDLOCA_S: u8 = 0x12;
pub const STLOC_S: u8 = 0x13;

// Constant loaders
pub const LDC_I4_M1: u8 = 0x15;
pub const LDC_I4_0: u8 = 0x16;
pub const LDC_I4_1: u8 = 0x17;
pub const LDC_I4_2: u8 = 0x18;
pub const LDC_I4_3: u8 = 0x19;
pub const LDC_I4_4: u8 = 0x1A;
pub const LDC_I4_5: u8 = 0x1B;
pub const LDC_I4_6: u8 = 0x1C;
pub const LDC_I4_7: u8 = 0x1D;
pub const LDC_I4_8: u8 = 0x1E;
pub const LDC_I4_S: u8 = 0x1F;
pub const LDC_I4: u8 = 0x20;
pub const LDC_I8: u8 = 0x21;
pub const LDC_R4: u8 = 0x22;
pub const LDC_R8: u8 = 0x23;

// Stack manipulation
pub const POP: u8 = 0x26;

// Call / return
pub const CALL: u8 = 0x28;
pub const RET: u8 = 0x2A;

// Branch
pub const BR_S: u8 = 0x2B;
pub const BR: u8 = 0x38;

// Object model
pub const LDSTR: u8 = 0x72;
pub const NEWOBJ: u8 = 0x73;
pub const LDSFLD: u8 = 0x7E;
pub const LDSFLDA: u8 = 0x7F;
pub const STSFLD: u8 = 0x80;

// ── Two-byte opcodes (0xFE prefix) ─────────────────────────────────────────

pub const FE_PREFIX: u8 = 0xFE;

pub const FE_LDARG: u8 = 0x09;
pub const FE_LDLOC: u8 = 0x0C;
pub const FE_STLOC: u8 = 0x0E;
