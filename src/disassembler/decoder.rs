//! CIL instruction decoding.
//!
//! This module provides the opcode metadata tables and [`decode_instruction`], which
//! turns raw CIL bytecode into [`Instruction`] values. Opcodes are either single-byte
//! or two-byte (`0xFE` prefix); operand lengths are a fixed per-opcode property taken
//! from the table. Opcodes outside the implemented subset fail with
//! [`crate::Error::Unimplemented`] naming the offending bytes.
//!
//! # Example
//!
//! ```rust
//! use ilrun::{disassembler::decode_instruction, Parser};
//! let code = [0x00, 0x2A]; // nop, ret
//! let mut parser = Parser::new(&code);
//! let instr = decode_instruction(&mut parser)?;
//! assert_eq!(instr.mnemonic, "nop");
//! # Ok::<(), ilrun::Error>(())
//! ```

use crate::{
    disassembler::{
        instruction::{FlowType, Immediate, Instruction, Operand, OperandType},
        opcodes,
    },
    file::parser::Parser,
    metadata::token::Token,
    Result,
};

/// Static decoding metadata of one opcode: mnemonic, operand encoding and flow type.
#[derive(Clone, Copy)]
pub struct OpcodeDesc {
    /// The instruction mnemonic
    pub mnemonic: &'static str,
    /// The operand encoding
    pub operand: OperandType,
    /// How the instruction affects control flow
    pub flow: FlowType,
}

const fn desc(mnemonic: &'static str, operand: OperandType, flow: FlowType) -> Option<OpcodeDesc> {
    Some(OpcodeDesc {
        mnemonic,
        operand,
        flow,
    })
}

const fn single_byte_table() -> [Option<OpcodeDesc>; 256] {
    use opcodes::*;
    use FlowType::{Breakpoint, Call, Return, Sequential, UnconditionalBranch};
    use OperandType::{Float32, Float64, Int32, Int64, Int8, UInt8};

    let mut table: [Option<OpcodeDesc>; 256] = [None; 256];

    table[NOP as usize] = desc("nop", OperandType::None, Sequential);
    table[BREAK as usize] = desc("break", OperandType::None, Breakpoint);

    table[LDARG_0 as usize] = desc("ldarg.0", OperandType::None, Sequential);
    table[LDARG_1 as usize] = desc("ldarg.1", OperandType::None, Sequential);
    table[LDARG_2 as usize] = desc("ldarg.2", OperandType::None, Sequential);
    table[LDARG_3 as usize] = desc("ldarg.3", OperandType::None, Sequential);

    table[LDLOC_0 as usize] = desc("ldloc.0", OperandType::None, Sequential);
    table[LDLOC_1 as usize] = desc("ldloc.1", OperandType::None, Sequential);
    table[LDLOC_2 as usize] = desc("ldloc.2", OperandType::None, Sequential);
    table[LDLOC_3 as usize] = desc("ldloc.3", OperandType::None, Sequential);
    table[STLOC_0 as usize] = desc("stloc.0", OperandType::None, Sequential);
    table[STLOC_1 as usize] = desc("stloc.1", OperandType::None, Sequential);
    table[STLOC_2 as usize] = desc("stloc.2", OperandType::None, Sequential);
    table[STLOC_3 as usize] = desc("stloc.3", OperandType::None, Sequential);

    table[LDARG_S as usize] = desc("ldarg.s", UInt8, Sequential);
    table[STARG_S as usize] = desc("starg.s", UInt8, Sequential);
    table[LDLOC_S as usize] = desc("ldloc.s", UInt8, Sequential);
    table[LDLOCA_S as usize] = desc("ldloca.s", UInt8, Sequential);
    table[STLOC_S as usize] = desc("stloc.s", UInt8, Sequential);

    table[LDC_I4_M1 as usize] = desc("ldc.i4.m1", OperandType::None, Sequential);
    table[LDC_I4_0 as usize] = desc("ldc.i4.0", OperandType::None, Sequential);
    table[LDC_I4_1 as usize] = desc("ldc.i4.1", OperandType::None, Sequential);
    table[LDC_I4_2 as usize] = desc("ldc.i4.2", OperandType::None, Sequential);
    table[LDC_I4_3 as usize] = desc("ldc.i4.3", OperandType::None, Sequential);
    table[LDC_I4_4 as usize] = desc("ldc.i4.4", OperandType::None, Sequential);
    table[LDC_I4_5 as usize] = desc("ldc.i4.5", OperandType::None, Sequential);
    table[LDC_I4_6 as usize] = desc("ldc.i4.6", OperandType::None, Sequential);
    table[LDC_I4_7 as usize] = desc("ldc.i4.7", OperandType::None, Sequential);
    table[LDC_I4_8 as usize] = desc("ldc.i4.8", OperandType::None, Sequential);
    table[LDC_I4_S as usize] = desc("ldc.i4.s", Int8, Sequential);
    table[LDC_I4 as usize] = desc("ldc.i4", Int32, Sequential);
    table[LDC_I8 as usize] = desc("ldc.i8", Int64, Sequential);
    table[LDC_R4 as usize] = desc("ldc.r4", Float32, Sequential);
    table[LDC_R8 as usize] = desc("ldc.r8", Float64, Sequential);

    table[POP as usize] = desc("pop", OperandType::None, Sequential);

    table[CALL as usize] = desc("call", OperandType::Token, Call);
    table[RET as usize] = desc("ret", OperandType::None, Return);

    table[BR_S as usize] = desc("br.s", Int8, UnconditionalBranch);
    table[BR as usize] = desc("br", Int32, UnconditionalBranch);

    table[LDSTR as usize] = desc("ldstr", OperandType::Token, Sequential);
    table[NEWOBJ as usize] = desc("newobj", OperandType::Token, Call);
    table[LDSFLD as usize] = desc("ldsfld", OperandType::Token, Sequential);
    table[LDSFLDA as usize] = desc("ldsflda", OperandType::Token, Sequential);
    table[STSFLD as usize] = desc("stsfld", OperandType::Token, Sequential);

    table
}

const fn two_byte_table() -> [Option<OpcodeDesc>; 256] {
    use opcodes::*;
    use FlowType::Sequential;
    use OperandType::UInt16;

    let mut table: [Option<OpcodeDesc>; 256] = [None; 256];

    table[FE_LDARG as usize] = desc("ldarg", UInt16, Sequential);
    table[FE_LDLOC as usize] = desc("ldloc", UInt16, Sequential);
    table[FE_STLOC as usize] = desc("stloc", UInt16, Sequential);

    table
}

/// Decoding metadata for single-byte opcodes, indexed by opcode byte
pub static OPCODES: [Option<OpcodeDesc>; 256] = single_byte_table();
/// Decoding metadata for `0xFE`-prefixed opcodes, indexed by the second byte
pub static OPCODES_FE: [Option<OpcodeDesc>; 256] = two_byte_table();

/// Decode a single CIL instruction from the current parser position.
///
/// Handles single-byte and `0xFE`-prefixed opcodes, reads the operand bytes the
/// opcode table names, and computes the instruction's total encoded length from the
/// cursor movement. The parser ends up positioned at the next instruction.
///
/// # Arguments
/// * `parser` - A parser positioned at the start of an instruction
///
/// # Errors
/// Returns [`crate::Error::Unimplemented`] for opcodes outside the implemented
/// subset and [`crate::Error::OutOfBounds`] for truncated operands.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let offset = parser.pos() as u64;
    let first_byte = parser.read_le::<u8>()?;

    let (cil_instruction, prefix, opcode) = match first_byte {
        opcodes::FE_PREFIX => {
            let second_byte = parser.read_le::<u8>()?;

            match &OPCODES_FE[second_byte as usize] {
                Some(instr) => (instr, opcodes::FE_PREFIX, second_byte),
                None => {
                    return Err(crate::Error::Unimplemented {
                        prefix: opcodes::FE_PREFIX,
                        opcode: second_byte,
                    })
                }
            }
        }
        _ => match &OPCODES[first_byte as usize] {
            Some(instr) => (instr, 0, first_byte),
            None => {
                return Err(crate::Error::Unimplemented {
                    prefix: 0,
                    opcode: first_byte,
                })
            }
        },
    };

    let operand = match cil_instruction.operand {
        OperandType::None => Operand::None,
        OperandType::Int8 => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandType::UInt8 => Operand::Immediate(Immediate::UInt8(parser.read_le::<u8>()?)),
        OperandType::UInt16 => Operand::Immediate(Immediate::UInt16(parser.read_le::<u16>()?)),
        OperandType::Int32 => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandType::Int64 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandType::Float32 => Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?)),
        OperandType::Float64 => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandType::Token => Operand::Token(Token::new(parser.read_le::<u32>()?)),
    };

    let size = parser.pos() as u64 - offset;

    Ok(Instruction {
        offset,
        size,
        opcode,
        prefix,
        mnemonic: cil_instruction.mnemonic,
        flow_type: cil_instruction.flow,
        operand,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn decode_basic() {
        let mut parser = Parser::new(&[0x00, 0x2A]);

        let nop = decode_instruction(&mut parser).unwrap();
        assert_eq!(nop.mnemonic, "nop");
        assert_eq!(nop.offset, 0);
        assert_eq!(nop.size, 1);
        assert_eq!(nop.prefix, 0);
        assert_eq!(nop.flow_type, FlowType::Sequential);
        assert!(matches!(nop.operand, Operand::None));

        let ret = decode_instruction(&mut parser).unwrap();
        assert_eq!(ret.mnemonic, "ret");
        assert_eq!(ret.offset, 1);
        assert_eq!(ret.flow_type, FlowType::Return);
    }

    #[test]
    fn decode_immediates() {
        // ldc.i4.s -5
        let mut parser = Parser::new(&[0x1F, 0xFB]);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "ldc.i4.s");
        assert_eq!(instr.size, 2);
        assert_eq!(instr.i32_operand(), Some(-5));

        // ldc.i4 0x12345678
        let mut parser = Parser::new(&[0x20, 0x78, 0x56, 0x34, 0x12]);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "ldc.i4");
        assert_eq!(instr.size, 5);
        assert_eq!(instr.i32_operand(), Some(0x1234_5678));

        // ldc.r8 1.5
        let mut code = vec![0x23];
        code.extend_from_slice(&1.5f64.to_le_bytes());
        let mut parser = Parser::new(&code);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "ldc.r8");
        assert_eq!(instr.size, 9);
        assert_eq!(instr.f64_operand(), Some(1.5));
    }

    #[test]
    fn decode_branch() {
        // br.s +10
        let mut parser = Parser::new(&[0x2B, 0x0A]);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "br.s");
        assert_eq!(instr.flow_type, FlowType::UnconditionalBranch);
        assert_eq!(instr.branch_operand(), Some(10));

        // br -2
        let mut parser = Parser::new(&[0x38, 0xFE, 0xFF, 0xFF, 0xFF]);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "br");
        assert_eq!(instr.branch_operand(), Some(-2));
    }

    #[test]
    fn decode_token() {
        // ldstr 0x70000001
        let mut parser = Parser::new(&[0x72, 0x01, 0x00, 0x00, 0x70]);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "ldstr");
        assert_eq!(instr.size, 5);
        assert_eq!(instr.token_operand().unwrap().value(), 0x7000_0001);
    }

    #[test]
    fn decode_two_byte() {
        // ldloc 0x0102
        let mut parser = Parser::new(&[0xFE, 0x0C, 0x02, 0x01]);
        let instr = decode_instruction(&mut parser).unwrap();
        assert_eq!(instr.mnemonic, "ldloc");
        assert_eq!(instr.prefix, 0xFE);
        assert_eq!(instr.opcode, 0x0C);
        assert_eq!(instr.size, 4);
        assert_eq!(instr.index_operand(), Some(0x0102));
    }

    #[test]
    fn decode_unimplemented() {
        let mut parser = Parser::new(&[0xFF]);
        let result = decode_instruction(&mut parser);
        assert!(matches!(
            result,
            Err(Error::Unimplemented {
                prefix: 0,
                opcode: 0xFF
            })
        ));

        let mut parser = Parser::new(&[0xFE, 0x01]);
        let result = decode_instruction(&mut parser);
        assert!(matches!(
            result,
            Err(Error::Unimplemented {
                prefix: 0xFE,
                opcode: 0x01
            })
        ));
    }

    #[test]
    fn decode_truncated_operand() {
        let mut parser = Parser::new(&[0x20, 0x01]);
        assert!(decode_instruction(&mut parser).is_err());
    }
}
