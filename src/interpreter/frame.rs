//! Method frames.
//!
//! A [`Frame`] is created per `call`/`newobj` and dropped on `ret`. It holds the
//! executing method's identity (registry key and token), the instruction cursor, and
//! the local variable slots. Frames reference their assembly only through the
//! registry key, never by borrow, so the registry may grow while frames are live.

use crate::{
    disassembler::{decode_instruction, Instruction},
    file::parser::Parser,
    interpreter::stack::Slot,
    metadata::token::Token,
    Error, Result,
};

/// The number of local variable slots a frame provides (indexes 0..=254)
pub const MAX_LOCALS: usize = 0xFF;

/// One method invocation: identity, instruction cursor and local variables.
///
/// The instruction sequence is a pull-based cursor: [`Frame::fetch`] decodes the
/// instruction at `instruction_offset` and advances by its encoded length; branches
/// adjust the offset between fetches via [`Frame::branch`]. Local slots are boxed so
/// their addresses (observable through `ldloca.s`) stay stable while frames move.
pub struct Frame {
    assembly: String,
    token: Token,
    instruction_offset: u64,
    locals: Vec<Option<Box<Slot>>>,
}

impl Frame {
    /// Create a frame for the given method.
    ///
    /// ## Arguments
    /// * 'assembly' - The registry key (module name) of the method's assembly
    /// * 'token'    - The `MethodDef` token of the method
    #[must_use]
    pub fn new(assembly: impl Into<String>, token: Token) -> Frame {
        let mut locals = Vec::with_capacity(MAX_LOCALS);
        locals.resize_with(MAX_LOCALS, || None);

        Frame {
            assembly: assembly.into(),
            token,
            instruction_offset: 0,
            locals,
        }
    }

    /// The registry key of the assembly this frame executes in
    #[must_use]
    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    /// The `MethodDef` token of the executing method
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// The byte offset of the next instruction within the method body
    #[must_use]
    pub fn instruction_offset(&self) -> u64 {
        self.instruction_offset
    }

    /// Add a signed offset to the instruction cursor; the offset is measured from
    /// the end of the branching instruction, which [`Frame::fetch`] has already
    /// advanced past.
    ///
    /// ## Arguments
    /// * 'offset' - The signed branch distance in bytes
    pub fn branch(&mut self, offset: i64) {
        self.instruction_offset = self.instruction_offset.wrapping_add_signed(offset);
    }

    /// Decode the next instruction of the method body, or `None` when the cursor has
    /// reached the end. Advances the cursor by the instruction's encoded length.
    ///
    /// ## Arguments
    /// * 'code' - The method's code bytes
    ///
    /// # Errors
    /// Returns an error if decoding fails or the cursor points outside the body.
    pub fn fetch(&mut self, code: &[u8]) -> Result<Option<Instruction>> {
        if self.instruction_offset >= code.len() as u64 {
            return Ok(None);
        }

        let offset = self.instruction_offset as usize;
        let mut parser = Parser::new(&code[offset..]);
        let mut instruction = decode_instruction(&mut parser)?;
        instruction.offset = self.instruction_offset;

        self.instruction_offset += instruction.size;

        Ok(Some(instruction))
    }

    /// Store a tagged slot into a local variable.
    ///
    /// ## Arguments
    /// * 'index' - The local slot index
    /// * 'slot'  - The tagged value captured from the stack
    ///
    /// # Errors
    /// Returns an error if the index is out of range.
    pub fn store_local(&mut self, index: u16, slot: Slot) -> Result<()> {
        let Some(local) = self.locals.get_mut(usize::from(index)) else {
            return Err(malformed_error!("Local variable index {} out of range", index));
        };

        match local {
            // Reuse the existing box so an address taken earlier stays valid
            Some(existing) => **existing = slot,
            None => *local = Some(Box::new(slot)),
        }

        Ok(())
    }

    /// Take the tagged slot out of a local variable, leaving the slot empty.
    ///
    /// ## Arguments
    /// * 'index' - The local slot index
    ///
    /// # Errors
    /// Returns an error if the index is out of range or the slot is empty.
    pub fn take_local(&mut self, index: u16) -> Result<Slot> {
        let Some(local) = self.locals.get_mut(usize::from(index)) else {
            return Err(malformed_error!("Local variable index {} out of range", index));
        };

        match local.take() {
            Some(slot) => Ok(*slot),
            None => Err(Error::TypeMismatch {
                expected: "initialized local",
                found: "empty slot",
            }),
        }
    }

    /// The address of a local variable's boxed slot, 0 if the slot is empty.
    ///
    /// ## Arguments
    /// * 'index' - The local slot index
    #[must_use]
    pub fn local_address(&self, index: u16) -> u64 {
        match self.locals.get(usize::from(index)) {
            Some(Some(slot)) => std::ptr::from_ref::<Slot>(slot.as_ref()) as u64,
            _ => 0,
        }
    }
}
