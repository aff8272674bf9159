//! The interpreter runtime.
//!
//! [`Runtime`] owns all process-wide interpreter state: the assembly registry, the
//! loader callbacks, the typed evaluation stack, the initialized-type set, the
//! static-field map and the managed heap. [`Runtime::run`] frames the entry-point
//! method of an assembly and drives its instructions to completion; `call`/`newobj`
//! recurse into nested frames on the native stack.

use std::collections::{HashMap, HashSet};

use crate::{
    disassembler::{opcodes, Instruction},
    interpreter::{
        frame::Frame,
        heap::ManagedHeap,
        stack::{EvalStack, ManagedPtr, Slot, UnmanagedPtr},
    },
    metadata::{
        assembly::Assembly,
        tables::{FieldRaw, MethodDefRaw, TableId},
        token::Token,
    },
    Error, Result,
};

/// A loader callback: given an assembly's simple name, produce the assembly or
/// decline with `None`. Loaders are consulted in registration order; the first
/// success wins.
pub type AssemblyLoader = Box<dyn Fn(&str) -> Option<Assembly>>;

/// The outcome of dispatching one instruction within a frame.
enum Flow {
    /// Fetch the next instruction
    Continue,
    /// The frame is done; control resumes in the caller
    Return,
}

/// The interpreter: assembly registry, loader chain, evaluation stack, static
/// storage and managed heap.
///
/// The runtime is strictly single-threaded; all state is owned and mutated from the
/// caller's thread. Any error aborts the current [`Runtime::run`]; no instruction is
/// retried.
///
/// # Examples
///
/// ```rust,no_run
/// use ilrun::{Assembly, Runtime};
/// use std::path::Path;
///
/// let mut runtime = Runtime::new();
/// let assembly = Assembly::from_path(Path::new("example.dll"))?;
/// let exit_code = runtime.run(assembly)?;
/// # Ok::<(), ilrun::Error>(())
/// ```
pub struct Runtime {
    /// Registered assemblies in insertion order, keyed by module name
    assemblies: Vec<(String, Assembly)>,
    loaders: Vec<AssemblyLoader>,
    stack: EvalStack,
    /// Types whose `.cctor` has run (or was found absent), per assembly
    initialized_types: HashSet<(String, Token)>,
    /// Static field slots, keyed by assembly and `Field` token. Boxed so the
    /// addresses `ldsflda` hands out stay stable across map growth.
    statics: HashMap<(String, Token), Box<Slot>>,
    heap: ManagedHeap,
}

impl Runtime {
    /// Create a runtime with an empty registry and a zero-capacity stack; the stack
    /// is sized from the image when [`Runtime::run`] is called.
    #[must_use]
    pub fn new() -> Runtime {
        Runtime {
            assemblies: Vec::new(),
            loaders: Vec::new(),
            stack: EvalStack::new(),
            initialized_types: HashSet::new(),
            statics: HashMap::new(),
            heap: ManagedHeap::new(),
        }
    }

    /// Register a loader callback. Loaders are consulted in registration order when
    /// a cross-assembly reference names an assembly the registry does not hold.
    pub fn add_assembly_loader<F>(&mut self, loader: F)
    where
        F: Fn(&str) -> Option<Assembly> + 'static,
    {
        self.loaders.push(Box::new(loader));
    }

    /// Register an assembly under its module name.
    ///
    /// # Errors
    /// Returns an error if the assembly's module name cannot be resolved.
    pub fn add_assembly(&mut self, assembly: Assembly) -> Result<()> {
        let key = assembly.module_name()?.to_string();
        self.register(key, assembly);
        Ok(())
    }

    /// Move the assembly into the registry, size the evaluation stack from its
    /// optional header, and execute the method named by the CLR header's entry-point
    /// token. Returns the exit code (currently always 0).
    ///
    /// # Arguments
    /// * `assembly` - The executable image to run
    ///
    /// # Errors
    /// Returns an error if the entry point cannot be resolved or any executed
    /// instruction fails.
    pub fn run(&mut self, assembly: Assembly) -> Result<i32> {
        let key = assembly.module_name()?.to_string();
        let stack_size = assembly.stack_reserve();
        let entry_point = assembly.entry_point();

        self.stack = EvalStack::with_capacity(stack_size as usize);
        self.register(key.clone(), assembly);

        self.execute_method(&key, entry_point)?;

        Ok(0)
    }

    /// The evaluation stack, for host diagnostics
    #[must_use]
    pub fn stack(&self) -> &EvalStack {
        &self.stack
    }

    /// The managed heap, for host diagnostics
    #[must_use]
    pub fn heap(&self) -> &ManagedHeap {
        &self.heap
    }

    /// Returns true if the given type's static initialization has run
    ///
    /// ## Arguments
    /// * 'module' - The registry key of the type's assembly
    /// * 'typedef' - The `TypeDef` token of the type
    #[must_use]
    pub fn is_type_initialized(&self, module: &str, typedef: Token) -> bool {
        self.initialized_types
            .contains(&(module.to_string(), typedef))
    }

    /// The current value of a static field slot, if it was ever touched
    ///
    /// ## Arguments
    /// * 'module' - The registry key of the field's assembly
    /// * 'field' - The `Field` token
    #[must_use]
    pub fn static_field(&self, module: &str, field: Token) -> Option<Slot> {
        self.statics
            .get(&(module.to_string(), field))
            .map(|slot| **slot)
    }

    fn register(&mut self, key: String, assembly: Assembly) {
        if self.assemblies.iter().any(|(existing, _)| *existing == key) {
            return;
        }

        self.assemblies.push((key, assembly));
    }

    fn assembly(&self, key: &str) -> Result<&Assembly> {
        self.assemblies
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, assembly)| assembly)
            .ok_or_else(|| Error::AssemblyNotFound(key.to_string()))
    }

    /// Find a registered assembly for the given reference name: exact module-name
    /// match first, then module names with their `.dll`/`.exe` extension stripped
    /// (an `AssemblyRef` carries the simple name, the registry key the file name).
    fn find_registered(&self, name: &str) -> Option<String> {
        for (key, _) in &self.assemblies {
            if key == name {
                return Some(key.clone());
            }
        }

        for (key, _) in &self.assemblies {
            let stem = key
                .strip_suffix(".dll")
                .or_else(|| key.strip_suffix(".exe"))
                .unwrap_or(key);
            if stem == name {
                return Some(key.clone());
            }
        }

        None
    }

    /// Resolve an assembly reference name to a registry key, consulting the loader
    /// chain on a registry miss.
    fn resolve_assembly(&mut self, name: &str) -> Result<String> {
        if let Some(key) = self.find_registered(name) {
            return Ok(key);
        }

        for index in 0..self.loaders.len() {
            let Some(assembly) = (self.loaders[index])(name) else {
                continue;
            };

            let key = assembly.module_name()?.to_string();
            self.register(key.clone(), assembly);
            return Ok(key);
        }

        Err(Error::AssemblyNotFound(name.to_string()))
    }

    /// Resolve a `MemberRef` token to the registry key and `MethodDef` token of the
    /// method it names, loading the target assembly if necessary.
    fn resolve_member_ref(&mut self, assembly_key: &str, token: Token) -> Result<(String, Token)> {
        let qualified = self.assembly(assembly_key)?.qualified_member_name(token)?;

        let key = self.resolve_assembly(&qualified.assembly_name)?;

        let assembly = self.assembly(&key)?;
        let method = assembly
            .method_by_name(
                &qualified.namespace,
                &qualified.type_name,
                &qualified.member_name,
            )?
            .ok_or_else(|| Error::MethodNotFound(qualified.to_string()))?;

        Ok((key, method.token))
    }

    /// Execute a method to completion: resolve its body, create a frame, and drive
    /// the instruction cursor until `ret` or the end of the body.
    fn execute_method(&mut self, assembly_key: &str, token: Token) -> Result<()> {
        let code = {
            let assembly = self.assembly(assembly_key)?;
            let method = assembly.row::<MethodDefRaw>(token)?;
            let type_def = assembly.type_def_of_method(method.rid)?;

            log::info!(
                "Executing .NET method '[{}]{}::{}::{}'",
                assembly.module_name()?,
                assembly.string(type_def.type_namespace)?,
                assembly.string(type_def.type_name)?,
                assembly.string(method.name)?,
            );

            // The loader chain may grow the registry while this frame runs, so the
            // frame owns its code bytes instead of borrowing them.
            let (_body, code) = assembly.method_body(&method)?;
            code.to_vec()
        };

        let mut frame = Frame::new(assembly_key, token);
        while let Some(instruction) = frame.fetch(&code)? {
            log::trace!("{}", instruction.mnemonic);

            match self.dispatch(&mut frame, &instruction)? {
                Flow::Continue => {}
                Flow::Return => break,
            }
        }

        Ok(())
    }

    /// Apply one decoded instruction to the runtime state.
    fn dispatch(&mut self, frame: &mut Frame, instruction: &Instruction) -> Result<Flow> {
        use opcodes::*;

        match (instruction.prefix, instruction.opcode) {
            (0, NOP) => {}
            (0, BREAK) => self.brk(),

            // Argument slots are reserved for a later revision
            (0, LDARG_0 | LDARG_1 | LDARG_2 | LDARG_3 | LDARG_S | STARG_S)
            | (FE_PREFIX, FE_LDARG) => {}

            (0, LDLOC_0) => self.ldloc(frame, 0)?,
            (0, LDLOC_1) => self.ldloc(frame, 1)?,
            (0, LDLOC_2) => self.ldloc(frame, 2)?,
            (0, LDLOC_3) => self.ldloc(frame, 3)?,
            (0, LDLOC_S) | (FE_PREFIX, FE_LDLOC) => {
                let index = Self::index_operand(instruction)?;
                self.ldloc(frame, index)?;
            }

            (0, STLOC_0) => self.stloc(frame, 0)?,
            (0, STLOC_1) => self.stloc(frame, 1)?,
            (0, STLOC_2) => self.stloc(frame, 2)?,
            (0, STLOC_3) => self.stloc(frame, 3)?,
            (0, STLOC_S) | (FE_PREFIX, FE_STLOC) => {
                let index = Self::index_operand(instruction)?;
                self.stloc(frame, index)?;
            }

            (0, LDLOCA_S) => {
                let index = Self::index_operand(instruction)?;
                self.stack.push(UnmanagedPtr(frame.local_address(index)))?;
            }

            (0, LDC_I4_M1) => self.stack.push(-1_i32)?,
            (0, LDC_I4_0) => self.stack.push(0_i32)?,
            (0, LDC_I4_1) => self.stack.push(1_i32)?,
            (0, LDC_I4_2) => self.stack.push(2_i32)?,
            (0, LDC_I4_3) => self.stack.push(3_i32)?,
            (0, LDC_I4_4) => self.stack.push(4_i32)?,
            (0, LDC_I4_5) => self.stack.push(5_i32)?,
            (0, LDC_I4_6) => self.stack.push(6_i32)?,
            (0, LDC_I4_7) => self.stack.push(7_i32)?,
            (0, LDC_I4_8) => self.stack.push(8_i32)?,
            (0, LDC_I4_S | LDC_I4) => {
                let value = instruction
                    .i32_operand()
                    .ok_or_else(|| Self::operand_error(instruction))?;
                self.stack.push(value)?;
            }
            (0, LDC_I8) => {
                let value = instruction
                    .i64_operand()
                    .ok_or_else(|| Self::operand_error(instruction))?;
                self.stack.push(value)?;
            }
            (0, LDC_R4 | LDC_R8) => {
                let value = instruction
                    .f64_operand()
                    .ok_or_else(|| Self::operand_error(instruction))?;
                self.stack.push(value)?;
            }

            (0, LDSTR) => {
                // Strings are not materialized; the reference carries the token
                let token = Self::token_operand(instruction)?;
                self.stack.push(ManagedPtr(u64::from(token.value())))?;
            }

            (0, POP) => {
                self.stack.pop_slot()?;
            }

            (0, BR | BR_S) => {
                let offset = instruction
                    .branch_operand()
                    .ok_or_else(|| Self::operand_error(instruction))?;
                frame.branch(offset);
            }

            (0, CALL) => {
                let token = Self::token_operand(instruction)?;
                self.call(frame, token)?;
            }
            (0, NEWOBJ) => {
                let token = Self::token_operand(instruction)?;
                self.newobj(frame, token)?;
            }
            (0, RET) => return Ok(Flow::Return),

            (0, LDSFLDA) => {
                let token = Self::token_operand(instruction)?;
                self.ldsflda(frame, token)?;
            }
            (0, LDSFLD) => {
                let token = Self::token_operand(instruction)?;
                self.ldsfld(frame, token)?;
            }
            (0, STSFLD) => {
                let token = Self::token_operand(instruction)?;
                self.stsfld(frame, token)?;
            }

            _ => {
                return Err(Error::Unimplemented {
                    prefix: instruction.prefix,
                    opcode: instruction.opcode,
                })
            }
        }

        Ok(Flow::Continue)
    }

    fn token_operand(instruction: &Instruction) -> Result<Token> {
        instruction
            .token_operand()
            .ok_or_else(|| Self::operand_error(instruction))
    }

    fn index_operand(instruction: &Instruction) -> Result<u16> {
        instruction
            .index_operand()
            .ok_or_else(|| Self::operand_error(instruction))
    }

    fn operand_error(instruction: &Instruction) -> Error {
        malformed_error!("Missing operand for '{}'", instruction.mnemonic)
    }

    /// Deliver a debug break to the host process
    fn brk(&self) {
        log::warn!("break instruction reached, delivering debug break to the host");

        #[cfg(unix)]
        unsafe {
            libc::raise(libc::SIGTRAP);
        }
    }

    fn ldloc(&mut self, frame: &mut Frame, index: u16) -> Result<()> {
        let slot = frame.take_local(index)?;
        self.stack.push_slot(slot)
    }

    fn stloc(&mut self, frame: &mut Frame, index: u16) -> Result<()> {
        let slot = self.stack.pop_slot()?;
        frame.store_local(index, slot)
    }

    /// `call` dispatch: token-local for `MethodDef`, cross-assembly for `MemberRef`.
    fn call(&mut self, frame: &Frame, token: Token) -> Result<()> {
        match token.table() {
            id if id == TableId::MethodDef as u8 => {
                let key = frame.assembly().to_string();
                self.execute_method(&key, token)
            }
            id if id == TableId::MemberRef as u8 => {
                let (key, method_token) = self.resolve_member_ref(frame.assembly(), token)?;
                self.execute_method(&key, method_token)
            }
            _ => Err(Error::BadCall(token)),
        }
    }

    /// `newobj`: allocate the owning type's object on the heap, push the reference,
    /// then run the constructor.
    fn newobj(&mut self, frame: &Frame, token: Token) -> Result<()> {
        match token.table() {
            id if id == TableId::MethodDef as u8 => {
                let key = frame.assembly().to_string();
                self.alloc_for_constructor(&key, token)?;
                self.execute_method(&key, token)
            }
            id if id == TableId::MemberRef as u8 => {
                let (key, method_token) = self.resolve_member_ref(frame.assembly(), token)?;
                self.alloc_for_constructor(&key, method_token)?;
                self.execute_method(&key, method_token)
            }
            _ => Err(Error::BadCall(token)),
        }
    }

    fn alloc_for_constructor(&mut self, assembly_key: &str, method_token: Token) -> Result<()> {
        let object_size = {
            let assembly = self.assembly(assembly_key)?;
            let method = assembly.row::<MethodDefRaw>(method_token)?;
            let type_def = assembly.type_def_of_method(method.rid)?;
            assembly.type_size(type_def.rid)
        };

        let (_heap_key, address) = self.heap.alloc(object_size as usize);
        self.stack.push(ManagedPtr(address))
    }

    /// Resolve a static field access: the `Field` row and its owning type, running
    /// the type's `.cctor` before the first access. Returns the statics-map key.
    fn touch_static(&mut self, assembly_key: &str, token: Token) -> Result<(String, Token)> {
        if token.table() != TableId::Field as u8 {
            return Err(Error::FieldNotFound(token));
        }

        let (typedef_token, type_name, cctor_token, field_name) = {
            let assembly = self.assembly(assembly_key)?;
            let field = assembly
                .row::<FieldRaw>(token)
                .map_err(|_| Error::FieldNotFound(token))?;
            let type_def = assembly.type_def_of_field(field.rid)?;

            (
                type_def.token,
                assembly.string(type_def.type_name)?.to_string(),
                assembly.method_of_type(&type_def, ".cctor")?.map(|m| m.token),
                assembly.string(field.name)?.to_string(),
            )
        };

        let type_key = (assembly_key.to_string(), typedef_token);
        if !self.initialized_types.contains(&type_key) {
            // Mark first: a .cctor touching its own statics must not recurse
            self.initialized_types.insert(type_key);

            log::info!("Initializing type '{}'", type_name);
            if let Some(cctor) = cctor_token {
                self.execute_method(assembly_key, cctor)?;
            }
        }

        log::debug!("Accessing field '{}'", field_name);

        Ok((assembly_key.to_string(), token))
    }

    fn ldsfld(&mut self, frame: &Frame, token: Token) -> Result<()> {
        let key = self.touch_static(frame.assembly(), token)?;

        // A never-written slot reads as a zero-initialized Int32
        let slot = **self
            .statics
            .entry(key)
            .or_insert_with(|| Box::new(Slot::INT32_ZERO));
        self.stack.push_slot(slot)
    }

    fn ldsflda(&mut self, frame: &Frame, token: Token) -> Result<()> {
        let key = self.touch_static(frame.assembly(), token)?;

        let slot = self
            .statics
            .entry(key)
            .or_insert_with(|| Box::new(Slot::INT32_ZERO));
        let address = std::ptr::from_ref::<Slot>(slot.as_ref()) as u64;
        self.stack.push(ManagedPtr(address))
    }

    fn stsfld(&mut self, frame: &Frame, token: Token) -> Result<()> {
        let key = self.touch_static(frame.assembly(), token)?;

        let value = self.stack.pop_slot()?;
        let slot = self
            .statics
            .entry(key)
            .or_insert_with(|| Box::new(Slot::INT32_ZERO));
        // Write through the existing box so addresses handed out stay valid
        **slot = value;

        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}
