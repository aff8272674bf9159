// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # ilrun
//!
//! A minimal managed-bytecode interpreter for .NET PE/CLI executables, built in pure Rust.
//! `ilrun` parses an assembly's headers, metadata streams and tables, resolves cross-assembly
//! references through pluggable loader callbacks, and executes a subset of the CIL (Common
//! Intermediate Language) instruction set on a typed evaluation stack — no Windows and no
//! .NET runtime required.
//!
//! # Architecture
//!
//! The crate is organized in layers that mirror the on-disk format:
//!
//! - **File Layer**: memory-mapped or in-memory image access and PE32+ header parsing
//! - **Metadata Layer**: ECMA-335 metadata root, streams (`#~`, `#Strings`, `#US`, `#Blob`,
//!   `#GUID`) and typed, token-indexed table access
//! - **Disassembler Layer**: CIL instruction decoding with fixed per-opcode operand widths
//! - **Interpreter Layer**: typed evaluation stack, method frames, static-field lazy type
//!   initialization, an append-only managed heap, and a cross-assembly call dispatcher
//!
//! # Key Components
//!
//! - [`crate::Assembly`] - An immutable view over a loaded PE/CLI image
//! - [`crate::Runtime`] - The interpreter: assembly registry, loader callbacks, execution
//! - [`crate::metadata`] - ECMA-335 metadata parsing (streams, tables, method bodies)
//! - [`crate::disassembler`] - CIL instruction decoding
//! - [`crate::Error`] and [`crate::Result`] - Error handling for every fallible operation
//!
//! # Usage Examples
//!
//! ## Running an executable image
//!
//! ```rust,no_run
//! use ilrun::{Assembly, Runtime};
//! use std::path::Path;
//!
//! let mut runtime = Runtime::new();
//! let assembly = Assembly::from_path(Path::new("example.dll"))?;
//! let exit_code = runtime.run(assembly)?;
//! println!("exited with {exit_code}");
//! # Ok::<(), ilrun::Error>(())
//! ```
//!
//! ## Resolving referenced assemblies through a loader
//!
//! Cross-assembly `call`/`newobj` instructions resolve through the runtime's registry first
//! and fall back to loader callbacks in registration order; the first loader that produces
//! an assembly wins, and the result is registered under its module name.
//!
//! ```rust,no_run
//! use ilrun::{Assembly, Runtime};
//! use std::path::PathBuf;
//!
//! let mut runtime = Runtime::new();
//! let base = PathBuf::from("bin");
//! runtime.add_assembly_loader(move |name| {
//!     Assembly::from_path(&base.join(format!("{name}.dll"))).ok()
//! });
//! # Ok::<(), ilrun::Error>(())
//! ```
//!
//! ## Inspecting metadata without executing
//!
//! ```rust,no_run
//! use ilrun::Assembly;
//!
//! let data = std::fs::read("example.dll")?;
//! let assembly = Assembly::from_mem(data)?;
//! println!("module: {}", assembly.module_name()?);
//! println!("entry point: {}", assembly.entry_point());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Standards Compliance
//!
//! The loader consumes the PE/CLI image format bit-exactly as specified by **ECMA-335**
//! (6th edition), Partition II: DOS stub, COFF header, PE32+ optional header, section
//! table, CLR runtime header, metadata root, and the compressed `#~` table stream.
//! Headers are always read field-by-field into naturally aligned structs; nothing is
//! cast in place from the mapped buffer.
//!
//! # Execution model
//!
//! The runtime is single-process, single-threaded and synchronous. Instruction sequences
//! are pull-based cursors; reentrancy happens only through nested `call`/`newobj` frames
//! on the native stack. The managed heap is append-only — objects are never freed or
//! moved. Every error aborts the current `run` with a typed [`Error`]; no instruction is
//! retried.

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// CIL instruction decoding based on ECMA-335.
///
/// Exposes the decoded [`crate::disassembler::Instruction`] representation, the opcode
/// byte constants, and [`crate::disassembler::decode_instruction`] for turning raw
/// bytecode into instructions. Operand widths are a fixed per-opcode property; opcodes
/// outside the implemented subset decode to [`Error::Unimplemented`].
pub mod disassembler;

/// The interpreter: evaluation stack, frames, managed heap and the runtime dispatcher.
///
/// The central type is [`crate::Runtime`], which owns the assembly registry, the loader
/// callback list, the typed evaluation stack, the static-field map and the heap, and
/// drives method frames to completion.
pub mod interpreter;

/// .NET metadata parsing based on ECMA-335.
///
/// Covers the CLR runtime header, the metadata root and stream directory, the heap
/// streams (`#Strings`, `#US`, `#Blob`, `#GUID`), the compressed `#~` table stream, and
/// typed row access for the tables the interpreter consumes. The main entry point is
/// [`crate::Assembly`].
pub mod metadata;

/// `ilrun` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`crate::Error`]. Used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `ilrun` Error type.
///
/// The main error type for all operations in this crate, covering image parsing,
/// metadata resolution and interpreter execution failures.
pub use error::Error;

/// An immutable view over a loaded PE/CLI image.
///
/// Parsed once from a path or byte buffer, then moved into the runtime registry.
/// See [`crate::metadata::assembly::Assembly`] for the metadata accessor surface.
pub use metadata::assembly::Assembly;

/// The interpreter runtime.
///
/// See [`crate::interpreter::Runtime`] for registry, loader and execution APIs.
pub use interpreter::Runtime;

/// Low-level byte stream parser used for metadata and CIL decoding.
pub use file::parser::Parser;

/// PE32+ header structures and the loaded [`File`] abstraction.
///
/// These types expose the parsed header chain of an image: useful for hosts that
/// want to inspect sections or directories without going through [`Assembly`].
pub use file::{
    pe::{CoffHeader, DataDirectory, DosHeader, OptionalHeader, Pe, SectionHeader},
    File,
};

/// A 32-bit metadata token: high 8 bits table id, low 24 bits 1-based row index.
pub use metadata::token::Token;
