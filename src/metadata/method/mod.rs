//! Method body parsing for .NET assemblies.
//!
//! Exposes [`MethodBody`], the parsed tiny/fat header of a CIL method body, and
//! [`MethodBodyFlags`]. A `MethodDef` row's RVA leads to the header; the code bytes
//! follow it.

mod body;

pub use body::{MethodBody, MethodBodyFlags};
