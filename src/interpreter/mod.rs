//! The interpreter: evaluation stack, frames, heap and the runtime dispatcher.
//!
//! # Key Components
//!
//! - [`Runtime`] - registry, loader chain and instruction dispatch
//! - [`EvalStack`] - the typed evaluation stack ([`SlotKind`]-tagged slots)
//! - [`Frame`] - one method invocation: cursor and local variables
//! - [`ManagedHeap`] - the append-only object heap
//!
//! # Execution model
//!
//! Everything runs synchronously on the caller's thread. A frame pulls one
//! instruction at a time from its method body; `call`/`newobj` recurse into nested
//! frames bounded by the native call stack; `ret` pops back to the caller. Static
//! field accesses lazily run the owning type's `.cctor` exactly once per runtime
//! lifetime, strictly before the access.

mod frame;
mod heap;
mod runtime;
mod stack;

pub use frame::{Frame, MAX_LOCALS};
pub use heap::ManagedHeap;
pub use runtime::{AssemblyLoader, Runtime};
pub use stack::{EvalStack, ManagedPtr, NativeInt, NativeUint, Slot, SlotKind, StackValue, UnmanagedPtr};
