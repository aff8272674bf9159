use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three groups: structural failures while parsing a PE/CLI image,
/// resolution failures while looking up metadata rows or cross-assembly references, and
/// execution failures raised by the interpreter. Every error aborts the current `run`; no
/// operation is retried.
///
/// # Examples
///
/// ```rust,no_run
/// use ilrun::{Assembly, Error};
/// use std::path::Path;
///
/// match Assembly::from_path(Path::new("example.dll")) {
///     Ok(assembly) => println!("Loaded assembly"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(Error::NotSupported(feature)) => {
///         eprintln!("Image requires unsupported feature: {}", feature);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The image is damaged or does not conform to the PE/CLI format.
    ///
    /// Carries the source location where the malformation was detected, so
    /// structural failures always name a precise place in the parser.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of bound read would have occurred!")]
    OutOfBounds,

    /// The image requires a feature this implementation does not provide,
    /// e.g. metadata tables whose row layout is not implemented.
    #[error("Image is not supported: {0}")]
    NotSupported(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A push would have exceeded the evaluation stack capacity.
    #[error("Evaluation stack overflow - capacity is {capacity} bytes")]
    StackOverflow {
        /// The configured capacity of the evaluation stack in bytes
        capacity: usize,
    },

    /// A pop was attempted on an empty evaluation stack.
    #[error("Evaluation stack underflow")]
    StackUnderflow,

    /// The tag of the top stack slot does not match the requested type.
    ///
    /// The on-stack width is fixed by the tag; a widening pop is a mismatch
    /// like any other.
    #[error("Type mismatch on evaluation stack - expected {expected}, found {found}")]
    TypeMismatch {
        /// The slot kind the caller asked for
        expected: &'static str,
        /// The slot kind actually on the stack
        found: &'static str,
    },

    /// A token or table index does not resolve to a row.
    #[error("No metadata row for token {0}")]
    MissingRow(Token),

    /// A referenced assembly is neither registered nor producible by any loader.
    #[error("Could not find assembly '{0}'")]
    AssemblyNotFound(String),

    /// A method could not be resolved by name.
    #[error("Could not find method '{0}'")]
    MethodNotFound(String),

    /// A static field access did not resolve to a `Field` row.
    #[error("Could not resolve field - {0}")]
    FieldNotFound(Token),

    /// A `call` or `newobj` token targets a table the dispatcher does not support.
    #[error("Call token targets an unsupported table - {0}")]
    BadCall(Token),

    /// The instruction stream contains an opcode outside the implemented subset.
    #[error("Unimplemented opcode {prefix:#04x} {opcode:#04x}")]
    Unimplemented {
        /// The prefix byte (`0xFE` for two-byte opcodes, 0 otherwise)
        prefix: u8,
        /// The opcode byte
        opcode: u8,
    },
}
