//! Metadata streams and heaps for direct access to ECMA-335 data structures.
//!
//! This crate consumes five streams of a .NET assembly's metadata root:
//!
//! - [`TablesStream`] (`#~`) - the compressed metadata table storage
//! - [`Strings`] (`#Strings`) - NUL-terminated UTF-8 identifier strings
//! - [`UserStrings`] (`#US`) - length-prefixed UTF-16 string literals
//! - [`Blob`] (`#Blob`) - length-prefixed binary blobs (signatures)
//! - [`Guid`] (`#GUID`) - 16-byte GUID entries
//!
//! Each stream is located by a [`StreamHeader`] in the metadata root's directory.
//! Directories regularly name further streams (`#Pdb`, `#-`); their headers parse
//! like any other and the streams themselves are left untouched.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tables;
mod userstrings;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::StreamHeader;
pub use strings::Strings;
pub use tables::TablesStream;
pub use userstrings::UserStrings;
