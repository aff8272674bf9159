//! .NET metadata parsing based on ECMA-335.
//!
//! The metadata system is organized into layers that mirror the on-disk format:
//!
//! - [`cor20header`] - the CLR runtime header, located through PE data directory 14
//! - [`root`] - the metadata root and its stream directory
//! - [`streams`] - the heap streams and the compressed `#~` table stream
//! - [`tables`] - typed, token-indexed row access for the metadata tables
//! - [`method`] - tiny/fat method body headers
//! - [`assembly`] - the [`assembly::Assembly`] view tying everything together
//! - [`token`] - 32-bit metadata tokens
//!
//! # References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II

/// The main `Assembly` view over a loaded image and its qualified-name resolution.
pub mod assembly;
/// The CLR 2.0 runtime header.
pub mod cor20header;
/// Tiny and fat method body headers.
pub mod method;
/// The metadata root and stream directory.
pub mod root;
/// Metadata heaps and the `#~` table stream.
pub mod streams;
/// Metadata table infrastructure and row types.
pub mod tables;
/// Metadata tokens.
pub mod token;
