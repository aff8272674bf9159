//! ECMA-335 metadata tables.
//!
//! This module and its submodules provide parsing and typed access for the metadata
//! tables the interpreter consumes. Each table submodule implements a `*Raw` row type
//! (e.g. [`TypeDefRaw`], [`MethodDefRaw`]) that reads itself from the fixed-width row
//! storage of the `#~` stream; the shared infrastructure ([`MetadataTable`],
//! [`TableInfo`], [`CodedIndex`]) handles bounds checking and 2/4-byte index widths.
//!
//! See each submodule for details.

mod assembly;
mod assemblyref;
mod classlayout;
mod codedindex;
mod customattribute;
mod field;
mod memberref;
mod methoddef;
mod module;
mod param;
mod standalonesig;
mod table;
mod tableid;
mod tableinfo;
mod typedef;
mod typeref;

pub use assembly::AssemblyRaw;
pub use assemblyref::AssemblyRefRaw;
pub use classlayout::ClassLayoutRaw;
pub use codedindex::{CodedIndex, CodedIndexType};
pub use customattribute::CustomAttributeRaw;
pub use field::FieldRaw;
pub use memberref::MemberRefRaw;
pub use methoddef::MethodDefRaw;
pub use module::ModuleRaw;
pub use param::ParamRaw;
pub use standalonesig::StandAloneSigRaw;
pub use table::{MetadataTable, TableIterator};
pub use tableid::TableId;
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};
pub use typedef::TypeDefRaw;
pub use typeref::TypeRefRaw;

use crate::{metadata::token::Token, Result};

/// Trait defining the interface for reading and parsing metadata table rows.
///
/// Implemented by every `*Raw` row type. Provides the row width (which depends on the
/// image's heap and table sizes) and the actual field-by-field read. Row indexing is
/// 1-based, as everywhere in CLI metadata.
pub trait RowDefinition: Sized {
    /// The metadata table this row type belongs to
    const TABLE: TableId;

    /// The size in bytes of a single row of this table.
    ///
    /// ## Arguments
    /// * `sizes` - Table size information deciding 2/4-byte index widths
    fn row_size(sizes: &TableInfoRef) -> u32;

    /// Read and parse a single row from the table's row storage.
    ///
    /// ## Arguments
    /// * `data`   - The byte buffer containing the table data
    /// * `offset` - The read position, advanced by the number of bytes consumed
    /// * `rid`    - The 1-based row identifier of this entry
    /// * `sizes`  - Table size information for variable-width fields
    ///
    /// # Errors
    /// Returns an error if the buffer holds insufficient data for one row.
    fn read_row(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;

    /// The metadata token of the row with the given 1-based index
    #[must_use]
    fn token(rid: u32) -> Token {
        Token::from_parts(Self::TABLE as u8, rid)
    }
}
