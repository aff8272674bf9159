//! Metadata table stream (`#~`) for .NET metadata.
//!
//! The `#~` stream holds the compressed table storage: a 24-byte header, the `valid`
//! bitmask naming the present tables, one row count per present table, and then the
//! fixed-width row data of every table in ascending table-id order. [`TablesStream`]
//! parses the header, records each table's offset within the stream, and hands out
//! typed [`MetadataTable`] views on demand.
//!
//! # Reference
//! - [ECMA-335 II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le,
    metadata::tables::{
        AssemblyRaw, AssemblyRefRaw, ClassLayoutRaw, CustomAttributeRaw, FieldRaw, MemberRefRaw,
        MetadataTable, MethodDefRaw, ModuleRaw, ParamRaw, RowDefinition, StandAloneSigRaw,
        TableId, TableInfo, TableInfoRef, TypeDefRaw, TypeRefRaw,
    },
    Error::OutOfBounds,
    Result,
};

/// The width in bytes of one row of the given table, or `None` if this implementation
/// has no layout for it.
fn row_width(table_id: TableId, info: &TableInfoRef) -> Option<u32> {
    Some(match table_id {
        TableId::Module => ModuleRaw::row_size(info),
        TableId::TypeRef => TypeRefRaw::row_size(info),
        TableId::TypeDef => TypeDefRaw::row_size(info),
        TableId::Field => FieldRaw::row_size(info),
        TableId::MethodDef => MethodDefRaw::row_size(info),
        TableId::Param => ParamRaw::row_size(info),
        TableId::MemberRef => MemberRefRaw::row_size(info),
        TableId::CustomAttribute => CustomAttributeRaw::row_size(info),
        TableId::ClassLayout => ClassLayoutRaw::row_size(info),
        TableId::StandAloneSig => StandAloneSigRaw::row_size(info),
        TableId::Assembly => AssemblyRaw::row_size(info),
        TableId::AssemblyRef => AssemblyRefRaw::row_size(info),
        _ => return None,
    })
}

/// The parsed header of the `#~` stream plus the offset of every present table's row
/// storage within the stream.
///
/// Tables whose row layout this implementation does not provide are refused with
/// [`crate::Error::NotSupported`] when they contain rows: their width is unknown, so
/// every subsequent table would be sliced at the wrong place. Silently continuing
/// would corrupt all lookups behind them.
pub struct TablesStream {
    /// Major version of the table schema, shall be 2
    pub major_version: u8,
    /// Minor version of the table schema, shall be 0
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths of all tables
    pub info: TableInfoRef,
    /// Offset of each table's row data within the stream, indexed by table id
    offsets: Vec<usize>,
}

impl TablesStream {
    /// Parse the `#~` stream.
    ///
    /// # Arguments
    /// * 'data' - The stream bytes, starting at the 24-byte header
    ///
    /// # Errors
    /// Returns an error if the stream is truncated, declares no tables, or contains
    /// rows in a table whose layout this implementation does not provide.
    pub fn parse(data: &[u8]) -> Result<TablesStream> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        // Bits past GenericParamConstraint belong to the portable-PDB debug tables
        if (valid >> TableId::COUNT) != 0 {
            return Err(crate::Error::NotSupported(format!(
                "table bitmask {valid:#018x} names debug or unknown tables"
            )));
        }

        let info: TableInfoRef = Arc::new(TableInfo::new(data, valid)?);

        let mut offsets = vec![0_usize; TableId::COUNT];
        let mut current_offset = 24 + valid.count_ones() as usize * 4;

        for table_id in TableId::iter() {
            let rows = info.get(table_id).rows;
            if rows == 0 {
                continue;
            }

            let Some(width) = row_width(table_id, &info) else {
                return Err(crate::Error::NotSupported(format!(
                    "metadata table {table_id:?} ({} rows) has no implemented row layout",
                    rows
                )));
            };

            offsets[table_id as usize] = current_offset;
            current_offset += rows as usize * width as usize;

            if current_offset > data.len() {
                return Err(OutOfBounds);
            }
        }

        Ok(TablesStream {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            offsets,
        })
    }

    /// The number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Returns true if the given table is present with at least one row
    #[must_use]
    pub fn has_table(&self, table_id: TableId) -> bool {
        self.info.get(table_id).rows > 0
    }

    /// The row count of the given table, 0 if absent
    #[must_use]
    pub fn row_count(&self, table_id: TableId) -> u32 {
        self.info.get(table_id).rows
    }

    /// Get a typed view over a table's rows.
    ///
    /// ## Arguments
    /// * 'data' - The same `#~` stream bytes this header was parsed from
    ///
    /// ## Returns
    /// * `Some(MetadataTable<T>)` - if the table is present
    /// * `None` - if the table has no rows
    #[must_use]
    pub fn table<'a, T: RowDefinition>(&self, data: &'a [u8]) -> Option<MetadataTable<'a, T>> {
        let rows = self.info.get(T::TABLE).rows;
        if rows == 0 {
            return None;
        }

        let offset = self.offsets[T::TABLE as usize];
        MetadataTable::<T>::new(&data[offset..], rows, self.info.clone()).ok()
    }
}
