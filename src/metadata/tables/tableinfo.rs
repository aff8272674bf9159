use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

/// Holds information about one table's row count and the width of indexes into it
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
    /// If the count is > `u16::MAX`, indexes of other tables into this one are 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates a new `TableRowInfo` for the given row count.
    ///
    /// # Arguments
    /// * `rows` - The number of rows in the table
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// `TableInfo` holds the row counts and reference index widths of all tables of a
/// binary, read from the `#~` stream header. Row readers consult it to decide whether
/// heap and table indexes occupy 2 or 4 bytes.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Cheap-copy reference to a `TableInfo` structure
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Build a new `TableInfo` struct from a `#~` stream.
    ///
    /// ## Arguments
    /// * 'data'            - The `#~` stream bytes, starting at its header
    /// * '`valid_bitvec`'  - The valid bitvector naming the present tables
    ///
    /// # Errors
    /// Returns an error if the row count array is truncated
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let mut table_info = vec![TableRowInfo::default(); TableId::COUNT];
        let mut next_row_offset = 24;

        for table_id in TableId::iter() {
            if data.len() < next_row_offset {
                return Err(OutOfBounds);
            }

            if (valid_bitvec & (1_u64 << table_id as usize)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            if row_count == 0 {
                continue;
            }

            table_info[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;
        let mut table_info = TableInfo {
            rows: table_info,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bits();

        Ok(table_info)
    }

    #[cfg(test)]
    /// Special constructor for unit-tests
    ///
    /// ## Arguments
    /// * 'valid_tables'    - (table_id, row_count) tuples of the present tables
    /// * 'large_str'       - Whether `#Strings` heap indexes are 4 bytes
    /// * 'large_blob'      - Whether `#Blob` heap indexes are 4 bytes
    /// * 'large_guid'      - Whether `#GUID` heap indexes are 4 bytes
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::COUNT],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for valid_table in valid_tables {
            table_info.rows[valid_table.0 as usize] = TableRowInfo::new(valid_table.1);
        }

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Returns true if the requested table has more than 2^16 rows and hence indexes
    /// into it require 4 bytes instead of 2
    ///
    /// ## Arguments
    /// * `id` - The `TableId` to query
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// Indicates whether indexes into the '#Strings' heap are 4 bytes (else 2)
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Indicates whether indexes into the '#GUID' heap are 4 bytes (else 2)
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Indicates whether indexes into the '#Blob' heap are 4 bytes (else 2)
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// The width in bytes of a '#Strings' heap index
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// The width in bytes of a '#GUID' heap index
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// The width in bytes of a '#Blob' heap index
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Returns the metadata for a specific table.
    ///
    /// # Arguments
    /// * `table` - The `TableId` for which to retrieve metadata
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// The number of bits required to represent an index into a specific table.
    ///
    /// # Arguments
    /// * `table_id` - The `TableId` for which to calculate the index size
    #[must_use]
    pub fn table_index_bits(&self, table_id: TableId) -> u8 {
        self.rows[table_id as usize].bits
    }

    /// The number of bytes required to represent an index into a specific table.
    ///
    /// # Arguments
    /// * `table_id` - The `TableId` for which to calculate the index size
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// The cached byte size of a specific coded index kind.
    ///
    /// # Arguments
    /// * `coded_index_type` - The `CodedIndexType` for which to retrieve the size
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Calculates the number of bits required for a specific coded index kind.
    fn calculate_coded_index_size(&self, coded_index_type: CodedIndexType) -> u8 {
        let max_bits = coded_index_type
            .tables()
            .iter()
            .map(|table| self.table_index_bits(*table))
            .max()
            .unwrap_or(1);

        max_bits + coded_index_type.tag_bits()
    }

    /// Calculates and caches the bit sizes required for all coded index kinds.
    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let size = self.calculate_coded_index_size(coded_index);
            self.coded_indexes[coded_index as usize] = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_info() {
        let small = TableRowInfo::new(10);
        assert_eq!(small.rows, 10);
        assert_eq!(small.bits, 4);
        assert!(!small.is_large);

        let boundary = TableRowInfo::new(u32::from(u16::MAX));
        assert!(!boundary.is_large);

        let large = TableRowInfo::new(u32::from(u16::MAX) + 1);
        assert_eq!(large.bits, 17);
        assert!(large.is_large);
    }

    #[test]
    fn index_widths() {
        let info = TableInfo::new_test(
            &[
                (TableId::TypeDef, 100),
                (TableId::MethodDef, u32::from(u16::MAX) + 2),
            ],
            true,
            false,
            false,
        );

        assert_eq!(info.table_index_bytes(TableId::TypeDef), 2);
        assert_eq!(info.table_index_bytes(TableId::MethodDef), 4);
        assert_eq!(info.str_bytes(), 4);
        assert_eq!(info.blob_bytes(), 2);
        assert_eq!(info.guid_bytes(), 2);

        // MemberRefParent includes MethodDef, so 17 bits + 3 tag bits forces 4 bytes
        assert_eq!(info.coded_index_bytes(CodedIndexType::MemberRefParent), 4);
        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);
    }

    #[test]
    fn from_tilde_header() {
        // Header with TypeDef (bit 2) and MethodDef (bit 6) present
        let mut data = vec![0u8; 32];
        data[4] = 2; // major version
        let valid: u64 = (1 << 2) | (1 << 6);
        data[8..16].copy_from_slice(&valid.to_le_bytes());
        data[24..28].copy_from_slice(&3u32.to_le_bytes()); // TypeDef rows
        data[28..32].copy_from_slice(&7u32.to_le_bytes()); // MethodDef rows

        let info = TableInfo::new(&data, valid).unwrap();
        assert_eq!(info.get(TableId::TypeDef).rows, 3);
        assert_eq!(info.get(TableId::MethodDef).rows, 7);
        assert_eq!(info.get(TableId::Field).rows, 0);
    }
}
