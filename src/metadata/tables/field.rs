use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{RowDefinition, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[allow(non_snake_case)]
/// Commonly needed flags of `FieldAttributes`
pub mod FieldAttributes {
    /// Field is static
    pub const STATIC: u16 = 0x0010;
    /// Field has a compile-time literal value
    pub const LITERAL: u16 = 0x0040;
}

#[derive(Clone, Debug)]
/// The `Field` table defines the fields of the types in the `TypeDef` table.
/// `TableId` = 0x04
pub struct FieldRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Offset
    pub offset: usize,
    /// a 2-byte bitmask of `FieldAttributes`
    pub flags: u16,
    /// an index into the String heap
    pub name: u32,
    /// an index into the Blob heap
    pub signature: u32,
}

impl RowDefinition for FieldRaw {
    const TABLE: TableId = TableId::Field;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* flags */     2 +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        Ok(FieldRaw {
            rid,
            token: Token::new(0x0400_0000 + rid),
            offset: offset_org,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::metadata::tables::{MetadataTable, TableInfo};

    use super::*;

    #[test]
    fn crafted_short() {
        let data = vec![
            0x10, 0x00, // flags: static
            0x42, 0x00, // name
            0x01, 0x00, // signature
        ];

        let sizes = Arc::new(TableInfo::new_test(&[], false, false, false));
        let table = MetadataTable::<FieldRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.token.value(), 0x0400_0001);
        assert_eq!(row.flags, FieldAttributes::STATIC);
        assert_eq!(row.name, 0x42);
        assert_eq!(row.signature, 1);
    }
}
