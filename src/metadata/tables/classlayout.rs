use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{RowDefinition, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[derive(Clone, Debug)]
/// The `ClassLayout` table specifies the explicit layout of fields within a class.
/// `TableId` = 0x0F
///
/// `class_size` feeds `newobj` allocation: a type with an explicit layout allocates
/// exactly that many bytes on the managed heap.
pub struct ClassLayoutRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Offset
    pub offset: usize,
    /// a 2-byte value, specifying the alignment of fields
    pub packing_size: u16,
    /// a 4-byte value, specifying the size of the class
    pub class_size: u32,
    /// an index into the `TypeDef` table
    pub parent: u32,
}

impl RowDefinition for ClassLayoutRaw {
    const TABLE: TableId = TableId::ClassLayout;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* packing_size */  2 +
            /* class_size */    4 +
            /* parent */        sizes.table_index_bytes(TableId::TypeDef)
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        Ok(ClassLayoutRaw {
            rid,
            token: Token::new(0x0F00_0000 + rid),
            offset: offset_org,
            packing_size: read_le_at::<u16>(data, offset)?,
            class_size: read_le_at::<u32>(data, offset)?,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
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
            0x01, 0x01, // packing_size
            0x02, 0x02, 0x02, 0x02, // class_size
            0x03, 0x03, // parent
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::TypeDef, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<ClassLayoutRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0F00_0001);
        assert_eq!(row.packing_size, 0x0101);
        assert_eq!(row.class_size, 0x0202_0202);
        assert_eq!(row.parent, 0x0303);
    }

    #[test]
    fn crafted_long() {
        let data = vec![
            0x01, 0x01, // packing_size
            0x02, 0x02, 0x02, 0x02, // class_size
            0x03, 0x03, 0x03, 0x03, // parent
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::TypeDef, u32::from(u16::MAX) + 3)],
            true,
            true,
            true,
        ));
        let table = MetadataTable::<ClassLayoutRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.packing_size, 0x0101);
        assert_eq!(row.class_size, 0x0202_0202);
        assert_eq!(row.parent, 0x0303_0303);
    }
}
