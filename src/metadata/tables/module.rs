use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{RowDefinition, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[derive(Clone, Debug)]
/// The `Module` table contains information about the current module. `TableId` = 0x00
///
/// A valid image has exactly one row; its `name` is the registry key under which the
/// runtime stores the assembly.
pub struct ModuleRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Offset
    pub offset: usize,
    /// a 2-byte value, reserved, shall be 0
    pub generation: u16,
    /// an index into the String heap
    pub name: u32,
    /// an index into the GUID heap; the module version identifier
    pub mvid: u32,
    /// an index into the GUID heap, reserved, shall be 0
    pub enc_id: u32,
    /// an index into the GUID heap, reserved, shall be 0
    pub enc_base_id: u32,
}

impl RowDefinition for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* generation */    2 +
            /* name */          sizes.str_bytes() +
            /* mvid */          sizes.guid_bytes() +
            /* enc_id */        sizes.guid_bytes() +
            /* enc_base_id */   sizes.guid_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        Ok(ModuleRaw {
            rid,
            token: Token::new(rid),
            offset: offset_org,
            generation: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            mvid: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            enc_id: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
            enc_base_id: read_le_at_dyn(data, offset, sizes.is_large_guid())?,
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
            0x00, 0x00, // generation
            0x42, 0x00, // name
            0x01, 0x00, // mvid
            0x00, 0x00, // enc_id
            0x00, 0x00, // enc_base_id
        ];

        let sizes = Arc::new(TableInfo::new_test(&[], false, false, false));
        let table = MetadataTable::<ModuleRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0000_0001);
        assert_eq!(row.generation, 0);
        assert_eq!(row.name, 0x42);
        assert_eq!(row.mvid, 1);
        assert_eq!(row.enc_id, 0);
        assert_eq!(row.enc_base_id, 0);
    }

    #[test]
    fn crafted_long() {
        let data = vec![
            0x00, 0x00, // generation
            0x42, 0x00, 0x00, 0x00, // name
            0x01, 0x00, 0x00, 0x00, // mvid
            0x00, 0x00, 0x00, 0x00, // enc_id
            0x00, 0x00, 0x00, 0x00, // enc_base_id
        ];

        let sizes = Arc::new(TableInfo::new_test(&[], true, true, true));
        let table = MetadataTable::<ModuleRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.name, 0x42);
        assert_eq!(row.mvid, 1);
    }
}
