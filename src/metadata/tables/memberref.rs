use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowDefinition, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[derive(Clone, Debug)]
/// The `MemberRef` table references members (fields or methods) of types defined in
/// other modules or assemblies. `TableId` = 0x0A
///
/// `call`/`newobj` tokens targeting this table trigger cross-assembly resolution: the
/// `class` coded index leads to a `TypeRef`, whose resolution scope names the
/// `AssemblyRef` the member lives in.
pub struct MemberRefRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Offset
    pub offset: usize,
    /// an index into `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef` or `TypeSpec`;
    /// more precisely, a `MemberRefParent` coded index
    pub class: CodedIndex,
    /// an index into the String heap
    pub name: u32,
    /// an index into the Blob heap
    pub signature: u32,
}

impl RowDefinition for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* class */     sizes.coded_index_bytes(CodedIndexType::MemberRefParent) +
            /* name */      sizes.str_bytes() +
            /* signature */ sizes.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        Ok(MemberRefRaw {
            rid,
            token: Token::new(0x0A00_0000 + rid),
            offset: offset_org,
            class: CodedIndex::read(data, offset, sizes, CodedIndexType::MemberRefParent)?,
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
            0x09, 0x00, // class: TypeRef row 1
            0x42, 0x00, // name
            0x01, 0x00, // signature
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::TypeRef, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<MemberRefRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.rid, 1);
        assert_eq!(row.token.value(), 0x0A00_0001);
        assert_eq!(row.class.tag, TableId::TypeRef);
        assert_eq!(row.class.row, 1);
        assert_eq!(row.class.token.value(), 0x0100_0001);
        assert_eq!(row.name, 0x42);
        assert_eq!(row.signature, 1);
    }

    #[test]
    fn crafted_long() {
        let data = vec![
            0x09, 0x00, 0x00, 0x00, // class: TypeRef row 1
            0x42, 0x00, 0x00, 0x00, // name
            0x01, 0x00, 0x00, 0x00, // signature
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::TypeRef, u32::from(u16::MAX) + 2)],
            true,
            true,
            true,
        ));
        let table = MetadataTable::<MemberRefRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.class.tag, TableId::TypeRef);
        assert_eq!(row.class.row, 1);
        assert_eq!(row.name, 0x42);
    }
}
