use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowDefinition, TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

#[derive(Clone, Debug)]
/// The `CustomAttribute` table associates attributes with metadata elements.
/// `TableId` = 0x0C
///
/// The interpreter does not evaluate attributes; the rows are parsed so the `#~`
/// stream slices correctly for images that carry them (compilers emit them on every
/// assembly).
pub struct CustomAttributeRaw {
    /// `RowID`
    pub rid: u32,
    /// Token
    pub token: Token,
    /// Offset
    pub offset: usize,
    /// the attributed element; a `HasCustomAttribute` coded index
    pub parent: CodedIndex,
    /// the attribute constructor; a `CustomAttributeType` coded index
    pub constructor: CodedIndex,
    /// an index into the Blob heap holding the attribute value
    pub value: u32,
}

impl RowDefinition for CustomAttributeRaw {
    const TABLE: TableId = TableId::CustomAttribute;

    #[rustfmt::skip]
    fn row_size(sizes: &TableInfoRef) -> u32 {
        u32::from(
            /* parent */        sizes.coded_index_bytes(CodedIndexType::HasCustomAttribute) +
            /* constructor */   sizes.coded_index_bytes(CodedIndexType::CustomAttributeType) +
            /* value */         sizes.blob_bytes()
        )
    }

    fn read_row(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        let offset_org = *offset;

        Ok(CustomAttributeRaw {
            rid,
            token: Token::new(0x0C00_0000 + rid),
            offset: offset_org,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(data, offset, sizes, CodedIndexType::CustomAttributeType)?,
            value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
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
            0x2E, 0x00, // parent: Assembly row 1 -> (1 << 5) | 14
            0x0B, 0x00, // constructor: MemberRef row 1 -> (1 << 3) | 3
            0x01, 0x00, // value
        ];

        let sizes = Arc::new(TableInfo::new_test(
            &[(TableId::Assembly, 1), (TableId::MemberRef, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<CustomAttributeRaw>::new(&data, 1, sizes).unwrap();

        let row = table.get(1).unwrap();
        assert_eq!(row.token.value(), 0x0C00_0001);
        assert_eq!(row.parent.tag, TableId::Assembly);
        assert_eq!(row.parent.row, 1);
        assert_eq!(row.constructor.tag, TableId::MemberRef);
        assert_eq!(row.constructor.row, 1);
        assert_eq!(row.value, 1);
    }
}
