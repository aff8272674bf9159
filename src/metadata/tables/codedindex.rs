use strum::{EnumCount, EnumIter};

use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{TableId, TableInfoRef},
        token::Token,
    },
    Result,
};

/// The kinds of coded indexes the interpreter's tables use.
///
/// A coded index packs a table tag into the low bits of a row index, so one field can
/// reference rows of several possible tables. Which tables, and how many tag bits, is
/// fixed per kind by ECMA-335 II.24.2.6.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, EnumCount)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef` or `TypeSpec` - used by `TypeDef.extends`
    TypeDefOrRef,
    /// `Module`, `ModuleRef`, `AssemblyRef` or `TypeRef` - used by `TypeRef.resolution_scope`
    ResolutionScope,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef` or `TypeSpec` - used by `MemberRef.class`
    MemberRefParent,
    /// Any attributable row - used by `CustomAttribute.parent`
    HasCustomAttribute,
    /// `MethodDef` or `MemberRef` - used by `CustomAttribute.constructor`
    CustomAttributeType,
}

impl CodedIndexType {
    /// The tables this coded index kind can reference, in tag order. Unused tag slots
    /// are handled by [`CodedIndexType::decode_tag`].
    #[must_use]
    pub fn tables(&self) -> &'static [TableId] {
        match self {
            CodedIndexType::TypeDefOrRef => {
                &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec]
            }
            CodedIndexType::ResolutionScope => &[
                TableId::Module,
                TableId::ModuleRef,
                TableId::AssemblyRef,
                TableId::TypeRef,
            ],
            CodedIndexType::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::ModuleRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
            CodedIndexType::HasCustomAttribute => &[
                TableId::MethodDef,
                TableId::Field,
                TableId::TypeRef,
                TableId::TypeDef,
                TableId::Param,
                TableId::InterfaceImpl,
                TableId::MemberRef,
                TableId::Module,
                TableId::DeclSecurity,
                TableId::Property,
                TableId::Event,
                TableId::StandAloneSig,
                TableId::ModuleRef,
                TableId::TypeSpec,
                TableId::Assembly,
                TableId::AssemblyRef,
                TableId::File,
                TableId::ExportedType,
                TableId::ManifestResource,
                TableId::GenericParam,
                TableId::GenericParamConstraint,
                TableId::MethodSpec,
            ],
            CodedIndexType::CustomAttributeType => &[TableId::MethodDef, TableId::MemberRef],
        }
    }

    /// The number of tag bits this kind occupies.
    #[must_use]
    pub fn tag_bits(&self) -> u8 {
        match self {
            CodedIndexType::TypeDefOrRef | CodedIndexType::ResolutionScope => 2,
            CodedIndexType::MemberRefParent | CodedIndexType::CustomAttributeType => 3,
            CodedIndexType::HasCustomAttribute => 5,
        }
    }

    /// Map a tag value to the table it selects, or `None` for unused tag slots.
    #[must_use]
    pub fn decode_tag(&self, tag: u32) -> Option<TableId> {
        match self {
            // CustomAttributeType reserves tags 0, 1 and 4 as not-used
            CodedIndexType::CustomAttributeType => match tag {
                2 => Some(TableId::MethodDef),
                3 => Some(TableId::MemberRef),
                _ => None,
            },
            _ => self.tables().get(tag as usize).copied(),
        }
    }
}

/// A decoded coded index: the selected table, the 1-based row, and the equivalent
/// metadata token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodedIndex {
    /// The table the tag selected
    pub tag: TableId,
    /// The 1-based row index, 0 for "no row"
    pub row: u32,
    /// The token form of this reference
    pub token: Token,
}

impl CodedIndex {
    /// Read and decode a coded index from table row data.
    ///
    /// ## Arguments
    /// * 'data'    - The table data to read from
    /// * 'offset'  - The read position, advanced by 2 or 4 bytes
    /// * 'sizes'   - Table size information deciding the encoded width
    /// * 'ty'      - The coded index kind
    ///
    /// # Errors
    /// Returns an error if the read is out of bounds or the tag selects an unused slot.
    pub fn read(
        data: &[u8],
        offset: &mut usize,
        sizes: &TableInfoRef,
        ty: CodedIndexType,
    ) -> Result<CodedIndex> {
        let value = read_le_at_dyn(data, offset, sizes.coded_index_bytes(ty) == 4)?;

        let tag_bits = ty.tag_bits();
        let tag = value & ((1 << tag_bits) - 1);
        let row = value >> tag_bits;

        let Some(table) = ty.decode_tag(tag) else {
            return Err(malformed_error!(
                "Invalid coded index tag {} for {:?}",
                tag,
                ty
            ));
        };

        Ok(CodedIndex {
            tag: table,
            row,
            token: Token::from_parts(table as u8, row),
        })
    }
}
