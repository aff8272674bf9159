use strum::{EnumCount, EnumIter};

/// Identifiers for the metadata tables defined in the ECMA-335 specification.
///
/// The numeric values correspond to the table ids as defined in the CLI specification
/// and to the high byte of metadata tokens referencing rows of each table. The `#~`
/// stream stores its `valid` bitmask, row counts and row data in ascending table-id
/// order.
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
pub enum TableId {
    /// `Module` table (0x00) - information about the current module
    Module = 0x00,
    /// `TypeRef` table (0x01) - references to types defined in external assemblies
    TypeRef = 0x01,
    /// `TypeDef` table (0x02) - type definitions of the current module
    TypeDef = 0x02,
    /// `FieldPtr` table (0x03) - field indirection for edit-and-continue scenarios
    FieldPtr = 0x03,
    /// `Field` table (0x04) - field definitions within types
    Field = 0x04,
    /// `MethodPtr` table (0x05) - method indirection for edit-and-continue scenarios
    MethodPtr = 0x05,
    /// `MethodDef` table (0x06) - method definitions
    MethodDef = 0x06,
    /// `ParamPtr` table (0x07) - parameter indirection for edit-and-continue scenarios
    ParamPtr = 0x07,
    /// `Param` table (0x08) - method parameter definitions
    Param = 0x08,
    /// `InterfaceImpl` table (0x09) - interface implementations by types
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A) - references to members of external types
    MemberRef = 0x0A,
    /// `Constant` table (0x0B) - compile-time constant values
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C) - custom attribute applications
    CustomAttribute = 0x0C,
    /// `FieldMarshal` table (0x0D) - P/Invoke marshalling information
    FieldMarshal = 0x0D,
    /// `DeclSecurity` table (0x0E) - declarative security permissions
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F) - explicit memory layout information for types
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10) - explicit field offsets within types
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11) - standalone signatures (locals, indirect calls)
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12) - type-to-event mappings
    EventMap = 0x12,
    /// `EventPtr` table (0x13) - event indirection for edit-and-continue scenarios
    EventPtr = 0x13,
    /// `Event` table (0x14) - event definitions
    Event = 0x14,
    /// `PropertyMap` table (0x15) - type-to-property mappings
    PropertyMap = 0x15,
    /// `PropertyPtr` table (0x16) - property indirection for edit-and-continue scenarios
    PropertyPtr = 0x16,
    /// `Property` table (0x17) - property definitions
    Property = 0x17,
    /// `MethodSemantics` table (0x18) - property/event accessor mappings
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19) - method implementation mappings
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A) - external module references
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B) - generic type specifications
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C) - P/Invoke implementation mappings
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D) - field relative virtual addresses for initialized data
    FieldRVA = 0x1D,
    /// `EncLog` table (0x1E) - edit-and-continue log
    EncLog = 0x1E,
    /// `EncMap` table (0x1F) - edit-and-continue map
    EncMap = 0x1F,
    /// `Assembly` table (0x20) - current assembly metadata
    Assembly = 0x20,
    /// `AssemblyProcessor` table (0x21) - processor-specific assembly info
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` table (0x22) - OS-specific assembly info
    AssemblyOS = 0x22,
    /// `AssemblyRef` table (0x23) - external assembly references
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` table (0x24) - external assembly processor info
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` table (0x25) - external assembly OS info
    AssemblyRefOS = 0x25,
    /// `File` table (0x26) - file references in the assembly
    File = 0x26,
    /// `ExportedType` table (0x27) - types exported from this assembly
    ExportedType = 0x27,
    /// `ManifestResource` table (0x28) - embedded or linked resources
    ManifestResource = 0x28,
    /// `NestedClass` table (0x29) - nested class relationships
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A) - generic parameter definitions
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B) - generic method specifications
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C) - generic parameter constraints
    GenericParamConstraint = 0x2C,
}
