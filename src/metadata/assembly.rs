//! Main entry point for loading and inspecting .NET assemblies.
//!
//! [`Assembly`] is an immutable view over a loaded PE/CLI image: the raw bytes, the
//! parsed header chain, the metadata root and streams, and typed, token-indexed access
//! to the metadata tables. It is constructed from a path or a byte buffer, moved into
//! the runtime's registry, and never mutated afterwards.

use std::fmt;
use std::path::Path;

use crate::{
    file::{
        pe::SectionHeader,
        File,
    },
    metadata::{
        cor20header::Cor20Header,
        method::MethodBody,
        root::Root,
        streams::{Blob, Guid, Strings, TablesStream, UserStrings},
        tables::{
            AssemblyRefRaw, ClassLayoutRaw, FieldRaw, MemberRefRaw, MetadataTable, MethodDefRaw,
            ModuleRaw, RowDefinition, TableId, TypeDefRaw, TypeRefRaw,
        },
        token::Token,
    },
    Error::MissingRow,
    Result,
};

/// The cross-assembly resolution key: which assembly, namespace, type and member a
/// `MemberRef` names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedName {
    /// The referenced assembly's simple name (from `AssemblyRef`)
    pub assembly_name: String,
    /// The namespace of the referenced type
    pub namespace: String,
    /// The name of the referenced type
    pub type_name: String,
    /// The name of the referenced member
    pub member_name: String,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]{}.{}::{}",
            self.assembly_name, self.namespace, self.type_name, self.member_name
        )
    }
}

/// An immutable view over a loaded PE/CLI image.
///
/// Construction parses and validates the complete header chain (DOS → COFF → optional
/// header → sections → CLR runtime header → metadata root → streams → tables); every
/// later accessor works on the validated structures. Heap and table views borrow from
/// the image bytes and are built on demand.
///
/// # Examples
///
/// ```rust,no_run
/// use ilrun::Assembly;
/// use std::path::Path;
///
/// let assembly = Assembly::from_path(Path::new("example.dll"))?;
/// println!("module: {}", assembly.module_name()?);
/// println!("entry point: {}", assembly.entry_point());
/// # Ok::<(), ilrun::Error>(())
/// ```
pub struct Assembly {
    file: File,
    cor20: Cor20Header,
    root: Root,
    /// Absolute file offset of the metadata root
    root_offset: usize,
    tables: TablesStream,
    /// Per-stream `(absolute offset, size)` pairs
    strings_range: Option<(usize, usize)>,
    user_strings_range: Option<(usize, usize)>,
    blob_range: Option<(usize, usize)>,
    guid_range: Option<(usize, usize)>,
    tilde_range: (usize, usize),
}

impl Assembly {
    /// Load an assembly from a file on disk.
    ///
    /// # Arguments
    /// * `path` - Path to the PE/CLI image
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or any part of the image fails
    /// validation.
    pub fn from_path(path: &Path) -> Result<Assembly> {
        Self::load(File::from_path(path)?)
    }

    /// Load an assembly from a byte buffer.
    ///
    /// # Arguments
    /// * `data` - The complete image bytes
    ///
    /// # Errors
    /// Returns an error if any part of the image fails validation.
    pub fn from_mem(data: Vec<u8>) -> Result<Assembly> {
        Self::load(File::from_mem(data)?)
    }

    fn load(file: File) -> Result<Assembly> {
        let clr_directory = *file.clr()?;
        let clr_offset = file.rva_to_offset(clr_directory.rva)?;
        let cor20 = Cor20Header::read(file.data_slice(clr_offset, 72)?)?;

        let root_offset = file.rva_to_offset(cor20.meta_data.rva)?;
        let meta_slice = file.data_slice(root_offset, cor20.meta_data.size as usize)?;
        let root = Root::read(meta_slice)?;

        let mut strings_range = None;
        let mut user_strings_range = None;
        let mut blob_range = None;
        let mut guid_range = None;
        let mut tilde_range = None;

        for header in &root.stream_headers {
            let range = (root_offset + header.offset as usize, header.size as usize);
            match header.name.as_str() {
                "#~" => tilde_range = Some(range),
                "#Strings" => strings_range = Some(range),
                "#US" => user_strings_range = Some(range),
                "#Blob" => blob_range = Some(range),
                "#GUID" => guid_range = Some(range),
                _ => {}
            }
        }

        let Some(tilde_range) = tilde_range else {
            return Err(malformed_error!("Image has no #~ stream"));
        };

        let tables = TablesStream::parse(file.data_slice(tilde_range.0, tilde_range.1)?)?;

        Ok(Assembly {
            file,
            cor20,
            root,
            root_offset,
            tables,
            strings_range,
            user_strings_range,
            blob_range,
            guid_range,
            tilde_range,
        })
    }

    /// The parsed CLR runtime header
    #[must_use]
    pub fn cor20(&self) -> &Cor20Header {
        &self.cor20
    }

    /// The parsed metadata root
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The parsed `#~` stream header
    #[must_use]
    pub fn tables_stream(&self) -> &TablesStream {
        &self.tables
    }

    /// The metadata token of the image's entry point method
    #[must_use]
    pub fn entry_point(&self) -> Token {
        Token::new(self.cor20.entry_point_token)
    }

    /// The stack reserve size from the optional header; sizes the evaluation stack
    #[must_use]
    pub fn stack_reserve(&self) -> u64 {
        self.file.pe().optional.size_of_stack_reserve
    }

    fn stream(&self, range: Option<(usize, usize)>, name: &str) -> Result<&[u8]> {
        match range {
            Some((offset, size)) => self.file.data_slice(offset, size),
            None => Err(malformed_error!("Image has no {} stream", name)),
        }
    }

    /// The `#Strings` heap.
    ///
    /// # Errors
    /// Returns an error if the stream is absent or malformed.
    pub fn strings(&self) -> Result<Strings<'_>> {
        Strings::from(self.stream(self.strings_range, "#Strings")?)
    }

    /// The `#US` heap.
    ///
    /// # Errors
    /// Returns an error if the stream is absent or malformed.
    pub fn user_strings(&self) -> Result<UserStrings<'_>> {
        UserStrings::from(self.stream(self.user_strings_range, "#US")?)
    }

    /// The `#Blob` heap.
    ///
    /// # Errors
    /// Returns an error if the stream is absent or malformed.
    pub fn blobs(&self) -> Result<Blob<'_>> {
        Blob::from(self.stream(self.blob_range, "#Blob")?)
    }

    /// The `#GUID` heap.
    ///
    /// # Errors
    /// Returns an error if the stream is absent or malformed.
    pub fn guids(&self) -> Result<Guid<'_>> {
        Guid::from(self.stream(self.guid_range, "#GUID")?)
    }

    /// Look up a string in the `#Strings` heap.
    ///
    /// # Arguments
    /// * `index` - The heap offset, as stored in a table row
    ///
    /// # Errors
    /// Returns an error if the heap is absent or the index invalid.
    pub fn string(&self, index: u32) -> Result<&str> {
        self.strings()?.get(index as usize)
    }

    /// Decode a string literal from the `#US` heap.
    ///
    /// # Arguments
    /// * `index` - The heap offset, usually the row part of an `ldstr` token
    ///
    /// # Errors
    /// Returns an error if the heap is absent or the index invalid.
    pub fn user_string(&self, index: u32) -> Result<String> {
        self.user_strings()?.get(index as usize)
    }

    /// Look up raw bytes in the `#Blob` heap.
    ///
    /// # Arguments
    /// * `index` - The heap offset, as stored in a table row
    ///
    /// # Errors
    /// Returns an error if the heap is absent or the index invalid.
    pub fn blob(&self, index: u32) -> Result<&[u8]> {
        self.blobs()?.get(index as usize)
    }

    fn tilde(&self) -> &[u8] {
        // The range was validated during load
        self.file
            .data_slice(self.tilde_range.0, self.tilde_range.1)
            .unwrap_or(&[])
    }

    /// Get a typed view over one metadata table, or `None` if the table has no rows.
    #[must_use]
    pub fn table<T: RowDefinition>(&self) -> Option<MetadataTable<'_, T>> {
        self.tables.table::<T>(self.tilde())
    }

    /// The row count of the given table, 0 if absent
    #[must_use]
    pub fn row_count(&self, table_id: TableId) -> u32 {
        self.tables.row_count(table_id)
    }

    /// Resolve a token to a typed table row.
    ///
    /// Succeeds iff the token's table matches `T` and its row index is within
    /// `1..=row_count`.
    ///
    /// # Arguments
    /// * `token` - The metadata token to resolve
    ///
    /// # Errors
    /// Returns [`MissingRow`] on table mismatch or out-of-range index.
    pub fn row<T: RowDefinition>(&self, token: Token) -> Result<T> {
        if token.table() != T::TABLE as u8 {
            return Err(MissingRow(token));
        }

        match self.table::<T>() {
            Some(table) => table.get(token.row()).ok_or(MissingRow(token)),
            None => Err(MissingRow(token)),
        }
    }

    /// The image's `Module` row.
    ///
    /// # Errors
    /// Returns an error if the `Module` table is absent.
    pub fn module(&self) -> Result<ModuleRaw> {
        self.row::<ModuleRaw>(Token::new(0x0000_0001))
    }

    /// The module name from the `Module` table; the registry key of this assembly.
    ///
    /// # Errors
    /// Returns an error if the `Module` table or the `#Strings` heap is absent.
    pub fn module_name(&self) -> Result<&str> {
        let module = self.module()?;
        self.string(module.name)
    }

    /// The unique section whose virtual range contains `rva`, or `None`.
    #[must_use]
    pub fn section_at_rva(&self, rva: u32) -> Option<&SectionHeader> {
        self.file.pe().section_at_rva(rva)
    }

    /// The `size`-byte slice starting at `rva` within `section`.
    ///
    /// # Arguments
    /// * `section` - The section holding the RVA
    /// * `rva`     - The relative virtual address to read at
    /// * `size`    - The number of bytes to read
    ///
    /// # Errors
    /// Returns an error if `rva + size` escapes the section's virtual size or the
    /// underlying file data.
    pub fn section_bytes(&self, section: &SectionHeader, rva: u32, size: usize) -> Result<&[u8]> {
        let section_end = u64::from(section.virtual_address) + u64::from(section.virtual_size);
        if u64::from(rva) + size as u64 > section_end {
            return Err(malformed_error!(
                "Read of {} bytes at RVA {:#x} escapes section '{}'",
                size,
                rva,
                section.name_str()
            ));
        }

        let offset = section.offset_of_rva(rva)?;
        self.file.data_slice(offset, size)
    }

    /// Resolve a method's body header and code bytes through its RVA.
    ///
    /// # Arguments
    /// * `method` - The `MethodDef` row to read the body of
    ///
    /// # Errors
    /// Returns an error if the method has no body, the RVA maps into no section, or
    /// the header/code bytes are out of bounds.
    pub fn method_body(&self, method: &MethodDefRaw) -> Result<(MethodBody, &[u8])> {
        if method.rva == 0 {
            return Err(malformed_error!(
                "Method {} has no body",
                method.token
            ));
        }

        let Some(section) = self.section_at_rva(method.rva) else {
            return Err(malformed_error!(
                "No section contains method body RVA {:#x}",
                method.rva
            ));
        };

        // All bytes from the body start to the section end; the header bounds the
        // actual code size within them.
        let section_end = u64::from(section.virtual_address) + u64::from(section.virtual_size);
        let raw_end = u64::from(section.virtual_address) + u64::from(section.size_of_raw_data);
        let data_end = section_end.min(raw_end);
        if data_end <= u64::from(method.rva) {
            return Err(malformed_error!(
                "Method body RVA {:#x} lies past the initialized data of section '{}'",
                method.rva,
                section.name_str()
            ));
        }
        let available = (data_end - u64::from(method.rva)) as usize;

        let bytes = self.section_bytes(section, method.rva, available)?;
        let body = MethodBody::from(bytes)?;

        let code = bytes
            .get(body.size_header..body.size_header + body.size_code)
            .ok_or(crate::Error::OutOfBounds)?;

        Ok((body, code))
    }

    /// The half-open member range `[start, end)` that a `TypeDef` row owns, following
    /// the CLI range-list convention: the next row's list index bounds this row's
    /// range, and the last row extends through the end of the member table.
    fn member_range(
        &self,
        typedefs: &MetadataTable<'_, TypeDefRaw>,
        rid: u32,
        list: fn(&TypeDefRaw) -> u32,
        member_count: u32,
    ) -> Option<(u32, u32)> {
        let row = typedefs.get(rid)?;
        let start = list(&row);
        if start == 0 {
            return None;
        }

        let end = match typedefs.get(rid + 1) {
            Some(next) => list(&next),
            None => member_count + 1,
        };

        Some((start, end))
    }

    /// Find the `TypeDef` that owns the method with the given row index.
    ///
    /// # Arguments
    /// * `method_rid` - The 1-based `MethodDef` row index
    ///
    /// # Errors
    /// Returns an error if no type's method range contains the row.
    pub fn type_def_of_method(&self, method_rid: u32) -> Result<TypeDefRaw> {
        let typedefs = self
            .table::<TypeDefRaw>()
            .ok_or(MissingRow(MethodDefRaw::token(method_rid)))?;
        let method_count = self.row_count(TableId::MethodDef);

        for rid in 1..=typedefs.row_count() {
            if let Some((start, end)) =
                self.member_range(&typedefs, rid, |row| row.method_list, method_count)
            {
                if method_rid >= start && method_rid < end {
                    return Ok(typedefs.get(rid).ok_or(MissingRow(TypeDefRaw::token(rid)))?);
                }
            }
        }

        Err(malformed_error!(
            "No TypeDef owns method row {}",
            method_rid
        ))
    }

    /// Find the `TypeDef` that owns the field with the given row index.
    ///
    /// # Arguments
    /// * `field_rid` - The 1-based `Field` row index
    ///
    /// # Errors
    /// Returns an error if no type's field range contains the row.
    pub fn type_def_of_field(&self, field_rid: u32) -> Result<TypeDefRaw> {
        let typedefs = self
            .table::<TypeDefRaw>()
            .ok_or(MissingRow(FieldRaw::token(field_rid)))?;
        let field_count = self.row_count(TableId::Field);

        for rid in 1..=typedefs.row_count() {
            if let Some((start, end)) =
                self.member_range(&typedefs, rid, |row| row.field_list, field_count)
            {
                if field_rid >= start && field_rid < end {
                    return Ok(typedefs.get(rid).ok_or(MissingRow(TypeDefRaw::token(rid)))?);
                }
            }
        }

        Err(malformed_error!("No TypeDef owns field row {}", field_rid))
    }

    /// The `ClassLayout` row of the given type, if it has an explicit layout.
    ///
    /// # Arguments
    /// * `typedef_rid` - The 1-based `TypeDef` row index
    #[must_use]
    pub fn class_layout_of_type(&self, typedef_rid: u32) -> Option<ClassLayoutRaw> {
        let layouts = self.table::<ClassLayoutRaw>()?;
        layouts.iter().find(|layout| layout.parent == typedef_rid)
    }

    /// The allocation size of the given type: its explicit `class_size` if a
    /// `ClassLayout` row exists, a pointer-sized default otherwise.
    ///
    /// # Arguments
    /// * `typedef_rid` - The 1-based `TypeDef` row index
    #[must_use]
    pub fn type_size(&self, typedef_rid: u32) -> u64 {
        match self.class_layout_of_type(typedef_rid) {
            Some(layout) => u64::from(layout.class_size),
            None => 8,
        }
    }

    /// Find a method by namespace, type name and method name through a linear scan of
    /// the `TypeDef` table and the matching type's method range.
    ///
    /// # Arguments
    /// * `namespace_name` - The namespace of the owning type
    /// * `type_name`      - The name of the owning type
    /// * `method_name`    - The method name
    ///
    /// # Errors
    /// Returns an error if heap lookups fail; an absent method is `Ok(None)`.
    pub fn method_by_name(
        &self,
        namespace_name: &str,
        type_name: &str,
        method_name: &str,
    ) -> Result<Option<MethodDefRaw>> {
        let Some(typedefs) = self.table::<TypeDefRaw>() else {
            return Ok(None);
        };
        let strings = self.strings()?;

        for typedef in typedefs.iter() {
            if strings.get(typedef.type_namespace as usize)? != namespace_name {
                continue;
            }

            if strings.get(typedef.type_name as usize)? != type_name {
                continue;
            }

            return self.method_of_type(&typedef, method_name);
        }

        Ok(None)
    }

    /// Find a method of the given type by name within its method-list range.
    ///
    /// # Arguments
    /// * `typedef`     - The owning `TypeDef` row
    /// * `method_name` - The method name
    ///
    /// # Errors
    /// Returns an error if heap lookups fail; an absent method is `Ok(None)`.
    pub fn method_of_type(
        &self,
        typedef: &TypeDefRaw,
        method_name: &str,
    ) -> Result<Option<MethodDefRaw>> {
        let Some(typedefs) = self.table::<TypeDefRaw>() else {
            return Ok(None);
        };
        let Some(methods) = self.table::<MethodDefRaw>() else {
            return Ok(None);
        };
        let strings = self.strings()?;

        let Some((start, end)) = self.member_range(
            &typedefs,
            typedef.rid,
            |row| row.method_list,
            methods.row_count(),
        ) else {
            return Ok(None);
        };

        for rid in start..end {
            let Some(method) = methods.get(rid) else {
                break;
            };

            if strings.get(method.name as usize)? == method_name {
                return Ok(Some(method));
            }
        }

        Ok(None)
    }

    /// Resolve a `MemberRef` token to its cross-assembly qualified name through the
    /// `MemberRef → TypeRef → AssemblyRef` chain.
    ///
    /// # Arguments
    /// * `member_ref_token` - A token into the `MemberRef` table
    ///
    /// # Errors
    /// Returns an error if any row of the chain is missing, or the member's parent is
    /// not an assembly-scoped `TypeRef`.
    pub fn qualified_member_name(&self, member_ref_token: Token) -> Result<QualifiedName> {
        let member_ref = self.row::<MemberRefRaw>(member_ref_token)?;

        if member_ref.class.tag != TableId::TypeRef {
            return Err(crate::Error::NotSupported(format!(
                "MemberRef {} parent is {:?}, only TypeRef parents resolve across assemblies",
                member_ref_token, member_ref.class.tag
            )));
        }
        let type_ref = self.row::<TypeRefRaw>(member_ref.class.token)?;

        if type_ref.resolution_scope.tag != TableId::AssemblyRef {
            return Err(crate::Error::NotSupported(format!(
                "TypeRef {} resolution scope is {:?}, expected AssemblyRef",
                member_ref.class.token, type_ref.resolution_scope.tag
            )));
        }
        let assembly_ref = self.row::<AssemblyRefRaw>(type_ref.resolution_scope.token)?;

        Ok(QualifiedName {
            assembly_name: self.string(assembly_ref.name)?.to_string(),
            namespace: self.string(type_ref.type_namespace)?.to_string(),
            type_name: self.string(type_ref.type_name)?.to_string(),
            member_name: self.string(member_ref.name)?.to_string(),
        })
    }
}
