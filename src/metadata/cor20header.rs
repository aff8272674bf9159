//! CLR 2.0 (Cor20) header parsing for .NET assemblies.
//!
//! This module defines the [`Cor20Header`] struct, which represents the main header for
//! .NET assemblies as found in data directory 14 of PE files.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, file::pe::DataDirectory, Error::OutOfBounds, Result};

/// The main header of CIL, located at the beginning of the CLR runtime header data
/// directory of PE files.
///
/// All RVA/size pairs are grouped as [`DataDirectory`] values; the `meta_data`
/// directory leads to the metadata root, and `entry_point_token` names the method the
/// interpreter starts in.
pub struct Cor20Header {
    /// Size of the header in bytes, always 72
    pub cb: u32,
    /// The minimum major version of the runtime required to run this program
    pub major_runtime_version: u16,
    /// The minor portion of the version
    pub minor_runtime_version: u16,
    /// Location of the metadata root
    pub meta_data: DataDirectory,
    /// Flags describing this runtime image
    pub flags: u32,
    /// Token for the `MethodDef` (or `File`) of the entry point for the image
    pub entry_point_token: u32,
    /// Location of implementation-specific resources
    pub resources: DataDirectory,
    /// Hash data used by the CLI loader for binding and versioning
    pub strong_name_signature: DataDirectory,
    /// Reserved, always 0
    pub code_manager_table: DataDirectory,
    /// Array of function-pointer fixup locations
    pub vtable_fixups: DataDirectory,
    /// Reserved, always 0
    pub export_address_table_jumps: DataDirectory,
    /// Reserved, always 0
    pub managed_native_header: DataDirectory,
}

impl Cor20Header {
    /// Create a `Cor20Header` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is too short to contain a valid CLR header, or if
    /// field validation per ECMA-335 II.25.3.3 fails.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < 72 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;
        if major_runtime_version == 0 || major_runtime_version > 10 {
            return Err(malformed_error!(
                "Invalid major runtime version: {}",
                major_runtime_version
            ));
        }

        let meta_data = DataDirectory::read(&mut parser)?;
        if meta_data.rva == 0 || meta_data.size == 0 {
            return Err(malformed_error!("Metadata directory cannot be empty"));
        }

        let flags = parser.read_le::<u32>()?;
        let entry_point_token = parser.read_le::<u32>()?;

        let resources = DataDirectory::read(&mut parser)?;
        let strong_name_signature = DataDirectory::read(&mut parser)?;
        let code_manager_table = DataDirectory::read(&mut parser)?;
        let vtable_fixups = DataDirectory::read(&mut parser)?;
        let export_address_table_jumps = DataDirectory::read(&mut parser)?;
        let managed_native_header = DataDirectory::read(&mut parser)?;

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data,
            flags,
            entry_point_token,
            resources,
            strong_name_signature,
            code_manager_table,
            vtable_fixups,
            export_address_table_jumps,
            managed_native_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x48, 0x00, 0x00, 0x00, // cb = 72
            0x02, 0x00,             // major_runtime_version = 2
            0x05, 0x00,             // minor_runtime_version = 5
            0x00, 0x11, 0x00, 0x00, // meta_data.rva = 0x1100
            0x00, 0x02, 0x00, 0x00, // meta_data.size = 0x200
            0x01, 0x00, 0x00, 0x00, // flags = ILONLY
            0x01, 0x00, 0x00, 0x06, // entry_point_token = 0x06000001
            0x00, 0x00, 0x00, 0x00, // resources.rva
            0x00, 0x00, 0x00, 0x00, // resources.size
            0x00, 0x00, 0x00, 0x00, // strong_name_signature.rva
            0x00, 0x00, 0x00, 0x00, // strong_name_signature.size
            0x00, 0x00, 0x00, 0x00, // code_manager_table.rva
            0x00, 0x00, 0x00, 0x00, // code_manager_table.size
            0x00, 0x00, 0x00, 0x00, // vtable_fixups.rva
            0x00, 0x00, 0x00, 0x00, // vtable_fixups.size
            0x00, 0x00, 0x00, 0x00, // export_address_table_jumps.rva
            0x00, 0x00, 0x00, 0x00, // export_address_table_jumps.size
            0x00, 0x00, 0x00, 0x00, // managed_native_header.rva
            0x00, 0x00, 0x00, 0x00, // managed_native_header.size
        ];

        let parsed_header = Cor20Header::read(&header_bytes).unwrap();

        assert_eq!(parsed_header.cb, 72);
        assert_eq!(parsed_header.major_runtime_version, 2);
        assert_eq!(parsed_header.minor_runtime_version, 5);
        assert_eq!(parsed_header.meta_data.rva, 0x1100);
        assert_eq!(parsed_header.meta_data.size, 0x200);
        assert_eq!(parsed_header.flags, 1);
        assert_eq!(parsed_header.entry_point_token, 0x06000001);
        assert!(parsed_header.resources.is_empty());
        assert!(parsed_header.vtable_fixups.is_empty());
    }

    #[test]
    fn wrong_size() {
        let mut header_bytes = [0u8; 72];
        header_bytes[0] = 0x40; // cb = 64

        assert!(Cor20Header::read(&header_bytes).is_err());
    }

    #[test]
    fn empty_metadata_directory() {
        let mut header_bytes = [0u8; 72];
        header_bytes[0] = 72;
        header_bytes[4] = 2; // major runtime version

        assert!(Cor20Header::read(&header_bytes).is_err());
    }
}
