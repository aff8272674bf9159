//! Representation and parsing of CIL method bodies in .NET assemblies.
//!
//! This module decodes the method header that precedes every CIL method body.
//! Both header formats from ECMA-335 are supported: the 1-byte tiny header for small
//! methods and the 12-byte fat header carrying stack depth, local-variable signature
//! and flags.
//!
//! # References
//! - ECMA-335 6th Edition, Partition II, Section 25.4 - Method Header Format

use bitflags::bitflags;

use crate::{
    file::io::read_le,
    Error::OutOfBounds,
    Result,
};

bitflags! {
    #[derive(PartialEq)]
    /// Flags of the method body header, stored in the low 12 bits of a fat header's
    /// first two bytes (the low 2 bits select the header format)
    pub struct MethodBodyFlags: u16 {
        /// Method header is the tiny format
        const TINY_FORMAT = 0x0002;
        /// Method header is the fat format
        const FAT_FORMAT = 0x0003;
        /// More sections follow after this header
        const MORE_SECTS = 0x0008;
        /// Call default constructor on all local variables
        const INIT_LOCALS = 0x0010;
    }
}

/// Describes one method that has been compiled to CIL bytecode.
///
/// The `MethodBody` struct represents the parsed body header of a .NET method: header
/// and code sizes, stack requirements and the local variable signature token. The code
/// bytes themselves follow the header in the image and are sliced by the caller using
/// `size_header` and `size_code`.
pub struct MethodBody {
    /// Size of the method (length of all instructions, not counting the header) in bytes
    pub size_code: usize,
    /// Size of the method header in bytes
    pub size_header: usize,
    /// Metadata token of a `StandAloneSig` describing the local variables, 0 == no locals
    pub local_var_sig_token: u32,
    /// Maximum number of items on the operand stack
    pub max_stack: usize,
    /// Flag, indicating the type of the method header
    pub is_fat: bool,
    /// Flag, indicating to call the default constructor on all local variables
    pub is_init_local: bool,
}

impl MethodBody {
    /// Create a `MethodBody` object from a sequence of bytes.
    ///
    /// # Arguments
    /// * `data` - The byte slice starting at the method header
    ///
    /// # Errors
    /// Returns an error if the data is empty, out of bounds, or the header is neither
    /// tiny nor fat.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_0000_0011_u8)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;

                let size_header = (first_duo >> 12) * 4;
                if size_header < 12 {
                    return Err(malformed_error!(
                        "Fat header size too small - {}",
                        size_header
                    ));
                }

                let size_code = read_le::<u32>(&data[4..])?;
                if data.len() < (size_code as usize + size_header as usize) {
                    return Err(OutOfBounds);
                }

                let flags_header =
                    MethodBodyFlags::from_bits_truncate(first_duo & 0b_0000_1111_1111_1111_u16);
                let max_stack = read_le::<u16>(&data[2..])? as usize;
                let local_var_sig_token = read_le::<u32>(&data[8..])?;

                Ok(MethodBody {
                    size_code: size_code as usize,
                    size_header: size_header as usize,
                    local_var_sig_token,
                    max_stack,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// Get the full size of this method
    #[must_use]
    pub fn size(&self) -> usize {
        self.size_code + self.size_header
    }
}
