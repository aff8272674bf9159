//! GUID heap (`#GUID`) for .NET metadata.
//!
//! Provides access to the ECMA-335 `#GUID` heap, a sequence of 128-bit GUIDs addressed
//! by 1-based index from the metadata tables (the `Module` table's `mvid` most notably).
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// '#GUID' is a heap containing a sequence of 128-bit GUIDs. Indices are 1-based; index
/// 0 denotes "no GUID".
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.5
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Create a `Guid` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is too small to contain a single GUID
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() < 16 {
            return Err(malformed_error!("Data for #GUID heap is too small"));
        }

        Ok(Guid { data })
    }

    /// Returns the GUID at the specified 1-based index.
    ///
    /// ## Arguments
    /// * 'index' - The index of the GUID to be accessed (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is 0 or out of bounds
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index < 1 {
            return Err(OutOfBounds);
        }

        let offset = (index - 1) * 16;
        if offset + 16 > self.data.len() {
            return Err(OutOfBounds);
        }

        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(&self.data[offset..offset + 16]);

        Ok(uguid::Guid::from_bytes(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut data = [0u8; 32];
        data[0] = 0x11;
        data[16] = 0x22;

        let guids = Guid::from(&data).unwrap();

        assert_eq!(guids.get(1).unwrap().to_bytes()[0], 0x11);
        assert_eq!(guids.get(2).unwrap().to_bytes()[0], 0x22);

        assert!(guids.get(0).is_err());
        assert!(guids.get(3).is_err());
    }

    #[test]
    fn too_small() {
        let data = [0u8; 8];
        assert!(Guid::from(&data).is_err());
    }
}
