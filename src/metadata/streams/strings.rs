//! String heap (`#Strings`) for .NET metadata.
//!
//! Provides access to the ECMA-335 `#Strings` heap, which stores identifier strings in
//! UTF-8 encoding, referenced by byte offset from the metadata tables.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::{ffi::CStr, str};

use crate::{Error::OutOfBounds, Result};

/// '#Strings' holds the identifiers referenced from the metadata tables: type names,
/// namespace names, method names and so on, as NUL-terminated UTF-8.
///
/// # Examples
///
/// ```rust
/// use ilrun::metadata::streams::Strings;
/// let data = &[0u8, b'H', b'e', b'l', b'l', b'o', 0u8];
/// let strings = Strings::from(data).unwrap();
/// let s = strings.get(1).unwrap();
/// assert_eq!(s, "Hello");
/// ```
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.3
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Create a `Strings` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the string heap is empty or does not start with the
    /// mandatory leading NUL
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is invalid"));
        }

        Ok(Strings { data })
    }

    /// Get a view of the string at the provided heap offset.
    ///
    /// ## Arguments
    /// * 'index' - The byte offset within the heap (comes from metadata tables)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the string data is not valid
    /// UTF-8
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data: [u8; 32] = [
            0x00,
            b'<', b'M', b'o', b'd', b'u', b'l', b'e', b'>', 0x00,
            b'P', b'r', b'o', b'g', b'r', b'a', b'm', 0x00,
            b'.', b'c', b'c', b't', b'o', b'r', 0x00,
            b'M', b'a', b'i', b'n', 0x00, 0x00, 0x00,
        ];

        let str_view = Strings::from(&data).unwrap();

        assert_eq!(str_view.get(1).unwrap(), "<Module>");
        assert_eq!(str_view.get(10).unwrap(), "Program");
        assert_eq!(str_view.get(18).unwrap(), ".cctor");
        assert_eq!(str_view.get(25).unwrap(), "Main");

        // Offsets into the middle of an entry are legal and yield the suffix
        assert_eq!(str_view.get(11).unwrap(), "rogram");

        assert!(str_view.get(100).is_err());
    }

    #[test]
    fn missing_leading_nul() {
        let data = [b'A', 0x00];
        assert!(Strings::from(&data).is_err());
    }
}
