//! User string heap (`#US`) for .NET metadata.
//!
//! Provides access to the ECMA-335 `#US` heap, which stores user-defined string literals
//! in UTF-16LE encoding. Each entry carries a compressed-integer length prefix and a
//! trailing "terminal" byte that is not part of the string.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

use widestring::U16Str;

/// The `UserStrings` object provides access to the data within the '#US' heap, the pool
/// of string literals that `ldstr` tokens point into.
///
/// # Examples
///
/// ```rust
/// use ilrun::metadata::streams::UserStrings;
/// let data = &[0u8, 0x03, b'A', 0x00, 0x00];
/// let us = UserStrings::from(data).unwrap();
/// let s = us.get(1).unwrap();
/// assert_eq!(s, "A");
/// ```
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.4
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Create a `UserStrings` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the user string heap is empty or does not start with the
    /// mandatory leading NUL
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(OutOfBounds);
        }

        Ok(UserStrings { data })
    }

    /// Decode the string at the provided heap offset.
    ///
    /// The entry's compressed length counts the UTF-16LE payload plus one terminal
    /// byte; the terminal byte is dropped from the returned string.
    ///
    /// ## Arguments
    /// * 'index' - The byte offset within the heap (comes from `ldstr` tokens)
    ///
    /// # Errors
    /// Returns an error if the index is out of bounds or the entry is not valid UTF-16
    pub fn get(&self, index: usize) -> Result<String> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(self.data);
        if index > 0 {
            parser.seek(index)?;
        }

        let length = parser.read_compressed_uint()? as usize;
        if length == 0 {
            return Ok(String::new());
        }

        if parser.pos() + length > self.data.len() {
            return Err(OutOfBounds);
        }

        // The final byte is the terminal flag, the rest must be UTF-16 pairs
        if length % 2 != 1 {
            return Err(malformed_error!(
                "Invalid user string length at index - {}",
                index
            ));
        }

        let mut units: Vec<u16> = Vec::with_capacity((length - 1) / 2);
        for _ in 0..(length - 1) / 2 {
            units.push(parser.read_le::<u16>()?);
        }

        match U16Str::from_slice(&units).to_string() {
            Ok(result) => Ok(result),
            Err(_) => Err(malformed_error!("Invalid user string at index - {}", index)),
        }
    }
}
