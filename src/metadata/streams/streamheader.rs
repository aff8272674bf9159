//! Stream header for .NET metadata streams.
//!
//! Provides parsing of stream headers, which describe the name, offset, and size of each
//! metadata stream in a .NET assembly. Names are not restricted to the five streams this
//! crate consumes: images legitimately carry additional streams (`#Pdb`, `#-`, vendor
//! extensions), and their headers must still parse so the directory walk stays aligned.
//! Unrecognized streams are simply never looked at again.
//!
//! # Reference
//! - [ECMA-335 II.24.2.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::io::read_le, Error::OutOfBounds, Result};

/// A stream header provides the name, position and length of one metadata stream. The
/// length of a stream header structure is not fixed: the name is a variable-length
/// NUL-terminated string of at most 32 characters, padded up to a 4-byte boundary.
///
/// ## Reference
/// * '<https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf>' - II.24.2.2
pub struct StreamHeader {
    /// Offset of the stream, relative to the start of the metadata root
    pub offset: u32,
    /// Size of this stream in bytes, shall be a multiple of 4
    pub size: u32,
    /// Name of the stream, at most 32 characters
    pub name: String,
}

impl StreamHeader {
    /// Create a `StreamHeader` object from a sequence of bytes
    ///
    /// # Arguments
    /// * 'data' - The byte slice from which this object shall be created
    ///
    /// # Errors
    /// Returns an error if the data is too short for the fixed fields or the name is
    /// not NUL-terminated within its 32-character limit
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let mut name = String::with_capacity(32);
        let mut terminated = false;
        for counter in 0..std::cmp::min(32, data.len() - 8) {
            let name_char = read_le::<u8>(&data[8 + counter..])?;
            if name_char == 0 {
                terminated = true;
                break;
            }

            name.push(char::from(name_char));
        }

        if !terminated {
            return Err(malformed_error!(
                "Stream header name is not NUL-terminated - '{}'",
                name
            ));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// The number of bytes this header occupies in the stream directory: 8 bytes of
    /// offset/size plus the NUL-terminated name padded to a 4-byte boundary.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        8 + (((self.name.len() + 1) + 3) & !3)
    }
}
