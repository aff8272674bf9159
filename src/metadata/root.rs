//! Metadata root header and stream directory for .NET assemblies.
//!
//! This module defines the [`Root`] struct, which represents the root metadata header
//! and stream directory as specified by ECMA-335. The metadata root is the entry point
//! for reading assembly metadata: it carries the version string and the directory of
//! all metadata streams.
//!
//! The directory walk is tolerant of stream names this crate does not consume: real
//! images carry streams beyond the five known ones (`#Pdb`, `#-`, vendor extensions),
//! and those entries are recorded but otherwise ignored, matching how consumers pick
//! the streams they understand and skip the rest.
//!
//! # Reference
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, metadata::streams::StreamHeader, Error::OutOfBounds, Result};

/// The MAGIC value indicating the CIL metadata root: 'BSJB'
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The header of the present metadata, providing the information necessary for locating
/// and parsing all metadata streams.
///
/// # Example
///
/// ```rust
/// use ilrun::metadata::root::Root;
/// let root = Root::read(&[
///     0x42, 0x53, 0x4A, 0x42,
///     0x01, 0x00,
///     0x01, 0x00,
///     0x00, 0x00, 0x00, 0x00,
///     0x04, 0x00, 0x00, 0x00,
///     b'v', b'4', 0x00, 0x00,
///     0x00, 0x00,
///     0x01, 0x00,
///     0x20, 0x00, 0x00, 0x00, // StreamHeader offset
///     0x08, 0x00, 0x00, 0x00, // StreamHeader size
///     0x23, 0x7E, 0x00, 0x00, // "#~"
///     0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
/// ])?;
/// assert_eq!(root.version, "v4");
/// assert_eq!(root.stream_headers.len(), 1);
/// # Ok::<(), ilrun::Error>(())
/// ```
///
/// ## Reference
/// - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// `MajorVersion`
    pub major_version: u16,
    /// `MinorVersion`
    pub minor_version: u16,
    /// Always 0
    pub reserved: u32,
    /// Number of bytes allocated to hold the version string, rounded up to 4
    pub length: u32,
    /// The version string with NUL padding stripped
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Number of streams
    pub stream_number: u16,
    /// The stream directory, known and unknown streams alike
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads a [`Root`] metadata header from a byte slice that spans the whole
    /// metadata region, so that stream extents can be validated against it.
    ///
    /// # Arguments
    /// * `data` - The metadata region, starting at the metadata root
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is invalid, or a
    /// stream header is malformed or points outside the metadata region.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let signature = parser.read_le::<u32>()?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {:#010x}",
                signature
            ));
        }

        let major_version = parser.read_le::<u16>()?;
        let minor_version = parser.read_le::<u16>()?;
        let reserved = parser.read_le::<u32>()?;

        let length = parser.read_le::<u32>()?;
        if length == 0 || length > 255 {
            return Err(malformed_error!("Invalid version string length - {}", length));
        }

        let mut version = String::with_capacity(length as usize);
        for _ in 0..length {
            let byte = parser.read_le::<u8>()?;
            if byte != 0 {
                version.push(char::from(byte));
            }
        }

        let flags = parser.read_le::<u16>()?;
        let stream_count = parser.read_le::<u16>()?;

        // 9 is the smallest encoding of one header; more headers than the region
        // could hold means the count is garbage
        if stream_count as usize * 9 > data.len() {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut streams: Vec<StreamHeader> = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            if parser.pos() >= data.len() {
                return Err(OutOfBounds);
            }

            let new_stream = StreamHeader::from(&data[parser.pos()..])?;

            match u32::checked_add(new_stream.offset, new_stream.size) {
                Some(end) => {
                    if end as usize > data.len() {
                        return Err(OutOfBounds);
                    }
                }
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        new_stream.offset,
                        new_stream.size
                    ))
                }
            }

            let advance = new_stream.byte_len();
            streams.push(new_stream);
            parser.seek(parser.pos() + advance)?;
        }

        Ok(Root {
            signature,
            major_version,
            minor_version,
            reserved,
            length,
            flags,
            stream_number: stream_count,
            stream_headers: streams,
            version,
        })
    }

    /// Look up a stream header by name. With duplicate names the last entry wins,
    /// matching the consumers that assign while walking the directory.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers
            .iter()
            .rev()
            .find(|header| header.name == name)
    }
}
