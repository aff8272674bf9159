//! Safe little-endian reading utilities for PE and metadata parsing.
//!
//! PE/CLI images are little-endian throughout, so this module only provides the
//! [`ReadLe`] trait and the free functions built on it. Used by the file, metadata
//! and disassembler modules for all primitive reads.

use crate::{Error::OutOfBounds, Result};

/// Trait for type specific safe reads from byte slices.
///
/// Implemented for all primitive types that occur in PE headers, metadata tables
/// and CIL operands.
pub trait ReadLe: Sized {
    #[allow(missing_docs)]
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read Self from a little-endian byte buffer
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_read_le {
    ($($ty:ty),*) => {
        $(
            impl ReadLe for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_read_le!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Safely read T in little-endian from the start of a data stream.
///
/// ## Arguments
/// * 'data' - The data buffer to read from
///
/// # Errors
/// Returns [`OutOfBounds`] if the buffer is too short for T
pub fn read_le<T: ReadLe>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely read T in little-endian from an offset within a data stream.
///
/// ## Arguments
/// * 'data'    - The data buffer to read from
/// * 'offset'  - The offset to read from, advanced by the amount of bytes read
///
/// # Errors
/// Returns [`OutOfBounds`] if reading would exceed the data length
pub fn read_le_at<T: ReadLe>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Safely read 4 or 2 bytes in little-endian, widening to u32.
///
/// Metadata heap and table indices are 2 bytes for small heaps and 4 bytes for
/// large ones; this reads whichever width the caller determined.
///
/// ## Arguments
/// * 'data'        - The data buffer to read from
/// * 'offset'      - The offset to read from, advanced by the amount of bytes read
/// * `is_large`    - Indicates if 4 or 2 bytes should be read
///
/// # Errors
/// Returns [`OutOfBounds`] if reading would exceed the data length
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_i32() {
        let result = read_le::<i32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_f64() {
        let result = read_le::<f64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 5.447603722011605e-270);
    }

    #[test]
    fn read_le_from_offset() {
        let mut offset = 2_usize;
        let result = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_le_dyn() {
        let mut offset = 0;

        let res_1 = read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap();
        assert_eq!(res_1, 0x0403_0201);

        offset = 0;
        let res_2 = read_le_at_dyn(&TEST_BUFFER, &mut offset, false).unwrap();
        assert_eq!(res_2, 0x0201);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        let result = read_le::<u64>(&buffer);
        assert!(matches!(result, Err(OutOfBounds)));

        let mut offset = 3;
        let result = read_le_at::<u16>(&buffer, &mut offset);
        assert!(matches!(result, Err(OutOfBounds)));
    }
}
