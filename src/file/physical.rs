use super::Backend;
use crate::{
    Error::{FileError, OutOfBounds},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// Input image backed by a physical file on disk
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Create a new physical backend
    ///
    /// ## Arguments
    /// * 'path' - The file path to map
    ///
    /// # Errors
    /// Returns [`FileError`] if the file cannot be opened or mapped
    pub fn new(path: &Path) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;

        // The mapping stays valid for the lifetime of this backend; the image is
        // never written through it
        let data = unsafe { Mmap::map(&file) }.map_err(FileError)?;

        Ok(Physical { data })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).ok_or(OutOfBounds)?;
        self.data.get(offset..end).ok_or(OutOfBounds)
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x4D, 0x5A, 0x01, 0x02, 0x03, 0x04]).unwrap();
        file.flush().unwrap();

        let physical = Physical::new(file.path()).unwrap();

        assert_eq!(physical.len(), 6);
        assert_eq!(physical.data()[0], 0x4D);
        assert_eq!(physical.data()[1], 0x5A);
        assert_eq!(physical.data_slice(2, 3).unwrap(), &[0x01, 0x02, 0x03]);

        assert!(physical.data_slice(0, 4 * 1024).is_err());
        assert!(physical.data_slice(usize::MAX, 1).is_err());
        assert!(physical.data_slice(6, 1).is_err());
    }

    #[test]
    fn physical_invalid_file_path() {
        let result = Physical::new(Path::new("/nonexistent/path/to/file.dll"));
        assert!(result.is_err());
        match result.unwrap_err() {
            FileError(io_error) => {
                assert_eq!(io_error.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected FileError"),
        }
    }
}
