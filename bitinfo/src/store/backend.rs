//! Byte sources for reading BITC files

use bitinfo_core::StorageBackend;
#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};
#[cfg(feature = "mmap")]
use std::fs::File;
use std::path::Path;

/// Whole file read into memory
#[derive(Debug, Clone)]
pub struct OwnedBackend {
    bytes: Vec<u8>,
}

impl OwnedBackend {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }
}

impl StorageBackend for OwnedBackend {
    fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read-only memory map of a file
#[cfg(feature = "mmap")]
#[derive(Debug)]
pub struct MmapBackend {
    mmap: Mmap,
}

#[cfg(feature = "mmap")]
impl MmapBackend {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only; files are written once and renamed into place
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap })
    }
}

#[cfg(feature = "mmap")]
impl StorageBackend for MmapBackend {
    fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

/// Backend chosen at open time
#[derive(Debug)]
pub enum FileBackend {
    Owned(OwnedBackend),
    #[cfg(feature = "mmap")]
    Mmap(MmapBackend),
}

impl FileBackend {
    /// Memory-map the file when mapping is available, read it otherwise
    ///
    /// Empty files cannot be mapped and are read instead.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        #[cfg(feature = "mmap")]
        {
            if File::open(path)?.metadata()?.len() > 0 {
                return Ok(FileBackend::Mmap(MmapBackend::open(path)?));
            }
        }
        Ok(FileBackend::Owned(OwnedBackend::read(path)?))
    }
}

impl StorageBackend for FileBackend {
    fn as_slice(&self) -> &[u8] {
        match self {
            FileBackend::Owned(b) => b.as_slice(),
            #[cfg(feature = "mmap")]
            FileBackend::Mmap(b) => b.as_slice(),
        }
    }
}
