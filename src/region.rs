//! Fixed-capacity shared memory regions backing the bulk data path
//!
//! A region is identified by the path of its backing file. The host creates
//! it and zero-extends the backing to the agreed capacity; the worker opens
//! the same path read/write and maps the same capacity. Capacity is fixed
//! for the lifetime of the mapping and every access is bounds checked
//! against it.

use std::{
    fs::OpenOptions,
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use memmap2::{MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShuttleError};

/// Configuration for creating or opening a shared region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Region name, used verbatim as the backing file path
    pub name: String,
    /// Fixed capacity in bytes, agreed by both processes out of band
    pub capacity: usize,
    /// Create (and later unlink) the backing file, or open an existing one
    pub create: bool,
    /// File mode bits for a created backing file
    pub mode: u32,
}

impl RegionConfig {
    /// Configuration for the creating (host) side
    pub fn create(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            create: true,
            mode: 0o600,
        }
    }

    /// Configuration for the opening (worker) side
    pub fn open(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            create: false,
            mode: 0o600,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ShuttleError::validation("name", "region name is empty"));
        }
        if self.capacity == 0 {
            return Err(ShuttleError::validation(
                "capacity",
                "region capacity must be non-zero",
            ));
        }
        Ok(())
    }
}

/// A mapped shared memory region with a fixed capacity
#[derive(Debug)]
pub struct SharedRegion {
    name: String,
    capacity: usize,
    mmap: MmapMut,
    /// Backing file kept open for the lifetime of the mapping
    _file: std::fs::File,
    /// The creator unlinks the backing file on drop
    owned: bool,
}

impl SharedRegion {
    /// Create a region, zero-extending the backing file to `capacity`
    pub fn create(name: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        Self::from_config(RegionConfig::create(
            name.as_ref().to_string_lossy().into_owned(),
            capacity,
        ))
    }

    /// Open a region created by the peer process
    pub fn open(name: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        Self::from_config(RegionConfig::open(
            name.as_ref().to_string_lossy().into_owned(),
            capacity,
        ))
    }

    /// Create or open a region from an explicit configuration
    pub fn from_config(config: RegionConfig) -> Result<Self> {
        config.validate()?;

        let file = if config.create {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .mode(config.mode)
                .open(&config.name)
                .map_err(|e| ShuttleError::from_io(e, "Failed to create region backing file"))?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .open(&config.name)
                .map_err(|e| ShuttleError::from_io(e, "Failed to open region backing file"))?
        };

        if config.create {
            file.set_len(config.capacity as u64)
                .map_err(|e| ShuttleError::from_io(e, "Failed to size region backing file"))?;
        } else {
            let actual = file
                .metadata()
                .map_err(|e| ShuttleError::from_io(e, "Failed to stat region backing file"))?
                .len();
            if (actual as usize) < config.capacity {
                return Err(ShuttleError::region(
                    &config.name,
                    format!(
                        "backing file holds {} bytes, {} required",
                        actual, config.capacity
                    ),
                ));
            }
        }

        let mmap = unsafe {
            MmapOptions::new()
                .len(config.capacity)
                .map_mut(&file)
                .map_err(|e| ShuttleError::from_io(e, "Failed to map region"))?
        };

        Ok(Self {
            name: config.name,
            capacity: config.capacity,
            mmap,
            _file: file,
            owned: config.create,
        })
    }

    /// Region name (backing file path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixed capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `data` into the region at `offset`, rejecting overruns
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len())
            .ok_or_else(|| ShuttleError::region(&self.name, "write range overflows"))?;
        if end > self.capacity {
            return Err(ShuttleError::region(
                &self.name,
                format!(
                    "write of {} bytes at offset {} exceeds capacity {}",
                    data.len(),
                    offset,
                    self.capacity
                ),
            ));
        }
        self.mmap[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Borrow `len` bytes of the region starting at `offset`
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| ShuttleError::region(&self.name, "read range overflows"))?;
        if end > self.capacity {
            return Err(ShuttleError::region(
                &self.name,
                format!(
                    "read of {} bytes at offset {} exceeds capacity {}",
                    len, offset, self.capacity
                ),
            ));
        }
        Ok(&self.mmap[offset..end])
    }

    /// Raw read-only view of the whole region
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// Raw mutable view of the whole region
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Flush dirty pages back to the backing file
    pub fn flush(&self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| ShuttleError::from_io(e, "Failed to flush region"))
    }

    /// Path of the backing file
    pub fn backing_path(&self) -> PathBuf {
        PathBuf::from(&self.name)
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if self.owned {
            let _ = std::fs::remove_file(&self.name);
        }
    }
}
