//! Source and target pixel format taxonomy

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ShuttleError},
    protocol::JobStatus,
};

/// Channel layout of decoded pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum SourceFormat {
    /// 8-bit RGB, three channels, no alpha
    Rgb24 = 0,
    /// 8-bit RGBA, four channels
    Rgba32 = 1,
    /// 8-bit BGRA, four channels stored in reverse order
    Bgra32 = 2,
}

impl SourceFormat {
    /// Map a raw-frame format id
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Rgb24),
            1 => Some(Self::Rgba32),
            2 => Some(Self::Bgra32),
            _ => None,
        }
    }

    /// Raw-frame format id
    pub fn id(&self) -> u32 {
        *self as u32
    }

    /// Bytes occupied by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba32 | Self::Bgra32 => 4,
        }
    }

    /// Whether the layout carries an alpha channel
    pub fn has_alpha(&self) -> bool {
        !matches!(self, Self::Rgb24)
    }

    /// Whether the color channels are stored in reverse order
    pub fn is_reversed(&self) -> bool {
        matches!(self, Self::Bgra32)
    }
}

/// Destination texture format requested for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum TargetFormat {
    /// Uncompressed 8-bit RGBA, the identity path
    Rgba32 = 0,
    /// ASTC with 4x4 blocks
    Astc4x4 = 1,
    /// ASTC with 6x6 blocks
    Astc6x6 = 2,
    /// ASTC with 8x8 blocks
    Astc8x8 = 3,
    /// ASTC with 10x10 blocks
    Astc10x10 = 4,
    /// ASTC with 12x12 blocks
    Astc12x12 = 5,
    /// BC5 two-channel blocks, the normal-map path
    Bc5 = 6,
    /// BC7 RGBA blocks
    Bc7 = 7,
}

impl TargetFormat {
    /// Map a wire format id, unsupported ids carry their own status code
    pub fn from_id(id: i32) -> Result<Self> {
        match id {
            0 => Ok(Self::Rgba32),
            1 => Ok(Self::Astc4x4),
            2 => Ok(Self::Astc6x6),
            3 => Ok(Self::Astc8x8),
            4 => Ok(Self::Astc10x10),
            5 => Ok(Self::Astc12x12),
            6 => Ok(Self::Bc5),
            7 => Ok(Self::Bc7),
            other => Err(ShuttleError::codec(
                JobStatus::UnsupportedTargetFormat,
                format!("unknown target format id {}", other),
            )),
        }
    }

    /// Wire format id
    pub fn id(&self) -> i32 {
        *self as i32
    }

    /// Block footprint in pixels, None for uncompressed targets
    pub fn block_dims(&self) -> Option<(u32, u32)> {
        match self {
            Self::Rgba32 => None,
            Self::Astc4x4 => Some((4, 4)),
            Self::Astc6x6 => Some((6, 6)),
            Self::Astc8x8 => Some((8, 8)),
            Self::Astc10x10 => Some((10, 10)),
            Self::Astc12x12 => Some((12, 12)),
            Self::Bc5 | Self::Bc7 => Some((4, 4)),
        }
    }

    /// Whether this target is block compressed
    pub fn is_block_compressed(&self) -> bool {
        self.block_dims().is_some()
    }

    /// Encoded byte length for an image already padded to the block grid
    ///
    /// All supported block formats store 16 bytes per block.
    pub fn encoded_len(&self, width: u32, height: u32) -> usize {
        match self.block_dims() {
            None => width as usize * height as usize * 4,
            Some((bw, bh)) => {
                let blocks_x = (width as usize).div_ceil(bw as usize);
                let blocks_y = (height as usize).div_ceil(bh as usize);
                blocks_x * blocks_y * 16
            }
        }
    }
}
