//! Texture decode and encode pipeline
//!
//! A codec backend turns serialized containers into pixel buffers and packs
//! pixel buffers into target formats. The worker owns one CPU backend and
//! optionally a GPU backend supplied by the embedding application.

pub mod cpu;
pub mod formats;
pub mod normalize;

pub use cpu::CpuCodec;
pub use formats::{SourceFormat, TargetFormat};

use crate::error::Result;

/// Decoded pixel buffer together with its layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Byte length the dimensions and format imply, None on overflow
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.bytes_per_pixel())
    }
}

/// Encoder knobs forwarded from the job request
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// Quality in 0.0..=1.0, interpretation is backend specific
    pub quality: f32,
    /// Worker threads the kernel may use, 0 picks a default
    pub thread_count: i32,
}

/// Decode/encode backend used by the compression pipeline
pub trait PixelCodec: Send + Sync {
    /// Parse a serialized container into pixels
    fn decode(&self, container: &[u8]) -> Result<DecodedImage>;

    /// Pack normalized pixels into the target format
    fn encode(
        &self,
        image: &DecodedImage,
        target: TargetFormat,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>>;
}
