//! Compression pipeline: decode, downscale, normalize, encode
//!
//! The service wraps the codec backends and owns the handle table that
//! tracks native output buffers. It is shared between the worker loop and
//! any embedding code that registers buffers directly.

use crate::{
    codec::{
        normalize::{downscale_box, normalize_for_target},
        DecodedImage, EncodeOptions, PixelCodec, TargetFormat,
    },
    error::{Result, ShuttleError},
    handles::HandleTable,
    protocol::{EncodeTarget, JobStatus},
};

/// Per-job settings decoded from a request record
#[derive(Debug, Clone, Copy)]
pub struct JobParams {
    pub target_format: TargetFormat,
    pub encode_target: EncodeTarget,
    /// Encoder quality in 0.0..=1.0
    pub quality: f32,
    /// Longest allowed side after decode, 0 disables downscaling
    pub max_side: i32,
    /// Threads the encode kernel may use, 0 picks a default
    pub thread_count: i32,
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            target_format: TargetFormat::Rgba32,
            encode_target: EncodeTarget::Cpu,
            quality: 1.0,
            max_side: 0,
            thread_count: 0,
        }
    }
}

/// Finished job output: encoded bytes plus the dimensions they describe
#[derive(Debug, Clone)]
pub struct EncodedTexture {
    pub bytes: Vec<u8>,
    /// Width after downscaling and block padding
    pub width: u32,
    /// Height after downscaling and block padding
    pub height: u32,
}

/// Texture recompression engine
pub struct CompressionService {
    cpu: Box<dyn PixelCodec>,
    gpu: Option<Box<dyn PixelCodec>>,
    handles: HandleTable,
}

impl CompressionService {
    /// Create a service with a CPU backend only
    pub fn new(cpu: Box<dyn PixelCodec>) -> Self {
        Self {
            cpu,
            gpu: None,
            handles: HandleTable::new(),
        }
    }

    /// Attach a GPU backend for jobs that request one
    pub fn with_gpu_backend(mut self, gpu: Box<dyn PixelCodec>) -> Self {
        self.gpu = Some(gpu);
        self
    }

    /// Table tracking native buffers currently owned by callers
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Run one container through the full pipeline
    pub fn process(&self, container: &[u8], params: &JobParams) -> Result<EncodedTexture> {
        if !(0.0..=1.0).contains(&params.quality) {
            return Err(ShuttleError::validation(
                "quality",
                format!("{} is outside 0.0..=1.0", params.quality),
            ));
        }
        if params.max_side < 0 {
            return Err(ShuttleError::validation(
                "max_side",
                format!("{} is negative", params.max_side),
            ));
        }

        let backend = self.backend_for(params.encode_target)?;
        let image = backend.decode(container)?;

        // A decoder that reports dimensions its pixel buffer cannot back
        // failed to hand over the bits.
        match image.expected_len() {
            Some(expected) if expected == image.pixels.len() => {}
            _ => {
                return Err(ShuttleError::codec(
                    JobStatus::GetBitsFailed,
                    format!(
                        "{}x{} {:?} frame carries {} pixel bytes",
                        image.width,
                        image.height,
                        image.format,
                        image.pixels.len()
                    ),
                ))
            }
        }

        let image = self.downscale_if_needed(image, params.max_side)?;
        let image = normalize_for_target(image, params.target_format);

        let options = EncodeOptions {
            quality: params.quality,
            thread_count: params.thread_count,
        };
        let bytes = backend.encode(&image, params.target_format, &options)?;

        Ok(EncodedTexture {
            bytes,
            width: image.width,
            height: image.height,
        })
    }

    /// Refuse to shut down while callers still own buffers
    pub fn shutdown(&self) -> Result<()> {
        let outstanding = self.handles.len();
        if outstanding > 0 {
            return Err(ShuttleError::OutstandingHandles { count: outstanding });
        }
        Ok(())
    }

    fn backend_for(&self, target: EncodeTarget) -> Result<&dyn PixelCodec> {
        match target {
            EncodeTarget::Cpu => Ok(self.cpu.as_ref()),
            EncodeTarget::Gpu => self.gpu.as_deref().ok_or_else(|| {
                ShuttleError::codec(JobStatus::UnsupportedMode, "no GPU backend attached")
            }),
        }
    }

    fn downscale_if_needed(&self, image: DecodedImage, max_side: i32) -> Result<DecodedImage> {
        if max_side == 0 {
            return Ok(image);
        }
        downscale_box(&image, max_side as u32)
    }
}

impl std::fmt::Debug for CompressionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionService")
            .field("gpu", &self.gpu.is_some())
            .field("outstanding_handles", &self.handles.len())
            .finish()
    }
}
