//! Fixed-size control records exchanged between host and worker
//!
//! Both records use a packed little-endian layout with no padding. The
//! channel is strictly synchronous: one request, then exactly one response.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShuttleError};

/// Size of an encoded job request record in bytes
pub const JOB_REQUEST_SIZE: usize = 24;

/// Size of an encoded job response record in bytes
pub const JOB_RESPONSE_SIZE: usize = 16;

/// Result status carried in a job response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum JobStatus {
    /// Job completed, output region holds the encoded bytes
    Success = 0,
    /// Container magic not recognized by any decoder
    UnknownImageFormat = 1,
    /// Recognized container failed to decode
    DecodeFailed = 2,
    /// Decoded pixel buffer did not match width x height x bpp
    GetBitsFailed = 3,
    /// Resampling to the maximum output side failed
    DownscaleFailed = 4,
    /// Target format id outside the supported set
    UnsupportedTargetFormat = 5,
    /// Valid target format with no kernel or backend available
    UnsupportedMode = 6,
    /// Encode kernel reported failure
    CompressionFailed = 7,
    /// Collaborator allocation failure
    OutOfMemory = 8,
    /// Quality, thread count or encode target out of range
    BadParameters = 9,
    /// Declared input length outside the input region bounds
    InvalidInputLength = 10,
    /// Encoded result would not fit the output region
    OutputTooLarge = 11,
    /// Status code not recognized by this build
    Unknown = -1,
}

impl JobStatus {
    /// Map a wire status code to a status, unknown codes never fault
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::UnknownImageFormat,
            2 => Self::DecodeFailed,
            3 => Self::GetBitsFailed,
            4 => Self::DownscaleFailed,
            5 => Self::UnsupportedTargetFormat,
            6 => Self::UnsupportedMode,
            7 => Self::CompressionFailed,
            8 => Self::OutOfMemory,
            9 => Self::BadParameters,
            10 => Self::InvalidInputLength,
            11 => Self::OutputTooLarge,
            _ => Self::Unknown,
        }
    }

    /// Wire code for this status
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// True for the success status
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Which backend strategy performs the encode for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum EncodeTarget {
    /// Software encode on the worker's CPU
    Cpu = 0,
    /// GPU-assisted encode variant
    Gpu = 1,
}

impl TryFrom<i32> for EncodeTarget {
    type Error = ShuttleError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Cpu),
            1 => Ok(Self::Gpu),
            other => Err(ShuttleError::validation(
                "encode_target",
                format!("unknown encode target id {}", other),
            )),
        }
    }
}

/// Job request record, host to worker, one per job
///
/// Format and encode-target ids stay raw here; the worker maps them to
/// typed values and answers with a status code when they are invalid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobRequest {
    /// Bytes of container data waiting in the input region
    pub input_len: i32,
    /// Maximum output side length in pixels, 0 disables downscaling
    pub max_side: i32,
    /// Target format id (see `codec::TargetFormat`)
    pub target_format: i32,
    /// Encode quality in 0.0..=1.0
    pub quality: f32,
    /// Encode target id (see `EncodeTarget`)
    pub encode_target: i32,
    /// Worker thread count hint for the encode kernel, <= 0 means default
    pub thread_count: i32,
}

impl JobRequest {
    /// Serialize to the packed wire layout
    pub fn to_bytes(&self) -> [u8; JOB_REQUEST_SIZE] {
        let mut buf = [0u8; JOB_REQUEST_SIZE];
        buf[0..4].copy_from_slice(&self.input_len.to_le_bytes());
        buf[4..8].copy_from_slice(&self.max_side.to_le_bytes());
        buf[8..12].copy_from_slice(&self.target_format.to_le_bytes());
        buf[12..16].copy_from_slice(&self.quality.to_le_bytes());
        buf[16..20].copy_from_slice(&self.encode_target.to_le_bytes());
        buf[20..24].copy_from_slice(&self.thread_count.to_le_bytes());
        buf
    }

    /// Deserialize from the packed wire layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != JOB_REQUEST_SIZE {
            return Err(ShuttleError::validation(
                "request_record",
                format!("expected {} bytes, got {}", JOB_REQUEST_SIZE, bytes.len()),
            ));
        }
        Ok(Self {
            input_len: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            max_side: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            target_format: i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            quality: f32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            encode_target: i32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            thread_count: i32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
        })
    }
}

/// Job response record, worker to host, exactly one per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResponse {
    /// Job result status
    pub status: JobStatus,
    /// Bytes written to the output region, 0 on failure
    pub output_len: i32,
    /// Encoded texture width after downscale and block padding
    pub width: u32,
    /// Encoded texture height after downscale and block padding
    pub height: u32,
}

impl JobResponse {
    /// Build a failure response with no output
    pub fn failure(status: JobStatus) -> Self {
        Self {
            status,
            output_len: 0,
            width: 0,
            height: 0,
        }
    }

    /// Serialize to the packed wire layout
    pub fn to_bytes(&self) -> [u8; JOB_RESPONSE_SIZE] {
        let mut buf = [0u8; JOB_RESPONSE_SIZE];
        buf[0..4].copy_from_slice(&self.status.code().to_le_bytes());
        buf[4..8].copy_from_slice(&self.output_len.to_le_bytes());
        buf[8..12].copy_from_slice(&self.width.to_le_bytes());
        buf[12..16].copy_from_slice(&self.height.to_le_bytes());
        buf
    }

    /// Deserialize from the packed wire layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != JOB_RESPONSE_SIZE {
            return Err(ShuttleError::validation(
                "response_record",
                format!("expected {} bytes, got {}", JOB_RESPONSE_SIZE, bytes.len()),
            ));
        }
        Ok(Self {
            status: JobStatus::from_code(i32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ])),
            output_len: i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            width: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            height: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }
}
