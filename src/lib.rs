//! # Texshuttle - Out-of-Process Texture Recompression
//!
//! Texshuttle offloads texture decoding and recompression to a spawned
//! worker process. The host hands containers over through a fixed-capacity
//! shared-memory region, drives the worker with a synchronous control
//! channel, and copies encoded results back out of a second region. A bug
//! in a codec kernel takes down the worker, never the host.
//!
//! ## Features
//!
//! - **File-backed shared regions**: One for job input, one for job output
//! - **Fixed-size control records**: Little-endian request/response framing
//! - **Handle table**: Concurrency-safe ownership of native output buffers
//! - **Process supervision**: Spawn, liveness probing, memory accounting,
//!   force-kill on shutdown
//! - **Pluggable codecs**: Built-in CPU backend, optional GPU backend slot
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────── Host ────────────┐      ┌─────────── Worker ───────────┐
//! │  ProcessSupervisor           │      │  WorkerLoop                  │
//! │  HostClient ── request ──────┼──────┼─▶ CompressionService         │
//! │      ▲                       │ ctrl │      │ decode / downscale /  │
//! │      └────── response ───────┼──────┼──────┘ normalize / encode    │
//! └──────┬───────────────────────┘      └──────┬───────────────────────┘
//!        │          input region (containers)  │
//!        └──────────────────────────────────────
//!                   output region (encoded textures)
//! ```

pub mod channel;
pub mod client;
pub mod codec;
pub mod error;
pub mod handles;
pub mod protocol;
pub mod region;
pub mod service;
pub mod supervisor;
pub mod worker;

// Main API re-exports
pub use channel::{ControlChannel, ControlListener};
pub use client::{HostClient, JobOutput};
pub use codec::{CpuCodec, DecodedImage, EncodeOptions, PixelCodec, SourceFormat, TargetFormat};
pub use error::{Result, ShuttleError};
pub use handles::{Handle, HandleTable, INVALID_HANDLE};
pub use protocol::{
    EncodeTarget, JobRequest, JobResponse, JobStatus, JOB_REQUEST_SIZE, JOB_RESPONSE_SIZE,
};
pub use region::{RegionConfig, SharedRegion};
pub use service::{CompressionService, EncodedTexture, JobParams};
pub use supervisor::{ProcessSupervisor, WorkerProcessState};
pub use worker::WorkerLoop;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Default capacity of the container input region (32 MiB)
    pub const DEFAULT_INPUT_CAPACITY: usize = 32 * 1024 * 1024;

    /// Default capacity of the encoded output region (32 MiB)
    pub const DEFAULT_OUTPUT_CAPACITY: usize = 32 * 1024 * 1024;

    /// Largest texture side the built-in defaults will keep
    pub const DEFAULT_MAX_SIDE: i32 = 16384;
}
