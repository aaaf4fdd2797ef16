//! Host-side job submission
//!
//! The client owns the host ends of both regions and the control channel.
//! Submission is synchronous: write the container, send the request record,
//! block on the response, copy the result out of the output region.

use crate::{
    channel::ControlChannel,
    error::{Result, ShuttleError},
    protocol::JobRequest,
    region::SharedRegion,
    service::JobParams,
};

/// Result of one job, copied out of the output region
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Synchronous host handle for a connected worker
pub struct HostClient {
    channel: ControlChannel,
    input: SharedRegion,
    output: SharedRegion,
}

impl HostClient {
    pub fn new(channel: ControlChannel, input: SharedRegion, output: SharedRegion) -> Self {
        Self {
            channel,
            input,
            output,
        }
    }

    /// Run one container through the worker and copy back the result
    ///
    /// Containers that cannot fit the input region are rejected before
    /// anything is written or sent, leaving the channel reusable.
    pub fn submit(&mut self, container: &[u8], params: &JobParams) -> Result<JobOutput> {
        if container.len() > self.input.capacity() || container.len() > i32::MAX as usize {
            return Err(ShuttleError::validation(
                "container",
                format!(
                    "{} bytes do not fit input region of {} bytes",
                    container.len(),
                    self.input.capacity()
                ),
            ));
        }

        self.input.write_at(0, container)?;
        self.channel.send_request(&JobRequest {
            input_len: container.len() as i32,
            max_side: params.max_side,
            target_format: params.target_format.id(),
            quality: params.quality,
            encode_target: params.encode_target as i32,
            thread_count: params.thread_count,
        })?;

        let response = self.channel.receive_response()?;
        if !response.status.is_success() {
            return Err(ShuttleError::codec(
                response.status,
                "worker reported job failure",
            ));
        }
        if response.output_len < 0 || response.output_len as usize > self.output.capacity() {
            return Err(ShuttleError::transport(format!(
                "response advertises {} output bytes for a region of {} bytes",
                response.output_len,
                self.output.capacity()
            )));
        }

        let bytes = self.output.read_at(0, response.output_len as usize)?.to_vec();
        Ok(JobOutput {
            bytes,
            width: response.width,
            height: response.height,
        })
    }

    pub fn input_capacity(&self) -> usize {
        self.input.capacity()
    }

    pub fn output_capacity(&self) -> usize {
        self.output.capacity()
    }
}

impl std::fmt::Debug for HostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostClient")
            .field("input_capacity", &self.input.capacity())
            .field("output_capacity", &self.output.capacity())
            .finish()
    }
}
