//! Worker-side job loop
//!
//! Runs inside the spawned process: receives job records from the control
//! channel, pulls containers from the input region, drives the compression
//! service and writes results to the output region. Every job gets exactly
//! one response, and the loop only propagates errors that poison the
//! channel itself.

use std::path::Path;

use crate::{
    channel::ControlChannel,
    codec::TargetFormat,
    error::Result,
    handles::Handle,
    protocol::{EncodeTarget, JobRequest, JobResponse, JobStatus},
    region::SharedRegion,
    service::{CompressionService, JobParams},
};

/// Job loop driving a `CompressionService` from a control channel
pub struct WorkerLoop {
    channel: ControlChannel,
    input: SharedRegion,
    output: SharedRegion,
    service: CompressionService,
}

impl WorkerLoop {
    pub fn new(
        channel: ControlChannel,
        input: SharedRegion,
        output: SharedRegion,
        service: CompressionService,
    ) -> Self {
        Self {
            channel,
            input,
            output,
            service,
        }
    }

    /// Open both regions, then dial the host's control socket
    ///
    /// The regions are mapped first so that by the time the host sees the
    /// connection, the worker is ready for its first job.
    pub fn connect(
        control: impl AsRef<Path>,
        input_name: impl AsRef<Path>,
        output_name: impl AsRef<Path>,
        input_capacity: usize,
        output_capacity: usize,
        service: CompressionService,
    ) -> Result<Self> {
        let input = SharedRegion::open(input_name, input_capacity)?;
        let output = SharedRegion::open(output_name, output_capacity)?;
        let channel = ControlChannel::connect(control)?;
        Ok(Self::new(channel, input, output, service))
    }

    /// Serve jobs until the host closes the channel
    pub fn run(&mut self) -> Result<()> {
        loop {
            let request = match self.channel.receive_request()? {
                Some(request) => request,
                None => {
                    log::info!("control channel closed, worker shutting down");
                    self.service.shutdown()?;
                    return Ok(());
                }
            };
            self.handle_job(&request)?;
        }
    }

    fn handle_job(&mut self, request: &JobRequest) -> Result<()> {
        let (response, handle) = self.execute(request);

        let sent = self.channel.send_response(&response);
        if let Some(handle) = handle {
            // The output buffer is owned until the response is on the wire,
            // then released whether delivery worked or not.
            if !self.service.handles().release(handle) {
                log::warn!("output handle {} was already released", handle);
            }
        }
        sent
    }

    /// Run one job and build its response record
    ///
    /// Job failures become failure responses; only the returned record can
    /// carry them back, so this never returns an error itself.
    fn execute(&mut self, request: &JobRequest) -> (JobResponse, Option<Handle>) {
        let input_len = request.input_len;
        if input_len < 0 || input_len as usize > self.input.capacity() {
            log::warn!(
                "rejecting job: input length {} does not fit region of {} bytes",
                input_len,
                self.input.capacity()
            );
            return (JobResponse::failure(JobStatus::InvalidInputLength), None);
        }
        let container = match self.input.read_at(0, input_len as usize) {
            Ok(container) => container,
            Err(_) => return (JobResponse::failure(JobStatus::InvalidInputLength), None),
        };

        let target_format = match TargetFormat::from_id(request.target_format) {
            Ok(target_format) => target_format,
            Err(err) => return (JobResponse::failure(err.job_status()), None),
        };
        let encode_target = match EncodeTarget::try_from(request.encode_target) {
            Ok(encode_target) => encode_target,
            Err(err) => return (JobResponse::failure(err.job_status()), None),
        };
        let params = JobParams {
            target_format,
            encode_target,
            quality: request.quality,
            max_side: request.max_side,
            thread_count: request.thread_count,
        };

        log::debug!(
            "job: {} byte container, target {:?} via {:?}",
            input_len,
            target_format,
            encode_target
        );

        let texture = match self.service.process(container, &params) {
            Ok(texture) => texture,
            Err(err) => {
                log::debug!("job failed: {}", err);
                return (JobResponse::failure(err.job_status()), None);
            }
        };

        if texture.bytes.len() > self.output.capacity() || texture.bytes.len() > i32::MAX as usize
        {
            log::warn!(
                "dropping result: {} encoded bytes exceed output region of {} bytes",
                texture.bytes.len(),
                self.output.capacity()
            );
            return (JobResponse::failure(JobStatus::OutputTooLarge), None);
        }

        if let Err(err) = self.output.write_at(0, &texture.bytes) {
            log::warn!("output region write failed: {}", err);
            return (JobResponse::failure(JobStatus::OutputTooLarge), None);
        }

        let response = JobResponse {
            status: JobStatus::Success,
            output_len: texture.bytes.len() as i32,
            width: texture.width,
            height: texture.height,
        };
        // The table takes ownership of the buffer once it is in the region.
        let handle = self.service.handles().register(texture.bytes);

        (response, Some(handle))
    }
}
