//! End-to-end job tests with an in-process worker loop
//!
//! The worker runs on a thread with its own mappings of the two regions and
//! a socketpair control channel, exactly the setup the spawned binary sees.

use std::{os::unix::net::UnixStream, thread};

use tempfile::TempDir;
use texshuttle::{
    codec::cpu::encode_raw_frame, CompressionService, ControlChannel, CpuCodec, DecodedImage,
    HostClient, JobParams, JobStatus, SharedRegion, ShuttleError, SourceFormat, TargetFormat,
    WorkerLoop,
};

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        client: HostClient,
        worker: thread::JoinHandle<texshuttle::Result<()>>,
        _dir: TempDir,
    }

    fn start_worker(input_capacity: usize, output_capacity: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let input_path = dir.path().join("input.region");
        let output_path = dir.path().join("output.region");

        let input = SharedRegion::create(&input_path, input_capacity).unwrap();
        let output = SharedRegion::create(&output_path, output_capacity).unwrap();
        let (host_stream, worker_stream) = UnixStream::pair().unwrap();

        let worker_input = SharedRegion::open(&input_path, input_capacity).unwrap();
        let worker_output = SharedRegion::open(&output_path, output_capacity).unwrap();
        let worker = thread::spawn(move || {
            let service = CompressionService::new(Box::new(CpuCodec::new()));
            WorkerLoop::new(
                ControlChannel::from_stream(worker_stream),
                worker_input,
                worker_output,
                service,
            )
            .run()
        });

        Fixture {
            client: HostClient::new(ControlChannel::from_stream(host_stream), input, output),
            worker,
            _dir: dir,
        }
    }

    fn solid_frame(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        encode_raw_frame(&DecodedImage {
            width,
            height,
            format: SourceFormat::Rgba32,
            pixels: rgba.repeat((width * height) as usize),
        })
    }

    #[test]
    fn test_identity_job_round_trip() {
        let mut fixture = start_worker(1 << 20, 1 << 20);
        let container = solid_frame(4, 4, [255, 0, 0, 255]);

        let output = fixture
            .client
            .submit(&container, &JobParams::default())
            .unwrap();
        assert_eq!((output.width, output.height), (4, 4));
        assert_eq!(output.bytes, [255, 0, 0, 255].repeat(16));

        // A clean worker exit implies every output handle was released,
        // otherwise the loop's shutdown would have refused.
        drop(fixture.client);
        fixture.worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_channel_serves_many_jobs() {
        let mut fixture = start_worker(1 << 20, 1 << 20);

        let red = fixture
            .client
            .submit(&solid_frame(4, 4, [255, 0, 0, 255]), &JobParams::default())
            .unwrap();
        assert_eq!(red.bytes.len(), 64);

        let bc5 = fixture
            .client
            .submit(
                &solid_frame(8, 8, [100, 50, 0, 255]),
                &JobParams {
                    target_format: TargetFormat::Bc5,
                    ..JobParams::default()
                },
            )
            .unwrap();
        assert_eq!(bc5.bytes.len(), TargetFormat::Bc5.encoded_len(8, 8));

        // A failed job must not poison the channel for the next one
        fixture
            .client
            .submit(&[0u8; 32], &JobParams::default())
            .unwrap_err();
        let green = fixture
            .client
            .submit(&solid_frame(2, 2, [0, 255, 0, 255]), &JobParams::default())
            .unwrap();
        assert_eq!(green.bytes, [0, 255, 0, 255].repeat(4));

        drop(fixture.client);
        fixture.worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_capacity_guard_rejects_before_sending() {
        let mut fixture = start_worker(4096, 4096);

        let oversized = vec![0u8; 8192];
        match fixture.client.submit(&oversized, &JobParams::default()) {
            Err(ShuttleError::Validation { parameter, .. }) => assert_eq!(parameter, "container"),
            other => panic!("expected local validation error, got {:?}", other),
        }

        // Nothing was sent, so the worker still serves the next job
        let output = fixture
            .client
            .submit(&solid_frame(2, 2, [1, 2, 3, 255]), &JobParams::default())
            .unwrap();
        assert_eq!(output.bytes, [1, 2, 3, 255].repeat(4));

        drop(fixture.client);
        fixture.worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_job_failure_status_surfaces_to_host() {
        let mut fixture = start_worker(1 << 20, 1 << 20);

        let err = fixture
            .client
            .submit(&[0xAB; 64], &JobParams::default())
            .unwrap_err();
        match err {
            ShuttleError::Codec { status, .. } => {
                assert_eq!(status, JobStatus::UnknownImageFormat)
            }
            other => panic!("expected codec error, got {:?}", other),
        }

        drop(fixture.client);
        fixture.worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_downscale_then_block_padding() {
        let mut fixture = start_worker(1 << 20, 1 << 20);

        let params = JobParams {
            target_format: TargetFormat::Bc5,
            max_side: 8,
            ..JobParams::default()
        };
        let output = fixture
            .client
            .submit(&solid_frame(10, 6, [200, 80, 0, 255]), &params)
            .unwrap();

        // 10x6 scales to 8x5, then pads to the 4x4 grid
        assert_eq!((output.width, output.height), (8, 8));
        assert_eq!(output.bytes.len(), TargetFormat::Bc5.encoded_len(8, 8));

        drop(fixture.client);
        fixture.worker.join().unwrap().unwrap();
    }

    #[test]
    fn test_dead_peer_fails_submission() {
        let dir = TempDir::new().unwrap();
        let input = SharedRegion::create(dir.path().join("input.region"), 4096).unwrap();
        let output = SharedRegion::create(dir.path().join("output.region"), 4096).unwrap();

        let (host_stream, worker_stream) = UnixStream::pair().unwrap();
        drop(worker_stream);

        let mut client = HostClient::new(ControlChannel::from_stream(host_stream), input, output);
        let err = client
            .submit(&solid_frame(2, 2, [0, 0, 0, 255]), &JobParams::default())
            .unwrap_err();
        match err {
            ShuttleError::Transport { .. } => {}
            other => panic!("expected transport error, got {:?}", other),
        }
    }
}
