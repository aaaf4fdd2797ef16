use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use texshuttle::{
    codec::cpu::encode_raw_frame, CompressionService, CpuCodec, DecodedImage, HandleTable,
    JobParams, JobRequest, JobResponse, JobStatus, SourceFormat, TargetFormat,
};

fn solid_frame(side: u32) -> Vec<u8> {
    encode_raw_frame(&DecodedImage {
        width: side,
        height: side,
        format: SourceFormat::Rgba32,
        pixels: [180u8, 90, 30, 255].repeat((side * side) as usize),
    })
}

fn benchmark_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("Protocol_Records");

    let request = JobRequest {
        input_len: 4096,
        max_side: 2048,
        target_format: TargetFormat::Bc5.id(),
        quality: 0.9,
        encode_target: 0,
        thread_count: 4,
    };
    group.bench_function("request_round_trip", |b| {
        b.iter(|| {
            let bytes = request.to_bytes();
            JobRequest::from_bytes(&bytes).unwrap()
        });
    });

    let response = JobResponse {
        status: JobStatus::Success,
        output_len: 4096,
        width: 64,
        height: 64,
    };
    group.bench_function("response_round_trip", |b| {
        b.iter(|| {
            let bytes = response.to_bytes();
            JobResponse::from_bytes(&bytes).unwrap()
        });
    });

    group.finish();
}

fn benchmark_handle_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("HandleTable");

    for buffers in [16usize, 256, 4096].iter() {
        group.throughput(Throughput::Elements(*buffers as u64));
        group.bench_with_input(
            BenchmarkId::new("register_release", buffers),
            buffers,
            |b, &buffers| {
                let table = HandleTable::new();
                b.iter(|| {
                    let handles: Vec<_> =
                        (0..buffers).map(|_| table.register(vec![0u8; 256])).collect();
                    for handle in handles {
                        table.release(handle);
                    }
                });
            },
        );
    }

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("Pipeline");
    let service = CompressionService::new(Box::new(CpuCodec::new()));

    for side in [64u32, 256].iter() {
        let container = solid_frame(*side);
        group.throughput(Throughput::Bytes((side * side * 4) as u64));

        group.bench_with_input(
            BenchmarkId::new("identity", side),
            &container,
            |b, container| {
                b.iter(|| service.process(container, &JobParams::default()).unwrap());
            },
        );

        let bc5 = JobParams {
            target_format: TargetFormat::Bc5,
            ..JobParams::default()
        };
        group.bench_with_input(BenchmarkId::new("bc5", side), &container, |b, container| {
            b.iter(|| service.process(container, &bc5).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_record_codec,
    benchmark_handle_table,
    benchmark_pipeline
);
criterion_main!(benches);
