use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use futures::executor::block_on;
use futures::io::Cursor;
use serde_json::json;

use peerlink_core::core_router::framing::{read_frame, write_frame};
use peerlink_core::core_router::RequestEnvelope;

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encoding");

    // Varying payload sizes up to typical query bodies
    for size in [100, 1_000, 10_000, 100_000].iter() {
        let payload = "x".repeat(*size);
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("payload_size", size), &payload, |b, payload| {
            b.iter(|| {
                let envelope = RequestEnvelope {
                    path: "/query".to_string(),
                    body: json!({"name": "bench", "query": payload, "peerid": "12D3KooW"}),
                };
                let bytes = serde_json::to_vec(&envelope).unwrap();
                let mut out = Vec::with_capacity(bytes.len() + 4);
                block_on(write_frame(&mut out, &bytes)).unwrap();
                black_box(out)
            });
        });
    }

    group.finish();
}

fn bench_frame_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoding");

    for size in [100, 1_000, 10_000, 100_000].iter() {
        let payload = "x".repeat(*size);
        let envelope = RequestEnvelope {
            path: "/query".to_string(),
            body: json!({"name": "bench", "query": payload, "peerid": "12D3KooW"}),
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let mut framed = Vec::new();
        block_on(write_frame(&mut framed, &bytes)).unwrap();

        group.throughput(Throughput::Bytes(framed.len() as u64));
        group.bench_with_input(BenchmarkId::new("payload_size", size), &framed, |b, framed| {
            b.iter(|| {
                let mut cursor = Cursor::new(framed.as_slice());
                let frame = block_on(read_frame(&mut cursor)).unwrap();
                let decoded: RequestEnvelope = serde_json::from_slice(&frame).unwrap();
                black_box(decoded)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame_encoding, bench_frame_decoding);
criterion_main!(benches);
