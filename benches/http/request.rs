use criterion::{Criterion, Throughput};
use modem_http::http::{HeaderMap, Method, Request};
use rand::RngCore;

pub fn bench_compose_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose_get");
    group.bench_function("request_line_and_common_headers", |b| {
        b.iter(|| {
            let mut buf = [0u8; 512];
            let mut request =
                Request::new(Method::Get, "https://api.example.com", "/telemetry", &mut buf)
                    .expect("request fits");
            request
                .add_common_headers(HeaderMap::ALL)
                .expect("headers fit");
            request
                .add_basic_auth("device-7", "hunter2")
                .expect("auth fits");
            request.as_bytes().len()
        });
    });
    group.finish();
}

pub fn bench_compose_post(c: &mut Criterion) {
    let mut payload = [0u8; 1024];
    rand::thread_rng().fill_bytes(&mut payload);

    let mut group = c.benchmark_group("compose_post");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("head_body_and_patch", |b| {
        b.iter(|| {
            let mut buf = [0u8; 2048];
            let mut request =
                Request::new(Method::Post, "https://api.example.com", "/ingest", &mut buf)
                    .expect("request fits");
            request
                .add_common_headers(HeaderMap::CONTENT_TYPE)
                .expect("headers fit");
            request.add_post_data(&payload).expect("body fits");
            request.as_bytes().len()
        });
    });
    group.finish();
}

pub fn bench_stage_body(c: &mut Criterion) {
    let mut chunk = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut chunk);

    let mut group = c.benchmark_group("stage_body");
    group.throughput(Throughput::Bytes((chunk.len() * 16) as u64));
    group.bench_function("sixteen_chunks", |b| {
        b.iter(|| {
            let mut buf = [0u8; 2048];
            let mut request =
                Request::new(Method::Post, "https://api.example.com", "/ingest", &mut buf)
                    .expect("request fits");
            for _ in 0..16 {
                request.add_post_data(&chunk).expect("chunk fits");
            }
            request.as_bytes().len()
        });
    });
    group.finish();
}
