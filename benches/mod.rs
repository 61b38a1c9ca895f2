use criterion::{criterion_group, criterion_main};

mod http;

criterion_group!(
    benches,
    http::request::bench_compose_get,
    http::request::bench_compose_post,
    http::request::bench_stage_body
);
criterion_main!(benches);
