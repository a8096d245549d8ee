//! Address construction and timeout decomposition benchmarks.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sockfd_core::{inet, poll};

fn bench_endpoint(c: &mut Criterion) {
    let hosts: &[&str] = &["0.0.0.0", "127.0.0.1", "255.255.255.255", "not-an-ip"];
    let mut group = c.benchmark_group("endpoint");

    for &host in hosts {
        group.bench_with_input(BenchmarkId::new("core", host), &host, |b, &h| {
            b.iter(|| criterion::black_box(inet::endpoint(criterion::black_box(h), 8080)));
        });
        group.bench_with_input(BenchmarkId::new("sockaddr_in", host), &host, |b, &h| {
            b.iter(|| criterion::black_box(sockfd::socket_address(criterion::black_box(h), 8080)));
        });
    }
    group.finish();
}

fn bench_plan_wait(c: &mut Criterion) {
    let timeouts: &[Option<f64>] = &[None, Some(0.0), Some(0.05), Some(1.5)];
    let mut group = c.benchmark_group("plan_wait");

    for &timeout in timeouts {
        let label = timeout.map_or_else(|| "none".to_string(), |t| t.to_string());
        group.bench_with_input(BenchmarkId::from_parameter(label), &timeout, |b, &t| {
            b.iter(|| criterion::black_box(poll::plan_wait(criterion::black_box(t))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_endpoint, bench_plan_wait);
criterion_main!(benches);
