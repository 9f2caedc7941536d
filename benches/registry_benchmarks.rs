// benches/registry_benchmarks.rs — registry construction cost.
//
//   cargo bench --bench registry_benchmarks
//
// Uses the in-memory backend, so the numbers are the crate's own overhead:
// reading and checking the library once per device plus record setup. On a
// real GPU, `request_device` dominates and is not what we measure here.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::PathBuf;
use std::time::Duration;

use gpu_registry::mock::{MockBackend, MockDevice};
use gpu_registry::{list_devices, Registry};

fn shipped_library() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("share/gpu-registry/kernels/image_ops.wgsl")
}

fn bench_initialize(c: &mut Criterion) {
    let path = shipped_library();
    let mut group = c.benchmark_group("initialize");
    group.warm_up_time(Duration::from_secs(1));

    for n in [1usize, 4, 16] {
        let backend = MockBackend::new((0..n).map(|i| MockDevice::new(format!("D{i}"))).collect());
        group.bench_with_input(BenchmarkId::new("all_load", n), &n, |b, _| {
            b.iter(|| Registry::initialize(backend.clone(), &path))
        });

        let failing = MockBackend::new(
            (0..n).map(|i| MockDevice::rejecting(format!("D{i}"), "bench")).collect(),
        );
        group.bench_with_input(BenchmarkId::new("all_fail", n), &n, |b, _| {
            b.iter(|| Registry::initialize(failing.clone(), &path))
        });
    }
    group.finish();
}

fn bench_listing(c: &mut Criterion) {
    let backend = MockBackend::new((0..16).map(|i| MockDevice::new(format!("D{i}"))).collect());
    let registry = Registry::initialize(backend, shipped_library());
    c.bench_function("list_devices/16", |b| b.iter(|| list_devices(&registry)));
}

criterion_group!(benches, bench_initialize, bench_listing);
criterion_main!(benches);
