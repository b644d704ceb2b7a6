//! Benchmarks for the converter hot paths.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kern_core::Tensor;
use kern_providers::{create_transfer_registry, SystemMemoryAllocator};
use kern_sparse::{
    csr_indices_transposed, dense_to_sparse_coo, dense_to_sparse_csr, scan_for_sparse_matches,
    sparse_csr_to_dense,
};

fn sparse_fixture(rows: usize, cols: usize, density: f64) -> Tensor {
    // Deterministic pseudo-sparse pattern; no rng dependency needed.
    let data: Vec<f32> = (0..rows * cols)
        .map(|i| {
            if (i * 2654435761) % 1000 < (density * 1000.0) as usize {
                (i % 17) as f32 + 1.0
            } else {
                0.0
            }
        })
        .collect();
    Tensor::from_slice(&data, vec![rows, cols]).unwrap()
}

fn bench_dense_to_sparse(c: &mut Criterion) {
    let transfers = create_transfer_registry().unwrap();
    let cpu = SystemMemoryAllocator::new();
    let mut group = c.benchmark_group("dense_to_sparse");

    for size in [64usize, 256, 1024] {
        let dense = sparse_fixture(size, size, 0.05);
        group.bench_with_input(BenchmarkId::new("csr", size), &dense, |b, dense| {
            b.iter(|| dense_to_sparse_csr(&transfers, black_box(dense), &cpu, &cpu).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("coo_linear", size), &dense, |b, dense| {
            b.iter(|| dense_to_sparse_coo(&transfers, black_box(dense), &cpu, &cpu, true).unwrap());
        });
    }
    group.finish();
}

fn bench_sparse_to_dense(c: &mut Criterion) {
    let transfers = create_transfer_registry().unwrap();
    let cpu = SystemMemoryAllocator::new();
    let mut group = c.benchmark_group("sparse_to_dense");

    for size in [64usize, 256, 1024] {
        let dense = sparse_fixture(size, size, 0.05);
        let csr = dense_to_sparse_csr(&transfers, &dense, &cpu, &cpu).unwrap();
        group.bench_with_input(BenchmarkId::new("csr", size), &csr, |b, csr| {
            b.iter(|| sparse_csr_to_dense(&transfers, black_box(csr), &cpu, &cpu).unwrap());
        });
    }
    group.finish();
}

fn bench_transpose(c: &mut Criterion) {
    let transfers = create_transfer_registry().unwrap();
    let cpu = SystemMemoryAllocator::new();
    let mut group = c.benchmark_group("transpose_indices");

    for size in [64usize, 256, 1024] {
        let dense = sparse_fixture(size, size, 0.05);
        let csr = dense_to_sparse_csr(&transfers, &dense, &cpu, &cpu).unwrap();
        let dims = [size as i64, size as i64];
        group.bench_with_input(BenchmarkId::from_parameter(size), &csr, |b, csr| {
            b.iter(|| csr_indices_transposed(dims, black_box(csr)).unwrap());
        });
    }
    group.finish();
}

fn bench_sparse_matches(c: &mut Criterion) {
    let a: Vec<i64> = (0..100_000).step_by(3).collect();
    let b: Vec<i64> = (0..100_000).step_by(7).collect();

    c.bench_function("scan_for_sparse_matches_100k", |bencher| {
        bencher.iter(|| {
            let mut count = 0usize;
            scan_for_sparse_matches(black_box(&a), black_box(&b), |_, _| count += 1);
            black_box(count)
        });
    });
}

criterion_group!(
    benches,
    bench_dense_to_sparse,
    bench_sparse_to_dense,
    bench_transpose,
    bench_sparse_matches
);
criterion_main!(benches);
