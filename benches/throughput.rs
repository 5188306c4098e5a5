use chain_pipeline::{PassthroughStage, Processor, ProcessorBuilder};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

fn run_passthrough(stages: usize, workers: usize, capacity: usize, items: usize) {
    let mut builder = ProcessorBuilder::<Vec<u8>>::new()
        .with_max_workers(workers)
        .with_max_queue_length(capacity);
    for _ in 0..stages {
        builder = builder.add_stage(PassthroughStage);
    }
    let processor = builder.build().expect("Build failed");

    processor.start();
    for i in 0..items {
        let data = vec![i as u8; 64]; // 64 bytes per message
        let _ = processor.process(black_box(data));
    }
    processor.shutdown();
}

fn benchmark_single_stage_throughput(c: &mut Criterion) {
    c.bench_function("single_stage_1000_msgs", |b| {
        b.iter(|| run_passthrough(1, 4, 1000, 1000));
    });
}

fn benchmark_three_stage_throughput(c: &mut Criterion) {
    c.bench_function("three_stage_1000_msgs", |b| {
        b.iter(|| run_passthrough(3, 4, 1000, 1000));
    });
}

fn benchmark_worker_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_scaling_5000_msgs");
    for workers in [1, 2, 4, 8] {
        group.bench_function(format!("{workers}_workers"), |b| {
            b.iter(|| run_passthrough(2, workers, 2000, 5000));
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = benchmark_single_stage_throughput, benchmark_three_stage_throughput, benchmark_worker_scaling
);
criterion_main!(benches);
