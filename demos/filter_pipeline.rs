//! Number processing pipeline demonstrating filtering and transformations
//!
//! Pipeline:
//! 1. Filter: Keep only even numbers (odd ones become `None`)
//! 2. Transform: Multiply by 10
//! 3. Aggregate: Sum all numbers
//!
//! Stages cannot drop items, so the filter encodes rejection in the payload.
//!
//! Usage: cargo run --example filter_pipeline --release

use chain_pipeline::{Processor, ProcessorBuilder};
use env_logger::Env;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn main() -> chain_pipeline::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let sum = Arc::new(AtomicU64::new(0));
    let kept = Arc::new(AtomicU64::new(0));
    let (sum_sink, kept_sink) = (Arc::clone(&sum), Arc::clone(&kept));

    let processor = ProcessorBuilder::<Option<u32>>::new()
        .with_max_queue_length(64)
        .add_named_stage("even_filter", |n: Option<u32>| n.filter(|n| n % 2 == 0))
        .add_named_stage("multiply_by_10", |n: Option<u32>| n.map(|n| n * 10))
        .add_named_stage("aggregate", move |n: Option<u32>| {
            if let Some(n) = n {
                sum_sink.fetch_add(u64::from(n), Ordering::Relaxed);
                kept_sink.fetch_add(1, Ordering::Relaxed);
            }
            n
        })
        .build()?;

    let start = Instant::now();
    processor.start();

    for n in 1..=100u32 {
        // Back off and retry while the gate is full
        while !processor.process(Some(n)) {
            std::thread::sleep(Duration::from_micros(50));
        }
    }

    processor.shutdown();

    info!(
        "kept {} even numbers, sum of (n * 10) = {} in {:.2?}",
        kept.load(Ordering::Relaxed),
        sum.load(Ordering::Relaxed),
        start.elapsed()
    );
    info!("\n{}", processor.metrics_summary());
    Ok(())
}
