//! Word frequency counter pipeline
//!
//! Reads lines from stdin, normalizes them, counts word frequencies, and
//! prints the top-N words.
//!
//! Usage: cargo run --example word_count --release
//!        (Then type lines of text and press Ctrl-D to finish)

use chain_pipeline::{Processor, ProcessorBuilder};
use env_logger::Env;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;

const TOP_N: usize = 10;
const MAX_RETRIES: usize = 1000;

fn normalize(line: String) -> String {
    line.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| word.len() > 2)
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> chain_pipeline::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let counts: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let sink = Arc::clone(&counts);

    let processor = ProcessorBuilder::<String>::new()
        .with_max_queue_length(256)
        .add_named_stage("normalize", normalize)
        .add_named_stage("count", move |line: String| {
            let mut counts = sink.lock();
            for word in line.split_whitespace() {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
            line
        })
        .build()?;

    processor.start();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stopped reading input: {e}");
                break;
            }
        };

        let mut retries = 0;
        while !processor.process(line.clone()) {
            retries += 1;
            if retries == MAX_RETRIES {
                warn!("pipeline saturated, skipping line");
                break;
            }
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    processor.shutdown();

    let mut top: Vec<_> = counts.lock().iter().map(|(k, v)| (k.clone(), *v)).collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    info!("Top {TOP_N} words:");
    for (word, count) in top.into_iter().take(TOP_N) {
        println!("{count:>8}  {word}");
    }
    info!("\n{}", processor.metrics_summary());
    Ok(())
}
