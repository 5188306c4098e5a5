//! A bounded, multi-stage concurrent pipeline with a shared worker pool.
//!
//! Submitted items pass through a fixed, ordered chain of stage functions.
//! Rather than dedicating threads to stages, one pool of workers serves
//! every stage and always drains whichever stage buffer is currently most
//! backed up.
//!
//! # Features
//!
//! - Bounded, lock-free queues using crossbeam's ArrayQueue
//! - Non-blocking admission: a full queue rejects, it never blocks the producer
//! - Busiest-queue worker scheduling
//! - Drain-on-shutdown: every admitted item finishes before `shutdown` returns
//! - Per-stage metrics: processed count, faults, latency percentiles
//!
//! # Example
//!
//! ```no_run
//! use chain_pipeline::{Processor, ProcessorBuilder};
//!
//! let processor = ProcessorBuilder::<u64>::new()
//!     .with_max_workers(4)
//!     .with_max_queue_length(128)
//!     .add_named_stage("double", |x: u64| x * 2)
//!     .add_named_stage("report", |x: u64| {
//!         println!("{x}");
//!         x
//!     })
//!     .build()?;
//!
//! processor.start();
//! for i in 0..10 {
//!     if !processor.process(i) {
//!         eprintln!("pipeline full, item {i} rejected");
//!     }
//! }
//! processor.shutdown();
//! # Ok::<(), chain_pipeline::PipelineError>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod pipeline;
pub mod stage;
mod worker;

// Re-exports for convenience
pub use buffer::StageBuffer;
pub use config::ProcessorConfig;
pub use error::{PipelineError, Result};
pub use lifecycle::State;
pub use metrics::{MetricsSnapshot, PipelineMetrics, StageMetrics, StageSnapshot};
pub use pipeline::{ChainProcessor, ProcessorBuilder};
pub use stage::{NamedStage, PassthroughStage, Stage, WorkItem};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A processor that accepts items and runs them through its stages.
pub trait Processor<T> {
    /// Try to submit an item for processing.
    ///
    /// Returns `false` if the processor cannot accept the item: it is not
    /// running, or its admission queue is full. Never blocks.
    fn process(&self, item: T) -> bool;

    /// Start accepting items for processing. Before that call any submitted
    /// item is rejected. Calling it again has no effect.
    fn start(&self);

    /// Stop accepting items and wait until everything already accepted has
    /// finished processing. Calling it again has no effect.
    fn shutdown(&self);
}
