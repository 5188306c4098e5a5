//! The routing and execution loops shared by every thread of a processor.
//!
//! All items enter through the admission gate: fresh submissions at stage 0
//! and, after each stage completes, the same item re-admitted at the next
//! stage index. A single dispatcher moves items from the gate into the
//! buffer of their stage; a pool of workers drains whichever stage buffer is
//! currently fullest.

use crate::buffer::StageBuffer;
use crate::metrics::PipelineMetrics;
use crate::stage::{Stage, WorkItem};
use log::{debug, error, trace};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// State shared by the dispatcher, the workers and the submitting callers
pub(crate) struct Engine<T> {
    stages: Vec<Box<dyn Stage<T>>>,
    gate: StageBuffer<WorkItem<T>>,
    buffers: Vec<StageBuffer<WorkItem<T>>>,
    /// Items admitted and not yet completed or dropped, wherever they are:
    /// in the gate, in a stage buffer, or inside a stage call
    pending: AtomicUsize,
    shutdown_requested: AtomicBool,
    poll_interval: Duration,
    metrics: PipelineMetrics,
}

impl<T: Send> Engine<T> {
    pub(crate) fn new(
        stages: Vec<Box<dyn Stage<T>>>,
        queue_capacity: usize,
        poll_interval: Duration,
    ) -> Self {
        let buffers = stages
            .iter()
            .map(|_| StageBuffer::new(queue_capacity))
            .collect();
        let metrics = PipelineMetrics::new(stages.iter().map(|s| s.name().to_string()));
        Self {
            stages,
            gate: StageBuffer::new(queue_capacity),
            buffers,
            pending: AtomicUsize::new(0),
            shutdown_requested: AtomicBool::new(false),
            poll_interval,
            metrics,
        }
    }

    pub(crate) fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub(crate) fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub(crate) fn queue_capacity(&self) -> usize {
        self.gate.capacity()
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Items currently sitting in stage buffers, excluding the gate
    pub(crate) fn buffered(&self) -> usize {
        self.buffers.iter().map(StageBuffer::len).sum()
    }

    /// Put a new submission into the gate at stage 0.
    ///
    /// Never blocks; `false` means the gate was full.
    pub(crate) fn admit(&self, payload: T) -> bool {
        // Count before publishing so a fast worker can never finish the item
        // and decrement first.
        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.gate.try_push(WorkItem::new(payload)) {
            Ok(()) => {
                self.metrics.record_admitted();
                true
            }
            Err(_) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                self.metrics.record_rejected();
                false
            }
        }
    }

    /// Index of the stage buffer with the most queued items.
    ///
    /// Reads a racy occupancy snapshot; ties go to the lowest index and an
    /// empty pipeline yields stage 0.
    pub(crate) fn busiest_buffer(&self) -> usize {
        let mut busiest = 0;
        let mut max_len = 0;
        for (index, buffer) in self.buffers.iter().enumerate() {
            let len = buffer.len();
            if len > max_len {
                busiest = index;
                max_len = len;
            }
        }
        busiest
    }

    /// Ask every worker to exit once the pipeline is quiescent
    pub(crate) fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
    }

    fn is_quiescent(&self) -> bool {
        self.pending() == 0
    }

    /// Stop the dispatcher once it has routed what is left in the gate
    pub(crate) fn close_gate(&self) {
        self.gate.close();
    }

    pub(crate) fn close_buffers(&self) {
        for buffer in &self.buffers {
            buffer.close();
        }
    }

    /// Route items from the gate to their stage buffers until the gate closes
    pub(crate) fn run_dispatcher(&self) {
        debug!("dispatcher started");
        while let Some(item) = self.gate.pop_blocking() {
            let stage = item.stage();
            if self.buffers[stage].try_push(item).is_err() {
                trace!("stage {stage} buffer full, dropping item");
                self.metrics.record_routing_drop();
                self.release();
            }
        }
        debug!("dispatcher stopped");
    }

    /// Drain the busiest stage buffer until shutdown finds nothing pending
    pub(crate) fn run_worker(&self, id: usize) {
        debug!("worker {id} started");
        loop {
            let target = self.busiest_buffer();
            match self.buffers[target].pop_timeout(self.poll_interval) {
                Some(item) => self.execute(item),
                None => {
                    if self.shutdown_requested.load(Ordering::Acquire) && self.is_quiescent() {
                        break;
                    }
                }
            }
        }
        debug!("worker {id} stopped");
    }

    /// Apply the item's stage and send the result on to the next one.
    ///
    /// A panicking stage drops the item; the worker keeps running.
    fn execute(&self, item: WorkItem<T>) {
        let index = item.stage();
        let stage = &self.stages[index];
        let payload = item.into_payload();

        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| stage.apply(payload)));
        let stage_metrics = self.metrics.stage(index);

        let output = match result {
            Ok(output) => {
                if let Some(m) = stage_metrics {
                    m.record_processed(start.elapsed());
                }
                output
            }
            Err(panic_info) => {
                error!(
                    "stage {} ({}) panicked, dropping item: {}",
                    index,
                    stage.name(),
                    panic_message(panic_info)
                );
                if let Some(m) = stage_metrics {
                    m.record_fault();
                }
                self.release();
                return;
            }
        };

        let next = index + 1;
        if next < self.stages.len() {
            if self.gate.try_push(WorkItem::at_stage(output, next)).is_err() {
                trace!("admission gate full, dropping item bound for stage {next}");
                self.metrics.record_advance_drop();
                self.release();
            }
        } else {
            self.metrics.record_completed();
            self.release();
        }
    }

    /// An item left the pipeline, completed or dropped
    fn release(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

fn panic_message(panic_info: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
