use crate::config::ProcessorConfig;
use crate::error::{PipelineError, Result};
use crate::lifecycle::{Lifecycle, State, Transition};
use crate::metrics::PipelineMetrics;
use crate::stage::{NamedStage, Stage};
use crate::worker::Engine;
use crate::Processor;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Body of a pipeline thread
type Task = Box<dyn FnOnce() + Send + 'static>;

fn spawn_named(name: String, task: Task) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(task)
}

/// Builder for constructing chain processors
pub struct ProcessorBuilder<T> {
    config: ProcessorConfig,
    stages: Vec<Box<dyn Stage<T>>>,
}

impl<T: Send + 'static> ProcessorBuilder<T> {
    /// Create a builder with default settings and no stages
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            stages: Vec::new(),
        }
    }

    /// Replace every setting at once
    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of worker threads
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Set the capacity of the admission gate and of each stage buffer
    pub fn with_max_queue_length(mut self, max_queue_length: usize) -> Self {
        self.config.max_queue_length = max_queue_length;
        self
    }

    /// Set how long an idle worker waits before re-checking for shutdown
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    /// Append a stage to the end of the chain
    pub fn add_stage<S>(mut self, stage: S) -> Self
    where
        S: Stage<T> + 'static,
    {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a closure stage with a name used in logs and metrics
    pub fn add_named_stage<F>(self, name: impl Into<String>, mapper: F) -> Self
    where
        F: Fn(T) -> T + Send + Sync + 'static,
    {
        self.add_stage(NamedStage::new(name, mapper))
    }

    /// Append several boxed stages in order
    pub fn add_stages<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn Stage<T>>>,
    {
        self.stages.extend(stages);
        self
    }

    /// Validate the settings and assemble a stopped processor
    pub fn build(self) -> Result<ChainProcessor<T>> {
        self.config.validate()?;
        if self.stages.is_empty() {
            return Err(PipelineError::NoStages);
        }

        let engine = Engine::new(
            self.stages,
            self.config.max_queue_length,
            self.config.poll_interval,
        );

        Ok(ChainProcessor {
            engine: Arc::new(engine),
            lifecycle: Lifecycle::new(),
            worker_count: self.config.max_workers,
            control: Mutex::new(()),
            dispatcher: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
        })
    }
}

impl<T: Send + 'static> Default for ProcessorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A fixed chain of stages run by a shared pool of workers.
///
/// Every submission passes through each stage in order. Workers are not tied
/// to a stage; each one repeatedly serves whichever stage buffer is most
/// backed up. All queues are bounded and never block a producer: a full
/// queue rejects the submission at the gate, and silently drops an item
/// between stages.
pub struct ChainProcessor<T: Send + 'static> {
    engine: Arc<Engine<T>>,
    lifecycle: Lifecycle,
    worker_count: usize,
    /// Serializes start and shutdown; a second shutdown waits on it until
    /// the first has drained everything
    control: Mutex<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> ChainProcessor<T> {
    /// Get the current lifecycle state
    pub fn state(&self) -> State {
        self.lifecycle.current()
    }

    /// Whether submissions are currently accepted
    pub fn is_running(&self) -> bool {
        self.state() == State::Running
    }

    /// Get the number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Get the number of stages in the chain
    pub fn stage_count(&self) -> usize {
        self.engine.stage_count()
    }

    /// Capacity of the admission gate and of each stage buffer
    pub fn queue_capacity(&self) -> usize {
        self.engine.queue_capacity()
    }

    /// Items admitted but not yet completed or dropped
    pub fn pending(&self) -> usize {
        self.engine.pending()
    }

    /// Items waiting in stage buffers, excluding the admission gate
    pub fn buffered(&self) -> usize {
        self.engine.buffered()
    }

    /// Get the pipeline-wide and per-stage counters
    pub fn metrics(&self) -> &PipelineMetrics {
        self.engine.metrics()
    }

    /// Get a summary of all metrics
    pub fn metrics_summary(&self) -> String {
        self.metrics().snapshot().format()
    }

    /// Start the dispatcher and workers, then open the gate.
    ///
    /// If any thread fails to spawn, the ones already running are stopped
    /// and the processor ends `Stopped` without ever admitting an item.
    fn start_with<S>(&self, spawn: S)
    where
        S: FnMut(String, Task) -> io::Result<JoinHandle<()>>,
    {
        let _control = self.control.lock();
        match self.lifecycle.current() {
            State::Created => {}
            State::Running => return,
            state => {
                warn!("ignoring start on a processor in state {state:?}; restart is not supported");
                return;
            }
        }

        debug!(
            "starting chain processor: {} stages, {} workers, queue capacity {}",
            self.stage_count(),
            self.worker_count,
            self.queue_capacity()
        );
        if let Err(e) = self.spawn_threads(spawn) {
            error!("chain processor failed to start: {e}");
            if let Err(e) = self.stop() {
                error!("rolling back chain processor start: {e}");
            }
            self.lifecycle.abandon();
            return;
        }
        self.lifecycle.begin_running();
    }

    fn spawn_threads<S>(&self, mut spawn: S) -> Result<()>
    where
        S: FnMut(String, Task) -> io::Result<JoinHandle<()>>,
    {
        let engine = Arc::clone(&self.engine);
        let dispatcher = spawn(
            "chain-dispatcher".to_string(),
            Box::new(move || engine.run_dispatcher()),
        )
        .map_err(|e| PipelineError::ThreadError(format!("spawn dispatcher: {e}")))?;
        *self.dispatcher.lock() = Some(dispatcher);

        let mut workers = self.workers.lock();
        for id in 0..self.worker_count {
            let engine = Arc::clone(&self.engine);
            let handle = spawn(
                format!("chain-worker-{id}"),
                Box::new(move || engine.run_worker(id)),
            )
            .map_err(|e| PipelineError::ThreadError(format!("spawn worker {id}: {e}")))?;
            workers.push(handle);
        }
        Ok(())
    }

    /// Wait for the workers to drain everything, then tear the queues down
    fn stop(&self) -> Result<()> {
        self.engine.request_shutdown();

        let mut failures = 0;
        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                failures += 1;
            }
        }

        // Workers only exit once nothing is pending, so the gate is empty
        self.engine.close_gate();
        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                failures += 1;
            }
        }
        self.engine.close_buffers();

        if failures > 0 {
            return Err(PipelineError::ThreadError(format!(
                "{failures} pipeline thread(s) panicked"
            )));
        }
        Ok(())
    }
}

impl<T: Send + 'static> Processor<T> for ChainProcessor<T> {
    fn process(&self, item: T) -> bool {
        let state = self.lifecycle.read();
        if !state.accepts_submissions() {
            self.engine.metrics().record_rejected();
            return false;
        }
        self.engine.admit(item)
    }

    fn start(&self) {
        self.start_with(spawn_named);
    }

    fn shutdown(&self) {
        let _control = self.control.lock();
        if self.lifecycle.begin_draining() != Transition::Applied {
            return;
        }

        debug!("draining chain processor, {} items pending", self.pending());
        if let Err(e) = self.stop() {
            error!("chain processor shutdown: {e}");
        }
        self.lifecycle.finish_stopping();
        debug!("chain processor stopped");
    }
}

/// Dropping a running processor shuts it down, draining pending work
impl<T: Send + 'static> Drop for ChainProcessor<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::PassthroughStage;

    fn builder() -> ProcessorBuilder<u32> {
        ProcessorBuilder::new()
            .with_max_workers(2)
            .with_max_queue_length(10)
            .add_stage(PassthroughStage)
    }

    #[test]
    fn test_processor_builder() {
        let processor = builder().build().unwrap();
        assert_eq!(processor.state(), State::Created);
        assert_eq!(processor.worker_count(), 2);
        assert_eq!(processor.stage_count(), 1);
        assert_eq!(processor.queue_capacity(), 10);
    }

    #[test]
    fn test_no_stages_error() {
        let result = ProcessorBuilder::<u32>::new().with_max_queue_length(10).build();
        assert!(matches!(result, Err(PipelineError::NoStages)));
    }

    #[test]
    fn test_invalid_worker_count_error() {
        let result = builder().with_max_workers(0).build();
        assert!(matches!(result, Err(PipelineError::InvalidWorkerCount(0))));
    }

    #[test]
    fn test_invalid_poll_interval_error() {
        let result = builder().with_poll_interval(Duration::ZERO).build();
        assert!(matches!(result, Err(PipelineError::InvalidPollInterval)));
    }

    #[test]
    fn test_with_config_replaces_settings() {
        let config = ProcessorConfig {
            max_workers: 3,
            max_queue_length: 7,
            poll_interval: Duration::from_millis(1),
        };
        let processor = builder().with_config(config).build().unwrap();
        assert_eq!(processor.worker_count(), 3);
        assert_eq!(processor.queue_capacity(), 7);
    }

    #[test]
    fn test_invalid_queue_length_error() {
        let result = builder().with_max_queue_length(0).build();
        assert!(matches!(result, Err(PipelineError::InvalidQueueLength(0))));
    }

    #[test]
    fn test_add_stages_keeps_order() {
        let stages: Vec<Box<dyn Stage<u32>>> = vec![
            Box::new(NamedStage::new("first", |x: u32| x + 1)),
            Box::new(NamedStage::new("second", |x: u32| x * 2)),
        ];
        let processor = ProcessorBuilder::new()
            .with_max_queue_length(4)
            .add_stages(stages)
            .build()
            .unwrap();
        let snapshot = processor.metrics().snapshot();
        assert_eq!(snapshot.stages[0].name, "first");
        assert_eq!(snapshot.stages[1].name, "second");
    }

    #[test]
    fn test_lifecycle_transitions() {
        let processor = builder().build().unwrap();
        processor.start();
        assert!(processor.is_running());
        processor.shutdown();
        assert_eq!(processor.state(), State::Stopped);

        // Restart is ignored
        processor.start();
        assert_eq!(processor.state(), State::Stopped);
        assert!(!processor.process(1));
    }

    #[test]
    fn test_shutdown_before_start_is_noop() {
        let processor = builder().build().unwrap();
        processor.shutdown();
        assert_eq!(processor.state(), State::Created);
    }

    #[test]
    fn test_rejections_are_counted() {
        let processor = builder().build().unwrap();
        assert!(!processor.process(1));
        assert_eq!(processor.metrics().total_rejected(), 1);
        assert_eq!(processor.pending(), 0);
    }

    /// Spawner that starts `successes` threads and then refuses
    fn failing_after(successes: usize) -> impl FnMut(String, Task) -> io::Result<JoinHandle<()>> {
        let mut remaining = successes;
        move |name, task| {
            if remaining == 0 {
                return Err(io::Error::other(format!("refusing to spawn {name}")));
            }
            remaining -= 1;
            spawn_named(name, task)
        }
    }

    #[test]
    fn test_failed_dispatcher_spawn_leaves_processor_stopped() {
        let processor = builder().build().unwrap();
        processor.start_with(failing_after(0));
        assert_eq!(processor.state(), State::Stopped);
        assert!(!processor.process(1));
        assert_eq!(processor.pending(), 0);
    }

    #[test]
    fn test_failed_worker_spawn_rolls_back_started_threads() {
        let processor = builder().with_poll_interval(Duration::from_millis(1)).build().unwrap();
        // Dispatcher and the first worker start, the second worker fails
        processor.start_with(failing_after(2));
        assert_eq!(processor.state(), State::Stopped);
        assert!(processor.workers.lock().is_empty());
        assert!(processor.dispatcher.lock().is_none());
        assert!(!processor.process(1));

        processor.start();
        assert_eq!(processor.state(), State::Stopped);
    }
}
