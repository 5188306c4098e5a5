use thiserror::Error;

/// Result type for chain pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while building or starting a processor.
///
/// Backpressure is not an error: a rejected submission is reported by
/// [`Processor::process`](crate::Processor::process) returning `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Worker count below one
    #[error("max workers must be greater than zero and ideally greater than one, got {0}")]
    InvalidWorkerCount(usize),

    /// Queue capacity below one
    #[error("max queue length must be greater than zero and high enough to allow smooth operation, got {0}")]
    InvalidQueueLength(usize),

    /// Worker poll interval of zero
    #[error("worker poll interval must be non-zero")]
    InvalidPollInterval,

    /// No stages in pipeline
    #[error("no processing stages have been set")]
    NoStages,

    /// Thread spawn or join error
    #[error("thread error: {0}")]
    ThreadError(String),
}
