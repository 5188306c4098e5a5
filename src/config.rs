use crate::error::{PipelineError, Result};
use std::time::Duration;

/// Default capacity of the admission gate and of every stage buffer
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 1024;

/// Default time a worker waits on an empty buffer before re-checking shutdown
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Construction-time settings for a [`ChainProcessor`](crate::ChainProcessor)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Number of worker threads sharing all stages
    pub max_workers: usize,
    /// Capacity of the admission gate and of each stage buffer
    pub max_queue_length: usize,
    /// Worker poll window; also bounds shutdown-detection latency
    pub poll_interval: Duration,
}

impl ProcessorConfig {
    /// Check every setting, reporting the first one that is out of range
    pub fn validate(&self) -> Result<()> {
        if self.max_workers < 1 {
            return Err(PipelineError::InvalidWorkerCount(self.max_workers));
        }
        if self.max_queue_length < 1 {
            return Err(PipelineError::InvalidQueueLength(self.max_queue_length));
        }
        if self.poll_interval.is_zero() {
            return Err(PipelineError::InvalidPollInterval);
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().max(1),
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ProcessorConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_workers >= 1);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ProcessorConfig {
            max_workers: 0,
            ..ProcessorConfig::default()
        };
        assert_eq!(config.validate(), Err(PipelineError::InvalidWorkerCount(0)));
    }

    #[test]
    fn test_zero_queue_length_rejected() {
        let config = ProcessorConfig {
            max_queue_length: 0,
            ..ProcessorConfig::default()
        };
        assert_eq!(config.validate(), Err(PipelineError::InvalidQueueLength(0)));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = ProcessorConfig {
            poll_interval: Duration::ZERO,
            ..ProcessorConfig::default()
        };
        assert_eq!(config.validate(), Err(PipelineError::InvalidPollInterval));
    }
}
