//! Pipeline configuration.

use core::time::Duration;

use crate::error::Error;
use crate::error::Result;

/// The default buffer capacity.
pub const DEFAULT_CAPACITY: usize = 5;

/// The default number of producer tasks.
pub const DEFAULT_PRODUCERS: usize = 2;

/// The default number of consumer tasks.
pub const DEFAULT_CONSUMERS: usize = 1;

/// How long the pipeline runs before it is stopped, by default.
pub const DEFAULT_RUN_FOR: Duration = Duration::from_secs(10);

/// Settings for a producer/consumer [`Pipeline`](crate::Pipeline).
///
/// The defaults describe the classic exercise: a buffer of five items, two
/// producers, one consumer, stopped after ten seconds.
///
/// ```
/// use core::time::Duration;
/// use baton::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_capacity(16)
///     .with_consumers(2)
///     .with_run_for(Duration::from_millis(250));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum number of items held by the buffer.
    pub capacity: usize,
    /// Number of producer tasks.
    pub producers: usize,
    /// Number of consumer tasks.
    pub consumers: usize,
    /// How long the orchestrator lets the pipeline run.
    pub run_for: Duration,
    /// Optional seed for the producers' item sources. Producer `n` uses
    /// `seed + n`. Without a seed every source is freshly seeded.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> PipelineConfig {
        PipelineConfig {
            capacity: DEFAULT_CAPACITY,
            producers: DEFAULT_PRODUCERS,
            consumers: DEFAULT_CONSUMERS,
            run_for: DEFAULT_RUN_FOR,
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Sets the buffer capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of producer tasks.
    pub fn with_producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    /// Sets the number of consumer tasks.
    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    /// Sets how long the orchestrator lets the pipeline run.
    pub fn with_run_for(mut self, run_for: Duration) -> Self {
        self.run_for = run_for;
        self
    }

    /// Makes the producers' items reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks that the pipeline can be started with this configuration.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("buffer capacity must be at least one"));
        }
        if self.producers == 0 {
            return Err(Error::InvalidConfig("at least one producer is required"));
        }
        if self.consumers == 0 {
            return Err(Error::InvalidConfig("at least one consumer is required"));
        }
        Ok(())
    }
}
