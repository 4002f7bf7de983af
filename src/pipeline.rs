//! Producer and consumer tasks, and the orchestration that starts and stops
//! them.
//!
//! Every task runs on its own thread, shares one [`BoundedBuffer`] with the
//! others and owns a [`CancellationToken`]. A task loops while the buffer is
//! running and its token is not cancelled; a [`Halted`] result from the buffer
//! ends the loop early.
//!
//! [`Halted`]: crate::Halted

use alloc::format;
use alloc::vec::Vec;
use core::fmt;

use tracing::debug;
use tracing::debug_span;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::Item;
use crate::buffer::BoundedBuffer;
use crate::buffer::BufferStats;
use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::error::Result;
use crate::platform::*;
use crate::source::ItemSource;
use crate::unwind;

// -----------------------------------------------------------------------------
// Task loops

/// The job a pipeline task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Generates items and pushes them into the buffer.
    Producer,
    /// Takes items out of the buffer.
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Pushes items from `source` into `buffer` until the buffer stops or `token`
/// is cancelled. Returns the number of items produced.
pub fn run_producer(
    buffer: &BoundedBuffer<Item>,
    token: &CancellationToken,
    source: &mut ItemSource,
) -> u64 {
    let mut produced = 0;
    while buffer.is_running() && !token.is_cancelled() {
        let item = source.next_item();
        match buffer.produce(item, token) {
            Ok(()) => {
                trace!(item, "produced");
                produced += 1;
            }
            Err(halted) => {
                debug!(%halted, "producer halted");
                break;
            }
        }
    }
    produced
}

/// Takes items out of `buffer` until the buffer stops or `token` is
/// cancelled. Returns the number of items consumed.
pub fn run_consumer(buffer: &BoundedBuffer<Item>, token: &CancellationToken) -> u64 {
    let mut consumed = 0;
    while buffer.is_running() && !token.is_cancelled() {
        match buffer.consume(token) {
            Ok(item) => {
                trace!(item, "consumed");
                consumed += 1;
            }
            Err(halted) => {
                debug!(%halted, "consumer halted");
                break;
            }
        }
    }
    consumed
}

// -----------------------------------------------------------------------------
// Reports

/// What a single task did before it exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    /// Whether the task produced or consumed.
    pub role: Role,
    /// The task's index among tasks of the same role.
    pub index: usize,
    /// How many items the task moved.
    pub handled: u64,
}

/// The outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// One entry per task that exited normally, in start order.
    pub tasks: Vec<TaskReport>,
    /// Tasks whose thread panicked. Their panics are logged and swallowed.
    pub failed_tasks: usize,
    /// The buffer's counters at shutdown.
    pub buffer: BufferStats,
}

impl PipelineReport {
    /// Total items produced by tasks that exited normally.
    pub fn produced(&self) -> u64 {
        self.handled_by(Role::Producer)
    }

    /// Total items consumed by tasks that exited normally.
    pub fn consumed(&self) -> u64 {
        self.handled_by(Role::Consumer)
    }

    /// Items that were produced but still sat in the buffer at shutdown.
    pub fn left_in_buffer(&self) -> u64 {
        self.buffer.produced - self.buffer.consumed
    }

    fn handled_by(&self, role: Role) -> u64 {
        self.tasks
            .iter()
            .filter(|task| task.role == role)
            .map(|task| task.handled)
            .sum()
    }
}

// -----------------------------------------------------------------------------
// Pipeline

/// A running set of producer and consumer tasks around one shared buffer.
///
/// The pipeline is stopped by [`Pipeline::shutdown`] or by dropping it.
/// Either way the shutdown is two-phase: the buffer's running flag is cleared
/// first, then every task's token is cancelled, and finally every thread is
/// joined.
pub struct Pipeline {
    buffer: Arc<BoundedBuffer<Item>>,
    tasks: Vec<TaskHandle>,
}

struct TaskHandle {
    role: Role,
    index: usize,
    token: CancellationToken,
    handle: JoinHandle<u64>,
}

impl Pipeline {
    /// Validates `config`, creates the buffer and starts every task.
    pub fn start(config: &PipelineConfig) -> Result<Pipeline> {
        config.validate()?;

        let mut pipeline = Pipeline {
            buffer: Arc::new(BoundedBuffer::try_new(config.capacity)?),
            tasks: Vec::with_capacity(config.producers + config.consumers),
        };

        debug!(
            capacity = config.capacity,
            producers = config.producers,
            consumers = config.consumers,
            "starting pipeline"
        );

        // If a thread fails to start, dropping `pipeline` stops the others.
        for index in 0..config.producers {
            let mut source = match config.seed {
                Some(seed) => ItemSource::from_seed(seed.wrapping_add(index as u64)),
                None => ItemSource::new(),
            };
            pipeline.spawn_task(Role::Producer, index, move |buffer, token| {
                run_producer(buffer, token, &mut source)
            })?;
        }

        for index in 0..config.consumers {
            pipeline.spawn_task(Role::Consumer, index, run_consumer)?;
        }

        Ok(pipeline)
    }

    fn spawn_task<F>(&mut self, role: Role, index: usize, body: F) -> Result<()>
    where
        F: FnOnce(&BoundedBuffer<Item>, &CancellationToken) -> u64 + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let buffer = self.buffer.clone();

        let handle = ThreadBuilder::new()
            .name(format!("{role}-{index}"))
            .spawn(move || {
                let span = debug_span!("task", %role, index);
                let _enter = span.enter();
                debug!("task started");
                let handled = body(&buffer, &task_token);
                debug!(handled, "task exited");
                handled
            })
            .map_err(Error::Spawn)?;

        self.tasks.push(TaskHandle {
            role,
            index,
            token,
            handle,
        });

        Ok(())
    }

    /// Returns the shared buffer.
    pub fn buffer(&self) -> &BoundedBuffer<Item> {
        &self.buffer
    }

    /// Stops the pipeline, waits for every task and reports what they did.
    pub fn shutdown(mut self) -> PipelineReport {
        self.halt()
    }

    fn halt(&mut self) -> PipelineReport {
        // Phase one: every task checks the running flag on each iteration and
        // around each wait.
        self.buffer.stop_running();

        // Phase two: release any task that is still parked.
        for task in &self.tasks {
            task.token.cancel();
        }

        // Failures while joining are swallowed so that shutdown always
        // completes. They are only logged and counted.
        let mut report = PipelineReport::default();
        for task in self.tasks.drain(..) {
            match task.handle.join() {
                Ok(handled) => report.tasks.push(TaskReport {
                    role: task.role,
                    index: task.index,
                    handled,
                }),
                Err(payload) => {
                    warn!(
                        role = %task.role,
                        index = task.index,
                        message = %unwind::into_message(payload),
                        "task panicked"
                    );
                    report.failed_tasks += 1;
                }
            }
        }

        report.buffer = self.buffer.stats();
        debug!(
            produced = report.buffer.produced,
            consumed = report.buffer.consumed,
            "pipeline stopped"
        );
        report
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            self.halt();
        }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("buffer", &self.buffer)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Orchestration

/// Stops the buffer when dropped, including while unwinding.
struct StopOnDrop<'a>(&'a BoundedBuffer<Item>);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop_running();
    }
}

/// Runs a pipeline for `config.run_for`, or until `interrupt` is cancelled,
/// then shuts it down and returns the report.
///
/// The buffer is stopped whether the wait ends by timing out, by interrupt or
/// by unwinding.
pub fn run(config: &PipelineConfig, interrupt: &CancellationToken) -> Result<PipelineReport> {
    let pipeline = Pipeline::start(config)?;

    info!(run_for = ?config.run_for, "pipeline running");

    let interrupted = {
        let _stop = StopOnDrop(pipeline.buffer());
        interrupt.wait_timeout(config.run_for)
    };

    if interrupted {
        info!("interrupted, stopping pipeline");
    } else {
        debug!("run time elapsed, stopping pipeline");
    }

    Ok(pipeline.shutdown())
}
