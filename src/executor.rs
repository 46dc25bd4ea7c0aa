//! Task execution: strictly sequential by default, or across a bounded
//! worker pool sized by configuration.
//!
//! A task always runs to completion on one worker, so within-task event order
//! is the declared order regardless of mode. Under parallel execution the
//! host still sees each task's events and log lines as one contiguous block,
//! held back at most by the configured sorting timeout; the summary is
//! recorded at emission time either way, so the timeout affects presentation
//! only.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::config::Configuration;
use crate::errors::EngineError;
use crate::events::{EventSink, LogSink, StatusEvent};
use crate::task::Task;

pub struct TaskExecutor {
    worker_count: usize,
    sorting_timeout: Duration,
}

impl TaskExecutor {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            worker_count: config.worker_count.max(1),
            sorting_timeout: Duration::from_millis(config.sorting_timeout_ms),
        }
    }

    /// Run every task. Per-suite fatal conditions (construction failures) do
    /// not stop the remaining tasks; the first one is returned after the
    /// whole batch has run.
    pub fn run(
        &self,
        tasks: &[Task],
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) -> Result<(), EngineError> {
        if self.worker_count <= 1 {
            self.run_sequential(tasks, sink, logs)
        } else {
            self.run_parallel(tasks, sink, logs)
        }
    }

    fn run_sequential(
        &self,
        tasks: &[Task],
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) -> Result<(), EngineError> {
        let mut first_error = None;
        for task in tasks {
            if let Err(err) = task.execute(sink, logs) {
                tracing::warn!(suite = %task.request().qualified_name, %err, "task failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_parallel(
        &self,
        tasks: &[Task],
        sink: &dyn EventSink,
        logs: &[&dyn LogSink],
    ) -> Result<(), EngineError> {
        tracing::debug!(workers = self.worker_count, tasks = tasks.len(), "parallel run");
        let sorter = SortingSink::new(sink, logs, self.sorting_timeout);
        let errors: Mutex<Vec<EngineError>> = Mutex::new(Vec::new());
        let (tx, rx) = crossbeam_channel::bounded::<usize>(tasks.len());
        for slot in 0..tasks.len() {
            // Bounded to tasks.len(), so this cannot block.
            let _ = tx.send(slot);
        }
        drop(tx);

        std::thread::scope(|scope| {
            for _ in 0..self.worker_count.min(tasks.len().max(1)) {
                let rx = rx.clone();
                let sorter = &sorter;
                let errors = &errors;
                scope.spawn(move || {
                    while let Ok(slot) = rx.recv() {
                        let buffer = BufferingSink::default();
                        let result = tasks[slot].execute(&buffer, &[&buffer]);
                        let (events, lines) = buffer.into_parts();
                        sorter.complete(slot, events, lines);
                        if let Err(err) = result {
                            errors.lock().push(err);
                        }
                    }
                });
            }
        });

        match errors.into_inner().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct BufferedLine {
    error: bool,
    text: String,
}

/// Collects one task's events and log lines so the whole block can be
/// presented at once.
#[derive(Default)]
struct BufferingSink {
    events: Mutex<Vec<StatusEvent>>,
    lines: Mutex<Vec<BufferedLine>>,
}

impl BufferingSink {
    fn into_parts(self) -> (Vec<StatusEvent>, Vec<BufferedLine>) {
        (self.events.into_inner(), self.lines.into_inner())
    }
}

impl EventSink for BufferingSink {
    fn handle(&self, event: StatusEvent) {
        self.events.lock().push(event);
    }
}

impl LogSink for BufferingSink {
    fn info(&self, line: &str) {
        self.lines.lock().push(BufferedLine {
            error: false,
            text: line.to_string(),
        });
    }

    fn error(&self, line: &str) {
        self.lines.lock().push(BufferedLine {
            error: true,
            text: line.to_string(),
        });
    }
}

struct SortState {
    /// The submission-order slot whose block should be presented next.
    next_slot: usize,
    /// Slots that gave up waiting and flushed out of order; skipped when
    /// `next_slot` reaches them.
    flushed_early: BTreeSet<usize>,
}

/// Presents completed task blocks to the host sink and logs in submission
/// order.
///
/// A worker finishing out of turn waits for its slot, bounded by the sorting
/// timeout; past the deadline the block is presented out of order rather than
/// held indefinitely. Blocks are always contiguous either way.
pub(crate) struct SortingSink<'a> {
    inner: &'a dyn EventSink,
    logs: &'a [&'a dyn LogSink],
    timeout: Duration,
    state: Mutex<SortState>,
    turn: Condvar,
}

impl<'a> SortingSink<'a> {
    pub(crate) fn new(
        inner: &'a dyn EventSink,
        logs: &'a [&'a dyn LogSink],
        timeout: Duration,
    ) -> Self {
        Self {
            inner,
            logs,
            timeout,
            state: Mutex::new(SortState {
                next_slot: 0,
                flushed_early: BTreeSet::new(),
            }),
            turn: Condvar::new(),
        }
    }

    fn complete(&self, slot: usize, events: Vec<StatusEvent>, lines: Vec<BufferedLine>) {
        let mut state = self.state.lock();
        // A timeout too large for deadline arithmetic degrades to a long
        // finite wait per turn.
        let deadline = Instant::now()
            .checked_add(self.timeout)
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(60 * 60 * 24));
        while slot != state.next_slot {
            if self.turn.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }

        // Flushing under the lock keeps blocks contiguous across workers.
        for event in events {
            self.inner.handle(event);
        }
        for line in &lines {
            for log in self.logs {
                if line.error {
                    log.error(&line.text);
                } else {
                    log.info(&line.text);
                }
            }
        }

        if slot == state.next_slot {
            state.next_slot += 1;
            while {
                let next = state.next_slot;
                state.flushed_early.remove(&next)
            } {
                state.next_slot += 1;
            }
        } else {
            state.flushed_early.insert(slot);
        }
        self.turn.notify_all();
    }
}
