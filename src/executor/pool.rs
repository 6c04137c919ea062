//! Fixed-size worker pool with FIFO dispatch, timeout enforcement, and
//! worker replacement.
//!
//! Bookkeeping invariants:
//! - the slot vector never changes length except through `shutdown()`;
//!   replacement substitutes a fresh worker at the same slot index,
//! - every slot mutation happens under the single inner mutex,
//! - each slot carries a generation counter; a worker whose generation no
//!   longer matches its slot has been replaced and must not touch the pool,
//! - a task's outcome is signaled exactly once: its reply channel has
//!   capacity one and the caller stops listening after the first message.

use super::{PoolStatus, Task, TaskResult, TaskRunner};
use crate::core::{Error, Result};
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

enum Outcome {
    Completed(TaskResult),
    Crashed { task_id: String, message: String },
    Rejected { task_id: String },
}

struct WorkItem {
    task: Task,
    reply: Sender<Outcome>,
    /// Signaled when the item leaves the queue; the caller's timeout clock
    /// starts at dispatch, not at enqueue.
    dispatched: Sender<()>,
}

struct WorkerSlot {
    generation: u64,
    sender: Sender<WorkItem>,
    busy: bool,
}

struct InFlight {
    slot: usize,
    generation: u64,
    reply: Sender<Outcome>,
}

#[derive(Default)]
struct Inner {
    slots: Vec<WorkerSlot>,
    queue: VecDeque<WorkItem>,
    in_flight: HashMap<String, InFlight>,
    next_generation: u64,
    shutdown: bool,
}

/// Bounded worker pool executing `Task`s through a shared `TaskRunner`.
pub struct WorkerPool {
    inner: Arc<Mutex<Inner>>,
    runner: Arc<dyn TaskRunner>,
    max_workers: usize,
    default_timeout: Duration,
}

impl WorkerPool {
    /// Spawn `max_workers` workers immediately.
    pub fn new(max_workers: usize, default_timeout: Duration, runner: Arc<dyn TaskRunner>) -> Self {
        let pool = Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            runner,
            max_workers: max_workers.max(1),
            default_timeout,
        };
        let mut inner = pool.inner.lock();
        for _ in 0..pool.max_workers {
            let slot_index = inner.slots.len();
            let slot = Self::spawn_worker(
                &mut inner,
                slot_index,
                Arc::clone(&pool.inner),
                Arc::clone(&pool.runner),
            );
            inner.slots.push(slot);
        }
        drop(inner);
        pool
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Execute one task, blocking the caller for its single outcome.
    ///
    /// `Err` is a rejection: `TaskTimeout` (the worker was forcibly replaced),
    /// `WorkerCrashed` (likewise replaced), or `PoolShutdown`. A plugin-level
    /// failure completes normally with `TaskResult { success: false, .. }`.
    pub fn execute_task(&self, task: Task) -> Result<TaskResult> {
        let task_id = task.id.clone();
        let timeout = task.timeout.unwrap_or(self.default_timeout);
        let (reply_tx, reply_rx) = bounded(1);
        let (dispatched_tx, dispatched_rx) = bounded(1);

        {
            let mut inner = self.inner.lock();
            if inner.shutdown {
                return Err(Error::PoolShutdown { task_id });
            }
            inner.queue.push_back(WorkItem {
                task,
                reply: reply_tx,
                dispatched: dispatched_tx,
            });
            Self::dispatch(&mut inner);
        }

        // Phase 1: wait for dispatch (FIFO fairness bounds this by the work
        // ahead of us) or a rejection that arrives while still queued.
        crossbeam::select! {
            recv(dispatched_rx) -> _ => {}
            recv(reply_rx) -> outcome => {
                return match outcome {
                    Ok(outcome) => Self::map_outcome(outcome),
                    Err(_) => Err(Error::PoolShutdown { task_id }),
                };
            }
        }

        // Phase 2: the task is on a worker; the timeout clock runs.
        match reply_rx.recv_timeout(timeout) {
            Ok(outcome) => Self::map_outcome(outcome),
            Err(RecvTimeoutError::Timeout) => self.reject_timed_out(&task_id, &reply_rx, timeout),
            Err(RecvTimeoutError::Disconnected) => Err(Error::PoolShutdown { task_id }),
        }
    }

    /// Execute a batch, chunked to `max_workers` concurrently in flight.
    /// Results come back in input order, one outcome per task.
    pub fn execute_tasks(&self, mut tasks: Vec<Task>) -> Vec<Result<TaskResult>> {
        let mut results = Vec::with_capacity(tasks.len());
        while !tasks.is_empty() {
            let rest = tasks.split_off(tasks.len().min(self.max_workers));
            let chunk = std::mem::replace(&mut tasks, rest);
            let chunk_results: Vec<Result<TaskResult>> = std::thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .into_iter()
                    .map(|task| scope.spawn(move || self.execute_task(task)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(Error::External(anyhow::anyhow!(
                                "executor waiter thread panicked"
                            )))
                        })
                    })
                    .collect()
            });
            results.extend(chunk_results);
        }
        results
    }

    /// Reject every queued task, reject in-flight tasks, and terminate all
    /// workers. Idempotent in effect: `status()` afterwards reports zeros.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return;
        }
        inner.shutdown = true;

        for item in inner.queue.drain(..) {
            let _ = item.reply.try_send(Outcome::Rejected {
                task_id: item.task.id,
            });
        }
        for (task_id, in_flight) in inner.in_flight.drain() {
            let _ = in_flight.reply.try_send(Outcome::Rejected { task_id });
        }
        // Dropping the senders ends each worker loop; a worker still running
        // an abandoned task exits once it observes the empty slot vector.
        inner.slots.clear();
        log::debug!("worker pool shut down");
    }

    pub fn status(&self) -> PoolStatus {
        let inner = self.inner.lock();
        PoolStatus {
            total_workers: inner.slots.len(),
            available_workers: inner.slots.iter().filter(|s| !s.busy).count(),
            in_flight: inner.in_flight.len(),
            queued: inner.queue.len(),
        }
    }

    fn map_outcome(outcome: Outcome) -> Result<TaskResult> {
        match outcome {
            Outcome::Completed(result) => Ok(result),
            Outcome::Crashed { task_id, message } => {
                Err(Error::WorkerCrashed { task_id, message })
            }
            Outcome::Rejected { task_id } => Err(Error::PoolShutdown { task_id }),
        }
    }

    /// Timeout expiry: forcibly replace the worker and reject the task.
    /// The pool size is invariant across the replacement.
    fn reject_timed_out(
        &self,
        task_id: &str,
        reply_rx: &Receiver<Outcome>,
        timeout: Duration,
    ) -> Result<TaskResult> {
        let mut inner = self.inner.lock();
        match inner.in_flight.remove(task_id) {
            Some(in_flight) => {
                let slot_index = in_flight.slot;
                if inner
                    .slots
                    .get(slot_index)
                    .is_some_and(|slot| slot.generation == in_flight.generation)
                {
                    log::warn!(
                        "task '{}' exceeded {}ms; replacing worker at slot {}",
                        task_id,
                        timeout.as_millis(),
                        slot_index
                    );
                    let replacement = Self::spawn_worker(
                        &mut inner,
                        slot_index,
                        Arc::clone(&self.inner),
                        Arc::clone(&self.runner),
                    );
                    inner.slots[slot_index] = replacement;
                    Self::dispatch(&mut inner);
                }
                Err(Error::TaskTimeout {
                    task_id: task_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            // Completed in the race window between expiry and this lock.
            None => match reply_rx.try_recv() {
                Ok(outcome) => Self::map_outcome(outcome),
                Err(_) => Err(Error::TaskTimeout {
                    task_id: task_id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        }
    }

    /// Pop queued work onto available workers. Runs under the inner lock;
    /// never lets a worker idle while the queue is non-empty.
    fn dispatch(inner: &mut Inner) {
        loop {
            let Some(slot_index) = inner.slots.iter().position(|slot| !slot.busy) else {
                return;
            };
            let Some(item) = inner.queue.pop_front() else {
                return;
            };
            let _ = item.dispatched.try_send(());
            inner.in_flight.insert(
                item.task.id.clone(),
                InFlight {
                    slot: slot_index,
                    generation: inner.slots[slot_index].generation,
                    reply: item.reply.clone(),
                },
            );
            inner.slots[slot_index].busy = true;
            // Worker channels are unbounded; this cannot block under the lock.
            let _ = inner.slots[slot_index].sender.send(item);
        }
    }

    /// Create a fresh worker bound to `slot_index` with a new generation.
    fn spawn_worker(
        inner: &mut Inner,
        slot_index: usize,
        pool: Arc<Mutex<Inner>>,
        runner: Arc<dyn TaskRunner>,
    ) -> WorkerSlot {
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let (work_tx, work_rx) = unbounded();
        // A failed OS-thread spawn breaks the fixed pool-size invariant;
        // aborting is intentional.
        std::thread::Builder::new()
            .name(format!("auditmap-worker-{slot_index}"))
            .spawn(move || worker_loop(slot_index, generation, work_rx, pool, runner))
            .expect("failed to spawn worker thread");
        WorkerSlot {
            generation,
            sender: work_tx,
            busy: false,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    slot_index: usize,
    generation: u64,
    work_rx: Receiver<WorkItem>,
    pool: Arc<Mutex<Inner>>,
    runner: Arc<dyn TaskRunner>,
) {
    while let Ok(item) = work_rx.recv() {
        let task_id = item.task.id.clone();
        let start = Instant::now();
        let run = std::panic::catch_unwind(AssertUnwindSafe(|| runner.run(&item.task)));
        let duration = start.elapsed();

        let (outcome, crashed) = match run {
            Ok(Ok(issues)) => (
                Outcome::Completed(TaskResult {
                    task_id: task_id.clone(),
                    success: true,
                    issues,
                    error: None,
                    duration,
                }),
                false,
            ),
            Ok(Err(error)) => (
                Outcome::Completed(TaskResult {
                    task_id: task_id.clone(),
                    success: false,
                    issues: Vec::new(),
                    error: Some(error.to_string()),
                    duration,
                }),
                false,
            ),
            Err(panic) => (
                Outcome::Crashed {
                    task_id: task_id.clone(),
                    message: panic_message(panic),
                },
                true,
            ),
        };
        let _ = item.reply.try_send(outcome);

        let mut inner = pool.lock();
        let stale = inner
            .slots
            .get(slot_index)
            .map_or(true, |slot| slot.generation != generation);
        if stale {
            // Replaced after a timeout, or the pool shut down; the outcome
            // above was already superseded by a rejection.
            return;
        }
        inner.in_flight.remove(&task_id);

        if crashed {
            log::warn!("worker at slot {slot_index} crashed; replacing");
            let replacement = WorkerPool::spawn_worker(
                &mut inner,
                slot_index,
                Arc::clone(&pool),
                Arc::clone(&runner),
            );
            inner.slots[slot_index] = replacement;
            WorkerPool::dispatch(&mut inner);
            return;
        }

        inner.slots[slot_index].busy = false;
        WorkerPool::dispatch(&mut inner);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
