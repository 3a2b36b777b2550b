//! Worker pool running PoW searches off the async runtime.
//!
//! Two dispatch modes share one pool:
//!
//! - **Queued**: `max(cores - 1, 1)` long-lived threads pull jobs from one
//!   bounded queue. Each job is claimed by exactly one worker and answered on
//!   its own reply channel, so concurrent submissions never mix results.
//! - **Raced**: every core searches a disjoint lane of the *same* challenge.
//!   The first lane to find a solution publishes it and the other lanes stop
//!   at their next batch boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll};
use std::thread;

use dave_types::{Challenge, Solution};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::generator::{scan, work_load};
use crate::{CancelFlag, WorkError};

/// How a challenge is handed to the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// One worker per challenge; best throughput for many challenges.
    Queued,
    /// All cores on one challenge; lowest latency for a single challenge.
    Raced,
}

impl DispatchMode {
    /// Raced for a single submission, queued for batches.
    pub fn for_batch(ntest: usize) -> Self {
        if ntest > 1 {
            Self::Queued
        } else {
            Self::Raced
        }
    }
}

/// Number of cores the process may use (at least 1).
pub fn available_cores() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Queued worker count: every core but one, which is left for the orchestrator.
pub fn default_pool_size() -> usize {
    available_cores().saturating_sub(1).max(1)
}

struct Job {
    challenge: Challenge,
    difficulty: u8,
    cancel: CancelFlag,
    reply: oneshot::Sender<Solution>,
}

type JobQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Fixed set of PoW workers. Size and race width are fixed at construction.
pub struct WorkPool {
    jobs: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    racers: rayon::ThreadPool,
    size: usize,
    race_width: usize,
}

impl WorkPool {
    /// Pool with [`default_pool_size`] queued workers and one racer per core.
    pub fn new() -> Result<Self, WorkError> {
        Self::with_size(default_pool_size())
    }

    /// Pool with `size` queued workers (clamped to at least 1).
    pub fn with_size(size: usize) -> Result<Self, WorkError> {
        Self::with_widths(size, available_cores())
    }

    /// Pool with explicit queued and raced widths (both clamped to at least 1).
    pub fn with_widths(size: usize, race_width: usize) -> Result<Self, WorkError> {
        let size = size.max(1);
        let race_width = race_width.max(1);

        let (tx, rx) = mpsc::channel(size);
        let queue: JobQueue = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("dave-work-{id}"))
                .spawn(move || worker_loop(id, queue))
                .map_err(|e| WorkError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        let racers = rayon::ThreadPoolBuilder::new()
            .num_threads(race_width)
            .thread_name(|i| format!("dave-race-{i}"))
            .build()
            .map_err(|e| WorkError::Spawn(e.to_string()))?;

        debug!(workers = size, racers = race_width, "work pool started");
        Ok(Self {
            jobs: Some(tx),
            workers,
            racers,
            size,
            race_width,
        })
    }

    /// Number of queued-mode workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of lanes a raced search uses.
    pub fn race_width(&self) -> usize {
        self.race_width
    }

    /// Queue a challenge for the next free worker.
    ///
    /// Waits for queue space. The returned future resolves to the solution;
    /// dropping it cancels the search.
    pub async fn submit(
        &self,
        challenge: Challenge,
        difficulty: u8,
    ) -> Result<PendingSolution, WorkError> {
        let jobs = self.jobs.as_ref().ok_or(WorkError::PoolClosed)?;
        let (reply, rx) = oneshot::channel();
        let cancel = CancelFlag::new();
        let job = Job {
            challenge,
            difficulty,
            cancel: cancel.clone(),
            reply,
        };
        jobs.send(job).await.map_err(|_| WorkError::PoolClosed)?;
        Ok(PendingSolution { rx, cancel })
    }

    /// Search one challenge on every racer lane; blocks until a lane wins or
    /// `cancel` is raised.
    pub fn race(
        &self,
        challenge: &Challenge,
        difficulty: u8,
        cancel: &CancelFlag,
    ) -> Result<Solution, WorkError> {
        let load = work_load(challenge);
        let winner = OnceLock::new();
        let width = self.race_width as u64;

        self.racers.scope(|scope| {
            for lane in 0..width {
                let load = &load;
                let winner = &winner;
                scope.spawn(move |_| {
                    let found = scan(load, difficulty, lane, width, || {
                        winner.get().is_some() || cancel.is_cancelled()
                    });
                    if let Some(solution) = found {
                        if winner.set(solution).is_ok() {
                            trace!(lane, "race won");
                        }
                    }
                });
            }
        });

        winner.into_inner().ok_or(WorkError::Cancelled)
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        // Closing the queue lets every idle worker exit its loop.
        self.jobs.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, queue: JobQueue) {
    loop {
        let next = match queue.lock() {
            Ok(mut rx) => rx.blocking_recv(),
            Err(_) => None,
        };
        let Some(job) = next else {
            debug!(worker = id, "job queue closed, worker exiting");
            return;
        };

        let Job {
            challenge,
            difficulty,
            cancel,
            reply,
        } = job;
        if cancel.is_cancelled() || reply.is_closed() {
            continue;
        }

        let load = work_load(&challenge);
        let found = scan(&load, difficulty, 0, 1, || {
            cancel.is_cancelled() || reply.is_closed()
        });
        match found {
            Some(solution) => {
                let _ = reply.send(solution);
            }
            None => trace!(worker = id, "search abandoned"),
        }
    }
}

/// A queued search in progress.
///
/// Resolves to the solution. Dropping it before completion stops the worker.
pub struct PendingSolution {
    rx: oneshot::Receiver<Solution>,
    cancel: CancelFlag,
}

impl PendingSolution {
    /// Ask the worker to abandon the search.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Future for PendingSolution {
    type Output = Result<Solution, WorkError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| WorkError::Cancelled))
    }
}

impl Drop for PendingSolution {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
