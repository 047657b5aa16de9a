//! # Worker
//!
//! A single dedicated OS thread that pops jobs off a [`TaskChannel`] and runs
//! them one at a time, strictly in push order. Any number of threads may hold a
//! [`TaskSender`] and submit work; only the worker thread ever runs it.
//!
//! The lifecycle is one-shot: `start` once, `stop` once. Stopping closes the
//! channel to new submissions, lets the jobs already queued run, then joins the
//! thread.
//!
//! ```rust
//! use iot_hub::execution::{ChannelCapacity, Worker};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let worker = Worker::new("doc-worker", ChannelCapacity::Unbounded);
//! worker.start().unwrap();
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let sender = worker.sender();
//! for _ in 0..10 {
//!     let counter = Arc::clone(&counter);
//!     sender.submit(move || { counter.fetch_add(1, Ordering::SeqCst); }).unwrap();
//! }
//!
//! sender.sync(Duration::from_secs(5)).unwrap();
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! worker.stop().unwrap();
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::channel::{ChannelCapacity, ChannelStats, PushError, TaskChannel};
use crate::config::WorkerConfig;

/// A unit of work executed on the worker thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker lifecycle and submission errors
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker {name} is already started")]
    AlreadyStarted { name: String },

    #[error("Worker {name} has been stopped and cannot be restarted")]
    AlreadyStopped { name: String },

    #[error("Worker {name} is not running")]
    NotRunning { name: String },

    #[error("Task channel of worker {name} is closed")]
    ChannelClosed { name: String },

    #[error("Task channel of worker {name} is full (capacity {capacity})")]
    ChannelFull { name: String, capacity: usize },

    #[error("Failed to spawn worker thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker thread {name} terminated abnormally")]
    JoinFailed { name: String },

    #[error("Worker {name} did not drain within {timeout_ms}ms")]
    SyncTimeout { name: String, timeout_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct Shared {
    name: String,
    channel: TaskChannel<Job>,
    running: AtomicBool,
}

/// Cloneable handle for submitting jobs to a [`Worker`]
#[derive(Clone)]
pub struct TaskSender {
    shared: Arc<Shared>,
}

impl TaskSender {
    /// Queue a closure for execution on the worker thread
    pub fn submit<F>(&self, job: F) -> Result<(), WorkerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_job(Box::new(job))
    }

    pub fn submit_job(&self, job: Job) -> Result<(), WorkerError> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(WorkerError::NotRunning {
                name: self.shared.name.clone(),
            });
        }

        self.shared.channel.push(job).map_err(|e| match e {
            PushError::Closed(_) => WorkerError::ChannelClosed {
                name: self.shared.name.clone(),
            },
            PushError::Full { capacity, .. } => WorkerError::ChannelFull {
                name: self.shared.name.clone(),
                capacity,
            },
        })
    }

    /// Wait until every job submitted before this call has run
    pub fn sync(&self, timeout: Duration) -> Result<(), WorkerError> {
        let (done_tx, done_rx) = crossbeam::channel::bounded::<()>(1);
        self.submit(move || {
            let _ = done_tx.send(());
        })?;

        done_rx
            .recv_timeout(timeout)
            .map_err(|_| WorkerError::SyncTimeout {
                name: self.shared.name.clone(),
                timeout_ms: timeout.as_millis() as u64,
            })
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn worker_name(&self) -> &str {
        &self.shared.name
    }
}

/// Snapshot of worker state
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub name: String,
    pub running: bool,
    pub channel: ChannelStats,
}

/// Dedicated single-threaded executor
pub struct Worker {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    pub fn new(name: impl Into<String>, capacity: ChannelCapacity) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                channel: TaskChannel::with_capacity(capacity),
                running: AtomicBool::new(false),
            }),
            lifecycle: Mutex::new(Lifecycle::Idle),
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.name.clone(), config.channel_capacity())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Handle for submitting jobs
    pub fn sender(&self) -> TaskSender {
        TaskSender {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Spawn the worker thread
    pub fn start(&self) -> Result<(), WorkerError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running => {
                return Err(WorkerError::AlreadyStarted {
                    name: self.shared.name.clone(),
                })
            }
            Lifecycle::Stopped => {
                return Err(WorkerError::AlreadyStopped {
                    name: self.shared.name.clone(),
                })
            }
            Lifecycle::Idle => {}
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run_loop(&shared))
            .map_err(|source| WorkerError::Spawn {
                name: self.shared.name.clone(),
                source,
            })?;

        self.shared.running.store(true, Ordering::Release);
        *self.handle.lock() = Some(handle);
        *lifecycle = Lifecycle::Running;

        info!(worker = %self.shared.name, "Worker started");
        Ok(())
    }

    /// Close the channel, let queued jobs finish and join the thread.
    ///
    /// Calling `stop` again, or on a worker that never started, is a no-op.
    pub fn stop(&self) -> Result<(), WorkerError> {
        let mut lifecycle = self.lifecycle.lock();
        let previous = *lifecycle;
        *lifecycle = Lifecycle::Stopped;

        self.shared.running.store(false, Ordering::Release);
        self.shared.channel.close();

        if previous != Lifecycle::Running {
            return Ok(());
        }

        let Some(handle) = self.handle.lock().take() else {
            return Ok(());
        };

        if handle.thread().id() == thread::current().id() {
            warn!(
                worker = %self.shared.name,
                "Worker stopped from its own thread; skipping join"
            );
            return Ok(());
        }

        handle.join().map_err(|_| WorkerError::JoinFailed {
            name: self.shared.name.clone(),
        })?;

        info!(worker = %self.shared.name, "Worker stopped");
        Ok(())
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            name: self.shared.name.clone(),
            running: self.is_running(),
            channel: self.shared.channel.stats(),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(worker = %self.shared.name, error = %e, "Failed to stop worker on drop");
        }
    }
}

fn run_loop(shared: &Shared) {
    debug!(worker = %shared.name, "Worker loop running");

    while let Some(job) = shared.channel.pop() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!(
                worker = %shared.name,
                panic = %panic_message(payload.as_ref()),
                "Task panicked; worker continues with the next task"
            );
        }
    }

    debug!(worker = %shared.name, "Worker loop received shutdown sentinel");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
