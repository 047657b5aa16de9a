//! # Task Channel
//!
//! FIFO queue shared by many producers and a single consumer. Every push takes
//! the channel lock, so the queue order is exactly the order in which pushes
//! completed. Closing the channel appends a shutdown sentinel behind whatever
//! is already queued: the consumer drains those items first, then `pop`
//! returns `None` for good.
//!
//! The channel is unbounded unless built with [`ChannelCapacity::Bounded`], in
//! which case the [`OverflowPolicy`] decides what a push into a full queue does.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// What a push does when a bounded channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until the consumer makes room
    #[default]
    Block,
    /// Evict the oldest queued task to make room
    DropOldest,
    /// Refuse the new task
    Reject,
}

/// Capacity of a [`TaskChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelCapacity {
    #[default]
    Unbounded,
    Bounded {
        capacity: usize,
        policy: OverflowPolicy,
    },
}

impl ChannelCapacity {
    /// Bounded capacity (at least one slot)
    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        ChannelCapacity::Bounded {
            capacity: capacity.max(1),
            policy,
        }
    }
}

/// Push failures. The rejected task is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PushError<T> {
    #[error("task channel is closed")]
    Closed(T),

    #[error("task channel is full (capacity {capacity})")]
    Full { task: T, capacity: usize },
}

impl<T> PushError<T> {
    /// Recover the task that could not be queued
    pub fn into_inner(self) -> T {
        match self {
            PushError::Closed(task) => task,
            PushError::Full { task, .. } => task,
        }
    }
}

/// Counters describing channel traffic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub depth: usize,
    pub closed: bool,
}

enum Slot<T> {
    Item(T),
    Shutdown,
}

struct State<T> {
    queue: VecDeque<Slot<T>>,
    closed: bool,
}

impl<T> State<T> {
    fn depth(&self) -> usize {
        self.queue
            .iter()
            .filter(|slot| matches!(slot, Slot::Item(_)))
            .count()
    }
}

/// Multi-producer, single-consumer FIFO with a shutdown sentinel
pub struct TaskChannel<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: ChannelCapacity,
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

impl<T> TaskChannel<T> {
    /// Create an unbounded channel
    pub fn unbounded() -> Self {
        Self::with_capacity(ChannelCapacity::Unbounded)
    }

    pub fn with_capacity(capacity: ChannelCapacity) -> Self {
        let capacity = match capacity {
            ChannelCapacity::Bounded { capacity, policy } => {
                ChannelCapacity::bounded(capacity, policy)
            }
            unbounded => unbounded,
        };

        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> ChannelCapacity {
        self.capacity
    }

    /// Append a task and wake the consumer
    pub fn push(&self, task: T) -> Result<(), PushError<T>> {
        let mut evicted = None;
        let mut state = self.state.lock();

        if state.closed {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(PushError::Closed(task));
        }

        if let ChannelCapacity::Bounded { capacity, policy } = self.capacity {
            while state.queue.len() >= capacity {
                match policy {
                    OverflowPolicy::Reject => {
                        self.rejected.fetch_add(1, Ordering::Relaxed);
                        return Err(PushError::Full { task, capacity });
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(Slot::Item(oldest)) = state.queue.pop_front() {
                            self.dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(capacity, "Task channel full, dropping oldest queued task");
                            evicted = Some(oldest);
                        }
                    }
                    OverflowPolicy::Block => {
                        self.not_full.wait(&mut state);
                        if state.closed {
                            self.rejected.fetch_add(1, Ordering::Relaxed);
                            return Err(PushError::Closed(task));
                        }
                    }
                }
            }
        }

        state.queue.push_back(Slot::Item(task));
        self.pushed.fetch_add(1, Ordering::Relaxed);
        drop(state);
        drop(evicted);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until a task is available. Returns `None` once the shutdown
    /// sentinel is reached.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            match state.queue.pop_front() {
                Some(Slot::Item(task)) => {
                    drop(state);
                    self.on_popped();
                    return Some(task);
                }
                Some(Slot::Shutdown) => {
                    // Leave the sentinel in place so every later pop sees it too
                    state.queue.push_front(Slot::Shutdown);
                    return None;
                }
                None => self.not_empty.wait(&mut state),
            }
        }
    }

    /// Non-blocking pop. `None` when the queue is empty or shut down.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        match state.queue.pop_front() {
            Some(Slot::Item(task)) => {
                drop(state);
                self.on_popped();
                Some(task)
            }
            Some(Slot::Shutdown) => {
                state.queue.push_front(Slot::Shutdown);
                None
            }
            None => None,
        }
    }

    fn on_popped(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
        self.not_full.notify_one();
    }

    /// Refuse further pushes and queue the shutdown sentinel.
    ///
    /// Returns false if the channel was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.queue.push_back(Slot::Shutdown);
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.state.lock().depth()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ChannelStats {
        let state = self.state.lock();
        ChannelStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            depth: state.depth(),
            closed: state.closed,
        }
    }
}

impl<T> Default for TaskChannel<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}
