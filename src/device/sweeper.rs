//! Periodic liveness sweep.
//!
//! Expiry is normally lazy: a device only turns offline when somebody asks
//! `is_online`. The sweeper adds a timer thread that, on every tick, submits a
//! `sweep_expired` job to the router worker, so the demotion itself still runs
//! on the worker thread alongside every other mutation.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::DeviceRegistry;
use crate::execution::{TaskSender, WorkerError};

pub struct LivenessSweeper {
    shutdown: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl LivenessSweeper {
    /// Spawn the timer thread
    pub fn start(
        registry: Arc<dyn DeviceRegistry>,
        sender: TaskSender,
        interval: Duration,
    ) -> Result<Self, WorkerError> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let name = format!("{}-sweeper", sender.worker_name());

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let registry = Arc::clone(&registry);
                        let submitted = sender.submit(move || {
                            registry.sweep_expired();
                        });
                        if let Err(e) = submitted {
                            warn!(error = %e, "Liveness sweep not submitted; stopping sweeper");
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|source| WorkerError::Spawn { name, source })?;

        info!(interval_ms = interval.as_millis() as u64, "Liveness sweeper started");
        Ok(Self {
            shutdown: Mutex::new(Some(shutdown_tx)),
            handle: Mutex::new(Some(handle)),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop the timer thread. Idempotent.
    pub fn stop(&self) {
        // Dropping the sender disconnects the channel and wakes the thread
        drop(self.shutdown.lock().take());

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Liveness sweeper thread panicked");
            } else {
                debug!("Liveness sweeper stopped");
            }
        }
    }
}

impl Drop for LivenessSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DeviceStatus;
    use crate::device::{DefaultDeviceRegistry, ManualClock};
    use crate::execution::{ChannelCapacity, Worker};

    #[test]
    fn test_sweeper_demotes_through_worker() {
        let clock = Arc::new(ManualClock::new());
        let registry: Arc<dyn DeviceRegistry> = Arc::new(DefaultDeviceRegistry::with_clock(
            2,
            Duration::from_secs(30),
            clock.clone(),
        ));
        registry.register("stale");
        clock.advance(Duration::from_secs(60));

        let worker = Worker::new("sweeper-test", ChannelCapacity::Unbounded);
        worker.start().unwrap();

        let sweeper = LivenessSweeper::start(
            Arc::clone(&registry),
            worker.sender(),
            Duration::from_millis(10),
        )
        .unwrap();

        let mut demoted = false;
        for _ in 0..200 {
            if registry.get_info("stale").unwrap().status == DeviceStatus::Offline {
                demoted = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        sweeper.stop();
        sweeper.stop();
        worker.stop().unwrap();
        assert!(demoted);
    }
}
