use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::MonitorError;
use super::events::{MonitorStatus, Reporter};
use super::pipeline::{Credentials, Pipeline};
use super::signal::StopSignal;

/// Run flags shared between `start` and a concurrent `stop`.
#[derive(Debug)]
pub struct RunControl {
    running: AtomicBool,
    stopping: AtomicBool,
    continue_loop: AtomicBool,
    // Serializes stop requests against the end-of-run reset.
    transition: Mutex<()>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            continue_loop: AtomicBool::new(true),
            transition: Mutex::new(()),
        }
    }
}

impl RunControl {
    pub fn snapshot(&self) -> RunControlState {
        RunControlState {
            running: self.running.load(Ordering::SeqCst),
            stopping: self.stopping.load(Ordering::SeqCst),
            continue_loop: self.continue_loop.load(Ordering::SeqCst),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flags the running loop to end and raises `signal`. Returns false when
    /// nothing is running or a stop is already pending.
    fn request_stop(&self, signal: &StopSignal) -> bool {
        let _guard = self.lock();
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        if self.stopping.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.continue_loop.store(false, Ordering::SeqCst);
        signal.raise();
        true
    }

    /// Drops a stop raised after the last checkpoint and returns to idle.
    fn finish(&self, signal: &StopSignal) {
        let _guard = self.lock();
        signal.take();
        self.continue_loop.store(true, Ordering::SeqCst);
        self.stopping.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunControlState {
    pub running: bool,
    pub stopping: bool,
    pub continue_loop: bool,
}

/// Restarts the pipeline after transient failures until a stop request or
/// a fatal error.
#[derive(Debug)]
pub struct Supervisor {
    pipeline: AsyncMutex<Pipeline>,
    control: RunControl,
    signal: StopSignal,
    reporter: Reporter,
}

impl Supervisor {
    pub fn new(pipeline: Pipeline) -> Self {
        let signal = pipeline.signal().clone();
        let reporter = pipeline.reporter().clone();
        Self {
            pipeline: AsyncMutex::new(pipeline),
            control: RunControl::default(),
            signal,
            reporter,
        }
    }

    pub fn state(&self) -> RunControlState {
        self.control.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.control.running.load(Ordering::SeqCst)
    }

    /// Supervises runs until the loop ends and returns the error that ended
    /// it. `None` means another call is already supervising.
    pub async fn start(&self, credentials: &Credentials) -> Option<MonitorError> {
        if self
            .control
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("supervisor already running, start ignored");
            return None;
        }
        self.reporter.status(MonitorStatus::Running);
        info!(user = %credentials.username, "supervisor started");

        let mut pipeline = self.pipeline.lock().await;
        let terminal = loop {
            if !self.control.continue_loop.load(Ordering::SeqCst) {
                break MonitorError::Cancelled;
            }
            let err = match pipeline.run(credentials).await {
                Ok(never) => match never {},
                Err(err) => err,
            };
            if err.ends_supervision() {
                break err;
            }

            warn!(error = %err, "pipeline run failed");
            pipeline.release_session().await;
            if self.control.continue_loop.load(Ordering::SeqCst) {
                self.reporter
                    .info("supervisor", "cleanup complete, restarting");
            }
        };
        drop(pipeline);

        self.control.finish(&self.signal);
        self.reporter.unlock_controls();
        self.reporter.status(MonitorStatus::Stopped);
        info!(kind = ?terminal.kind(), error = %terminal, "supervisor stopped");
        Some(terminal)
    }

    /// Requests a stop. Returns whether this call sent it.
    pub fn stop(&self) -> bool {
        if !self.control.request_stop(&self.signal) {
            return false;
        }
        self.reporter.info("supervisor", "stop signal sent");
        true
    }

    pub fn spawn(self: Arc<Self>, credentials: Credentials) -> JoinHandle<Option<MonitorError>> {
        tokio::spawn(async move { self.start(&credentials).await })
    }
}
