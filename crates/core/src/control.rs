//! Control signalling and worker accounting
//!
//! Every plugin task owns a control channel the coordinator uses to stop,
//! roll or reconfigure it, and a worker token the coordinator waits on
//! during shutdown. Worker completion is tied to token drop so "mark as
//! done" happens exactly once on every exit path.

use tokio::sync::mpsc;
use tokio_util::task::{task_tracker::TaskTrackerToken, TaskTracker};

use crate::config::PluginConfig;

/// Queue depth of per-plugin control channels.
pub const CONTROL_CHANNEL_SIZE: usize = 16;

/// Signals delivered to plugin control loops.
#[derive(Debug, Clone)]
pub enum ControlSignal {
    /// Drain and shut down.
    Stop,
    /// Reopen or restart the plugin's backing resource (files, handles).
    Roll,
    /// Re-run the plugin's `configure` with a fresh node.
    Reconfigure(PluginConfig),
}

/// Create a control channel for one plugin.
pub fn control_channel() -> (mpsc::Sender<ControlSignal>, mpsc::Receiver<ControlSignal>) {
    mpsc::channel(CONTROL_CHANNEL_SIZE)
}

/// Completion handle shared by a set of plugin workers.
///
/// The coordinator registers one `Worker` per task it spawns and later
/// waits for all of them to finish.
#[derive(Debug, Clone, Default)]
pub struct WorkerGroup {
    tracker: TaskTracker,
}

impl WorkerGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Register one worker. The returned token must travel with the task
    /// doing the work; dropping it marks the worker done.
    pub fn register(&self) -> Worker {
        Worker {
            _token: self.tracker.token(),
        }
    }

    /// Wait until every registered worker has marked itself done.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Number of workers still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    /// Whether no workers are currently registered.
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}

/// RAII completion token for a single worker.
///
/// Held by the task performing the plugin's work; the owning group's
/// `wait` completes once all tokens are dropped.
#[derive(Debug)]
pub struct Worker {
    _token: TaskTrackerToken,
}

impl Worker {
    /// Explicitly mark this worker as done.
    ///
    /// Dropping the token has the same effect; this form documents intent
    /// at the end of a worker's run loop.
    pub fn mark_as_done(self) {}
}
