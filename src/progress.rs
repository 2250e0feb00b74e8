// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Progress reporting for restart batches and rollout polling
//!
//! The controller and the poller publish events here; the CLI subscribes and
//! renders them on a spinner.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::broadcast;

use crate::dashboard::{CompletionReason, RolloutKey, RolloutState};

/// Create a spinner with consistent styling
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Progress update message
#[derive(Clone, Debug)]
pub enum ProgressUpdate {
    // === Restart batch ===
    /// A rollout restart request finished
    RestartIssued { resource: RolloutKey, accepted: bool },

    // === Polling ===
    /// A poll tick started
    TickStarted {
        attempt: u32,
        max_attempts: u32,
        tracked: usize,
    },
    /// A tracked resource left the restarting state
    StateChanged {
        resource: RolloutKey,
        state: RolloutState,
        ready: Option<String>,
    },
    /// Re-fetching a resource type failed during a tick
    FetchFailed { resource_type: String, error: String },
    /// The poll session ended
    Completed {
        reason: CompletionReason,
        ready: usize,
        errored: usize,
        pending: usize,
    },
}

/// Fan-out of progress events
pub struct ProgressReporter {
    sender: broadcast::Sender<ProgressUpdate>,
    /// Ticks run in the current poll session
    ticks_done: AtomicU32,
    /// Tick budget of the current poll session
    ticks_total: AtomicU32,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self {
            sender,
            ticks_done: AtomicU32::new(0),
            ticks_total: AtomicU32::new(0),
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Report a finished restart request
    pub fn restart_issued(&self, resource: &RolloutKey, accepted: bool) {
        let _ = self.sender.send(ProgressUpdate::RestartIssued {
            resource: resource.clone(),
            accepted,
        });
    }

    /// Reset the tick counters for a new poll session
    pub fn start_polling(&self, max_attempts: u32) {
        self.ticks_done.store(0, Ordering::SeqCst);
        self.ticks_total.store(max_attempts, Ordering::SeqCst);
    }

    /// Report a tick start
    pub fn tick_started(&self, attempt: u32, tracked: usize) {
        self.ticks_done.store(attempt, Ordering::SeqCst);
        let _ = self.sender.send(ProgressUpdate::TickStarted {
            attempt,
            max_attempts: self.ticks_total.load(Ordering::SeqCst),
            tracked,
        });
    }

    /// Report a state transition of a tracked resource
    pub fn state_changed(&self, resource: &RolloutKey, state: RolloutState, ready: Option<&str>) {
        let _ = self.sender.send(ProgressUpdate::StateChanged {
            resource: resource.clone(),
            state,
            ready: ready.map(String::from),
        });
    }

    /// Report a failed fetch inside a tick
    pub fn fetch_failed(&self, resource_type: &str, error: &str) {
        let _ = self.sender.send(ProgressUpdate::FetchFailed {
            resource_type: resource_type.to_string(),
            error: error.to_string(),
        });
    }

    /// Report the end of a poll session
    pub fn completed(
        &self,
        reason: CompletionReason,
        ready: usize,
        errored: usize,
        pending: usize,
    ) {
        let _ = self.sender.send(ProgressUpdate::Completed {
            reason,
            ready,
            errored,
            pending,
        });
    }

    /// Get current progress (ticks done/tick budget)
    pub fn progress(&self) -> (u32, u32) {
        (
            self.ticks_done.load(Ordering::SeqCst),
            self.ticks_total.load(Ordering::SeqCst),
        )
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to progress reporter
pub type ProgressHandle = Arc<ProgressReporter>;

/// Create a new progress reporter handle
pub fn create_progress_handle() -> ProgressHandle {
    Arc::new(ProgressReporter::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::ResourceType;

    fn key(name: &str) -> RolloutKey {
        RolloutKey::new(ResourceType::Deployment, name)
    }

    #[test]
    fn test_progress_reporter_new() {
        let reporter = ProgressReporter::new();
        assert_eq!(reporter.progress(), (0, 0));
    }

    #[test]
    fn test_progress_reporter_default() {
        let reporter = ProgressReporter::default();
        assert_eq!(reporter.progress(), (0, 0));
    }

    #[test]
    fn test_tick_counters() {
        let reporter = ProgressReporter::new();
        reporter.start_polling(24);
        assert_eq!(reporter.progress(), (0, 24));

        reporter.tick_started(1, 3);
        reporter.tick_started(2, 2);
        assert_eq!(reporter.progress(), (2, 24));

        // A new session resets
        reporter.start_polling(5);
        assert_eq!(reporter.progress(), (0, 5));
    }

    #[test]
    fn test_subscribe_receives_updates() {
        let reporter = ProgressReporter::new();
        let mut receiver = reporter.subscribe();

        reporter.start_polling(10);
        reporter.tick_started(1, 2);

        match receiver.try_recv().unwrap() {
            ProgressUpdate::TickStarted {
                attempt,
                max_attempts,
                tracked,
            } => {
                assert_eq!(attempt, 1);
                assert_eq!(max_attempts, 10);
                assert_eq!(tracked, 2);
            }
            other => panic!("Expected TickStarted update, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_updates() {
        let reporter = ProgressReporter::new();
        let mut receiver = reporter.subscribe();

        reporter.restart_issued(&key("api"), true);
        reporter.tick_started(1, 1);
        reporter.fetch_failed("deployment", "connection refused");
        reporter.state_changed(&key("api"), RolloutState::Ready, Some("3/3"));
        reporter.completed(CompletionReason::AllReady, 1, 0, 0);

        let updates: Vec<_> = std::iter::from_fn(|| receiver.try_recv().ok()).collect();
        assert_eq!(updates.len(), 5);

        assert!(matches!(
            updates[0],
            ProgressUpdate::RestartIssued { accepted: true, .. }
        ));
        assert!(matches!(updates[1], ProgressUpdate::TickStarted { .. }));
        assert!(matches!(updates[2], ProgressUpdate::FetchFailed { .. }));
        assert!(matches!(
            updates[3],
            ProgressUpdate::StateChanged {
                state: RolloutState::Ready,
                ..
            }
        ));
        assert!(matches!(
            updates[4],
            ProgressUpdate::Completed {
                reason: CompletionReason::AllReady,
                ..
            }
        ));
    }

    #[test]
    fn test_send_without_subscribers_is_harmless() {
        let handle = create_progress_handle();
        handle.restart_issued(&key("api"), false);
        handle.completed(CompletionReason::Cancelled, 0, 0, 1);
        assert_eq!(handle.progress(), (0, 0));
    }
}
