// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Rollout completion polling
//!
//! After a restart batch the poller re-fetches the restarted resources on a
//! fixed interval and compares their ready counter with the desired count
//! captured before the restart. Each tracked resource moves from
//! `Restarting` to either `Ready` (dropped from tracking) or `Error` (kept
//! until the session ends). The session ends when nothing is tracked, when
//! the attempt budget is spent, when the time budget has elapsed, or when it
//! is cancelled through its [`PollHandle`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::client::DashboardApi;
use super::resource::{POD_RUNNING, ResourceRecord, ResourceType};
use crate::progress::ProgressHandle;

/// Delay between two poll ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Wall-clock budget of one poll session
pub const DEFAULT_MAX_POLL_DURATION: Duration = Duration::from_secs(120);

/// Tick budget of one poll session
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 24;

/// Identity of a restarted resource within a namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RolloutKey {
    pub resource_type: ResourceType,
    pub name: String,
}

impl RolloutKey {
    pub fn new(resource_type: ResourceType, name: impl Into<String>) -> Self {
        Self {
            resource_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for RolloutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.name)
    }
}

/// Per-resource rollout state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutState {
    Restarting,
    Ready,
    Error,
}

impl RolloutState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RolloutState::Restarting)
    }
}

impl fmt::Display for RolloutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RolloutState::Restarting => "restarting",
            RolloutState::Ready => "ready",
            RolloutState::Error => "error",
        })
    }
}

/// Classify one observation of a restarted resource.
///
/// A resource missing from the list is still restarting; pods deleted by a
/// restart may come back under a new name.
pub fn evaluate_rollout(record: Option<&ResourceRecord>, target_ready: u32) -> RolloutState {
    let Some(record) = record else {
        return RolloutState::Restarting;
    };

    if record.resource_type == ResourceType::Pod && record.has_error_status() {
        return RolloutState::Error;
    }

    // A decorated counter such as "3/3 (Updating...)" is still rolling out
    let reached_target = record
        .readiness()
        .is_some_and(|r| r.ready == target_ready)
        && record.readiness_note().is_none();

    let ready = match record.resource_type {
        ResourceType::Pod => reached_target && record.status.as_deref() == Some(POD_RUNNING),
        ResourceType::Deployment | ResourceType::StatefulSet => reached_target,
    };

    if ready {
        RolloutState::Ready
    } else {
        RolloutState::Restarting
    }
}

/// A restart still being watched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRollout {
    /// Desired count captured before the restart
    pub target_ready: u32,
    pub state: RolloutState,
    /// Ready counter of the latest observation
    pub observed: Option<String>,
}

/// Outstanding restarts of one poll session
#[derive(Debug, Clone, Default)]
pub struct PollState {
    entries: BTreeMap<RolloutKey, TrackedRollout>,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, key: RolloutKey, target_ready: u32) {
        self.entries.insert(
            key,
            TrackedRollout {
                target_ready,
                state: RolloutState::Restarting,
                observed: None,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RolloutKey, &TrackedRollout)> {
        self.entries.iter()
    }

    /// Distinct resource types with at least one tracked entry
    pub fn resource_types(&self) -> BTreeSet<ResourceType> {
        self.entries.keys().map(|k| k.resource_type).collect()
    }

    /// Keys of tracked entries in the given state
    pub fn keys_in(&self, state: RolloutState) -> Vec<RolloutKey> {
        self.entries
            .iter()
            .filter(|(_, t)| t.state == state)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Apply a fresh list of one resource type.
    ///
    /// Returns the entries that changed state. Entries that became ready are
    /// removed; errored entries stay and are not re-evaluated.
    pub fn observe(
        &mut self,
        resource_type: ResourceType,
        records: &[ResourceRecord],
    ) -> Vec<(RolloutKey, RolloutState)> {
        let by_name: BTreeMap<&str, &ResourceRecord> =
            records.iter().map(|r| (r.name.as_str(), r)).collect();

        let mut transitions = Vec::new();
        for (key, tracked) in self.entries.iter_mut() {
            if key.resource_type != resource_type || tracked.state.is_terminal() {
                continue;
            }
            let record = by_name.get(key.name.as_str()).copied();
            tracked.observed = record.map(|r| r.ready.clone());

            let state = evaluate_rollout(record, tracked.target_ready);
            if state != tracked.state {
                tracked.state = state;
                transitions.push((key.clone(), state));
            }
        }

        self.entries
            .retain(|_, tracked| tracked.state != RolloutState::Ready);
        transitions
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Interval and budgets of a poll session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_duration: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_duration: DEFAULT_MAX_POLL_DURATION,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Time source for the session budget
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock, which honours `tokio::time::pause`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Why a poll session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    AllReady,
    AttemptsExhausted,
    TimedOut,
    Cancelled,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompletionReason::AllReady => "all resources ready",
            CompletionReason::AttemptsExhausted => "attempt budget exhausted",
            CompletionReason::TimedOut => "time budget exhausted",
            CompletionReason::Cancelled => "cancelled",
        })
    }
}

/// Completion notice of a poll session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub reason: CompletionReason,
    pub ticks: u32,
    pub elapsed: Duration,
    pub ready: Vec<RolloutKey>,
    pub errored: Vec<RolloutKey>,
    /// Still restarting when the session ended
    pub pending: Vec<RolloutKey>,
}

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub attempt: u32,
    pub transitions: Vec<(RolloutKey, RolloutState)>,
    pub fetch_failures: usize,
}

/// Cancels a running poll session
#[derive(Debug, Clone, Default)]
pub struct PollHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`PollHandle::cancel`] has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// One poll session over a namespace
pub struct RolloutPoller<C: Clock = TokioClock> {
    namespace: String,
    settings: PollSettings,
    clock: C,
    state: PollState,
    started_at: Instant,
    attempts: u32,
    ready: Vec<RolloutKey>,
    handle: PollHandle,
    progress: Option<ProgressHandle>,
}

impl RolloutPoller<TokioClock> {
    pub fn new(namespace: impl Into<String>, settings: PollSettings) -> Self {
        Self::with_clock(namespace, settings, TokioClock)
    }
}

impl<C: Clock> RolloutPoller<C> {
    pub fn with_clock(namespace: impl Into<String>, settings: PollSettings, clock: C) -> Self {
        let started_at = clock.now();
        Self {
            namespace: namespace.into(),
            settings,
            clock,
            state: PollState::new(),
            started_at,
            attempts: 0,
            ready: Vec::new(),
            handle: PollHandle::default(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn track(&mut self, key: RolloutKey, target_ready: u32) {
        self.state.track(key, target_ready);
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn handle(&self) -> PollHandle {
        self.handle.clone()
    }

    /// Run one fetch-and-compare pass
    pub async fn tick<A: DashboardApi + ?Sized>(&mut self, api: &A) -> TickReport {
        if self.handle.is_cancelled() {
            return TickReport {
                attempt: self.attempts,
                ..Default::default()
            };
        }

        self.attempts += 1;
        let mut report = TickReport {
            attempt: self.attempts,
            ..Default::default()
        };
        if let Some(progress) = &self.progress {
            progress.tick_started(self.attempts, self.state.len());
        }
        debug!(attempt = self.attempts, tracked = self.state.len(), "Poll tick");

        for resource_type in self.state.resource_types() {
            if self.handle.is_cancelled() {
                break;
            }

            let records = match api.fetch_resources(&self.namespace, resource_type).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        namespace = %self.namespace,
                        resource_type = %resource_type,
                        error = %e,
                        "Polling error"
                    );
                    if let Some(progress) = &self.progress {
                        progress.fetch_failed(resource_type.as_str(), &e.to_string());
                    }
                    report.fetch_failures += 1;
                    continue;
                }
            };

            for (key, state) in self.state.observe(resource_type, &records) {
                let observed = records
                    .iter()
                    .find(|r| r.name == key.name)
                    .map(|r| r.ready.as_str());
                info!(resource = %key, state = %state, ready = ?observed, "Rollout state changed");
                if let Some(progress) = &self.progress {
                    progress.state_changed(&key, state, observed);
                }
                if state == RolloutState::Ready {
                    self.ready.push(key.clone());
                }
                report.transitions.push((key, state));
            }
        }

        report
    }

    /// Why the session should end now, if it should
    pub fn completion(&self) -> Option<CompletionReason> {
        if self.handle.is_cancelled() {
            Some(CompletionReason::Cancelled)
        } else if self.state.is_empty() {
            Some(CompletionReason::AllReady)
        } else if self.attempts >= self.settings.max_attempts {
            Some(CompletionReason::AttemptsExhausted)
        } else if self.clock.now().duration_since(self.started_at) >= self.settings.max_duration {
            Some(CompletionReason::TimedOut)
        } else {
            None
        }
    }

    /// End the session: clear tracking and produce the completion notice
    pub fn finish(&mut self, reason: CompletionReason) -> PollSummary {
        let summary = PollSummary {
            reason,
            ticks: self.attempts,
            elapsed: self.clock.now().duration_since(self.started_at),
            ready: std::mem::take(&mut self.ready),
            errored: self.state.keys_in(RolloutState::Error),
            pending: self.state.keys_in(RolloutState::Restarting),
        };
        self.state.clear();

        info!(
            namespace = %self.namespace,
            reason = %reason,
            ticks = summary.ticks,
            ready = summary.ready.len(),
            errored = summary.errored.len(),
            pending = summary.pending.len(),
            "Rollout polling finished"
        );
        if let Some(progress) = &self.progress {
            progress.completed(
                reason,
                summary.ready.len(),
                summary.errored.len(),
                summary.pending.len(),
            );
        }
        summary
    }

    /// Drive ticks on the configured interval until the session ends
    pub async fn run<A: DashboardApi + ?Sized>(mut self, api: &A) -> PollSummary {
        let handle = self.handle.clone();
        if let Some(progress) = &self.progress {
            progress.start_polling(self.settings.max_attempts);
        }

        let start = Instant::now() + self.settings.interval;
        let mut interval = tokio::time::interval_at(start, self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(reason) = self.completion() {
                return self.finish(reason);
            }

            tokio::select! {
                _ = interval.tick() => {}
                _ = handle.cancelled() => continue,
            }

            self.tick(api).await;
        }
    }
}
