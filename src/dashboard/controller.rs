// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Dashboard controller
//!
//! Owns the operator-facing state (namespace, resource type, filter, last
//! fetched list, selection) and turns operator actions into API calls.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::client::{ApiError, DashboardApi, namespaces_or_empty, resources_or_empty};
use super::filter::ResourceFilter;
use super::poller::{PollSettings, PollSummary, RolloutKey, RolloutPoller};
use super::resource::{ResourceRecord, ResourceType};
use crate::progress::{ProgressHandle, create_progress_handle};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Please select a namespace.")]
    NoNamespace,

    #[error("Please select at least one resource to restart.")]
    NothingSelected,
}

/// How the requests of a restart batch are issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    /// One request after the other
    #[default]
    Sequential,
    /// All requests at once, joined before reporting
    Concurrent,
}

/// Operator-facing dashboard state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub namespace: Option<String>,
    pub resource_type: ResourceType,
    pub filter: ResourceFilter,
    /// Result of the latest search
    pub records: Vec<ResourceRecord>,
    /// Names checked for restart
    pub selection: BTreeSet<String>,
}

/// Outcome of a restart batch
pub struct RestartBatch {
    pub succeeded: Vec<RolloutKey>,
    pub failed: Vec<(RolloutKey, String)>,
    /// Poll session for the accepted restarts, if any can be tracked
    pub poller: Option<RolloutPoller>,
}

impl RestartBatch {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

pub struct Dashboard<A: DashboardApi> {
    api: Arc<A>,
    state: AppState,
    poll_settings: PollSettings,
    restart_mode: RestartMode,
    progress: ProgressHandle,
}

impl<A: DashboardApi> Dashboard<A> {
    pub fn new(api: Arc<A>, poll_settings: PollSettings, restart_mode: RestartMode) -> Self {
        Self {
            api,
            state: AppState::default(),
            poll_settings,
            restart_mode,
            progress: create_progress_handle(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub fn restart_mode(&self) -> RestartMode {
        self.restart_mode
    }

    pub fn set_restart_mode(&mut self, mode: RestartMode) {
        self.restart_mode = mode;
    }

    /// Switch namespace; the previous list and selection no longer apply
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into().trim().to_string();
        self.state.namespace = (!namespace.is_empty()).then_some(namespace);
        self.state.records.clear();
        self.state.selection.clear();
        self.state.filter.names.clear();
    }

    /// Switch resource type; name filter and selection are per type
    pub fn set_resource_type(&mut self, resource_type: ResourceType) {
        self.state.resource_type = resource_type;
        self.state.records.clear();
        self.state.selection.clear();
        self.state.filter.names.clear();
    }

    pub fn set_name_filter<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.filter.names = names
            .into_iter()
            .map(Into::into)
            .filter(|n: &String| !n.is_empty())
            .collect();
    }

    pub fn set_label_query(&mut self, query: impl Into<String>) {
        self.state.filter.label_query = query.into().trim().to_string();
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.state.filter.strict = strict;
    }

    pub async fn load_namespaces(&self) -> Vec<String> {
        namespaces_or_empty(self.api.as_ref()).await
    }

    /// Names of every resource of the current type, for building a name filter
    pub async fn name_candidates(&self) -> Vec<String> {
        let Some(namespace) = &self.state.namespace else {
            return Vec::new();
        };
        resources_or_empty(self.api.as_ref(), namespace, self.state.resource_type)
            .await
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    /// Fetch the current type and apply the filter
    pub async fn search(&mut self) -> Result<&[ResourceRecord], DashboardError> {
        let namespace = self
            .state
            .namespace
            .clone()
            .ok_or(DashboardError::NoNamespace)?;

        let fetched =
            resources_or_empty(self.api.as_ref(), &namespace, self.state.resource_type).await;
        let fetched_count = fetched.len();
        self.state.records = self.state.filter.apply(fetched);

        // Drop selected names that are no longer listed
        let listed: BTreeSet<&str> = self.state.records.iter().map(|r| r.name.as_str()).collect();
        self.state
            .selection
            .retain(|name| listed.contains(name.as_str()));

        info!(
            namespace = %namespace,
            resource_type = %self.state.resource_type,
            fetched = fetched_count,
            matched = self.state.records.len(),
            "Search complete"
        );
        Ok(&self.state.records)
    }

    /// Check listed resources by name; returns the names that are not listed
    pub fn select<I, S>(&mut self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unknown = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if self.state.records.iter().any(|r| r.name == name) {
                self.state.selection.insert(name);
            } else {
                unknown.push(name);
            }
        }
        unknown
    }

    pub fn deselect(&mut self, name: &str) -> bool {
        self.state.selection.remove(name)
    }

    pub fn select_all(&mut self) {
        self.state.selection = self.state.records.iter().map(|r| r.name.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.state.selection.clear();
    }

    /// Restart every selected resource.
    ///
    /// All requests complete before the outcome is reported. Accepted
    /// restarts are tracked with the desired count of their last listing;
    /// the selection is cleared once the batch is done.
    pub async fn restart_selected(&mut self) -> Result<RestartBatch, DashboardError> {
        let namespace = self
            .state
            .namespace
            .clone()
            .ok_or(DashboardError::NoNamespace)?;

        let selected: Vec<(RolloutKey, Option<u32>)> = self
            .state
            .records
            .iter()
            .filter(|r| self.state.selection.contains(&r.name))
            .map(|r| {
                (
                    RolloutKey::new(r.resource_type, r.name.clone()),
                    r.readiness().map(|readiness| readiness.desired),
                )
            })
            .collect();

        if selected.is_empty() {
            return Err(DashboardError::NothingSelected);
        }

        info!(
            namespace = %namespace,
            count = selected.len(),
            mode = ?self.restart_mode,
            "Triggering rollout restart"
        );

        let outcomes = self.issue_restarts(&namespace, &selected).await;

        let mut poller = RolloutPoller::new(namespace.clone(), self.poll_settings)
            .with_progress(Arc::clone(&self.progress));
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for ((key, target), outcome) in selected.into_iter().zip(outcomes) {
            self.progress.restart_issued(&key, outcome.is_ok());
            match outcome {
                Ok(()) => {
                    match target {
                        Some(target) => poller.track(key.clone(), target),
                        None => {
                            warn!(resource = %key, "No readiness counter, not tracking rollout")
                        }
                    }
                    succeeded.push(key);
                }
                Err(e) => {
                    error!(resource = %key, error = %e, "Failed to restart");
                    failed.push((key, e.to_string()));
                }
            }
        }

        self.state.selection.clear();

        let poller = (!poller.state().is_empty()).then_some(poller);
        Ok(RestartBatch {
            succeeded,
            failed,
            poller,
        })
    }

    async fn issue_restarts(
        &self,
        namespace: &str,
        selected: &[(RolloutKey, Option<u32>)],
    ) -> Vec<Result<(), ApiError>> {
        let api = self.api.as_ref();
        match self.restart_mode {
            RestartMode::Sequential => {
                let mut outcomes = Vec::with_capacity(selected.len());
                for (key, _) in selected {
                    outcomes.push(
                        api.trigger_rollout(key.resource_type, namespace, &key.name)
                            .await,
                    );
                }
                outcomes
            }
            RestartMode::Concurrent => {
                join_all(selected.iter().map(|(key, _)| {
                    api.trigger_rollout(key.resource_type, namespace, &key.name)
                }))
                .await
            }
        }
    }

    /// Poll a restart batch to completion, then refresh the listing
    pub async fn watch(&mut self, poller: RolloutPoller) -> PollSummary {
        let summary = poller.run(self.api.as_ref()).await;
        if let Err(e) = self.search().await {
            warn!(error = %e, "Refresh after polling skipped");
        }
        summary
    }
}
