// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Workload resource model as served by the dashboard API
//!
//! Every list endpoint returns a flat JSON object per resource. The shape is
//! shared between deployments, stateful sets and pods, with a few
//! type-specific fields (`up_to_date` for deployments, `status`/`restarts`
//! for pods).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Pod status reasons that mean the restarted pod will not become ready
/// without intervention
pub const POD_ERROR_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    "Error",
    "ImagePullBackOff",
    "ErrImagePull",
    "CreateContainerConfigError",
    "CreateContainerError",
    "OOMKilled",
    "Failed",
    "InvalidImageName",
    "RunContainerError",
];

/// Pod status text reported for a healthy pod
pub const POD_RUNNING: &str = "Running";

/// Kind of workload the dashboard can list and restart
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ResourceType {
    #[default]
    #[serde(alias = "deployment")]
    Deployment,
    #[serde(alias = "statefulset")]
    StatefulSet,
    #[serde(alias = "pod")]
    Pod,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Deployment,
        ResourceType::StatefulSet,
        ResourceType::Pod,
    ];

    /// Plural path segment used by the API (`/api/v1/deployments/...`)
    pub fn api_path(&self) -> &'static str {
        match self {
            ResourceType::Deployment => "deployments",
            ResourceType::StatefulSet => "statefulsets",
            ResourceType::Pod => "pods",
        }
    }

    /// Lowercase singular name, as typed on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Deployment => "deployment",
            ResourceType::StatefulSet => "statefulset",
            ResourceType::Pod => "pod",
        }
    }

    /// Display name, as returned in the `resourceType` field
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceType::Deployment => "Deployment",
            ResourceType::StatefulSet => "StatefulSet",
            ResourceType::Pod => "Pod",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deployment" | "deployments" | "deploy" => Ok(ResourceType::Deployment),
            "statefulset" | "statefulsets" | "sts" => Ok(ResourceType::StatefulSet),
            "pod" | "pods" | "po" => Ok(ResourceType::Pod),
            other => Err(format!(
                "unknown resource type '{}' (expected deployment, statefulset or pod)",
                other
            )),
        }
    }
}

/// Parsed "ready/desired" counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub ready: u32,
    pub desired: u32,
}

impl Readiness {
    /// Parse the leading `X/Y` token of a readiness string.
    ///
    /// The API may decorate the counter, e.g. `"2/3 (Not Ready)"`; anything
    /// after the first whitespace is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let token = s.split_whitespace().next()?;
        let (ready, desired) = token.split_once('/')?;
        Some(Self {
            ready: ready.trim().parse().ok()?,
            desired: desired.trim().parse().ok()?,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.ready == self.desired
    }
}

/// One resource as returned by a list call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(rename = "resourceType", default)]
    pub resource_type: ResourceType,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub ready: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restarts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_to_date: Option<String>,
    #[serde(default)]
    pub age: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ResourceRecord {
    pub fn readiness(&self) -> Option<Readiness> {
        Readiness::parse(&self.ready)
    }

    /// Text trailing the counter, e.g. `(Updating...)` or `(Not Ready)`
    pub fn readiness_note(&self) -> Option<&str> {
        let (_, note) = self.ready.trim().split_once(char::is_whitespace)?;
        let note = note.trim();
        (!note.is_empty()).then_some(note)
    }

    /// Counter is complete and carries no rollout note
    pub fn is_settled(&self) -> bool {
        self.readiness().is_some_and(|r| r.is_complete()) && self.readiness_note().is_none()
    }

    /// Labels as `key:value` pairs joined by a single space, in key order
    pub fn joined_labels(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when the pod status text carries one of the known error reasons
    pub fn has_error_status(&self) -> bool {
        self.status.as_deref().is_some_and(|status| {
            status
                .split_whitespace()
                .any(|reason| POD_ERROR_REASONS.contains(&reason))
        })
    }

    /// Whether the resource is still converging (drives row highlighting)
    pub fn is_updating(&self) -> bool {
        let settled = self.is_settled();
        match self.resource_type {
            ResourceType::Deployment | ResourceType::StatefulSet => !settled,
            ResourceType::Pod => self.status.as_deref() != Some(POD_RUNNING) || !settled,
        }
    }
}
