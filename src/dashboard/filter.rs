// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Name and label filtering of fetched resource lists

use std::collections::BTreeSet;

use super::condition::evaluate;
use super::resource::ResourceRecord;

/// Compound predicate applied to a resource list after each fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    /// Names to keep; empty keeps every name
    pub names: BTreeSet<String>,
    /// Label query, see [`evaluate`]
    pub label_query: String,
    /// Whole-word label matching
    pub strict: bool,
}

impl ResourceFilter {
    pub fn matches(&self, record: &ResourceRecord) -> bool {
        let matches_name = self.names.is_empty() || self.names.contains(&record.name);
        matches_name && evaluate(&record.joined_labels(), &self.label_query, self.strict)
    }

    /// Keep the records passing both gates, preserving input order
    pub fn apply(&self, records: Vec<ResourceRecord>) -> Vec<ResourceRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}
