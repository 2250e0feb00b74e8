pub mod client;
pub mod condition;
mod controller;
pub mod filter;
pub mod poller;
pub mod resource;

pub use client::{DashboardApi, HttpDashboardClient};
pub use controller::{Dashboard, DashboardError, RestartBatch, RestartMode};
pub use poller::{
    CompletionReason, PollSettings, PollSummary, RolloutKey, RolloutPoller, RolloutState,
};
pub use resource::{ResourceRecord, ResourceType};
