// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod args;
pub mod repl;

pub use args::{Args, Command, FilterArgs, OutputFormat};

use console::style;

use crate::dashboard::{
    CompletionReason, Dashboard, DashboardApi, PollSummary, RestartBatch, RolloutPoller,
    RolloutState,
};
use crate::progress::{ProgressUpdate, create_spinner};

/// Print the outcome of a restart batch; failures are named one by one
pub fn print_batch(batch: &RestartBatch) {
    for (key, reason) in &batch.failed {
        eprintln!(
            "{} {}",
            style(format!("Failed to restart {}:", key)).red().bold(),
            style(reason).red()
        );
    }
    println!(
        "Rollout restart triggered for {} of {} selected resource(s).",
        batch.succeeded.len(),
        batch.total()
    );
}

/// Print the completion notice of a poll session
pub fn print_summary(summary: &PollSummary) {
    let headline = match summary.reason {
        CompletionReason::AllReady => {
            style("All restarted resources are ready.".to_string()).green()
        }
        CompletionReason::Cancelled => style("Stopped watching rollouts.".to_string()).yellow(),
        reason => style(format!("Stopped watching rollouts: {}.", reason)).yellow(),
    };
    println!(
        "{} {}",
        headline,
        style(format!(
            "({} check{}, {:.0}s)",
            summary.ticks,
            if summary.ticks == 1 { "" } else { "s" },
            summary.elapsed.as_secs_f64()
        ))
        .dim()
    );

    for key in &summary.errored {
        println!("  {} {}", style("error").red().bold(), key);
    }
    for key in &summary.pending {
        println!("  {} {}", style("still restarting").yellow(), key);
    }
}

/// Run a poll session with a spinner; Ctrl+C stops watching
pub async fn watch_rollout<A: DashboardApi>(
    dash: &mut Dashboard<A>,
    poller: RolloutPoller,
) -> PollSummary {
    let spinner = create_spinner(&format!(
        "Waiting for {} rollout(s) in {} (up to {} checks)...",
        poller.state().len(),
        poller.namespace(),
        poller.settings().max_attempts
    ));
    for (key, tracked) in poller.state().iter() {
        spinner.println(format!("watching {} until {} ready", key, tracked.target_ready));
    }
    let handle = poller.handle();
    let mut progress_rx = dash.progress().subscribe();

    let summary = {
        let mut watch = Box::pin(dash.watch(poller));

        loop {
            tokio::select! {
                biased;
                progress = progress_rx.recv() => {
                    match progress {
                        Ok(ProgressUpdate::TickStarted { attempt, max_attempts, tracked }) => {
                            spinner.set_message(format!(
                                "Waiting for {} rollout(s) (check {}/{})...",
                                tracked, attempt, max_attempts
                            ));
                        }
                        Ok(ProgressUpdate::StateChanged { resource, state, ready }) => {
                            let ready = ready.unwrap_or_default();
                            let line = match state {
                                RolloutState::Ready => {
                                    format!("{} {} {}", style("ready").green(), resource, ready)
                                }
                                RolloutState::Error => format!(
                                    "{} {} {}",
                                    style("error").red().bold(),
                                    resource,
                                    ready
                                ),
                                RolloutState::Restarting => format!("restarting {}", resource),
                            };
                            spinner.println(line);
                        }
                        Ok(ProgressUpdate::FetchFailed { resource_type, error }) => {
                            spinner.println(format!(
                                "{} could not refresh {}: {}",
                                style("warning").yellow(),
                                resource_type,
                                error
                            ));
                        }
                        _ => {}
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    handle.cancel();
                }
                summary = &mut watch => {
                    break summary;
                }
            }
        }
    };

    spinner.finish_and_clear();
    summary
}
