// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod dashboard;
mod output;
pub mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use cli::{Args, Command, FilterArgs};
use dashboard::{Dashboard, DashboardApi, HttpDashboardClient, ResourceType};

const LOGIN_HINT: &str = "run `rollout-dash login --kubeconfig <FILE>`";

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool, to_stderr: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    // Create log directory
    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // Rotate daily or at 10MB, keeping 5 files
    let log_path = log_dir.join("rollout-dash.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose {
        "rollout_dash=debug"
    } else {
        "rollout_dash=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // File layer (always enabled)
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if to_stderr && verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Always log to ~/.rollout-dash/log/rollout-dash.log; batch commands
    // with -v also log to stderr
    let is_batch = !matches!(args.command, None | Some(Command::Interactive));
    init_logging(args.verbose, is_batch && args.verbose);

    let mut config = config::Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {}", e);
        config::Config::default()
    });
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }

    let client = HttpDashboardClient::new(&config.server_url, config.session_token.clone())?;

    match &args.command {
        Some(Command::Login { kubeconfig }) => {
            let session = client.login(kubeconfig).await?;
            println!("Logged in as {}", style(&session.user).green().bold());
            config.set_session(session.token, session.user);
            config.save()?;
            Ok(())
        }
        Some(Command::Logout) => {
            if config.session_token.is_some()
                && let Err(e) = client.logout().await
            {
                warn!(error = %e, "Backend logout failed, clearing local session anyway");
            }
            config.clear_session();
            config.save()?;
            println!("Logged out");
            Ok(())
        }
        Some(Command::Whoami) => {
            let user = client
                .auth_check()
                .await
                .with_context(|| format!("Not logged in, {}", LOGIN_HINT))?;
            println!("{}", user);
            Ok(())
        }
        command => {
            let mut dash = Dashboard::new(
                Arc::new(client),
                config.poll.settings(),
                config.restart_mode,
            );
            if let Some(namespace) = args
                .namespace
                .clone()
                .or_else(|| config.default_namespace.clone())
            {
                dash.set_namespace(namespace);
            }

            match command {
                Some(Command::Namespaces) => {
                    let namespaces = dash.load_namespaces().await;
                    println!(
                        "{}",
                        output::render_list("Namespace", &namespaces, &args.output, args.no_headers)
                    );
                    Ok(())
                }
                Some(Command::Names { resource_type }) => {
                    require_namespace(&dash)?;
                    dash.set_resource_type((*resource_type).into());
                    let names = dash.name_candidates().await;
                    println!(
                        "{}",
                        output::render_list("Name", &names, &args.output, args.no_headers)
                    );
                    Ok(())
                }
                Some(Command::List(filter)) => {
                    apply_filter(&mut dash, filter);
                    dash.search().await?;
                    let state = dash.state();
                    println!(
                        "{}",
                        output::render(
                            &state.records,
                            state.resource_type,
                            None,
                            &args.output,
                            args.no_headers,
                        )
                    );
                    Ok(())
                }
                Some(Command::Restart {
                    filter,
                    yes,
                    no_watch,
                    concurrent,
                }) => {
                    if *concurrent {
                        dash.set_restart_mode(dashboard::RestartMode::Concurrent);
                    }
                    apply_filter(&mut dash, filter);
                    run_restart(&args, dash, *yes, *no_watch).await
                }
                _ => {
                    if config.session_token.is_none() {
                        eprintln!(
                            "{}",
                            style(format!("No stored session, {} first", LOGIN_HINT)).yellow()
                        );
                    } else if let Err(e) = dash.api().auth_check().await {
                        eprintln!(
                            "{} {}",
                            style("Warning: session check failed:").yellow(),
                            e
                        );
                    }
                    cli::repl::run_repl(dash).await
                }
            }
        }
    }
}

fn require_namespace<A: DashboardApi>(dash: &Dashboard<A>) -> Result<()> {
    if dash.state().namespace.is_none() {
        anyhow::bail!(dashboard::DashboardError::NoNamespace);
    }
    Ok(())
}

fn apply_filter<A: DashboardApi>(dash: &mut Dashboard<A>, filter: &FilterArgs) {
    dash.set_resource_type(ResourceType::from(filter.resource_type));
    dash.set_name_filter(filter.names.iter().cloned());
    dash.set_label_query(filter.labels.clone());
    dash.set_strict(filter.strict);
}

/// Ask on the terminal; anything but y/yes declines
fn confirm(question: &str) -> Result<bool> {
    let term = console::Term::stderr();
    term.write_str(question)?;
    let answer = term.read_line()?;
    Ok(cli::repl::is_yes(&answer))
}

async fn run_restart<A: DashboardApi>(
    args: &Args,
    mut dash: Dashboard<A>,
    yes: bool,
    no_watch: bool,
) -> Result<()> {
    dash.search().await?;
    dash.select_all();

    let state = dash.state();
    if state.selection.is_empty() {
        println!("No resources found.");
        return Ok(());
    }
    println!(
        "{}",
        output::render(
            &state.records,
            state.resource_type,
            None,
            &args.output,
            args.no_headers,
        )
    );

    let question = format!("Restart {} resource(s)? [y/N] ", state.selection.len());
    if !yes && !confirm(&question)? {
        println!("Restart cancelled.");
        return Ok(());
    }

    let batch = dash.restart_selected().await?;
    cli::print_batch(&batch);
    let failed = !batch.failed.is_empty();

    let mut errored = false;
    if let Some(poller) = batch.poller
        && !no_watch
    {
        let summary = cli::watch_rollout(&mut dash, poller).await;
        cli::print_summary(&summary);
        errored = !summary.errored.is_empty();
        info!(reason = %summary.reason, ticks = summary.ticks, "Restart finished");
    }

    if failed || errored {
        std::process::exit(1);
    }
    Ok(())
}
