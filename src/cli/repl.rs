// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use anyhow::Result;
use console::{Style, style};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Editor, Helper};
use std::borrow::Cow;
use std::time::Instant;

use super::{OutputFormat, print_batch, print_summary, watch_rollout};
use crate::config;
use crate::dashboard::{Dashboard, DashboardApi, RestartMode, ResourceType};
use crate::output;
use crate::progress::create_spinner;

const COMMANDS: &[&str] = &[
    "help", "namespaces", "use", "type", "names", "labels", "strict", "search", "show",
    "select", "deselect", "restart", "mode", "status", "whoami", "clear", "quit", "exit",
];

const RESOURCE_TYPES: &[&str] = &["deployment", "statefulset", "pod"];

/// One line of operator input
#[derive(Debug, Clone, PartialEq)]
enum ReplCommand {
    Help,
    Quit,
    Clear,
    Status,
    Namespaces,
    Use(String),
    Type(ResourceType),
    /// List the names of the current type
    ListNames,
    /// Replace the name filter; empty clears it
    SetNames(Vec<String>),
    Labels(String),
    /// `None` toggles
    Strict(Option<bool>),
    Search,
    Show,
    Select(Vec<String>),
    SelectAll,
    SelectNone,
    Deselect(Vec<String>),
    Restart,
    Mode(RestartMode),
    WhoAmI,
}

/// Split a list argument on commas and whitespace
fn split_names(rest: &str) -> Vec<String> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_switch(value: &str) -> Result<Option<bool>, String> {
    match value.to_lowercase().as_str() {
        "" => Ok(None),
        "on" | "true" | "yes" | "1" => Ok(Some(true)),
        "off" | "false" | "no" | "0" => Ok(Some(false)),
        other => Err(format!("expected on or off, got '{}'", other)),
    }
}

impl ReplCommand {
    fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        let (word, rest) = match input.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (input, ""),
        };

        match word.to_lowercase().as_str() {
            "help" | "\\?" => Ok(ReplCommand::Help),
            "quit" | "exit" | "\\q" => Ok(ReplCommand::Quit),
            "clear" | "\\c" => Ok(ReplCommand::Clear),
            "status" => Ok(ReplCommand::Status),
            "namespaces" | "ns" | "\\l" => Ok(ReplCommand::Namespaces),
            "use" if rest.is_empty() => Err("usage: use <namespace>".to_string()),
            "use" => Ok(ReplCommand::Use(rest.to_string())),
            "type" => rest.parse().map(ReplCommand::Type),
            "names" => match rest {
                "" => Ok(ReplCommand::ListNames),
                "clear" | "-" => Ok(ReplCommand::SetNames(Vec::new())),
                _ => Ok(ReplCommand::SetNames(split_names(rest))),
            },
            "labels" => Ok(ReplCommand::Labels(rest.to_string())),
            "strict" => parse_switch(rest).map(ReplCommand::Strict),
            "search" | "list" | "ls" => Ok(ReplCommand::Search),
            "show" => Ok(ReplCommand::Show),
            "select" => match rest {
                "" => Err("usage: select <name>... | all | none".to_string()),
                "all" => Ok(ReplCommand::SelectAll),
                "none" => Ok(ReplCommand::SelectNone),
                _ => Ok(ReplCommand::Select(split_names(rest))),
            },
            "deselect" if rest.is_empty() => Err("usage: deselect <name>...".to_string()),
            "deselect" => Ok(ReplCommand::Deselect(split_names(rest))),
            "restart" => Ok(ReplCommand::Restart),
            "mode" => match rest.to_lowercase().as_str() {
                "sequential" => Ok(ReplCommand::Mode(RestartMode::Sequential)),
                "concurrent" => Ok(ReplCommand::Mode(RestartMode::Concurrent)),
                _ => Err("usage: mode sequential|concurrent".to_string()),
            },
            "whoami" => Ok(ReplCommand::WhoAmI),
            other => Err(format!("unknown command '{}' (type 'help')", other)),
        }
    }
}

/// Completion for commands, resource types and cached namespaces and names
#[derive(Default)]
struct DashboardHelper {
    namespaces: Vec<String>,
    names: Vec<String>,
}

impl Helper for DashboardHelper {}

impl Hinter for DashboardHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Validator for DashboardHelper {
    fn validate(&self, _ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

impl DashboardHelper {
    fn candidates(&self, command: Option<&str>) -> Vec<&str> {
        match command {
            None => COMMANDS.to_vec(),
            Some("use") => self.namespaces.iter().map(String::as_str).collect(),
            Some("type") => RESOURCE_TYPES.to_vec(),
            Some("names") | Some("select") | Some("deselect") => {
                self.names.iter().map(String::as_str).collect()
            }
            Some("strict") => vec!["on", "off"],
            Some("mode") => vec!["sequential", "concurrent"],
            Some(_) => Vec::new(),
        }
    }
}

/// Byte offset where the word under the cursor begins
fn word_start(line_to_cursor: &str) -> usize {
    line_to_cursor
        .char_indices()
        .rev()
        .find(|&(_, c)| c.is_whitespace() || c == ',')
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0)
}

impl Completer for DashboardHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];
        let word_start = word_start(line_to_cursor);

        let prefix = &line_to_cursor[word_start..];
        let command = line_to_cursor[..word_start].split_whitespace().next();

        let matches = self
            .candidates(command)
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .map(|c| Pair {
                display: c.to_string(),
                replacement: c.to_string(),
            })
            .collect();

        Ok((word_start, matches))
    }
}

impl Highlighter for DashboardHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let word = &trimmed[..end];

        if COMMANDS.contains(&word) {
            Cow::Owned(format!(
                "{}\x1b[1;34m{}\x1b[0m{}",
                &line[..indent],
                word,
                &trimmed[end..]
            ))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Owned(format!("\x1b[1;32m{}\x1b[0m", prompt))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "{} {} - Kubernetes rollout dashboard",
        style("rollout-dash").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "{}",
        style("Type 'help' for commands, Ctrl+D to exit").dim()
    );
    println!();
}

fn help_line(command: &str, text: &str) {
    println!("  {}  - {}", Style::new().yellow().apply_to(command), text);
}

fn print_help() {
    let help_style = Style::new().cyan();

    println!("{}", help_style.apply_to("Scope:"));
    help_line("namespaces", "List namespaces");
    help_line("use <namespace>", "Switch namespace");
    help_line("type <type>", "Switch resource type (deployment, statefulset, pod)");
    println!();
    println!("{}", help_style.apply_to("Filter:"));
    help_line("names", "List names of the current type");
    help_line("names <a,b,...>", "Only show these names ('names clear' resets)");
    help_line("labels <query>", "Label query, e.g. app:web !canary || app:api");
    help_line("strict on|off", "Whole-word label matching");
    help_line("search", "Fetch and show matching resources");
    help_line("show", "Show the last listing again");
    println!();
    println!("{}", help_style.apply_to("Restart:"));
    help_line("select <name>...", "Check resources ('select all', 'select none')");
    help_line("deselect <name>...", "Uncheck resources");
    help_line("restart", "Rollout-restart the selection and watch it");
    help_line("mode sequential|concurrent", "How restart requests are sent");
    println!();
    println!("{}", help_style.apply_to("Session:"));
    help_line("status", "Show namespace, type, filter and selection");
    help_line("whoami", "Show the logged in user");
    help_line("\\q", "Quit");
    println!();
}

fn print_status<A: DashboardApi>(dash: &Dashboard<A>) {
    let state = dash.state();
    let filter = &state.filter;
    let label = Style::new().cyan();

    println!(
        "{} {}",
        label.apply_to("namespace:"),
        state.namespace.as_deref().unwrap_or("(none)")
    );
    println!("{} {}", label.apply_to("type:     "), state.resource_type);
    println!(
        "{} {}",
        label.apply_to("names:    "),
        if filter.names.is_empty() {
            "(all)".to_string()
        } else {
            filter.names.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    );
    println!(
        "{} {}{}",
        label.apply_to("labels:   "),
        if filter.label_query.trim().is_empty() {
            "(any)"
        } else {
            filter.label_query.as_str()
        },
        if filter.strict { " [strict]" } else { "" }
    );
    println!(
        "{} {} of {} listed",
        label.apply_to("selected: "),
        state.selection.len(),
        state.records.len()
    );
    println!(
        "{} {}",
        label.apply_to("mode:     "),
        match dash.restart_mode() {
            RestartMode::Sequential => "sequential",
            RestartMode::Concurrent => "concurrent",
        }
    );
}

fn print_listing<A: DashboardApi>(dash: &Dashboard<A>) {
    let state = dash.state();
    println!(
        "{}",
        output::render(
            &state.records,
            state.resource_type,
            Some(&state.selection),
            &OutputFormat::Table,
            false,
        )
    );
}

fn print_error(e: impl std::fmt::Display) {
    println!("{} {}", style("Error:").red().bold(), style(e).red());
}

fn prompt_for<A: DashboardApi>(dash: &Dashboard<A>) -> String {
    let state = dash.state();
    format!(
        "rollout-dash [{}/{}]> ",
        state.namespace.as_deref().unwrap_or("-"),
        state.resource_type
    )
}

/// Refresh completion candidates after the scope changed
async fn refresh_names<A: DashboardApi>(
    rl: &mut Editor<DashboardHelper, DefaultHistory>,
    dash: &Dashboard<A>,
) {
    let names = dash.name_candidates().await;
    if let Some(helper) = rl.helper_mut() {
        helper.names = names;
    }
}

async fn search<A: DashboardApi>(dash: &mut Dashboard<A>) {
    let spinner = create_spinner("Fetching resources...");
    let start = Instant::now();
    let result = dash.search().await.map(|records| records.len());
    spinner.finish_and_clear();

    match result {
        Ok(_) => {
            print_listing(dash);
            println!(
                "{}",
                style(format!("({:.2}s)", start.elapsed().as_secs_f64())).dim()
            );
        }
        Err(e) => print_error(e),
    }
}

/// Only y/yes confirms
pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn restart<A: DashboardApi>(
    rl: &mut Editor<DashboardHelper, DefaultHistory>,
    dash: &mut Dashboard<A>,
) -> Result<()> {
    let count = dash.state().selection.len();
    if count == 0 {
        print_error("No resources selected.");
        return Ok(());
    }

    let question = format!("Restart {} selected resource(s)? [y/N] ", count);
    match rl.readline(&question) {
        Ok(answer) if is_yes(&answer) => {}
        Ok(_) | Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
            println!("{}", style("Restart cancelled.").dim());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let spinner = create_spinner(&format!("Restarting {} resource(s)...", count));
    let batch = dash.restart_selected().await;
    spinner.finish_and_clear();

    let batch = match batch {
        Ok(batch) => batch,
        Err(e) => {
            print_error(e);
            return Ok(());
        }
    };
    print_batch(&batch);

    if let Some(poller) = batch.poller {
        let summary = watch_rollout(dash, poller).await;
        print_summary(&summary);
        print_listing(dash);
    }
    Ok(())
}

pub async fn run_repl<A: DashboardApi>(mut dash: Dashboard<A>) -> Result<()> {
    let editor_config = rustyline::Config::builder()
        .auto_add_history(false)
        .max_history_size(1000)?
        .build();

    let mut rl: Editor<DashboardHelper, DefaultHistory> = Editor::with_config(editor_config)?;
    rl.set_helper(Some(DashboardHelper {
        namespaces: dash.load_namespaces().await,
        names: dash.name_candidates().await,
    }));

    // Load history
    let history_path = config::base_dir()
        .map(|p| p.join("history"))
        .unwrap_or_else(|_| ".rollout_dash_history".into());
    let _ = rl.load_history(&history_path);

    print_welcome();

    loop {
        let prompt = prompt_for(&dash);

        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                // Commands only; answers to prompts stay out of history
                let _ = rl.add_history_entry(line.as_str());

                let command = match ReplCommand::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        print_error(e);
                        continue;
                    }
                };

                match command {
                    ReplCommand::Quit => {
                        println!("{}", style("Goodbye!").dim());
                        break;
                    }
                    ReplCommand::Help => print_help(),
                    ReplCommand::Clear => print!("\x1B[2J\x1B[1;1H"), // Clear screen
                    ReplCommand::Status => print_status(&dash),
                    ReplCommand::Namespaces => {
                        let namespaces = dash.load_namespaces().await;
                        println!(
                            "{}",
                            output::render_list(
                                "Namespace",
                                &namespaces,
                                &OutputFormat::Table,
                                false
                            )
                        );
                        if let Some(helper) = rl.helper_mut() {
                            helper.namespaces = namespaces;
                        }
                    }
                    ReplCommand::Use(namespace) => {
                        dash.set_namespace(namespace);
                        refresh_names(&mut rl, &dash).await;
                    }
                    ReplCommand::Type(resource_type) => {
                        dash.set_resource_type(resource_type);
                        refresh_names(&mut rl, &dash).await;
                    }
                    ReplCommand::ListNames => {
                        if dash.state().namespace.is_none() {
                            print_error("Please select a namespace.");
                            continue;
                        }
                        refresh_names(&mut rl, &dash).await;
                        let names = rl.helper().map(|h| h.names.clone()).unwrap_or_default();
                        println!(
                            "{}",
                            output::render_list("Name", &names, &OutputFormat::Table, false)
                        );
                    }
                    ReplCommand::SetNames(names) => dash.set_name_filter(names),
                    ReplCommand::Labels(query) => dash.set_label_query(query),
                    ReplCommand::Strict(value) => {
                        let strict = value.unwrap_or(!dash.state().filter.strict);
                        dash.set_strict(strict);
                        println!(
                            "{}",
                            style(format!("Strict matching {}", if strict { "on" } else { "off" }))
                                .dim()
                        );
                    }
                    ReplCommand::Search => search(&mut dash).await,
                    ReplCommand::Show => print_listing(&dash),
                    ReplCommand::Select(names) => {
                        for name in dash.select(names) {
                            print_error(format!("'{}' is not listed", name));
                        }
                        print_listing(&dash);
                    }
                    ReplCommand::SelectAll => {
                        dash.select_all();
                        print_listing(&dash);
                    }
                    ReplCommand::SelectNone => {
                        dash.clear_selection();
                        print_listing(&dash);
                    }
                    ReplCommand::Deselect(names) => {
                        for name in names {
                            dash.deselect(&name);
                        }
                        print_listing(&dash);
                    }
                    ReplCommand::Restart => restart(&mut rl, &mut dash).await?,
                    ReplCommand::Mode(mode) => dash.set_restart_mode(mode),
                    ReplCommand::WhoAmI => match dash.api().auth_check().await {
                        Ok(user) => println!("{}", user),
                        Err(e) => print_error(format!("Not logged in: {}", e)),
                    },
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", style("^C").dim());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", style("Goodbye!").dim());
                break;
            }
            Err(err) => {
                println!("{} {:?}", style("Error:").red().bold(), err);
                break;
            }
        }
    }

    // Save history
    let _ = rl.save_history(&history_path);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scope_commands() {
        assert_eq!(ReplCommand::parse("use prod"), Ok(ReplCommand::Use("prod".to_string())));
        assert_eq!(
            ReplCommand::parse("type sts"),
            Ok(ReplCommand::Type(ResourceType::StatefulSet))
        );
        assert!(ReplCommand::parse("type jobs").is_err());
        assert!(ReplCommand::parse("use").is_err());
        assert_eq!(ReplCommand::parse("\\l"), Ok(ReplCommand::Namespaces));
    }

    #[test]
    fn test_parse_filter_commands() {
        assert_eq!(ReplCommand::parse("names"), Ok(ReplCommand::ListNames));
        assert_eq!(
            ReplCommand::parse("names api, web  db"),
            Ok(ReplCommand::SetNames(vec![
                "api".to_string(),
                "web".to_string(),
                "db".to_string()
            ]))
        );
        assert_eq!(ReplCommand::parse("names clear"), Ok(ReplCommand::SetNames(vec![])));
        assert_eq!(
            ReplCommand::parse("labels app:web || app:api"),
            Ok(ReplCommand::Labels("app:web || app:api".to_string()))
        );
        assert_eq!(ReplCommand::parse("labels"), Ok(ReplCommand::Labels(String::new())));
    }

    #[test]
    fn test_parse_strict() {
        assert_eq!(ReplCommand::parse("strict on"), Ok(ReplCommand::Strict(Some(true))));
        assert_eq!(ReplCommand::parse("strict OFF"), Ok(ReplCommand::Strict(Some(false))));
        assert_eq!(ReplCommand::parse("strict"), Ok(ReplCommand::Strict(None)));
        assert!(ReplCommand::parse("strict maybe").is_err());
    }

    #[test]
    fn test_parse_selection_commands() {
        assert_eq!(ReplCommand::parse("select all"), Ok(ReplCommand::SelectAll));
        assert_eq!(ReplCommand::parse("select none"), Ok(ReplCommand::SelectNone));
        assert_eq!(
            ReplCommand::parse("select api,web"),
            Ok(ReplCommand::Select(vec!["api".to_string(), "web".to_string()]))
        );
        assert!(ReplCommand::parse("select").is_err());
        assert!(ReplCommand::parse("deselect").is_err());
        assert_eq!(
            ReplCommand::parse("mode concurrent"),
            Ok(ReplCommand::Mode(RestartMode::Concurrent))
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = ReplCommand::parse("rollback api").unwrap_err();
        assert!(err.contains("rollback"));
        assert_eq!(ReplCommand::parse("  QUIT "), Ok(ReplCommand::Quit));
    }

    #[test]
    fn test_completion_candidates() {
        let helper = DashboardHelper {
            namespaces: vec!["default".to_string(), "prod".to_string()],
            names: vec!["api".to_string()],
        };
        assert!(helper.candidates(None).contains(&"restart"));
        assert_eq!(helper.candidates(Some("use")), vec!["default", "prod"]);
        assert_eq!(helper.candidates(Some("select")), vec!["api"]);
        assert_eq!(helper.candidates(Some("type")), RESOURCE_TYPES.to_vec());
        assert!(helper.candidates(Some("search")).is_empty());
    }

    #[test]
    fn test_word_start() {
        assert_eq!(word_start(""), 0);
        assert_eq!(word_start("sel"), 0);
        assert_eq!(word_start("select ap"), 7);
        assert_eq!(word_start("select api,we"), 11);
        assert_eq!(word_start("select api "), 11);
    }

    #[test]
    fn test_word_start_after_multibyte_whitespace() {
        // U+3000 is three bytes wide
        let line = "select\u{3000}ap";
        let start = word_start(line);
        assert_eq!(start, "select\u{3000}".len());
        assert_eq!(&line[start..], "ap");
        assert_eq!(word_start("use\u{00a0}"), "use\u{00a0}".len());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y"));
        assert!(is_yes(" YES\n"));
        assert!(!is_yes(""));
        assert!(!is_yes("yep"));
        assert!(!is_yes("n"));
    }

    #[test]
    fn test_highlight_command_word() {
        let helper = DashboardHelper::default();
        assert!(helper.highlight("search", 0).contains("\x1b[1;34msearch"));
        assert_eq!(helper.highlight("bogus", 0), "bogus");
    }
}
