// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::dashboard::ResourceType;

#[derive(Parser, Debug)]
#[command(name = "rollout-dash")]
#[command(
    author,
    version,
    about = "Inspect and rollout-restart Kubernetes workloads through the dashboard API"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Dashboard backend URL (overrides the config file)
    #[arg(short, long, value_name = "URL")]
    pub server: Option<String>,

    /// Namespace to work in (overrides the config file)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long)]
    pub no_headers: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the interactive dashboard (default)
    Interactive,

    /// List namespaces
    Namespaces,

    /// List names of all resources of a type (name filter candidates)
    Names {
        #[arg(short = 't', long = "type", value_enum, default_value = "deployment")]
        resource_type: ResourceKind,
    },

    /// List resources matching a filter
    List(FilterArgs),

    /// Rollout-restart every resource matching a filter and wait for it
    Restart {
        #[command(flatten)]
        filter: FilterArgs,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Return right after the restart requests
        #[arg(long)]
        no_watch: bool,

        /// Send all restart requests at once
        #[arg(long)]
        concurrent: bool,
    },

    /// Upload a kubeconfig and store the session
    Login {
        /// Path to the kubeconfig file
        #[arg(short, long, value_name = "FILE")]
        kubeconfig: PathBuf,
    },

    /// End the stored session
    Logout,

    /// Show the user of the stored session
    Whoami,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FilterArgs {
    /// Resource type
    #[arg(short = 't', long = "type", value_enum, default_value = "deployment")]
    pub resource_type: ResourceKind,

    /// Only these names (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub names: Vec<String>,

    /// Label query, e.g. "app:web !canary", "app:api || app:web"
    #[arg(short, long, default_value = "")]
    pub labels: String,

    /// Whole-word label matching
    #[arg(long)]
    pub strict: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Deployment,
    Statefulset,
    Pod,
}

impl From<ResourceKind> for ResourceType {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Deployment => ResourceType::Deployment,
            ResourceKind::Statefulset => ResourceType::StatefulSet,
            ResourceKind::Pod => ResourceType::Pod,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Yaml,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_restart() {
        let args = Args::try_parse_from([
            "rollout-dash",
            "-n",
            "prod",
            "restart",
            "-t",
            "statefulset",
            "--names",
            "db,cache",
            "-l",
            "app:db || app:cache",
            "--yes",
        ])
        .unwrap();

        assert_eq!(args.namespace.as_deref(), Some("prod"));
        match args.command {
            Some(Command::Restart {
                filter,
                yes,
                no_watch,
                concurrent,
            }) => {
                assert_eq!(ResourceType::from(filter.resource_type), ResourceType::StatefulSet);
                assert_eq!(filter.names, vec!["db", "cache"]);
                assert_eq!(filter.labels, "app:db || app:cache");
                assert!(yes);
                assert!(!no_watch);
                assert!(!concurrent);
            }
            other => panic!("Expected restart command, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_interactive() {
        let args = Args::try_parse_from(["rollout-dash"]).unwrap();
        assert!(args.command.is_none());
        assert!(matches!(args.output, OutputFormat::Table));
    }

    #[test]
    fn test_list_defaults() {
        let args = Args::try_parse_from(["rollout-dash", "-o", "json", "list"]).unwrap();
        assert!(matches!(args.output, OutputFormat::Json));
        match args.command {
            Some(Command::List(filter)) => {
                assert_eq!(filter.resource_type, ResourceKind::Deployment);
                assert!(filter.names.is_empty());
                assert!(filter.labels.is_empty());
                assert!(!filter.strict);
            }
            other => panic!("Expected list command, got {:?}", other),
        }
    }
}
