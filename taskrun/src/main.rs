//! taskrun: register named shell commands and run them on demand.
//!
//! Tasks and their execution history live in a JSON store (default
//! `.taskrun/tasks.json`). Every command passes the allow-list policy before
//! it is saved or run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use taskrun::core::types::Task;
use taskrun::core::validator::CommandValidator;
use taskrun::exit_codes;
use taskrun::io::config::{DEFAULT_CONFIG_PATH, load_config};
use taskrun::io::process::ShellRunner;
use taskrun::io::store::JsonTaskStore;
use taskrun::logging;
use taskrun::service::TaskService;

#[derive(Parser)]
#[command(
    name = "taskrun",
    version,
    about = "Register named shell commands and run them on demand"
)]
struct Cli {
    /// Path to config.toml.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Task store file (overrides `store_path` from config).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every task.
    List,
    /// Print one task with its execution history.
    Get { id: String },
    /// Print tasks whose name contains QUERY (case-insensitive).
    Search { query: String },
    /// Create or replace a task definition.
    Put {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        command: String,
    },
    /// Delete a task and its history.
    Delete { id: String },
    /// Run a task and print the recorded execution.
    Exec {
        id: String,
        /// One-off command to run instead of the stored one.
        #[arg(long)]
        command: Option<String>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::for_error(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let store_path = cli.store.unwrap_or_else(|| cfg.store_path.clone());

    let service = TaskService::new(
        JsonTaskStore::new(store_path),
        CommandValidator::new(cfg.command_policy()),
        cfg.shell_runner(),
    );
    dispatch(&service, cli.command)
}

fn dispatch(service: &TaskService<JsonTaskStore, ShellRunner>, command: Command) -> Result<()> {
    match command {
        Command::List => print_json(&service.find_all()?),
        Command::Get { id } => print_json(&service.get_by_id(&id)?),
        Command::Search { query } => print_json(&service.search_by_name(&query)?),
        Command::Put {
            id,
            name,
            owner,
            command,
        } => print_json(&service.upsert(Task::new(id, name, owner, command))?),
        Command::Delete { id } => {
            service.delete(&id)?;
            Ok(())
        }
        Command::Exec { id, command } => {
            let execution = service
                .execute(&id, command.as_deref())
                .with_context(|| format!("exec task {id}"))?;
            print_json(&execution)
        }
    }
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exec_with_override() {
        let cli = Cli::parse_from(["taskrun", "exec", "t1", "--command", "date"]);
        assert!(matches!(
            cli.command,
            Command::Exec { ref id, command: Some(ref c) } if id == "t1" && c == "date"
        ));
    }

    #[test]
    fn parse_global_store_after_subcommand() {
        let cli = Cli::parse_from(["taskrun", "list", "--store", "/tmp/t.json"]);
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/t.json")));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn parse_put() {
        let cli = Cli::parse_from([
            "taskrun", "put", "--id", "1", "--name", "n", "--owner", "o", "--command", "echo hi",
        ]);
        assert!(matches!(cli.command, Command::Put { ref command, .. } if command == "echo hi"));
    }
}
