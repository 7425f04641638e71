//! Workflow enforcement hooks for AI coding agents.
//!
//! `hookgate hook <event>` is what the host runtime invokes; it always exits
//! successfully and answers on stdout. `register` prints the host's hook
//! registration for a project, and `hosts` lists the supported runtimes.

use std::env;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;

use hookgate::adapters::{HookRules, HostKind, SUPPORTED_HOSTS, adapter_for};
use hookgate::core::types::HookEvent;
use hookgate::dispatch::run_hook;
use hookgate::exit_codes;
use hookgate::io::config::load_config;
use hookgate::io::store::WorkflowPaths;
use hookgate::logging;

#[derive(Parser)]
#[command(
    name = "hookgate",
    version,
    about = "Workflow enforcement hooks for AI coding agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one hook event: read the host envelope on stdin, print the response.
    Hook {
        #[arg(value_enum)]
        event: HookEvent,
        /// Host runtime that sent the envelope.
        #[arg(long, value_enum, default_value_t = HostKind::ClaudeCode)]
        host: HostKind,
        /// Project root (defaults to the envelope's cwd, then the current directory).
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Print the host hook registration for a project.
    Register {
        #[arg(long, value_enum, default_value_t = HostKind::ClaudeCode)]
        host: HostKind,
        /// Project root (defaults to the current directory).
        #[arg(long)]
        root: Option<PathBuf>,
        /// Command the host should run (defaults to this executable).
        #[arg(long)]
        binary: Option<String>,
    },
    /// List supported host runtimes and whether they are installed.
    Hosts,
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Hook { event, host, root } => {
            cmd_hook(event, host, root.as_deref());
            Ok(())
        }
        Command::Register { host, root, binary } => cmd_register(host, root, binary),
        Command::Hosts => {
            cmd_hosts();
            Ok(())
        }
    }
}

fn cmd_hook(event: HookEvent, host: HostKind, root: Option<&Path>) {
    let mut input = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut input) {
        warn!(err = %err, "failed to read hook envelope, treating as empty");
        input.clear();
    }
    let adapter = adapter_for(host);
    let response = run_hook(adapter.as_ref(), event, &input, root);
    write_response(&mut io::stdout().lock(), &response);
}

/// Print the hook response. A host that already closed the pipe gets nothing.
fn write_response<W: Write>(out: &mut W, response: &Value) {
    if let Err(err) = writeln!(out, "{response}").and_then(|()| out.flush()) {
        warn!(err = %err, "failed to write hook response");
    }
}

fn cmd_register(host: HostKind, root: Option<PathBuf>, binary: Option<String>) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => env::current_dir().context("resolve current directory")?,
    };
    let binary = match binary {
        Some(binary) => binary,
        None => env::current_exe()
            .context("resolve hookgate executable")?
            .to_string_lossy()
            .into_owned(),
    };

    let paths = WorkflowPaths::new(&root);
    let config = load_config(&paths.config_path)?;
    let rules = HookRules::from_config(&config, binary);
    let registration = adapter_for(host)
        .generate_config(&rules, &root)
        .with_context(|| format!("generate {} hook config", host.as_str()))?;
    let payload = serde_json::to_string_pretty(&registration).context("serialize hook config")?;
    writeln!(io::stdout().lock(), "{payload}").context("write hook config")?;
    Ok(())
}

fn cmd_hosts() {
    for kind in SUPPORTED_HOSTS {
        let status = if adapter_for(kind).is_available() {
            "available"
        } else {
            "not installed"
        };
        println!("{}\t{}", kind.as_str(), status);
    }
}
