//! Command-line arguments and subcommands for the verdict CLI.
//!
//! Uses the `clap` derive API; flags given here override values from `--config`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "verdict",
    version,
    about = "Skip/xfail marker decisions, safe object rendering and stable report locations."
)]
pub struct VerdictArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run YAML suite files and report the outcome of every test.
    Run {
        /// Suite files, or directories to search for `*.yaml` / `*.yml` suites.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Report xfail-marked tests as if they were not marked.
        #[arg(long)]
        runxfail: bool,
        /// Short summary selection: f, s, x, X, p, a (all but passed), A (all).
        #[arg(short = 'r', value_name = "CHARS")]
        report_chars: Option<String>,
        /// YAML file with run options.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Evaluate a single condition expression.
    Eval {
        expr: String,
        /// Bind a name for the expression; the value is parsed as YAML.
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_binding)]
        bindings: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}
