//! The verdict command-line interface.
//!
//! Exit status: `0` when nothing failed, `1` when a test failed, `2` when the run itself could
//! not be carried out (unreadable config, malformed suite, bad expression).

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use miette::NamedSource;
use termcolor::{ColorChoice, StandardStream};

use crate::cli::args::{Command, Format, VerdictArgs};
use crate::condition::eval::{self, Scope};
use crate::condition::{parser, ConditionContext, ConditionError, ConditionEvaluator, Value};
use crate::config::RunOptions;
use crate::diagnostics::VerdictError;
use crate::report::{TestReport, Totals};
use crate::session::Session;
use crate::suite::{self, Suite};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = VerdictArgs::parse();

    let result = match args.command {
        Command::Run {
            paths,
            runxfail,
            report_chars,
            config,
            format,
        } => resolve_options(config, runxfail, report_chars)
            .and_then(|options| handle_run(&paths, options, format)),
        Command::Eval { expr, bindings } => handle_eval(&expr, &bindings).map(|()| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            tracing::debug!(kind = %err.error_type(), "run aborted");
            eprintln!("{:?}", miette::Report::new(err));
            process::exit(2);
        }
    }
}

/// File options first, then flags on top.
fn resolve_options(
    config: Option<PathBuf>,
    runxfail: bool,
    report_chars: Option<String>,
) -> Result<RunOptions, VerdictError> {
    let mut options = match config {
        Some(path) => RunOptions::load(&path)?,
        None => RunOptions::default(),
    };
    if runxfail {
        options.run_xfail = true;
    }
    if let Some(chars) = report_chars {
        options.report_chars = chars;
    }
    Ok(options)
}

/// Returns whether every test avoided failing.
fn handle_run(
    paths: &[PathBuf],
    options: RunOptions,
    format: Format,
) -> Result<bool, VerdictError> {
    let session = Session::new(options)?;
    let suites = suite::discover(paths)?
        .iter()
        .map(|path| Suite::load(path))
        .collect::<Result<Vec<_>, _>>()?;

    // Collect everything before running anything, so a test that moves the working
    // directory cannot affect how later suites are located.
    let tests: Vec<_> = suites.iter().flat_map(|s| s.collect(&session)).collect();
    tracing::info!(suites = suites.len(), tests = tests.len(), "collected");

    let reports: Vec<TestReport> = tests.iter().map(|test| test.run(&session)).collect();
    let stats = session.evaluator().stats();
    tracing::debug!(hits = stats.hits, evaluations = stats.evaluations, "condition cache");

    let stdout_err = |source| VerdictError::Io {
        path: PathBuf::from("<stdout>"),
        source,
    };
    match format {
        Format::Text => {
            let mut stdout = StandardStream::stdout(color_choice());
            output::print_reports(&mut stdout, &reports, session.options()).map_err(stdout_err)?;
        }
        Format::Json => {
            let stdout = std::io::stdout();
            output::print_json(&mut stdout.lock(), &reports).map_err(stdout_err)?;
        }
    }
    Ok(!Totals::from_reports(&reports).has_failures())
}

fn handle_eval(expr: &str, bindings: &[(String, String)]) -> Result<(), VerdictError> {
    let mut context = ConditionContext::new("<cli>");
    for (name, raw) in bindings {
        let value: Value = serde_yaml::from_str(raw).map_err(|err| VerdictError::Config {
            message: format!("invalid value for '{}': {}", name, err),
            span: err.location().map(|loc| (loc.index(), 1).into()),
            src: NamedSource::new(format!("--set {}", name), raw.clone()),
        })?;
        context = context.bind(name.as_str(), value);
    }

    let evaluator = ConditionEvaluator::new();
    let text = expr.trim();
    let value = parser::parse(text)
        .and_then(|ast| eval::evaluate(&ast, &Scope::new(context.namespace(), evaluator.globals())))
        .map_err(|err| ConditionError::new(text, &context, err))?;

    let mut stdout = StandardStream::stdout(color_choice());
    output::print_value(&mut stdout, text, &value).map_err(|source| VerdictError::Io {
        path: PathBuf::from("<stdout>"),
        source,
    })
}

fn color_choice() -> ColorChoice {
    if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}
