//! User-facing output for the CLI.
//!
//! Everything writes through a [`WriteColor`] so that tests can capture output with
//! `termcolor::Buffer` while the binary writes to a colored stdout.

use std::io::{self, Write};

use serde::Serialize;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::condition::Value;
use crate::config::RunOptions;
use crate::marker::ReportOutcome;
use crate::report::{short_summary, TestReport, Totals};

// ============================================================================
// TEXT OUTPUT
// ============================================================================

/// Verbose lines, failure details, the short summary and the totals line.
pub fn print_reports<W: WriteColor>(
    out: &mut W,
    reports: &[TestReport],
    options: &RunOptions,
) -> io::Result<()> {
    for report in reports {
        write!(out, "{} ", report.nodeid)?;
        out.set_color(ColorSpec::new().set_fg(Some(outcome_color(&report.outcome))))?;
        writeln!(out, "{}", report.outcome.word())?;
        out.reset()?;
    }

    let failures: Vec<&TestReport> = reports.iter().filter(|r| r.outcome.is_failure()).collect();
    if !failures.is_empty() {
        banner(out, "FAILURES", Color::Red)?;
        for report in failures {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            writeln!(out, "_____ {} _____", report.nodeid)?;
            out.reset()?;
            if let Some(longrepr) = &report.longrepr {
                writeln!(out, "{}", longrepr)?;
            }
        }
    }

    let summary = short_summary(reports, options);
    if !summary.is_empty() {
        banner(out, "short test summary info", Color::Cyan)?;
        for line in summary {
            writeln!(out, "{}", line)?;
        }
    }

    let totals = Totals::from_reports(reports);
    let color = if totals.has_failures() {
        Color::Red
    } else if totals.skipped + totals.xfailed + totals.xpassed > 0 {
        Color::Yellow
    } else {
        Color::Green
    };
    banner(out, &totals.to_string(), color)
}

/// Result of `verdict eval`.
pub fn print_value<W: WriteColor>(out: &mut W, expr: &str, value: &Value) -> io::Result<()> {
    write!(out, "{} -> ", expr)?;
    let color = if value.truthy() { Color::Green } else { Color::Yellow };
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    writeln!(out, "{}", value)?;
    out.reset()
}

// ============================================================================
// JSON OUTPUT
// ============================================================================

#[derive(Serialize)]
struct JsonRun<'a> {
    reports: &'a [TestReport],
    totals: Totals,
}

pub fn print_json<W: Write>(out: &mut W, reports: &[TestReport]) -> io::Result<()> {
    let run = JsonRun {
        reports,
        totals: Totals::from_reports(reports),
    };
    serde_json::to_writer_pretty(&mut *out, &run)?;
    writeln!(out)
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn outcome_color(outcome: &ReportOutcome) -> Color {
    match outcome {
        ReportOutcome::Passed => Color::Green,
        ReportOutcome::Failed { .. } => Color::Red,
        ReportOutcome::Skipped { .. }
        | ReportOutcome::XFailed { .. }
        | ReportOutcome::XPassed { .. } => Color::Yellow,
    }
}

fn banner<W: WriteColor>(out: &mut W, title: &str, color: Color) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    writeln!(out, "===== {} =====", title)?;
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::ReportLocation;
    use std::path::PathBuf;
    use termcolor::Buffer;

    #[test]
    fn plain_text_layout() {
        let location = ReportLocation {
            path: PathBuf::from("test_a.py"),
            line: 2,
            domain: "test_x".to_string(),
        };
        let reports = vec![TestReport {
            nodeid: "test_a.py::test_x".to_string(),
            outcome: ReportOutcome::Skipped {
                reason: "unconditional skip".to_string(),
                location: location.clone(),
            },
            location,
            longrepr: None,
        }];
        let options = RunOptions {
            report_chars: "s".to_string(),
            ..RunOptions::default()
        };
        let mut buf = Buffer::no_color();
        print_reports(&mut buf, &reports, &options).unwrap();
        let text = String::from_utf8(buf.into_inner()).unwrap();
        assert_eq!(
            text,
            "test_a.py::test_x SKIPPED\n\
             ===== short test summary info =====\n\
             SKIPPED [1] test_a.py:2: unconditional skip\n\
             ===== 1 skipped =====\n"
        );
    }
}
