//! Per-item reports and the terminal summary lines built from them.

use std::fmt;

use serde::Serialize;

use crate::config::RunOptions;
use crate::location::ReportLocation;
use crate::marker::ReportOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub nodeid: String,
    pub outcome: ReportOutcome,
    pub location: ReportLocation,
    /// Long failure representation, present for failed items.
    pub longrepr: Option<String>,
}

impl TestReport {
    /// `nodeid OUTCOME`, as printed in verbose mode.
    pub fn verbose_line(&self) -> String {
        format!("{} {}", self.nodeid, self.outcome.word())
    }

    /// Short summary line for this report alone. Skips are better folded with [`short_summary`].
    pub fn short_line(&self) -> String {
        match &self.outcome {
            ReportOutcome::Skipped { reason, location } => skip_line(1, location, reason),
            ReportOutcome::XFailed { reason } if reason.is_empty() => {
                format!("XFAIL {}", self.nodeid)
            }
            ReportOutcome::XFailed { reason } => format!("XFAIL {} - {}", self.nodeid, reason),
            ReportOutcome::XPassed { reason } => {
                format!("XPASS {} {}", self.nodeid, reason).trim_end().to_string()
            }
            ReportOutcome::Failed { failure } => {
                let text = failure.to_string();
                let first = text.lines().next().unwrap_or_default();
                format!("FAILED {} - {}", self.nodeid, first)
            }
            ReportOutcome::Passed => format!("PASSED {}", self.nodeid),
        }
    }
}

fn skip_line(count: usize, location: &ReportLocation, reason: &str) -> String {
    format!("SKIPPED [{}] {}: {}", count, location, reason)
}

/// Short test summary lines selected by `options.report_chars`.
///
/// Skips sharing a `path:line` and reason are folded into one counted line, whichever
/// test function they came from.
pub fn short_summary(reports: &[TestReport], options: &RunOptions) -> Vec<String> {
    let mut lines = Vec::new();
    for letter in ['f', 'x', 'X', 's', 'p'] {
        if !options.reports(letter) {
            continue;
        }
        let selected = reports.iter().filter(|r| r.outcome.letter() == letter);
        if letter != 's' {
            lines.extend(selected.map(TestReport::short_line));
            continue;
        }
        let mut folded: Vec<(&ReportLocation, &str, usize)> = Vec::new();
        for report in selected {
            let ReportOutcome::Skipped { reason, location } = &report.outcome else {
                continue;
            };
            match folded.iter_mut().find(|(loc, why, _)| {
                loc.path == location.path && loc.line == location.line && *why == reason.as_str()
            }) {
                Some(entry) => entry.2 += 1,
                None => folded.push((location, reason, 1)),
            }
        }
        lines.extend(
            folded
                .into_iter()
                .map(|(location, reason, count)| skip_line(count, location, reason)),
        );
    }
    lines
}

/// Outcome counts for the final line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub failed: usize,
    pub passed: usize,
    pub skipped: usize,
    pub xfailed: usize,
    pub xpassed: usize,
}

impl Totals {
    pub fn from_reports(reports: &[TestReport]) -> Self {
        let mut totals = Self::default();
        for report in reports {
            match report.outcome {
                ReportOutcome::Passed => totals.passed += 1,
                ReportOutcome::Failed { .. } => totals.failed += 1,
                ReportOutcome::Skipped { .. } => totals.skipped += 1,
                ReportOutcome::XFailed { .. } => totals.xfailed += 1,
                ReportOutcome::XPassed { .. } => totals.xpassed += 1,
            }
        }
        totals
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.failed, "failed"),
            (self.passed, "passed"),
            (self.skipped, "skipped"),
            (self.xfailed, "xfailed"),
            (self.xpassed, "xpassed"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, word)| format!("{} {}", count, word))
        .collect();
        if parts.is_empty() {
            return f.write_str("no tests ran");
        }
        f.write_str(&parts.join(", "))
    }
}
