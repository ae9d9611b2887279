//! Applying a marker decision to the result of running an item.

use std::any::Any;
use std::fmt::{self, Debug, Display};

use serde::Serialize;

use crate::location::{RawFrame, ReportLocation};
use crate::marker::{MarkerDecision, XfailDecision};
use crate::repr::{panic_parts, SafeRepr, UNPRESENTABLE};

/// Why a test body failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Exception-style kind, e.g. `AssertionError`. Empty for framework-generated failures.
    pub kind: String,
    pub message: String,
    /// Where the failure was raised, when known; otherwise the item's own location is used.
    pub frame: Option<RawFrame>,
    /// `(name, rendering)` pairs for objects shown in the report.
    pub objects: Vec<(String, String)>,
}

impl Failure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            frame: None,
            objects: Vec::new(),
        }
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new("AssertionError", message)
    }

    /// Builds a failure from a caught panic. Unknown payloads are leaked, not dropped.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match panic_parts(payload.as_ref()) {
            Some((kind, message)) => Self::new(kind, message),
            None => {
                std::mem::forget(payload);
                Self::new("panic", UNPRESENTABLE)
            }
        }
    }

    pub fn at(mut self, frame: RawFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_object_using<T: Debug + ?Sized>(
        mut self,
        repr: &SafeRepr,
        name: impl Into<String>,
        value: &T,
    ) -> Self {
        self.objects.push((name.into(), repr.repr(value)));
        self
    }

    /// Like [`Failure::with_object_using`], for values whose `Display` is their repr.
    pub fn with_display_using<T: Display + ?Sized>(
        mut self,
        repr: &SafeRepr,
        name: impl Into<String>,
        value: &T,
    ) -> Self {
        self.objects.push((name.into(), repr.display(value)));
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Raw result of running a test body, before markers are taken into account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed(Failure),
}

/// Outcome as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ReportOutcome {
    Passed,
    Failed { failure: Failure },
    Skipped { reason: String, location: ReportLocation },
    XFailed { reason: String },
    XPassed { reason: String },
}

impl ReportOutcome {
    /// Verbose-mode word.
    pub fn word(&self) -> &'static str {
        match self {
            ReportOutcome::Passed => "PASSED",
            ReportOutcome::Failed { .. } => "FAILED",
            ReportOutcome::Skipped { .. } => "SKIPPED",
            ReportOutcome::XFailed { .. } => "XFAIL",
            ReportOutcome::XPassed { .. } => "XPASS",
        }
    }

    /// The `-r` letter selecting this outcome in the short summary.
    pub fn letter(&self) -> char {
        match self {
            ReportOutcome::Passed => 'p',
            ReportOutcome::Failed { .. } => 'f',
            ReportOutcome::Skipped { .. } => 's',
            ReportOutcome::XFailed { .. } => 'x',
            ReportOutcome::XPassed { .. } => 'X',
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReportOutcome::Failed { .. })
    }
}

impl XfailDecision {
    /// Whether `failure` is the failure this marker expects.
    pub fn accepts(&self, failure: &Failure) -> bool {
        match &self.raises {
            None => true,
            Some(kinds) => kinds.iter().any(|kind| *kind == failure.kind),
        }
    }
}

/// Runs `body` if the decision calls for it and folds the result into a [`ReportOutcome`].
pub fn apply(decision: &MarkerDecision, body: impl FnOnce() -> RunOutcome) -> ReportOutcome {
    match decision {
        MarkerDecision::Skip(skip) => ReportOutcome::Skipped {
            reason: skip.reason.clone(),
            location: skip.location.clone(),
        },
        MarkerDecision::ExpectedFailure(xfail) if !xfail.run => ReportOutcome::XFailed {
            reason: format!("[NOTRUN] {}", xfail.reason),
        },
        MarkerDecision::ExpectedFailure(xfail) => match body() {
            RunOutcome::Failed(failure) if !xfail.accepts(&failure) => {
                ReportOutcome::Failed { failure }
            }
            RunOutcome::Failed(_) => ReportOutcome::XFailed {
                reason: xfail.reason.clone(),
            },
            RunOutcome::Passed if xfail.strict => ReportOutcome::Failed {
                failure: Failure::new("", format!("[XPASS(strict)] {}", xfail.reason)),
            },
            RunOutcome::Passed => ReportOutcome::XPassed {
                reason: xfail.reason.clone(),
            },
        },
        MarkerDecision::Run => match body() {
            RunOutcome::Passed => ReportOutcome::Passed,
            RunOutcome::Failed(failure) => ReportOutcome::Failed { failure },
        },
    }
}
