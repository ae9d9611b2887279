//! A test session: collection, marker decisions and running items into reports.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::condition::{ConditionContext, ConditionError, ConditionEvaluator};
use crate::config::{RunMode, RunOptions};
use crate::diagnostics::VerdictError;
use crate::location::{InvocationRoot, LocationResolver, RawFrame, ReportLocation};
use crate::marker::{
    self, Failure, Marker, MarkerDecision, MarkerDecisionEngine, ReportOutcome, RunOutcome,
    TestItem,
};
use crate::report::TestReport;
use crate::repr::SafeRepr;

#[derive(Debug)]
pub struct Session {
    options: RunOptions,
    mode: RunMode,
    repr: SafeRepr,
    engine: MarkerDecisionEngine,
}

impl Session {
    /// Starts a session rooted at the process-wide invocation root, capturing it if needed.
    pub fn new(options: RunOptions) -> Result<Self, VerdictError> {
        let root = InvocationRoot::capture().map_err(|source| VerdictError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self::with_root(options, root.clone()))
    }

    pub fn with_root(options: RunOptions, root: InvocationRoot) -> Self {
        let engine = MarkerDecisionEngine::new(
            ConditionEvaluator::with_options(&options),
            LocationResolver::new(root),
            &options,
        );
        Self {
            mode: options.run_mode(),
            repr: SafeRepr::new(options.repr_maxsize),
            options,
            engine,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Renderer for objects attached to failures, bounded by `repr_maxsize`.
    pub fn repr(&self) -> &SafeRepr {
        &self.repr
    }

    pub fn engine(&self) -> &MarkerDecisionEngine {
        &self.engine
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        self.engine.evaluator()
    }

    pub fn resolver(&self) -> &LocationResolver {
        self.engine.resolver()
    }

    /// Registers an item. Its path is fixed against the root now, before any test can move
    /// the working directory.
    pub fn collect(
        &self,
        nodeid: impl Into<String>,
        frame: RawFrame,
        context: Arc<ConditionContext>,
        markers: Vec<Marker>,
    ) -> TestItem {
        self.resolver().register(&frame.path);
        TestItem::new(nodeid, frame, context, markers)
    }

    pub fn decide<'i>(
        &self,
        item: &'i TestItem,
    ) -> Result<&'i MarkerDecision, &'i ConditionError> {
        self.engine.decide(item, self.mode)
    }

    /// Decides `item`, runs `body` when called for, and reports the result.
    ///
    /// Panics in `body` are failures. A condition error fails the item without running it.
    pub fn run_item<F>(&self, item: &TestItem, body: F) -> TestReport
    where
        F: FnOnce() -> Result<(), Failure>,
    {
        let item_location = self.resolver().resolve(item.frame());
        let decision = match self.decide(item) {
            Ok(decision) => decision,
            Err(err) => {
                return TestReport {
                    nodeid: item.nodeid().to_string(),
                    outcome: ReportOutcome::Failed {
                        failure: Failure::new("", err.to_string()),
                    },
                    location: item_location,
                    longrepr: Some(err.report_text()),
                }
            }
        };

        let outcome = marker::apply(decision, || invoke(body));
        let (location, longrepr) = match &outcome {
            ReportOutcome::Failed { failure } => {
                let location = failure
                    .frame
                    .as_ref()
                    .map(|frame| self.resolver().resolve(frame))
                    .unwrap_or(item_location);
                let longrepr = render_longrepr(&location, failure);
                (location, Some(longrepr))
            }
            ReportOutcome::Skipped { location, .. } => (location.clone(), None),
            _ => (item_location, None),
        };
        tracing::debug!(
            nodeid = item.nodeid(),
            outcome = outcome.word(),
            %location,
            "item finished"
        );
        TestReport {
            nodeid: item.nodeid().to_string(),
            outcome,
            location,
            longrepr,
        }
    }
}

fn invoke<F>(body: F) -> RunOutcome
where
    F: FnOnce() -> Result<(), Failure>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => RunOutcome::Passed,
        Ok(Err(failure)) => RunOutcome::Failed(failure),
        Err(payload) => RunOutcome::Failed(Failure::from_panic(payload)),
    }
}

fn render_longrepr(location: &ReportLocation, failure: &Failure) -> String {
    let mut text = format!("{}: {}", location, failure);
    for (name, rendering) in &failure.objects {
        text.push_str(&format!("\n    {} = {}", name, rendering));
    }
    text
}
